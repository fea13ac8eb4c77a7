//! Plain-text and CSV file formats for dye sequences, dye tracks,
//! radiometries, ground-truth IDs, predictions, and sequencing models: the
//! boundary formats that let the CLI read and write everything else in this
//! crate.
//!
//! Grounded in `original_source/cc_code/src/io/{dye-seqs-io,dye-tracks-io,
//! radiometries-io,scored-classifications-io,params-io}.cc`: every reader
//! there is a sequence of whitespace-delimited `ifstream >>` token reads, not
//! a strict line format, so the readers below tokenize a line at a time
//! (for error-reporting line numbers) but don't otherwise care how many
//! tokens share a line.

use std::{
    fs::File,
    io::{BufRead, BufReader, Write},
    path::Path,
    str::FromStr,
};

use crate::error::{Error, Result};
use crate::model::{
    ChannelModel, DyeSeq, DyeTrack, Radiometry, ScoredClassification, SequencingModel, SourceCount,
    SourceCountHits, SourceCountHitsList, Sourced,
};
use crate::utils::format_f64;

struct LineTokens<'a> {
    path: &'a Path,
    line: usize,
    tokens: std::str::SplitWhitespace<'a>,
}

impl<'a> LineTokens<'a> {
    fn new(path: &'a Path, line: usize, text: &'a str) -> Self {
        LineTokens {
            path,
            line,
            tokens: text.split_whitespace(),
        }
    }

    fn next_str(&mut self) -> Result<&'a str> {
        self.tokens.next().ok_or_else(|| Error::Format {
            path: self.path.to_path_buf(),
            line: self.line,
            detail: "expected another field, found end of line".to_string(),
        })
    }

    fn next_parsed<T: FromStr>(&mut self) -> Result<T> {
        let tok = self.next_str()?;
        tok.parse::<T>().map_err(|_| Error::Format {
            path: self.path.to_path_buf(),
            line: self.line,
            detail: format!("could not parse {tok:?}"),
        })
    }

    /// Reads exactly `expected` fields, the shape of one dye-track or
    /// radiometry row. Too few or too many fields on the line is an arity
    /// mismatch, not a generic parse failure.
    fn expect_row<T: FromStr>(&mut self, expected: usize) -> Result<Vec<T>> {
        let mut out = Vec::with_capacity(expected);
        for got in 0..expected {
            match self.tokens.next() {
                Some(tok) => out.push(tok.parse::<T>().map_err(|_| Error::Format {
                    path: self.path.to_path_buf(),
                    line: self.line,
                    detail: format!("could not parse {tok:?}"),
                })?),
                None => {
                    return Err(Error::Arity {
                        path: self.path.to_path_buf(),
                        line: self.line,
                        expected,
                        got,
                    })
                }
            }
        }
        Ok(out)
    }

    /// Asserts no fields remain beyond the ones already consumed.
    fn expect_end_of_row(&mut self, expected: usize) -> Result<()> {
        let trailing = self.tokens.clone().count();
        if trailing > 0 {
            return Err(Error::Arity {
                path: self.path.to_path_buf(),
                line: self.line,
                expected,
                got: expected + trailing,
            });
        }
        Ok(())
    }
}

fn read_lines(path: &Path) -> Result<Vec<String>> {
    let file = File::open(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    BufReader::new(file)
        .lines()
        .map(|l| {
            l.map_err(|source| Error::Io {
                path: path.to_path_buf(),
                source,
            })
        })
        .collect()
}

fn line_at<'a>(path: &Path, lines: &'a [String], line: usize) -> Result<&'a str> {
    lines.get(line).map(String::as_str).ok_or_else(|| Error::Format {
        path: path.to_path_buf(),
        line,
        detail: "unexpected end of file".to_string(),
    })
}

// ---------------------------------------------------------------------
// Dye-sequence file
// ---------------------------------------------------------------------

/// Reads a dye-sequence file: `num_channels`, `num_dye_seqs`, then one line
/// per entry of `dye_string count id`.
pub fn read_dye_seqs(path: impl AsRef<Path>) -> Result<(u8, Vec<Sourced<DyeSeq, SourceCount>>)> {
    let path = path.as_ref();
    let lines = read_lines(path)?;
    let num_channels: u8 = LineTokens::new(path, 0, line_at(path, &lines, 0)?).next_parsed()?;
    let num_dye_seqs: usize = LineTokens::new(path, 1, line_at(path, &lines, 1)?).next_parsed()?;
    let mut dye_seqs = Vec::with_capacity(num_dye_seqs);
    for i in 0..num_dye_seqs {
        let line_no = 2 + i;
        let mut tokens = LineTokens::new(path, line_no, line_at(path, &lines, line_no)?);
        let dye_string = tokens.next_str()?;
        let count: u32 = tokens.next_parsed()?;
        let id: i32 = tokens.next_parsed()?;
        let dye_seq = DyeSeq::parse(num_channels, dye_string);
        dye_seqs.push(Sourced::new(dye_seq, SourceCount { id, count }));
    }
    Ok((num_channels, dye_seqs))
}

/// Writes a dye-sequence file in the format [`read_dye_seqs`] parses.
pub fn write_dye_seqs(
    path: impl AsRef<Path>,
    num_channels: u8,
    dye_seqs: &[Sourced<DyeSeq, SourceCount>],
) -> Result<()> {
    let path = path.as_ref();
    let mut w = open_writer(path)?;
    writeln!(w, "{num_channels}").map_err(|e| io_err(path, e))?;
    writeln!(w, "{}", dye_seqs.len()).map_err(|e| io_err(path, e))?;
    for entry in dye_seqs {
        writeln!(w, "{} {} {}", entry.value, entry.source.count, entry.source.id)
            .map_err(|e| io_err(path, e))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------
// Dye-tracks file
// ---------------------------------------------------------------------

/// Reads a dye-tracks file: `T`, `C`, `num_dye_tracks`, then one line per
/// entry of `T*C counts`, `num_sources`, then `id count hits` per source.
pub fn read_dye_tracks(
    path: impl AsRef<Path>,
) -> Result<(usize, usize, Vec<Sourced<DyeTrack, SourceCountHitsList>>)> {
    let path = path.as_ref();
    let lines = read_lines(path)?;
    let num_timesteps: usize = LineTokens::new(path, 0, line_at(path, &lines, 0)?).next_parsed()?;
    let num_channels: usize = LineTokens::new(path, 1, line_at(path, &lines, 1)?).next_parsed()?;
    let num_dye_tracks: usize = LineTokens::new(path, 2, line_at(path, &lines, 2)?).next_parsed()?;
    let mut dye_tracks = Vec::with_capacity(num_dye_tracks);
    for i in 0..num_dye_tracks {
        let line_no = 3 + i;
        let mut tokens = LineTokens::new(path, line_no, line_at(path, &lines, line_no)?);
        let mut dye_track = DyeTrack::new(num_timesteps, num_channels);
        let counts: Vec<u16> = tokens.expect_row(num_timesteps * num_channels)?;
        for t in 0..num_timesteps {
            for c in 0..num_channels {
                dye_track.set(t, c, counts[t * num_channels + c]);
            }
        }
        let num_sources: usize = tokens.next_parsed()?;
        let mut sources = Vec::with_capacity(num_sources);
        for _ in 0..num_sources {
            let id: i32 = tokens.next_parsed()?;
            let count: u32 = tokens.next_parsed()?;
            let hits: u32 = tokens.next_parsed()?;
            sources.push(SourceCountHits { id, count, hits });
        }
        dye_tracks.push(Sourced::new(dye_track, SourceCountHitsList(sources)));
    }
    Ok((num_timesteps, num_channels, dye_tracks))
}

/// Writes a dye-tracks file in the format [`read_dye_tracks`] parses.
pub fn write_dye_tracks(
    path: impl AsRef<Path>,
    num_timesteps: usize,
    num_channels: usize,
    dye_tracks: &[Sourced<DyeTrack, SourceCountHitsList>],
) -> Result<()> {
    let path = path.as_ref();
    let mut w = open_writer(path)?;
    writeln!(w, "{num_timesteps}").map_err(|e| io_err(path, e))?;
    writeln!(w, "{num_channels}").map_err(|e| io_err(path, e))?;
    writeln!(w, "{}", dye_tracks.len()).map_err(|e| io_err(path, e))?;
    for entry in dye_tracks {
        let mut fields: Vec<String> = Vec::with_capacity(num_timesteps * num_channels + 1);
        for t in 0..num_timesteps {
            for c in 0..num_channels {
                fields.push(entry.value.get(t, c).to_string());
            }
        }
        fields.push(entry.source.0.len().to_string());
        for hit in &entry.source.0 {
            fields.push(hit.id.to_string());
            fields.push(hit.count.to_string());
            fields.push(hit.hits.to_string());
        }
        writeln!(w, "{}", fields.join(" ")).map_err(|e| io_err(path, e))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------
// Radiometries file
// ---------------------------------------------------------------------

/// Reads a radiometries file: `T`, `C`, `num_radiometries`, then one line
/// per radiometry of `T*C` intensities.
pub fn read_radiometries(path: impl AsRef<Path>) -> Result<(usize, usize, Vec<Radiometry>)> {
    let path = path.as_ref();
    let lines = read_lines(path)?;
    let num_timesteps: usize = LineTokens::new(path, 0, line_at(path, &lines, 0)?).next_parsed()?;
    let num_channels: usize = LineTokens::new(path, 1, line_at(path, &lines, 1)?).next_parsed()?;
    let num_radiometries: usize = LineTokens::new(path, 2, line_at(path, &lines, 2)?).next_parsed()?;
    let mut radiometries = Vec::with_capacity(num_radiometries);
    for i in 0..num_radiometries {
        let line_no = 3 + i;
        let mut tokens = LineTokens::new(path, line_no, line_at(path, &lines, line_no)?);
        let mut radiometry = Radiometry::new(num_timesteps, num_channels);
        let expected = num_timesteps * num_channels;
        let intensities: Vec<f64> = tokens.expect_row(expected)?;
        tokens.expect_end_of_row(expected)?;
        for t in 0..num_timesteps {
            for c in 0..num_channels {
                radiometry.set(t, c, intensities[t * num_channels + c]);
            }
        }
        radiometries.push(radiometry);
    }
    Ok((num_timesteps, num_channels, radiometries))
}

/// Writes a radiometries file, with every intensity formatted to at least 17
/// significant digits, enough to round-trip without losing precision.
pub fn write_radiometries(
    path: impl AsRef<Path>,
    num_timesteps: usize,
    num_channels: usize,
    radiometries: &[Radiometry],
) -> Result<()> {
    let path = path.as_ref();
    let mut w = open_writer(path)?;
    writeln!(w, "{num_timesteps}").map_err(|e| io_err(path, e))?;
    writeln!(w, "{num_channels}").map_err(|e| io_err(path, e))?;
    writeln!(w, "{}", radiometries.len()).map_err(|e| io_err(path, e))?;
    for radiometry in radiometries {
        let fields: Vec<String> = radiometry.as_point().iter().map(|&x| format_f64(x)).collect();
        writeln!(w, "{}", fields.join(" ")).map_err(|e| io_err(path, e))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------
// Y file (ground-truth peptide IDs)
// ---------------------------------------------------------------------

pub fn read_y(path: impl AsRef<Path>) -> Result<Vec<i32>> {
    let path = path.as_ref();
    let lines = read_lines(path)?;
    let num: usize = LineTokens::new(path, 0, line_at(path, &lines, 0)?).next_parsed()?;
    (0..num)
        .map(|i| LineTokens::new(path, 1 + i, line_at(path, &lines, 1 + i)?).next_parsed())
        .collect()
}

pub fn write_y(path: impl AsRef<Path>, ids: &[i32]) -> Result<()> {
    let path = path.as_ref();
    let mut w = open_writer(path)?;
    writeln!(w, "{}", ids.len()).map_err(|e| io_err(path, e))?;
    for id in ids {
        writeln!(w, "{id}").map_err(|e| io_err(path, e))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------
// Predictions file (CSV)
// ---------------------------------------------------------------------

/// Writes a predictions CSV: header `radmat_iz,best_pep_iz,best_pep_score`
/// then one row per radiometry of `index,id,adjusted_score`.
pub fn write_predictions(path: impl AsRef<Path>, classifications: &[ScoredClassification]) -> Result<()> {
    let path = path.as_ref();
    let mut writer = csv::Writer::from_path(path).map_err(Error::Csv)?;
    writer
        .write_record(["radmat_iz", "best_pep_iz", "best_pep_score"])
        .map_err(Error::Csv)?;
    for (i, c) in classifications.iter().enumerate() {
        writer
            .write_record([i.to_string(), c.id.to_string(), format_f64(c.adjusted_score())])
            .map_err(Error::Csv)?;
    }
    writer.flush().map_err(|e| io_err(path, e))?;
    Ok(())
}

// ---------------------------------------------------------------------
// Sequencing-model file (CSV)
// ---------------------------------------------------------------------

/// Column header for a sequencing model with `num_channels` channels:
/// `p_edman_failure,p_detach,` followed by `p_bleach_c,p_dud_c,mu_c,sig_c,
/// bg_sig_c` for each channel `c`.
fn sequencing_model_header(num_channels: usize) -> Vec<String> {
    let mut header = vec!["p_edman_failure".to_string(), "p_detach".to_string()];
    for c in 0..num_channels {
        header.push(format!("p_bleach_{c}"));
        header.push(format!("p_dud_{c}"));
        header.push(format!("mu_{c}"));
        header.push(format!("sig_{c}"));
        header.push(format!("bg_sig_{c}"));
    }
    header
}

fn sequencing_model_row(model: &SequencingModel) -> Vec<String> {
    let mut row = vec![format_f64(model.p_edman_failure), format_f64(model.p_detach)];
    for ch in &model.channels {
        row.push(format_f64(ch.p_bleach));
        row.push(format_f64(ch.p_dud));
        row.push(format_f64(ch.mu));
        row.push(format_f64(ch.sig));
        row.push(format_f64(ch.bg_sig));
    }
    row
}

/// Writes one or more sequencing-model variants (e.g. a point estimate, or a
/// bootstrap confidence interval's lower/upper bound rows) to a CSV file.
pub fn write_sequencing_models(path: impl AsRef<Path>, models: &[SequencingModel]) -> Result<()> {
    let path = path.as_ref();
    let num_channels = models.first().map_or(0, SequencingModel::num_channels);
    let mut writer = csv::Writer::from_path(path).map_err(Error::Csv)?;
    writer
        .write_record(sequencing_model_header(num_channels))
        .map_err(Error::Csv)?;
    for model in models {
        writer.write_record(sequencing_model_row(model)).map_err(Error::Csv)?;
    }
    writer.flush().map_err(|e| io_err(path, e))?;
    Ok(())
}

/// Reads every model variant from a sequencing-model CSV file.
pub fn read_sequencing_models(path: impl AsRef<Path>) -> Result<Vec<SequencingModel>> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path).map_err(Error::Csv)?;
    let headers = reader.headers().map_err(Error::Csv)?.clone();
    let num_channels = (headers.len() - 2) / 5;
    let mut models = Vec::new();
    for (row_idx, record) in reader.records().enumerate() {
        let record = record.map_err(Error::Csv)?;
        let field = |name: &str| -> Result<f64> {
            let idx = headers.iter().position(|h| h == name).ok_or_else(|| Error::Format {
                path: path.to_path_buf(),
                line: row_idx + 1,
                detail: format!("missing column {name:?}"),
            })?;
            record.get(idx).unwrap_or("").parse().map_err(|_| Error::Format {
                path: path.to_path_buf(),
                line: row_idx + 1,
                detail: format!("could not parse column {name:?}"),
            })
        };
        let p_edman_failure = field("p_edman_failure")?;
        let p_detach = field("p_detach")?;
        let mut channels = Vec::with_capacity(num_channels);
        for c in 0..num_channels {
            channels.push(ChannelModel {
                p_bleach: field(&format!("p_bleach_{c}"))?,
                p_dud: field(&format!("p_dud_{c}"))?,
                mu: field(&format!("mu_{c}"))?,
                sig: field(&format!("sig_{c}"))?,
                bg_sig: field(&format!("bg_sig_{c}"))?,
            });
        }
        models.push(SequencingModel {
            p_edman_failure,
            p_detach,
            channels,
        });
    }
    Ok(models)
}

fn open_writer(path: &Path) -> Result<impl Write> {
    File::create(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn io_err(path: &Path, source: std::io::Error) -> Error {
    Error::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write as _;

    fn write_tmp(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn round_trips_dye_seqs_file() {
        let f = write_tmp("2\n2\n10.01111 3 7\n00 1 8\n");
        let (num_channels, dye_seqs) = read_dye_seqs(f.path()).unwrap();
        assert_eq!(num_channels, 2);
        assert_eq!(dye_seqs.len(), 2);
        assert_eq!(dye_seqs[0].value.to_string(), "10.01111");
        assert_eq!(dye_seqs[0].source, SourceCount { id: 7, count: 3 });
        assert_eq!(dye_seqs[1].source, SourceCount { id: 8, count: 1 });
    }

    #[test]
    fn round_trips_radiometries_file() {
        let mut radiometry = Radiometry::new(2, 1);
        radiometry.set(0, 0, 5.0);
        radiometry.set(1, 0, 1.5);
        let out = tempfile::NamedTempFile::new().unwrap();
        write_radiometries(out.path(), 2, 1, std::slice::from_ref(&radiometry)).unwrap();
        let (t, c, back) = read_radiometries(out.path()).unwrap();
        assert_eq!((t, c), (2, 1));
        assert_eq!(back[0].get(0, 0), 5.0);
        assert_eq!(back[0].get(1, 0), 1.5);
    }

    #[test]
    fn radiometries_row_with_too_few_fields_is_an_arity_error() {
        let f = write_tmp("2\n1\n1\n5.0\n");
        match read_radiometries(f.path()) {
            Err(Error::Arity { expected, got, .. }) => {
                assert_eq!(expected, 2);
                assert_eq!(got, 1);
            }
            other => panic!("expected an arity error, got {other:?}"),
        }
    }

    #[test]
    fn radiometries_row_with_too_many_fields_is_an_arity_error() {
        let f = write_tmp("2\n1\n1\n5.0 1.5 9.0\n");
        match read_radiometries(f.path()) {
            Err(Error::Arity { expected, got, .. }) => {
                assert_eq!(expected, 2);
                assert_eq!(got, 3);
            }
            other => panic!("expected an arity error, got {other:?}"),
        }
    }

    #[test]
    fn round_trips_y_file() {
        let f = write_tmp("3\n1\n2\n3\n");
        assert_eq!(read_y(f.path()).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn round_trips_sequencing_model_file() {
        let model = SequencingModel {
            p_edman_failure: 0.05,
            p_detach: 0.02,
            channels: vec![ChannelModel {
                p_bleach: 0.1,
                p_dud: 0.07,
                mu: 1.0,
                sig: 0.16,
                bg_sig: 0.05,
            }],
        };
        let out = tempfile::NamedTempFile::new().unwrap();
        write_sequencing_models(out.path(), std::slice::from_ref(&model)).unwrap();
        let back = read_sequencing_models(out.path()).unwrap();
        assert_eq!(back.len(), 1);
        assert!((back[0].p_edman_failure - 0.05).abs() < 1e-12);
        assert!((back[0].channels[0].mu - 1.0).abs() < 1e-12);
    }

    #[test]
    fn missing_field_reports_format_error_with_line_number() {
        let f = write_tmp("2\n1\nshort\n");
        let err = read_dye_seqs(f.path()).unwrap_err();
        match err {
            Error::Format { line, .. } => assert_eq!(line, 2),
            other => panic!("expected Format error, got {other:?}"),
        }
    }
}
