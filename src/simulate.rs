//! Monte Carlo sampling of dye-tracks and radiometries from a sequencing
//! model and a peptide set.
//!
//! Grounded in `original_source/cc_code/src/simulation/generate-dye-track.cc`
//! for step order; the original additionally models per-timestep detach
//! probabilities and N-terminal "blocking" events that this module drops
//! in favor of a single scalar `p_detach` and no blocking, following a
//! simpler four-step recipe instead.
//! Batch generation and dedup are grounded in
//! `generate-dye-tracks.cc`/`generate-radiometries.cc`/`dedup-dye-tracks.h`.

use fnv::FnvHashMap;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use rayon::prelude::*;

use crate::model::{
    DyeSeq, DyeTrack, Radiometry, SequencingModel, SourceCount, SourceCountHits,
    SourceCountHitsList, Sourced,
};
use crate::rng::stream_rng;

/// Upper bound on draws per peptide before two peptides' RNG streams could
/// collide; batch sizes in practice are far below this.
const DRAW_STREAM_STRIDE: u64 = 1 << 32;

/// Draws one dye-track sample for `dye_seq` under `seq_model`: dud, initial
/// counts, then per-cycle detach/Edman/bleach.
pub fn generate_dye_track(
    seq_model: &SequencingModel,
    dye_seq: &DyeSeq,
    num_timesteps: usize,
    num_channels: usize,
    rng: &mut impl Rng,
) -> DyeTrack {
    let len = dye_seq.len();

    // 1. Duds: replace a labeled residue's channel with -1 with probability
    // p_dud[c].
    let mut channels: Vec<i8> = (0..len).map(|i| dye_seq.get(i)).collect();
    for dye in channels.iter_mut() {
        if *dye >= 0 && rng.gen::<f64>() < seq_model.channels[*dye as usize].p_dud {
            *dye = -1;
        }
    }

    // 2. Initial per-channel counts, zero Edman cycles completed.
    let mut counts = vec![0u16; num_channels];
    for &dye in &channels {
        if dye >= 0 {
            counts[dye as usize] += 1;
        }
    }

    let mut dye_track = DyeTrack::new(num_timesteps, num_channels);
    let mut cleaved = 0usize;
    let mut detached = false;

    for t in 0..num_timesteps {
        for (c, &count) in counts.iter().enumerate() {
            dye_track.set(t, c, if detached { 0 } else { count });
        }
        if detached {
            continue;
        }

        // 3b. Detach: zero out everything from here on.
        if rng.gen::<f64>() < seq_model.p_detach {
            detached = true;
            continue;
        }

        // 3c. Edman: consume the N-terminal residue on success.
        if cleaved < len && rng.gen::<f64>() >= seq_model.p_edman_failure {
            let dye = channels[cleaved];
            if dye >= 0 {
                counts[dye as usize] -= 1;
            }
            cleaved += 1;
        }

        // 3d. Bleach each remaining labeled residue independently.
        for dye in channels[cleaved..].iter_mut() {
            if *dye >= 0 && rng.gen::<f64>() < seq_model.channels[*dye as usize].p_bleach {
                counts[*dye as usize] -= 1;
                *dye = -1;
            }
        }
    }

    dye_track
}

/// Draws one radiometry for `dye_seq` under `seq_model`: a dye-track, then
/// one Gaussian draw per nonzero `(t, c)` cell. Returns `None` if the
/// draw is undetectable (all-zero first timestep).
pub fn generate_radiometry(
    seq_model: &SequencingModel,
    dye_seq: &DyeSeq,
    num_timesteps: usize,
    num_channels: usize,
    rng: &mut impl Rng,
) -> Radiometry {
    let dye_track = generate_dye_track(seq_model, dye_seq, num_timesteps, num_channels, rng);
    let mut radiometry = Radiometry::new(num_timesteps, num_channels);
    for t in 0..num_timesteps {
        for c in 0..num_channels {
            let d = dye_track.get(t, c);
            if d == 0 {
                continue;
            }
            let channel = &seq_model.channels[c];
            let mean = d as f64 * channel.mu;
            let std = channel.sigma(d as u32);
            let normal = Normal::new(mean, std).expect("positive std");
            radiometry.set(t, c, normal.sample(rng));
        }
    }
    radiometry
}

/// Draws `n` radiometries per peptide in `dye_seqs`, weighted by each
/// peptide's multiplicity, discarding undetectable draws. `master_seed`
/// seeds one independent RNG stream per draw so the batch is reproducible
/// and parallelizable.
pub fn generate_radiometries(
    seq_model: &SequencingModel,
    dye_seqs: &[Sourced<DyeSeq, SourceCount>],
    num_timesteps: usize,
    num_channels: usize,
    n_per_peptide: usize,
    master_seed: u64,
) -> Vec<(i32, Radiometry)> {
    dye_seqs
        .par_iter()
        .enumerate()
        .flat_map(|(peptide_idx, entry)| {
            let draws = n_per_peptide * entry.source.count.max(1) as usize;
            (0..draws).into_par_iter().filter_map(move |draw_idx| {
                let stream_index = (peptide_idx as u64) * DRAW_STREAM_STRIDE + draw_idx as u64;
                let mut rng = stream_rng(master_seed, stream_index);
                let radiometry =
                    generate_radiometry(seq_model, &entry.value, num_timesteps, num_channels, &mut rng);
                if radiometry.is_undetectable() {
                    None
                } else {
                    Some((entry.source.id, radiometry))
                }
            })
        })
        .collect()
}

/// Draws `n` dye-tracks per peptide in `dye_seqs`, weighted by multiplicity
/// before deduplication.
pub fn generate_dye_tracks(
    seq_model: &SequencingModel,
    dye_seqs: &[Sourced<DyeSeq, SourceCount>],
    num_timesteps: usize,
    num_channels: usize,
    n_per_peptide: usize,
    master_seed: u64,
) -> Vec<(i32, u32, DyeTrack)> {
    dye_seqs
        .par_iter()
        .enumerate()
        .flat_map(|(peptide_idx, entry)| {
            let draws = n_per_peptide * entry.source.count.max(1) as usize;
            (0..draws).into_par_iter().map(move |draw_idx| {
                let stream_index = (peptide_idx as u64) * DRAW_STREAM_STRIDE + draw_idx as u64;
                let mut rng = stream_rng(master_seed, stream_index);
                let dye_track =
                    generate_dye_track(seq_model, &entry.value, num_timesteps, num_channels, &mut rng);
                (entry.source.id, entry.source.count, dye_track)
            })
        })
        .collect()
}

/// Groups generated dye-tracks by equality, recording for each distinct
/// track how many draws of each source peptide produced it.
pub fn dedup_dye_tracks(
    draws: Vec<(i32, u32, DyeTrack)>,
) -> Vec<Sourced<DyeTrack, SourceCountHitsList>> {
    let mut groups: FnvHashMap<DyeTrack, FnvHashMap<i32, SourceCountHits>> = FnvHashMap::default();
    for (id, count, dye_track) in draws {
        let sources = groups.entry(dye_track).or_default();
        sources
            .entry(id)
            .and_modify(|s| s.hits += 1)
            .or_insert(SourceCountHits { id, count, hits: 1 });
    }
    groups
        .into_iter()
        .map(|(dye_track, sources)| {
            Sourced::new(dye_track, SourceCountHitsList(sources.into_values().collect()))
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::ChannelModel;

    fn zero_loss_model(num_channels: usize) -> SequencingModel {
        SequencingModel {
            p_edman_failure: 0.0,
            p_detach: 0.0,
            channels: (0..num_channels)
                .map(|_| ChannelModel {
                    p_bleach: 0.0,
                    p_dud: 0.0,
                    mu: 1000.0,
                    sig: 0.1,
                    bg_sig: 10.0,
                })
                .collect(),
        }
    }

    #[test]
    fn zero_error_dye_track_matches_deterministic_prefix_counts() {
        let model = zero_loss_model(2);
        let dye_seq = DyeSeq::parse(2, "0011111");
        let mut rng = stream_rng(1, 0);
        let dye_track = generate_dye_track(&model, &dye_seq, 3, 2, &mut rng);
        let expected = DyeTrack::from_dye_seq(3, 2, &dye_seq);
        assert_eq!(dye_track, expected);
    }

    #[test]
    fn detach_zeros_all_future_counts() {
        let mut model = zero_loss_model(1);
        model.p_detach = 1.0;
        let dye_seq = DyeSeq::parse(1, "0000");
        let mut rng = stream_rng(2, 0);
        let dye_track = generate_dye_track(&model, &dye_seq, 4, 1, &mut rng);
        // Detach is checked before the first Edman cycle on t=0's entry, so
        // t=0 still records the pre-detach counts, but every later t is
        // zeroed.
        assert_eq!(dye_track.get(0, 0), 4);
        for t in 1..4 {
            assert_eq!(dye_track.get(t, 0), 0);
        }
    }

    #[test]
    fn radiometry_zero_count_cells_are_exactly_zero() {
        let model = zero_loss_model(1);
        let dye_seq = DyeSeq::parse(1, ".");
        let mut rng = stream_rng(3, 0);
        let radiometry = generate_radiometry(&model, &dye_seq, 2, 1, &mut rng);
        assert_eq!(radiometry.get(0, 0), 0.0);
        assert_eq!(radiometry.get(1, 0), 0.0);
    }

    #[test]
    fn dedup_counts_hits_per_source() {
        let dye_seq = DyeSeq::parse(1, "0");
        let model = zero_loss_model(1);
        let mut rng_a = stream_rng(4, 0);
        let mut rng_b = stream_rng(4, 1);
        let a = generate_dye_track(&model, &dye_seq, 1, 1, &mut rng_a);
        let b = generate_dye_track(&model, &dye_seq, 1, 1, &mut rng_b);
        assert_eq!(a, b); // zero-error-rate draws from the same peptide agree
        let draws = vec![(7, 1, a), (7, 1, b)];
        let deduped = dedup_dye_tracks(draws);
        assert_eq!(deduped.len(), 1);
        assert_eq!(deduped[0].source.total_hits(), 2);
        assert_eq!(deduped[0].source.0[0].id, 7);
    }
}
