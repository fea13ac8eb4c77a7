use assert_cmd::Command;
use assert_fs::{fixture::PathChild, TempDir};
use predicates::prelude::*;
use std::io::Write;

fn write_file(dir: &TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.child(name);
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(contents.as_bytes()).unwrap();
    path.to_path_buf()
}

/// A one-channel model with generous error rates, but small enough that a
/// perfect `00` radiometry unambiguously favors the two-dye candidate.
const MODEL_CSV: &str = "p_edman_failure,p_detach,p_bleach_0,p_dud_0,mu_0,sig_0,bg_sig_0\n\
0.05,0.03,0.05,0.05,1000,0.1,10\n";

#[test]
fn classify_hmm_picks_the_matching_candidate() {
    let dir = TempDir::new().unwrap();
    let dye_seqs = write_file(&dir, "dye_seqs.txt", "1\n2\n0 1 1\n00 1 2\n");
    let model = write_file(&dir, "model.csv", MODEL_CSV);
    let radiometries = write_file(&dir, "radiometries.txt", "2\n1\n1\n2000.0 2000.0\n");
    let output = dir.child("predictions.csv");

    Command::cargo_bin("dyetrace")
        .unwrap()
        .args([
            "classify",
            "hmm",
            "--dye-seqs",
            dye_seqs.to_str().unwrap(),
            "--model",
            model.to_str().unwrap(),
            "--radiometries",
            radiometries.to_str().unwrap(),
            "--output",
        ])
        .arg(output.path())
        .assert()
        .success();

    let contents = std::fs::read_to_string(output.path()).unwrap();
    assert!(contents.contains("radmat_iz,best_pep_iz,best_pep_score"));
    assert!(contents.lines().nth(1).unwrap().starts_with("0,2,"));
}

#[test]
fn classify_hmm_rejects_mismatched_channel_counts() {
    let dir = TempDir::new().unwrap();
    let dye_seqs = write_file(&dir, "dye_seqs.txt", "1\n1\n0 1 1\n");
    let model = write_file(&dir, "model.csv", MODEL_CSV);
    let radiometries = write_file(&dir, "radiometries.txt", "2\n2\n1\n1.0 2.0 3.0 4.0\n");
    let output = dir.child("predictions.csv");

    Command::cargo_bin("dyetrace")
        .unwrap()
        .args([
            "classify",
            "hmm",
            "--dye-seqs",
            dye_seqs.to_str().unwrap(),
            "--model",
            model.to_str().unwrap(),
            "--radiometries",
            radiometries.to_str().unwrap(),
            "--output",
        ])
        .arg(output.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("channels"));
}

#[test]
fn simulate_dt_then_classify_nn_round_trips() {
    let dir = TempDir::new().unwrap();
    let dye_seqs = write_file(&dir, "dye_seqs.txt", "1\n1\n00 1 5\n");
    let model = write_file(&dir, "model.csv", MODEL_CSV);
    let dye_tracks = dir.child("dye_tracks.txt");

    Command::cargo_bin("dyetrace")
        .unwrap()
        .args([
            "simulate",
            "dt",
            "--dye-seqs",
            dye_seqs.to_str().unwrap(),
            "--model",
            model.to_str().unwrap(),
            "--num-timesteps",
            "2",
            "--n-per-peptide",
            "20",
            "--seed",
            "7",
            "--output",
        ])
        .arg(dye_tracks.path())
        .assert()
        .success();
    assert!(dye_tracks.path().exists());

    let radiometries = write_file(&dir, "radiometries.txt", "2\n1\n1\n2000.0 2000.0\n");
    let predictions = dir.child("predictions.csv");
    Command::cargo_bin("dyetrace")
        .unwrap()
        .args([
            "classify",
            "nn",
            "--model",
            model.to_str().unwrap(),
            "--dye-tracks",
            dye_tracks.path().to_str().unwrap(),
            "--radiometries",
            radiometries.to_str().unwrap(),
            "--k",
            "1",
            "--output",
        ])
        .arg(predictions.path())
        .assert()
        .success();

    let contents = std::fs::read_to_string(predictions.path()).unwrap();
    assert!(contents.lines().nth(1).unwrap().starts_with("0,5,"));
}
