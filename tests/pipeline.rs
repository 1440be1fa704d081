use std::io::Write;
use std::path::PathBuf;

use serde_json::json;
use tempfile::TempDir;

use lidar_quicklook::pipeline::{load_all, run};
use lidar_quicklook::{LoadError, MergeError};

fn write_chunk(dir: &TempDir, name: &str, doc: serde_json::Value) -> PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(doc.to_string().as_bytes()).unwrap();
    path
}

fn channel(times: &[f64]) -> serde_json::Value {
    json!({
        "serial_number": "A1",
        "DP": { "time": times, "data": times.iter().map(|_| vec![2e5, 3e5]).collect::<Vec<_>>() },
        "lidar_range": [7.5, 22.5],
    })
}

#[test]
fn load_all_keeps_input_order() {
    let dir = tempfile::tempdir().unwrap();
    let second = write_chunk(
        &dir,
        "b.json",
        json!({ "data_dict": { "1": channel(&[60.0]) }, "metadata_dict": { "chunk": 1 } }),
    );
    let first = write_chunk(
        &dir,
        "a.json",
        json!({ "data_dict": { "1": channel(&[0.0, 30.0]) }, "metadata_dict": { "chunk": 0 } }),
    );

    let (sets, metadata) = load_all(&[second, first]).unwrap();
    assert_eq!(sets[0].channel("1").unwrap().profile_count(), 1);
    assert_eq!(sets[1].channel("1").unwrap().profile_count(), 2);
    assert_eq!(metadata.len(), 2);
}

#[test]
fn channel_mismatch_between_files_aborts_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_chunk(
        &dir,
        "a.json",
        json!({ "data_dict": { "1": channel(&[0.0]), "2": channel(&[0.0]) }, "metadata_dict": {} }),
    );
    let b = write_chunk(
        &dir,
        "b.json",
        json!({ "data_dict": { "1": channel(&[30.0]) }, "metadata_dict": {} }),
    );

    let out = dir.path().join("plots");
    let err = run(&out, &[a, b]).unwrap_err();
    match err.downcast_ref::<MergeError>() {
        Some(MergeError::KeyMismatch { missing, .. }) => assert_eq!(missing, &["2"]),
        other => panic!("expected key mismatch, got {other:?}"),
    }
    assert!(!out.exists());
}

#[test]
fn schema_error_aborts_before_merging() {
    let dir = tempfile::tempdir().unwrap();
    let good = write_chunk(
        &dir,
        "a.json",
        json!({ "data_dict": { "1": channel(&[0.0]) }, "metadata_dict": {} }),
    );
    let bad = write_chunk(&dir, "b.json", json!({ "metadata_dict": {} }));

    let err = run(&dir.path().join("plots"), &[good, bad]).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<LoadError>(),
        Some(LoadError::Schema { .. })
    ));
}

#[test]
fn missing_plot_channel_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let only_11 = write_chunk(
        &dir,
        "a.json",
        json!({ "data_dict": { "11": channel(&[0.0, 30.0]) }, "metadata_dict": {} }),
    );

    let err = run(&dir.path().join("plots"), &[only_11]).unwrap_err();
    assert!(format!("{err:#}").contains("channel '1'"));
}

#[test]
fn run_writes_both_altitude_variants() {
    let dir = tempfile::tempdir().unwrap();
    let t0 = 1_709_251_200.0;
    let a = write_chunk(
        &dir,
        "a.json",
        json!({
            "data_dict": {
                "1": channel(&[t0, t0 + 30.0]),
                "2": channel(&[t0, t0 + 30.0]),
                "11": channel(&[t0, t0 + 30.0]),
            },
            "metadata_dict": {},
        }),
    );
    let mut renamed = channel(&[t0 + 60.0, t0 + 90.0]);
    renamed["serial_number"] = json!("A2");
    let b = write_chunk(
        &dir,
        "b.json",
        json!({
            "data_dict": {
                "1": channel(&[t0 + 60.0, t0 + 90.0]),
                "2": renamed,
                "11": channel(&[t0 + 60.0, t0 + 90.0]),
            },
            "metadata_dict": {},
        }),
    );

    let out = dir.path().join("plots");
    let summary = run(&out, &[a, b]).unwrap();

    assert_eq!(summary.files, 2);
    assert_eq!(summary.images.len(), 6);
    for variant in ["0-4000m", "0-15000m"] {
        for id in ["1", "2", "11"] {
            let path = out.join(variant).join(format!("channel{id}.png"));
            assert!(path.exists(), "{} not written", path.display());
            assert!(summary.images.contains(&path));
        }
    }

    assert_eq!(summary.discrepancies.len(), 1);
    assert_eq!(summary.discrepancies[0].channel, "2");
    assert_eq!(summary.discrepancies[0].field, "serial_number");
}
