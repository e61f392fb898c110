use mtools::gap::{DistanceFile, GapFile};
use mtools::parser::TextFormat;
use std::path::{Path, PathBuf};

fn data(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/data").join(name)
}

#[test]
fn test_read_gap_file() {
    let gap = GapFile::from_file(&data("gap.out")).unwrap();
    assert_eq!(gap.len(), 4);
    assert_eq!(gap.states(), 2);
    assert_eq!(gap.steps[0].step, 10);
    assert_eq!(gap.gaps(), vec![165.75, 159.0, 168.0, 161.0]);
    assert!((gap.mean_gap().unwrap() - 163.4375).abs() < 1e-9);
}

#[test]
fn test_read_distance_file() {
    let dist = DistanceFile::from_file(&data("dist.dat")).unwrap();
    assert_eq!(dist.len(), 3);
    assert_eq!(dist.columns(), 2);
    assert_eq!(dist.series(0).unwrap(), vec![0.970, 1.010, 0.990]);
    assert_eq!(dist.series(1).unwrap(), vec![1.430, 1.450, 1.420]);
    assert!(dist.series(2).is_none());
}

#[test]
fn test_empty_gap_file() {
    let gap = GapFile::parse("# header only\n").unwrap();
    assert!(gap.is_empty());
    assert!(gap.mean_gap().is_none());
}

#[test]
fn test_ragged_distance_file() {
    let err = DistanceFile::parse("1 0.9 1.4\n2 0.9\n").unwrap_err();
    assert!(err.to_string().contains("line 2"), "{}", err);
}
