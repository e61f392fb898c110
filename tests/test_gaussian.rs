use mtools::gaussian::{ChargeScheme, GaussianInput, GaussianLog};
use mtools::io;
use mtools::library::AminoLibrary;
use mtools::parser::TextFormat;
use std::fs;
use std::path::{Path, PathBuf};

fn data(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/data").join(name)
}

#[test]
fn test_read_gaussian_log() {
    let log = GaussianLog::from_file(&data("gaussian_small.log")).unwrap();
    assert_eq!(log.input_frames.len(), 2);
    assert_eq!(log.standard_frames.len(), 2);
    assert_eq!(log.frames().len(), 2);
    assert_eq!(log.scf_energies, vec![-76.4071215, -76.4089533]);
    assert_eq!(log.final_energy(), Some(-76.4089533));
    assert!(log.normal_termination);

    // The summed-hydrogen block must not replace the per-atom charges
    assert_eq!(log.charges(ChargeScheme::Mulliken).unwrap().len(), 3);
    assert_eq!(log.charges(ChargeScheme::Chelpg).unwrap()[0], -0.792418);
    assert_eq!(
        log.charges(ChargeScheme::Chelpg),
        log.charges(ChargeScheme::MerzKollman)
    );

    let first = &log.frames()[0];
    assert_eq!(first.atoms[1].position.y, 0.76);
    let last = log.final_molecule(Some(ChargeScheme::Chelpg)).unwrap();
    assert_eq!(last.atoms[1].position.y, 0.763239);
    assert_eq!(last.atoms[2].charge, Some(0.396209));
    assert_eq!(last.atoms[1].force.unwrap().y, 0.003247281);
    assert!(last.total_charge().abs() < 1e-9);
}

#[test]
fn test_charges_into_library_component() {
    let log = GaussianLog::from_file(&data("gaussian_small.log")).unwrap();
    let mut library = AminoLibrary::from_file(&data("amino_small.lib")).unwrap();

    let charges = log.charges(ChargeScheme::Mulliken).unwrap();
    let water = library.get_mut("HOH").unwrap();
    water.assign_charges(charges).unwrap();
    assert_eq!(water.atoms[0].charge, -0.834131);
    assert!(water.total_charge().abs() < 1e-5);

    // Three charges cannot go into alanine
    assert!(library.get_mut("ALA").unwrap().assign_charges(charges).is_err());
}

#[test]
fn test_write_input_from_log() {
    let log = GaussianLog::from_file(&data("gaussian_small.log")).unwrap();
    let molecule = log.final_molecule(None).unwrap();

    let mut input = GaussianInput::new(&molecule);
    input.charge_scheme = ChargeScheme::MerzKollman;
    input.nprocs = 4;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("water.inp");
    input.write(&path).unwrap();

    let deck = fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = deck.lines().collect();
    assert_eq!(lines[0], "%mem=1GB");
    assert_eq!(lines[1], "%nprocshared=4");
    assert_eq!(lines[2], "# B3LYP/6-31G* NoSymm Pop=MK");
    assert_eq!(lines[6], "0 1");
    assert_eq!(deck.lines().filter(|l| l.starts_with("H ")).count(), 2);
}

#[test]
fn test_frames_to_xyz_trajectory() {
    let log = GaussianLog::from_file(&data("gaussian_small.log")).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("opt.xyz");
    io::write_xyz_trajectory(log.frames(), &path).unwrap();

    let frames = io::read_xyz_trajectory(&path).unwrap();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[1].atoms[0].label, "O");
    assert!((frames[1].atoms[0].position.z - 0.119262).abs() < 1e-8);
}

#[test]
fn test_open_shell_log() {
    let log = GaussianLog::from_file(&data("gaussian_open_shell.log")).unwrap();
    assert_eq!(log.final_energy(), Some(-75.7236410));

    // Spin densities share the block; only the charge column is kept
    assert_eq!(log.charges(ChargeScheme::Mulliken).unwrap(), &[-0.367012, 0.367012]);

    let radical = log.final_molecule(Some(ChargeScheme::Mulliken)).unwrap();
    assert_eq!(radical.atoms[1].charge, Some(0.367012));

    let mut input = GaussianInput::new(&radical);
    input.multiplicity = 2;
    assert!(input.validate().is_ok());
}
