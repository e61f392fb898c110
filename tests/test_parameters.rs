use mtools::evb_library::EvbLibrary;
use mtools::parameters::ParametersLibrary;
use mtools::parser::TextFormat;
use std::path::{Path, PathBuf};

fn data(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/data").join(name)
}

#[test]
fn test_read_parameters_library() {
    let params = ParametersLibrary::from_file(&data("parm_small.lib")).unwrap();
    assert_eq!(params.len(), 11);
    assert_eq!(params.bonds.len(), 3);
    assert_eq!(params.vdw.len(), 3);

    // Lookups are order-independent
    let bond = params.get_bond("N0", "C0").unwrap();
    assert_eq!(bond.k, 700.0);
    assert_eq!(bond.r0, 1.470);
    assert_eq!(params.get_angle("N0", "C0", "C0").unwrap().theta0, 109.5);
    assert!(params.get_angle("C0", "N0", "C0").is_none());
    assert_eq!(params.get_improper("N0", "C2").unwrap().k, 40.0);

    // Exact torsion beats the wildcard, unknown ones fall back to it
    assert_eq!(params.get_torsion("N0", "C0", "C2", "O1").unwrap().periodicity, 2);
    assert_eq!(params.get_torsion("H1", "C0", "C0", "N0").unwrap().periodicity, 3);

    assert_eq!(params.get_vdw("H1").unwrap().mass, 1.008);
    assert!(params.get_vdw("S0").is_none());
}

#[test]
fn test_read_evb_library() {
    let evb = EvbLibrary::from_file(&data("evb_small.lib")).unwrap();
    assert_eq!(evb.len(), 9);

    let oxygen = evb.get_atom("O-").unwrap();
    assert_eq!(oxygen.enzymix_type, "O5");
    assert_eq!(oxygen.charge, -1.0);

    let morse = evb.get_morse("O0", "H0").unwrap();
    assert_eq!(morse.d, 102.0);
    assert!(morse.energy(morse.r0).abs() < 1e-12);
    assert!(morse.energy(3.0) > 0.0 && morse.energy(3.0) < morse.d);

    assert_eq!(evb.get_angle("H0", "O0", "H0").unwrap().theta0, 104.5);
    assert!(evb.get_torsion("H0", "C0", "O0", "H0").is_some());

    let coupling = evb.get_offdiagonal(2, 1).unwrap();
    assert_eq!(coupling.a, 35.0);
    assert!(evb.get_offdiagonal(1, 3).is_none());
}

#[test]
fn test_truncated_section() {
    let text = "BONDS 2\n  C0  C0  600.0  1.53\n";
    let err = ParametersLibrary::parse(text).unwrap_err();
    assert!(err.to_string().contains("unexpected end of file"), "{}", err);
}

#[test]
fn test_huge_record_count() {
    let text = "BONDS 999999999999999999\n  C0  C0  600.0  1.53\n";
    let err = ParametersLibrary::parse(text).unwrap_err();
    assert!(err.to_string().contains("unexpected end of file"), "{}", err);
    assert!(EvbLibrary::parse("MORSE 999999999999999999\n").is_err());
}
