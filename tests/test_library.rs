use mtools::library::AminoLibrary;
use mtools::parser::{ParseError, TextFormat};
use std::path::{Path, PathBuf};

fn data(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/data").join(name)
}

#[test]
fn test_read_amino_library() {
    let library = AminoLibrary::from_file(&data("amino_small.lib")).unwrap();
    assert_eq!(library.len(), 3);

    let ala = library.get("ala").unwrap();
    assert_eq!(ala.serial, 1);
    assert_eq!(ala.title, "Alanine");
    assert_eq!(ala.atoms.len(), 10);
    assert_eq!(ala.bonds.len(), 9);
    assert_eq!(ala.connect, vec![-1, 9]);
    assert_eq!(ala.groups.len(), 2);
    assert_eq!(ala.bonds[8], ("C".to_string(), "O".to_string()));
    assert_eq!(ala.atom("CB").unwrap().atom_type, "C0");
    assert!(ala.total_charge().abs() < 1e-9);
    assert!(ala.unbalanced_groups(1e-6).is_empty());

    let hoh = library.get("HOH").unwrap();
    assert_eq!(hoh.atoms.len(), 3);
    assert!(hoh.connect.is_empty());
}

#[test]
fn test_missing_atom_is_reported() {
    let library = AminoLibrary::from_file(&data("amino_small.lib")).unwrap();
    match library.get("GLY").unwrap().atom("CB") {
        Err(ParseError::AtomNotFound { atom, context }) => {
            assert_eq!(atom, "CB");
            assert_eq!(context, "GLY");
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn test_assign_charges_and_write() {
    let mut library = AminoLibrary::from_file(&data("amino_small.lib")).unwrap();
    let water = library.get_mut("HOH").unwrap();

    // Wrong count leaves the component untouched
    assert!(matches!(
        water.assign_charges(&[-0.8, 0.4]),
        Err(ParseError::ChargeCountMismatch { expected: 3, found: 2, .. })
    ));
    assert_eq!(water.atoms[0].charge, -0.82);

    water.assign_charges(&[-0.8, 0.4, 0.4]).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("amino_out.lib");
    library.write(&path).unwrap();

    let reread = AminoLibrary::from_file(&path).unwrap();
    assert_eq!(reread.len(), library.len());
    for (a, b) in library.components.iter().zip(&reread.components) {
        assert_eq!(a.name, b.name);
        assert_eq!(a.atoms.len(), b.atoms.len());
        assert_eq!(a.bonds, b.bonds);
        assert_eq!(a.groups, b.groups);
        assert!((a.total_charge() - b.total_charge()).abs() < 1e-4);
    }
    assert_eq!(reread.get("HOH").unwrap().atoms[0].charge, -0.8);
}

#[test]
fn test_write_single_component() {
    let library = AminoLibrary::from_file(&data("amino_small.lib")).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gly.lib");
    library.get("GLY").unwrap().write(&path).unwrap();

    let reread = AminoLibrary::from_file(&path).unwrap();
    assert_eq!(reread.len(), 1);
    assert_eq!(reread.components[0].atoms.len(), 7);
}
