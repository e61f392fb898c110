//! Molaris amino-acid (residue/component) library.
//!
//! A library is a sequence of components. Each component starts with a
//! header carrying its serial number glued to its name (`12ALA`), followed by
//! four counted blocks (atoms, bonds, connections, electroneutral groups) and
//! an optional dashed divider:
//!
//! ```text
//!   12ALA  Alanine
//!     5  ! Number of atoms
//!     1  N     N0      -0.5000
//!     2  H     H4       0.3000
//!     3  CA    C0       0.1000
//!     4  C     C2       0.5000
//!     5  O     O1      -0.4000
//!     4  ! Number of bonds
//!     1    2
//!     1    3
//!     3    4
//!     4    5
//!     2  ! Number of connections
//!    -1
//!     4
//!     2  ! Number of electroneutral groups
//!     3    1    2    3
//!     2    4    5
//! ------------------------------------------------------------
//! ```
//!
//! Bonds and groups reference atoms by their serial in the atom block;
//! in memory they are stored by atom label. Connection serials are kept as
//! signed integers (negative values link to the neighbouring residue).

use crate::parser::{LineCursor, ParseError, Result, TextFormat};
use crate::tokenize::{tokenize_line, Converter, Fields, LineTokenizer, TokenizeError};
use lazy_static::lazy_static;
use log::{info, warn};
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

/// Largest distance from an integer tolerated for a group charge.
pub const GROUP_CHARGE_TOLERANCE: f64 = 1.0e-3;

const DIVIDER: &str = "------------------------------------------------------------";

lazy_static! {
    static ref HEADER_RE: Regex =
        Regex::new(r"^\s*(\d+)([A-Za-z][A-Za-z0-9_+\-']*)\s*(.*)$").unwrap();
    static ref ATOM: LineTokenizer = LineTokenizer::new(&[
        Converter::Int,
        Converter::Raw,
        Converter::Raw,
        Converter::Float,
    ]);
    static ref PAIR: LineTokenizer = LineTokenizer::new(&[Converter::Int, Converter::Int]);
    static ref SINGLE: LineTokenizer = LineTokenizer::new(&[Converter::Int]);
}

/// One atom of a component.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AminoAtom {
    /// Atom label, unique within the component (e.g. `CA`)
    pub label: String,
    /// ENZYMIX atom type (e.g. `C0`)
    pub atom_type: String,
    /// Partial charge
    pub charge: f64,
}

/// Electroneutral group: atoms whose charges should add up to an integer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AminoGroup {
    /// Labels of the member atoms
    pub labels: Vec<String>,
}

/// A residue or component of the library.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AminoComponent {
    /// Serial number in the library
    pub serial: u32,
    /// Residue name (e.g. `ALA`)
    pub name: String,
    /// Optional free-text title following the name
    pub title: String,
    /// Atoms in library order
    pub atoms: Vec<AminoAtom>,
    /// Bonds as pairs of atom labels
    pub bonds: Vec<(String, String)>,
    /// Connection serials
    pub connect: Vec<i32>,
    /// Electroneutral groups
    pub groups: Vec<AminoGroup>,
}

impl AminoComponent {
    /// Total charge of the component.
    pub fn total_charge(&self) -> f64 {
        self.atoms.iter().map(|a| a.charge).sum()
    }

    /// Zero-based index of the atom with `label`.
    pub fn atom_index(&self, label: &str) -> Option<usize> {
        self.atoms.iter().position(|a| a.label == label)
    }

    /// Atom with `label`, or [`ParseError::AtomNotFound`].
    pub fn atom(&self, label: &str) -> Result<&AminoAtom> {
        self.atom_index(label)
            .map(|i| &self.atoms[i])
            .ok_or_else(|| ParseError::AtomNotFound {
                atom: label.to_string(),
                context: self.name.clone(),
            })
    }

    /// Sum of the charges of a group's atoms.
    pub fn group_charge(&self, group: &AminoGroup) -> f64 {
        group
            .labels
            .iter()
            .filter_map(|label| self.atom_index(label))
            .map(|i| self.atoms[i].charge)
            .sum()
    }

    /// Distance of every group charge from the nearest integer, by group index.
    pub fn group_charge_deviations(&self) -> Vec<(usize, f64)> {
        self.groups
            .iter()
            .enumerate()
            .map(|(i, group)| {
                let charge = self.group_charge(group);
                (i, (charge - charge.round()).abs())
            })
            .collect()
    }

    /// Groups whose charge is further than `tolerance` from an integer.
    pub fn unbalanced_groups(&self, tolerance: f64) -> Vec<usize> {
        self.group_charge_deviations()
            .into_iter()
            .filter(|&(_, deviation)| deviation > tolerance)
            .map(|(i, _)| i)
            .collect()
    }

    /// Replaces all atomic charges, in atom order.
    ///
    /// Fails with [`ParseError::ChargeCountMismatch`] when the number of
    /// charges differs from the number of atoms; the component is left
    /// untouched in that case.
    pub fn assign_charges(&mut self, charges: &[f64]) -> Result<()> {
        if charges.len() != self.atoms.len() {
            return Err(ParseError::ChargeCountMismatch {
                context: self.name.clone(),
                expected: self.atoms.len(),
                found: charges.len(),
            });
        }
        for (atom, &charge) in self.atoms.iter_mut().zip(charges) {
            atom.charge = charge;
        }
        Ok(())
    }

    /// Renders this component in library format.
    ///
    /// Bonds and groups are written by atom serial; a label that no longer
    /// names an atom of the component fails with [`ParseError::AtomNotFound`].
    pub fn render(&self) -> Result<String> {
        let mut out = String::new();
        if self.title.is_empty() {
            let _ = writeln!(out, "{:>4}{}", self.serial, self.name);
        } else {
            let _ = writeln!(out, "{:>4}{}  {}", self.serial, self.name, self.title);
        }

        let _ = writeln!(out, "{:>5}  ! Number of atoms", self.atoms.len());
        for (i, atom) in self.atoms.iter().enumerate() {
            let _ = writeln!(
                out,
                "{:>5}  {:<5} {:<5} {:>8.4}",
                i + 1,
                atom.label,
                atom.atom_type,
                atom.charge
            );
        }

        let _ = writeln!(out, "{:>5}  ! Number of bonds", self.bonds.len());
        for (a, b) in &self.bonds {
            let _ = writeln!(out, "{:>5}{:>5}", self.serial_of(a)?, self.serial_of(b)?);
        }

        let _ = writeln!(out, "{:>5}  ! Number of connections", self.connect.len());
        for serial in &self.connect {
            let _ = writeln!(out, "{:>5}", serial);
        }

        let _ = writeln!(out, "{:>5}  ! Number of electroneutral groups", self.groups.len());
        for group in &self.groups {
            let _ = write!(out, "{:>5}", group.labels.len());
            for label in &group.labels {
                let _ = write!(out, "{:>5}", self.serial_of(label)?);
            }
            out.push('\n');
        }
        let _ = writeln!(out, "{}", DIVIDER);
        Ok(out)
    }

    /// Writes this component alone in library format.
    pub fn write(&self, path: &Path) -> Result<()> {
        fs::write(path, self.render()?)?;
        Ok(())
    }

    fn serial_of(&self, label: &str) -> Result<usize> {
        self.atom_index(label)
            .map(|i| i + 1)
            .ok_or_else(|| ParseError::AtomNotFound {
                atom: label.to_string(),
                context: self.name.clone(),
            })
    }
}

/// A parsed amino-acid library.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AminoLibrary {
    /// Components in file order
    pub components: Vec<AminoComponent>,
}

impl AminoLibrary {
    /// Number of components.
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// True when the library has no components.
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Component by name (case-insensitive).
    pub fn get(&self, name: &str) -> Option<&AminoComponent> {
        self.components
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Mutable component by name (case-insensitive).
    pub fn get_mut(&mut self, name: &str) -> Option<&mut AminoComponent> {
        self.components
            .iter_mut()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Renders every component in Molaris format.
    pub fn render(&self) -> Result<String> {
        let mut out = String::new();
        for component in &self.components {
            out.push_str(&component.render()?);
        }
        Ok(out)
    }

    /// Writes the library in Molaris format.
    pub fn write(&self, path: &Path) -> Result<()> {
        fs::write(path, self.render()?)?;
        info!("Wrote {} components to {}", self.len(), path.display());
        Ok(())
    }
}

impl TextFormat for AminoLibrary {
    const DESCRIPTION: &'static str = "amino-acid library";

    fn parse(text: &str) -> Result<Self> {
        let mut cursor = LineCursor::new(text).with_comment('!');
        let mut components = Vec::new();

        while let Some(line) = cursor.next_significant() {
            if line.trim_start().starts_with("---") {
                continue;
            }
            let caps = HEADER_RE.captures(line).ok_or_else(|| {
                ParseError::Parse(format!(
                    "line {}: expected component header, found '{}'",
                    cursor.line_number(),
                    line.trim()
                ))
            })?;
            let serial = caps[1].parse().map_err(|_| {
                ParseError::Parse(format!(
                    "line {}: invalid component serial '{}'",
                    cursor.line_number(),
                    &caps[1]
                ))
            })?;
            let component = read_component(
                &mut cursor,
                serial,
                caps[2].to_string(),
                caps[3].trim().to_string(),
            )?;
            for group in component.unbalanced_groups(GROUP_CHARGE_TOLERANCE) {
                warn!(
                    "{}: group {} has non-integral charge {:.4}",
                    component.name,
                    group + 1,
                    component.group_charge(&component.groups[group])
                );
            }
            components.push(component);
        }

        info!("Parsed {} components", components.len());
        Ok(Self { components })
    }
}

fn read_component(
    cursor: &mut LineCursor<'_>,
    serial: u32,
    name: String,
    title: String,
) -> Result<AminoComponent> {
    let section = |what: &str| format!("{} of component {}", what, name);

    // serial in file -> label
    let mut labels: HashMap<i64, String> = HashMap::new();
    let resolve = |labels: &HashMap<i64, String>, serial: i64| -> Result<String> {
        labels
            .get(&serial)
            .cloned()
            .ok_or_else(|| ParseError::AtomNotFound {
                atom: serial.to_string(),
                context: name.clone(),
            })
    };

    let n_atoms = cursor.expect_count(&section("atom count"))?;
    let mut atoms = Vec::new();
    for _ in 0..n_atoms {
        let fields = cursor.expect_fields(&ATOM, &section("atoms"))?;
        let (atom_serial, atom) = cursor.at_line(amino_atom(&fields))?;
        labels.insert(atom_serial, atom.label.clone());
        atoms.push(atom);
    }

    let n_bonds = cursor.expect_count(&section("bond count"))?;
    let mut bonds = Vec::new();
    for _ in 0..n_bonds {
        let fields = cursor.expect_fields(&PAIR, &section("bonds"))?;
        let a = cursor.at_line(fields.int(0))?;
        let b = cursor.at_line(fields.int(1))?;
        bonds.push((resolve(&labels, a)?, resolve(&labels, b)?));
    }

    let n_connect = cursor.expect_count(&section("connection count"))?;
    let mut connect = Vec::new();
    for _ in 0..n_connect {
        let fields = cursor.expect_fields(&SINGLE, &section("connections"))?;
        let value = cursor.at_line(fields.int(0))?;
        let value = i32::try_from(value).map_err(|_| {
            ParseError::Parse(format!(
                "line {}: connection serial {} out of range",
                cursor.line_number(),
                value
            ))
        })?;
        connect.push(value);
    }

    let n_groups = cursor.expect_count(&section("group count"))?;
    let mut groups = Vec::new();
    for _ in 0..n_groups {
        let line = cursor.expect_significant(&section("groups"))?;
        let size = cursor.at_line(cursor.fields(&SINGLE, line)?.usize(0))?;
        // size column followed by `size` serials
        let listed = cursor.at_line(tokenize_line(line, None, None, false))?.len() - 1;
        if listed < size {
            return Err(ParseError::Parse(format!(
                "line {}: group of {} atoms lists {} serials",
                cursor.line_number(),
                size,
                listed
            )));
        }
        let group_line = LineTokenizer::new(&vec![Converter::Int; size + 1]);
        let fields = cursor.fields(&group_line, line)?;
        let mut members = Vec::new();
        for i in 1..=size {
            let serial = cursor.at_line(fields.int(i))?;
            members.push(resolve(&labels, serial)?);
        }
        groups.push(AminoGroup { labels: members });
    }

    Ok(AminoComponent {
        serial,
        name,
        title,
        atoms,
        bonds,
        connect,
        groups,
    })
}

fn amino_atom(fields: &Fields) -> std::result::Result<(i64, AminoAtom), TokenizeError> {
    Ok((
        fields.int(0)?,
        AminoAtom {
            label: fields.text(1)?.to_string(),
            atom_type: fields.text(2)?.to_string(),
            charge: fields.float(3)?,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const WATER: &str = "\
! test library
   1HOH  Water
    3  ! Number of atoms
    1  OW    O3     -0.8000
    2  HW1   H3      0.4000
    3  HW2   H3      0.4000
    2  ! Number of bonds
    1    2
    1    3
    0  ! Number of connections
    1  ! Number of electroneutral groups
    3    1    2    3
------------------------------------------------------------
";

    #[test]
    fn test_parse_single_component() {
        let library = AminoLibrary::parse(WATER).unwrap();
        assert_eq!(library.len(), 1);
        let water = library.get("hoh").unwrap();
        assert_eq!(water.serial, 1);
        assert_eq!(water.title, "Water");
        assert_eq!(water.atoms.len(), 3);
        assert_eq!(water.bonds[1], ("OW".to_string(), "HW2".to_string()));
        assert!(water.connect.is_empty());
        assert_eq!(water.groups[0].labels, vec!["OW", "HW1", "HW2"]);
        assert!(water.total_charge().abs() < 1e-9);
        assert!(water.unbalanced_groups(GROUP_CHARGE_TOLERANCE).is_empty());
    }

    #[test]
    fn test_bond_to_unknown_serial() {
        let broken = WATER.replace("    1    3\n", "    1    7\n");
        match AminoLibrary::parse(&broken) {
            Err(ParseError::AtomNotFound { atom, context }) => {
                assert_eq!(atom, "7");
                assert_eq!(context, "HOH");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_short_group_line() {
        let broken = WATER.replace("    3    1    2    3\n", "    3    1    2\n");
        assert!(matches!(
            AminoLibrary::parse(&broken),
            Err(ParseError::Parse(_))
        ));
    }

    #[test]
    fn test_truncated_component() {
        let truncated: String = WATER.lines().take(5).map(|l| format!("{}\n", l)).collect();
        assert!(matches!(
            AminoLibrary::parse(&truncated),
            Err(ParseError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn test_assign_charges() {
        let mut library = AminoLibrary::parse(WATER).unwrap();
        let water = library.get_mut("HOH").unwrap();
        assert!(matches!(
            water.assign_charges(&[0.1, 0.2]),
            Err(ParseError::ChargeCountMismatch { expected: 3, found: 2, .. })
        ));
        water.assign_charges(&[-0.834, 0.417, 0.417]).unwrap();
        assert!((water.atom("HW1").unwrap().charge - 0.417).abs() < 1e-12);
        assert!(water.atom("XX").is_err());
    }

    #[test]
    fn test_unbalanced_group_detected() {
        let mut library = AminoLibrary::parse(WATER).unwrap();
        let water = library.get_mut("HOH").unwrap();
        water.assign_charges(&[-0.8, 0.45, 0.4]).unwrap();
        assert_eq!(water.unbalanced_groups(GROUP_CHARGE_TOLERANCE), vec![0]);
        let (_, deviation) = water.group_charge_deviations()[0];
        assert!((deviation - 0.05).abs() < 1e-9);
    }

    #[test]
    fn test_display_round_trip() {
        let library = AminoLibrary::parse(WATER).unwrap();
        let reparsed = AminoLibrary::parse(&library.render().unwrap()).unwrap();
        assert_eq!(reparsed.components, library.components);
    }

    #[test]
    fn test_render_rejects_dangling_label() {
        let mut library = AminoLibrary::parse(WATER).unwrap();
        let water = library.get_mut("HOH").unwrap();
        water.atoms[1].label = "H1".to_string();
        match water.render() {
            Err(ParseError::AtomNotFound { atom, context }) => {
                assert_eq!(atom, "HW1");
                assert_eq!(context, "HOH");
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(library.render().is_err());
    }

    #[test]
    fn test_huge_counts_are_errors() {
        let atoms = "   1ALA\n 999999999999999999  ! Number of atoms\n    1  N  N0  -0.5\n";
        assert!(matches!(
            AminoLibrary::parse(atoms),
            Err(ParseError::UnexpectedEof { .. })
        ));

        let group = WATER.replace("    3    1    2    3\n", " 999999999999999999    1    2    3\n");
        assert!(matches!(AminoLibrary::parse(&group), Err(ParseError::Parse(_))));
    }
}
