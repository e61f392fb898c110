//! ENZYMIX force-field parameter library.
//!
//! The file is a sequence of counted sections. Each section starts with a
//! `<KEYWORD> <count>` header and is followed by exactly `count` records:
//!
//! ```text
//! BONDS 2
//!   C0  C0    600.0   1.530
//!   C0  H4    660.0   1.090
//! ANGLES 1
//!   H4  C0  H4    70.0  109.5
//! TORSIONS 1
//!   X   C0  C0  X    3   1.40   0.0
//! IMPROPERS 1
//!   C2  O1    60.0   0.0
//! VDW 2
//!   C0   1500.0   24.0   12.011
//!   H4     18.0    1.0    1.008
//! ```
//!
//! Torsion records may use `X` as a wildcard for the terminal types.

use crate::parser::{read_records, scan_counted_sections, ParseError, Result, TextFormat};
use crate::tokenize::{Converter, Fields, LineTokenizer, TokenizeError};
use lazy_static::lazy_static;
use log::info;
use serde::Serialize;

/// Wildcard atom type in torsion records.
pub const WILDCARD: &str = "X";

lazy_static! {
    static ref BOND: LineTokenizer = LineTokenizer::new(&[
        Converter::Raw,
        Converter::Raw,
        Converter::Float,
        Converter::Float,
    ]);
    static ref ANGLE: LineTokenizer = LineTokenizer::new(&[
        Converter::Raw,
        Converter::Raw,
        Converter::Raw,
        Converter::Float,
        Converter::Float,
    ]);
    static ref TORSION: LineTokenizer = LineTokenizer::new(&[
        Converter::Raw,
        Converter::Raw,
        Converter::Raw,
        Converter::Raw,
        Converter::Int,
        Converter::Float,
        Converter::Float,
    ]);
    static ref IMPROPER: LineTokenizer = LineTokenizer::new(&[
        Converter::Raw,
        Converter::Raw,
        Converter::Float,
        Converter::Float,
    ]);
    static ref VDW: LineTokenizer = LineTokenizer::new(&[
        Converter::Raw,
        Converter::Float,
        Converter::Float,
        Converter::Float,
    ]);
}

/// Harmonic bond term.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BondParameter {
    /// Atom types
    pub types: (String, String),
    /// Force constant, kcal/(mol Å²)
    pub k: f64,
    /// Equilibrium length, Å
    pub r0: f64,
}

/// Harmonic angle term.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AngleParameter {
    /// Atom types, central type in the middle
    pub types: (String, String, String),
    /// Force constant, kcal/(mol rad²)
    pub k: f64,
    /// Equilibrium angle, degrees
    pub theta0: f64,
}

/// Periodic torsion term.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TorsionParameter {
    /// Atom types; the outer two may be [`WILDCARD`]
    pub types: [String; 4],
    /// Periodicity
    pub periodicity: u32,
    /// Barrier height, kcal/mol
    pub k: f64,
    /// Phase, degrees
    pub phase: f64,
}

/// Improper torsion term, keyed by the central bond types.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImproperParameter {
    /// Central atom types
    pub types: (String, String),
    /// Force constant
    pub k: f64,
    /// Equilibrium improper angle, degrees
    pub phi0: f64,
}

/// Van der Waals parameters of one atom type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VdwParameter {
    /// Atom type
    pub atom_type: String,
    /// Repulsive coefficient (A)
    pub repulsive: f64,
    /// Attractive coefficient (B)
    pub attractive: f64,
    /// Atomic mass
    pub mass: f64,
}

pub(crate) fn bond_record(f: &Fields) -> std::result::Result<BondParameter, TokenizeError> {
    Ok(BondParameter {
        types: (f.text(0)?.to_string(), f.text(1)?.to_string()),
        k: f.float(2)?,
        r0: f.float(3)?,
    })
}

pub(crate) fn angle_record(f: &Fields) -> std::result::Result<AngleParameter, TokenizeError> {
    Ok(AngleParameter {
        types: (
            f.text(0)?.to_string(),
            f.text(1)?.to_string(),
            f.text(2)?.to_string(),
        ),
        k: f.float(3)?,
        theta0: f.float(4)?,
    })
}

pub(crate) fn torsion_record(f: &Fields) -> std::result::Result<TorsionParameter, TokenizeError> {
    let periodicity = u32::try_from(f.int(4)?).map_err(|_| TokenizeError::WrongType {
        index: 4,
        expected: "a non-negative periodicity",
    })?;
    Ok(TorsionParameter {
        types: [
            f.text(0)?.to_string(),
            f.text(1)?.to_string(),
            f.text(2)?.to_string(),
            f.text(3)?.to_string(),
        ],
        periodicity,
        k: f.float(5)?,
        phase: f.float(6)?,
    })
}

pub(crate) fn angle_tokenizer() -> &'static LineTokenizer {
    &ANGLE
}

pub(crate) fn torsion_tokenizer() -> &'static LineTokenizer {
    &TORSION
}

fn improper_record(f: &Fields) -> std::result::Result<ImproperParameter, TokenizeError> {
    Ok(ImproperParameter {
        types: (f.text(0)?.to_string(), f.text(1)?.to_string()),
        k: f.float(2)?,
        phi0: f.float(3)?,
    })
}

fn vdw_record(f: &Fields) -> std::result::Result<VdwParameter, TokenizeError> {
    Ok(VdwParameter {
        atom_type: f.text(0)?.to_string(),
        repulsive: f.float(1)?,
        attractive: f.float(2)?,
        mass: f.float(3)?,
    })
}

/// Looks up an angle matching `a-b-c` or `c-b-a`.
pub(crate) fn find_angle<'p>(
    angles: &'p [AngleParameter],
    a: &str,
    b: &str,
    c: &str,
) -> Option<&'p AngleParameter> {
    angles.iter().find(|p| {
        let (x, y, z) = (&p.types.0, &p.types.1, &p.types.2);
        y == b && ((x == a && z == c) || (x == c && z == a))
    })
}

fn torsion_matches(types: &[String; 4], query: [&str; 4], wildcards: bool) -> bool {
    types
        .iter()
        .zip(query)
        .all(|(t, q)| t == q || (wildcards && t == WILDCARD))
}

/// Looks up a torsion: exact match in either direction first, then wildcard
/// terminal types.
pub(crate) fn find_torsion<'p>(
    torsions: &'p [TorsionParameter],
    a: &str,
    b: &str,
    c: &str,
    d: &str,
) -> Option<&'p TorsionParameter> {
    let forward = [a, b, c, d];
    let backward = [d, c, b, a];
    [false, true].into_iter().find_map(|wildcards| {
        torsions.iter().find(|p| {
            torsion_matches(&p.types, forward, wildcards)
                || torsion_matches(&p.types, backward, wildcards)
        })
    })
}

/// A parsed ENZYMIX parameter library.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ParametersLibrary {
    /// Bond terms
    pub bonds: Vec<BondParameter>,
    /// Angle terms
    pub angles: Vec<AngleParameter>,
    /// Torsion terms
    pub torsions: Vec<TorsionParameter>,
    /// Improper terms
    pub impropers: Vec<ImproperParameter>,
    /// Van der Waals terms
    pub vdw: Vec<VdwParameter>,
}

impl ParametersLibrary {
    /// Total number of parameters across all sections.
    pub fn len(&self) -> usize {
        self.bonds.len()
            + self.angles.len()
            + self.torsions.len()
            + self.impropers.len()
            + self.vdw.len()
    }

    /// True when the library holds no parameters.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bond between types `a` and `b`, in either order.
    pub fn get_bond(&self, a: &str, b: &str) -> Option<&BondParameter> {
        self.bonds.iter().find(|p| {
            let (x, y) = (&p.types.0, &p.types.1);
            (x == a && y == b) || (x == b && y == a)
        })
    }

    /// Angle `a-b-c` with `b` central; the reversed order `c-b-a` matches
    /// the same record.
    pub fn get_angle(&self, a: &str, b: &str, c: &str) -> Option<&AngleParameter> {
        find_angle(&self.angles, a, b, c)
    }

    /// Torsion `a-b-c-d`, falling back to wildcard terminal types.
    pub fn get_torsion(&self, a: &str, b: &str, c: &str, d: &str) -> Option<&TorsionParameter> {
        find_torsion(&self.torsions, a, b, c, d)
    }

    /// Improper term for the central pair `a-b`, in either order.
    pub fn get_improper(&self, a: &str, b: &str) -> Option<&ImproperParameter> {
        self.impropers.iter().find(|p| {
            let (x, y) = (&p.types.0, &p.types.1);
            (x == a && y == b) || (x == b && y == a)
        })
    }

    /// Van der Waals parameters of `atom_type`.
    pub fn get_vdw(&self, atom_type: &str) -> Option<&VdwParameter> {
        self.vdw.iter().find(|p| p.atom_type == atom_type)
    }
}

impl TextFormat for ParametersLibrary {
    const DESCRIPTION: &'static str = "ENZYMIX parameter library";

    fn parse(text: &str) -> Result<Self> {
        let mut library = Self::default();
        scan_counted_sections(text, '!', |keyword, count, cursor| {
            match keyword {
                "BONDS" => library
                    .bonds
                    .extend(read_records(cursor, count, "BONDS", &BOND, bond_record)?),
                "ANGLES" => library
                    .angles
                    .extend(read_records(cursor, count, "ANGLES", &ANGLE, angle_record)?),
                "TORSIONS" => library.torsions.extend(read_records(
                    cursor,
                    count,
                    "TORSIONS",
                    &TORSION,
                    torsion_record,
                )?),
                "IMPROPERS" => library.impropers.extend(read_records(
                    cursor,
                    count,
                    "IMPROPERS",
                    &IMPROPER,
                    improper_record,
                )?),
                "VDW" => library
                    .vdw
                    .extend(read_records(cursor, count, "VDW", &VDW, vdw_record)?),
                other => {
                    return Err(ParseError::Parse(format!(
                        "line {}: unknown parameter section '{}'",
                        cursor.line_number(),
                        other
                    )))
                }
            }
            Ok(())
        })?;
        info!(
            "Parsed {} parameters ({} bonds, {} angles, {} torsions, {} impropers, {} vdw)",
            library.len(),
            library.bonds.len(),
            library.angles.len(),
            library.torsions.len(),
            library.impropers.len(),
            library.vdw.len()
        );
        Ok(library)
    }
}
