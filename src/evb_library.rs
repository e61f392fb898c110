//! EVB parameter library.
//!
//! Uses the same counted-section layout as the ENZYMIX library
//! ([`crate::parameters`]), with EVB-specific sections:
//!
//! ```text
//! ATOMS 2
//!   H0   H4    0.40
//!   O0   O3   -0.80
//! MORSE 1
//!   H0   O0   102.0   0.96   2.26
//! ANGLES 1
//!   H0   O0   H0    50.0  104.5
//! TORSIONS 0
//! OFFDIAGONAL 1
//!   1   2   35.0   0.0
//! ```
//!
//! `MORSE` records are `type1 type2 D r0 alpha`; `OFFDIAGONAL` records
//! couple two diabatic states with the exponential form `A exp(-mu r)`.

use crate::parameters::{
    angle_record, angle_tokenizer, find_angle, find_torsion, torsion_record, torsion_tokenizer,
    AngleParameter, TorsionParameter,
};
use crate::parser::{read_records, scan_counted_sections, ParseError, Result, TextFormat};
use crate::tokenize::{Converter, Fields, LineTokenizer, TokenizeError};
use lazy_static::lazy_static;
use log::info;
use serde::Serialize;

lazy_static! {
    static ref ATOM: LineTokenizer =
        LineTokenizer::new(&[Converter::Raw, Converter::Raw, Converter::Float]);
    static ref MORSE: LineTokenizer = LineTokenizer::new(&[
        Converter::Raw,
        Converter::Raw,
        Converter::Float,
        Converter::Float,
        Converter::Float,
    ]);
    static ref OFFDIAGONAL: LineTokenizer = LineTokenizer::new(&[
        Converter::Int,
        Converter::Int,
        Converter::Float,
        Converter::Float,
    ]);
}

/// EVB atom type definition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvbAtom {
    /// EVB atom type
    pub evb_type: String,
    /// Corresponding ENZYMIX atom type
    pub enzymix_type: String,
    /// Default charge
    pub charge: f64,
}

/// Morse bond term.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MorseParameter {
    /// EVB atom types
    pub types: (String, String),
    /// Dissociation energy, kcal/mol
    pub d: f64,
    /// Equilibrium length, Å
    pub r0: f64,
    /// Width parameter, 1/Å
    pub alpha: f64,
}

impl MorseParameter {
    /// Morse energy at bond length `r`.
    pub fn energy(&self, r: f64) -> f64 {
        let x = 1.0 - (-self.alpha * (r - self.r0)).exp();
        self.d * x * x
    }
}

/// Off-diagonal coupling between two diabatic states.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OffDiagonal {
    /// State pair (1-based)
    pub states: (u32, u32),
    /// Pre-exponential factor, kcal/mol
    pub a: f64,
    /// Exponent, 1/Å
    pub mu: f64,
}

/// A parsed EVB parameter library.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EvbLibrary {
    /// EVB atom types
    pub atoms: Vec<EvbAtom>,
    /// Morse bonds
    pub morse: Vec<MorseParameter>,
    /// Angles
    pub angles: Vec<AngleParameter>,
    /// Torsions
    pub torsions: Vec<TorsionParameter>,
    /// Off-diagonal couplings
    pub offdiagonal: Vec<OffDiagonal>,
}

impl EvbLibrary {
    /// Total number of entries across all sections.
    pub fn len(&self) -> usize {
        self.atoms.len()
            + self.morse.len()
            + self.angles.len()
            + self.torsions.len()
            + self.offdiagonal.len()
    }

    /// True when the library holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// EVB atom type definition.
    pub fn get_atom(&self, evb_type: &str) -> Option<&EvbAtom> {
        self.atoms.iter().find(|a| a.evb_type == evb_type)
    }

    /// Morse term between `a` and `b`, in either order.
    pub fn get_morse(&self, a: &str, b: &str) -> Option<&MorseParameter> {
        self.morse.iter().find(|p| {
            let (x, y) = (&p.types.0, &p.types.1);
            (x == a && y == b) || (x == b && y == a)
        })
    }

    /// Angle `a-b-c` (or `c-b-a`).
    pub fn get_angle(&self, a: &str, b: &str, c: &str) -> Option<&AngleParameter> {
        find_angle(&self.angles, a, b, c)
    }

    /// Torsion `a-b-c-d`, with wildcard fallback.
    pub fn get_torsion(&self, a: &str, b: &str, c: &str, d: &str) -> Option<&TorsionParameter> {
        find_torsion(&self.torsions, a, b, c, d)
    }

    /// Coupling between states `i` and `j`, in either order.
    pub fn get_offdiagonal(&self, i: u32, j: u32) -> Option<&OffDiagonal> {
        self.offdiagonal
            .iter()
            .find(|o| o.states == (i, j) || o.states == (j, i))
    }
}

fn atom_record(f: &Fields) -> std::result::Result<EvbAtom, TokenizeError> {
    Ok(EvbAtom {
        evb_type: f.text(0)?.to_string(),
        enzymix_type: f.text(1)?.to_string(),
        charge: f.float(2)?,
    })
}

fn morse_record(f: &Fields) -> std::result::Result<MorseParameter, TokenizeError> {
    Ok(MorseParameter {
        types: (f.text(0)?.to_string(), f.text(1)?.to_string()),
        d: f.float(2)?,
        r0: f.float(3)?,
        alpha: f.float(4)?,
    })
}

fn state_index(f: &Fields, index: usize) -> std::result::Result<u32, TokenizeError> {
    u32::try_from(f.int(index)?)
        .ok()
        .filter(|&s| s > 0)
        .ok_or(TokenizeError::WrongType {
            index,
            expected: "a positive state index",
        })
}

fn offdiagonal_record(f: &Fields) -> std::result::Result<OffDiagonal, TokenizeError> {
    Ok(OffDiagonal {
        states: (state_index(f, 0)?, state_index(f, 1)?),
        a: f.float(2)?,
        mu: f.float(3)?,
    })
}

impl TextFormat for EvbLibrary {
    const DESCRIPTION: &'static str = "EVB parameter library";

    fn parse(text: &str) -> Result<Self> {
        let mut library = Self::default();
        scan_counted_sections(text, '!', |keyword, count, cursor| {
            match keyword {
                "ATOMS" => library
                    .atoms
                    .extend(read_records(cursor, count, "ATOMS", &ATOM, atom_record)?),
                "MORSE" => library
                    .morse
                    .extend(read_records(cursor, count, "MORSE", &MORSE, morse_record)?),
                "ANGLES" => library.angles.extend(read_records(
                    cursor,
                    count,
                    "ANGLES",
                    angle_tokenizer(),
                    angle_record,
                )?),
                "TORSIONS" => library.torsions.extend(read_records(
                    cursor,
                    count,
                    "TORSIONS",
                    torsion_tokenizer(),
                    torsion_record,
                )?),
                "OFFDIAGONAL" => library.offdiagonal.extend(read_records(
                    cursor,
                    count,
                    "OFFDIAGONAL",
                    &OFFDIAGONAL,
                    offdiagonal_record,
                )?),
                other => {
                    return Err(ParseError::Parse(format!(
                        "line {}: unknown EVB section '{}'",
                        cursor.line_number(),
                        other
                    )))
                }
            }
            Ok(())
        })?;
        info!("Parsed {} EVB entries", library.len());
        Ok(library)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL: &str = "\
! EVB test library
ATOMS 2
  H0   H4    0.40
  O0   O3   -0.80
MORSE 1
  H0   O0   102.0   0.96   2.26
ANGLES 1
  H0   O0   H0    50.0  104.5
TORSIONS 0
OFFDIAGONAL 1
  1   2   35.0   0.0
";

    #[test]
    fn test_entries() {
        let library = EvbLibrary::parse(SMALL).unwrap();
        assert_eq!(library.len(), 5);
        assert!(library.torsions.is_empty());
        assert_eq!(library.get_atom("O0").unwrap().enzymix_type, "O3");
        assert_eq!(library.get_offdiagonal(2, 1).unwrap().a, 35.0);
        assert!(library.get_angle("H0", "O0", "H0").is_some());
    }

    #[test]
    fn test_morse_energy() {
        let library = EvbLibrary::parse(SMALL).unwrap();
        let morse = library.get_morse("O0", "H0").unwrap();
        assert_eq!(morse.energy(morse.r0), 0.0);
        assert!((morse.energy(100.0) - morse.d).abs() < 1e-6);
    }

    #[test]
    fn test_state_zero_rejected() {
        let err = EvbLibrary::parse("OFFDIAGONAL 1\n 0 1 35.0 0.0\n").unwrap_err();
        assert!(matches!(err, ParseError::Line { line: 2, .. }));
    }
}
