//! Gaussian log reader and input-deck writer.
//!
//! [`GaussianLog`] collects what the QM/MM workflow needs from a Gaussian
//! output file:
//!
//! - every `Input orientation` / `Standard orientation` block, one geometry
//!   frame each
//! - `SCF Done` energies, in Hartree
//! - the last Mulliken and ESP (CHELPG or Merz-Kollman) charge blocks
//! - the last `Forces (Hartrees/Bohr)` block
//! - whether the run reached `Normal termination`
//!
//! [`GaussianInput`] renders a single-point input deck, optionally with a
//! background of point charges for QM/MM electrostatic embedding. Running
//! Gaussian itself is left to the caller.
//!
//! # Examples
//!
//! ```
//! use mtools::gaussian::{ChargeScheme, GaussianInput};
//! use mtools::geometry::{Atom, Molecule};
//!
//! let water = Molecule::new("water", vec![
//!     Atom::new("O", 0.0, 0.0, 0.119),
//!     Atom::new("H", 0.0, 0.763, -0.477),
//!     Atom::new("H", 0.0, -0.763, -0.477),
//! ]);
//! let mut input = GaussianInput::new(&water);
//! input.charge_scheme = ChargeScheme::Chelpg;
//! let deck = input.render().unwrap();
//! assert!(deck.contains("# B3LYP/6-31G* NoSymm Pop=CHELPG"));
//! ```

use crate::geometry::{atomic_number_to_symbol, Atom, Molecule};
use crate::io::clean_keywords;
use crate::parser::{LineCursor, ParseError, Result, TextFormat};
use crate::tokenize::{Converter, Fields, LineTokenizer, TokenizeError};
use lazy_static::lazy_static;
use log::{debug, info, warn};
use nalgebra::Vector3;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

lazy_static! {
    // Robust floating-point regex: handles 1.23, -0.032, 1.2e-4, .123, etc.
    static ref FLOAT_RE: String = r"[-+]?(?:\d+\.\d*|\.\d+)(?:[eEdD][-+]?\d+)?".to_string();

    // " SCF Done:  E(RB3LYP) =  -76.4089533     A.U. after   10 cycles"
    static ref SCF_DONE_RE: Regex = Regex::new(&format!(
        r"SCF Done:\s+E\((\S+)\)\s*=\s*({0})",
        *FLOAT_RE
    ))
    .unwrap();

    // " 1  8  0   0.000000   0.000000   0.119262"
    static ref ORIENTATION_ROW: LineTokenizer = LineTokenizer::new(&[
        Converter::Int,
        Converter::Int,
        Converter::Int,
        Converter::Float,
        Converter::Float,
        Converter::Float,
    ]);

    // " 1  O   -0.834131"
    static ref CHARGE_ROW: LineTokenizer =
        LineTokenizer::new(&[Converter::Int, Converter::Raw, Converter::Float]);

    // " 1  8   0.000000000   0.000000000  -0.005373183"
    static ref FORCE_ROW: LineTokenizer = LineTokenizer::new(&[
        Converter::Int,
        Converter::Int,
        Converter::Float,
        Converter::Float,
        Converter::Float,
    ]);
}

/// Partial-charge scheme requested from / read back from Gaussian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChargeScheme {
    /// Mulliken population analysis (always printed)
    #[default]
    Mulliken,
    /// ESP fit on the CHELPG grid
    Chelpg,
    /// ESP fit on the Merz-Kollman grid
    MerzKollman,
}

impl ChargeScheme {
    /// Route keyword requesting this scheme, if any.
    pub fn route_keyword(&self) -> Option<&'static str> {
        match self {
            ChargeScheme::Mulliken => None,
            ChargeScheme::Chelpg => Some("Pop=CHELPG"),
            ChargeScheme::MerzKollman => Some("Pop=MK"),
        }
    }

    /// True for the ESP-fitted schemes.
    pub fn is_esp(&self) -> bool {
        !matches!(self, ChargeScheme::Mulliken)
    }
}

impl FromStr for ChargeScheme {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mulliken" => Ok(ChargeScheme::Mulliken),
            "chelpg" | "esp" => Ok(ChargeScheme::Chelpg),
            "mk" | "merz-kollman" | "merzkollman" => Ok(ChargeScheme::MerzKollman),
            other => Err(format!(
                "unknown charge scheme '{}' (expected mulliken, chelpg or mk)",
                other
            )),
        }
    }
}

/// Data read from a Gaussian log file.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GaussianLog {
    /// `Input orientation` frames, in file order
    pub input_frames: Vec<Molecule>,
    /// `Standard orientation` frames, in file order
    pub standard_frames: Vec<Molecule>,
    /// `SCF Done` energies, Hartree
    pub scf_energies: Vec<f64>,
    /// Last Mulliken charge block
    pub mulliken_charges: Option<Vec<f64>>,
    /// Last ESP charge block
    pub esp_charges: Option<Vec<f64>>,
    /// Last force block, Hartree/Bohr
    pub forces: Option<Vec<Vector3<f64>>>,
    /// The run ended with `Normal termination`
    pub normal_termination: bool,
}

impl GaussianLog {
    /// Geometry frames in the orientation forces and charges refer to.
    ///
    /// Input orientation when printed, otherwise standard orientation.
    pub fn frames(&self) -> &[Molecule] {
        if self.input_frames.is_empty() {
            &self.standard_frames
        } else {
            &self.input_frames
        }
    }

    /// Last SCF energy.
    pub fn final_energy(&self) -> Option<f64> {
        self.scf_energies.last().copied()
    }

    /// Charges of `scheme`; both ESP schemes read the `ESP charges` block.
    pub fn charges(&self, scheme: ChargeScheme) -> Option<&[f64]> {
        if scheme.is_esp() {
            self.esp_charges.as_deref()
        } else {
            self.mulliken_charges.as_deref()
        }
    }

    /// Last geometry with forces and, when `scheme` is given, charges.
    pub fn final_molecule(&self, scheme: Option<ChargeScheme>) -> Result<Molecule> {
        let mut molecule = self
            .frames()
            .last()
            .cloned()
            .ok_or_else(|| ParseError::Parse("no geometry in Gaussian log".to_string()))?;

        if let Some(scheme) = scheme {
            let charges = self.charges(scheme).ok_or_else(|| {
                ParseError::Parse(format!("no {:?} charges in Gaussian log", scheme))
            })?;
            if charges.len() != molecule.len() {
                return Err(ParseError::ChargeCountMismatch {
                    context: "Gaussian log".to_string(),
                    expected: molecule.len(),
                    found: charges.len(),
                });
            }
            for (atom, &q) in molecule.atoms.iter_mut().zip(charges) {
                atom.charge = Some(q);
            }
        }

        match &self.forces {
            Some(forces) if forces.len() == molecule.len() => {
                for (atom, f) in molecule.atoms.iter_mut().zip(forces) {
                    atom.force = Some(*f);
                }
            }
            Some(forces) => warn!(
                "Ignoring {} forces for a {}-atom geometry",
                forces.len(),
                molecule.len()
            ),
            None => {}
        }
        Ok(molecule)
    }
}

fn orientation_atom(f: &Fields) -> std::result::Result<Atom, TokenizeError> {
    let z = f.usize(1)?;
    Ok(Atom::new(
        atomic_number_to_symbol(z),
        f.float(3)?,
        f.float(4)?,
        f.float(5)?,
    ))
}

fn force_row(f: &Fields) -> std::result::Result<Vector3<f64>, TokenizeError> {
    Ok(Vector3::new(f.float(2)?, f.float(3)?, f.float(4)?))
}

fn is_rule(line: &str) -> bool {
    line.trim_start().starts_with("---")
}

/// Reads rows after `header_lines` until a dashed rule.
fn read_table<T>(
    cursor: &mut LineCursor<'_>,
    section: &str,
    header_lines: usize,
    tokenizer: &LineTokenizer,
    build: fn(&Fields) -> std::result::Result<T, TokenizeError>,
) -> Result<Vec<T>> {
    cursor.skip(header_lines, section)?;
    let mut rows = Vec::new();
    loop {
        let line = cursor.expect_line(section)?;
        if is_rule(line) {
            return Ok(rows);
        }
        let fields = cursor.fields(tokenizer, line)?;
        rows.push(cursor.at_line(build(&fields))?);
    }
}

/// Reads a charge block up to its `Sum of ...` line.
fn read_charges(cursor: &mut LineCursor<'_>, section: &str) -> Result<Vec<f64>> {
    cursor.skip(1, section)?;
    let mut charges = Vec::new();
    loop {
        let line = cursor.expect_line(section)?;
        if line.trim_start().starts_with("Sum of") {
            return Ok(charges);
        }
        let fields = cursor.fields(&CHARGE_ROW, line)?;
        charges.push(cursor.at_line(fields.float(2))?);
    }
}

impl TextFormat for GaussianLog {
    const DESCRIPTION: &'static str = "Gaussian log";

    fn parse(text: &str) -> Result<Self> {
        let mut log = Self::default();
        let mut cursor = LineCursor::new(text);
        while let Some(line) = cursor.next() {
            let trimmed = line.trim_start();
            if line.contains("Input orientation:") {
                let atoms = read_table(&mut cursor, "input orientation", 4, &ORIENTATION_ROW, orientation_atom)?;
                let comment = format!("Input orientation {}", log.input_frames.len() + 1);
                log.input_frames.push(Molecule::new(comment, atoms));
            } else if line.contains("Standard orientation:") {
                let atoms = read_table(&mut cursor, "standard orientation", 4, &ORIENTATION_ROW, orientation_atom)?;
                let comment = format!("Standard orientation {}", log.standard_frames.len() + 1);
                log.standard_frames.push(Molecule::new(comment, atoms));
            } else if let Some(caps) = SCF_DONE_RE.captures(line) {
                let energy = crate::tokenize::parse_float(&caps[2]).ok_or_else(|| {
                    ParseError::Parse(format!("line {}: bad SCF energy", cursor.line_number()))
                })?;
                debug!("SCF energy E({}) = {}", &caps[1], energy);
                log.scf_energies.push(energy);
            } else if trimmed.starts_with("Mulliken charges:")
                || trimmed.starts_with("Mulliken atomic charges:")
                || trimmed.starts_with("Mulliken charges and spin densities:")
            {
                log.mulliken_charges = Some(read_charges(&mut cursor, "Mulliken charges")?);
            } else if trimmed.starts_with("ESP charges:") {
                log.esp_charges = Some(read_charges(&mut cursor, "ESP charges")?);
            } else if line.contains("Forces (Hartrees/Bohr)") {
                log.forces = Some(read_table(&mut cursor, "forces", 2, &FORCE_ROW, force_row)?);
            } else if line.contains("Normal termination of Gaussian") {
                log.normal_termination = true;
            }
        }

        if !log.normal_termination {
            warn!("Gaussian log has no normal termination line");
        }
        info!(
            "Gaussian log: {} frames, {} SCF energies",
            log.frames().len(),
            log.scf_energies.len()
        );
        Ok(log)
    }
}

/// Error type for input-deck generation.
#[derive(Error, Debug)]
pub enum WriteError {
    /// I/O error when writing the deck
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Nothing to write
    #[error("input has no atoms")]
    NoAtoms,
    /// An atom label does not map to an element
    #[error("cannot determine the element of atom '{0}'")]
    UnknownElement(String),
    /// Multiplicity is zero or inconsistent with the electron count
    #[error("multiplicity {multiplicity} is impossible with {electrons} electrons")]
    InvalidMultiplicity {
        /// Requested spin multiplicity
        multiplicity: u32,
        /// Electron count implied by the atoms and total charge
        electrons: i64,
    },
}

/// A Gaussian single-point input deck.
#[derive(Debug, Clone)]
pub struct GaussianInput {
    /// QM atoms
    pub atoms: Vec<Atom>,
    /// Title line
    pub title: String,
    /// Method, e.g. `B3LYP`
    pub method: String,
    /// Basis set, e.g. `6-31G*`
    pub basis: String,
    /// Total charge of the QM region
    pub charge: i32,
    /// Spin multiplicity
    pub multiplicity: u32,
    /// Population analysis to request
    pub charge_scheme: ChargeScheme,
    /// Implicit solvent for `SCRF`
    pub solvent: Option<String>,
    /// Checkpoint file name
    pub checkpoint: Option<String>,
    /// `%mem` value
    pub mem: String,
    /// `%nprocshared` value
    pub nprocs: usize,
    /// Background point charges: position (Angstrom) and charge
    pub point_charges: Vec<(Vector3<f64>, f64)>,
    /// Extra route keywords; `!` comments are stripped
    pub extra_keywords: String,
}

impl GaussianInput {
    /// Creates a B3LYP/6-31G* singlet deck for `molecule`.
    pub fn new(molecule: &Molecule) -> Self {
        let title = if molecule.comment.trim().is_empty() {
            "mtools".to_string()
        } else {
            molecule.comment.trim().to_string()
        };
        Self {
            atoms: molecule.atoms.clone(),
            title,
            method: "B3LYP".to_string(),
            basis: "6-31G*".to_string(),
            charge: 0,
            multiplicity: 1,
            charge_scheme: ChargeScheme::Mulliken,
            solvent: None,
            checkpoint: None,
            mem: "1GB".to_string(),
            nprocs: 1,
            point_charges: Vec::new(),
            extra_keywords: String::new(),
        }
    }

    /// Number of electrons implied by the atoms and the total charge.
    pub fn electrons(&self) -> std::result::Result<i64, WriteError> {
        let mut nuclear = 0i64;
        for atom in &self.atoms {
            let z = atom
                .atomic_number()
                .ok_or_else(|| WriteError::UnknownElement(atom.label.clone()))?;
            nuclear += z as i64;
        }
        Ok(nuclear - i64::from(self.charge))
    }

    /// Checks atoms, charge and multiplicity.
    pub fn validate(&self) -> std::result::Result<(), WriteError> {
        if self.atoms.is_empty() {
            return Err(WriteError::NoAtoms);
        }
        let electrons = self.electrons()?;
        let unpaired = i64::from(self.multiplicity) - 1;
        if self.multiplicity == 0 || electrons < 0 || unpaired > electrons || (electrons - unpaired) % 2 != 0 {
            return Err(WriteError::InvalidMultiplicity {
                multiplicity: self.multiplicity,
                electrons,
            });
        }
        Ok(())
    }

    /// The `#` route line.
    pub fn route(&self) -> String {
        let mut route = format!("# {}/{} NoSymm", self.method, self.basis);
        if let Some(keyword) = self.charge_scheme.route_keyword() {
            route.push(' ');
            route.push_str(keyword);
        }
        if let Some(solvent) = &self.solvent {
            let _ = write!(route, " SCRF=(Solvent={})", solvent);
        }
        if !self.point_charges.is_empty() {
            route.push_str(" Charge");
        }
        let extra = clean_keywords(&self.extra_keywords);
        if !extra.is_empty() {
            route.push(' ');
            route.push_str(&extra);
        }
        route
    }

    /// Renders the complete deck.
    pub fn render(&self) -> std::result::Result<String, WriteError> {
        self.validate()?;
        let mut deck = String::new();
        if let Some(chk) = &self.checkpoint {
            let _ = writeln!(deck, "%chk={}", chk);
        }
        let _ = writeln!(deck, "%mem={}", self.mem);
        let _ = writeln!(deck, "%nprocshared={}", self.nprocs);
        let _ = writeln!(deck, "{}\n\n{}\n", self.route(), self.title);
        let _ = writeln!(deck, "{} {}", self.charge, self.multiplicity);
        for atom in &self.atoms {
            let symbol = atom
                .element()
                .ok_or_else(|| WriteError::UnknownElement(atom.label.clone()))?;
            let p = atom.position;
            let _ = writeln!(deck, "{:<2}  {:>14.8}  {:>14.8}  {:>14.8}", symbol, p.x, p.y, p.z);
        }
        deck.push('\n');
        if !self.point_charges.is_empty() {
            for (p, q) in &self.point_charges {
                let _ = writeln!(deck, "{:>14.8}  {:>14.8}  {:>14.8}  {:>10.6}", p.x, p.y, p.z, q);
            }
            deck.push('\n');
        }
        Ok(deck)
    }

    /// Writes the deck to `path`.
    pub fn write(&self, path: &Path) -> std::result::Result<(), WriteError> {
        let deck = self.render()?;
        fs::write(path, deck)?;
        info!("Wrote Gaussian input {}", path.display());
        Ok(())
    }
}
