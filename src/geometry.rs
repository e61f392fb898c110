//! Atom and molecule records.
//!
//! - [`Atom`]: label, Cartesian position, optional partial charge and force
//! - [`Molecule`]: ordered atoms plus a free-text comment
//!
//! Positions are in Angstroms, forces in Hartree/Bohr (as printed by
//! Gaussian), charges in units of the elementary charge.

use nalgebra::Vector3;
use serde::Serialize;

const ELEMENTS: [&str; 118] = [
    "H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne", "Na", "Mg", "Al", "Si", "P", "S", "Cl",
    "Ar", "K", "Ca", "Sc", "Ti", "V", "Cr", "Mn", "Fe", "Co", "Ni", "Cu", "Zn", "Ga", "Ge", "As",
    "Se", "Br", "Kr", "Rb", "Sr", "Y", "Zr", "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd", "In",
    "Sn", "Sb", "Te", "I", "Xe", "Cs", "Ba", "La", "Ce", "Pr", "Nd", "Pm", "Sm", "Eu", "Gd", "Tb",
    "Dy", "Ho", "Er", "Tm", "Yb", "Lu", "Hf", "Ta", "W", "Re", "Os", "Ir", "Pt", "Au", "Hg", "Tl",
    "Pb", "Bi", "Po", "At", "Rn", "Fr", "Ra", "Ac", "Th", "Pa", "U", "Np", "Pu", "Am", "Cm", "Bk",
    "Cf", "Es", "Fm", "Md", "No", "Lr", "Rf", "Db", "Sg", "Bh", "Hs", "Mt", "Ds", "Rg", "Cn", "Nh",
    "Fl", "Mc", "Lv", "Ts", "Og",
];

/// Element symbol for an atomic number; `"X"` when out of range.
pub fn atomic_number_to_symbol(num: usize) -> &'static str {
    match num {
        1..=118 => ELEMENTS[num - 1],
        _ => "X",
    }
}

/// Atomic number for an exact element symbol (case-sensitive, e.g. `"Cl"`).
pub fn symbol_to_atomic_number(symbol: &str) -> Option<usize> {
    ELEMENTS.iter().position(|&e| e == symbol).map(|i| i + 1)
}

/// Guesses the element symbol from an atom label such as `"C1"`, `"Cl2"`
/// or `"HW"`.
///
/// A two-letter symbol is only taken when the second letter is lowercase,
/// so all-caps labels (`"CA"`, `"HB2"`) resolve to their first letter.
pub fn element_from_label(label: &str) -> Option<&'static str> {
    let letters: Vec<char> = label.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
    let first = letters.first()?.to_ascii_uppercase();
    if let Some(&second) = letters.get(1) {
        if second.is_ascii_lowercase() {
            let symbol: String = [first, second].iter().collect();
            if let Some(z) = symbol_to_atomic_number(&symbol) {
                return Some(ELEMENTS[z - 1]);
            }
        }
    }
    symbol_to_atomic_number(&first.to_string()).map(|z| ELEMENTS[z - 1])
}

/// A single atom as read from any of the supported formats.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Atom {
    /// Element symbol or force-field atom label
    pub label: String,
    /// Cartesian position in Angstroms
    pub position: Vector3<f64>,
    /// Partial charge, when the source provides one
    pub charge: Option<f64>,
    /// Force vector in Hartree/Bohr, when the source provides one
    pub force: Option<Vector3<f64>>,
}

impl Atom {
    /// Creates an atom without charge or force.
    pub fn new(label: impl Into<String>, x: f64, y: f64, z: f64) -> Self {
        Self {
            label: label.into(),
            position: Vector3::new(x, y, z),
            charge: None,
            force: None,
        }
    }

    /// Returns the atom with `charge` attached.
    pub fn with_charge(mut self, charge: f64) -> Self {
        self.charge = Some(charge);
        self
    }

    /// Element symbol guessed from the label.
    pub fn element(&self) -> Option<&'static str> {
        element_from_label(&self.label)
    }

    /// Atomic number guessed from the label.
    pub fn atomic_number(&self) -> Option<usize> {
        self.element().and_then(symbol_to_atomic_number)
    }

    /// Distance to another atom in Angstroms.
    pub fn distance(&self, other: &Atom) -> f64 {
        (self.position - other.position).norm()
    }
}

/// An ordered collection of atoms, e.g. one frame of a trajectory.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Molecule {
    /// Free-text comment (XYZ title line)
    pub comment: String,
    /// Atoms in file order
    pub atoms: Vec<Atom>,
}

impl Molecule {
    /// Creates a molecule from atoms.
    pub fn new(comment: impl Into<String>, atoms: Vec<Atom>) -> Self {
        Self {
            comment: comment.into(),
            atoms,
        }
    }

    /// Number of atoms.
    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    /// True when there are no atoms.
    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// Sum of the defined partial charges.
    pub fn total_charge(&self) -> f64 {
        self.atoms.iter().filter_map(|a| a.charge).sum()
    }

    /// Sum of atomic numbers, or `None` if any label is not an element.
    pub fn nuclear_charge(&self) -> Option<usize> {
        self.atoms.iter().map(Atom::atomic_number).sum()
    }

    /// Geometric center of the atoms.
    pub fn centroid(&self) -> Vector3<f64> {
        if self.atoms.is_empty() {
            return Vector3::zeros();
        }
        let sum: Vector3<f64> = self.atoms.iter().map(|a| a.position).sum();
        sum / self.atoms.len() as f64
    }
}
