#![deny(missing_docs)]

//! mtools - parsers and writers for Molaris-XG QM/MM workflows
//!
//! mtools reads the text files that show up around a Molaris-XG QM/MM or
//! EVB study and writes the inputs that feed the next step:
//!
//! - Molaris libraries: amino-acid residues, ENZYMIX force-field
//!   parameters and EVB parameters
//! - Molaris trajectory output: energy gaps (`gap.out`), monitored distances
//!   (`dist.dat`) and EVB mapping free-energy profiles
//! - Gaussian logs (geometries, SCF energies, Mulliken/ESP charges, forces)
//!   and Gaussian input decks with QM/MM point-charge backgrounds
//! - XYZ geometries and trajectories
//!
//! # Parsing model
//!
//! Every format is read the same way: a linear scan over the lines of the
//! file, dispatching on literal marker text, and reading fixed windows or
//! counted blocks of following lines through a declarative
//! [`tokenize::LineTokenizer`]. Truncated sections and malformed fields are
//! reported as [`parser::ParseError`] values with line numbers; no parser
//! panics on bad input.
//!
//! # Quick Start
//!
//! ```no_run
//! use mtools::library::AminoLibrary;
//! use mtools::parser::TextFormat;
//! use std::path::Path;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let library = AminoLibrary::from_file(Path::new("amino98.lib"))?;
//!     if let Some(ala) = library.get("ALA") {
//!         println!("{} atoms, total charge {:.3}", ala.atoms.len(), ala.total_charge());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! - [`tokenize`](tokenize/index.html) - Declarative line tokenizer
//! - [`parser`](parser/index.html) - Shared scanning machinery and errors
//! - [`geometry`](geometry/index.html) - Atom and molecule records
//! - [`io`](io/index.html) - XYZ files
//! - [`library`](library/index.html) - Amino-acid library
//! - [`parameters`](parameters/index.html) - ENZYMIX parameter library
//! - [`evb_library`](evb_library/index.html) - EVB parameter library
//! - [`gap`](gap/index.html) - Energy-gap and distance trajectories
//! - [`mapping`](mapping/index.html) - Mapping profiles and extrema
//! - [`gaussian`](gaussian/index.html) - Gaussian logs and input decks
//! - [`settings`](settings/index.html) - Configuration files

/// EVB parameter library
pub mod evb_library;
/// Energy-gap and distance trajectories
pub mod gap;
pub mod gaussian;
pub mod geometry;
pub mod io;
pub mod library;
/// EVB mapping profiles
pub mod mapping;
/// ENZYMIX parameter library
pub mod parameters;
pub mod parser;
/// Configuration management system
pub mod settings;
pub mod tokenize;

pub use geometry::{Atom, Molecule};
pub use parser::{ParseError, TextFormat};
