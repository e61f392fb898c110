//! XYZ coordinate files and keyword helpers.
//!
//! XYZ is the plain-text geometry format used throughout the toolkit: an
//! atom count, a comment line, and one `label x y z` line per atom. Several
//! frames written back to back form a trajectory.

use crate::geometry::{Atom, Molecule};
use crate::parser::{LineCursor, ParseError, Result};
use crate::tokenize::{Converter, Fields, LineTokenizer, TokenizeError};
use lazy_static::lazy_static;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

lazy_static! {
    static ref COUNT: LineTokenizer = LineTokenizer::new(&[Converter::Int]);
    static ref XYZ_ATOM: LineTokenizer = LineTokenizer::new(&[
        Converter::Raw,
        Converter::Float,
        Converter::Float,
        Converter::Float,
    ]);
}

/// Formats one XYZ frame.
pub fn format_xyz(molecule: &Molecule) -> String {
    let mut content = format!("{}\n{}\n", molecule.len(), molecule.comment.trim());
    for atom in &molecule.atoms {
        let _ = writeln!(
            content,
            "{:<4} {:>14.8} {:>14.8} {:>14.8}",
            atom.label, atom.position.x, atom.position.y, atom.position.z
        );
    }
    content
}

/// Writes a molecular geometry to an XYZ file.
///
/// # Examples
///
/// ```
/// use mtools::geometry::{Atom, Molecule};
/// use mtools::io;
///
/// let dir = tempfile::tempdir().unwrap();
/// let path = dir.path().join("h2.xyz");
/// let h2 = Molecule::new("H2", vec![Atom::new("H", 0.0, 0.0, 0.0), Atom::new("H", 0.74, 0.0, 0.0)]);
/// io::write_xyz(&h2, &path).unwrap();
/// assert_eq!(io::read_xyz(&path).unwrap().len(), 2);
/// ```
pub fn write_xyz(molecule: &Molecule, path: &Path) -> std::io::Result<()> {
    fs::write(path, format_xyz(molecule))
}

/// Writes several frames to one XYZ trajectory file.
pub fn write_xyz_trajectory(frames: &[Molecule], path: &Path) -> std::io::Result<()> {
    let content: String = frames.iter().map(format_xyz).collect();
    fs::write(path, content)
}

/// Parses every frame of an XYZ (trajectory) text.
pub fn parse_xyz_frames(text: &str) -> Result<Vec<Molecule>> {
    let mut cursor = LineCursor::new(text);
    let mut frames = Vec::new();
    while let Some(line) = cursor.next_significant() {
        let fields = cursor.fields(&COUNT, line)?;
        let count = cursor.at_line(fields.usize(0))?;
        let comment = cursor.expect_line("XYZ comment line")?.trim().to_string();
        let mut atoms = Vec::new();
        for _ in 0..count {
            let fields = cursor.expect_fields(&XYZ_ATOM, "XYZ atom block")?;
            atoms.push(cursor.at_line(xyz_atom(&fields))?);
        }
        frames.push(Molecule::new(comment, atoms));
    }
    Ok(frames)
}

fn xyz_atom(fields: &Fields) -> std::result::Result<Atom, TokenizeError> {
    Ok(Atom::new(
        fields.text(0)?,
        fields.float(1)?,
        fields.float(2)?,
        fields.float(3)?,
    ))
}

/// Reads the first frame of an XYZ file.
pub fn read_xyz(path: &Path) -> Result<Molecule> {
    let text = fs::read_to_string(path)?;
    parse_xyz_frames(&text)?
        .into_iter()
        .next()
        .ok_or_else(|| ParseError::Parse(format!("no XYZ frame in {}", path.display())))
}

/// Reads every frame of an XYZ trajectory file.
pub fn read_xyz_trajectory(path: &Path) -> Result<Vec<Molecule>> {
    let text = fs::read_to_string(path)?;
    parse_xyz_frames(&text)
}

/// Cleans keywords by removing comments and extra whitespace.
///
/// Full-line and inline `!` comments, empty lines and surrounding
/// whitespace are dropped; the remaining keywords are joined with single
/// spaces.
///
/// ```
/// use mtools::io::clean_keywords;
///
/// assert_eq!(clean_keywords("! solvation\nSCF=Tight ! tighter\n\nInt=UltraFine"), "SCF=Tight Int=UltraFine");
/// assert_eq!(clean_keywords("! only a comment"), "");
/// ```
pub fn clean_keywords(keywords: &str) -> String {
    keywords
        .lines()
        .filter_map(|line| {
            let cleaned = match line.find('!') {
                Some(pos) => &line[..pos],
                None => line,
            }
            .trim();
            (!cleaned.is_empty()).then_some(cleaned)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trajectory_frames() {
        let text = "2\nframe 1\nH 0.0 0.0 0.0\nH 0.74 0.0 0.0\n\n2\nframe 2\nH 0.0 0.0 0.0\nH 0.80 0.0 0.0\n";
        let frames = parse_xyz_frames(text).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].comment, "frame 2");
        assert!((frames[1].atoms[1].position.x - 0.80).abs() < 1e-12);
    }

    #[test]
    fn test_truncated_frame() {
        let text = "3\ncomment\nO 0.0 0.0 0.0\nH 1.0 0.0 0.0\n";
        assert!(matches!(
            parse_xyz_frames(text),
            Err(ParseError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn test_huge_atom_count() {
        let text = "999999999999999999\ncomment\nO 0.0 0.0 0.0\n";
        assert!(matches!(
            parse_xyz_frames(text),
            Err(ParseError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn test_format_round_trip() {
        let molecule = Molecule::new(
            "methane carbon",
            vec![Atom::new("C", 0.1, -0.2, 0.3)],
        );
        let frames = parse_xyz_frames(&format_xyz(&molecule)).unwrap();
        assert_eq!(frames[0].atoms[0].label, "C");
        assert!((frames[0].atoms[0].position.z - 0.3).abs() < 1e-8);
    }

    #[test]
    fn test_clean_keywords_whitespace_only() {
        assert_eq!(clean_keywords("   \n\t\n"), "");
        assert_eq!(clean_keywords("Opt\n  Freq  "), "Opt Freq");
    }
}
