//! Shared scanning machinery for the format parsers.
//!
//! Every parser in this crate follows the same shape: walk the file line by
//! line, dispatch on literal marker text, and on a match read a fixed window
//! (or a counted block) of following lines through the [`tokenize`]
//! module. This module provides the pieces they share:
//!
//! - [`ParseError`]: the common error type, carrying line numbers
//! - [`LineCursor`]: a line iterator that turns truncation into
//!   [`ParseError::UnexpectedEof`] instead of a silent stop
//! - [`TextFormat`]: the trait every parsed file type implements
//! - counted-section helpers for the Molaris library files, whose sections
//!   start with a `<KEYWORD> <count>` header
//!
//! [`tokenize`]: crate::tokenize

use crate::tokenize::{Converter, Fields, LineTokenizer, TokenizeError};
use lazy_static::lazy_static;
use log::debug;
use std::fs;
use std::iter::Enumerate;
use std::path::Path;
use std::str::Lines;
use thiserror::Error;

/// Error type for parsing operations.
#[derive(Error, Debug)]
pub enum ParseError {
    /// I/O error when reading files
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// A field on a given line could not be converted
    #[error("line {line}: {source}")]
    Line {
        /// One-based line number
        line: usize,
        /// Underlying tokenizer failure
        #[source]
        source: TokenizeError,
    },
    /// The input ended in the middle of a section
    #[error("unexpected end of file while reading {section}")]
    UnexpectedEof {
        /// Description of the section being read
        section: String,
    },
    /// An atom reference does not resolve
    #[error("atom {atom} not found in {context}")]
    AtomNotFound {
        /// The unresolved label or serial
        atom: String,
        /// Component or record that was searched
        context: String,
    },
    /// A list of charges does not match the number of atoms
    #[error("{context}: expected {expected} charges, got {found}")]
    ChargeCountMismatch {
        /// Component or molecule being updated
        context: String,
        /// Number of atoms
        expected: usize,
        /// Number of charges supplied
        found: usize,
    },
    /// Structural error with descriptive message
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Type alias for parse operation results
pub type Result<T> = std::result::Result<T, ParseError>;

/// A file type that can be parsed from text.
///
/// Implementors only provide [`TextFormat::parse`]; reading from disk is
/// shared.
pub trait TextFormat: Sized {
    /// Short description used in log messages
    const DESCRIPTION: &'static str;

    /// Parses the complete file content.
    fn parse(text: &str) -> Result<Self>;

    /// Reads and parses a file.
    fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        debug!("Parsing {} from {}", Self::DESCRIPTION, path.display());
        Self::parse(&text)
    }
}

/// Line iterator with line numbers and section-aware helpers.
pub struct LineCursor<'a> {
    lines: Enumerate<Lines<'a>>,
    line_no: usize,
    comment: Option<char>,
}

impl<'a> LineCursor<'a> {
    /// Creates a cursor over `text`.
    pub fn new(text: &'a str) -> Self {
        Self {
            lines: text.lines().enumerate(),
            line_no: 0,
            comment: None,
        }
    }

    /// Lines whose first non-blank character is `comment` are skipped by
    /// the `*_significant` helpers.
    pub fn with_comment(mut self, comment: char) -> Self {
        self.comment = Some(comment);
        self
    }

    /// One-based number of the line most recently returned.
    pub fn line_number(&self) -> usize {
        self.line_no
    }

    fn is_insignificant(&self, line: &str) -> bool {
        let trimmed = line.trim_start();
        trimmed.is_empty() || self.comment.is_some_and(|c| trimmed.starts_with(c))
    }

    /// Next line that is neither blank nor a comment.
    pub fn next_significant(&mut self) -> Option<&'a str> {
        while let Some(line) = self.next() {
            if !self.is_insignificant(line) {
                return Some(line);
            }
        }
        None
    }

    /// Next line, or [`ParseError::UnexpectedEof`] naming `section`.
    pub fn expect_line(&mut self, section: &str) -> Result<&'a str> {
        self.next().ok_or_else(|| eof(section))
    }

    /// Next significant line, or [`ParseError::UnexpectedEof`].
    pub fn expect_significant(&mut self, section: &str) -> Result<&'a str> {
        self.next_significant().ok_or_else(|| eof(section))
    }

    /// Skips `n` lines unconditionally.
    pub fn skip(&mut self, n: usize, section: &str) -> Result<()> {
        for _ in 0..n {
            self.expect_line(section)?;
        }
        Ok(())
    }

    /// Attaches the current line number to a tokenizer result.
    pub fn at_line<T>(&self, result: std::result::Result<T, TokenizeError>) -> Result<T> {
        result.map_err(|source| ParseError::Line {
            line: self.line_no,
            source,
        })
    }

    /// Tokenizes `line` (normally the line just returned) with `tokenizer`.
    pub fn fields(&self, tokenizer: &LineTokenizer, line: &str) -> Result<Fields> {
        self.at_line(tokenizer.fields(line))?
            .ok_or_else(|| ParseError::Parse(format!("line {}: unexpected blank line", self.line_no)))
    }

    /// Reads the next significant line and tokenizes it.
    pub fn expect_fields(&mut self, tokenizer: &LineTokenizer, section: &str) -> Result<Fields> {
        let line = self.expect_significant(section)?;
        self.fields(tokenizer, line)
    }

    /// Reads a record count (first integer of the next significant line).
    pub fn expect_count(&mut self, section: &str) -> Result<usize> {
        let fields = self.expect_fields(&COUNT_TOKENIZER, section)?;
        self.at_line(fields.usize(0))
    }
}

impl<'a> Iterator for LineCursor<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let (idx, line) = self.lines.next()?;
        self.line_no = idx + 1;
        Some(line)
    }
}

fn eof(section: &str) -> ParseError {
    ParseError::UnexpectedEof {
        section: section.to_string(),
    }
}

lazy_static! {
    static ref COUNT_TOKENIZER: LineTokenizer = LineTokenizer::new(&[Converter::Int]);
    static ref HEADER_TOKENIZER: LineTokenizer =
        LineTokenizer::new(&[Converter::Raw, Converter::Int]);
}

/// Recognises a `<KEYWORD> <count>` section header.
///
/// The keyword is upper-cased. Anything after the count is ignored.
///
/// ```
/// use mtools::parser::section_header;
///
/// assert_eq!(section_header("bonds 12  ! harmonic"), Some(("BONDS".to_string(), 12)));
/// assert_eq!(section_header("C0 C0 600.0 1.53"), None);
/// ```
pub fn section_header(line: &str) -> Option<(String, usize)> {
    let fields = HEADER_TOKENIZER.fields(line).ok()??;
    let keyword = fields.text(0).ok()?;
    if !keyword.chars().all(|c| c.is_ascii_alphabetic() || c == '_') {
        return None;
    }
    let count = fields.usize(1).ok()?;
    Some((keyword.to_uppercase(), count))
}

/// Walks a file made of counted sections, calling `handle` for each header.
///
/// `handle` receives the upper-cased keyword, the record count and the
/// cursor positioned after the header; it must consume exactly the records.
pub fn scan_counted_sections<'a, F>(text: &'a str, comment: char, mut handle: F) -> Result<()>
where
    F: FnMut(&str, usize, &mut LineCursor<'a>) -> Result<()>,
{
    let mut cursor = LineCursor::new(text).with_comment(comment);
    while let Some(line) = cursor.next_significant() {
        let (keyword, count) = section_header(line).ok_or_else(|| {
            ParseError::Parse(format!(
                "line {}: expected '<SECTION> <count>' header, found '{}'",
                cursor.line_number(),
                line.trim()
            ))
        })?;
        debug!("Section {} with {} records at line {}", keyword, count, cursor.line_number());
        handle(&keyword, count, &mut cursor)?;
    }
    Ok(())
}

/// Reads `count` records with `tokenizer`, building each with `build`.
pub fn read_records<T, F>(
    cursor: &mut LineCursor<'_>,
    count: usize,
    section: &str,
    tokenizer: &LineTokenizer,
    mut build: F,
) -> Result<Vec<T>>
where
    F: FnMut(&Fields) -> std::result::Result<T, TokenizeError>,
{
    let mut records = Vec::new();
    for _ in 0..count {
        let fields = cursor.expect_fields(tokenizer, section)?;
        records.push(cursor.at_line(build(&fields))?);
    }
    Ok(records)
}
