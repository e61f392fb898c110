//! Generic line tokenizer shared by every format parser.
//!
//! Each parser in this crate describes a line declaratively, as an ordered
//! list of [`Converter`]s (one per expected column), instead of splitting and
//! casting fields by hand. The tokenizer then:
//!
//! 1. splits the line on whitespace, or on an explicit separator,
//! 2. optionally reverses the token order,
//! 3. pads with `None` when there are fewer tokens than converters,
//! 4. drops tokens beyond the converter count,
//! 5. applies each converter to its token.
//!
//! An empty line yields no tokens at all, which callers treat as the end of
//! a section.
//!
//! # Examples
//!
//! ```
//! use mtools::tokenize::{tokenize_line, Converter, Token};
//!
//! let tokens = tokenize_line(
//!     "1 2.5 foo",
//!     Some(&[Converter::Int, Converter::Float, Converter::Raw]),
//!     None,
//!     false,
//! )
//! .unwrap();
//! assert_eq!(
//!     tokens,
//!     vec![
//!         Some(Token::Int(1)),
//!         Some(Token::Float(2.5)),
//!         Some(Token::Text("foo".to_string())),
//!     ]
//! );
//! ```

use std::fmt;
use thiserror::Error;

/// Error raised while converting or reading tokenized fields.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TokenizeError {
    /// A converter rejected its token
    #[error("field {index}: cannot convert '{token}' to {expected}")]
    Conversion {
        /// Zero-based field index
        index: usize,
        /// The offending token
        token: String,
        /// Human-readable name of the expected type
        expected: &'static str,
    },
    /// The field was padded because the line was too short
    #[error("field {index} is missing")]
    Missing {
        /// Zero-based field index
        index: usize,
    },
    /// The field holds a value of another type
    #[error("field {index} is not {expected}")]
    WrongType {
        /// Zero-based field index
        index: usize,
        /// Human-readable name of the requested type
        expected: &'static str,
    },
}

/// A converted field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Integer column
    Int(i64),
    /// Floating-point column
    Float(f64),
    /// Raw or cleaned-up text column
    Text(String),
}

impl Token {
    /// Returns the integer value, if this is an integer token.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Token::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value as `f64`; integer tokens are widened.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Token::Float(v) => Some(*v),
            Token::Int(v) => Some(*v as f64),
            Token::Text(_) => None,
        }
    }

    /// Returns the text, if this is a text token.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Token::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Int(v) => write!(f, "{}", v),
            Token::Float(v) => write!(f, "{}", v),
            Token::Text(s) => f.write_str(s),
        }
    }
}

/// Conversion applied to one column.
#[derive(Debug, Clone, Copy)]
pub enum Converter {
    /// Pass the token through unchanged
    Raw,
    /// Parse a signed integer
    Int,
    /// Parse a float; Fortran `D` exponents are accepted
    Float,
    /// Apply an arbitrary unary function, `None` marks a conversion failure
    Custom(fn(&str) -> Option<Token>),
}

impl Converter {
    fn expected(&self) -> &'static str {
        match self {
            Converter::Raw => "text",
            Converter::Int => "integer",
            Converter::Float => "float",
            Converter::Custom(_) => "custom value",
        }
    }

    /// Converts a single token, reporting `index` on failure.
    pub fn convert(&self, index: usize, token: &str) -> Result<Token, TokenizeError> {
        let converted = match self {
            Converter::Raw => Some(Token::Text(token.to_string())),
            Converter::Int => token.parse::<i64>().ok().map(Token::Int),
            Converter::Float => parse_float(token).map(Token::Float),
            Converter::Custom(f) => f(token),
        };
        converted.ok_or_else(|| TokenizeError::Conversion {
            index,
            token: token.to_string(),
            expected: self.expected(),
        })
    }
}

/// Parses a finite float, accepting Fortran-style exponents (`1.5D-03`).
///
/// `nan`, `inf` and values that overflow to infinity are rejected.
pub fn parse_float(token: &str) -> Option<f64> {
    let value = match token.parse::<f64>() {
        Ok(v) => Some(v),
        Err(_) if token.contains(['D', 'd']) => token.replace(['D', 'd'], "E").parse().ok(),
        Err(_) => None,
    };
    value.filter(|v| v.is_finite())
}

/// Splits `line` into typed fields.
///
/// * `converters` - one converter per expected field; `None` returns every
///   token as raw text without padding or truncation
/// * `separator` - split character; `None` splits on runs of whitespace
/// * `reverse` - reverse the token order before conversion
///
/// Returns an empty vector for an empty or all-whitespace line.
pub fn tokenize_line(
    line: &str,
    converters: Option<&[Converter]>,
    separator: Option<char>,
    reverse: bool,
) -> Result<Vec<Option<Token>>, TokenizeError> {
    if line.trim().is_empty() {
        return Ok(Vec::new());
    }
    let mut tokens: Vec<&str> = match separator {
        None => line.split_whitespace().collect(),
        Some(sep) => line.split(sep).map(str::trim).collect(),
    };
    if reverse {
        tokens.reverse();
    }

    let Some(converters) = converters else {
        return Ok(tokens
            .into_iter()
            .map(|t| Some(Token::Text(t.to_string())))
            .collect());
    };

    converters
        .iter()
        .enumerate()
        .map(|(index, converter)| match tokens.get(index) {
            Some(token) => converter.convert(index, token).map(Some),
            None => Ok(None),
        })
        .collect()
}

/// A reusable, pre-configured tokenizer.
///
/// ```
/// use mtools::tokenize::{Converter, LineTokenizer};
///
/// let tokenizer = LineTokenizer::new(&[Converter::Raw, Converter::Float]).separator('=');
/// let fields = tokenizer.fields(" E(RHF) = -76.0107").unwrap().unwrap();
/// assert_eq!(fields.float(1).unwrap(), -76.0107);
/// ```
#[derive(Debug, Clone)]
pub struct LineTokenizer {
    converters: Vec<Converter>,
    separator: Option<char>,
    reverse: bool,
}

impl LineTokenizer {
    /// Creates a whitespace-splitting tokenizer for the given columns.
    pub fn new(converters: &[Converter]) -> Self {
        Self {
            converters: converters.to_vec(),
            separator: None,
            reverse: false,
        }
    }

    /// Splits on `sep` instead of whitespace.
    pub fn separator(mut self, sep: char) -> Self {
        self.separator = Some(sep);
        self
    }

    /// Reverses token order before conversion.
    pub fn reversed(mut self) -> Self {
        self.reverse = true;
        self
    }

    /// Tokenizes `line` with this configuration.
    pub fn tokenize(&self, line: &str) -> Result<Vec<Option<Token>>, TokenizeError> {
        tokenize_line(line, Some(&self.converters), self.separator, self.reverse)
    }

    /// Tokenizes `line` into [`Fields`]; `Ok(None)` for an empty line.
    pub fn fields(&self, line: &str) -> Result<Option<Fields>, TokenizeError> {
        let tokens = self.tokenize(line)?;
        if tokens.is_empty() {
            Ok(None)
        } else {
            Ok(Some(Fields(tokens)))
        }
    }
}

/// A tokenized line with typed accessors.
#[derive(Debug, Clone, PartialEq)]
pub struct Fields(Vec<Option<Token>>);

impl Fields {
    /// Number of columns, padded ones included.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when the line produced no columns.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of columns actually present on the line.
    pub fn present(&self) -> usize {
        self.0.iter().filter(|t| t.is_some()).count()
    }

    /// Raw access to a column.
    pub fn get(&self, index: usize) -> Option<&Token> {
        self.0.get(index).and_then(Option::as_ref)
    }

    fn require(&self, index: usize) -> Result<&Token, TokenizeError> {
        self.get(index).ok_or(TokenizeError::Missing { index })
    }

    /// Integer column.
    pub fn int(&self, index: usize) -> Result<i64, TokenizeError> {
        self.require(index)?.as_int().ok_or(TokenizeError::WrongType {
            index,
            expected: "an integer",
        })
    }

    /// Non-negative integer column.
    pub fn usize(&self, index: usize) -> Result<usize, TokenizeError> {
        usize::try_from(self.int(index)?).map_err(|_| TokenizeError::WrongType {
            index,
            expected: "a non-negative integer",
        })
    }

    /// Float column; integer columns are widened.
    pub fn float(&self, index: usize) -> Result<f64, TokenizeError> {
        self.require(index)?.as_float().ok_or(TokenizeError::WrongType {
            index,
            expected: "a number",
        })
    }

    /// Text column.
    pub fn text(&self, index: usize) -> Result<&str, TokenizeError> {
        self.require(index)?.as_str().ok_or(TokenizeError::WrongType {
            index,
            expected: "text",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw3() -> [Converter; 3] {
        [Converter::Raw, Converter::Raw, Converter::Raw]
    }

    fn text(s: &str) -> Option<Token> {
        Some(Token::Text(s.to_string()))
    }

    #[test]
    fn test_typed_tuple() {
        let tokens = tokenize_line(
            "1 2.5 foo",
            Some(&[Converter::Int, Converter::Float, Converter::Raw]),
            None,
            false,
        )
        .unwrap();
        assert_eq!(
            tokens,
            vec![Some(Token::Int(1)), Some(Token::Float(2.5)), text("foo")]
        );
    }

    #[test]
    fn test_reverse() {
        let tokens = tokenize_line("a b c", Some(&raw3()), None, true).unwrap();
        assert_eq!(tokens, vec![text("c"), text("b"), text("a")]);
    }

    #[test]
    fn test_padding_and_truncation() {
        let padded = tokenize_line("a", Some(&raw3()), None, false).unwrap();
        assert_eq!(padded, vec![text("a"), None, None]);

        let truncated = tokenize_line("a b c d e", Some(&raw3()), None, false).unwrap();
        assert_eq!(truncated, vec![text("a"), text("b"), text("c")]);
    }

    #[test]
    fn test_empty_line_yields_nothing() {
        assert!(tokenize_line("", Some(&raw3()), None, false).unwrap().is_empty());
        assert!(tokenize_line("   \t ", None, Some(','), false).unwrap().is_empty());
    }

    #[test]
    fn test_no_converters_returns_all_tokens() {
        let tokens = tokenize_line("x y z w", None, None, false).unwrap();
        assert_eq!(tokens.len(), 4);
        assert_eq!(tokens[3], text("w"));
    }

    #[test]
    fn test_separator_trims_tokens() {
        let tokens = tokenize_line(" 1.0 , 2 ,abc", Some(&[Converter::Float, Converter::Int, Converter::Raw]), Some(','), false).unwrap();
        assert_eq!(
            tokens,
            vec![Some(Token::Float(1.0)), Some(Token::Int(2)), text("abc")]
        );
    }

    #[test]
    fn test_conversion_error_names_field() {
        let err = tokenize_line("1 x", Some(&[Converter::Int, Converter::Float]), None, false)
            .unwrap_err();
        assert_eq!(
            err,
            TokenizeError::Conversion {
                index: 1,
                token: "x".to_string(),
                expected: "float"
            }
        );
        assert!(err.to_string().contains("field 1"));
    }

    #[test]
    fn test_custom_converter() {
        fn upper(s: &str) -> Option<Token> {
            Some(Token::Text(s.to_uppercase()))
        }
        let tokens = tokenize_line("ca", Some(&[Converter::Custom(upper)]), None, false).unwrap();
        assert_eq!(tokens, vec![text("CA")]);
    }

    #[test]
    fn test_fortran_exponent() {
        assert_eq!(parse_float("1.5D-03"), Some(1.5e-3));
        assert_eq!(parse_float("-2.0d+01"), Some(-20.0));
        assert_eq!(parse_float("abc"), None);
    }

    #[test]
    fn test_non_finite_floats_rejected() {
        assert_eq!(parse_float("nan"), None);
        assert_eq!(parse_float("-inf"), None);
        assert_eq!(parse_float("1.0D+400"), None);
        let err = tokenize_line("2 nan", Some(&[Converter::Int, Converter::Float]), None, false)
            .unwrap_err();
        assert!(matches!(err, TokenizeError::Conversion { index: 1, .. }));
    }

    #[test]
    fn test_fields_accessors() {
        let tokenizer = LineTokenizer::new(&[Converter::Int, Converter::Raw, Converter::Float]);
        let fields = tokenizer.fields("   7  CA").unwrap().unwrap();
        assert_eq!(fields.int(0).unwrap(), 7);
        assert_eq!(fields.usize(0).unwrap(), 7);
        assert_eq!(fields.text(1).unwrap(), "CA");
        assert_eq!(fields.float(2), Err(TokenizeError::Missing { index: 2 }));
        assert!(fields.int(1).is_err());
        assert_eq!(fields.present(), 2);
        assert!(tokenizer.fields("").unwrap().is_none());
    }
}
