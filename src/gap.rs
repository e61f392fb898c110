//! Molaris energy-gap (`gap.out`) and distance (`dist.dat`) trajectories.
//!
//! Both files hold one record per saved simulation step: an integer step
//! number followed by a fixed number of floating-point columns. `#` starts
//! a comment line.
//!
//! ```text
//! #  step        E1          E2
//!       1    -12.500      35.250
//!       2    -12.310      34.980
//! ```

use crate::parser::{LineCursor, ParseError, Result, TextFormat};
use crate::tokenize::{tokenize_line, Converter, Fields, LineTokenizer, TokenizeError};
use log::info;
use serde::Serialize;

/// One step of `gap.out`: diabatic state energies in kcal/mol.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GapStep {
    /// Simulation step
    pub step: i64,
    /// Energy of each diabatic state
    pub energies: Vec<f64>,
}

impl GapStep {
    /// Energy gap `E2 - E1`.
    pub fn gap(&self) -> f64 {
        self.energies[1] - self.energies[0]
    }
}

/// One step of `dist.dat`: monitored distances in Angstroms.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistanceStep {
    /// Simulation step
    pub step: i64,
    /// Monitored distances
    pub distances: Vec<f64>,
}

/// Parsed `gap.out`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GapFile {
    /// Steps in file order
    pub steps: Vec<GapStep>,
}

impl GapFile {
    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// True when no steps were read.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Number of diabatic states per step.
    pub fn states(&self) -> usize {
        self.steps.first().map_or(0, |s| s.energies.len())
    }

    /// Energy gap of every step.
    pub fn gaps(&self) -> Vec<f64> {
        self.steps.iter().map(GapStep::gap).collect()
    }

    /// Mean energy gap, `None` for an empty file.
    pub fn mean_gap(&self) -> Option<f64> {
        mean(&self.gaps())
    }
}

/// Parsed `dist.dat`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DistanceFile {
    /// Steps in file order
    pub steps: Vec<DistanceStep>,
}

impl DistanceFile {
    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// True when no steps were read.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Number of distance columns.
    pub fn columns(&self) -> usize {
        self.steps.first().map_or(0, |s| s.distances.len())
    }

    /// The `index`-th distance over the whole trajectory.
    pub fn series(&self, index: usize) -> Option<Vec<f64>> {
        (index < self.columns())
            .then(|| self.steps.iter().map(|s| s.distances[index]).collect())
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

fn step_tokenizer(width: usize) -> LineTokenizer {
    let mut converters = vec![Converter::Int];
    converters.extend(std::iter::repeat(Converter::Float).take(width.saturating_sub(1)));
    LineTokenizer::new(&converters)
}

fn step_values(fields: &Fields) -> std::result::Result<(i64, Vec<f64>), TokenizeError> {
    let step = fields.int(0)?;
    let mut values = Vec::new();
    for index in 1..fields.len() {
        if fields.get(index).is_none() {
            break;
        }
        values.push(fields.float(index)?);
    }
    Ok((step, values))
}

/// Reads `step v1 v2 ...` rows, requiring at least `min_columns` values and
/// the same column count on every row.
fn read_steps(text: &str, section: &str, min_columns: usize) -> Result<Vec<(i64, Vec<f64>)>> {
    let mut cursor = LineCursor::new(text).with_comment('#');
    let mut rows: Vec<(i64, Vec<f64>)> = Vec::new();
    while let Some(line) = cursor.next_significant() {
        // one step column, every remaining token is a value
        let width = cursor.at_line(tokenize_line(line, None, None, false))?.len();
        let fields = cursor.fields(&step_tokenizer(width), line)?;
        let (step, values) = cursor.at_line(step_values(&fields))?;
        let expected = rows.first().map_or(values.len().max(min_columns), |r| r.1.len());
        if values.len() != expected {
            return Err(ParseError::Parse(format!(
                "line {}: {} expects {} value columns, found {}",
                cursor.line_number(),
                section,
                expected,
                values.len()
            )));
        }
        rows.push((step, values));
    }
    info!("Read {} {} steps", rows.len(), section);
    Ok(rows)
}

impl TextFormat for GapFile {
    const DESCRIPTION: &'static str = "energy gap file";

    fn parse(text: &str) -> Result<Self> {
        let steps = read_steps(text, "gap file", 2)?
            .into_iter()
            .map(|(step, energies)| GapStep { step, energies })
            .collect();
        Ok(Self { steps })
    }
}

impl TextFormat for DistanceFile {
    const DESCRIPTION: &'static str = "distance file";

    fn parse(text: &str) -> Result<Self> {
        let steps = read_steps(text, "distance file", 1)?
            .into_iter()
            .map(|(step, distances)| DistanceStep { step, distances })
            .collect();
        Ok(Self { steps })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gap_statistics() {
        let text = "#  step   E1   E2\n 1  -10.0  20.0\n 2  -12.0  22.0\n\n 3  -11.0  19.0\n";
        let gap = GapFile::parse(text).unwrap();
        assert_eq!(gap.len(), 3);
        assert_eq!(gap.states(), 2);
        assert_eq!(gap.gaps(), vec![30.0, 34.0, 30.0]);
        assert!((gap.mean_gap().unwrap() - 94.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_gap_needs_two_states() {
        assert!(matches!(
            GapFile::parse("1 -10.0\n"),
            Err(ParseError::Parse(_))
        ));
        assert_eq!(GapFile::parse("# empty\n").unwrap().mean_gap(), None);
    }

    #[test]
    fn test_inconsistent_columns() {
        let err = DistanceFile::parse("1 1.0 2.0\n2 1.1\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_distance_series() {
        let dist = DistanceFile::parse("10 1.50 2.75\n20 1.55 2.70\n").unwrap();
        assert_eq!(dist.columns(), 2);
        assert_eq!(dist.series(1), Some(vec![2.75, 2.70]));
        assert_eq!(dist.series(2), None);
        assert_eq!(dist.steps[1].step, 20);
    }

    #[test]
    fn test_bad_value_reports_line() {
        match DistanceFile::parse("1 1.0\n2 abc\n") {
            Err(ParseError::Line { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_wide_rows_keep_every_column() {
        let row = |step: i64| {
            let values: Vec<String> = (0..20).map(|i| format!("{}.5", i)).collect();
            format!("{} {}\n", step, values.join(" "))
        };
        let dist = DistanceFile::parse(&(row(1) + &row(2))).unwrap();
        assert_eq!(dist.columns(), 20);
        assert_eq!(dist.series(19), Some(vec![19.5, 19.5]));

        // A row with one extra column is an error, not a silent truncation
        let ragged = row(1) + &row(2).replace("\n", " 20.5\n");
        let err = DistanceFile::parse(&ragged).unwrap_err();
        assert!(err.to_string().contains("found 21"), "{}", err);
    }
}
