//! EVB/FEP mapping free-energy profiles and their extrema.
//!
//! A Molaris mapping run reports the diabatic free energy `dGg` as a
//! function of the energy gap, binned along the gap coordinate:
//!
//! ```text
//!  bin     gap        dGg    points
//!    1  -150.00      0.000      120
//!    2  -140.00     -1.250      310
//! ```
//!
//! [`EvbMapping::calculate_extrema`] fits a least-squares polynomial to the
//! profile and locates its stationary points inside the sampled gap range,
//! which gives the reactant and product minima and the transition-state
//! maximum.
//!
//! The fit works on a normalised coordinate `t = (gap - shift) / scale`
//! with `t` in `[-1, 1]`, which keeps the Vandermonde matrix well
//! conditioned for the large gap values (hundreds of kcal/mol) that Molaris
//! produces.

use crate::parser::{LineCursor, ParseError, TextFormat};
use crate::tokenize::{Converter, Fields, LineTokenizer, TokenizeError};
use lazy_static::lazy_static;
use log::{debug, info};
use nalgebra::{DMatrix, DVector};
use serde::Serialize;
use std::path::Path;
use thiserror::Error;

/// Number of samples used to bracket stationary points.
const SCAN_SAMPLES: usize = 2000;
/// Bisection steps per bracketed root.
const BISECTION_STEPS: usize = 60;
/// Relative singular-value cutoff for the least-squares solve.
const SVD_EPS: f64 = 1e-12;
/// Iteration cap for the SVD.
const SVD_MAX_ITERATIONS: usize = 10_000;

lazy_static! {
    static ref ROW: LineTokenizer = LineTokenizer::new(&[
        Converter::Int,
        Converter::Float,
        Converter::Float,
        Converter::Int,
    ]);
}

/// Error type for mapping analysis.
#[derive(Error, Debug)]
pub enum MappingError {
    /// Not enough samples for the requested polynomial degree
    #[error("{points} points are not enough for a degree {degree} fit")]
    TooFewPoints {
        /// Number of usable points
        points: usize,
        /// Requested degree
        degree: usize,
    },
    /// The least-squares system is rank deficient
    #[error("polynomial fit is singular: {0}")]
    Singular(String),
    /// The mapping file could not be read
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// One bin of the mapping profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MappingPoint {
    /// Bin index
    pub bin: i64,
    /// Energy gap at the bin center, kcal/mol
    pub gap: f64,
    /// Diabatic free energy, kcal/mol
    pub dg: f64,
    /// Number of samples in the bin
    pub points: i64,
}

/// Stationary point type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExtremumKind {
    /// Local minimum
    Minimum,
    /// Local maximum
    Maximum,
}

/// A stationary point of the fitted profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Extremum {
    /// Energy gap of the stationary point
    pub gap: f64,
    /// Fitted free energy at `gap`
    pub value: f64,
    /// Minimum or maximum
    pub kind: ExtremumKind,
}

/// Activation and reaction free energies read off the fitted profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReactionProfile {
    /// Reactant minimum
    pub reactant: Extremum,
    /// Transition-state maximum
    pub transition: Extremum,
    /// Product minimum
    pub product: Extremum,
    /// `transition - reactant`
    pub activation: f64,
    /// `product - reactant`
    pub reaction: f64,
}

/// Least-squares polynomial in a shifted and scaled coordinate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Polynomial {
    /// Coefficients in ascending order of `t`
    pub coefficients: Vec<f64>,
    /// Center of the data range
    pub shift: f64,
    /// Half width of the data range
    pub scale: f64,
}

impl Polynomial {
    /// Fits a polynomial of `degree` to `(x, y)` samples.
    pub fn fit(xs: &[f64], ys: &[f64], degree: usize) -> Result<Self, MappingError> {
        if xs.len() <= degree {
            return Err(MappingError::TooFewPoints {
                points: xs.len(),
                degree,
            });
        }
        if xs.iter().chain(ys).any(|v| !v.is_finite()) {
            return Err(MappingError::Singular(
                "non-finite gap or free energy".to_string(),
            ));
        }
        let (lo, hi) = range(xs);
        let shift = 0.5 * (lo + hi);
        let scale = 0.5 * (hi - lo);
        if scale <= 0.0 {
            return Err(MappingError::Singular(
                "all samples share the same gap".to_string(),
            ));
        }

        let t: Vec<f64> = xs.iter().map(|x| (x - shift) / scale).collect();
        let a = DMatrix::from_fn(t.len(), degree + 1, |i, j| t[i].powi(j as i32));
        let b = DVector::from_column_slice(ys);
        let svd = a
            .try_svd(true, true, f64::EPSILON, SVD_MAX_ITERATIONS)
            .ok_or_else(|| MappingError::Singular("SVD did not converge".to_string()))?;
        let rank = svd.rank(SVD_EPS * svd.singular_values.max());
        if rank < degree + 1 {
            return Err(MappingError::Singular(format!(
                "rank {} for {} coefficients",
                rank,
                degree + 1
            )));
        }
        let solution = svd
            .solve(&b, SVD_EPS)
            .map_err(|e| MappingError::Singular(e.to_string()))?;

        Ok(Self {
            coefficients: solution.iter().copied().collect(),
            shift,
            scale,
        })
    }

    /// Polynomial degree.
    pub fn degree(&self) -> usize {
        self.coefficients.len().saturating_sub(1)
    }

    /// `order`-th derivative with respect to `x`, evaluated at `x`.
    pub fn derivative(&self, x: f64, order: usize) -> f64 {
        let t = (x - self.shift) / self.scale;
        let mut value = 0.0;
        for (power, &c) in self.coefficients.iter().enumerate().skip(order).rev() {
            let falling: f64 = (power - order + 1..=power).map(|k| k as f64).product();
            value = value * t + c * falling;
        }
        value / self.scale.powi(order as i32)
    }

    /// Value at `x`.
    pub fn evaluate(&self, x: f64) -> f64 {
        self.derivative(x, 0)
    }
}

fn range(xs: &[f64]) -> (f64, f64) {
    xs.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &x| {
        (lo.min(x), hi.max(x))
    })
}

fn bisect(poly: &Polynomial, mut a: f64, mut b: f64) -> f64 {
    let mut fa = poly.derivative(a, 1);
    for _ in 0..BISECTION_STEPS {
        let mid = 0.5 * (a + b);
        let fm = poly.derivative(mid, 1);
        if fm == 0.0 {
            return mid;
        }
        if fa * fm < 0.0 {
            b = mid;
        } else {
            a = mid;
            fa = fm;
        }
    }
    0.5 * (a + b)
}

/// Stationary points of `poly` inside `[lo, hi]`, ordered by `x`.
///
/// Inflection points (zero second derivative) are skipped.
pub fn stationary_points(poly: &Polynomial, lo: f64, hi: f64) -> Vec<Extremum> {
    let step = (hi - lo) / SCAN_SAMPLES as f64;
    let mut roots: Vec<f64> = Vec::new();
    let mut x0 = lo;
    let mut d0 = poly.derivative(x0, 1);
    if d0 == 0.0 {
        roots.push(x0);
    }
    for i in 1..=SCAN_SAMPLES {
        let x1 = if i == SCAN_SAMPLES { hi } else { lo + i as f64 * step };
        let d1 = poly.derivative(x1, 1);
        if d1 == 0.0 {
            roots.push(x1);
        } else if d0 * d1 < 0.0 {
            roots.push(bisect(poly, x0, x1));
        }
        x0 = x1;
        d0 = d1;
    }

    roots
        .into_iter()
        .filter_map(|gap| {
            let curvature = poly.derivative(gap, 2);
            let kind = if curvature > 0.0 {
                ExtremumKind::Minimum
            } else if curvature < 0.0 {
                ExtremumKind::Maximum
            } else {
                return None;
            };
            Some(Extremum {
                gap,
                value: poly.evaluate(gap),
                kind,
            })
        })
        .collect()
}

/// A parsed mapping profile.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EvbMapping {
    /// Bins with at least one sample, in file order
    pub points: Vec<MappingPoint>,
}

impl EvbMapping {
    /// Builds a mapping from points, dropping empty bins.
    pub fn from_points(points: Vec<MappingPoint>) -> Self {
        Self {
            points: points.into_iter().filter(|p| p.points > 0).collect(),
        }
    }

    /// Number of bins.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True when no bins were read.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Gap coordinates.
    pub fn gaps(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.gap).collect()
    }

    /// Free energies.
    pub fn free_energies(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.dg).collect()
    }

    /// Fits the profile with a polynomial of `degree`.
    pub fn fit(&self, degree: usize) -> Result<Polynomial, MappingError> {
        Polynomial::fit(&self.gaps(), &self.free_energies(), degree)
    }

    /// Minima and maxima of the fitted profile within the sampled range.
    pub fn calculate_extrema(&self, degree: usize) -> Result<Vec<Extremum>, MappingError> {
        let poly = self.fit(degree)?;
        let (lo, hi) = range(&self.gaps());
        let extrema = stationary_points(&poly, lo, hi);
        debug!("Degree {} fit has {} stationary points", degree, extrema.len());
        Ok(extrema)
    }

    /// Reaction profile of the fitted double well.
    ///
    /// `Ok(None)` when the fitted profile is not a double well.
    pub fn reaction_profile(&self, degree: usize) -> Result<Option<ReactionProfile>, MappingError> {
        Ok(ReactionProfile::from_extrema(&self.calculate_extrema(degree)?))
    }
}

impl ReactionProfile {
    /// Reactant minimum, the following maximum and the last minimum after it.
    pub fn from_extrema(extrema: &[Extremum]) -> Option<Self> {
        let r = extrema.iter().position(|e| e.kind == ExtremumKind::Minimum)?;
        let t = r + extrema[r..].iter().position(|e| e.kind == ExtremumKind::Maximum)?;
        let product = *extrema[t..]
            .iter()
            .rev()
            .find(|e| e.kind == ExtremumKind::Minimum)?;
        let (reactant, transition) = (extrema[r], extrema[t]);
        Some(Self {
            reactant,
            transition,
            product,
            activation: transition.value - reactant.value,
            reaction: product.value - reactant.value,
        })
    }
}

fn mapping_row(fields: &Fields) -> Result<MappingPoint, TokenizeError> {
    Ok(MappingPoint {
        bin: fields.int(0)?,
        gap: fields.float(1)?,
        dg: fields.float(2)?,
        points: fields.int(3)?,
    })
}

impl TextFormat for EvbMapping {
    const DESCRIPTION: &'static str = "EVB mapping profile";

    fn parse(text: &str) -> crate::parser::Result<Self> {
        let mut cursor = LineCursor::new(text);
        if !cursor.by_ref().any(|line| line.contains("dGg")) {
            return Err(ParseError::Parse(
                "no mapping table header containing 'dGg'".to_string(),
            ));
        }
        let mut points = Vec::new();
        while let Some(line) = cursor.next() {
            let Some(fields) = cursor.at_line(ROW.fields(line))? else {
                break;
            };
            points.push(cursor.at_line(mapping_row(&fields))?);
        }
        let mapping = Self::from_points(points);
        info!("Read {} populated mapping bins", mapping.len());
        Ok(mapping)
    }
}

/// Reads a mapping file and returns it with the extrema of a `degree` fit.
pub fn load_extrema(path: &Path, degree: usize) -> Result<(EvbMapping, Vec<Extremum>), MappingError> {
    let mapping = EvbMapping::from_file(path)?;
    let extrema = mapping.calculate_extrema(degree)?;
    Ok((mapping, extrema))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `10 (x^2 - 1)^2` sampled on `[-1.5, 1.5]`, mapped to `gap = 100 x`.
    fn double_well() -> EvbMapping {
        let points = (0..=30)
            .map(|i| {
                let x = -1.5 + 0.1 * i as f64;
                MappingPoint {
                    bin: i + 1,
                    gap: 100.0 * x,
                    dg: 10.0 * (x * x - 1.0).powi(2),
                    points: 50,
                }
            })
            .collect();
        EvbMapping::from_points(points)
    }

    #[test]
    fn test_polynomial_derivatives() {
        let poly = Polynomial {
            coefficients: vec![1.0, 2.0, 3.0],
            shift: 1.0,
            scale: 2.0,
        };
        // p(x) = 1 + 2t + 3t^2, t = (x - 1) / 2
        assert_eq!(poly.evaluate(3.0), 6.0);
        assert_eq!(poly.derivative(3.0, 1), (2.0 + 6.0) / 2.0);
        assert_eq!(poly.derivative(3.0, 2), 6.0 / 4.0);
        assert_eq!(poly.derivative(3.0, 3), 0.0);
    }

    #[test]
    fn test_double_well_extrema() {
        let extrema = double_well().calculate_extrema(4).unwrap();
        assert_eq!(extrema.len(), 3);
        let expected = [
            (-100.0, 0.0, ExtremumKind::Minimum),
            (0.0, 10.0, ExtremumKind::Maximum),
            (100.0, 0.0, ExtremumKind::Minimum),
        ];
        for (e, (gap, value, kind)) in extrema.iter().zip(expected) {
            assert!((e.gap - gap).abs() < 1e-4, "gap {}", e.gap);
            assert!((e.value - value).abs() < 1e-6, "value {}", e.value);
            assert_eq!(e.kind, kind);
        }
    }

    #[test]
    fn test_reaction_profile() {
        let profile = double_well().reaction_profile(4).unwrap().unwrap();
        assert!((profile.activation - 10.0).abs() < 1e-6);
        assert!(profile.reaction.abs() < 1e-6);
    }

    #[test]
    fn test_too_few_points() {
        let mapping = EvbMapping::from_points(double_well().points[..4].to_vec());
        assert!(matches!(
            mapping.calculate_extrema(4),
            Err(MappingError::TooFewPoints { points: 4, degree: 4 })
        ));
    }

    #[test]
    fn test_parse_drops_empty_bins() {
        let text = "\
 EVB mapping
  bin     gap       dGg   points
    1  -20.00    1.000       10
    2  -10.00    0.500        0
    3    0.00    0.250       12

 trailing text is ignored
";
        let mapping = EvbMapping::parse(text).unwrap();
        assert_eq!(mapping.len(), 2);
        assert_eq!(mapping.points[1].bin, 3);
        assert!(EvbMapping::parse("no table\n").is_err());
    }

    #[test]
    fn test_single_well_has_no_profile() {
        let points = (0..=20)
            .map(|i| {
                let gap = -100.0 + 10.0 * i as f64;
                MappingPoint {
                    bin: i + 1,
                    gap,
                    dg: 0.001 * gap * gap,
                    points: 20,
                }
            })
            .collect();
        let mapping = EvbMapping::from_points(points);
        let extrema = mapping.calculate_extrema(2).unwrap();
        assert_eq!(extrema.len(), 1);
        assert_eq!(extrema[0].kind, ExtremumKind::Minimum);
        assert!(ReactionProfile::from_extrema(&extrema).is_none());
        assert!(mapping.reaction_profile(2).unwrap().is_none());
        assert!(ReactionProfile::from_extrema(&[]).is_none());
    }

    #[test]
    fn test_non_finite_values_rejected() {
        let gap_nan = "  bin  gap  dGg  points\n    1  -10.0  1.0  10\n    2  nan  0.5  10\n";
        assert!(matches!(
            EvbMapping::parse(gap_nan),
            Err(ParseError::Line { line: 3, .. })
        ));
        let dg_nan = "  bin  gap  dGg  points\n    1  -10.0  1.0  10\n    2  -5.0  nan  10\n";
        assert!(EvbMapping::parse(dg_nan).is_err());

        let xs = [0.0, 1.0, f64::NAN, 3.0];
        let ys = [0.0, 1.0, 4.0, 9.0];
        assert!(matches!(
            Polynomial::fit(&xs, &ys, 2),
            Err(MappingError::Singular(_))
        ));
    }
}
