//! Bracketing search and interpolation weights.
//!
//! Isochrone tables are sampled on sorted grids (metallicity across files, log age and initial
//! mass inside a file). Every interpolation in the crate goes through [`bracket`], which either
//! finds an exact grid node or the two nodes around a value, and never extrapolates.
use std::fmt;

use crate::constants::Z_SOLAR;

/// Position of a value on a sorted grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bracket {
    /// The value sits on node `i`
    Exact(usize),
    /// The value lies strictly between two consecutive nodes; `weight` is the share of `upper`
    Between {
        lower: usize,
        upper: usize,
        weight: f64,
    },
}

fn same_node(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-12 * a.abs().max(b.abs()).max(1.0)
}

/// Locate `x` on the ascending grid `sorted`.
///
/// Return
/// ----------
/// * `None` if the grid is empty, `x` is not finite, or `x` lies outside `[first, last]`.
pub fn bracket(sorted: &[f64], x: f64) -> Option<Bracket> {
    if sorted.is_empty() || !x.is_finite() {
        return None;
    }
    let i = sorted.partition_point(|&v| v < x);
    if i < sorted.len() && same_node(sorted[i], x) {
        return Some(Bracket::Exact(i));
    }
    if i > 0 && same_node(sorted[i - 1], x) {
        return Some(Bracket::Exact(i - 1));
    }
    if i == 0 || i == sorted.len() {
        return None;
    }
    let (lo, hi) = (sorted[i - 1], sorted[i]);
    Some(Bracket::Between {
        lower: i - 1,
        upper: i,
        weight: (x - lo) / (hi - lo),
    })
}

pub(crate) fn lerp(a: f64, b: f64, weight: f64) -> f64 {
    a + weight * (b - a)
}

/// Strategy for combining two isochrone tables that bracket a star's metallicity.
pub trait MetallicityInterpolation: fmt::Debug + Send + Sync {
    /// Share of the upper table for metallicity `z` in `[lower, upper]`.
    ///
    /// Returns `None` when the scale is undefined for these values.
    fn weight(&self, z: f64, lower: f64, upper: f64) -> Option<f64>;

    /// Whether the strategy can work on grids keyed with `scale`.
    fn supports(&self, _scale: MetallicityScale) -> bool {
        true
    }
}

/// Linear in the metallicity key itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinearInZ;

impl MetallicityInterpolation for LinearInZ {
    fn weight(&self, z: f64, lower: f64, upper: f64) -> Option<f64> {
        (upper > lower).then(|| (z - lower) / (upper - lower))
    }
}

/// Linear in log10 of the metallicity key; requires positive keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinearInLogZ;

impl MetallicityInterpolation for LinearInLogZ {
    fn weight(&self, z: f64, lower: f64, upper: f64) -> Option<f64> {
        if !(z > 0.0 && lower > 0.0 && upper > lower) {
            return None;
        }
        Some((z.log10() - lower.log10()) / (upper.log10() - lower.log10()))
    }

    fn supports(&self, scale: MetallicityScale) -> bool {
        !matches!(scale, MetallicityScale::Logarithmic)
    }
}

/// How a star's `[Fe/H]` maps onto the metallicity keys of the isochrone files.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetallicityScale {
    /// Files keyed by mass fraction Z, with `Z = z_solar * 10^[Fe/H]`
    MassFraction { z_solar: f64 },
    /// Files keyed by `[M/H]`, used as is
    Logarithmic,
}

impl Default for MetallicityScale {
    fn default() -> Self {
        MetallicityScale::MassFraction { z_solar: Z_SOLAR }
    }
}

impl MetallicityScale {
    pub fn from_feh(&self, feh: f64) -> f64 {
        match self {
            MetallicityScale::MassFraction { z_solar } => z_solar * 10f64.powf(feh),
            MetallicityScale::Logarithmic => feh,
        }
    }
}

#[cfg(test)]
mod test_interpolation {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_bracket() {
        let grid = [8.0, 9.0, 10.0];
        assert_eq!(bracket(&grid, 9.0), Some(Bracket::Exact(1)));
        assert_eq!(bracket(&grid, 10.0 + 1e-14), Some(Bracket::Exact(2)));
        assert_eq!(
            bracket(&grid, 8.25),
            Some(Bracket::Between {
                lower: 0,
                upper: 1,
                weight: 0.25
            })
        );
        assert_eq!(bracket(&grid, 7.9), None);
        assert_eq!(bracket(&grid, 10.1), None);
        assert_eq!(bracket(&grid, f64::NAN), None);
        assert_eq!(bracket(&[], 1.0), None);
    }

    #[test]
    fn test_bracket_with_repeated_nodes() {
        let grid = [0.1, 0.5, 0.5, 1.0];
        assert_eq!(bracket(&grid, 0.5), Some(Bracket::Exact(1)));
        assert!(matches!(
            bracket(&grid, 0.7),
            Some(Bracket::Between { lower: 2, upper: 3, .. })
        ));
    }

    #[test]
    fn test_metallicity_strategies() {
        assert_relative_eq!(LinearInZ.weight(0.015, 0.01, 0.02).unwrap(), 0.5);
        assert_relative_eq!(
            LinearInLogZ.weight(0.01, 0.001, 0.1).unwrap(),
            0.5,
            epsilon = 1e-12
        );
        assert_eq!(LinearInLogZ.weight(-0.5, -1.0, 0.0), None);
    }

    #[test]
    fn test_log_strategy_needs_mass_fractions() {
        assert!(LinearInZ.supports(MetallicityScale::Logarithmic));
        assert!(LinearInLogZ.supports(MetallicityScale::default()));
        assert!(!LinearInLogZ.supports(MetallicityScale::Logarithmic));
    }

    #[test]
    fn test_metallicity_scale() {
        assert_relative_eq!(MetallicityScale::default().from_feh(0.0), 0.019);
        assert_relative_eq!(
            MetallicityScale::default().from_feh(-1.0),
            0.0019,
            epsilon = 1e-15
        );
        assert_eq!(MetallicityScale::Logarithmic.from_feh(-0.3), -0.3);
    }
}
