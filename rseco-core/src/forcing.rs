//! Forcing functions of time.
//!
//! A forcing is either constant or interpolated from a yearly cycle of monthly values.
//! Climatological monthly values come from an external [`ClimatologyProvider`];
//! this crate only turns them into a smooth periodic function and its derivative.

use crate::errors::{RSECOError, RSECOResult};
use crate::state::{Shape, StateValue};
use crate::timeseries::{FloatValue, Time};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Length of the forcing cycle in days
pub const DAYS_PER_YEAR: FloatValue = 365.0;
pub const MONTHS_PER_YEAR: usize = 12;

/// A forcing value as a function of time
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ForcingFunction {
    Constant(StateValue),
    Spline(PeriodicSpline),
}

impl ForcingFunction {
    pub fn value(&self, t: Time) -> StateValue {
        match self {
            ForcingFunction::Constant(v) => v.clone(),
            ForcingFunction::Spline(spline) => StateValue::Scalar(spline.value(t)),
        }
    }

    /// First derivative with respect to time
    pub fn derivative(&self, t: Time) -> StateValue {
        match self {
            ForcingFunction::Constant(v) => StateValue::zeros(v.shape()),
            ForcingFunction::Spline(spline) => StateValue::Scalar(spline.derivative(t)),
        }
    }

    pub fn shape(&self) -> Shape {
        match self {
            ForcingFunction::Constant(v) => v.shape(),
            ForcingFunction::Spline(_) => Shape::Scalar,
        }
    }
}

/// Periodic interpolating spline through equally spaced nodes
///
/// Node `i` sits at `(i + 0.5) * period / n`, so twelve values map onto the middle of each
/// month of a `DAYS_PER_YEAR` day year.
/// The spline is a sum of cardinal B-splines of the chosen degree centred on the nodes.
/// Degree 1 interpolates linearly and degree 3 is the periodic cubic spline; a spline of
/// degree `k` has `k - 1` continuous derivatives across every node, including the wrap-around.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PeriodicSpline {
    period: FloatValue,
    degree: usize,
    values: Vec<FloatValue>,
    /// Weight of the B-spline centred on each node
    coefficients: Vec<FloatValue>,
}

impl PeriodicSpline {
    /// Interpolate `values` with a spline of `degree` between 1 and `values.len() - 1`
    pub fn new(values: Vec<FloatValue>, period: FloatValue, degree: usize) -> RSECOResult<Self> {
        if values.len() < 3 {
            return Err(RSECOError::InvalidSpline(format!(
                "at least 3 nodes are required, got {}",
                values.len()
            )));
        }
        if period <= 0.0 {
            return Err(RSECOError::InvalidSpline(format!(
                "period must be positive, got {period}"
            )));
        }
        if degree == 0 || degree >= values.len() {
            return Err(RSECOError::InvalidSpline(format!(
                "unsupported spline degree {degree}, expected 1 to {}",
                values.len() - 1
            )));
        }
        let coefficients = Self::solve_coefficients(&values, degree)?;
        Ok(Self {
            period,
            degree,
            values,
            coefficients,
        })
    }

    /// A spline through one value per month of a year
    pub fn monthly(values: [FloatValue; MONTHS_PER_YEAR], degree: usize) -> RSECOResult<Self> {
        Self::new(values.to_vec(), DAYS_PER_YEAR, degree)
    }

    /// Solve the cyclic system `sum_j c[j] B(i - j) = y[i]`
    fn solve_coefficients(values: &[FloatValue], degree: usize) -> RSECOResult<Vec<FloatValue>> {
        let n = values.len();
        let a = DMatrix::<FloatValue>::from_fn(n, n, |i, j| {
            periodic_bspline(degree, i as FloatValue - j as FloatValue, n)
        });
        let b = DVector::from_column_slice(values);
        a.lu()
            .solve(&b)
            .map(|c| c.iter().copied().collect())
            .ok_or_else(|| RSECOError::InvalidSpline("singular spline system".to_string()))
    }

    fn spacing(&self) -> FloatValue {
        self.period / self.values.len() as FloatValue
    }

    /// Position of `t` in units of the node spacing, measured from the first node
    fn position(&self, t: Time) -> FloatValue {
        let h = self.spacing();
        (t - 0.5 * h).rem_euclid(self.period) / h
    }

    pub fn value(&self, t: Time) -> FloatValue {
        let u = self.position(t);
        let n = self.values.len();
        self.coefficients
            .iter()
            .enumerate()
            .map(|(j, c)| c * periodic_bspline(self.degree, u - j as FloatValue, n))
            .sum()
    }

    pub fn derivative(&self, t: Time) -> FloatValue {
        let u = self.position(t);
        let n = self.values.len();
        let slope: FloatValue = self
            .coefficients
            .iter()
            .enumerate()
            .map(|(j, c)| c * periodic_bspline_slope(self.degree, u - j as FloatValue, n))
            .sum();
        slope / self.spacing()
    }

    pub fn degree(&self) -> usize {
        self.degree
    }
}

/// Centred cardinal B-spline of `degree`, nonzero on `(-(degree + 1) / 2, (degree + 1) / 2)`
fn cardinal_bspline(degree: usize, x: FloatValue) -> FloatValue {
    let half = (degree + 1) as FloatValue / 2.0;
    if x.abs() >= half {
        return 0.0;
    }
    // Truncated power form
    let mut sum = 0.0;
    let mut binomial = 1.0;
    let mut factorial = 1.0;
    for j in 0..=degree + 1 {
        let shifted = x + half - j as FloatValue;
        if shifted > 0.0 {
            let sign = if j % 2 == 0 { 1.0 } else { -1.0 };
            sum += sign * binomial * shifted.powi(degree as i32);
        }
        binomial *= (degree + 1 - j) as FloatValue / (j + 1) as FloatValue;
        if j >= 1 && j <= degree {
            factorial *= j as FloatValue;
        }
    }
    sum / factorial
}

/// Sum of the images of a B-spline repeated every `n` nodes
fn periodic_bspline(degree: usize, x: FloatValue, n: usize) -> FloatValue {
    periodic_images(degree, x, n)
        .map(|x| cardinal_bspline(degree, x))
        .sum()
}

fn periodic_bspline_slope(degree: usize, x: FloatValue, n: usize) -> FloatValue {
    periodic_images(degree, x, n)
        .map(|x| cardinal_bspline(degree - 1, x + 0.5) - cardinal_bspline(degree - 1, x - 0.5))
        .sum()
}

fn periodic_images(degree: usize, x: FloatValue, n: usize) -> impl Iterator<Item = FloatValue> {
    let period = n as FloatValue;
    let reach = ((degree + 1) as FloatValue / 2.0 / period).ceil() as i64 + 1;
    (-reach..=reach).map(move |m| x + m as FloatValue * period)
}

/// Location and dataset of a climatological forcing
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClimatologyRequest {
    pub lat: FloatValue,
    pub lon: FloatValue,
    /// Half-width of the box (in degrees) averaged around `lat`/`lon`
    pub range: FloatValue,
    pub dataset: String,
}

/// Source of monthly climatologies (mixed layer depth, temperature, nutrients, ...)
///
/// File access and spatial averaging live outside this crate.
pub trait ClimatologyProvider: Debug + Send + Sync {
    fn monthly_forcing(
        &self,
        request: &ClimatologyRequest,
    ) -> RSECOResult<[FloatValue; MONTHS_PER_YEAR]>;
}

/// Context available to components while they set up owned forcings
#[derive(Clone, Copy, Debug, Default)]
pub struct ForcingContext<'a> {
    provider: Option<&'a dyn ClimatologyProvider>,
}

impl<'a> ForcingContext<'a> {
    pub fn new(provider: Option<&'a dyn ClimatologyProvider>) -> Self {
        Self { provider }
    }

    pub fn provider(&self, component: &str) -> RSECOResult<&'a dyn ClimatologyProvider> {
        self.provider
            .ok_or_else(|| RSECOError::MissingClimatologyProvider(component.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use is_close::is_close;

    const MLD: [FloatValue; 12] = [
        80.0, 95.0, 90.0, 60.0, 35.0, 22.0, 18.0, 20.0, 28.0, 40.0, 55.0, 70.0,
    ];

    #[test]
    fn spline_passes_through_nodes() {
        for degree in 1..=5 {
            let spline = PeriodicSpline::monthly(MLD, degree).unwrap();
            let h = DAYS_PER_YEAR / 12.0;
            for (i, expected) in MLD.iter().enumerate() {
                let t = (i as FloatValue + 0.5) * h;
                assert!(
                    is_close!(spline.value(t), *expected, abs_tol = 1e-9),
                    "degree {} node {}: {} != {}",
                    degree,
                    i,
                    spline.value(t),
                    expected
                );
            }
        }
    }

    #[test]
    fn spline_is_periodic() {
        let spline = PeriodicSpline::monthly(MLD, 3).unwrap();
        for t in [0.0, 17.3, 200.0, 364.9] {
            assert!(is_close!(spline.value(t), spline.value(t + DAYS_PER_YEAR)));
            assert!(is_close!(
                spline.derivative(t),
                spline.derivative(t + 2.0 * DAYS_PER_YEAR)
            ));
        }
    }

    #[test]
    fn cubic_derivative_matches_finite_difference() {
        let spline = PeriodicSpline::monthly(MLD, 3).unwrap();
        let eps = 1e-5;
        for t in [3.0, 91.0, 180.5, 300.0, 364.0] {
            let fd = (spline.value(t + eps) - spline.value(t - eps)) / (2.0 * eps);
            assert!(is_close!(spline.derivative(t), fd, abs_tol = 1e-5));
        }
    }

    #[test]
    fn constant_spline_is_flat() {
        let spline = PeriodicSpline::monthly([4.0; 12], 3).unwrap();
        assert!(is_close!(spline.value(123.4), 4.0));
        assert!(is_close!(spline.derivative(123.4), 0.0, abs_tol = 1e-12));
    }

    #[test]
    fn higher_degree_derivative_matches_finite_difference() {
        for degree in [2, 4, 5] {
            let spline = PeriodicSpline::monthly(MLD, degree).unwrap();
            let eps = 1e-5;
            for t in [3.0, 91.0, 180.5, 300.0, 364.0] {
                let fd = (spline.value(t + eps) - spline.value(t - eps)) / (2.0 * eps);
                assert!(
                    is_close!(spline.derivative(t), fd, abs_tol = 1e-5),
                    "degree {} t={}",
                    degree,
                    t
                );
            }
        }
    }

    #[test]
    fn linear_spline_interpolates_between_nodes() {
        let spline = PeriodicSpline::monthly(MLD, 1).unwrap();
        let h = DAYS_PER_YEAR / 12.0;
        // A quarter of the way from mid-January to mid-February
        let t = 0.5 * h + 0.25 * h;
        assert!(is_close!(spline.value(t), 0.75 * 80.0 + 0.25 * 95.0));
        assert!(is_close!(spline.derivative(t), (95.0 - 80.0) / h));
        // Across the end of the year, from mid-December back to mid-January
        assert!(is_close!(spline.value(0.0), 0.5 * 70.0 + 0.5 * 80.0));
    }

    #[test]
    fn cubic_spline_has_continuous_curvature() {
        let spline = PeriodicSpline::monthly(MLD, 3).unwrap();
        let h = DAYS_PER_YEAR / 12.0;
        let eps = 1e-3;
        for i in 0..12 {
            let node = (i as FloatValue + 0.5) * h;
            let left = (spline.derivative(node) - spline.derivative(node - eps)) / eps;
            let right = (spline.derivative(node + eps) - spline.derivative(node)) / eps;
            assert!(is_close!(left, right, abs_tol = 1e-2), "node {}", i);
        }
    }

    #[test]
    fn unsupported_degree_is_rejected() {
        for degree in [0, 12] {
            assert!(matches!(
                PeriodicSpline::monthly(MLD, degree),
                Err(RSECOError::InvalidSpline(_))
            ));
        }
    }

    #[test]
    fn constant_forcing_has_zero_derivative() {
        let forcing = ForcingFunction::Constant(StateValue::Scalar(2.0));
        assert_eq!(forcing.value(10.0), StateValue::Scalar(2.0));
        assert_eq!(forcing.derivative(10.0), StateValue::Scalar(0.0));
    }

    #[test]
    fn missing_provider_is_a_configuration_error() {
        let context = ForcingContext::default();
        assert!(matches!(
            context.provider("mld"),
            Err(RSECOError::MissingClimatologyProvider(_))
        ));
    }
}
