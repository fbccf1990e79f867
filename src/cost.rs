//! Cost vectors and scalarization weights.
//!
//! Every edge carries a `D`-dimensional non-negative cost (for bicycle
//! routing: distance, travel time, ascent). Queries scalarize it with a
//! weight vector on the simplex.

use std::ops::{Add, Sub};

/// Tolerance for cost comparisons after float arithmetic.
pub const COST_ACCURACY: f64 = 1e-6;

/// A `D`-dimensional edge cost.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cost<const D: usize>(pub [f64; D]);

impl<const D: usize> Cost<D> {
    pub fn zero() -> Self {
        Cost([0.0; D])
    }

    pub fn new(values: [f64; D]) -> Self {
        Cost(values)
    }

    /// Scalarize with a weight vector.
    pub fn dot(&self, config: &Config<D>) -> f64 {
        self.0
            .iter()
            .zip(config.0.iter())
            .map(|(c, w)| c * w)
            .sum()
    }

    /// Pareto dominance: `self <= other` in every component and the two
    /// differ in at least one.
    pub fn dominates(&self, other: &Cost<D>) -> bool {
        let mut some_different = false;
        for i in 0..D {
            if self.0[i] > other.0[i] {
                return false;
            }
            if self.0[i] != other.0[i] {
                some_different = true;
            }
        }
        some_different
    }

    /// Componentwise equality within [`COST_ACCURACY`].
    pub fn approx_eq(&self, other: &Cost<D>) -> bool {
        self.0
            .iter()
            .zip(other.0.iter())
            .all(|(a, b)| (a - b).abs() <= COST_ACCURACY)
    }
}

impl<const D: usize> Add for Cost<D> {
    type Output = Cost<D>;

    fn add(self, rhs: Cost<D>) -> Cost<D> {
        let mut values = self.0;
        for (v, r) in values.iter_mut().zip(rhs.0.iter()) {
            *v += r;
        }
        Cost(values)
    }
}

impl<const D: usize> Sub for Cost<D> {
    type Output = Cost<D>;

    fn sub(self, rhs: Cost<D>) -> Cost<D> {
        let mut values = self.0;
        for (v, r) in values.iter_mut().zip(rhs.0.iter()) {
            *v -= r;
        }
        Cost(values)
    }
}

/// A weight vector on the `D`-dimensional simplex.
///
/// Equality is bitwise on the components, exactly as the LP produces them;
/// the witness-search loop terminates when a solve repeats its own input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config<const D: usize>(pub [f64; D]);

impl<const D: usize> Config<D> {
    /// Equal weight on every dimension.
    pub fn uniform() -> Self {
        Config([1.0 / D as f64; D])
    }

    /// Unit weight on dimension `i`, zero elsewhere.
    pub fn axis(i: usize) -> Self {
        let mut values = [0.0; D];
        values[i] = 1.0;
        Config(values)
    }
}
