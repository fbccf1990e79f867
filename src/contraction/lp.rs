//! Separation LP for the witness-search loop.
//!
//! Given witness rows `c - shortcut_cost`, the program looks for a weight
//! vector on the simplex under which no known witness beats the shortcut:
//!
//! ```text
//! maximize t
//! subject to  sum w_i = 1,  0 <= w_i <= 1,
//!             (c - s) . w >= t   for every witness c
//! ```
//!
//! The solver is deterministic, so an unchanged row set reproduces the same
//! weights; the caller detects that fixed point and stops iterating.

use minilp::{ComparisonOp, LinearExpr, OptimizationDirection, Problem};

pub struct ContractionLp<const D: usize> {
    rows: Vec<[f64; D]>,
    values: [f64; D],
}

impl<const D: usize> Default for ContractionLp<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const D: usize> ContractionLp<D> {
    pub fn new() -> Self {
        ContractionLp {
            rows: Vec::new(),
            values: [0.0; D],
        }
    }

    /// Buffer one witness row for the next solve.
    pub fn add_constraint(&mut self, row: [f64; D]) {
        self.rows.push(row);
    }

    /// Solve over the buffered rows and drain them; the caller re-adds its
    /// full constraint set before every solve. Returns `false` when the
    /// program has no usable optimum (no rows, infeasible, unbounded).
    pub fn solve(&mut self) -> bool {
        let rows = std::mem::take(&mut self.rows);
        if rows.is_empty() {
            return false;
        }

        let mut problem = Problem::new(OptimizationDirection::Maximize);
        let weights: Vec<_> = (0..D).map(|_| problem.add_var(0.0, (0.0, 1.0))).collect();
        let gain = problem.add_var(1.0, (f64::NEG_INFINITY, f64::INFINITY));

        let mut simplex = LinearExpr::empty();
        for &w in &weights {
            simplex.add(w, 1.0);
        }
        problem.add_constraint(simplex, ComparisonOp::Eq, 1.0);

        for row in &rows {
            let mut expr = LinearExpr::empty();
            for (i, &w) in weights.iter().enumerate() {
                expr.add(w, row[i]);
            }
            expr.add(gain, -1.0);
            problem.add_constraint(expr, ComparisonOp::Ge, 0.0);
        }

        match problem.solve() {
            Ok(solution) => {
                for (value, &w) in self.values.iter_mut().zip(weights.iter()) {
                    *value = solution[w];
                }
                true
            }
            Err(_) => false,
        }
    }

    /// Weights from the last successful solve.
    pub fn variable_values(&self) -> [f64; D] {
        self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separates_a_single_witness() {
        // Witness beats the shortcut on dim 1 only; any weight mass on
        // dim 0 separates it. The optimum puts everything there.
        let mut lp: ContractionLp<2> = ContractionLp::new();
        lp.add_constraint([2.0, -1.0]);
        assert!(lp.solve());
        let w = lp.variable_values();
        assert!((w[0] + w[1] - 1.0).abs() < 1e-9);
        assert!(2.0 * w[0] - w[1] > 0.0);
    }

    #[test]
    fn balances_two_opposing_witnesses() {
        // Rows (1,-2) and (-2,1): no simplex point makes both positive;
        // the maximin lands in the middle.
        let mut lp: ContractionLp<2> = ContractionLp::new();
        lp.add_constraint([1.0, -2.0]);
        lp.add_constraint([-2.0, 1.0]);
        assert!(lp.solve());
        let w = lp.variable_values();
        assert!((w[0] - 0.5).abs() < 1e-9);
        assert!((w[1] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn repeated_row_set_reproduces_the_solution() {
        let rows = [[3.0, -1.0], [-1.0, 2.0]];
        let mut lp: ContractionLp<2> = ContractionLp::new();
        for row in rows {
            lp.add_constraint(row);
        }
        assert!(lp.solve());
        let first = lp.variable_values();
        for row in rows {
            lp.add_constraint(row);
        }
        assert!(lp.solve());
        assert_eq!(first, lp.variable_values());
    }

    #[test]
    fn no_rows_means_no_solution() {
        let mut lp: ContractionLp<2> = ContractionLp::new();
        assert!(!lp.solve());
    }
}
