use nalgebra::DMatrix;
use strata_core::{CooAdjacency, PositionalEncoder, F};

/// Random-walk positional encoding: column `k` holds each node's probability
/// of returning to itself after `k + 1` steps of the row-normalized walk.
///
/// Transition powers are kept dense; coarse graphs are small.
pub struct RandomWalkPe {
    steps: usize,
}

impl RandomWalkPe {
    pub fn new(steps: usize) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> usize {
        self.steps
    }
}

impl PositionalEncoder for RandomWalkPe {
    fn encode(&self, adj: &CooAdjacency) -> DMatrix<F> {
        let n = adj.num_nodes();
        let mut pe = DMatrix::zeros(n, self.steps);
        if n == 0 || self.steps == 0 {
            return pe;
        }

        // Walks run on the simple graph; isolated nodes keep a zero row.
        let clean = adj.zero_diag();
        let deg = clean.degrees();
        let mut t = DMatrix::<F>::zeros(n, n);
        for (r, c, v) in clean.triplets() {
            if deg[r] > 0.0 {
                t[(r, c)] += v / deg[r];
            }
        }

        let mut power = t.clone();
        for k in 0..self.steps {
            for i in 0..n {
                pe[(i, k)] = power[(i, i)];
            }
            if k + 1 < self.steps {
                power = &power * &t;
            }
        }
        pe
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_ring_return_probabilities() {
        // On an even ring the walk returns only after an even number of
        // steps; two steps come back with probability 1/2.
        let edges: Vec<(usize, usize)> = (0..4).map(|i| (i, (i + 1) % 4)).collect();
        let adj = CooAdjacency::from_undirected_edges(4, &edges).unwrap();
        let pe = RandomWalkPe::new(3).encode(&adj);

        assert_eq!(pe.shape(), (4, 3));
        for i in 0..4 {
            assert_abs_diff_eq!(pe[(i, 0)], 0.0, epsilon = 1e-6);
            assert_abs_diff_eq!(pe[(i, 1)], 0.5, epsilon = 1e-6);
            assert_abs_diff_eq!(pe[(i, 2)], 0.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_isolated_node_row_is_zero() {
        let adj = CooAdjacency::from_undirected_edges(3, &[(0, 1)]).unwrap();
        let pe = RandomWalkPe::new(2).encode(&adj);
        assert_abs_diff_eq!(pe[(2, 0)], 0.0);
        assert_abs_diff_eq!(pe[(2, 1)], 0.0);
    }
}
