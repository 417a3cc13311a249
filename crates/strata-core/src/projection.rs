use crate::error::StrataError;
use crate::{Result, F};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

/// Coarse node id -> constituent finer-level node ids.
///
/// Owned by the pyramid for its lifetime; used for auditing and tests, not
/// for the numeric path.
pub type NodeGroupMap = Vec<Vec<usize>>;

/// Pooling matrix between a fine level and its coarser neighbor.
///
/// Shape is (coarse nodes, fine nodes). Row `r` holds the membership weights
/// of the fine nodes merged into super-node `r`; each fine column's total
/// mass must stay within 1 (membership conservation).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Projection {
    n_coarse: usize,
    n_fine: usize,
    rows: Vec<usize>,
    cols: Vec<usize>,
    vals: Vec<F>,
}

impl Projection {
    pub fn from_triplets(
        n_coarse: usize,
        n_fine: usize,
        triplets: &[(usize, usize, F)],
    ) -> Result<Self> {
        let mut col_mass = vec![0.0; n_fine];
        let mut rows = Vec::with_capacity(triplets.len());
        let mut cols = Vec::with_capacity(triplets.len());
        let mut vals = Vec::with_capacity(triplets.len());
        for &(r, c, v) in triplets {
            if r >= n_coarse || c >= n_fine {
                return Err(StrataError::shape(
                    "projection triplet",
                    format!("indices < ({n_coarse}, {n_fine})"),
                    format!("({r}, {c})"),
                ));
            }
            if v < 0.0 {
                return Err(StrataError::shape(
                    "projection weight",
                    "non-negative",
                    v,
                ));
            }
            col_mass[c] += v;
            rows.push(r);
            cols.push(c);
            vals.push(v);
        }
        for (c, &mass) in col_mass.iter().enumerate() {
            if mass > 1.0 + 1e-4 {
                return Err(StrataError::shape(
                    format!("projection column {c} mass"),
                    "<= 1",
                    mass,
                ));
            }
        }
        Ok(Self {
            n_coarse,
            n_fine,
            rows,
            cols,
            vals,
        })
    }

    /// Mean-pooling projection from an explicit group map.
    pub fn from_groups(groups: &NodeGroupMap, n_fine: usize) -> Result<Self> {
        let mut triplets = Vec::with_capacity(n_fine);
        for (r, members) in groups.iter().enumerate() {
            if members.is_empty() {
                return Err(StrataError::shape(
                    format!("projection group {r}"),
                    "non-empty member set",
                    "empty",
                ));
            }
            let w = 1.0 / members.len() as F;
            for &c in members {
                triplets.push((r, c, w));
            }
        }
        Self::from_triplets(groups.len(), n_fine, &triplets)
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.n_coarse, self.n_fine)
    }

    pub fn n_coarse(&self) -> usize {
        self.n_coarse
    }

    pub fn n_fine(&self) -> usize {
        self.n_fine
    }

    pub fn triplets(&self) -> impl Iterator<Item = (usize, usize, F)> + '_ {
        self.rows
            .iter()
            .zip(&self.cols)
            .zip(&self.vals)
            .map(|((&r, &c), &v)| (r, c, v))
    }

    /// `P * x`: fine features down to the coarse row space.
    pub fn pool(&self, x: &DMatrix<F>) -> Result<DMatrix<F>> {
        if x.nrows() != self.n_fine {
            return Err(StrataError::shape(
                "pool input",
                format!("{} rows", self.n_fine),
                format!("{} rows", x.nrows()),
            ));
        }
        let mut out = DMatrix::zeros(self.n_coarse, x.ncols());
        for (r, c, v) in self.triplets() {
            for k in 0..x.ncols() {
                out[(r, k)] += v * x[(c, k)];
            }
        }
        Ok(out)
    }

    /// `P^T * x`: coarse features back up to the fine row space.
    pub fn unpool(&self, x: &DMatrix<F>) -> Result<DMatrix<F>> {
        if x.nrows() != self.n_coarse {
            return Err(StrataError::shape(
                "unpool input",
                format!("{} rows", self.n_coarse),
                format!("{} rows", x.nrows()),
            ));
        }
        let mut out = DMatrix::zeros(self.n_fine, x.ncols());
        for (r, c, v) in self.triplets() {
            for k in 0..x.ncols() {
                out[(c, k)] += v * x[(r, k)];
            }
        }
        Ok(out)
    }

    /// Total projected mass per coarse row.
    pub fn row_masses(&self) -> Vec<F> {
        let mut mass = vec![0.0; self.n_coarse];
        for (r, _, v) in self.triplets() {
            mass[r] += v;
        }
        mass
    }

    /// Projected mass per coarse row restricted to flagged fine nodes.
    pub fn flagged_masses(&self, flags: &[bool]) -> Result<Vec<F>> {
        if flags.len() != self.n_fine {
            return Err(StrataError::shape(
                "flag vector",
                self.n_fine,
                flags.len(),
            ));
        }
        let mut mass = vec![0.0; self.n_coarse];
        for (r, c, v) in self.triplets() {
            if flags[c] {
                mass[r] += v;
            }
        }
        Ok(mass)
    }
}
