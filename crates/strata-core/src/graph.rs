use crate::error::StrataError;
use crate::{Result, F};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Sparse adjacency in coordinate form.
///
/// Undirected graphs store both orientations of every edge. Entries with the
/// same (row, col) are additive, matching the usual COO convention.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CooAdjacency {
    n: usize,
    rows: Vec<usize>,
    cols: Vec<usize>,
    vals: Vec<F>,
}

impl CooAdjacency {
    pub fn new(n: usize) -> Self {
        Self {
            n,
            rows: Vec::new(),
            cols: Vec::new(),
            vals: Vec::new(),
        }
    }

    /// Build from (row, col, weight) triplets.
    pub fn from_triplets(n: usize, triplets: &[(usize, usize, F)]) -> Result<Self> {
        let mut adj = Self::new(n);
        for &(r, c, v) in triplets {
            if r >= n || c >= n {
                return Err(StrataError::shape(
                    "adjacency triplet",
                    format!("indices < {n}"),
                    format!("({r}, {c})"),
                ));
            }
            adj.rows.push(r);
            adj.cols.push(c);
            adj.vals.push(v);
        }
        Ok(adj)
    }

    /// Undirected unit-weight edge list; inserts both orientations.
    pub fn from_undirected_edges(n: usize, edges: &[(usize, usize)]) -> Result<Self> {
        let mut triplets = Vec::with_capacity(edges.len() * 2);
        for &(u, v) in edges {
            triplets.push((u, v, 1.0));
            if u != v {
                triplets.push((v, u, 1.0));
            }
        }
        Self::from_triplets(n, &triplets)
    }

    pub fn num_nodes(&self) -> usize {
        self.n
    }

    pub fn nnz(&self) -> usize {
        self.vals.len()
    }

    pub fn triplets(&self) -> impl Iterator<Item = (usize, usize, F)> + '_ {
        self.rows
            .iter()
            .zip(&self.cols)
            .zip(&self.vals)
            .map(|((&r, &c), &v)| (r, c, v))
    }

    /// Drop diagonal entries (self-loop removal ahead of clustering).
    pub fn zero_diag(&self) -> Self {
        let mut out = Self::new(self.n);
        for (r, c, v) in self.triplets() {
            if r != c {
                out.rows.push(r);
                out.cols.push(c);
                out.vals.push(v);
            }
        }
        out
    }

    /// Drop existing diagonal entries and insert one unit self-loop per node.
    pub fn with_self_loops(&self) -> Self {
        let mut out = self.zero_diag();
        for i in 0..self.n {
            out.rows.push(i);
            out.cols.push(i);
            out.vals.push(1.0);
        }
        out
    }

    /// Elementwise maximum with the transpose; coalesces duplicates.
    pub fn symmetrize_max(&self) -> Self {
        let mut entries: HashMap<(usize, usize), F> = HashMap::with_capacity(self.nnz() * 2);
        for (r, c, v) in self.triplets() {
            let a = entries.entry((r, c)).or_insert(v);
            *a = a.max(v);
            let b = entries.entry((c, r)).or_insert(v);
            *b = b.max(v);
        }
        let mut out = Self::new(self.n);
        let mut keys: Vec<(usize, usize)> = entries.keys().copied().collect();
        keys.sort_unstable();
        for (r, c) in keys {
            out.rows.push(r);
            out.cols.push(c);
            out.vals.push(entries[&(r, c)]);
        }
        out
    }

    /// Weighted degree (row sums).
    pub fn degrees(&self) -> Vec<F> {
        let mut deg = vec![0.0; self.n];
        for (r, _, v) in self.triplets() {
            deg[r] += v;
        }
        deg
    }

    /// Drop every edge incident to a masked node (edge-masking policy).
    pub fn filter_incident(&self, masked: &[bool]) -> Self {
        let mut out = Self::new(self.n);
        for (r, c, v) in self.triplets() {
            if !masked[r] && !masked[c] {
                out.rows.push(r);
                out.cols.push(c);
                out.vals.push(v);
            }
        }
        out
    }

    /// Neighbor lists with weights, diagonal excluded.
    pub fn neighbor_lists(&self) -> Vec<Vec<(usize, F)>> {
        let mut lists = vec![Vec::new(); self.n];
        for (r, c, v) in self.triplets() {
            if r != c {
                lists[r].push((c, v));
            }
        }
        lists
    }

    pub fn to_dense(&self) -> DMatrix<F> {
        let mut m = DMatrix::zeros(self.n, self.n);
        for (r, c, v) in self.triplets() {
            m[(r, c)] += v;
        }
        m
    }
}

/// A graph at one pyramid level: sparse adjacency plus dense node features.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Graph {
    adj: CooAdjacency,
    feats: DMatrix<F>,
}

impl Graph {
    pub fn new(adj: CooAdjacency, feats: DMatrix<F>) -> Result<Self> {
        if feats.nrows() != adj.num_nodes() {
            return Err(StrataError::shape(
                "graph features",
                format!("{} rows", adj.num_nodes()),
                format!("{} rows", feats.nrows()),
            ));
        }
        Ok(Self { adj, feats })
    }

    pub fn num_nodes(&self) -> usize {
        self.adj.num_nodes()
    }

    pub fn feat_dim(&self) -> usize {
        self.feats.ncols()
    }

    pub fn adj(&self) -> &CooAdjacency {
        &self.adj
    }

    pub fn feats(&self) -> &DMatrix<F> {
        &self.feats
    }
}
