use crate::collab::{Partitioner, PositionalEncoder};
use crate::error::StrataError;
use crate::graph::Graph;
use crate::projection::{NodeGroupMap, Projection};
use crate::rng::MaskRng;
use crate::{Result, F};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

/// Coarsening configuration.
///
/// `levels` counts pyramid levels including the base, so `levels - 1`
/// coarsening steps run. `rate` is the fraction of nodes a step keeps.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct CoarsenConfig {
    pub levels: usize,
    pub rate: F,
}

impl Default for CoarsenConfig {
    fn default() -> Self {
        Self {
            levels: 2,
            rate: 0.5,
        }
    }
}

/// One pyramid level. `proj` and `groups` link this level down to the
/// previous (finer) one and are absent at the base.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PyramidLevel {
    pub graph: Graph,
    pub pe: Option<DMatrix<F>>,
    pub proj: Option<Projection>,
    pub groups: Option<NodeGroupMap>,
}

/// Fixed chain of progressively coarser graphs, built once and indexed,
/// never structurally mutated. Node counts strictly decrease with level.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Pyramid {
    levels: Vec<PyramidLevel>,
}

impl Pyramid {
    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    pub fn level(&self, i: usize) -> &PyramidLevel {
        &self.levels[i]
    }

    pub fn levels(&self) -> &[PyramidLevel] {
        &self.levels
    }

    pub fn base(&self) -> &PyramidLevel {
        &self.levels[0]
    }

    pub fn coarsest(&self) -> &PyramidLevel {
        self.levels.last().expect("pyramid has at least the base level")
    }

    /// Projection mapping level `i - 1` down to level `i`.
    pub fn proj_into(&self, i: usize) -> Result<&Projection> {
        self.levels[i].proj.as_ref().ok_or_else(|| {
            StrataError::shape(format!("projection into level {i}"), "present", "absent")
        })
    }
}

/// Builds the coarsening pyramid by repeatedly invoking the partitioning
/// collaborator, validating every level before accepting it.
pub struct PyramidBuilder {
    cfg: CoarsenConfig,
}

impl PyramidBuilder {
    pub fn new(cfg: CoarsenConfig) -> Result<Self> {
        if cfg.levels < 2 {
            return Err(StrataError::Config(format!(
                "coarsening needs at least 2 levels, got {}",
                cfg.levels
            )));
        }
        if !(cfg.rate > 0.0 && cfg.rate < 1.0) {
            return Err(StrataError::Config(format!(
                "coarsening rate must lie in (0, 1), got {}",
                cfg.rate
            )));
        }
        Ok(Self { cfg })
    }

    pub fn config(&self) -> &CoarsenConfig {
        &self.cfg
    }

    /// Build the pyramid for one graph. Level 0 is the input unchanged; the
    /// input is never mutated. Positional encodings are computed for every
    /// new coarse level only.
    pub fn build(
        &self,
        graph: &Graph,
        partitioner: &dyn Partitioner,
        pe: &dyn PositionalEncoder,
        rng: &mut MaskRng,
    ) -> Result<Pyramid> {
        let mut levels = Vec::with_capacity(self.cfg.levels);
        levels.push(PyramidLevel {
            graph: graph.clone(),
            pe: None,
            proj: None,
            groups: None,
        });

        for i in 1..self.cfg.levels {
            let prev = &levels[i - 1];
            let n_prev = prev.graph.num_nodes();

            // Self-loops are excluded from the clustering decision.
            let clean = Graph::new(prev.graph.adj().zero_diag(), prev.graph.feats().clone())?;
            let part = partitioner.partition(&clean, self.cfg.rate, rng)?;

            let n_coarse = part.graph.num_nodes();
            if n_coarse == 0 || n_coarse >= n_prev {
                return Err(StrataError::DegenerateLevel {
                    level: i,
                    nodes_in: n_prev,
                    nodes_out: n_coarse,
                });
            }
            let (pc, pf) = part.projection.shape();
            if pc != n_coarse || pf != n_prev {
                return Err(StrataError::shape(
                    format!("projection into level {i}"),
                    format!("({n_coarse}, {n_prev})"),
                    format!("({pc}, {pf})"),
                ));
            }

            // Undirected invariant on the new adjacency.
            let coarse_adj = part.graph.adj().symmetrize_max();
            let coarse = Graph::new(coarse_adj, part.graph.feats().clone())?;
            let encoding = pe.encode(coarse.adj());
            if encoding.nrows() != n_coarse {
                return Err(StrataError::shape(
                    format!("positional encoding at level {i}"),
                    format!("{n_coarse} rows"),
                    format!("{} rows", encoding.nrows()),
                ));
            }

            tracing::debug!(level = i, nodes = n_coarse, edges = coarse.adj().nnz(), "coarsened");
            levels.push(PyramidLevel {
                graph: coarse,
                pe: Some(encoding),
                proj: Some(part.projection),
                groups: Some(part.groups),
            });
        }

        Ok(Pyramid { levels })
    }
}
