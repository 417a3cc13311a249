use crate::graph::{CooAdjacency, Graph};
use crate::projection::{NodeGroupMap, Projection};
use crate::rng::MaskRng;
use crate::{Result, F};
use nalgebra::{DMatrix, DVector};

/// One coarsening step's output: the pooling matrix, the coarse graph, and
/// the group map behind the projection's support.
#[derive(Clone, Debug)]
pub struct Partition {
    pub projection: Projection,
    pub graph: Graph,
    pub groups: NodeGroupMap,
}

/// Graph partitioning collaborator.
///
/// Must strictly reduce the node count except at a terminal fixed point; the
/// pyramid builder detects the fixed point and fails the level.
pub trait Partitioner: Send + Sync {
    fn partition(&self, graph: &Graph, rate: F, rng: &mut MaskRng) -> Result<Partition>;
}

/// Positional-encoding collaborator; one row of encoding per node.
pub trait PositionalEncoder: Send + Sync {
    fn encode(&self, adj: &CooAdjacency) -> DMatrix<F>;
}

/// Per-level encoder transform over (features, edges).
pub trait LevelEncoder: Send + Sync {
    fn forward(&self, feats: &DMatrix<F>, adj: &CooAdjacency) -> DMatrix<F>;

    /// Alternate structural path used at the coarsest level; also sees the
    /// level's positional encoding and mask. Defaults to the plain path.
    fn forward_structural(
        &self,
        feats: &DMatrix<F>,
        adj: &CooAdjacency,
        _pe: Option<&DMatrix<F>>,
        _masked: &[bool],
    ) -> DMatrix<F> {
        self.forward(feats, adj)
    }
}

/// Per-level decoder transform over (features, edges).
pub trait LevelDecoder: Send + Sync {
    fn forward(&self, feats: &DMatrix<F>, adj: &CooAdjacency) -> DMatrix<F>;
}

/// The learned model the orchestrator drives: one encoder and one decoder
/// per pyramid level, plus the learned mask token that replaces token-node
/// inputs. Parameters are exposed as a flat vector so optimizers stay
/// decoupled from the layer layout.
pub trait ReconstructionModel: Send + Sync {
    fn levels(&self) -> usize;
    fn encoder(&self, level: usize) -> &dyn LevelEncoder;
    fn decoder(&self, level: usize) -> &dyn LevelDecoder;
    fn mask_token(&self) -> &DVector<F>;
    fn params(&self) -> Vec<F>;
    fn set_params(&mut self, flat: &[F]);
}

/// Optimizer collaborator. Receives a loss-evaluation closure instead of a
/// gradient so gradient-free methods can re-evaluate candidate parameters;
/// returns the loss accepted for this step.
pub trait Optimizer: Send {
    fn step(
        &mut self,
        model: &mut dyn ReconstructionModel,
        eval: &mut dyn FnMut(&dyn ReconstructionModel) -> Result<F>,
    ) -> Result<F>;
}
