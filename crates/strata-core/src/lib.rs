pub mod collab;
pub mod error;
pub mod graph;
pub mod loss;
pub mod mask;
pub mod projection;
pub mod pyramid;
pub mod rng;
pub mod schedule;

// Core types
pub type F = f32;
pub use error::StrataError;
pub use graph::{CooAdjacency, Graph};
pub use projection::{NodeGroupMap, Projection};
pub use pyramid::{CoarsenConfig, Pyramid, PyramidBuilder, PyramidLevel};
pub use rng::MaskRng;

// Masking machinery
pub use mask::{propagate, recover, MaskConfig, MaskState};
pub use schedule::{Decay, RecoverySchedule};

// Collaborator seams
pub use collab::{
    LevelDecoder, LevelEncoder, Optimizer, Partition, Partitioner, PositionalEncoder,
    ReconstructionModel,
};
pub use loss::masked_cosine_loss;

pub type Result<T> = std::result::Result<T, StrataError>;
