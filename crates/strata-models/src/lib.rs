pub mod layers;
pub mod matching;
pub mod model;
pub mod optim;
pub mod pe;

pub use layers::{Encoder, PeMixLayer, PropagationLayer};
pub use matching::{HeavyEdgeMatching, RandomMatching};
pub use model::{MaskedAutoencoder, ModelConfig};
pub use optim::PerturbationDescent;
pub use pe::RandomWalkPe;
