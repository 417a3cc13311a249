pub mod dataset;
pub mod orchestrator;
pub mod pretrain;

pub use dataset::{prepare, Corpus, PreparedGraph};
pub use orchestrator::{Orchestrator, StepConfig, StepOutput};
pub use pretrain::{PretrainConfig, PretrainLoop};
