use crate::F;
use thiserror::Error;

/// Failure taxonomy for pyramid construction, masking, and the pretrain step.
///
/// None of these are retried anywhere; a variant either aborts the run or, in
/// the single case of [`StrataError::EmptySelection`], lets the pretrain loop
/// skip the step after logging a warning.
#[derive(Error, Debug)]
pub enum StrataError {
    /// Invalid coarsening depth/rate rejected before any work starts.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A coarsening step produced zero nodes or failed to shrink the graph.
    #[error("coarsening level {level} is degenerate: {nodes_in} -> {nodes_out} nodes")]
    DegenerateLevel {
        level: usize,
        nodes_in: usize,
        nodes_out: usize,
    },

    /// Collaborator output is dimensionally inconsistent with adjacent levels.
    #[error("shape mismatch in {what}: expected {expected}, found {found}")]
    ShapeMismatch {
        what: String,
        expected: String,
        found: String,
    },

    /// The configured mask ratio selected zero nodes at the base level.
    #[error("mask selection is empty at the base level")]
    EmptySelection,

    /// Reconstruction loss left the finite range; the run must halt.
    #[error("non-finite reconstruction loss: {value}")]
    NonFiniteLoss { value: F },
}

impl StrataError {
    pub fn shape(what: impl Into<String>, expected: impl ToString, found: impl ToString) -> Self {
        StrataError::ShapeMismatch {
            what: what.into(),
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }
}
