use std::path::{Path, PathBuf};

use strata_models::MaskedAutoencoder;

pub mod cli;
pub mod corpus;
pub mod manifest;

pub use manifest::RunManifest;

/// Fixed checkpoint filename inside the run's output directory.
pub const CHECKPOINT_FILE: &str = "checkpoint.json";
/// Manifest written beside the checkpoint.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Serialize the model parameters as an opaque JSON blob.
pub fn save_checkpoint(dir: &Path, model: &MaskedAutoencoder) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(CHECKPOINT_FILE);
    let blob = serde_json::to_string_pretty(model)?;
    std::fs::write(&path, blob)?;
    Ok(path)
}

pub fn load_checkpoint(dir: &Path) -> anyhow::Result<MaskedAutoencoder> {
    let path = dir.join(CHECKPOINT_FILE);
    let blob = std::fs::read_to_string(&path)?;
    let model = serde_json::from_str(&blob)?;
    Ok(model)
}
