use std::path::Path;

use serde::{Deserialize, Serialize};
use strata_core::{CoarsenConfig, F};
use strata_train::PretrainConfig;

/// Run manifest for complete reproducibility, written beside the checkpoint.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: String,
    pub timestamp: String,
    pub seed: u64,
    pub partitioner: String,
    pub levels: usize,
    pub coarsen_rate: F,
    pub mask_ratio: F,
    pub token_ratio: F,
    pub recover_rate: F,
    pub epoch_rate: F,
    pub gamma: F,
    pub decay: String,
    pub mask_edges: bool,
    pub epochs: usize,
    pub hidden: usize,
    pub pe_steps: usize,
    pub n_graphs: usize,
    pub final_loss: Option<F>,
    pub commit_hash: Option<String>,
    pub rust_version: String,
}

impl RunManifest {
    pub fn new(
        partitioner: &str,
        coarsen: &CoarsenConfig,
        pretrain: &PretrainConfig,
        hidden: usize,
        pe_steps: usize,
        n_graphs: usize,
        final_loss: Option<F>,
    ) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            seed: pretrain.seed,
            partitioner: partitioner.to_string(),
            levels: coarsen.levels,
            coarsen_rate: coarsen.rate,
            mask_ratio: pretrain.mask.mask_ratio,
            token_ratio: pretrain.mask.token_ratio,
            recover_rate: pretrain.recover_rate,
            epoch_rate: pretrain.epoch_rate,
            gamma: pretrain.gamma,
            decay: format!("{:?}", pretrain.decay).to_lowercase(),
            mask_edges: pretrain.step.mask_edges,
            epochs: pretrain.max_epoch,
            hidden,
            pe_steps,
            n_graphs,
            final_loss,
            commit_hash: get_git_commit(),
            rust_version: get_rust_version(),
        }
    }

    pub fn save_to_file(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let manifest = serde_json::from_str(&json)?;
        Ok(manifest)
    }
}

fn get_git_commit() -> Option<String> {
    std::process::Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
        .ok()
        .and_then(|output| {
            if output.status.success() {
                String::from_utf8(output.stdout).ok()
            } else {
                None
            }
        })
        .map(|s| s.trim().to_string())
}

fn get_rust_version() -> String {
    std::process::Command::new("rustc")
        .arg("--version")
        .output()
        .ok()
        .and_then(|output| {
            if output.status.success() {
                String::from_utf8(output.stdout).ok()
            } else {
                None
            }
        })
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_round_trip() {
        let manifest = RunManifest::new(
            "heavy-edge",
            &CoarsenConfig::default(),
            &PretrainConfig::default(),
            16,
            8,
            32,
            Some(0.42),
        );
        let path = std::env::temp_dir().join("strata-manifest-test.json");
        manifest.save_to_file(&path).unwrap();
        let back = RunManifest::load_from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(back.run_id, manifest.run_id);
        assert_eq!(back.partitioner, "heavy-edge");
        assert_eq!(back.decay, "linear");
        assert_eq!(back.final_loss, Some(0.42));
    }
}
