use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use strata_core::{
    masked_cosine_loss, MaskRng, MaskState, ReconstructionModel, Result, StrataError, F,
};

use crate::dataset::PreparedGraph;

/// Per-step policy knobs.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct StepConfig {
    /// Drop edges incident to masked nodes before each encoder runs.
    pub mask_edges: bool,
    /// Exponent of the scaled cosine reconstruction error.
    pub alpha: F,
}

impl Default for StepConfig {
    fn default() -> Self {
        Self {
            mask_edges: false,
            alpha: 2.0,
        }
    }
}

/// Result of one encode/decode pass.
#[derive(Clone, Copy, Debug)]
pub struct StepOutput {
    pub loss: F,
    pub masked_rows: usize,
}

/// Runs the level-synchronized forward pass: corruption at the base,
/// bottom-up encoding with pooling, top-down decoding with masked-gated
/// skips and unpooling, then the masked reconstruction loss.
pub struct Orchestrator {
    cfg: StepConfig,
}

impl Orchestrator {
    pub fn new(cfg: StepConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &StepConfig {
        &self.cfg
    }

    pub fn run_step(
        &self,
        prepared: &PreparedGraph,
        model: &dyn ReconstructionModel,
        states: &[MaskState],
        rng: &mut MaskRng,
    ) -> Result<StepOutput> {
        let pyramid = &prepared.pyramid;
        let levels = pyramid.num_levels();
        if states.len() != levels {
            return Err(StrataError::shape("mask states", levels, states.len()));
        }
        if model.levels() != levels {
            return Err(StrataError::shape("model levels", levels, model.levels()));
        }
        for (i, state) in states.iter().enumerate() {
            let n = pyramid.level(i).graph.num_nodes();
            if state.len() != n {
                return Err(StrataError::shape(
                    format!("mask state at level {i}"),
                    n,
                    state.len(),
                ));
            }
        }

        let target = pyramid.base().graph.feats();
        let feats = self.corrupt(target, model, &states[0], rng)?;
        let super_feats = self.encode(pyramid, model, states, feats)?;
        let recon = self.decode(pyramid, model, states, &super_feats)?;

        let loss = masked_cosine_loss(target, &recon, &states[0].masked, self.cfg.alpha)?;
        Ok(StepOutput {
            loss,
            masked_rows: states[0].masked_count(),
        })
    }

    /// Base-level corruption: noise nodes take the features of donor nodes
    /// drawn as a seeded permutation prefix, token nodes take the learned
    /// placeholder.
    fn corrupt(
        &self,
        target: &DMatrix<F>,
        model: &dyn ReconstructionModel,
        base: &MaskState,
        rng: &mut MaskRng,
    ) -> Result<DMatrix<F>> {
        let n = target.nrows();
        let mut feats = target.clone();

        let noise_nodes = base.noise_indices();
        if !noise_nodes.is_empty() {
            let donors = rng.permutation(n);
            for (k, &node) in noise_nodes.iter().enumerate() {
                let donor = donors[k];
                for c in 0..feats.ncols() {
                    feats[(node, c)] = target[(donor, c)];
                }
            }
        }

        let token = model.mask_token();
        if token.len() != feats.ncols() {
            return Err(StrataError::shape(
                "mask token",
                feats.ncols(),
                token.len(),
            ));
        }
        for &node in &base.token_indices() {
            for c in 0..feats.ncols() {
                feats[(node, c)] = token[c];
            }
        }
        Ok(feats)
    }

    /// Bottom-up pass; returns every level's encoder output for the skips.
    fn encode(
        &self,
        pyramid: &strata_core::Pyramid,
        model: &dyn ReconstructionModel,
        states: &[MaskState],
        mut feats: DMatrix<F>,
    ) -> Result<Vec<DMatrix<F>>> {
        let levels = pyramid.num_levels();
        let mut super_feats = Vec::with_capacity(levels);

        for i in 0..levels {
            let level = pyramid.level(i);
            let mut adj = level.graph.adj().clone();
            if self.cfg.mask_edges {
                adj = adj.filter_incident(&states[i].masked);
            }
            let adj = adj.with_self_loops();

            let out = if i + 1 == levels {
                model
                    .encoder(i)
                    .forward_structural(&feats, &adj, level.pe.as_ref(), &states[i].masked)
            } else {
                model.encoder(i).forward(&feats, &adj)
            };
            if out.nrows() != level.graph.num_nodes() {
                return Err(StrataError::shape(
                    format!("encoder output at level {i}"),
                    format!("{} rows", level.graph.num_nodes()),
                    format!("{} rows", out.nrows()),
                ));
            }
            super_feats.push(out);

            if i + 1 < levels {
                feats = pyramid.proj_into(i + 1)?.pool(&super_feats[i])?;
            }
        }
        Ok(super_feats)
    }

    /// Top-down pass mirroring the encoder. The skip connection is gated by
    /// each level's mask so unmasked rows receive nothing.
    fn decode(
        &self,
        pyramid: &strata_core::Pyramid,
        model: &dyn ReconstructionModel,
        states: &[MaskState],
        super_feats: &[DMatrix<F>],
    ) -> Result<DMatrix<F>> {
        let levels = pyramid.num_levels();
        let mut feats = super_feats[levels - 1].clone();

        for i in (0..levels).rev() {
            if i + 1 != levels {
                let skip = &super_feats[i];
                if feats.shape() != skip.shape() {
                    return Err(StrataError::shape(
                        format!("skip connection at level {i}"),
                        format!("{:?}", skip.shape()),
                        format!("{:?}", feats.shape()),
                    ));
                }
                for (r, &m) in states[i].masked.iter().enumerate() {
                    if m {
                        for c in 0..feats.ncols() {
                            feats[(r, c)] += skip[(r, c)];
                        }
                    }
                }
            }

            let adj = pyramid.level(i).graph.adj().with_self_loops();
            feats = model.decoder(i).forward(&feats, &adj);
            if i > 0 {
                feats = pyramid.proj_into(i)?.unpool(&feats)?;
            }
        }
        Ok(feats)
    }
}
