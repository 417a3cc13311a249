use serde::{Deserialize, Serialize};
use strata_core::{
    mask, Decay, MaskConfig, MaskRng, MaskState, Optimizer, ReconstructionModel, RecoverySchedule,
    Result, StrataError, F,
};
use tracing::{info, warn};

use crate::dataset::PreparedGraph;
use crate::orchestrator::{Orchestrator, StepConfig};

/// Hyperparameters of the pretraining loop.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct PretrainConfig {
    pub max_epoch: usize,
    pub mask: MaskConfig,
    /// Recovery probability at epoch zero.
    pub recover_rate: F,
    /// Fraction of `max_epoch` over which recovery decays to zero.
    pub epoch_rate: F,
    pub gamma: F,
    pub decay: Decay,
    pub step: StepConfig,
    pub seed: u64,
}

impl Default for PretrainConfig {
    fn default() -> Self {
        Self {
            max_epoch: 20,
            mask: MaskConfig::default(),
            recover_rate: 0.1,
            epoch_rate: 0.5,
            gamma: 0.9,
            decay: Decay::Linear,
            step: StepConfig::default(),
            seed: 42,
        }
    }
}

/// Drives epochs over the prepared corpus: fresh mask sample + propagation
/// (+ recovery) per graph per step, one optimizer step per graph. The model
/// parameters are the only state that survives between steps.
pub struct PretrainLoop {
    cfg: PretrainConfig,
    orchestrator: Orchestrator,
}

impl PretrainLoop {
    pub fn new(cfg: PretrainConfig) -> Self {
        let orchestrator = Orchestrator::new(cfg.step);
        Self { cfg, orchestrator }
    }

    pub fn config(&self) -> &PretrainConfig {
        &self.cfg
    }

    /// Returns the mean loss of each epoch.
    pub fn run(
        &self,
        prepared: &[PreparedGraph],
        model: &mut dyn ReconstructionModel,
        optimizer: &mut dyn Optimizer,
    ) -> Result<Vec<F>> {
        if prepared.is_empty() {
            return Err(StrataError::Config("prepared corpus is empty".into()));
        }
        let schedule = RecoverySchedule::new(
            self.cfg.recover_rate,
            self.cfg.max_epoch as F * self.cfg.epoch_rate,
            self.cfg.gamma,
            self.cfg.decay,
        );

        let mut epoch_losses = Vec::with_capacity(self.cfg.max_epoch);
        for epoch in 0..self.cfg.max_epoch {
            let rate = schedule.rate_at(epoch);
            let mut losses = Vec::with_capacity(prepared.len());

            for (idx, prep) in prepared.iter().enumerate() {
                // Two derived streams per step: one for mask sampling and
                // recovery, one for the corruption inside the forward pass.
                // The corruption stream restarts per evaluation so the
                // optimizer compares candidates on identical corruption.
                let stream = (epoch * prepared.len() + idx) as u64;
                let mut mask_rng = MaskRng::derive(self.cfg.seed, 2 * stream);

                let n0 = prep.pyramid.base().graph.num_nodes();
                let base = match MaskState::sample(n0, &self.cfg.mask, &mut mask_rng) {
                    Ok(base) => base,
                    Err(StrataError::EmptySelection) => {
                        warn!(epoch, graph = idx, "mask selection is empty, skipping step");
                        continue;
                    }
                    Err(e) => return Err(e),
                };
                let mut states = mask::propagate(&base, &prep.pyramid)?;
                if rate > 0.0 {
                    mask::recover(&mut states, rate, &mut mask_rng);
                }

                let seed = self.cfg.seed;
                let step_stream = 2 * stream + 1;
                let orchestrator = &self.orchestrator;
                let mut eval = |m: &dyn ReconstructionModel| -> Result<F> {
                    let mut step_rng = MaskRng::derive(seed, step_stream);
                    orchestrator
                        .run_step(prep, m, &states, &mut step_rng)
                        .map(|out| out.loss)
                };

                match optimizer.step(model, &mut eval) {
                    Ok(loss) => losses.push(loss),
                    Err(StrataError::EmptySelection) => {
                        warn!(epoch, graph = idx, "recovery emptied the mask, skipping step");
                    }
                    Err(e) => return Err(e),
                }
            }

            let mean = if losses.is_empty() {
                warn!(epoch, "epoch produced no training steps");
                0.0
            } else {
                losses.iter().sum::<F>() / losses.len() as F
            };
            info!(epoch, mean_loss = mean, recover_rate = rate, "epoch complete");
            epoch_losses.push(mean);
        }
        Ok(epoch_losses)
    }
}
