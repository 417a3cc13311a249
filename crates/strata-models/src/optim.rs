use strata_core::{MaskRng, Optimizer, ReconstructionModel, Result, F};

const MIN_STEP: F = 1e-5;

/// Gradient-free random-perturbation descent.
///
/// Each step proposes a Gaussian perturbation of the flat parameter vector
/// and keeps it iff the re-evaluated loss does not worsen; the step size
/// shrinks on rejection. Works entirely through the loss-evaluation closure,
/// so the training machinery never needs gradients.
pub struct PerturbationDescent {
    step: F,
    shrink: F,
    rng: MaskRng,
}

impl PerturbationDescent {
    pub fn new(step: F, shrink: F, rng: MaskRng) -> Self {
        Self { step, shrink, rng }
    }

    pub fn step_size(&self) -> F {
        self.step
    }
}

impl Optimizer for PerturbationDescent {
    fn step(
        &mut self,
        model: &mut dyn ReconstructionModel,
        eval: &mut dyn FnMut(&dyn ReconstructionModel) -> Result<F>,
    ) -> Result<F> {
        let baseline = eval(&*model)?;

        let params = model.params();
        let mut proposal = params.clone();
        for p in proposal.iter_mut() {
            *p += self.step * self.rng.std_normal();
        }
        model.set_params(&proposal);

        let candidate = eval(&*model)?;
        if candidate <= baseline {
            Ok(candidate)
        } else {
            model.set_params(&params);
            self.step = (self.step * self.shrink).max(MIN_STEP);
            Ok(baseline)
        }
    }
}
