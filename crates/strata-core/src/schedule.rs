use crate::F;
use serde::{Deserialize, Serialize};

/// Shape of the recovery-rate decay curve. Tunable, not a correctness
/// constraint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decay {
    Linear,
    Exponential,
}

/// Maps training progress to a recovery probability.
///
/// Starts at `base_rate` and decays monotonically to zero at `horizon`
/// epochs: early epochs un-mask generously (easy reconstruction), late
/// epochs leave the full corruption in place.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct RecoverySchedule {
    pub base_rate: F,
    pub horizon: F,
    pub gamma: F,
    pub decay: Decay,
}

impl RecoverySchedule {
    pub fn new(base_rate: F, horizon: F, gamma: F, decay: Decay) -> Self {
        Self {
            base_rate: base_rate.clamp(0.0, 1.0 - F::EPSILON),
            horizon,
            gamma,
            decay,
        }
    }

    pub fn rate_at(&self, epoch: usize) -> F {
        if self.base_rate <= 0.0 || self.horizon <= 0.0 {
            return 0.0;
        }
        let e = epoch as F;
        if e >= self.horizon {
            return 0.0;
        }
        let rate = match self.decay {
            Decay::Linear => self.base_rate * (1.0 - e / self.horizon),
            Decay::Exponential => self.base_rate * self.gamma.powf(e),
        };
        rate.clamp(0.0, 1.0 - F::EPSILON)
    }
}
