use crate::error::StrataError;
use crate::pyramid::Pyramid;
use crate::rng::MaskRng;
use crate::{Result, F};
use serde::{Deserialize, Serialize};

/// Mask ratios for the base-level sample.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct MaskConfig {
    /// Fraction of base nodes selected as reconstruction targets.
    pub mask_ratio: F,
    /// Fraction of masked nodes whose input becomes the learned token.
    pub token_ratio: F,
}

impl Default for MaskConfig {
    fn default() -> Self {
        Self {
            mask_ratio: 0.5,
            token_ratio: 0.9,
        }
    }
}

/// Per-level corruption assignment.
///
/// `token` is always a subset of `masked`. `noise` is the masked-minus-token
/// remainder and exists at the base level only; propagated levels derive
/// their `masked`/`token` sets through the projection and keep `noise` empty.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MaskState {
    pub masked: Vec<bool>,
    pub token: Vec<bool>,
    pub noise: Vec<bool>,
}

impl MaskState {
    pub fn empty(n: usize) -> Self {
        Self {
            masked: vec![false; n],
            token: vec![false; n],
            noise: vec![false; n],
        }
    }

    pub fn len(&self) -> usize {
        self.masked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.masked.is_empty()
    }

    pub fn masked_count(&self) -> usize {
        self.masked.iter().filter(|&&m| m).count()
    }

    pub fn masked_indices(&self) -> Vec<usize> {
        indices_of(&self.masked)
    }

    pub fn token_indices(&self) -> Vec<usize> {
        indices_of(&self.token)
    }

    pub fn noise_indices(&self) -> Vec<usize> {
        indices_of(&self.noise)
    }

    /// Sample the base-level assignment: a uniform subset of
    /// `round(mask_ratio * n)` masked nodes, a uniform token subset within
    /// it, and the noise remainder.
    pub fn sample(n: usize, cfg: &MaskConfig, rng: &mut MaskRng) -> Result<Self> {
        let n_mask = (cfg.mask_ratio * n as F).round() as usize;
        if n_mask == 0 {
            return Err(StrataError::EmptySelection);
        }
        let n_mask = n_mask.min(n);
        let picked = rng.subset(n, n_mask);
        let n_token = ((cfg.token_ratio * n_mask as F).round() as usize).min(n_mask);
        let token_slots = rng.subset(n_mask, n_token);

        let mut state = Self::empty(n);
        for &i in &picked {
            state.masked[i] = true;
        }
        for &slot in &token_slots {
            state.token[picked[slot]] = true;
        }
        for i in 0..n {
            state.noise[i] = state.masked[i] && !state.token[i];
        }
        Ok(state)
    }
}

fn indices_of(flags: &[bool]) -> Vec<usize> {
    flags
        .iter()
        .enumerate()
        .filter_map(|(i, &f)| f.then_some(i))
        .collect()
}

/// Propagate the base assignment up the pyramid.
///
/// A coarse node is masked (token) iff the projected mass of its masked
/// (token) fine members strictly exceeds half of its total projected mass —
/// the weighted majority rule. Deterministic given the base sample.
pub fn propagate(base: &MaskState, pyramid: &Pyramid) -> Result<Vec<MaskState>> {
    let n0 = pyramid.base().graph.num_nodes();
    if base.len() != n0 {
        return Err(StrataError::shape("base mask", n0, base.len()));
    }

    let mut states = Vec::with_capacity(pyramid.num_levels());
    states.push(base.clone());
    for i in 1..pyramid.num_levels() {
        let proj = pyramid.proj_into(i)?;
        let prev = &states[i - 1];
        let total = proj.row_masses();
        let masked_mass = proj.flagged_masses(&prev.masked)?;
        let token_mass = proj.flagged_masses(&prev.token)?;

        let n = proj.n_coarse();
        let mut state = MaskState::empty(n);
        for r in 0..n {
            let half = 0.5 * total[r];
            state.masked[r] = masked_mass[r] > half;
            state.token[r] = token_mass[r] > half;
        }
        debug_assert!(
            state
                .token
                .iter()
                .zip(&state.masked)
                .all(|(&t, &m)| !t || m),
            "token set escaped the masked set during propagation"
        );
        states.push(state);
    }
    Ok(states)
}

/// Probabilistically un-mask nodes at every level.
///
/// Each masked node independently flips back with probability `rate`; its
/// token/noise flags are cleared with it. Levels are treated independently.
pub fn recover(states: &mut [MaskState], rate: F, rng: &mut MaskRng) {
    if rate <= 0.0 {
        return;
    }
    for state in states.iter_mut() {
        for i in 0..state.len() {
            if state.masked[i] && rng.bernoulli(rate) {
                state.masked[i] = false;
                state.token[i] = false;
                state.noise[i] = false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_counts() {
        let cfg = MaskConfig {
            mask_ratio: 0.5,
            token_ratio: 1.0,
        };
        let mut rng = MaskRng::new(3);
        let state = MaskState::sample(6, &cfg, &mut rng).unwrap();
        assert_eq!(state.masked_count(), 3);
        assert_eq!(state.token_indices().len(), 3);
        assert!(state.noise_indices().is_empty());
    }

    #[test]
    fn test_sample_empty_selection() {
        let cfg = MaskConfig {
            mask_ratio: 0.0,
            token_ratio: 1.0,
        };
        let mut rng = MaskRng::new(3);
        let err = MaskState::sample(6, &cfg, &mut rng);
        assert!(matches!(err, Err(StrataError::EmptySelection)));
    }

    #[test]
    fn test_noise_is_masked_minus_token() {
        let cfg = MaskConfig {
            mask_ratio: 0.75,
            token_ratio: 0.5,
        };
        let mut rng = MaskRng::new(11);
        let state = MaskState::sample(16, &cfg, &mut rng).unwrap();
        for i in 0..state.len() {
            assert_eq!(state.noise[i], state.masked[i] && !state.token[i]);
            if state.token[i] {
                assert!(state.masked[i]);
            }
        }
    }
}
