use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use strata_core::{
    LevelDecoder, LevelEncoder, MaskRng, ReconstructionModel, Result, StrataError, F,
};

use crate::layers::{Encoder, PeMixLayer, PropagationLayer};

/// Shape of the per-level autoencoder stack.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Pyramid levels the model must cover, base included.
    pub levels: usize,
    pub in_dim: usize,
    pub hidden: usize,
    /// Width of the positional encoding consumed by the structural top
    /// encoder; ignored when `structural_top` is off.
    pub pe_dim: usize,
    /// Use the positional-encoding path at the coarsest level.
    pub structural_top: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            levels: 2,
            in_dim: 8,
            hidden: 16,
            pe_dim: 8,
            structural_top: true,
        }
    }
}

/// One encoder and one decoder layer per pyramid level, plus the learned
/// placeholder that replaces token-node inputs. The level-0 encoder maps
/// input features into the hidden space; the level-0 decoder maps back out
/// so the reconstruction is comparable with the original features.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MaskedAutoencoder {
    cfg: ModelConfig,
    encoders: Vec<Encoder>,
    decoders: Vec<PropagationLayer>,
    mask_token: DVector<F>,
}

impl MaskedAutoencoder {
    pub fn new(cfg: &ModelConfig, rng: &mut MaskRng) -> Result<Self> {
        if cfg.levels == 0 {
            return Err(StrataError::Config("model needs at least one level".into()));
        }
        if cfg.in_dim == 0 || cfg.hidden == 0 {
            return Err(StrataError::Config(format!(
                "feature dims must be positive, got in_dim {} hidden {}",
                cfg.in_dim, cfg.hidden
            )));
        }
        if cfg.structural_top && cfg.pe_dim == 0 {
            return Err(StrataError::Config(
                "structural top encoder needs a positive pe_dim".into(),
            ));
        }

        let top = cfg.levels - 1;
        let mut encoders = Vec::with_capacity(cfg.levels);
        for i in 0..cfg.levels {
            let in_dim = if i == 0 { cfg.in_dim } else { cfg.hidden };
            let enc = if i == top && cfg.structural_top {
                Encoder::PeMix(PeMixLayer::new(in_dim, cfg.hidden, cfg.pe_dim, rng))
            } else {
                Encoder::Propagation(PropagationLayer::new(in_dim, cfg.hidden, rng))
            };
            encoders.push(enc);
        }

        let mut decoders = Vec::with_capacity(cfg.levels);
        for i in 0..cfg.levels {
            let out_dim = if i == 0 { cfg.in_dim } else { cfg.hidden };
            decoders.push(PropagationLayer::new(cfg.hidden, out_dim, rng));
        }

        Ok(Self {
            cfg: *cfg,
            encoders,
            decoders,
            // Learned placeholder starts at zero, like the rest of the
            // corruption pipeline expects.
            mask_token: DVector::zeros(cfg.in_dim),
        })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.cfg
    }

    pub fn num_params(&self) -> usize {
        let enc: usize = self.encoders.iter().map(Encoder::param_len).sum();
        let dec: usize = self.decoders.iter().map(PropagationLayer::param_len).sum();
        enc + dec + self.mask_token.len()
    }
}

impl ReconstructionModel for MaskedAutoencoder {
    fn levels(&self) -> usize {
        self.cfg.levels
    }

    fn encoder(&self, level: usize) -> &dyn LevelEncoder {
        &self.encoders[level]
    }

    fn decoder(&self, level: usize) -> &dyn LevelDecoder {
        &self.decoders[level]
    }

    fn mask_token(&self) -> &DVector<F> {
        &self.mask_token
    }

    fn params(&self) -> Vec<F> {
        let mut flat = Vec::with_capacity(self.num_params());
        for enc in &self.encoders {
            enc.write_params(&mut flat);
        }
        for dec in &self.decoders {
            dec.write_params(&mut flat);
        }
        flat.extend(self.mask_token.iter());
        flat
    }

    fn set_params(&mut self, flat: &[F]) {
        assert_eq!(flat.len(), self.num_params(), "parameter vector length");
        let mut offset = 0;
        for enc in &mut self.encoders {
            offset += enc.read_params(&flat[offset..]);
        }
        for dec in &mut self.decoders {
            offset += dec.read_params(&flat[offset..]);
        }
        self.mask_token = DVector::from_iterator(
            self.mask_token.len(),
            flat[offset..].iter().copied(),
        );
    }
}
