use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use strata_core::{CooAdjacency, LevelDecoder, LevelEncoder, MaskRng, F};

const LEAKY_SLOPE: F = 0.2;

/// Degree-normalized neighborhood smoothing followed by a learned linear map
/// and a leaky ReLU. Serves as both encoder and decoder layer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PropagationLayer {
    w: DMatrix<F>,
}

impl PropagationLayer {
    /// Xavier-uniform weights from the given rng stream.
    pub fn new(in_dim: usize, out_dim: usize, rng: &mut MaskRng) -> Self {
        let bound = (6.0 / (in_dim + out_dim) as F).sqrt();
        let w = DMatrix::from_fn(in_dim, out_dim, |_, _| rng.uniform(-bound, bound));
        Self { w }
    }

    pub fn in_dim(&self) -> usize {
        self.w.nrows()
    }

    pub fn out_dim(&self) -> usize {
        self.w.ncols()
    }

    /// `leaky_relu(norm(A) * x * W)` with symmetric degree normalization.
    pub fn apply(&self, feats: &DMatrix<F>, adj: &CooAdjacency) -> DMatrix<F> {
        let n = feats.nrows();
        let deg = adj.degrees();
        let norm: Vec<F> = deg
            .iter()
            .map(|&d| if d > 0.0 { 1.0 / d.sqrt() } else { 0.0 })
            .collect();

        let mut smoothed = DMatrix::zeros(n, feats.ncols());
        for (r, c, v) in adj.triplets() {
            let w = v * norm[r] * norm[c];
            for k in 0..feats.ncols() {
                smoothed[(r, k)] += w * feats[(c, k)];
            }
        }

        let mut out = smoothed * &self.w;
        for v in out.iter_mut() {
            if *v < 0.0 {
                *v *= LEAKY_SLOPE;
            }
        }
        out
    }

    pub fn param_len(&self) -> usize {
        self.w.len()
    }

    pub fn write_params(&self, out: &mut Vec<F>) {
        out.extend(self.w.iter());
    }

    /// Reads `param_len` values back in `write_params` order; returns the
    /// number consumed.
    pub fn read_params(&mut self, flat: &[F]) -> usize {
        let (r, c) = self.w.shape();
        let n = r * c;
        self.w = DMatrix::from_iterator(r, c, flat[..n].iter().copied());
        n
    }
}

impl LevelEncoder for PropagationLayer {
    fn forward(&self, feats: &DMatrix<F>, adj: &CooAdjacency) -> DMatrix<F> {
        self.apply(feats, adj)
    }
}

impl LevelDecoder for PropagationLayer {
    fn forward(&self, feats: &DMatrix<F>, adj: &CooAdjacency) -> DMatrix<F> {
        self.apply(feats, adj)
    }
}

/// Structural encoder for the coarsest level: mixes the level's positional
/// encoding into the input before the propagation layer runs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PeMixLayer {
    mix: DMatrix<F>,
    layer: PropagationLayer,
}

impl PeMixLayer {
    pub fn new(in_dim: usize, out_dim: usize, pe_dim: usize, rng: &mut MaskRng) -> Self {
        let bound = (6.0 / (pe_dim + in_dim) as F).sqrt();
        let mix = DMatrix::from_fn(pe_dim, in_dim, |_, _| rng.uniform(-bound, bound));
        Self {
            mix,
            layer: PropagationLayer::new(in_dim, out_dim, rng),
        }
    }

    pub fn param_len(&self) -> usize {
        self.mix.len() + self.layer.param_len()
    }

    pub fn write_params(&self, out: &mut Vec<F>) {
        out.extend(self.mix.iter());
        self.layer.write_params(out);
    }

    pub fn read_params(&mut self, flat: &[F]) -> usize {
        let (r, c) = self.mix.shape();
        let n = r * c;
        self.mix = DMatrix::from_iterator(r, c, flat[..n].iter().copied());
        n + self.layer.read_params(&flat[n..])
    }
}

impl LevelEncoder for PeMixLayer {
    fn forward(&self, feats: &DMatrix<F>, adj: &CooAdjacency) -> DMatrix<F> {
        self.layer.apply(feats, adj)
    }

    fn forward_structural(
        &self,
        feats: &DMatrix<F>,
        adj: &CooAdjacency,
        pe: Option<&DMatrix<F>>,
        _masked: &[bool],
    ) -> DMatrix<F> {
        match pe {
            Some(pe) if pe.ncols() == self.mix.nrows() && pe.nrows() == feats.nrows() => {
                let mixed = feats + pe * &self.mix;
                self.layer.apply(&mixed, adj)
            }
            _ => self.layer.apply(feats, adj),
        }
    }
}

/// Closed set of encoder kinds a model can carry per level.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Encoder {
    Propagation(PropagationLayer),
    PeMix(PeMixLayer),
}

impl Encoder {
    pub fn param_len(&self) -> usize {
        match self {
            Encoder::Propagation(l) => l.param_len(),
            Encoder::PeMix(l) => l.param_len(),
        }
    }

    pub fn write_params(&self, out: &mut Vec<F>) {
        match self {
            Encoder::Propagation(l) => l.write_params(out),
            Encoder::PeMix(l) => l.write_params(out),
        }
    }

    pub fn read_params(&mut self, flat: &[F]) -> usize {
        match self {
            Encoder::Propagation(l) => l.read_params(flat),
            Encoder::PeMix(l) => l.read_params(flat),
        }
    }
}

impl LevelEncoder for Encoder {
    fn forward(&self, feats: &DMatrix<F>, adj: &CooAdjacency) -> DMatrix<F> {
        match self {
            Encoder::Propagation(l) => LevelEncoder::forward(l, feats, adj),
            Encoder::PeMix(l) => LevelEncoder::forward(l, feats, adj),
        }
    }

    fn forward_structural(
        &self,
        feats: &DMatrix<F>,
        adj: &CooAdjacency,
        pe: Option<&DMatrix<F>>,
        masked: &[bool],
    ) -> DMatrix<F> {
        match self {
            Encoder::Propagation(l) => l.forward_structural(feats, adj, pe, masked),
            Encoder::PeMix(l) => l.forward_structural(feats, adj, pe, masked),
        }
    }
}
