use crate::F;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use rand_distr::{Distribution, StandardNormal};

/// Seeded random source for every masking and perturbation decision.
///
/// All randomness in the workspace flows through an explicit `&mut MaskRng`
/// so any run can be replayed from its seed.
pub struct MaskRng {
    rng: ChaCha20Rng,
}

impl MaskRng {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }

    /// Derive an independent stream from a global seed.
    pub fn derive(global_seed: u64, stream: u64) -> Self {
        // Combine seeds deterministically
        let seed = global_seed.wrapping_add(stream.wrapping_mul(0x9e3779b97f4a7c15));
        Self::new(seed)
    }

    /// Uniformly random subset of `{0..n}` with `k` elements, unsorted.
    ///
    /// Partial Fisher-Yates: the first `k` positions of a shuffle.
    pub fn subset(&mut self, n: usize, k: usize) -> Vec<usize> {
        let k = k.min(n);
        let mut pool: Vec<usize> = (0..n).collect();
        for i in 0..k {
            let j = self.rng.gen_range(i..n);
            pool.swap(i, j);
        }
        pool.truncate(k);
        pool
    }

    /// Uniformly random permutation of `{0..n}`.
    pub fn permutation(&mut self, n: usize) -> Vec<usize> {
        self.subset(n, n)
    }

    pub fn bernoulli(&mut self, p: F) -> bool {
        self.rng.gen::<F>() < p
    }

    pub fn uniform(&mut self, lo: F, hi: F) -> F {
        self.rng.gen_range(lo..hi)
    }

    pub fn pick(&mut self, n: usize) -> usize {
        self.rng.gen_range(0..n)
    }

    pub fn std_normal(&mut self) -> F {
        StandardNormal.sample(&mut self.rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subset_bounds() {
        let mut rng = MaskRng::new(7);
        let s = rng.subset(10, 4);
        assert_eq!(s.len(), 4);
        assert!(s.iter().all(|&i| i < 10));
        let mut sorted = s.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), 4);
    }

    #[test]
    fn test_replay() {
        let a: Vec<usize> = MaskRng::new(42).permutation(16);
        let b: Vec<usize> = MaskRng::new(42).permutation(16);
        assert_eq!(a, b);
    }

    #[test]
    fn test_derived_streams_differ() {
        let a = MaskRng::derive(42, 0).permutation(16);
        let b = MaskRng::derive(42, 1).permutation(16);
        assert_ne!(a, b);
    }
}
