use nalgebra::DMatrix;
use strata_core::{
    mask, CoarsenConfig, CooAdjacency, Graph, MaskConfig, MaskRng, Partition, Partitioner,
    PositionalEncoder, Projection, PyramidBuilder, Result, F,
};

/// 4 fine nodes -> 2 coarse nodes, 2-to-1 mean-pooling each.
struct TwoToOne;

impl Partitioner for TwoToOne {
    fn partition(&self, graph: &Graph, _rate: F, _rng: &mut MaskRng) -> Result<Partition> {
        let groups = vec![vec![0, 1], vec![2, 3]];
        let projection = Projection::from_groups(&groups, 4)?;
        let coarse_feats = projection.pool(graph.feats())?;
        let coarse_adj = CooAdjacency::from_undirected_edges(2, &[(0, 1)])?;
        Ok(Partition {
            projection,
            graph: Graph::new(coarse_adj, coarse_feats)?,
            groups,
        })
    }
}

struct ZeroPe;

impl PositionalEncoder for ZeroPe {
    fn encode(&self, adj: &CooAdjacency) -> DMatrix<F> {
        DMatrix::zeros(adj.num_nodes(), 2)
    }
}

fn path4() -> Graph {
    let adj = CooAdjacency::from_undirected_edges(4, &[(0, 1), (1, 2), (2, 3)]).unwrap();
    let feats = DMatrix::from_fn(4, 2, |r, c| (r + c) as F);
    Graph::new(adj, feats).unwrap()
}

fn two_level_pyramid() -> strata_core::Pyramid {
    let builder = PyramidBuilder::new(CoarsenConfig {
        levels: 2,
        rate: 0.5,
    })
    .unwrap();
    let mut rng = MaskRng::new(0);
    builder.build(&path4(), &TwoToOne, &ZeroPe, &mut rng).unwrap()
}

fn base_state(masked: [bool; 4], token: [bool; 4]) -> mask::MaskState {
    let mut state = mask::MaskState::empty(4);
    for i in 0..4 {
        state.masked[i] = masked[i];
        state.token[i] = token[i];
        state.noise[i] = masked[i] && !token[i];
    }
    state
}

#[test]
fn majority_masked_branch_propagates() {
    let pyramid = two_level_pyramid();
    // Group {0,1} fully masked: 100% of projected mass -> coarse node 0 masked.
    // Group {2,3} half masked: exactly half is NOT a strict majority.
    let base = base_state([true, true, true, false], [true, true, false, false]);
    let states = mask::propagate(&base, &pyramid).unwrap();

    assert_eq!(states.len(), 2);
    assert_eq!(states[1].masked, vec![true, false]);
    assert_eq!(states[1].token, vec![true, false]);
    assert!(states[1].noise.iter().all(|&x| !x));
}

#[test]
fn majority_unmasked_branch_propagates() {
    let pyramid = two_level_pyramid();
    let base = base_state([false, false, false, true], [false, false, false, false]);
    let states = mask::propagate(&base, &pyramid).unwrap();
    assert_eq!(states[1].masked, vec![false, false]);
}

#[test]
fn token_majority_requires_token_mass() {
    let pyramid = two_level_pyramid();
    // Group {0,1} fully masked but only half tokenized: coarse node 0 is
    // masked yet not a token node.
    let base = base_state([true, true, false, false], [true, false, false, false]);
    let states = mask::propagate(&base, &pyramid).unwrap();
    assert_eq!(states[1].masked, vec![true, false]);
    assert_eq!(states[1].token, vec![false, false]);
}

#[test]
fn token_subset_of_masked_over_many_seeds() {
    let cfg = MaskConfig {
        mask_ratio: 0.4,
        token_ratio: 0.6,
    };
    for seed in 0..1000 {
        let mut rng = MaskRng::new(seed);
        let state = mask::MaskState::sample(50, &cfg, &mut rng).unwrap();
        for i in 0..state.len() {
            if state.token[i] {
                assert!(state.masked[i], "seed {seed}: token node {i} not masked");
            }
        }
    }
}

#[test]
fn recovery_rate_zero_is_noop() {
    let pyramid = two_level_pyramid();
    let base = base_state([true, true, true, false], [true, false, true, false]);
    let mut states = mask::propagate(&base, &pyramid).unwrap();
    let before = states.clone();
    let mut rng = MaskRng::new(77);
    mask::recover(&mut states, 0.0, &mut rng);
    for (a, b) in states.iter().zip(&before) {
        assert_eq!(a.masked, b.masked);
        assert_eq!(a.token, b.token);
    }
}

#[test]
fn recovery_rate_one_empties_every_level() {
    let pyramid = two_level_pyramid();
    let base = base_state([true, true, true, true], [true, true, false, false]);
    let mut states = mask::propagate(&base, &pyramid).unwrap();
    let mut rng = MaskRng::new(77);
    mask::recover(&mut states, 1.0, &mut rng);
    for state in &states {
        assert_eq!(state.masked_count(), 0);
        assert!(state.token.iter().all(|&t| !t));
        assert!(state.noise.iter().all(|&x| !x));
    }
}

#[test]
fn recovery_is_monotone_in_rate() {
    // Fixed seed: the surviving masked population must not grow as the
    // recovery rate rises.
    let cfg = MaskConfig {
        mask_ratio: 0.8,
        token_ratio: 0.5,
    };
    let mut prev_count = usize::MAX;
    for step in 0..=10 {
        let rate = step as F / 10.0;
        let mut sample_rng = MaskRng::new(123);
        let state = mask::MaskState::sample(200, &cfg, &mut sample_rng).unwrap();
        let mut states = vec![state];
        let mut rng = MaskRng::new(55);
        mask::recover(&mut states, rate, &mut rng);
        let count = states[0].masked_count();
        assert!(
            count <= prev_count,
            "masked population grew from {prev_count} to {count} at rate {rate}"
        );
        prev_count = count;
    }
}
