use nalgebra::DMatrix;
use strata_core::{
    CoarsenConfig, CooAdjacency, Graph, MaskRng, Partition, Partitioner, PositionalEncoder,
    Projection, PyramidBuilder, Result, StrataError, F,
};

/// Deterministic stub: merges consecutive node pairs (0,1), (2,3), ...
/// An odd trailing node survives as a singleton.
struct PairMerge;

impl Partitioner for PairMerge {
    fn partition(&self, graph: &Graph, _rate: F, _rng: &mut MaskRng) -> Result<Partition> {
        let n = graph.num_nodes();
        let mut groups = Vec::new();
        let mut i = 0;
        while i < n {
            if i + 1 < n {
                groups.push(vec![i, i + 1]);
            } else {
                groups.push(vec![i]);
            }
            i += 2;
        }
        build_partition(graph, groups)
    }
}

/// Stub that returns the graph unchanged (terminal fixed point).
struct NoShrink;

impl Partitioner for NoShrink {
    fn partition(&self, graph: &Graph, _rate: F, _rng: &mut MaskRng) -> Result<Partition> {
        let groups = (0..graph.num_nodes()).map(|i| vec![i]).collect();
        build_partition(graph, groups)
    }
}

fn build_partition(graph: &Graph, groups: Vec<Vec<usize>>) -> Result<Partition> {
    let n = graph.num_nodes();
    let projection = Projection::from_groups(&groups, n)?;
    let coarse_feats = projection.pool(graph.feats())?;
    let p = {
        let mut dense = DMatrix::<F>::zeros(groups.len(), n);
        for (r, c, v) in projection.triplets() {
            dense[(r, c)] = v;
        }
        dense
    };
    let coarse_dense = &p * graph.adj().to_dense() * p.transpose();
    let mut triplets = Vec::new();
    for r in 0..coarse_dense.nrows() {
        for c in 0..coarse_dense.ncols() {
            if coarse_dense[(r, c)] != 0.0 {
                triplets.push((r, c, coarse_dense[(r, c)]));
            }
        }
    }
    let coarse_adj = CooAdjacency::from_triplets(groups.len(), &triplets)?;
    Ok(Partition {
        projection,
        graph: Graph::new(coarse_adj, coarse_feats)?,
        groups,
    })
}

struct ZeroPe;

impl PositionalEncoder for ZeroPe {
    fn encode(&self, adj: &CooAdjacency) -> DMatrix<F> {
        DMatrix::zeros(adj.num_nodes(), 4)
    }
}

fn ring(n: usize, dim: usize) -> Graph {
    let edges: Vec<(usize, usize)> = (0..n).map(|i| (i, (i + 1) % n)).collect();
    let adj = CooAdjacency::from_undirected_edges(n, &edges).unwrap();
    let feats = DMatrix::from_fn(n, dim, |r, c| (r * dim + c) as F * 0.1 + 1.0);
    Graph::new(adj, feats).unwrap()
}

#[test]
fn pyramid_node_counts_strictly_decrease() {
    let graph = ring(12, 4);
    let builder = PyramidBuilder::new(CoarsenConfig {
        levels: 3,
        rate: 0.5,
    })
    .unwrap();
    let mut rng = MaskRng::new(1);
    let pyramid = builder.build(&graph, &PairMerge, &ZeroPe, &mut rng).unwrap();

    assert_eq!(pyramid.num_levels(), 3);
    for i in 1..pyramid.num_levels() {
        assert!(
            pyramid.level(i).graph.num_nodes() < pyramid.level(i - 1).graph.num_nodes(),
            "level {i} did not shrink"
        );
    }
    assert_eq!(pyramid.level(1).graph.num_nodes(), 6);
    assert_eq!(pyramid.level(2).graph.num_nodes(), 3);
}

#[test]
fn coarse_levels_carry_pe_and_projection() {
    let graph = ring(8, 2);
    let builder = PyramidBuilder::new(CoarsenConfig {
        levels: 2,
        rate: 0.5,
    })
    .unwrap();
    let mut rng = MaskRng::new(5);
    let pyramid = builder.build(&graph, &PairMerge, &ZeroPe, &mut rng).unwrap();

    assert!(pyramid.base().pe.is_none());
    assert!(pyramid.base().proj.is_none());
    let top = pyramid.coarsest();
    assert!(top.pe.is_some());
    assert!(top.proj.is_some());
    assert_eq!(top.pe.as_ref().unwrap().nrows(), 4);
}

#[test]
fn projection_membership_is_conserved() {
    // Fixed 6-node graph, deterministic stub partitioner: every fine column
    // has exactly one weighted support entry and mass <= 1.
    let graph = ring(6, 4);
    let builder = PyramidBuilder::new(CoarsenConfig {
        levels: 2,
        rate: 0.5,
    })
    .unwrap();
    let mut rng = MaskRng::new(9);
    let pyramid = builder.build(&graph, &PairMerge, &ZeroPe, &mut rng).unwrap();

    let proj = pyramid.proj_into(1).unwrap();
    let (n_coarse, n_fine) = proj.shape();
    assert_eq!((n_coarse, n_fine), (3, 6));

    let mut col_support = vec![0usize; n_fine];
    let mut col_mass = vec![0.0 as F; n_fine];
    for (_, c, v) in proj.triplets() {
        col_support[c] += 1;
        col_mass[c] += v;
    }
    for c in 0..n_fine {
        assert_eq!(col_support[c], 1, "fine node {c} belongs to several groups");
        assert!(col_mass[c] <= 1.0 + 1e-5);
    }
}

#[test]
fn non_shrinking_partitioner_fails_fast() {
    let graph = ring(6, 2);
    let builder = PyramidBuilder::new(CoarsenConfig {
        levels: 2,
        rate: 0.5,
    })
    .unwrap();
    let mut rng = MaskRng::new(2);
    let err = builder.build(&graph, &NoShrink, &ZeroPe, &mut rng);
    assert!(matches!(
        err,
        Err(StrataError::DegenerateLevel {
            level: 1,
            nodes_in: 6,
            nodes_out: 6
        })
    ));
}

#[test]
fn invalid_config_is_rejected() {
    assert!(PyramidBuilder::new(CoarsenConfig {
        levels: 1,
        rate: 0.5
    })
    .is_err());
    assert!(PyramidBuilder::new(CoarsenConfig {
        levels: 3,
        rate: 1.5
    })
    .is_err());
}
