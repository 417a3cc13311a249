use std::path::Path;

use nalgebra::DMatrix;
use strata_core::{CooAdjacency, Graph, MaskRng, Result};

/// Ring graph with standard-normal features.
pub fn ring_graph(nodes: usize, dim: usize, rng: &mut MaskRng) -> Result<Graph> {
    let edges: Vec<(usize, usize)> = (0..nodes).map(|v| (v, (v + 1) % nodes)).collect();
    let adj = CooAdjacency::from_undirected_edges(nodes, &edges)?;
    let feats = DMatrix::from_fn(nodes, dim, |_, _| rng.std_normal());
    Graph::new(adj, feats)
}

/// 4-connected `side x side` grid with standard-normal features.
pub fn grid_graph(side: usize, dim: usize, rng: &mut MaskRng) -> Result<Graph> {
    let n = side * side;
    let mut edges = Vec::with_capacity(2 * n);
    for i in 0..side {
        for j in 0..side {
            let id = i * side + j;
            if j + 1 < side {
                edges.push((id, id + 1));
            }
            if i + 1 < side {
                edges.push((id, id + side));
            }
        }
    }
    let adj = CooAdjacency::from_undirected_edges(n, &edges)?;
    let feats = DMatrix::from_fn(n, dim, |_, _| rng.std_normal());
    Graph::new(adj, feats)
}

/// Demo corpus of identically shaped graphs with per-graph derived features.
pub fn ring_corpus(count: usize, nodes: usize, dim: usize, seed: u64) -> Result<Vec<Graph>> {
    (0..count)
        .map(|i| ring_graph(nodes, dim, &mut MaskRng::derive(seed, i as u64)))
        .collect()
}

pub fn grid_corpus(count: usize, side: usize, dim: usize, seed: u64) -> Result<Vec<Graph>> {
    (0..count)
        .map(|i| grid_graph(side, dim, &mut MaskRng::derive(seed, i as u64)))
        .collect()
}

pub fn load_corpus(path: &Path) -> anyhow::Result<Vec<Graph>> {
    let json = std::fs::read_to_string(path)?;
    let graphs: Vec<Graph> = serde_json::from_str(&json)?;
    Ok(graphs)
}

pub fn save_corpus(path: &Path, graphs: &[Graph]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string(graphs)?;
    std::fs::write(path, json)?;
    Ok(())
}
