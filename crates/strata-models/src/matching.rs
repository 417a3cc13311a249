use std::collections::HashMap;

use strata_core::{
    CooAdjacency, Graph, MaskRng, NodeGroupMap, Partition, Partitioner, Projection, Result,
    StrataError, F,
};

/// Greedy maximal matching preferring heavy edges.
///
/// Nodes are visited in a seeded random order; each unmatched node merges
/// with its heaviest unmatched neighbor. Matching passes repeat on the
/// contracted graph until the target size is reached or nothing can be
/// matched, so rates below one half are reachable.
pub struct HeavyEdgeMatching;

/// Same merge mechanics with a uniformly random partner choice among
/// adjacent nodes. The cheap baseline.
pub struct RandomMatching;

impl Partitioner for HeavyEdgeMatching {
    fn partition(&self, graph: &Graph, rate: F, rng: &mut MaskRng) -> Result<Partition> {
        match_and_contract(graph, rate, rng, PartnerRule::Heaviest)
    }
}

impl Partitioner for RandomMatching {
    fn partition(&self, graph: &Graph, rate: F, rng: &mut MaskRng) -> Result<Partition> {
        match_and_contract(graph, rate, rng, PartnerRule::Random)
    }
}

enum PartnerRule {
    Heaviest,
    Random,
}

fn match_and_contract(
    graph: &Graph,
    rate: F,
    rng: &mut MaskRng,
    rule: PartnerRule,
) -> Result<Partition> {
    let n = graph.num_nodes();
    if n == 0 {
        return Err(StrataError::Config("cannot partition an empty graph".into()));
    }
    let target = ((n as F * rate).ceil() as usize).max(1);

    let mut groups: NodeGroupMap = (0..n).map(|i| vec![i]).collect();
    let mut adj: Vec<HashMap<usize, F>> = vec![HashMap::new(); n];
    for (r, c, v) in graph.adj().triplets() {
        if r != c {
            *adj[r].entry(c).or_insert(0.0) += v;
        }
    }

    while groups.len() > target {
        let pairs = matching_pass(&adj, groups.len(), target, rng, &rule);
        if pairs.is_empty() {
            // No edge left to match; the builder decides whether the
            // resulting level still shrinks enough.
            break;
        }
        contract(&mut groups, &mut adj, &pairs);
    }

    build_partition(graph, groups)
}

/// One matching sweep. Stops early once enough merges are scheduled to hit
/// the target size.
fn matching_pass(
    adj: &[HashMap<usize, F>],
    n_groups: usize,
    target: usize,
    rng: &mut MaskRng,
    rule: &PartnerRule,
) -> Vec<(usize, usize)> {
    let order = rng.permutation(n_groups);
    let mut matched = vec![false; n_groups];
    let mut pairs = Vec::new();
    let mut remaining = n_groups;

    for &g in &order {
        if remaining <= target {
            break;
        }
        if matched[g] {
            continue;
        }
        // Candidate order is fixed by node id so partner choice depends only
        // on the rng stream, not hash iteration order.
        let mut candidates: Vec<(usize, F)> = adj[g]
            .iter()
            .filter(|&(&h, _)| !matched[h] && h != g)
            .map(|(&h, &w)| (h, w))
            .collect();
        candidates.sort_unstable_by_key(|&(h, _)| h);

        let partner = match rule {
            PartnerRule::Heaviest => {
                let mut best: Option<(usize, F)> = None;
                for &(h, w) in &candidates {
                    if best.map_or(true, |(_, bw)| w > bw) {
                        best = Some((h, w));
                    }
                }
                best.map(|(h, _)| h)
            }
            PartnerRule::Random => {
                if candidates.is_empty() {
                    None
                } else {
                    Some(candidates[rng.pick(candidates.len())].0)
                }
            }
        };

        if let Some(h) = partner {
            matched[g] = true;
            matched[h] = true;
            pairs.push((g, h));
            remaining -= 1;
        }
    }
    pairs
}

fn contract(groups: &mut NodeGroupMap, adj: &mut Vec<HashMap<usize, F>>, pairs: &[(usize, usize)]) {
    let old_n = groups.len();
    let mut pair_with: Vec<Option<usize>> = vec![None; old_n];
    for &(a, b) in pairs {
        pair_with[a] = Some(b);
        pair_with[b] = Some(a);
    }

    let mut new_id = vec![usize::MAX; old_n];
    let mut new_groups: NodeGroupMap = Vec::new();
    for g in 0..old_n {
        if new_id[g] != usize::MAX {
            continue;
        }
        let id = new_groups.len();
        match pair_with[g] {
            Some(h) if new_id[h] == usize::MAX => {
                new_id[g] = id;
                new_id[h] = id;
                let mut members = groups[g].clone();
                members.extend_from_slice(&groups[h]);
                new_groups.push(members);
            }
            _ => {
                new_id[g] = id;
                new_groups.push(groups[g].clone());
            }
        }
    }

    let mut new_adj: Vec<HashMap<usize, F>> = vec![HashMap::new(); new_groups.len()];
    for g in 0..old_n {
        for (&h, &w) in &adj[g] {
            let (ng, nh) = (new_id[g], new_id[h]);
            if ng != nh {
                *new_adj[ng].entry(nh).or_insert(0.0) += w;
            }
        }
    }

    *groups = new_groups;
    *adj = new_adj;
}

/// Mean-pooling projection from the final grouping, pooled features, and the
/// coarse adjacency `P * A * P^T` accumulated edge by edge.
fn build_partition(graph: &Graph, groups: NodeGroupMap) -> Result<Partition> {
    let n = graph.num_nodes();
    let projection = Projection::from_groups(&groups, n)?;
    let coarse_feats = projection.pool(graph.feats())?;

    let mut fine_group = vec![0usize; n];
    for (g, members) in groups.iter().enumerate() {
        for &m in members {
            fine_group[m] = g;
        }
    }
    let inv_size: Vec<F> = groups.iter().map(|m| 1.0 / m.len() as F).collect();

    let mut entries: HashMap<(usize, usize), F> = HashMap::new();
    for (u, v, w) in graph.adj().triplets() {
        let (r, c) = (fine_group[u], fine_group[v]);
        *entries.entry((r, c)).or_insert(0.0) += w * inv_size[r] * inv_size[c];
    }
    let mut keys: Vec<(usize, usize)> = entries.keys().copied().collect();
    keys.sort_unstable();
    let triplets: Vec<(usize, usize, F)> = keys.into_iter().map(|k| (k.0, k.1, entries[&k])).collect();
    let coarse_adj = CooAdjacency::from_triplets(groups.len(), &triplets)?;

    Ok(Partition {
        projection,
        graph: Graph::new(coarse_adj, coarse_feats)?,
        groups,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DMatrix;

    fn weighted_graph(n: usize, edges: &[(usize, usize, F)], dim: usize) -> Graph {
        let mut triplets = Vec::new();
        for &(u, v, w) in edges {
            triplets.push((u, v, w));
            triplets.push((v, u, w));
        }
        let adj = CooAdjacency::from_triplets(n, &triplets).unwrap();
        let feats = DMatrix::from_fn(n, dim, |r, c| (r * dim + c) as F);
        Graph::new(adj, feats).unwrap()
    }

    fn ring(n: usize, dim: usize) -> Graph {
        let edges: Vec<(usize, usize, F)> = (0..n).map(|i| (i, (i + 1) % n, 1.0)).collect();
        weighted_graph(n, &edges, dim)
    }

    #[test]
    fn test_heavy_edges_win() {
        // Two heavy pairs bridged by a light edge: every visiting order pairs
        // 0 with 1 and 2 with 3.
        let graph = weighted_graph(4, &[(0, 1, 5.0), (2, 3, 5.0), (1, 2, 0.1)], 2);
        for seed in 0..20 {
            let mut rng = MaskRng::new(seed);
            let part = HeavyEdgeMatching.partition(&graph, 0.5, &mut rng).unwrap();
            let mut groups = part.groups.clone();
            for g in &mut groups {
                g.sort_unstable();
            }
            groups.sort();
            assert_eq!(groups, vec![vec![0, 1], vec![2, 3]], "seed {seed}");
        }
    }

    #[test]
    fn test_target_size_reached() {
        let graph = ring(8, 2);
        let mut rng = MaskRng::new(3);
        let part = RandomMatching.partition(&graph, 0.5, &mut rng).unwrap();
        assert_eq!(part.graph.num_nodes(), 4);
        assert_eq!(part.projection.shape(), (4, 8));
    }

    #[test]
    fn test_repeated_passes_below_half() {
        // rate 0.25 needs more than one matching pass.
        let graph = ring(16, 2);
        let mut rng = MaskRng::new(11);
        let part = HeavyEdgeMatching.partition(&graph, 0.25, &mut rng).unwrap();
        assert_eq!(part.graph.num_nodes(), 4);
    }

    #[test]
    fn test_membership_conserved() {
        let graph = ring(10, 3);
        let mut rng = MaskRng::new(7);
        let part = HeavyEdgeMatching.partition(&graph, 0.5, &mut rng).unwrap();

        let (_, n_fine) = part.projection.shape();
        let mut col_support = vec![0usize; n_fine];
        let mut col_mass = vec![0.0 as F; n_fine];
        for (_, c, v) in part.projection.triplets() {
            col_support[c] += 1;
            col_mass[c] += v;
        }
        for c in 0..n_fine {
            assert_eq!(col_support[c], 1);
            assert!(col_mass[c] <= 1.0 + 1e-5);
        }
    }

    #[test]
    fn test_same_seed_same_grouping() {
        let graph = ring(12, 2);
        let a = RandomMatching
            .partition(&graph, 0.5, &mut MaskRng::new(42))
            .unwrap();
        let b = RandomMatching
            .partition(&graph, 0.5, &mut MaskRng::new(42))
            .unwrap();
        assert_eq!(a.groups, b.groups);
    }

    #[test]
    fn test_edgeless_graph_stays_unmatched() {
        let adj = CooAdjacency::new(4);
        let graph = Graph::new(adj, DMatrix::zeros(4, 2)).unwrap();
        let mut rng = MaskRng::new(1);
        let part = HeavyEdgeMatching.partition(&graph, 0.5, &mut rng).unwrap();
        // Nothing to match: all singletons survive and the pyramid builder
        // rejects the level as degenerate.
        assert_eq!(part.graph.num_nodes(), 4);
    }
}
