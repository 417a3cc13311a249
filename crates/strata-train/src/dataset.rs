use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use strata_core::{Graph, MaskRng, Partitioner, PositionalEncoder, Pyramid, PyramidBuilder, Result};
use tracing::info;

/// A training corpus: one graph per example.
pub struct Corpus {
    graphs: Vec<Graph>,
}

impl Corpus {
    pub fn new(graphs: Vec<Graph>) -> Self {
        Self { graphs }
    }

    pub fn len(&self) -> usize {
        self.graphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graphs.is_empty()
    }

    pub fn graphs(&self) -> &[Graph] {
        &self.graphs
    }
}

/// One graph with its precomputed coarsening pyramid attached. Built once at
/// dataset-preparation time and read-only for the rest of training.
pub struct PreparedGraph {
    pub pyramid: Pyramid,
}

impl PreparedGraph {
    pub fn graph(&self) -> &Graph {
        &self.pyramid.base().graph
    }
}

/// Precompute pyramids for the whole corpus ahead of training.
///
/// Per-graph work is independent and seeded by graph index, so the parallel
/// sweep gives the same pyramids as a sequential one.
pub fn prepare(
    corpus: &Corpus,
    builder: &PyramidBuilder,
    partitioner: &dyn Partitioner,
    pe: &dyn PositionalEncoder,
    seed: u64,
) -> Result<Vec<PreparedGraph>> {
    let pb = ProgressBar::new(corpus.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{bar:40.cyan/blue}] {pos}/{len} pyramids ({eta})")
            .unwrap()
            .progress_chars("█▓░"),
    );

    let prepared: Result<Vec<PreparedGraph>> = corpus
        .graphs()
        .par_iter()
        .enumerate()
        .map(|(idx, graph)| {
            let mut rng = MaskRng::derive(seed, idx as u64);
            let pyramid = builder.build(graph, partitioner, pe, &mut rng)?;
            pb.inc(1);
            Ok(PreparedGraph { pyramid })
        })
        .collect();
    pb.finish_and_clear();

    let prepared = prepared?;
    info!(
        graphs = prepared.len(),
        levels = builder.config().levels,
        "pyramids prepared"
    );
    Ok(prepared)
}
