use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use strata_core::{CoarsenConfig, Decay, MaskConfig, MaskRng, Partitioner, PyramidBuilder, F};
use strata_models::{
    HeavyEdgeMatching, MaskedAutoencoder, ModelConfig, PerturbationDescent, RandomMatching,
    RandomWalkPe,
};
use strata_train::{prepare, Corpus, PretrainConfig, PretrainLoop, StepConfig};
use tracing::info;

use crate::manifest::RunManifest;
use crate::{corpus, load_checkpoint, save_checkpoint, CHECKPOINT_FILE, MANIFEST_FILE};

// Rng streams reserved for setup, clear of the per-step streams the
// pretrain loop derives.
const MODEL_INIT_STREAM: u64 = u64::MAX - 1;
const OPTIMIZER_STREAM: u64 = u64::MAX - 2;

const OPT_STEP: F = 0.05;
const OPT_SHRINK: F = 0.9;

#[derive(Parser)]
#[command(name = "strata")]
#[command(about = "Masked graph autoencoding over pyramids of coarsened graphs")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Pretrain the masked autoencoder on a graph corpus
    Pretrain(PretrainOpts),
    /// Generate a synthetic graph corpus for demos
    GenCorpus(GenCorpusOpts),
}

#[derive(Args)]
pub struct PretrainOpts {
    /// Corpus JSON file (see gen-corpus)
    #[arg(long)]
    pub corpus: PathBuf,

    /// Partitioning strategy for pyramid construction
    #[arg(long, value_enum, default_value = "heavy-edge")]
    pub partitioner: PartitionerType,

    /// Total pyramid levels, base graph included
    #[arg(long, default_value = "2")]
    pub levels: usize,

    /// Fraction of nodes each coarsening step keeps
    #[arg(long, default_value = "0.5")]
    pub rate: F,

    /// Fraction of base nodes selected as reconstruction targets
    #[arg(long, default_value = "0.5")]
    pub mask_ratio: F,

    /// Fraction of masked nodes replaced by the learned token
    #[arg(long, default_value = "0.9")]
    pub token_ratio: F,

    /// Recovery probability at epoch zero
    #[arg(long, default_value = "0.1")]
    pub recover_rate: F,

    /// Fraction of the epoch count over which recovery decays to zero
    #[arg(long, default_value = "0.5")]
    pub epoch_rate: F,

    /// Exponential decay factor for the recovery schedule
    #[arg(long, default_value = "0.9")]
    pub gamma: F,

    #[arg(long, value_enum, default_value = "linear")]
    pub decay: DecayType,

    /// Drop edges incident to masked nodes during encoding
    #[arg(long)]
    pub mask_edges: bool,

    #[arg(long, default_value = "20")]
    pub epochs: usize,

    /// Hidden feature width of the encoder/decoder stack
    #[arg(long, default_value = "16")]
    pub hidden: usize,

    /// Random-walk steps; also the positional-encoding width
    #[arg(long, default_value = "8")]
    pub pe_steps: usize,

    /// Encoder used at the coarsest level
    #[arg(long, value_enum, default_value = "pe-mix")]
    pub top_encoder: TopEncoderType,

    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Output directory for checkpoint.json and manifest.json
    #[arg(long, default_value = ".")]
    pub out: PathBuf,

    /// Resume from an existing checkpoint.json in the output directory
    #[arg(long)]
    pub resume: bool,
}

#[derive(Args)]
pub struct GenCorpusOpts {
    #[arg(long, value_enum, default_value = "ring")]
    pub kind: CorpusKind,

    #[arg(long, default_value = "32")]
    pub count: usize,

    /// Ring length, or grid side length
    #[arg(long, default_value = "24")]
    pub nodes: usize,

    /// Feature dimension
    #[arg(long, default_value = "8")]
    pub dim: usize,

    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Output corpus JSON file
    #[arg(long)]
    pub out: PathBuf,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum PartitionerType {
    #[value(name = "heavy-edge")]
    HeavyEdge,
    #[value(name = "random")]
    Random,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum DecayType {
    #[value(name = "linear")]
    Linear,
    #[value(name = "exponential")]
    Exponential,
}

impl From<DecayType> for Decay {
    fn from(decay: DecayType) -> Self {
        match decay {
            DecayType::Linear => Decay::Linear,
            DecayType::Exponential => Decay::Exponential,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum TopEncoderType {
    #[value(name = "pe-mix")]
    PeMix,
    #[value(name = "propagation")]
    Propagation,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum CorpusKind {
    #[value(name = "ring")]
    Ring,
    #[value(name = "grid")]
    Grid,
}

pub fn run_pretrain(opts: &PretrainOpts) -> anyhow::Result<()> {
    let graphs = corpus::load_corpus(&opts.corpus)?;
    anyhow::ensure!(!graphs.is_empty(), "corpus {:?} is empty", opts.corpus);
    let in_dim = graphs[0].feat_dim();
    for (i, g) in graphs.iter().enumerate() {
        anyhow::ensure!(
            g.feat_dim() == in_dim,
            "graph {i} has feature dim {}, expected {in_dim}",
            g.feat_dim()
        );
    }

    let partitioner: Box<dyn Partitioner> = match opts.partitioner {
        PartitionerType::HeavyEdge => Box::new(HeavyEdgeMatching),
        PartitionerType::Random => Box::new(RandomMatching),
    };
    let pe = RandomWalkPe::new(opts.pe_steps);
    let coarsen = CoarsenConfig {
        levels: opts.levels,
        rate: opts.rate,
    };
    let builder = PyramidBuilder::new(coarsen)?;

    let dataset = Corpus::new(graphs);
    info!(
        graphs = dataset.len(),
        levels = opts.levels,
        rate = opts.rate,
        "preparing pyramids"
    );
    let prepared = prepare(&dataset, &builder, partitioner.as_ref(), &pe, opts.seed)?;

    let model_cfg = ModelConfig {
        levels: opts.levels,
        in_dim,
        hidden: opts.hidden,
        pe_dim: opts.pe_steps,
        structural_top: matches!(opts.top_encoder, TopEncoderType::PeMix),
    };
    let mut model = if opts.resume && opts.out.join(CHECKPOINT_FILE).exists() {
        info!(dir = ?opts.out, "resuming from checkpoint");
        load_checkpoint(&opts.out)?
    } else {
        MaskedAutoencoder::new(&model_cfg, &mut MaskRng::derive(opts.seed, MODEL_INIT_STREAM))?
    };
    let mut optimizer = PerturbationDescent::new(
        OPT_STEP,
        OPT_SHRINK,
        MaskRng::derive(opts.seed, OPTIMIZER_STREAM),
    );

    let pretrain_cfg = PretrainConfig {
        max_epoch: opts.epochs,
        mask: MaskConfig {
            mask_ratio: opts.mask_ratio,
            token_ratio: opts.token_ratio,
        },
        recover_rate: opts.recover_rate,
        epoch_rate: opts.epoch_rate,
        gamma: opts.gamma,
        decay: opts.decay.into(),
        step: StepConfig {
            mask_edges: opts.mask_edges,
            alpha: 2.0,
        },
        seed: opts.seed,
    };
    let losses = PretrainLoop::new(pretrain_cfg).run(&prepared, &mut model, &mut optimizer)?;

    let checkpoint_path = save_checkpoint(&opts.out, &model)?;
    let manifest = RunManifest::new(
        partitioner_name(opts.partitioner),
        &coarsen,
        &pretrain_cfg,
        opts.hidden,
        opts.pe_steps,
        dataset.len(),
        losses.last().copied(),
    );
    let manifest_path = opts.out.join(MANIFEST_FILE);
    manifest.save_to_file(&manifest_path)?;

    println!("Pretraining complete");
    println!("====================");
    println!("Graphs: {}", dataset.len());
    println!("Epochs: {}", losses.len());
    if let (Some(first), Some(last)) = (losses.first(), losses.last()) {
        println!("Mean loss: {first:.4} -> {last:.4}");
    }
    println!("Checkpoint: {}", checkpoint_path.display());
    println!("Manifest: {}", manifest_path.display());

    Ok(())
}

pub fn run_gen_corpus(opts: &GenCorpusOpts) -> anyhow::Result<()> {
    anyhow::ensure!(opts.count > 0, "corpus needs at least one graph");
    let graphs = match opts.kind {
        CorpusKind::Ring => corpus::ring_corpus(opts.count, opts.nodes, opts.dim, opts.seed)?,
        CorpusKind::Grid => corpus::grid_corpus(opts.count, opts.nodes, opts.dim, opts.seed)?,
    };
    corpus::save_corpus(&opts.out, &graphs)?;
    info!(
        count = graphs.len(),
        nodes = graphs[0].num_nodes(),
        dim = opts.dim,
        "corpus written"
    );
    println!("Wrote {} graphs to {}", graphs.len(), opts.out.display());
    Ok(())
}

fn partitioner_name(kind: PartitionerType) -> &'static str {
    match kind {
        PartitionerType::HeavyEdge => "heavy-edge",
        PartitionerType::Random => "random",
    }
}
