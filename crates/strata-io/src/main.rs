use clap::Parser;
use strata_io::cli::{run_gen_corpus, run_pretrain, Cli, Commands};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Pretrain(opts) => run_pretrain(&opts)?,
        Commands::GenCorpus(opts) => run_gen_corpus(&opts)?,
    }
    Ok(())
}
