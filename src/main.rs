use std::path::PathBuf;

use clap::Parser;

use sales_intel::config::EngineConfig;
use sales_intel::pipeline::{self, PipelineInputs};

/// Resolve contacts from a mail archive, CRM export and enrichment
/// feed, classify them into funnel stages and export prioritized CSVs.
#[derive(Parser, Debug)]
#[command(name = "sales-intel", version, about)]
struct Cli {
    /// Engine configuration file (JSON). Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Mail archive in mbox format.
    #[arg(long)]
    mbox: PathBuf,

    /// CRM contact export (CSV).
    #[arg(long)]
    crm: PathBuf,

    /// Enrichment feed (CSV) with current role and job-change flags.
    #[arg(long)]
    enrichment: Option<PathBuf>,

    /// Directory for the output tables.
    #[arg(long, default_value = "outputs")]
    out: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    let report = pipeline::run(
        config,
        PipelineInputs {
            mbox: cli.mbox,
            crm: cli.crm,
            enrichment: cli.enrichment,
            out_dir: cli.out,
        },
    )
    .await?;

    print!("{}", report.render());
    Ok(())
}
