use anyhow::Result;
use clap::Parser;
use sqlbench_plot::{generate_report, ReportConfig};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sqlbench-plot")]
#[command(about = "Generate plots from sqlbench CSV results")]
struct Cli {
    /// Path to summary CSV
    #[arg(long)]
    summary: PathBuf,

    /// Path to detail CSV
    #[arg(long)]
    detail: PathBuf,

    /// Output directory for PNGs
    #[arg(long, default_value = "plots")]
    outdir: PathBuf,

    /// Enable debug logging on stderr
    #[arg(short, long, default_value = "false")]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = ReportConfig {
        summary_path: cli.summary,
        detail_path: cli.detail,
        output_dir: cli.outdir,
    };
    generate_report(&config)?;

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
