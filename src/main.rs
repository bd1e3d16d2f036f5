use std::path::PathBuf;
use std::process;

use anyhow::Context;
use clap::Parser;

use lamppost_collector::config::CollectorConfig;
use lamppost_collector::ingest::device_feed::HttpFeedFetcher;
use lamppost_collector::logging;
use lamppost_collector::runner::{self, RunOptions};

/// Collect lamppost weather fields into a deduplicated CSV dataset.
#[derive(Debug, Parser)]
#[command(name = "lamppost-collector", version, about)]
struct Args {
    /// Location source holding the lamppost layer: GeoPackage (.gpkg) or
    /// GeoJSON only. Export File Geodatabases (.gdb) with ogr2ogr first.
    #[arg(long = "gdb", visible_alias = "source", value_name = "PATH")]
    source: PathBuf,

    /// Output CSV dataset; merged with and then overwritten
    #[arg(long, value_name = "PATH")]
    out: PathBuf,

    /// TOML configuration file
    #[arg(long, env = "LAMPPOST_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Layer name, overriding the configuration
    #[arg(long)]
    layer: Option<String>,

    /// Per-request timeout in seconds, overriding the configuration
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Write a JSON run report to this path
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

fn build_options(args: &Args) -> anyhow::Result<RunOptions> {
    let mut config = CollectorConfig::load_or_default(args.config.as_deref())?;
    if let Some(layer) = &args.layer {
        config.layer = layer.clone();
    }
    if let Some(secs) = args.timeout_secs {
        config.request_timeout_secs = secs;
    }
    config.validate()?;

    Ok(RunOptions {
        source: args.source.clone(),
        output: args.out.clone(),
        config,
    })
}

fn run(args: &Args) -> anyhow::Result<()> {
    let options = build_options(args)?;
    let fetcher = HttpFeedFetcher::new(
        options.config.request_timeout(),
        options.config.user_agent.as_deref(),
    )?;

    let report = runner::run(&options, &fetcher)?;

    if let Some(path) = &args.report {
        runner::write_report(path, &report)
            .with_context(|| format!("writing run report to {}", path.display()))?;
    }
    Ok(())
}

fn main() {
    dotenv::dotenv().ok();
    let args = Args::parse();
    logging::init_logging(args.verbose, args.quiet);

    if let Err(error) = run(&args) {
        eprintln!("Error: {:#}", error);
        process::exit(1);
    }
}
