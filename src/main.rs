//! Sumi-Scribe main entry point
//!
//! This is the command-line interface for the Sumi-Scribe site scraper.

use anyhow::{bail, Context};
use clap::Parser;
use std::path::{Path, PathBuf};
use sumi_scribe::config::{load_config_with_hash, Config, PipelineConfig};
use sumi_scribe::crawler::{expand_entrypoint, Coordinator};
use sumi_scribe::extract::{Extractor, FieldSource};
use sumi_scribe::output::print_summary;
use tracing_subscriber::EnvFilter;

/// Sumi-Scribe: a configuration-driven site scraper
///
/// Each config file describes one site: where to start, which records to
/// extract, how to normalize their fields and where to write them. Several
/// configs are run one after another.
#[derive(Parser, Debug)]
#[command(name = "sumi-scribe")]
#[command(version)]
#[command(about = "A configuration-driven site scraper", long_about = None)]
struct Cli {
    /// Paths to site configuration files (TOML, or JSON by extension)
    #[arg(value_name = "CONFIG", required = true)]
    configs: Vec<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Crawl and extract without writing to any sink
    #[arg(long, conflicts_with = "validate")]
    dry_run: bool,

    /// Validate the configs, print what they compile to, and exit
    #[arg(long, conflicts_with = "dry_run")]
    validate: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let mut failed = 0;

    for path in &cli.configs {
        if let Err(e) = run_one(path, &cli).await {
            tracing::error!("{}: {:#}", path.display(), e);
            failed += 1;
        }
    }

    if failed > 0 {
        bail!("{} of {} configs failed", failed, cli.configs.len());
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sumi_scribe=info,warn"),
            1 => EnvFilter::new("sumi_scribe=debug,info"),
            2 => EnvFilter::new("sumi_scribe=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Loads one config and validates or crawls it
async fn run_one(path: &Path, cli: &Cli) -> anyhow::Result<()> {
    tracing::info!("Loading configuration from: {}", path.display());
    let (config, config_hash) = load_config_with_hash(path)
        .with_context(|| format!("failed to load {}", path.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.validate {
        return handle_validate(&config);
    }

    let coordinator = Coordinator::new(&config, cli.dry_run)
        .with_context(|| format!("failed to set up crawl for {}", config.name))?
        .with_config_hash(config_hash);

    let summary = coordinator
        .run()
        .await
        .with_context(|| format!("crawl of {} failed", config.name))?;

    if !cli.quiet {
        print_summary(&summary);
    }

    Ok(())
}

/// Handles the --validate mode: compiles the config and prints the result
fn handle_validate(config: &Config) -> anyhow::Result<()> {
    let extractor = Extractor::new(config)?;

    println!("=== {} ===\n", config.name);
    println!("Base URL: {}", config.base_url);

    let urls: Vec<String> = config.entrypoints.iter().flat_map(expand_entrypoint).collect();
    println!("\nEntry URLs ({}):", urls.len());
    for url in &urls {
        println!("  - {}", url);
    }

    println!("\nRequest:");
    println!("  Timeout: {}s", config.request.timeout_s);
    println!("  Verify TLS: {}", config.request.verify);
    println!("  Max attempts: {}", config.request.retry.max_attempts);

    println!("\nItems ({}):", extractor.specs().len());
    for spec in extractor.specs().values() {
        println!("  - {}", spec.name);
        if let Some(regex) = &spec.match_url {
            println!("    match_url: {}", regex.as_str());
        }
        if let Some(selector) = &spec.list_selector_expr {
            println!("    list_selector: {}", selector);
        }
        if !spec.dedupe_keys.is_empty() {
            println!("    dedupe_keys: {}", spec.dedupe_keys.join(", "));
        }
        for field in &spec.fields {
            let source = match &field.source {
                FieldSource::Tag(tag) => format!("{:?}", tag),
                FieldSource::Candidates(candidates) => format!("{} candidates", candidates.len()),
            };
            println!(
                "    * {} ({}, {} normalize ops)",
                field.name,
                source,
                field.normalize.len()
            );
        }
    }

    if !config.links.is_empty() {
        println!("\nLink rules ({}):", config.links.len());
        for rule in &config.links {
            println!("  - {}", rule.css);
        }
    }

    println!("\nPipelines ({}):", config.pipelines.len());
    for pipeline in &config.pipelines {
        match pipeline {
            PipelineConfig::Csv { path } => println!("  - csv: {}", path),
            PipelineConfig::Sqlite {
                dsn, path, table, ..
            } => println!(
                "  - sqlite: {} (table {})",
                dsn.as_deref().or(path.as_deref()).unwrap_or("crawler.db"),
                table
            ),
        }
    }

    println!("\n✓ Configuration is valid");

    Ok(())
}
