//! lookalike CLI
//!
//! Runs the pipeline stages one at a time or all in order:
//!
//! 1. aggregate: fold issue and commit dumps into per-login metrics (cached)
//! 2. vectorize: label every contributor against the reference login
//! 3. learn: balance repositories and fit one weight per metric
//! 4. score: rank every login of every repository with the learned weights
//!
//! Each stage reads the previous stage's artifacts from the data directory,
//! so a failed or interrupted run can resume at any stage.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

use lookalike::config::{Config, DEFAULT_CONFIG_FILE};
use lookalike::pipeline::{AggregateStatus, Pipeline};
use lookalike::rendering::{Colorizer, RankingRenderer};
use lookalike::source::DumpSource;
use lookalike::training::TrainingReport;

/// Rank contributors by how closely they resemble a reference contributor
///
/// lookalike learns interpretable per-metric weights from the reference
/// login's activity across several repositories, then scores everyone
/// else with the same weighted sum.
///
/// Examples:
///   lookalike run                      # Full pipeline from lookalike.toml
///   lookalike aggregate --refresh      # Recompute cached metrics
///   lookalike -c other.toml score      # Rescore with existing weights
#[derive(Parser, Debug)]
#[command(name = "lookalike")]
#[command(version)]
#[command(about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Config file
    ///
    /// Names the reference login, the repositories and the data directory.
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Verbose output
    ///
    /// Raises the log level to DEBUG: skipped commits, convergence
    /// details and per-repository balancing.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    ///
    /// Useful for piping rankings to files.
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Aggregate issue and commit dumps into per-login metrics
    Aggregate {
        /// Recompute metrics even when they are cached
        #[arg(long)]
        refresh: bool,
    },
    /// Build labeled feature vectors against the reference login
    Vectorize,
    /// Fit one weight per metric across all repositories
    Learn,
    /// Score and rank every login with the learned weights
    Score,
    /// Run aggregate, vectorize, learn and score in order
    Run {
        /// Recompute metrics even when they are cached
        #[arg(long)]
        refresh: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .init();
    }

    let config = Config::load(&cli.config)
        .with_context(|| format!("failed to load config {}", cli.config.display()))?;
    if cli.verbose {
        eprintln!("{}", config.display_summary());
    }

    let source = DumpSource::new(&config.data_dir);
    let pipeline = Pipeline::new(config, source);
    let color = !cli.no_color;

    match cli.command {
        Command::Aggregate { refresh } => run_aggregate(&pipeline, refresh)?,
        Command::Vectorize => run_vectorize(&pipeline)?,
        Command::Learn => run_learn(&pipeline, color)?,
        Command::Score => run_score(&pipeline, color)?,
        Command::Run { refresh } => {
            run_aggregate(&pipeline, refresh)?;
            run_vectorize(&pipeline)?;
            run_learn(&pipeline, color)?;
            run_score(&pipeline, color)?;
        }
    }

    Ok(())
}

fn run_aggregate(pipeline: &Pipeline<DumpSource>, refresh: bool) -> Result<()> {
    let outcomes = pipeline.aggregate(refresh).context("aggregate stage failed")?;
    for outcome in outcomes {
        match outcome.status {
            AggregateStatus::Cached => println!("{}: cached", outcome.repo),
            AggregateStatus::Aggregated {
                logins,
                skipped_commits,
            } => println!(
                "{}: {} logins ({} commits skipped)",
                outcome.repo, logins, skipped_commits
            ),
        }
    }
    Ok(())
}

fn run_vectorize(pipeline: &Pipeline<DumpSource>) -> Result<()> {
    let datasets = pipeline.vectorize().context("vectorize stage failed")?;
    for dataset in datasets {
        println!("{}: {} examples", dataset.repo, dataset.len());
    }
    Ok(())
}

fn run_learn(pipeline: &Pipeline<DumpSource>, color: bool) -> Result<()> {
    let report = pipeline.learn().context("learn stage failed")?;
    log_report(&report);

    let colors = Colorizer::new(color);
    println!("{}", colors.header("Learned weights"));
    print!("{}", RankingRenderer::new(color).render_weights(&report.weights));
    Ok(())
}

fn log_report(report: &TrainingReport) {
    info!(
        strategy = report.strategy,
        examples = report.n_examples,
        iterations = report.iterations,
        converged = report.converged,
        intercept = report.intercept,
        "{}",
        report.evaluation
    );
}

fn run_score(pipeline: &Pipeline<DumpSource>, color: bool) -> Result<()> {
    let scores = pipeline.score().context("score stage failed")?;
    let colors = Colorizer::new(color);
    let renderer = RankingRenderer::new(color).with_highlight(pipeline.config().reference.clone());

    if let Some(first) = scores.first() {
        println!("{} {}", colors.dim("score ="), first.table.formula);
        println!();
    }
    for repo in &scores {
        print!("{}", renderer.render(&repo.repo, &repo.table));
        println!();
    }
    Ok(())
}
