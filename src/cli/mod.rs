//! tabfit CLI Module
//!
//! Command-line interface for running the pipeline stages.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::context::RunContext;
use crate::preprocessing::{classify, ColumnTransformer};
use crate::stages;
use crate::training::ModelRegistry;
use crate::utils::DataLoader;

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn kv(key: &str, val: &str) {
    println!("  {:<18} {}", muted(key), val.white());
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "tabfit")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Model selection pipeline for tabular regression")]
#[command(long_about = None)]
pub struct Cli {
    /// Project root holding data/, models/ and metrics/
    #[arg(long, global = true, default_value = ".")]
    pub root: PathBuf,

    /// Config file (defaults to <root>/params.toml)
    #[arg(long, global = true)]
    pub params: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Split the raw CSV into train and test files
    Split,

    /// Write scaled copies of the split feature files
    Normalize,

    /// Search every configured model family and save the best pipeline
    Train,

    /// Score the saved pipeline on the test split
    Evaluate,

    /// Run split, normalize, train and evaluate in order
    Run,

    /// Show the shape and column classification of a CSV file
    Info {
        /// Input CSV file
        #[arg(short, long)]
        data: PathBuf,
    },
}

impl Cli {
    /// Dispatch the parsed command
    pub fn execute(&self) -> anyhow::Result<()> {
        match &self.command {
            Commands::Info { data } => cmd_info(data),
            command => {
                let ctx = RunContext::load(&self.root, self.params.as_deref())?;
                let registry = ModelRegistry::with_defaults();
                match command {
                    Commands::Split => cmd_split(&ctx),
                    Commands::Normalize => cmd_normalize(&ctx),
                    Commands::Train => cmd_train(&ctx, &registry),
                    Commands::Evaluate => cmd_evaluate(&ctx),
                    Commands::Run => cmd_run(&ctx, &registry),
                    Commands::Info { .. } => Ok(()),
                }
            }
        }
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_split(ctx: &RunContext) -> anyhow::Result<()> {
    section("Split");

    step_run("Splitting raw data");
    let start = Instant::now();
    let outcome = stages::split::run(ctx)?;
    step_done(&format!("{:?}", start.elapsed()));

    kv("Source", &outcome.source.display().to_string());
    kv("Target", &outcome.target);
    kv("Train rows", &outcome.train_rows.to_string());
    kv("Test rows", &outcome.test_rows.to_string());
    println!();
    Ok(())
}

pub fn cmd_normalize(ctx: &RunContext) -> anyhow::Result<()> {
    section("Normalize");

    step_run("Scaling features");
    let start = Instant::now();
    let outcome = stages::normalize::run(ctx)?;
    step_done(&format!("{:?}", start.elapsed()));

    kv("Strategy", &format!("{:?}", outcome.strategy).to_lowercase());
    kv("Scaled columns", &outcome.scaled_columns.len().to_string());
    println!();
    Ok(())
}

pub fn cmd_train(ctx: &RunContext, registry: &ModelRegistry) -> anyhow::Result<()> {
    section("Train");

    step_run(&format!("Searching {} model families", ctx.config.models.len()));
    let start = Instant::now();
    let metadata = stages::train::run(ctx, registry)?;
    step_done(&format!("{} candidates in {:?}", metadata.n_candidates, start.elapsed()));

    println!();
    println!("  {:<24} {:>14}", muted("Family"), muted(metadata.scoring.as_str()));
    println!("  {}", dim(&"─".repeat(40)));
    for family in &metadata.families {
        let name = if family.family == metadata.model_name {
            family.family.white().bold()
        } else {
            family.family.normal()
        };
        println!("  {:<24} {:>14.4}", name, family.best_score);
    }
    println!("  {}", dim(&"─".repeat(40)));

    println!();
    println!("  {} {} {}", ok("best"), metadata.model_name.white().bold(), dim(&metadata.best_params.to_string()));
    kv("Features out", &metadata.n_features_out.to_string());
    kv("Artifact", &ctx.paths.best_pipeline().display().to_string());
    println!();
    Ok(())
}

pub fn cmd_evaluate(ctx: &RunContext) -> anyhow::Result<()> {
    section("Evaluate");

    step_run("Scoring test split");
    let start = Instant::now();
    let evaluation = stages::evaluate::run(ctx)?;
    step_done(&format!("{} rows in {:?}", evaluation.rows, start.elapsed()));

    for (metric, value) in evaluation.metrics.iter() {
        let shown = if value.is_finite() { format!("{:.4}", value) } else { "n/a".to_string() };
        kv(metric.as_str(), &shown);
    }
    println!();
    Ok(())
}

pub fn cmd_run(ctx: &RunContext, registry: &ModelRegistry) -> anyhow::Result<()> {
    cmd_split(ctx)?;
    cmd_normalize(ctx)?;
    cmd_train(ctx, registry)?;
    cmd_evaluate(ctx)
}

pub fn cmd_info(data: &Path) -> anyhow::Result<()> {
    section("Info");

    let df = DataLoader::new().load_csv(data)?;
    let classification = classify(&df);
    let transformer = ColumnTransformer::build(&classification);

    kv("File", &data.display().to_string());
    kv("Shape", &format!("{} rows × {} cols", df.height(), df.width()));
    kv("Numeric", &classification.numeric.join(", "));
    kv("Categorical", &classification.categorical.join(", "));
    let passthrough = classification.passthrough(&df);
    if !passthrough.is_empty() {
        kv("Passthrough", &passthrough.join(", "));
    }
    if transformer.classification().is_empty() {
        println!("  {}", "no numeric or categorical columns".yellow());
    }
    println!();
    Ok(())
}
