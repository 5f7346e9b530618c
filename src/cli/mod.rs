//! Kolosal Boundary CLI
//!
//! Builds scatter payloads and class colours from CSV files.

use clap::{Parser, Subcommand};
use colored::*;
use ndarray::Array2;
use polars::prelude::*;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::classifier::KnnClassifier;
use crate::colors::class_colors;
use crate::config::EngineConfig;
use crate::projection::ReductionConfig;
use crate::scatter::{LabeledRows, ScatterAssembler, ScatterConfig, ScatterRequest};

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

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "kolosal-boundary")]
#[command(author = "KolosalAI")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Decision-boundary scatter plots for tabular classifiers")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Project a dataset and reconstruct the classifier's decision regions
    Scatter {
        /// Focal data file (CSV)
        #[arg(short, long)]
        data: PathBuf,

        /// Target column name
        #[arg(short, long)]
        target: String,

        /// Reference data file projected together with the focal rows
        #[arg(short, long)]
        reference: Option<PathBuf>,

        /// Reduction method (pca, tsne, umap, mds)
        #[arg(short, long, default_value = "pca")]
        method: String,

        /// Reduction parameters as a JSON object
        #[arg(long)]
        params: Option<String>,

        /// Mesh step in projected space
        #[arg(long)]
        step: Option<f64>,

        /// Maximum rendered points per class
        #[arg(long)]
        threshold: Option<usize>,

        /// Sample multiplier of the density filter
        #[arg(long)]
        multiplier: Option<usize>,

        /// Random seed
        #[arg(long)]
        seed: Option<u64>,

        /// Engine configuration file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output payload file; printed to stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print one colour per class
    Colors {
        /// Input data file (CSV)
        #[arg(short, long)]
        data: PathBuf,

        /// Target column name
        #[arg(short, long)]
        target: String,

        /// Reduction used for centroid colours (pca, tsne, umap, mds)
        #[arg(short, long, default_value = "pca")]
        method: String,
    },
}

// ─── Data loading ──────────────────────────────────────────────────────────────

pub fn load_data(path: &Path) -> anyhow::Result<DataFrame> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    let df = match ext {
        "csv" => CsvReadOptions::default()
            .with_infer_schema_length(Some(1000))
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?,
        _ => anyhow::bail!("Unsupported file format: {}", ext),
    };

    Ok(df)
}

/// Feature matrix and raw target values of one frame
pub struct LabeledFrame {
    pub feature_names: Vec<String>,
    pub rows: Array2<f64>,
    pub targets: Vec<String>,
}

impl LabeledFrame {
    pub fn from_frame(df: &DataFrame, target: &str) -> anyhow::Result<Self> {
        let feature_names: Vec<String> = df
            .get_column_names()
            .into_iter()
            .filter(|name| name.as_str() != target)
            .map(|s| s.to_string())
            .collect();
        Self::with_features(df, target, feature_names)
    }

    /// Same columns as `feature_names`, in that order
    pub fn with_features(df: &DataFrame, target: &str, feature_names: Vec<String>) -> anyhow::Result<Self> {
        let targets: Vec<String> = df
            .column(target)
            .map_err(|_| anyhow::anyhow!("Target column not found: {}", target))?
            .cast(&DataType::String)?
            .str()?
            .into_iter()
            .map(|v| v.unwrap_or("").to_string())
            .collect();

        let col_data: Vec<Vec<f64>> = feature_names
            .iter()
            .map(|name| {
                let values = df
                    .column(name)
                    .map_err(|_| anyhow::anyhow!("Feature column not found: {}", name))?
                    .cast(&DataType::Float64)?
                    .f64()?
                    .into_iter()
                    .map(|v| v.unwrap_or(f64::NAN))
                    .collect();
                Ok(values)
            })
            .collect::<anyhow::Result<_>>()?;

        let col_refs: Vec<&[f64]> = col_data.iter().map(|c| c.as_slice()).collect();
        let rows = Array2::from_shape_fn((df.height(), col_refs.len()), |(r, c)| col_refs[c][r]);

        Ok(Self {
            feature_names,
            rows,
            targets,
        })
    }

    /// Label index of every row into `class_names`
    pub fn labels(&self, class_names: &[String]) -> Vec<i64> {
        self.targets
            .iter()
            .map(|t| class_names.iter().position(|c| c == t).map_or(-1, |i| i as i64))
            .collect()
    }
}

/// Sorted distinct target values across all frames
pub fn class_names<'a>(frames: impl IntoIterator<Item = &'a LabeledFrame>) -> Vec<String> {
    frames
        .into_iter()
        .flat_map(|f| f.targets.iter().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

// ─── Commands ──────────────────────────────────────────────────────────────────

#[allow(clippy::too_many_arguments)]
pub fn cmd_scatter(
    data_path: &Path,
    target: &str,
    reference_path: Option<&Path>,
    method: &str,
    params: Option<&str>,
    step: Option<f64>,
    threshold: Option<usize>,
    multiplier: Option<usize>,
    seed: Option<u64>,
    config_path: Option<&Path>,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let engine = match config_path {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::new(),
    };
    engine.validate()?;

    let parameters: Option<serde_json::Value> = params.map(serde_json::from_str).transpose()?;
    let mut config = ScatterConfig::from_parameters(method, parameters.as_ref(), &engine)?;
    if let Some(step) = step {
        config = config.with_step(step);
    }
    let threshold = threshold.unwrap_or(config.threshold);
    let multiplier = multiplier.unwrap_or(config.multiplier);
    config = config.with_density(threshold, multiplier);
    if let Some(seed) = seed {
        config = config.with_seed(seed);
    }

    // Progress is printed only when the payload goes to a file
    let report = output.is_some();
    if report {
        section("Scatter");
        step_run("Loading data");
    }
    let start = Instant::now();
    let focal = LabeledFrame::from_frame(&load_data(data_path)?, target)?;
    let reference = reference_path
        .map(|path| LabeledFrame::with_features(&load_data(path)?, target, focal.feature_names.clone()))
        .transpose()?;
    if report {
        step_done(&format!(
            "{} rows × {} cols in {:?}",
            focal.rows.nrows() + reference.as_ref().map_or(0, |r| r.rows.nrows()),
            focal.feature_names.len(),
            start.elapsed()
        ));
    }

    let classes = class_names(std::iter::once(&focal).chain(reference.iter()));
    let focal_labels = focal.labels(&classes);
    let reference_labels = reference.as_ref().map(|r| r.labels(&classes));

    let mut classifier = KnnClassifier::new(5);
    match (&reference, &reference_labels) {
        (Some(r), Some(labels)) => {
            let rows = ndarray::concatenate(ndarray::Axis(0), &[r.rows.view(), focal.rows.view()])?;
            let all: Vec<i64> = labels.iter().chain(focal_labels.iter()).copied().collect();
            classifier.fit(&rows, &all)?;
        }
        _ => {
            classifier.fit(&focal.rows, &focal_labels)?;
        }
    }

    if report {
        step_run(&format!("Projecting with {}", config.reduction.method().display_name().cyan()));
    }
    let start = Instant::now();
    let mut request = ScatterRequest::new(
        LabeledRows::new(&focal.rows, &focal_labels),
        &focal.feature_names,
        &classes,
        &classifier,
    );
    if let (Some(r), Some(labels)) = (&reference, &reference_labels) {
        request = request.with_reference(LabeledRows::new(&r.rows, labels));
    }
    let payload = ScatterAssembler::new(engine).assemble(&request, &config)?;
    let json = payload.to_json()?;

    match output {
        Some(path) => {
            step_done(&format!("{:?}", start.elapsed()));
            std::fs::write(path, json)?;
            println!();
            println!("  {:<16} {}", muted("Points"), payload.len().to_string().white().bold());
            println!(
                "  {:<16} {}",
                muted("Regions"),
                payload
                    .decision_boundary
                    .regions
                    .as_ref()
                    .map_or_else(|| "none".to_string(), |r| r.len().to_string())
                    .white()
            );
            println!("  {:<16} {}", muted("Output"), path.display());
            println!();
        }
        None => println!("{json}"),
    }

    Ok(())
}

pub fn cmd_colors(data_path: &Path, target: &str, method: &str) -> anyhow::Result<()> {
    let engine = EngineConfig::new();
    let reduction = ReductionConfig::from_parameters(method, None)?;
    let frame = LabeledFrame::from_frame(&load_data(data_path)?, target)?;
    let classes = class_names(std::iter::once(&frame));
    let labels = frame.labels(&classes);

    let colors = class_colors(&frame.rows, &labels, &reduction, engine.seed)?;

    section("Class colours");
    for (name, color) in classes.iter().zip(colors.iter()) {
        println!("  {:<24} {}", name, color.white());
    }
    println!();
    Ok(())
}
