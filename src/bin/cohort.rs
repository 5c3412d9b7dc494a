use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use icadenoise::{run_cohort, DirectoryCatalog, PipelineConfig, RecordingSource, SafetensorsSource};

#[derive(Parser, Debug)]
#[command(name = "cohort", about = "Run artifact identification over every subject of a cohort")]
struct Args {
    /// Participants JSON: {"CATEGORY": ["subject", ...], ...}.
    #[arg(long)]
    participants: PathBuf,

    /// Data root holding <category>/<subject>/ directories.
    #[arg(long)]
    root: PathBuf,

    /// Categories to process (default: all, sorted).
    #[arg(long, value_delimiter = ',')]
    categories: Vec<String>,

    /// Substring identifying the recording file.
    #[arg(long, default_value = icadenoise::catalog::DEFAULT_RECORDING_PATTERN)]
    pattern: String,

    /// JSON pipeline configuration.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the cohort report here instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let cfg = match &args.config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };
    let source = SafetensorsSource;
    let catalog = DirectoryCatalog::from_participants_json(&args.participants, &args.root, source.extension())?
        .with_pattern(args.pattern.as_str());
    let categories = if args.categories.is_empty() {
        catalog.categories().into_iter().map(String::from).collect()
    } else {
        args.categories.clone()
    };

    let report = run_cohort(&catalog, &source, &categories, &cfg)?;
    let json = serde_json::to_string_pretty(&report)?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, json)?;
            eprintln!("Written → {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}
