use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;

use icadenoise::{
    find_artifacts, save_buffer, DetectionPolicy, PipelineConfig, RecordingSource, SafetensorsSource,
    SyntheticRecording,
};

#[derive(Parser, Debug)]
#[command(name = "find_artifacts", about = "Flag ocular/cardiac ICA components of one EEG recording")]
struct Args {
    /// raw.safetensors recording (data, sfreq, ch_names[, ch_types, chan_pos]).
    #[arg(long)]
    input: Option<PathBuf>,

    /// JSON pipeline configuration; missing fields take their defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Band-pass lower edge (Hz).
    #[arg(long)]
    low: Option<f64>,

    /// Band-pass upper edge (Hz).
    #[arg(long)]
    high: Option<f64>,

    /// Number of ICA components.
    #[arg(long)]
    n_components: Option<usize>,

    /// FastICA seed.
    #[arg(long)]
    seed: Option<u64>,

    /// Robust z-score threshold for flagging components.
    #[arg(long)]
    threshold: Option<f64>,

    /// Skip cardiac scoring (no Erbs channel in the recording).
    #[arg(long)]
    no_cardiac: bool,

    /// Write a synthetic demo recording to this path and exit.
    #[arg(long)]
    synthetic: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if let Some(out) = &args.synthetic {
        let raw = SyntheticRecording::default().with_cardiac().build()?;
        save_buffer(&raw, out)?;
        eprintln!("Written {} ch × {} samples → {}", raw.n_channels(), raw.n_times(), out.display());
        return Ok(());
    }
    let Some(input) = &args.input else {
        bail!("--input is required unless --synthetic is given");
    };

    let mut cfg = match &args.config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(v) = args.low {
        cfg.filter.low_cutoff_hz = v;
    }
    if let Some(v) = args.high {
        cfg.filter.high_cutoff_hz = v;
    }
    if let Some(v) = args.n_components {
        cfg.ica.n_components = v;
    }
    if let Some(v) = args.seed {
        cfg.ica.random_seed = v;
    }
    if let Some(threshold) = args.threshold {
        cfg.scoring.policy = DetectionPolicy::RobustZScore { threshold };
    }
    if args.no_cardiac {
        cfg.remap.cardiac = None;
    }

    let raw = SafetensorsSource.load(input)?;
    eprintln!("Loaded {} ch × {} samples @ {} Hz", raw.n_channels(), raw.n_times(), raw.sfreq());

    let report = find_artifacts(raw, &cfg)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
