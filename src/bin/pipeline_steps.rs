/// pipeline_steps: read a recording, run each pipeline step, write every
/// intermediate array to a safetensors file for comparison against Python/MNE.
///
/// Output keys:
///   raw           [C, T]        f64  input samples
///   remapped      [C', T]       f64  after ocular/cardiac remap
///   filtered      [C', T]       f64  after FIR band-pass
///   referenced    [C', T]       f64  after EEG average reference
///   ch_names      U8                 newline-separated names of C'
///   unmixing      [n, C']       f64  ICA unmixing matrix
///   mixing        [C', n]       f64  ICA mixing matrix
///   sources       [n, T]        f64  component activations
///   scores_<ref>  [n]           f64  per-component correlation with <ref>
///   flagged_<ref> [k]           i32  flagged components for <ref>
///   n_iter        [1]           i32  FastICA iterations
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use icadenoise::{
    condition::bandpass,
    fit,
    montage::Montage,
    reference::set_eeg_average_reference,
    remap, score, ArtifactCriterion, PipelineConfig, RecordingSource, SafetensorsSource, StWriter,
    SyntheticRecording,
};

#[derive(Parser, Debug)]
#[command(name = "pipeline_steps")]
struct Args {
    /// Input raw.safetensors (omit to use the synthetic demo recording).
    #[arg(long)]
    input: Option<PathBuf>,

    /// Output safetensors path.
    #[arg(long)]
    output: PathBuf,

    /// JSON pipeline configuration.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of ICA components (the synthetic recording supports up to 7).
    #[arg(long)]
    n_components: Option<usize>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();
    let mut cfg = match &args.config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(n) = args.n_components {
        cfg.ica.n_components = n;
    }

    // ── 1. Load ────────────────────────────────────────────────────────────
    let t_load = now();
    let raw = match &args.input {
        Some(path) => SafetensorsSource.load(path)?,
        None => SyntheticRecording::default().with_cardiac().build()?,
    };
    let raw_data = raw.data().clone();
    let ms_load = t_load.elapsed().as_secs_f64() * 1000.0;

    // ── 2. Remap ───────────────────────────────────────────────────────────
    let t_remap = now();
    let mut buf = remap(raw, &cfg.remap)?;
    let remapped = buf.data().clone();
    let ms_remap = t_remap.elapsed().as_secs_f64() * 1000.0;

    // ── 3. Band-pass ───────────────────────────────────────────────────────
    let t_bp = now();
    bandpass(&mut buf, &cfg.filter)?;
    let filtered = buf.data().clone();
    let ms_bp = t_bp.elapsed().as_secs_f64() * 1000.0;

    // ── 4. Average reference + montage ─────────────────────────────────────
    let t_ref = now();
    set_eeg_average_reference(&mut buf);
    Montage::spherical_1005().apply(&mut buf);
    buf.revert_placeholders()?;
    let ms_ref = t_ref.elapsed().as_secs_f64() * 1000.0;

    // ── 5. ICA ─────────────────────────────────────────────────────────────
    let t_ica = now();
    let model = fit(&buf, &cfg.ica)?;
    let sources = model.sources(&buf)?;
    let ms_ica = t_ica.elapsed().as_secs_f64() * 1000.0;

    // ── 6. Scores ──────────────────────────────────────────────────────────
    let t_score = now();
    let mut scored = Vec::new();
    for criterion in ArtifactCriterion::ALL {
        let reference = criterion.reference_channel();
        if buf.contains(reference) {
            scored.push(score(&model, &buf, reference, &cfg.scoring)?);
        }
    }
    let ms_score = t_score.elapsed().as_secs_f64() * 1000.0;

    // Print internal step timings to stderr.
    // Format: "TIMING load=Xms remap=Xms bandpass=Xms ref=Xms ica=Xms score=Xms"
    eprintln!(
        "TIMING load={ms_load:.4}ms remap={ms_remap:.4}ms bandpass={ms_bp:.4}ms \
         ref={ms_ref:.4}ms ica={ms_ica:.4}ms score={ms_score:.4}ms",
    );
    eprintln!(
        "  {} ch  sfreq={} Hz  {} components  {} iterations",
        buf.n_channels(),
        buf.sfreq(),
        model.n_components(),
        model.n_iter()
    );

    // ── 7. Write output ────────────────────────────────────────────────────
    eprintln!("Writing → {}", args.output.display());
    let mut w = StWriter::new();
    w.add_f64_arr2("raw", &raw_data);
    w.add_f64_arr2("remapped", &remapped);
    w.add_f64_arr2("filtered", &filtered);
    w.add_f64_arr2("referenced", buf.data());
    w.add_lines("ch_names", buf.ch_names());
    w.add_f64_arr2("unmixing", &model.unmixing_matrix());
    w.add_f64_arr2("mixing", &model.mixing_matrix());
    w.add_f64_arr2("sources", &sources);
    for s in &scored {
        w.add_f64(&format!("scores_{}", s.reference), &s.scores, &[s.scores.len()]);
        let flagged: Vec<i32> = s.flagged.iter().map(|&i| i as i32).collect();
        w.add_i32(&format!("flagged_{}", s.reference), &flagged, &[flagged.len()]);
    }
    w.add_i32("n_iter", &[model.n_iter() as i32], &[1]);
    w.write(&args.output)?;

    eprintln!("Done.");
    Ok(())
}

/// Return `std::time::Instant::now()` (used for internal timing).
#[inline(always)]
fn now() -> std::time::Instant { std::time::Instant::now() }
