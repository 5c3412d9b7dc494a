//! # icadenoise — ICA artifact identification for resting-state EEG
//!
//! `icadenoise` finds the independent components of an EEG recording that
//! carry ocular (blink, saccade) or cardiac activity. The DSP and ICA steps
//! follow [MNE-Python](https://mne.tools) (`Raw.filter`,
//! `set_eeg_reference`, `ICA(method="fastica")`, `find_bads_eog`), in pure
//! Rust on top of [ndarray](https://crates.io/crates/ndarray) and
//! [RustFFT](https://crates.io/crates/rustfft).
//!
//! ## Pipeline overview
//!
//! ```text
//! raw.safetensors
//!   │
//!   ├─ io::SafetensorsSource      [C, T] samples + channel names/types
//!   ├─ remap::remap()             Eog_v = VPVA − VNVB, Eog_h = HPHL − HNHR,
//!   │                             Erbs → Ecg, drop OrbOcc/Mass, placeholders
//!   ├─ condition::condition()     FIR band-pass 1–30 Hz → EEG average reference
//!   │                             → spherical 10-05 montage → names restored
//!   ├─ ica::fit()                 pre-whiten → PCA → FastICA (15 comps, seed 97)
//!   └─ score::score() × 3         band-passed Pearson r vs Eog_v, Eog_h;
//!        │                        CTPS over R-peak epochs of Ecg
//!        │
//!        └─→ RecordingReport      per-criterion scores + ExclusionSet
//! ```
//!
//! ## Quick start
//!
//! ```no_run
//! use icadenoise::{find_artifacts, PipelineConfig, RecordingSource, SafetensorsSource};
//! use std::path::Path;
//!
//! let raw = SafetensorsSource.load(Path::new("data/sub-001_restEO_eeg.safetensors")).unwrap();
//! let report = find_artifacts(raw, &PipelineConfig::default()).unwrap();
//! println!("exclude components {:?}", report.exclude.indices());
//! ```
//!
//! ## Running individual steps
//!
//! ```no_run
//! use icadenoise::{condition, fit, remap, score, ArtifactCriterion, IcaConfig, PipelineConfig, SyntheticRecording};
//!
//! // The synthetic recording has 9 channels after remapping.
//! let cfg = PipelineConfig {
//!     ica: IcaConfig { n_components: 7, ..IcaConfig::default() },
//!     ..PipelineConfig::default()
//! };
//! let raw = SyntheticRecording::default().with_cardiac().build().unwrap();
//!
//! let remapped = remap(raw, &cfg.remap).unwrap();
//! let clean = condition(remapped, &cfg.filter).unwrap();
//! let model = fit(&clean, &cfg.ica).unwrap();
//! let vertical = score(&model, &clean, ArtifactCriterion::OcularVertical.reference_channel(), &cfg.scoring).unwrap();
//! let cleaned = model.remove_components(clean, &vertical.flagged).unwrap();
//! ```

pub mod buffer;
pub mod catalog;
pub mod cohort;
pub mod condition;
pub mod config;
pub mod ctps;
pub mod ecg;
pub mod error;
pub mod filter;
pub mod ica;
pub mod io;
pub mod linalg;
pub mod montage;
pub mod reference;
pub mod remap;
pub mod score;
pub mod synth;

use log::info;
use serde::Serialize;
use std::collections::BTreeMap;

// ── Crate-root re-exports ─────────────────────────────────────────────────

// buffer
pub use buffer::{ChannelDescriptor, ChannelIndex, ChannelKind, SignalBuffer};

// catalog / cohort
pub use catalog::{DirectoryCatalog, SubjectCatalog};
pub use cohort::{run_cohort, CohortReport, SubjectOutcome, SubjectResult};

// config
pub use config::{
    CardiacMethod, CtpsConfig, DetectionPolicy, FilterConfig, IcaConfig, PipelineConfig, RemapConfig, ScoringConfig,
};

// error
pub use error::{IcaError, Result};

// filter: design helpers + convolution
pub use filter::{apply_fir_zero_phase, design_bandpass, filter_1d, firwin, hamming};

// stages
pub use condition::condition;
pub use ica::{fit, IcaModel};
pub use montage::Montage;
pub use reference::{average_reference_inplace, set_eeg_average_reference};
pub use remap::remap;
pub use score::{score, ArtifactCriterion, ComponentScores, ExclusionSet};

// io: safetensors helpers
pub use io::{save_buffer, RecordingSource, SafetensorsSource, StWriter};

pub use synth::SyntheticRecording;

/// Outcome of [`find_artifacts`] for one recording.
#[derive(Debug, Clone, Serialize)]
pub struct RecordingReport {
    pub n_components: usize,
    /// FastICA iterations until convergence.
    pub n_iter: usize,
    /// Share of pre-whitened variance kept by the PCA step.
    pub explained_variance: f64,
    pub scores: BTreeMap<ArtifactCriterion, ComponentScores>,
    /// Union of flagged components across criteria.
    pub exclude: ExclusionSet,
}

/// Run the **full artifact identification pipeline** on one recording.
///
/// 1. [`remap`] the ocular/cardiac channels.
/// 2. [`condition`]: band-pass, EEG average reference, montage.
/// 3. [`fit`] FastICA.
/// 4. [`score`] the components against `Eog_v`, `Eog_h` and, when
///    [`RemapConfig::cardiac`] is set, `Ecg`.
///
/// An empty [`ExclusionSet`] is a valid result. Any error aborts the
/// recording.
///
/// # Errors
///
/// * [`IcaError::MissingChannel`] when a remap electrode is absent.
/// * [`IcaError::InvalidFilterRange`] for an impossible band.
/// * [`IcaError::InsufficientChannels`] when `n_components` exceeds the
///   channel count or data rank.
/// * [`IcaError::Convergence`] when FastICA hits its iteration cap.
pub fn find_artifacts(buffer: SignalBuffer, cfg: &PipelineConfig) -> Result<RecordingReport> {
    let remapped = remap::remap(buffer, &cfg.remap)?;
    let clean = condition::condition(remapped, &cfg.filter)?;
    let model = ica::fit(&clean, &cfg.ica)?;

    let mut scores = BTreeMap::new();
    let mut exclude = ExclusionSet::new();
    for criterion in ArtifactCriterion::ALL {
        if criterion == ArtifactCriterion::Cardiac && cfg.remap.cardiac.is_none() {
            continue;
        }
        let s = score::score(&model, &clean, criterion.reference_channel(), &cfg.scoring)?;
        info!("{criterion}: flagged {:?}", s.flagged);
        exclude.insert(criterion, &s.flagged);
        scores.insert(criterion, s);
    }

    Ok(RecordingReport {
        n_components: model.n_components(),
        n_iter: model.n_iter(),
        explained_variance: model.explained_variance_ratio(),
        scores,
        exclude,
    })
}
