//! Pipeline configuration.
//!
//! [`PipelineConfig`] holds every tunable parameter of the artifact
//! identification pipeline. The defaults reproduce the original batch run:
//! 1–30 Hz band-pass, average reference, 15 FastICA components seeded with
//! 97, correlation scoring against `Eog_v` and `Eog_h`, and cross-trial
//! phase statistics around the R peaks of `Ecg`.
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{IcaError, Result};

/// Configuration for the full per-recording pipeline.
///
/// All fields are `pub` so you can construct one with struct-update syntax:
///
/// ```
/// use icadenoise::{PipelineConfig, IcaConfig};
///
/// let cfg = PipelineConfig {
///     ica: IcaConfig { n_components: 20, ..IcaConfig::default() },
///     ..PipelineConfig::default()
/// };
/// assert_eq!(cfg.filter.low_cutoff_hz, 1.0);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub remap: RemapConfig,
    pub filter: FilterConfig,
    pub ica: IcaConfig,
    pub scoring: ScoringConfig,
}

impl PipelineConfig {
    /// Load a configuration from a JSON file. Missing fields take their
    /// default values.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| IcaError::InvalidConfig(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&text)
            .map_err(|e| IcaError::InvalidConfig(format!("{}: {e}", path.display())))
    }
}

/// Channel names consumed by the remapper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemapConfig {
    /// `(positive, negative)` electrodes of the vertical ocular derivation.
    ///
    /// Default: `("VPVA", "VNVB")`.
    pub vertical_pair: (String, String),

    /// `(positive, negative)` electrodes of the horizontal ocular derivation.
    ///
    /// Default: `("HPHL", "HNHR")`.
    pub horizontal_pair: (String, String),

    /// Electrode carrying the cardiac signal, renamed to `Ecg`.
    ///
    /// `None` disables cardiac scoring entirely.
    ///
    /// Default: `Some("Erbs")`.
    pub cardiac: Option<String>,

    /// Auxiliary channels dropped before re-referencing (orbital and
    /// mastoid electrodes). Every listed name must be present; an empty
    /// list drops nothing.
    ///
    /// Default: `["OrbOcc", "Mass"]`.
    pub auxiliary: Vec<String>,
}

impl Default for RemapConfig {
    fn default() -> Self {
        Self {
            vertical_pair: ("VPVA".into(), "VNVB".into()),
            horizontal_pair: ("HPHL".into(), "HNHR".into()),
            cardiac: Some("Erbs".into()),
            auxiliary: vec!["OrbOcc".into(), "Mass".into()],
        }
    }
}

/// Band-pass applied by the conditioner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Lower pass-band edge in Hz.
    ///
    /// The lower transition bandwidth is `min(max(0.25 · low, 2.0), low)`,
    /// matching `mne.filter.create_filter(l_trans_bandwidth='auto')`.
    ///
    /// Default: `1.0` Hz.
    pub low_cutoff_hz: f64,

    /// Upper pass-band edge in Hz.
    ///
    /// Default: `30.0` Hz.
    pub high_cutoff_hz: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self { low_cutoff_hz: 1.0, high_cutoff_hz: 30.0 }
    }
}

/// FastICA decomposition parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IcaConfig {
    /// Number of independent components to estimate.
    ///
    /// Must not exceed the channel count (nor the numerical rank of the
    /// conditioned data, which average referencing lowers by one).
    ///
    /// Default: `15`.
    pub n_components: usize,

    /// Seed for the unmixing-matrix initialisation.
    ///
    /// Default: `97`.
    pub random_seed: u64,

    /// FastICA iteration cap (MNE's `max_iter="auto"` resolves to 1000).
    ///
    /// Default: `1000`.
    pub max_iter: usize,

    /// Convergence tolerance on `max |  |⟨w_new, w_old⟩| − 1 |`.
    ///
    /// Default: `1e-4`.
    pub tol: f64,
}

impl Default for IcaConfig {
    fn default() -> Self {
        Self { n_components: 15, random_seed: 97, max_iter: 1000, tol: 1e-4 }
    }
}

/// Rule deciding which component scores count as artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DetectionPolicy {
    /// Flag components whose `|r|` lies more than `threshold` robust
    /// standard deviations (1.4826 · MAD) above the median `|r|`. When the
    /// MAD is zero the spread is 1.2533 · the mean absolute deviation.
    RobustZScore { threshold: f64 },

    /// MNE's iterative outlier rule: z-score the signed scores, flag
    /// `|z| > threshold`, mask the flagged ones and repeat up to `max_iter`
    /// times.
    ///
    /// With `max_iter > 1` the flagged set is not guaranteed to shrink
    /// monotonically as `threshold` grows.
    ZScore { threshold: f64, max_iter: usize },

    /// Flag components whose `|r|` reaches a fixed correlation.
    Fixed { min_abs_correlation: f64 },
}

impl Default for DetectionPolicy {
    fn default() -> Self {
        DetectionPolicy::RobustZScore { threshold: 3.0 }
    }
}

/// Scoring parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub policy: DetectionPolicy,

    /// Band applied to ocular (and EEG/MISC proxy) references and sources
    /// before correlating.
    ///
    /// Default: `(1.0, 10.0)` Hz, as in `ICA.find_bads_eog`.
    pub ocular_band: (f64, f64),

    /// Band applied to cardiac references and sources before scoring,
    /// with either method.
    ///
    /// Default: `(8.0, 16.0)` Hz, as in `create_ecg_epochs` and
    /// `ICA.find_bads_ecg`.
    pub cardiac_band: (f64, f64),

    /// How components are scored against an ECG-kind reference.
    ///
    /// Default: [`CardiacMethod::Ctps`], which is what `ICA.find_bads_ecg`
    /// runs unless told otherwise.
    pub cardiac_method: CardiacMethod,

    /// Parameters of the [`CardiacMethod::Ctps`] scorer.
    pub ctps: CtpsConfig,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            policy: DetectionPolicy::default(),
            ocular_band: (1.0, 10.0),
            cardiac_band: (8.0, 16.0),
            cardiac_method: CardiacMethod::default(),
            ctps: CtpsConfig::default(),
        }
    }
}

/// Scoring method for ECG-kind references.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardiacMethod {
    /// Cross-trial phase statistic over epochs centred on detected R peaks.
    /// Components are flagged against [`CtpsConfig::threshold`]; the
    /// [`DetectionPolicy`] does not apply.
    #[default]
    Ctps,
    /// Band-passed Pearson correlation with the detection policy, like the
    /// ocular references.
    Correlation,
}

/// R-peak detection and phase-statistic parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CtpsConfig {
    /// Band applied to the ECG channel before QRS detection.
    ///
    /// Default: `(5.0, 35.0)` Hz.
    pub qrs_band: (f64, f64),

    /// Detection level as a fraction of the mean per-second peak of the
    /// rectified ECG over the first three seconds.
    ///
    /// Default: `0.6`.
    pub qrs_threshold: f64,

    /// Epoch window around each R peak, in seconds.
    ///
    /// Default: `(-0.5, 0.5)`.
    pub epoch_window: (f64, f64),

    /// Minimum normalised Kuiper significance for a component to be flagged.
    ///
    /// `None` derives it from the sample rate so that it corresponds to a
    /// phase-locking p-value of 1e-20.
    ///
    /// Default: `None`.
    pub threshold: Option<f64>,
}

impl Default for CtpsConfig {
    fn default() -> Self {
        Self { qrs_band: (5.0, 35.0), qrs_threshold: 0.6, epoch_window: (-0.5, 0.5), threshold: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_batch_script() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.filter.low_cutoff_hz, 1.0);
        assert_eq!(cfg.filter.high_cutoff_hz, 30.0);
        assert_eq!(cfg.ica.n_components, 15);
        assert_eq!(cfg.ica.random_seed, 97);
        assert_eq!(cfg.remap.cardiac.as_deref(), Some("Erbs"));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let json = r#"{
            "ica": { "n_components": 6 },
            "scoring": { "policy": { "kind": "fixed", "min_abs_correlation": 0.8 } }
        }"#;
        let cfg: PipelineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.ica.n_components, 6);
        assert_eq!(cfg.ica.random_seed, 97);
        assert_eq!(cfg.scoring.policy, DetectionPolicy::Fixed { min_abs_correlation: 0.8 });
        assert_eq!(cfg.scoring.ocular_band, (1.0, 10.0));
        assert_eq!(cfg.scoring.cardiac_method, CardiacMethod::Ctps);
        assert_eq!(cfg.filter, FilterConfig::default());
    }

    #[test]
    fn cardiac_method_from_json() {
        let json = r#"{ "scoring": { "cardiac_method": "correlation", "ctps": { "threshold": 0.2 } } }"#;
        let cfg: PipelineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.scoring.cardiac_method, CardiacMethod::Correlation);
        assert_eq!(cfg.scoring.ctps.threshold, Some(0.2));
        assert_eq!(cfg.scoring.ctps.epoch_window, (-0.5, 0.5));
    }

    #[test]
    fn config_round_trips_through_json() {
        let cfg = PipelineConfig {
            remap: RemapConfig { cardiac: None, ..RemapConfig::default() },
            ..PipelineConfig::default()
        };
        let text = serde_json::to_string(&cfg).unwrap();
        let back: PipelineConfig = serde_json::from_str(&text).unwrap();
        assert_eq!(back, cfg);
    }
}
