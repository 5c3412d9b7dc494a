//! Artifact scoring: which components look like the reference channel?
//!
//! Ocular references: each component activation and the reference channel
//! are band-passed 1–10 Hz, as in `ICA.find_bads_eog`, and scored with the
//! Pearson correlation. A [`DetectionPolicy`] turns the score vector into
//! flagged indices.
//!
//! Cardiac references are scored as [`CardiacMethod`] says. The default,
//! [`CardiacMethod::Ctps`], follows `ICA.find_bads_ecg`: R peaks are
//! detected on the reference, the 8–16 Hz component activations are cut into
//! heartbeat epochs, and each component's cross-trial phase locking is
//! compared with a fixed threshold. [`CardiacMethod::Correlation`] treats
//! the cardiac reference like an ocular one, in the 8–16 Hz band.
//!
//! Finding nothing is a valid outcome.
use log::{debug, warn};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::buffer::{ChannelKind, SignalBuffer};
use crate::config::{CardiacMethod, DetectionPolicy, ScoringConfig};
use crate::ctps;
use crate::ecg::{epochs, find_ecg_events};
use crate::error::Result;
use crate::filter::{apply_fir_zero_phase, design_bandpass};
use crate::ica::IcaModel;
use crate::remap::{ECG, EOG_HORIZONTAL, EOG_VERTICAL};

/// MAD → standard deviation for normally distributed data.
const MAD_TO_SIGMA: f64 = 1.4826;
/// Mean absolute deviation → standard deviation for normally distributed data.
const MEAN_AD_TO_SIGMA: f64 = 1.2533;

/// Why a component was flagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactCriterion {
    OcularVertical,
    OcularHorizontal,
    Cardiac,
}

impl ArtifactCriterion {
    pub const ALL: [ArtifactCriterion; 3] =
        [ArtifactCriterion::OcularVertical, ArtifactCriterion::OcularHorizontal, ArtifactCriterion::Cardiac];

    /// Channel the criterion correlates against after remapping.
    pub fn reference_channel(&self) -> &'static str {
        match self {
            ArtifactCriterion::OcularVertical => EOG_VERTICAL,
            ArtifactCriterion::OcularHorizontal => EOG_HORIZONTAL,
            ArtifactCriterion::Cardiac => ECG,
        }
    }
}

impl fmt::Display for ArtifactCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ArtifactCriterion::OcularVertical => "ocular-vertical",
            ArtifactCriterion::OcularHorizontal => "ocular-horizontal",
            ArtifactCriterion::Cardiac => "cardiac",
        })
    }
}

/// Per-component scores against one reference channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentScores {
    pub reference: String,
    /// One per component: the signed Pearson correlation, or the CTPS
    /// significance in `[0, 1]` for a cardiac reference scored with
    /// [`CardiacMethod::Ctps`].
    pub scores: Vec<f64>,
    /// Flagged component indices, strongest `|score|` first.
    pub flagged: Vec<usize>,
}

/// Score every component of `model` against `reference` and flag the
/// artifacts.
pub fn score(
    model: &IcaModel,
    buffer: &SignalBuffer,
    reference: &str,
    cfg: &ScoringConfig,
) -> Result<ComponentScores> {
    let idx = buffer.resolve(reference)?;
    if buffer.channel(idx).kind == ChannelKind::Ecg && cfg.cardiac_method == CardiacMethod::Ctps {
        return score_ctps(model, buffer, reference, cfg);
    }
    let scores = score_sources(model, buffer, reference, cfg)?;
    let flagged = detect(&scores, &cfg.policy);
    debug!("{reference}: flagged {flagged:?} (policy {:?})", cfg.policy);
    Ok(ComponentScores { reference: reference.to_string(), scores, flagged })
}

/// Cross-trial phase statistics of every component over heartbeat epochs
/// centred on the R peaks of `reference`.
///
/// Components scoring at least [`CtpsConfig::threshold`](crate::config::CtpsConfig::threshold)
/// (derived from the sample rate when unset) are flagged. With fewer than
/// two complete epochs every score is zero.
pub fn score_ctps(
    model: &IcaModel,
    buffer: &SignalBuffer,
    reference: &str,
    cfg: &ScoringConfig,
) -> Result<ComponentScores> {
    let idx = buffer.resolve(reference)?;
    let sfreq = buffer.sfreq();
    let events = find_ecg_events(buffer.row(idx), sfreq, &cfg.ctps)?;

    let h = design_bandpass(cfg.cardiac_band.0, cfg.cardiac_band.1, sfreq)?;
    let mut sources = model.sources(buffer)?;
    apply_fir_zero_phase(&mut sources, &h);
    let beats = epochs(&sources, &events, sfreq, cfg.ctps.epoch_window);

    let n_epochs = beats.len_of(Axis(0));
    let scores = if n_epochs < 2 {
        warn!("{reference}: {n_epochs} complete heartbeat epochs, phase locking not scored");
        vec![0.0; model.n_components()]
    } else {
        ctps::component_scores(&beats)
    };
    let threshold = cfg.ctps.threshold.unwrap_or_else(|| ctps::auto_threshold(sfreq));
    let mask: Vec<bool> = scores.iter().map(|&s| n_epochs >= 2 && s >= threshold).collect();
    let flagged = strongest_first(&scores, &mask);
    debug!("{reference}: {n_epochs} epochs, flagged {flagged:?} (ctps threshold {threshold:.2})");
    Ok(ComponentScores { reference: reference.to_string(), scores, flagged })
}

/// Band-passed Pearson correlation of every component with `reference`.
pub fn score_sources(
    model: &IcaModel,
    buffer: &SignalBuffer,
    reference: &str,
    cfg: &ScoringConfig,
) -> Result<Vec<f64>> {
    let idx = buffer.resolve(reference)?;
    let (l_freq, h_freq) = match buffer.channel(idx).kind {
        ChannelKind::Ecg => cfg.cardiac_band,
        _ => cfg.ocular_band,
    };
    let h = design_bandpass(l_freq, h_freq, buffer.sfreq())?;

    let mut sources = model.sources(buffer)?;
    apply_fir_zero_phase(&mut sources, &h);

    let mut target: Array2<f64> = buffer.row(idx).to_owned().insert_axis(Axis(0));
    apply_fir_zero_phase(&mut target, &h);
    let target = target.row(0);

    Ok(sources.rows().into_iter().map(|src| pearson(src, target)).collect())
}

/// Pearson correlation; zero when either input is constant.
pub fn pearson(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    let n = a.len().min(b.len());
    if n == 0 {
        return 0.0;
    }
    let ma = a.sum() / n as f64;
    let mb = b.sum() / n as f64;
    let (mut sab, mut saa, mut sbb) = (0.0, 0.0, 0.0);
    for (&x, &y) in a.iter().zip(b.iter()) {
        let (dx, dy) = (x - ma, y - mb);
        sab += dx * dy;
        saa += dx * dx;
        sbb += dy * dy;
    }
    let denom = (saa * sbb).sqrt();
    if denom > 0.0 { sab / denom } else { 0.0 }
}

/// Apply a detection policy to a score vector. Returns flagged indices,
/// strongest `|score|` first.
pub fn detect(scores: &[f64], policy: &DetectionPolicy) -> Vec<usize> {
    let mask: Vec<bool> = match *policy {
        DetectionPolicy::RobustZScore { threshold } => robust_zscore(scores)
            .iter()
            .map(|&z| z > threshold)
            .collect(),
        DetectionPolicy::ZScore { threshold, max_iter } => find_outliers(scores, threshold, max_iter),
        DetectionPolicy::Fixed { min_abs_correlation } => {
            scores.iter().map(|s| s.abs() >= min_abs_correlation).collect()
        }
    };
    strongest_first(scores, &mask)
}

fn strongest_first(scores: &[f64], mask: &[bool]) -> Vec<usize> {
    let mut flagged: Vec<usize> = (0..scores.len()).filter(|&i| mask[i]).collect();
    flagged.sort_by(|&i, &j| scores[j].abs().total_cmp(&scores[i].abs()).then(i.cmp(&j)));
    flagged
}

/// One-sided robust z-score of `|score|` around its median.
///
/// The spread is `1.4826 · MAD`. When more than half the scores tie and the
/// MAD vanishes, it falls back to `1.2533 ·` the mean absolute deviation
/// from the median; if that vanishes too, every z-score is zero.
pub fn robust_zscore(scores: &[f64]) -> Vec<f64> {
    let abs: Vec<f64> = scores.iter().map(|s| s.abs()).collect();
    let med = median(&abs);
    let dev: Vec<f64> = abs.iter().map(|a| (a - med).abs()).collect();
    let mut sigma = MAD_TO_SIGMA * median(&dev);
    if !(sigma > 0.0) && !dev.is_empty() {
        sigma = MEAN_AD_TO_SIGMA * dev.iter().sum::<f64>() / dev.len() as f64;
    }
    abs.iter()
        .map(|&a| if sigma > 0.0 { (a - med) / sigma } else { 0.0 })
        .collect()
}

/// MNE's `_find_outliers(X, threshold, max_iter, tail=0)`.
fn find_outliers(scores: &[f64], threshold: f64, max_iter: usize) -> Vec<bool> {
    let mut mask = vec![false; scores.len()];
    for _ in 0..max_iter {
        let kept: Array1<f64> =
            scores.iter().zip(&mask).filter(|(_, m)| !**m).map(|(s, _)| *s).collect();
        if kept.is_empty() {
            break;
        }
        let mean = kept.sum() / kept.len() as f64;
        let std = kept.std(0.0);
        if !(std > 0.0) {
            break;
        }
        let mut any = false;
        for (m, &s) in mask.iter_mut().zip(scores) {
            if !*m && ((s - mean) / std).abs() > threshold {
                *m = true;
                any = true;
            }
        }
        if !any {
            break;
        }
    }
    mask
}

fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut v = values.to_vec();
    v.sort_by(f64::total_cmp);
    let mid = v.len() / 2;
    if v.len() % 2 == 1 { v[mid] } else { 0.5 * (v[mid - 1] + v[mid]) }
}

/// Union of flagged components across criteria.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionSet {
    components: BTreeMap<usize, BTreeSet<ArtifactCriterion>>,
}

impl ExclusionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, criterion: ArtifactCriterion, indices: &[usize]) {
        for &i in indices {
            self.components.entry(i).or_default().insert(criterion);
        }
    }

    /// Sorted, de-duplicated component indices.
    pub fn indices(&self) -> Vec<usize> {
        self.components.keys().copied().collect()
    }

    pub fn contains(&self, component: usize) -> bool {
        self.components.contains_key(&component)
    }

    pub fn criteria(&self, component: usize) -> Vec<ArtifactCriterion> {
        self.components
            .get(&component)
            .map(|c| c.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Components flagged by `criterion`.
    pub fn flagged_by(&self, criterion: ArtifactCriterion) -> Vec<usize> {
        self.components
            .iter()
            .filter(|(_, c)| c.contains(&criterion))
            .map(|(&i, _)| i)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}
