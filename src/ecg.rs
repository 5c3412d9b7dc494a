//! R-peak detection and heartbeat epoching.
//!
//! Follows MNE's `qrs_detector`: band-pass the ECG (5–35 Hz), rectify, and
//! slide a half-second window. A window whose first sample exceeds the
//! detection level contributes its maximum as a beat, then the scan skips
//! the whole window. Beats whose window is unusually energetic, or crosses
//! the level too often, are rejected as noise.
use log::debug;
use ndarray::{s, Array2, Array3, ArrayView1};

use crate::config::CtpsConfig;
use crate::error::Result;
use crate::filter::{design_bandpass, filter_1d};

/// Window RMS above `mean + RMS_LEVELS · std` is rejected.
const RMS_LEVELS: f64 = 2.5;
/// Windows with this many upward level crossings are rejected.
const MAX_CROSSINGS: usize = 3;

/// Sample indices of the R peaks in `ecg`.
pub fn find_ecg_events(ecg: ArrayView1<'_, f64>, sfreq: f64, cfg: &CtpsConfig) -> Result<Vec<usize>> {
    let h = design_bandpass(cfg.qrs_band.0, cfg.qrs_band.1, sfreq)?;
    let rectified: Vec<f64> = filter_1d(&ecg.to_vec(), &h).iter().map(|x| x.abs()).collect();
    let events = qrs_detector(&rectified, sfreq, cfg.qrs_threshold);
    debug!(
        "{} R peaks in {:.1} s ({:.0} bpm)",
        events.len(),
        ecg.len() as f64 / sfreq,
        events.len() as f64 * 60.0 * sfreq / ecg.len().max(1) as f64
    );
    Ok(events)
}

fn qrs_detector(rectified: &[f64], sfreq: f64, level: f64) -> Vec<usize> {
    let win = (0.5 * sfreq).round() as usize;
    let second = (sfreq.round() as usize).max(1);
    let n = rectified.len();
    if win == 0 || n <= win {
        return Vec::new();
    }

    let maxima: Vec<f64> = rectified
        .chunks(second)
        .take(3)
        .map(|c| c.iter().copied().fold(0.0, f64::max))
        .collect();
    let thresh = level * maxima.iter().sum::<f64>() / maxima.len() as f64;

    let mut beats = Vec::new();
    let mut i = 0;
    while i + win < n {
        let window = &rectified[i..i + win];
        if window[0] > thresh {
            let peak = window
                .iter()
                .enumerate()
                .fold(0, |best, (j, &x)| if x > window[best] { j } else { best });
            let crossings = window.windows(2).filter(|w| w[0] <= thresh && w[1] > thresh).count();
            let rms = (window.iter().map(|x| x * x).sum::<f64>() / win as f64).sqrt();
            beats.push((i + peak, crossings, rms));
            i += win;
        } else {
            i += 1;
        }
    }
    if beats.is_empty() {
        return Vec::new();
    }

    let n_beats = beats.len() as f64;
    let mean = beats.iter().map(|b| b.2).sum::<f64>() / n_beats;
    let std = (beats.iter().map(|b| (b.2 - mean).powi(2)).sum::<f64>() / n_beats).sqrt();
    let rms_limit = mean + RMS_LEVELS * std;
    beats
        .into_iter()
        .filter(|&(_, crossings, rms)| rms <= rms_limit && crossings < MAX_CROSSINGS)
        .map(|(t, _, _)| t)
        .collect()
}

/// Cut `[n_epochs, C, n_times]` epochs of `data` around `events`.
///
/// `window` is `(tmin, tmax)` in seconds, both ends inclusive. Events whose
/// window runs past either edge of the recording are skipped.
pub fn epochs(data: &Array2<f64>, events: &[usize], sfreq: f64, window: (f64, f64)) -> Array3<f64> {
    let start_off = (window.0 * sfreq).round() as isize;
    let n_times = ((window.1 - window.0) * sfreq).round() as usize + 1;
    let n_total = data.ncols() as isize;

    let starts: Vec<usize> = events
        .iter()
        .map(|&e| e as isize + start_off)
        .filter(|&s| s >= 0 && s + n_times as isize <= n_total)
        .map(|s| s as usize)
        .collect();

    let mut out = Array3::<f64>::zeros((starts.len(), data.nrows(), n_times));
    for (mut epoch, &start) in out.outer_iter_mut().zip(&starts) {
        epoch.assign(&data.slice(s![.., start..start + n_times]));
    }
    out
}
