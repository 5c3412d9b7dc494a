//! FIR filter design matching MNE / `scipy.signal.firwin`.
//!
//! For a band-pass `[l_freq, h_freq]` at sampling rate `sfreq`:
//!   • lower transition bandwidth = min(max(0.25 * l_freq, 2.0), l_freq)
//!   • upper transition bandwidth = min(max(0.25 * h_freq, 2.0), sfreq/2 - h_freq)
//!   • filter length N = ceil(3.3 / min(trans) * sfreq), rounded to odd
//!   • windowed-sinc design (Hamming window), one lowpass per transition,
//!     combined as in MNE's `_firwin_design`
use std::f64::consts::PI;

use crate::error::{IcaError, Result};

/// MNE-compatible transition bandwidth below a highpass edge.
///
/// Rule: `min(max(0.25 * l_freq, 2.0), l_freq)`
pub fn auto_trans_bandwidth(l_freq: f64) -> f64 {
    (0.25 * l_freq).max(2.0).min(l_freq)
}

/// MNE-compatible transition bandwidth above a lowpass edge.
///
/// Rule: `min(max(0.25 * h_freq, 2.0), sfreq / 2 - h_freq)`
pub fn auto_trans_bandwidth_high(h_freq: f64, sfreq: f64) -> f64 {
    (0.25 * h_freq).max(2.0).min(sfreq / 2.0 - h_freq)
}

/// Compute the number of FIR taps for a given transition bandwidth.
/// Returns an odd integer (required for zero-phase linear-phase FIR).
///
/// Formula: `ceil(3.3 / trans_bw * sfreq)` rounded up to odd.
pub fn auto_filter_length(trans_bw: f64, sfreq: f64) -> usize {
    let n_raw = (3.3 / trans_bw * sfreq).ceil() as usize;
    if n_raw % 2 == 0 { n_raw + 1 } else { n_raw }
}

/// Reject cutoffs that cannot form a band-pass at `sfreq`.
pub fn check_band(l_freq: f64, h_freq: f64, sfreq: f64) -> Result<()> {
    let nyquist = sfreq / 2.0;
    let ok = l_freq.is_finite()
        && h_freq.is_finite()
        && l_freq > 0.0
        && h_freq > 0.0
        && l_freq < h_freq
        && h_freq < nyquist;
    if ok {
        Ok(())
    } else {
        Err(IcaError::InvalidFilterRange { low: l_freq, high: h_freq, nyquist })
    }
}

/// Design a zero-phase band-pass FIR filter.
///
/// Matches `mne.filter.create_filter(None, sfreq, l_freq, h_freq,
///   fir_window='hamming', fir_design='firwin', phase='zero')`: the kernel is
/// the upper-edge lowpass minus the lower-edge lowpass, each with the length
/// implied by its own transition band and centred in an `N`-tap buffer.
pub fn design_bandpass(l_freq: f64, h_freq: f64, sfreq: f64) -> Result<Vec<f64>> {
    check_band(l_freq, h_freq, sfreq)?;
    let l_trans = auto_trans_bandwidth(l_freq);
    let h_trans = auto_trans_bandwidth_high(h_freq, sfreq);
    let n = auto_filter_length(l_trans.min(h_trans), sfreq);

    let mut h = vec![0.0_f64; n];
    let edges = [(h_freq + h_trans / 2.0, h_trans, 1.0), (l_freq - l_trans / 2.0, l_trans, -1.0)];
    for (cutoff, trans, sign) in edges {
        let this_n = auto_filter_length(trans, sfreq).min(n);
        let lp = firwin(this_n, cutoff, sfreq, true);
        let offset = (n - this_n) / 2;
        for (dst, v) in h[offset..offset + this_n].iter_mut().zip(lp) {
            *dst += sign * v;
        }
    }
    Ok(h)
}

/// Design a lowpass (or, with `pass_zero = false`, highpass) FIR filter
/// using a Hamming-windowed sinc.
///
/// `cutoff_hz` is the -6 dB point.
pub fn firwin(n: usize, cutoff_hz: f64, sfreq: f64, pass_zero: bool) -> Vec<f64> {
    debug_assert!(n % 2 == 1, "firwin requires odd N for linear-phase filter");
    let alpha = (n - 1) as f64 / 2.0;
    let nyq = sfreq / 2.0;
    let fc = cutoff_hz / nyq; // normalised [0, 1]

    let win = hamming(n);

    let mut h: Vec<f64> = (0..n)
        .map(|i| {
            let x = i as f64 - alpha;
            // f(x) = sin(π·fc·x) / (π·x);  lim_{x→0} f(x) = fc  (L'Hôpital)
            let sinc = if x == 0.0 { fc } else { (PI * fc * x).sin() / (PI * x) };
            sinc * win[i]
        })
        .collect();

    // Normalise so sum = 1 (unit DC gain for lowpass).
    let s: f64 = h.iter().sum();
    h.iter_mut().for_each(|v| *v /= s);

    if !pass_zero {
        // Highpass by spectral inversion.
        h.iter_mut().for_each(|v| *v = -*v);
        h[n / 2] += 1.0;
    }

    h
}

/// Hamming window of length `n`.
pub fn hamming(n: usize) -> Vec<f64> {
    if n == 1 {
        return vec![1.0];
    }
    (0..n)
        .map(|i| 0.54 - 0.46 * (2.0 * PI * i as f64 / (n - 1) as f64).cos())
        .collect()
}

/// Magnitude of the FIR frequency response at `freq` Hz.
pub fn gain_at(h: &[f64], freq: f64, sfreq: f64) -> f64 {
    let w = 2.0 * PI * freq / sfreq;
    let (re, im) = h.iter().enumerate().fold((0.0, 0.0), |(re, im), (k, &c)| {
        (re + c * (w * k as f64).cos(), im - c * (w * k as f64).sin())
    });
    (re * re + im * im).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_length_is_odd() {
        for l_freq in [0.5_f64, 1.0, 2.0, 5.0] {
            let tb = auto_trans_bandwidth(l_freq);
            let n = auto_filter_length(tb, 256.0);
            assert!(n % 2 == 1, "N={n} is even for l_freq={l_freq}");
        }
    }

    #[test]
    fn cardiac_band_length() {
        // 8–16 Hz: l_trans = 2 Hz, h_trans = 4 Hz → ceil(412.5) = 413 taps.
        assert_eq!(design_bandpass(8.0, 16.0, 250.0).unwrap().len(), 413);
    }

    #[test]
    fn bandpass_length_follows_narrowest_transition() {
        // 1–30 Hz at 250 Hz: l_trans = 1 Hz, h_trans = 7.5 Hz → 825 taps.
        let h = design_bandpass(1.0, 30.0, 250.0).unwrap();
        assert_eq!(h.len(), 825);
    }

    #[test]
    fn bandpass_is_symmetric() {
        let h = design_bandpass(1.0, 30.0, 250.0).unwrap();
        let n = h.len();
        for i in 0..n / 2 {
            approx::assert_abs_diff_eq!(h[i], h[n - 1 - i], epsilon = 1e-12);
        }
    }

    #[test]
    fn bandpass_rejects_dc_and_passes_band() {
        let h = design_bandpass(1.0, 30.0, 250.0).unwrap();
        let dc: f64 = h.iter().sum();
        approx::assert_abs_diff_eq!(dc, 0.0, epsilon = 1e-9);
        approx::assert_abs_diff_eq!(gain_at(&h, 10.0, 250.0), 1.0, epsilon = 1e-2);
        assert!(gain_at(&h, 60.0, 250.0) < 1e-2);
    }

    #[test]
    fn invalid_bands_are_rejected() {
        for (l, h) in [(30.0, 1.0), (0.0, 30.0), (-1.0, 30.0), (1.0, 125.0), (10.0, 10.0)] {
            let err = design_bandpass(l, h, 250.0).unwrap_err();
            assert!(matches!(err, IcaError::InvalidFilterRange { .. }), "({l}, {h}) accepted");
        }
    }

    #[test]
    fn lowpass_dc_gain_unity() {
        let h = firwin(101, 10.0, 256.0, true);
        let dc: f64 = h.iter().sum();
        approx::assert_abs_diff_eq!(dc, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn spectral_inversion_gives_highpass() {
        let h = firwin(101, 10.0, 256.0, false);
        let dc: f64 = h.iter().sum();
        approx::assert_abs_diff_eq!(dc, 0.0, epsilon = 1e-9);
        assert!(gain_at(&h, 60.0, 256.0) > 0.99);
    }
}
