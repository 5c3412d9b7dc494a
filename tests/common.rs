/// Shared helpers for integration tests.
use icadenoise::{ChannelDescriptor, SignalBuffer};
use ndarray::Array2;
use std::path::PathBuf;

#[allow(unused)]
/// Per-process scratch path under the system temp dir.
pub fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("icadenoise_{}_{name}", std::process::id()))
}

#[allow(unused)]
/// Buffer of EEG-kind channels whose samples come from `fill(channel, t_secs)`.
pub fn buffer_from_fn(names: &[&str], sfreq: f64, n_times: usize, fill: impl Fn(usize, f64) -> f64) -> SignalBuffer {
    let chs = names.iter().map(|n| ChannelDescriptor::eeg(*n)).collect();
    let data = Array2::from_shape_fn((names.len(), n_times), |(c, i)| fill(c, i as f64 / sfreq));
    SignalBuffer::new(chs, data, sfreq).unwrap()
}

#[allow(unused)]
/// `sin(2π f t)`.
pub fn sine(f: f64, t: f64) -> f64 {
    (std::f64::consts::TAU * f * t).sin()
}

#[allow(unused)]
/// Maximum absolute difference between two arrays.
pub fn max_abs_diff(a: &Array2<f64>, b: &Array2<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).fold(0.0_f64, f64::max)
}

#[allow(unused)]
/// Root mean square of a slice.
pub fn rms(x: &[f64]) -> f64 {
    (x.iter().map(|v| v * v).sum::<f64>() / x.len() as f64).sqrt()
}
