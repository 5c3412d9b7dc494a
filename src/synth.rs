//! Synthetic resting-state recording with known ocular and cardiac sources.
//!
//! Twelve raw channels by default: six scalp electrodes (`Fp1`, `Fp2`, `Cz`,
//! `Pz`, `O1`, `O2`), the four ocular electrodes the remapper consumes, and
//! the orbital (`OrbOcc`) and mastoid (`Mass`) electrodes it drops.
//! The vertical ocular source (3 Hz) also leaks strongly into `Fp1`/`Fp2`,
//! the horizontal one (5.2 Hz) weakly into `Fp2`; the scalp channels mix four
//! background rhythms (7.3, 9.7, 11.1, 14.3 Hz). Enabling the cardiac source adds an
//! `Erbs` channel with a 72 bpm pulse train that also leaks into `Pz` and
//! `O1`.
//!
//! After remapping, the recording spans six independent sources (seven with
//! the cardiac one) plus low-level sensor noise.
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::TAU;

use crate::buffer::{ChannelDescriptor, SignalBuffer};
use crate::error::Result;

const MICROVOLT: f64 = 1e-6;

#[derive(Debug, Clone)]
pub struct SyntheticRecording {
    pub sfreq: f64,
    pub duration_secs: f64,
    /// Add the `Erbs` channel and its cardiac source.
    pub cardiac: bool,
    /// Peak amplitude of the uniform sensor noise, µV.
    pub noise_uv: f64,
    pub seed: u64,
}

impl Default for SyntheticRecording {
    fn default() -> Self {
        Self { sfreq: 250.0, duration_secs: 10.0, cardiac: false, noise_uv: 0.5, seed: 0 }
    }
}

impl SyntheticRecording {
    pub fn with_cardiac(mut self) -> Self {
        self.cardiac = true;
        self
    }

    pub fn build(&self) -> Result<SignalBuffer> {
        let n_t = (self.sfreq * self.duration_secs).round() as usize;
        let sine = |f: f64, phase: f64| move |t: f64| (TAU * f * t + phase).sin();
        let vertical = sine(3.0, 0.0);
        let horizontal = sine(5.2, 0.4);
        let pulse = |t: f64| {
            let d = ((t * 1.2).fract() - 0.5) / 1.2;
            (-0.5 * (d / 0.015).powi(2)).exp()
        };

        // Background rhythms with no low-order frequency coincidences.
        let a = sine(7.3, 0.7);
        let b = sine(9.7, 0.5);
        let c = sine(11.1, 1.3);
        let d = sine(14.3, 2.0);

        // (name, µV signal at time t)
        type Mix<'a> = Box<dyn Fn(f64) -> f64 + 'a>;
        let mut mixes: Vec<(&str, Mix<'_>)> = vec![
            ("Fp1", Box::new(move |t| 60.0 * vertical(t) + 8.0 * a(t) + 3.0 * b(t) + 2.0 * c(t))),
            ("Fp2", Box::new(move |t| 55.0 * vertical(t) + 5.0 * horizontal(t) + 7.0 * a(t) + 2.0 * b(t) + 4.0 * d(t))),
            ("Cz", Box::new(move |t| 3.0 * a(t) + 10.0 * b(t) + 2.0 * c(t) + d(t))),
            ("Pz", Box::new(move |t| 2.0 * a(t) + 4.0 * b(t) + 10.0 * c(t) + 3.0 * d(t))),
            ("O1", Box::new(move |t| a(t) + 2.0 * b(t) + 4.0 * c(t) + 10.0 * d(t))),
            ("O2", Box::new(move |t| 2.0 * a(t) + b(t) + 3.0 * c(t) + 9.0 * d(t))),
            ("VPVA", Box::new(move |t| 90.0 * vertical(t))),
            ("VNVB", Box::new(move |t| -30.0 * vertical(t))),
            ("HPHL", Box::new(move |t| 80.0 * horizontal(t))),
            ("HNHR", Box::new(move |t| -40.0 * horizontal(t))),
            ("OrbOcc", Box::new(move |t| 40.0 * vertical(t) + 10.0 * horizontal(t) + a(t))),
            ("Mass", Box::new(move |t| 2.0 * b(t) + c(t))),
        ];
        if self.cardiac {
            for (name, mix) in mixes.iter_mut() {
                if matches!(*name, "Pz" | "O1") {
                    let base = std::mem::replace(mix, Box::new(|_: f64| 0.0));
                    *mix = Box::new(move |t| base(t) + 5.0 * pulse(t));
                }
            }
            mixes.push(("Erbs", Box::new(move |t| 200.0 * pulse(t))));
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut data = Array2::<f64>::zeros((mixes.len(), n_t));
        for (mut row, (_, mix)) in data.rows_mut().into_iter().zip(&mixes) {
            for (i, x) in row.iter_mut().enumerate() {
                let t = i as f64 / self.sfreq;
                let noise = self.noise_uv * rng.gen_range(-1.0..1.0);
                *x = (mix(t) + noise) * MICROVOLT;
            }
        }

        let channels = mixes.iter().map(|(name, _)| ChannelDescriptor::eeg(*name)).collect();
        SignalBuffer::new(channels, data, self.sfreq)
    }
}
