//! Scalp layout.
//!
//! A [`Montage`] maps channel names to head-frame coordinates in metres
//! (x → right ear, y → nasion, z → vertex). The built-in layout,
//! [`Montage::spherical_1005`], places the 10-20/10-10 electrodes used by
//! resting-state recordings (plus the `F9`, `F10` and `Nz` placeholders the
//! remapper relies on) on an idealised spherical head of radius 95 mm, with
//! `Fpz`, `T7`, `Oz` and `T8` on the equator and 10 % arc steps of 18° /
//! 22.5°. These positions approximate MNE's digitised `standard_1005`
//! template; they are not its coordinates. Load measured positions with
//! [`Montage::from_positions`] when exact geometry matters.
//!
//! Assignment follows `raw.set_montage(..., on_missing='ignore')`: names
//! without a position are left untouched.
use log::debug;
use std::collections::HashMap;

use crate::buffer::{ChannelIndex, SignalBuffer};

pub const HEAD_RADIUS_M: f64 = 0.095;

/// `(name, polar angle from Cz, azimuth from nasion towards the left ear)`,
/// both in degrees.
const SPHERICAL_1005: &[(&str, f64, f64)] = &[
    // Midline
    ("Nz", 112.5, 0.0),
    ("Fpz", 90.0, 0.0),
    ("AFz", 67.5, 0.0),
    ("Fz", 45.0, 0.0),
    ("FCz", 22.5, 0.0),
    ("Cz", 0.0, 0.0),
    ("CPz", 22.5, 180.0),
    ("Pz", 45.0, 180.0),
    ("POz", 67.5, 180.0),
    ("Oz", 90.0, 180.0),
    ("Iz", 112.5, 180.0),
    // Equator, left
    ("Fp1", 90.0, 18.0),
    ("AF7", 90.0, 36.0),
    ("F7", 90.0, 54.0),
    ("FT7", 90.0, 72.0),
    ("T7", 90.0, 90.0),
    ("TP7", 90.0, 108.0),
    ("P7", 90.0, 126.0),
    ("PO7", 90.0, 144.0),
    ("O1", 90.0, 162.0),
    // Equator, right
    ("Fp2", 90.0, -18.0),
    ("AF8", 90.0, -36.0),
    ("F8", 90.0, -54.0),
    ("FT8", 90.0, -72.0),
    ("T8", 90.0, -90.0),
    ("TP8", 90.0, -108.0),
    ("P8", 90.0, -126.0),
    ("PO8", 90.0, -144.0),
    ("O2", 90.0, -162.0),
    // Inferior ring
    ("F9", 112.5, 54.0),
    ("FT9", 112.5, 72.0),
    ("T9", 112.5, 90.0),
    ("TP9", 112.5, 108.0),
    ("P9", 112.5, 126.0),
    ("F10", 112.5, -54.0),
    ("FT10", 112.5, -72.0),
    ("T10", 112.5, -90.0),
    ("TP10", 112.5, -108.0),
    ("P10", 112.5, -126.0),
    // Inner rings, left
    ("AF3", 74.0, 22.0),
    ("F5", 75.0, 49.0),
    ("F3", 60.0, 40.0),
    ("F1", 49.0, 22.0),
    ("FC5", 70.0, 75.0),
    ("FC3", 50.0, 63.0),
    ("FC1", 32.0, 45.0),
    ("C5", 67.5, 90.0),
    ("C3", 45.0, 90.0),
    ("C1", 22.5, 90.0),
    ("CP5", 70.0, 105.0),
    ("CP3", 50.0, 117.0),
    ("CP1", 32.0, 135.0),
    ("P5", 75.0, 131.0),
    ("P3", 60.0, 140.0),
    ("P1", 49.0, 158.0),
    ("PO3", 74.0, 158.0),
    // Inner rings, right
    ("AF4", 74.0, -22.0),
    ("F6", 75.0, -49.0),
    ("F4", 60.0, -40.0),
    ("F2", 49.0, -22.0),
    ("FC6", 70.0, -75.0),
    ("FC4", 50.0, -63.0),
    ("FC2", 32.0, -45.0),
    ("C6", 67.5, -90.0),
    ("C4", 45.0, -90.0),
    ("C2", 22.5, -90.0),
    ("CP6", 70.0, -105.0),
    ("CP4", 50.0, -117.0),
    ("CP2", 32.0, -135.0),
    ("P6", 75.0, -131.0),
    ("P4", 60.0, -140.0),
    ("P2", 49.0, -158.0),
    ("PO4", 74.0, -158.0),
];

/// Name → position lookup.
#[derive(Debug, Clone, Default)]
pub struct Montage {
    positions: HashMap<String, [f64; 3]>,
}

impl Montage {
    /// The built-in 10-05 subset on a sphere. Positions are approximate.
    pub fn spherical_1005() -> Self {
        let positions = SPHERICAL_1005
            .iter()
            .map(|&(name, incl, az)| (name.to_string(), spherical_to_head(incl, az, HEAD_RADIUS_M)))
            .collect();
        Self { positions }
    }

    pub fn from_positions<I, S>(positions: I) -> Self
    where
        I: IntoIterator<Item = (S, [f64; 3])>,
        S: Into<String>,
    {
        Self { positions: positions.into_iter().map(|(n, p)| (n.into(), p)).collect() }
    }

    pub fn position(&self, name: &str) -> Option<[f64; 3]> {
        self.positions.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Attach positions to every channel whose current name is known.
    /// Returns the number of channels placed; the rest are left as-is.
    pub fn apply(&self, buffer: &mut SignalBuffer) -> usize {
        let mut placed = 0;
        let mut missing = Vec::new();
        for i in 0..buffer.n_channels() {
            let idx = ChannelIndex(i);
            match self.position(&buffer.channel(idx).name) {
                Some(pos) => {
                    buffer.set_position(idx, Some(pos));
                    placed += 1;
                }
                None => missing.push(buffer.channel(idx).name.clone()),
            }
        }
        if !missing.is_empty() {
            debug!("no montage position for {missing:?}, ignoring");
        }
        placed
    }
}

fn spherical_to_head(incl_deg: f64, az_deg: f64, radius: f64) -> [f64; 3] {
    let (incl, az) = (incl_deg.to_radians(), az_deg.to_radians());
    [
        -radius * incl.sin() * az.sin(),
        radius * incl.sin() * az.cos(),
        radius * incl.cos(),
    ]
}
