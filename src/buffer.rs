//! In-memory multichannel recording.
//!
//! A [`SignalBuffer`] owns a `[C, T]` sample matrix plus one
//! [`ChannelDescriptor`] per row. Each pipeline stage takes the buffer by
//! value and hands back the next one, so a recording never has two live
//! owners.
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::error::{IcaError, Result};

/// Channel role. Re-referencing and scoring bands are keyed on this, never
/// on the display name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Eeg,
    Eog,
    Ecg,
    Misc,
}

impl ChannelKind {
    /// Parse an MNE-style channel type string (`"eeg"`, `"eog"`, …).
    /// Unknown strings map to [`ChannelKind::Misc`].
    pub fn from_mne(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "eeg" => ChannelKind::Eeg,
            "eog" => ChannelKind::Eog,
            "ecg" => ChannelKind::Ecg,
            _ => ChannelKind::Misc,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Eeg => "eeg",
            ChannelKind::Eog => "eog",
            ChannelKind::Ecg => "ecg",
            ChannelKind::Misc => "misc",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name, role and (optional) head-frame position of one channel, in metres.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelDescriptor {
    pub name: String,
    pub kind: ChannelKind,
    pub position: Option<[f64; 3]>,
}

impl ChannelDescriptor {
    pub fn new(name: impl Into<String>, kind: ChannelKind) -> Self {
        Self { name: name.into(), kind, position: None }
    }

    pub fn eeg(name: impl Into<String>) -> Self {
        Self::new(name, ChannelKind::Eeg)
    }
}

/// Stable row index of a channel, resolved once from its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelIndex(pub usize);

/// A pending scalp-placeholder rename, reverted by the conditioner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderRename {
    /// Scalp position name the channel currently carries (e.g. `F9`).
    pub placeholder: String,
    /// Name the channel gets back after montage assignment (e.g. `Eog_v`).
    pub semantic: String,
}

/// A uniformly-sampled multichannel time series.
///
/// Invariants (checked by [`SignalBuffer::new`] and every mutator):
/// * `channels.len() == data.nrows()`
/// * channel names are unique
/// * `sfreq > 0`
#[derive(Debug, Clone)]
pub struct SignalBuffer {
    channels: Vec<ChannelDescriptor>,
    data: Array2<f64>,
    sfreq: f64,
    placeholders: Vec<PlaceholderRename>,
}

impl SignalBuffer {
    pub fn new(channels: Vec<ChannelDescriptor>, data: Array2<f64>, sfreq: f64) -> Result<Self> {
        if !(sfreq.is_finite() && sfreq > 0.0) {
            return Err(IcaError::InvalidBuffer(format!("sample rate must be positive, got {sfreq}")));
        }
        if channels.len() != data.nrows() {
            return Err(IcaError::InvalidBuffer(format!(
                "{} channel descriptors for {} data rows",
                channels.len(),
                data.nrows()
            )));
        }
        let mut seen = HashSet::with_capacity(channels.len());
        for ch in &channels {
            if !seen.insert(ch.name.as_str()) {
                return Err(IcaError::InvalidBuffer(format!("duplicate channel name '{}'", ch.name)));
            }
        }
        Ok(Self { channels, data, sfreq, placeholders: Vec::new() })
    }

    #[inline]
    pub fn sfreq(&self) -> f64 {
        self.sfreq
    }

    #[inline]
    pub fn n_channels(&self) -> usize {
        self.channels.len()
    }

    #[inline]
    pub fn n_times(&self) -> usize {
        self.data.ncols()
    }

    pub fn channels(&self) -> &[ChannelDescriptor] {
        &self.channels
    }

    pub fn channel(&self, idx: ChannelIndex) -> &ChannelDescriptor {
        &self.channels[idx.0]
    }

    pub fn ch_names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Array2<f64> {
        &mut self.data
    }

    /// Resolve a channel name to its row, failing fast if absent.
    pub fn resolve(&self, name: &str) -> Result<ChannelIndex> {
        self.channels
            .iter()
            .position(|c| c.name == name)
            .map(ChannelIndex)
            .ok_or_else(|| IcaError::missing(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.channels.iter().any(|c| c.name == name)
    }

    /// Rows whose channel has the given kind, in buffer order.
    pub fn indices_of_kind(&self, kind: ChannelKind) -> Vec<usize> {
        self.channels
            .iter()
            .enumerate()
            .filter(|(_, c)| c.kind == kind)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn row(&self, idx: ChannelIndex) -> ndarray::ArrayView1<'_, f64> {
        self.data.row(idx.0)
    }

    /// Append a channel as the last row.
    pub fn push_channel(&mut self, desc: ChannelDescriptor, samples: Array1<f64>) -> Result<ChannelIndex> {
        if samples.len() != self.n_times() {
            return Err(IcaError::InvalidBuffer(format!(
                "channel '{}' has {} samples, buffer has {}",
                desc.name,
                samples.len(),
                self.n_times()
            )));
        }
        if self.contains(&desc.name) {
            return Err(IcaError::InvalidBuffer(format!("duplicate channel name '{}'", desc.name)));
        }
        self.data
            .push_row(samples.view())
            .map_err(|e| IcaError::InvalidBuffer(e.to_string()))?;
        self.channels.push(desc);
        Ok(ChannelIndex(self.channels.len() - 1))
    }

    /// Remove the given rows. Indices refer to the buffer before removal.
    pub fn drop_channels(&mut self, drop: &[ChannelIndex]) {
        if drop.is_empty() {
            return;
        }
        let keep: Vec<usize> = (0..self.n_channels())
            .filter(|i| !drop.iter().any(|d| d.0 == *i))
            .collect();
        self.data = self.data.select(Axis(0), &keep);
        self.channels = keep.iter().map(|&i| self.channels[i].clone()).collect();
    }

    /// Rename one channel; the new name must not collide with another.
    pub fn rename(&mut self, idx: ChannelIndex, new_name: &str) -> Result<()> {
        if self.channels[idx.0].name == new_name {
            return Ok(());
        }
        if self.contains(new_name) {
            return Err(IcaError::InvalidBuffer(format!(
                "cannot rename '{}' to '{new_name}': name already in use",
                self.channels[idx.0].name
            )));
        }
        self.channels[idx.0].name = new_name.to_string();
        Ok(())
    }

    pub fn set_kind(&mut self, idx: ChannelIndex, kind: ChannelKind) {
        self.channels[idx.0].kind = kind;
    }

    pub fn set_position(&mut self, idx: ChannelIndex, position: Option<[f64; 3]>) {
        self.channels[idx.0].position = position;
    }

    /// Relabel a channel with a scalp placeholder name and remember how to
    /// undo it.
    pub fn apply_placeholder(&mut self, semantic: &str, placeholder: &str) -> Result<()> {
        let idx = self.resolve(semantic)?;
        self.rename(idx, placeholder)?;
        self.placeholders.push(PlaceholderRename {
            placeholder: placeholder.to_string(),
            semantic: semantic.to_string(),
        });
        Ok(())
    }

    pub fn placeholders(&self) -> &[PlaceholderRename] {
        &self.placeholders
    }

    /// Undo every pending placeholder rename.
    pub fn revert_placeholders(&mut self) -> Result<()> {
        for p in std::mem::take(&mut self.placeholders) {
            let idx = self.resolve(&p.placeholder)?;
            self.rename(idx, &p.semantic)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(names: &[&str]) -> SignalBuffer {
        let chs = names.iter().map(|n| ChannelDescriptor::eeg(*n)).collect();
        let data = Array2::from_shape_fn((names.len(), 16), |(c, t)| (c * 100 + t) as f64);
        SignalBuffer::new(chs, data, 250.0).unwrap()
    }

    #[test]
    fn rejects_duplicate_names() {
        let chs = vec![ChannelDescriptor::eeg("Cz"), ChannelDescriptor::eeg("Cz")];
        let err = SignalBuffer::new(chs, Array2::zeros((2, 4)), 250.0).unwrap_err();
        assert!(matches!(err, IcaError::InvalidBuffer(_)));
    }

    #[test]
    fn rejects_row_count_mismatch() {
        let chs = vec![ChannelDescriptor::eeg("Cz")];
        assert!(SignalBuffer::new(chs, Array2::zeros((2, 4)), 250.0).is_err());
    }

    #[test]
    fn resolve_missing_channel() {
        let buf = buffer(&["Fp1", "Fp2"]);
        assert_eq!(buf.resolve("Fp2").unwrap(), ChannelIndex(1));
        assert!(matches!(buf.resolve("Oz"), Err(IcaError::MissingChannel { .. })));
    }

    #[test]
    fn drop_keeps_rows_aligned() {
        let mut buf = buffer(&["A", "B", "C", "D"]);
        buf.drop_channels(&[ChannelIndex(1), ChannelIndex(3)]);
        assert_eq!(buf.ch_names(), vec!["A", "C"]);
        assert_eq!(buf.data()[[1, 0]], 200.0);
    }

    #[test]
    fn push_channel_appends_row() {
        let mut buf = buffer(&["A"]);
        let idx = buf
            .push_channel(ChannelDescriptor::new("Eog_v", ChannelKind::Eog), Array1::ones(16))
            .unwrap();
        assert_eq!(idx, ChannelIndex(1));
        assert_eq!(buf.data().nrows(), 2);
        assert!(buf.push_channel(ChannelDescriptor::eeg("A"), Array1::ones(16)).is_err());
        assert!(buf.push_channel(ChannelDescriptor::eeg("B"), Array1::ones(3)).is_err());
    }

    #[test]
    fn placeholder_round_trip() {
        let mut buf = buffer(&["Cz", "Eog_v"]);
        buf.apply_placeholder("Eog_v", "F9").unwrap();
        assert_eq!(buf.ch_names(), vec!["Cz", "F9"]);
        buf.revert_placeholders().unwrap();
        assert_eq!(buf.ch_names(), vec!["Cz", "Eog_v"]);
        assert!(buf.placeholders().is_empty());
    }

    #[test]
    fn placeholder_collision_is_rejected() {
        let mut buf = buffer(&["F9", "Eog_v"]);
        assert!(buf.apply_placeholder("Eog_v", "F9").is_err());
    }
}
