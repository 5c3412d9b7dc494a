//! Ocular/cardiac channel remapping.
//!
//! Replaces the four raw ocular electrodes with two bipolar derivations,
//! drops auxiliary electrodes, tags the cardiac channel, then relabels the
//! derived channels with scalp placeholder names so montage assignment can
//! place them:
//!
//! ```text
//! Eog_v = VPVA − VNVB   → F9
//! Eog_h = HPHL − HNHR   → F10
//! Erbs  → Ecg           → Nz
//! ```
//!
//! The placeholders are recorded on the buffer and undone by
//! [`crate::condition::condition`].
use log::debug;

use crate::buffer::{ChannelDescriptor, ChannelIndex, ChannelKind, SignalBuffer};
use crate::config::RemapConfig;
use crate::error::Result;

pub const EOG_VERTICAL: &str = "Eog_v";
pub const EOG_HORIZONTAL: &str = "Eog_h";
pub const ECG: &str = "Ecg";

/// `(semantic name, scalp placeholder)` pairs.
pub const PLACEHOLDERS: [(&str, &str); 3] = [(EOG_VERTICAL, "F9"), (EOG_HORIZONTAL, "F10"), (ECG, "Nz")];

/// Remap `buffer` and apply the placeholder renames.
pub fn remap(buffer: SignalBuffer, cfg: &RemapConfig) -> Result<SignalBuffer> {
    let mut buffer = derive_channels(buffer, cfg)?;
    for (semantic, placeholder) in PLACEHOLDERS {
        if buffer.contains(semantic) {
            buffer.apply_placeholder(semantic, placeholder)?;
        }
    }
    Ok(buffer)
}

/// Everything [`remap`] does except the placeholder step.
pub fn derive_channels(mut buffer: SignalBuffer, cfg: &RemapConfig) -> Result<SignalBuffer> {
    // Resolve every required name before touching the buffer.
    let (vp, vn) = (buffer.resolve(&cfg.vertical_pair.0)?, buffer.resolve(&cfg.vertical_pair.1)?);
    let (hp, hn) = (buffer.resolve(&cfg.horizontal_pair.0)?, buffer.resolve(&cfg.horizontal_pair.1)?);
    let cardiac = cfg.cardiac.as_deref().map(|n| buffer.resolve(n)).transpose()?;
    let mut drop: Vec<ChannelIndex> = vec![vp, vn, hp, hn];
    for aux in &cfg.auxiliary {
        drop.push(buffer.resolve(aux)?);
    }

    let vertical = &buffer.row(vp) - &buffer.row(vn);
    let horizontal = &buffer.row(hp) - &buffer.row(hn);

    if let Some(idx) = cardiac {
        buffer.rename(idx, ECG)?;
        buffer.set_kind(idx, ChannelKind::Ecg);
    }

    buffer.drop_channels(&drop);
    buffer.push_channel(ChannelDescriptor::new(EOG_VERTICAL, ChannelKind::Eog), vertical)?;
    buffer.push_channel(ChannelDescriptor::new(EOG_HORIZONTAL, ChannelKind::Eog), horizontal)?;

    debug!(
        "remapped to {} channels (dropped {}, derived 2)",
        buffer.n_channels(),
        drop.len()
    );
    Ok(buffer)
}
