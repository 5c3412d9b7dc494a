//! Signal conditioning: band-pass, average reference, montage, placeholder
//! revert.
//!
//! Order matters. Montage assignment runs while the derived ocular/cardiac
//! channels still carry their scalp placeholder names (`F9`, `F10`, `Nz`),
//! and the semantic names come back only afterwards.
use log::debug;

use crate::buffer::SignalBuffer;
use crate::config::FilterConfig;
use crate::error::Result;
use crate::filter::{apply_fir_zero_phase, design_bandpass};
use crate::montage::Montage;
use crate::reference::set_eeg_average_reference;

/// Condition a remapped buffer with the built-in standard layout.
pub fn condition(buffer: SignalBuffer, cfg: &FilterConfig) -> Result<SignalBuffer> {
    condition_with_montage(buffer, cfg, &Montage::spherical_1005())
}

pub fn condition_with_montage(
    mut buffer: SignalBuffer,
    cfg: &FilterConfig,
    montage: &Montage,
) -> Result<SignalBuffer> {
    bandpass(&mut buffer, cfg)?;

    let n_ref = set_eeg_average_reference(&mut buffer);
    debug!("average reference over {n_ref} EEG channels");

    let placed = montage.apply(&mut buffer);
    debug!("montage placed {placed}/{} channels", buffer.n_channels());

    buffer.revert_placeholders()?;
    Ok(buffer)
}

/// Zero-phase FIR band-pass of every channel.
pub fn bandpass(buffer: &mut SignalBuffer, cfg: &FilterConfig) -> Result<()> {
    let h = design_bandpass(cfg.low_cutoff_hz, cfg.high_cutoff_hz, buffer.sfreq())?;
    debug!(
        "band-pass {}–{} Hz, {} taps at {} Hz",
        cfg.low_cutoff_hz,
        cfg.high_cutoff_hz,
        h.len(),
        buffer.sfreq()
    );
    apply_fir_zero_phase(buffer.data_mut(), &h);
    Ok(())
}
