//! Average reference: subtract the mean across EEG channels at each time point.
//!
//! Matches `raw.set_eeg_reference('average', projection=False)`.
//!
//! Only rows listed in `picks` take part: `data[c, t] -= mean(data[picks, t])`
//! for every `c` in `picks`. Ocular, cardiac and misc channels are neither
//! averaged nor modified.
use ndarray::{Array1, Array2, Axis};

use crate::buffer::{ChannelKind, SignalBuffer};

/// Re-reference the selected rows of `data` to their common average.
pub fn average_reference_inplace(data: &mut Array2<f64>, picks: &[usize]) {
    if picks.is_empty() {
        return;
    }
    let mut mean = Array1::<f64>::zeros(data.ncols());
    for &c in picks {
        mean += &data.row(c);
    }
    mean /= picks.len() as f64;
    for &c in picks {
        let mut row = data.row_mut(c);
        row -= &mean;
    }
}

/// Re-reference every EEG-kind channel of `buffer`, keyed on channel kind.
pub fn set_eeg_average_reference(buffer: &mut SignalBuffer) -> usize {
    let picks = buffer.indices_of_kind(ChannelKind::Eeg);
    average_reference_inplace(buffer.data_mut(), &picks);
    picks.len()
}

/// Sum of the picked rows at each time point.
pub fn pick_sum(data: &Array2<f64>, picks: &[usize]) -> Array1<f64> {
    data.select(Axis(0), picks).sum_axis(Axis(0))
}
