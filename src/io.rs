//! Safetensors I/O for recordings and intermediate arrays.
//!
//! Reader: [`SafetensorsSource`] parses a `raw.safetensors` container into a
//! [`SignalBuffer`]. Writer: [`StWriter`] builds safetensors files from
//! f32/f64/i32 tensors and byte blobs.
use ndarray::Array2;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use crate::buffer::{ChannelDescriptor, ChannelKind, SignalBuffer};
use crate::error::{IcaError, Result};

/// Something that can turn a file on disk into a [`SignalBuffer`].
pub trait RecordingSource {
    /// Load one recording. Failures surface as
    /// [`IcaError::UnreadableRecording`].
    fn load(&self, path: &Path) -> Result<SignalBuffer>;

    /// File extension (without the dot) this source reads.
    fn extension(&self) -> &str;
}

// ── Low-level safetensors parser (raw bytes → f64 / strings) ──────────────────

#[derive(Debug, Deserialize)]
struct TensorEntry {
    dtype: String,
    shape: Vec<usize>,
    data_offsets: [usize; 2],
}

struct Container<'a> {
    header: HashMap<String, serde_json::Value>,
    body: &'a [u8],
}

impl<'a> Container<'a> {
    fn parse(bytes: &'a [u8]) -> std::result::Result<Self, String> {
        if bytes.len() < 8 {
            return Err("safetensors file too small".into());
        }
        let mut len = [0u8; 8];
        len.copy_from_slice(&bytes[..8]);
        let n = u64::from_le_bytes(len) as usize;
        let end = 8usize.checked_add(n).filter(|&e| e <= bytes.len()).ok_or("header length exceeds file size")?;
        let header = serde_json::from_slice(&bytes[8..end])
            .map_err(|e| format!("failed to parse safetensors header: {e}"))?;
        Ok(Self { header, body: &bytes[end..] })
    }

    fn entry(&self, name: &str) -> std::result::Result<Option<TensorEntry>, String> {
        match self.header.get(name) {
            None => Ok(None),
            Some(v) => serde_json::from_value(v.clone())
                .map(Some)
                .map_err(|e| format!("bad header entry '{name}': {e}")),
        }
    }

    fn raw(&self, entry: &TensorEntry) -> std::result::Result<&'a [u8], String> {
        let [s, e] = entry.data_offsets;
        self.body.get(s..e).ok_or_else(|| format!("data offsets {s}..{e} out of range"))
    }

    fn floats(&self, entry: &TensorEntry) -> std::result::Result<Vec<f64>, String> {
        let raw = self.raw(entry)?;
        let values: Vec<f64> = match entry.dtype.as_str() {
            "F32" => raw
                .chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64)
                .collect(),
            "F64" => raw
                .chunks_exact(8)
                .map(|b| f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
                .collect(),
            other => return Err(format!("unsupported dtype {other} (expected F32 or F64)")),
        };
        let expected: usize = entry.shape.iter().product();
        if values.len() != expected {
            return Err(format!("tensor holds {} values, shape {:?} needs {expected}", values.len(), entry.shape));
        }
        Ok(values)
    }

    fn lines(&self, entry: &TensorEntry) -> std::result::Result<Vec<String>, String> {
        let text = std::str::from_utf8(self.raw(entry)?).map_err(|e| e.to_string())?;
        Ok(text.split('\n').filter(|s| !s.is_empty()).map(String::from).collect())
    }
}

// ── Reader ────────────────────────────────────────────────────────────────────

/// Reads `raw.safetensors` containers.
///
/// Expected keys:
///
/// | key        | dtype      | shape  | required |
/// |------------|------------|--------|----------|
/// | `data`     | F32 / F64  | [C, T] | yes      |
/// | `sfreq`    | F32 / F64  | [1]    | yes      |
/// | `ch_names` | U8 blob    | -      | yes, newline-separated |
/// | `ch_types` | U8 blob    | -      | no, `eeg`/`eog`/`ecg`/`misc` per line (default `eeg`) |
/// | `chan_pos` | F32 / F64  | [C, 3] | no, metres |
#[derive(Debug, Clone, Copy, Default)]
pub struct SafetensorsSource;

impl SafetensorsSource {
    fn parse(bytes: &[u8]) -> std::result::Result<SignalBuffer, String> {
        let st = Container::parse(bytes)?;

        let data_entry = st.entry("data")?.ok_or("missing 'data' key")?;
        if data_entry.shape.len() != 2 {
            return Err(format!("'data' must be 2-D, got shape {:?}", data_entry.shape));
        }
        let (n_ch, n_t) = (data_entry.shape[0], data_entry.shape[1]);
        let data = Array2::from_shape_vec((n_ch, n_t), st.floats(&data_entry)?).map_err(|e| e.to_string())?;

        let sfreq_entry = st.entry("sfreq")?.ok_or("missing 'sfreq' key")?;
        let sfreq = *st.floats(&sfreq_entry)?.first().ok_or("empty 'sfreq' tensor")?;

        let names_entry = st.entry("ch_names")?.ok_or("missing 'ch_names' key")?;
        let names = st.lines(&names_entry)?;
        if names.len() != n_ch {
            return Err(format!("{} channel names for {n_ch} data rows", names.len()));
        }

        let kinds = match st.entry("ch_types")? {
            Some(e) => {
                let types = st.lines(&e)?;
                if types.len() != n_ch {
                    return Err(format!("{} channel types for {n_ch} data rows", types.len()));
                }
                types.iter().map(|t| ChannelKind::from_mne(t)).collect()
            }
            None => vec![ChannelKind::Eeg; n_ch],
        };

        let positions: Vec<Option<[f64; 3]>> = match st.entry("chan_pos")? {
            Some(e) => {
                if e.shape != [n_ch, 3] {
                    return Err(format!("'chan_pos' must be [{n_ch}, 3], got {:?}", e.shape));
                }
                st.floats(&e)?
                    .chunks_exact(3)
                    .map(|p| p.iter().all(|v| v.is_finite()).then(|| [p[0], p[1], p[2]]))
                    .collect()
            }
            None => vec![None; n_ch],
        };

        let channels = names
            .into_iter()
            .zip(kinds)
            .zip(positions)
            .map(|((name, kind), position)| ChannelDescriptor { name, kind, position })
            .collect();
        SignalBuffer::new(channels, data, sfreq).map_err(|e| e.to_string())
    }
}

impl RecordingSource for SafetensorsSource {
    fn load(&self, path: &Path) -> Result<SignalBuffer> {
        let bytes = std::fs::read(path).map_err(|e| IcaError::unreadable(path, e))?;
        Self::parse(&bytes).map_err(|reason| IcaError::unreadable(path, reason))
    }

    fn extension(&self) -> &str {
        "safetensors"
    }
}

/// Write `buffer` in the layout [`SafetensorsSource`] reads.
pub fn save_buffer(buffer: &SignalBuffer, path: &Path) -> std::io::Result<()> {
    let mut w = StWriter::new();
    w.add_f64_arr2("data", buffer.data());
    w.add_f64("sfreq", &[buffer.sfreq()], &[1]);
    w.add_lines("ch_names", buffer.channels().iter().map(|c| c.name.as_str()));
    w.add_lines("ch_types", buffer.channels().iter().map(|c| c.kind.as_str()));
    if buffer.channels().iter().any(|c| c.position.is_some()) {
        let pos: Vec<f64> = buffer
            .channels()
            .iter()
            .flat_map(|c| c.position.unwrap_or([f64::NAN; 3]))
            .collect();
        w.add_f64("chan_pos", &pos, &[buffer.n_channels(), 3]);
    }
    w.write(path)
}

// ── Generic safetensors builder ───────────────────────────────────────────────

/// Simple safetensors file writer that handles F32, F64 and I32 tensors plus
/// U8 byte blobs.
///
/// Usage:
/// ```rust,no_run
/// use icadenoise::io::StWriter;
/// use std::path::Path;
/// let mut w = StWriter::new();
/// w.add_f32("signal", &[1.0f32, 2.0, 3.0], &[1, 3]);
/// w.add_f64("signal_d", &[1.0f64, 2.0, 3.0], &[1, 3]);
/// w.add_lines("names", ["a", "b"]);
/// w.write(Path::new("/tmp/out.safetensors")).unwrap();
/// ```
#[derive(Debug, Default)]
pub struct StWriter {
    entries: Vec<(String, Vec<u8>, &'static str, Vec<usize>)>,
}

impl StWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_f32(&mut self, name: &str, data: &[f32], shape: &[usize]) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "F32", shape.to_vec()));
    }

    pub fn add_f64(&mut self, name: &str, data: &[f64], shape: &[usize]) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "F64", shape.to_vec()));
    }

    pub fn add_f64_arr2(&mut self, name: &str, arr: &Array2<f64>) {
        let data: Vec<f64> = arr.iter().copied().collect();
        self.add_f64(name, &data, &[arr.nrows(), arr.ncols()]);
    }

    pub fn add_i32(&mut self, name: &str, data: &[i32], shape: &[usize]) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "I32", shape.to_vec()));
    }

    pub fn add_bytes(&mut self, name: &str, data: &[u8]) {
        self.entries.push((name.to_string(), data.to_vec(), "U8", vec![data.len()]));
    }

    /// Newline-separated string blob (channel names, channel types).
    pub fn add_lines<'s>(&mut self, name: &str, lines: impl IntoIterator<Item = &'s str>) {
        let text = lines.into_iter().collect::<Vec<_>>().join("\n");
        self.add_bytes(name, text.as_bytes());
    }

    pub fn write(&self, path: &Path) -> std::io::Result<()> {
        use std::io::Write;
        let mut header_map = serde_json::Map::new();
        let mut offset: usize = 0;
        for (name, data, dtype, shape) in &self.entries {
            header_map.insert(name.clone(), serde_json::json!({
                "dtype": dtype,
                "shape": shape,
                "data_offsets": [offset, offset + data.len()],
            }));
            offset += data.len();
        }
        let hdr_bytes = serde_json::to_vec(&header_map)?;
        let pad = (8 - hdr_bytes.len() % 8) % 8;
        let padded: Vec<u8> = hdr_bytes.into_iter()
            .chain(std::iter::repeat(b' ').take(pad))
            .collect();
        let mut f = std::io::BufWriter::new(std::fs::File::create(path)?);
        f.write_all(&(padded.len() as u64).to_le_bytes())?;
        f.write_all(&padded)?;
        for (_, data, _, _) in &self.entries {
            f.write_all(data)?;
        }
        f.flush()
    }
}
