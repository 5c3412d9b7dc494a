//! Independent Component Analysis (PCA whitening + parallel FastICA).
//!
//! Mirrors what `mne.preprocessing.ICA(method="fastica").fit(raw)` does:
//!
//! 1. Pre-whiten: divide every channel by the standard deviation of all
//!    channels of the same kind, so EEG, EOG and ECG rows are comparable.
//! 2. Centre each channel and run PCA on the channel covariance.
//! 3. Whiten the first `n_components` principal components to unit variance.
//! 4. Run scikit-learn's parallel FastICA (`fun="logcosh"`, `whiten=False`)
//!    on the whitened data, starting from a seeded random matrix.
//!
//! The full PCA basis is kept so that [`IcaModel::reconstruct`] can add back
//! the principal components that were not passed to FastICA, which makes the
//! round trip exact when nothing is excluded.
use log::{debug, info};
use ndarray::{s, Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::buffer::{ChannelKind, SignalBuffer};
use crate::config::IcaConfig;
use crate::error::{IcaError, Result};
use crate::linalg::{covariance, eigh, sym_decorrelation};

const EIGH_MAX_SWEEPS: usize = 100;
const EIGH_TOL: f64 = 1e-13;
/// Eigenvalues below `RANK_TOL · λ_max` count as numerically zero.
const RANK_TOL: f64 = 1e-10;

/// A fitted, immutable ICA decomposition of one recording.
#[derive(Debug, Clone)]
pub struct IcaModel {
    ch_names: Vec<String>,
    /// Per-channel pre-whitening scale `[C]`.
    pre_whitener: Array1<f64>,
    /// Per-channel mean `[C]`, in original units.
    mean: Array1<f64>,
    /// PCA basis as rows `[C, C]`, in pre-whitened units.
    pca_components: Array2<f64>,
    /// Variance of every principal component `[C]`, descending.
    pca_explained_variance: Array1<f64>,
    /// FastICA rotation in whitened PCA space `[n, n]`.
    unmixing: Array2<f64>,
    n_iter: usize,
}

/// Fit an ICA model with `cfg.n_components` components to every channel of
/// `buffer`.
pub fn fit(buffer: &SignalBuffer, cfg: &IcaConfig) -> Result<IcaModel> {
    let n_ch = buffer.n_channels();
    let n = cfg.n_components;
    if n == 0 {
        return Err(IcaError::InvalidConfig("n_components must be at least 1".into()));
    }
    if n > n_ch {
        return Err(IcaError::InsufficientChannels { requested: n, available: n_ch });
    }
    if buffer.n_times() < 2 {
        return Err(IcaError::InvalidBuffer("ICA needs at least two samples".into()));
    }

    let pre_whitener = pre_whitener(buffer);
    let mut y = buffer.data().clone();
    for (mut row, &sc) in y.rows_mut().into_iter().zip(pre_whitener.iter()) {
        row /= sc;
    }
    let y_mean = y.mean_axis(Axis(1)).ok_or_else(|| IcaError::InvalidBuffer("empty recording".into()))?;
    y -= &y_mean.view().insert_axis(Axis(1));

    let eig = eigh(&covariance(&y), EIGH_MAX_SWEEPS, EIGH_TOL)?;
    let lambda_max = eig.values[0].max(0.0);
    let rank = eig.values.iter().filter(|&&l| l > RANK_TOL * lambda_max).count();
    if n > rank {
        return Err(IcaError::InsufficientChannels { requested: n, available: rank });
    }
    debug!("PCA: {n_ch} channels, numerical rank {rank}");

    let pca_components = eig.vectors.t().to_owned();
    let whitener = whitening_matrix(&pca_components, &eig.values, n);
    let z = whitener.dot(&y);

    let (unmixing, n_iter) = fastica(&z, cfg)?;
    info!("FastICA converged: {n} components in {n_iter} iterations");

    let mean = &y_mean * &pre_whitener;
    Ok(IcaModel {
        ch_names: buffer.ch_names().iter().map(|s| s.to_string()).collect(),
        pre_whitener,
        mean,
        pca_components,
        pca_explained_variance: eig.values,
        unmixing,
        n_iter,
    })
}

/// Standard deviation of all samples of each channel kind, broadcast to
/// every channel of that kind. Zero-variance kinds get a scale of 1.
fn pre_whitener(buffer: &SignalBuffer) -> Array1<f64> {
    let mut scale = Array1::<f64>::ones(buffer.n_channels());
    for kind in [ChannelKind::Eeg, ChannelKind::Eog, ChannelKind::Ecg, ChannelKind::Misc] {
        let picks = buffer.indices_of_kind(kind);
        if picks.is_empty() {
            continue;
        }
        let sub = buffer.data().select(Axis(0), &picks);
        let std = sub.std(0.0);
        let std = if std > 0.0 && std.is_finite() { std } else { 1.0 };
        for &c in &picks {
            scale[c] = std;
        }
    }
    scale
}

/// `diag(1/√λ[:n]) · P[:n]`
fn whitening_matrix(pca_components: &Array2<f64>, variance: &Array1<f64>, n: usize) -> Array2<f64> {
    let mut w = pca_components.slice(s![..n, ..]).to_owned();
    for (mut row, &l) in w.rows_mut().into_iter().zip(variance.iter()) {
        row /= l.sqrt();
    }
    w
}

/// Parallel FastICA with the logcosh contrast (`α = 1`).
///
/// Port of scikit-learn's `_ica_par`. Returns the orthogonal unmixing matrix
/// and the number of iterations used.
fn fastica(z: &Array2<f64>, cfg: &IcaConfig) -> Result<(Array2<f64>, usize)> {
    let n = z.nrows();
    let n_t = z.ncols() as f64;

    let mut rng = StdRng::seed_from_u64(cfg.random_seed);
    let w_init = Array2::from_shape_fn((n, n), |_| rng.gen_range(-1.0..1.0));
    let mut w = sym_decorrelation(&w_init)?;

    let mut lim = f64::INFINITY;
    for it in 0..cfg.max_iter {
        let gwx = w.dot(z).mapv_into(f64::tanh);
        let g_wx = gwx.mapv(|g| 1.0 - g * g).mean_axis(Axis(1)).unwrap_or_else(|| Array1::zeros(n));

        let mut w1 = gwx.dot(&z.t()) / n_t;
        w1 -= &(&w * &g_wx.view().insert_axis(Axis(1)));
        let w1 = sym_decorrelation(&w1)?;

        lim = (&w1 * &w)
            .sum_axis(Axis(1))
            .iter()
            .map(|d| (d.abs() - 1.0).abs())
            .fold(0.0_f64, f64::max);
        w = w1;
        if lim < cfg.tol {
            return Ok((w, it + 1));
        }
    }
    Err(IcaError::Convergence {
        stage: "FastICA",
        iterations: cfg.max_iter,
        tolerance: cfg.tol,
        residual: lim,
    })
}

impl IcaModel {
    #[inline]
    pub fn n_components(&self) -> usize {
        self.unmixing.nrows()
    }

    #[inline]
    pub fn n_channels(&self) -> usize {
        self.ch_names.len()
    }

    /// FastICA iterations needed to converge.
    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    pub fn ch_names(&self) -> &[String] {
        &self.ch_names
    }

    /// Fraction of the pre-whitened variance captured by the components.
    pub fn explained_variance_ratio(&self) -> f64 {
        let total: f64 = self.pca_explained_variance.iter().map(|v| v.max(0.0)).sum();
        if total == 0.0 {
            return 0.0;
        }
        let kept: f64 = self.pca_explained_variance.iter().take(self.n_components()).sum();
        kept / total
    }

    /// Channel space → component space, `[n_components, C]`.
    pub fn unmixing_matrix(&self) -> Array2<f64> {
        let n = self.n_components();
        let whitener = whitening_matrix(&self.pca_components, &self.pca_explained_variance, n);
        let mut u = self.unmixing.dot(&whitener);
        for (mut col, &sc) in u.columns_mut().into_iter().zip(self.pre_whitener.iter()) {
            col /= sc;
        }
        u
    }

    /// Component space → channel space, `[C, n_components]`.
    ///
    /// `mixing · unmixing` projects onto the subspace the components span.
    pub fn mixing_matrix(&self) -> Array2<f64> {
        let n = self.n_components();
        let mut dewhite = self.pca_components.slice(s![..n, ..]).t().to_owned();
        for (mut col, &l) in dewhite.columns_mut().into_iter().zip(self.pca_explained_variance.iter()) {
            col *= l.sqrt();
        }
        let mut m = dewhite.dot(&self.unmixing.t());
        for (mut row, &sc) in m.rows_mut().into_iter().zip(self.pre_whitener.iter()) {
            row *= sc;
        }
        m
    }

    /// Component activations `[n_components, T]` for `buffer`.
    pub fn sources(&self, buffer: &SignalBuffer) -> Result<Array2<f64>> {
        self.check_channels(buffer)?;
        Ok(self.unmixing_matrix().dot(&self.centred(buffer)))
    }

    /// Rebuild the channel data with the listed components zeroed.
    ///
    /// Principal components outside the ICA subspace are passed through
    /// unchanged, so `reconstruct(buffer, &[])` returns the input.
    pub fn reconstruct(&self, buffer: &SignalBuffer, exclude: &[usize]) -> Result<Array2<f64>> {
        self.check_channels(buffer)?;
        let n = self.n_components();
        if let Some(&bad) = exclude.iter().find(|&&i| i >= n) {
            return Err(IcaError::InvalidConfig(format!(
                "component {bad} out of range (model has {n})"
            )));
        }

        let mut y = self.centred(buffer);
        for (mut row, &sc) in y.rows_mut().into_iter().zip(self.pre_whitener.iter()) {
            row /= sc;
        }
        let mut pcs = self.pca_components.dot(&y);

        if !exclude.is_empty() {
            let mut head = pcs.slice_mut(s![..n, ..]);
            let std: Array1<f64> = self.pca_explained_variance.slice(s![..n]).mapv(f64::sqrt);
            let std_col = std.view().insert_axis(Axis(1));
            let mut sources = self.unmixing.dot(&(&head / &std_col));
            for &i in exclude {
                sources.row_mut(i).fill(0.0);
            }
            let back = self.unmixing.t().dot(&sources) * &std_col;
            head.assign(&back);
        }

        let mut out = self.pca_components.t().dot(&pcs);
        for (mut row, (&sc, &mu)) in out
            .rows_mut()
            .into_iter()
            .zip(self.pre_whitener.iter().zip(self.mean.iter()))
        {
            row.mapv_inplace(|v| v * sc + mu);
        }
        Ok(out)
    }

    /// Remove the listed components from `buffer` (MNE's `ica.apply`).
    pub fn remove_components(&self, mut buffer: SignalBuffer, exclude: &[usize]) -> Result<SignalBuffer> {
        let cleaned = self.reconstruct(&buffer, exclude)?;
        buffer.data_mut().assign(&cleaned);
        Ok(buffer)
    }

    fn centred(&self, buffer: &SignalBuffer) -> Array2<f64> {
        buffer.data() - &self.mean.view().insert_axis(Axis(1))
    }

    fn check_channels(&self, buffer: &SignalBuffer) -> Result<()> {
        for name in &self.ch_names {
            buffer.resolve(name)?;
        }
        if buffer.ch_names().iter().zip(&self.ch_names).any(|(a, b)| a != b)
            || buffer.n_channels() != self.n_channels()
        {
            return Err(IcaError::InvalidBuffer(
                "channel layout differs from the one the model was fitted on".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::ChannelDescriptor;
    use std::f64::consts::PI;

    /// Three sub-Gaussian sources mixed into four channels.
    fn mixed() -> SignalBuffer {
        let n_t = 2000;
        let sources = Array2::from_shape_fn((3, n_t), |(k, t)| {
            let t = t as f64 / 200.0;
            match k {
                0 => (2.0 * PI * 3.0 * t).sin(),
                1 => ((2.0 * PI * 7.0 * t).sin()).signum(),
                _ => 2.0 * ((1.3 * t) % 1.0) - 1.0,
            }
        });
        let a = ndarray::array![[1.0, 0.5, 0.2], [0.3, 1.0, 0.6], [0.7, 0.2, 1.0], [0.4, 0.9, 0.3]];
        let mut data = a.dot(&sources);
        // Small independent term on the last channel keeps the data full rank.
        for t in 0..n_t {
            data[[3, t]] += 0.05 * (2.0 * PI * 11.0 * t as f64 / 200.0).sin();
        }
        let chs = ["A", "B", "C", "D"].iter().map(|n| ChannelDescriptor::eeg(*n)).collect();
        SignalBuffer::new(chs, data, 200.0).unwrap()
    }

    fn cfg(n: usize) -> IcaConfig {
        IcaConfig { n_components: n, ..IcaConfig::default() }
    }

    #[test]
    fn matrices_have_expected_shapes() {
        let buf = mixed();
        let model = fit(&buf, &cfg(3)).unwrap();
        assert_eq!(model.unmixing_matrix().dim(), (3, 4));
        assert_eq!(model.mixing_matrix().dim(), (4, 3));
        assert_eq!(model.sources(&buf).unwrap().dim(), (3, 2000));
    }

    #[test]
    fn unmixing_inverts_mixing() {
        let model = fit(&mixed(), &cfg(3)).unwrap();
        let eye = model.unmixing_matrix().dot(&model.mixing_matrix());
        for ((i, j), &v) in eye.indexed_iter() {
            approx::assert_abs_diff_eq!(v, if i == j { 1.0 } else { 0.0 }, epsilon = 1e-8);
        }
    }

    #[test]
    fn sources_are_white() {
        let buf = mixed();
        let model = fit(&buf, &cfg(3)).unwrap();
        let src = model.sources(&buf).unwrap();
        let c = covariance(&(&src - &src.mean_axis(Axis(1)).unwrap().insert_axis(Axis(1))));
        for ((i, j), &v) in c.indexed_iter() {
            approx::assert_abs_diff_eq!(v, if i == j { 1.0 } else { 0.0 }, epsilon = 1e-6);
        }
    }

    #[test]
    fn reconstruct_round_trip() {
        let buf = mixed();
        let model = fit(&buf, &cfg(3)).unwrap();
        let back = model.reconstruct(&buf, &[]).unwrap();
        for (x, y) in back.iter().zip(buf.data().iter()) {
            approx::assert_abs_diff_eq!(*x, *y, epsilon = 1e-9);
        }
    }

    #[test]
    fn excluding_every_component_leaves_residual_only() {
        let buf = mixed();
        let model = fit(&buf, &cfg(4)).unwrap();
        let all: Vec<usize> = (0..4).collect();
        let back = model.reconstruct(&buf, &all).unwrap();
        // Nothing left but the channel means.
        for (row, &mu) in back.rows().into_iter().zip(model.mean.iter()) {
            for &v in row {
                approx::assert_abs_diff_eq!(v, mu, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn fit_is_deterministic_for_a_seed() {
        let buf = mixed();
        let a = fit(&buf, &cfg(3)).unwrap().unmixing_matrix();
        let b = fit(&buf, &cfg(3)).unwrap().unmixing_matrix();
        for (x, y) in a.iter().zip(b.iter()) {
            approx::assert_abs_diff_eq!(*x, *y, epsilon = 1e-12);
        }
    }

    #[test]
    fn too_many_components() {
        let err = fit(&mixed(), &cfg(5)).unwrap_err();
        assert!(matches!(err, IcaError::InsufficientChannels { requested: 5, available: 4 }));
    }

    #[test]
    fn rank_deficient_data_is_rejected() {
        let mut buf = mixed();
        let dup = buf.data().row(0).to_owned();
        buf.data_mut().row_mut(3).assign(&dup);
        let err = fit(&buf, &cfg(4)).unwrap_err();
        assert!(matches!(err, IcaError::InsufficientChannels { requested: 4, available: 3 }));
    }

    #[test]
    fn iteration_cap_surfaces_convergence_error() {
        let cfg = IcaConfig { n_components: 3, max_iter: 1, tol: 1e-300, ..IcaConfig::default() };
        assert!(matches!(fit(&mixed(), &cfg), Err(IcaError::Convergence { .. })));
    }

    #[test]
    fn channel_layout_must_match() {
        let buf = mixed();
        let model = fit(&buf, &cfg(3)).unwrap();
        let chs = ["A", "B", "C", "E"].iter().map(|n| ChannelDescriptor::eeg(*n)).collect();
        let other = SignalBuffer::new(chs, buf.data().clone(), 200.0).unwrap();
        assert!(matches!(model.sources(&other), Err(IcaError::MissingChannel { .. })));
    }
}
