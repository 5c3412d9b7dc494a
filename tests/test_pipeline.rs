mod common;
use common::max_abs_diff;
use icadenoise::reference::pick_sum;
use icadenoise::remap::{ECG, EOG_HORIZONTAL, EOG_VERTICAL};
use icadenoise::score::{pearson, score_sources};
use icadenoise::{
    condition, find_artifacts, fit, remap, score, ArtifactCriterion, CardiacMethod, ChannelKind, IcaConfig, IcaError,
    Montage, PipelineConfig, RemapConfig, SignalBuffer, SyntheticRecording,
};

/// Configuration for the twelve-channel synthetic recording without `Erbs`.
fn ocular_only() -> PipelineConfig {
    PipelineConfig {
        remap: RemapConfig { cardiac: None, ..RemapConfig::default() },
        ica: IcaConfig { n_components: 6, ..IcaConfig::default() },
        ..PipelineConfig::default()
    }
}

fn conditioned(cfg: &PipelineConfig) -> SignalBuffer {
    let raw = SyntheticRecording::default().build().unwrap();
    let remapped = remap(raw, &cfg.remap).unwrap();
    condition(remapped, &cfg.filter).unwrap()
}

#[test]
fn remap_channel_count() {
    let raw = SyntheticRecording::default().build().unwrap();
    assert_eq!(raw.n_channels(), 12);
    // 12 − 4 ocular electrodes − 2 auxiliary + 2 derivations.
    let out = remap(raw, &ocular_only().remap).unwrap();
    assert_eq!(out.n_channels(), 8);
    assert!(!out.contains("OrbOcc") && !out.contains("Mass"));
}

#[test]
fn recording_without_auxiliary_channels_is_rejected() {
    let mut raw = SyntheticRecording::default().build().unwrap();
    let mass = raw.resolve("Mass").unwrap();
    raw.drop_channels(&[mass]);
    match remap(raw, &ocular_only().remap) {
        Err(IcaError::MissingChannel { name }) => assert_eq!(name, "Mass"),
        other => panic!("expected MissingChannel, got {other:?}"),
    }
}

#[test]
fn condition_restores_names_after_montage() {
    let cfg = ocular_only();
    let clean = conditioned(&cfg);
    let names = clean.ch_names();
    assert!(names.contains(&EOG_VERTICAL) && names.contains(&EOG_HORIZONTAL));
    assert!(!names.contains(&"F9") && !names.contains(&"F10"));
    assert!(clean.placeholders().is_empty());

    let montage = Montage::spherical_1005();
    let pos = |name: &str| clean.channel(clean.resolve(name).unwrap()).position;
    assert_eq!(pos(EOG_VERTICAL), montage.position("F9"));
    assert_eq!(pos(EOG_HORIZONTAL), montage.position("F10"));
    assert_eq!(pos("Cz"), montage.position("Cz"));
}

#[test]
fn eeg_channels_sum_to_zero_after_condition() {
    let clean = conditioned(&ocular_only());
    let eeg = clean.indices_of_kind(ChannelKind::Eeg);
    assert_eq!(eeg.len(), 6);
    let sums = pick_sum(clean.data(), &eeg);
    let scale = clean.data().iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    assert!(sums.iter().all(|s| s.abs() < 1e-9 * scale));
}

#[test]
fn reconstruct_without_exclusions_is_identity() {
    let cfg = ocular_only();
    let clean = conditioned(&cfg);
    let model = fit(&clean, &cfg.ica).unwrap();
    let back = model.reconstruct(&clean, &[]).unwrap();
    let scale = clean.data().iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    let err = max_abs_diff(&back, clean.data());
    assert!(err < 1e-8 * scale, "reconstruction error {err:.2e} (scale {scale:.2e})");
}

#[test]
fn vertical_ocular_component_is_flagged() {
    let cfg = ocular_only();
    let clean = conditioned(&cfg);
    let model = fit(&clean, &cfg.ica).unwrap();
    assert_eq!(model.n_components(), 6);

    let s = score(&model, &clean, EOG_VERTICAL, &cfg.scoring).unwrap();
    assert_eq!(s.scores.len(), 6);
    assert!(!s.flagged.is_empty(), "scores {:?}", s.scores);
    let best = s.scores[s.flagged[0]].abs();
    assert!(best > 0.8, "strongest |r| = {best:.3}");
    assert!(s.scores.iter().all(|r| r.abs() <= best));
}

#[test]
fn empty_reference_name_is_missing() {
    let cfg = ocular_only();
    let clean = conditioned(&cfg);
    let model = fit(&clean, &cfg.ica).unwrap();
    let err = score(&model, &clean, "", &cfg.scoring).unwrap_err();
    assert!(matches!(err, IcaError::MissingChannel { ref name } if name.is_empty()));
}

#[test]
fn removing_flagged_components_reduces_ocular_leak() {
    let cfg = ocular_only();
    let clean = conditioned(&cfg);
    let model = fit(&clean, &cfg.ica).unwrap();
    let s = score(&model, &clean, EOG_VERTICAL, &cfg.scoring).unwrap();

    let fp1 = clean.resolve("Fp1").unwrap();
    let eog = clean.resolve(EOG_VERTICAL).unwrap();
    let before = pearson(clean.row(fp1), clean.row(eog)).abs();

    let cleaned = model.remove_components(clean, &s.flagged).unwrap();
    let after = pearson(cleaned.row(fp1), cleaned.row(eog)).abs();
    assert!(after < before, "|r(Fp1, Eog_v)| {before:.3} → {after:.3}");
}

#[test]
fn find_artifacts_with_cardiac_channel() {
    let cfg = PipelineConfig {
        ica: IcaConfig { n_components: 7, ..IcaConfig::default() },
        ..PipelineConfig::default()
    };
    let raw = SyntheticRecording::default().with_cardiac().build().unwrap();
    let report = find_artifacts(raw, &cfg).unwrap();

    assert_eq!(report.n_components, 7);
    assert_eq!(report.scores.len(), 3);
    assert!(report.explained_variance > 0.99);
    let vertical = &report.scores[&ArtifactCriterion::OcularVertical];
    assert!(!vertical.flagged.is_empty());
    for &i in &vertical.flagged {
        assert!(report.exclude.criteria(i).contains(&ArtifactCriterion::OcularVertical));
    }
    assert!(report.exclude.indices().windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn cardiac_component_is_phase_locked_to_heartbeats() {
    let cfg = PipelineConfig {
        ica: IcaConfig { n_components: 7, ..IcaConfig::default() },
        ..PipelineConfig::default()
    };
    assert_eq!(cfg.scoring.cardiac_method, CardiacMethod::Ctps);
    let raw = SyntheticRecording::default().with_cardiac().build().unwrap();
    let clean = condition(remap(raw, &cfg.remap).unwrap(), &cfg.filter).unwrap();
    let model = fit(&clean, &cfg.ica).unwrap();

    let cardiac = score(&model, &clean, ECG, &cfg.scoring).unwrap();
    assert_eq!(cardiac.scores.len(), 7);
    assert!(cardiac.scores.iter().all(|s| (0.0..=1.0).contains(s)), "{:?}", cardiac.scores);
    assert!(!cardiac.flagged.is_empty(), "ctps scores {:?}", cardiac.scores);

    // The most phase-locked component is the one that tracks the pulse.
    let r = score_sources(&model, &clean, ECG, &cfg.scoring).unwrap();
    let pulse = (0..r.len()).max_by(|&i, &j| r[i].abs().total_cmp(&r[j].abs())).unwrap();
    assert_eq!(cardiac.flagged[0], pulse, "ctps {:?}, r {:?}", cardiac.scores, r);
    assert!(cardiac.scores[pulse] > 0.6);
}

#[test]
fn missing_cardiac_channel_fails_fast() {
    let raw = SyntheticRecording::default().build().unwrap();
    let cfg = PipelineConfig { ica: IcaConfig { n_components: 6, ..IcaConfig::default() }, ..PipelineConfig::default() };
    match find_artifacts(raw, &cfg) {
        Err(IcaError::MissingChannel { name }) => assert_eq!(name, "Erbs"),
        other => panic!("expected MissingChannel, got {other:?}"),
    }
}

#[test]
fn default_component_count_exceeds_channels() {
    let cfg = PipelineConfig { remap: ocular_only().remap, ..PipelineConfig::default() };
    let raw = SyntheticRecording::default().build().unwrap();
    let err = find_artifacts(raw, &cfg).unwrap_err();
    assert!(matches!(err, IcaError::InsufficientChannels { requested: 15, available: 8 }));
}

#[test]
fn pipeline_is_deterministic() {
    let cfg = ocular_only();
    let a = find_artifacts(SyntheticRecording::default().build().unwrap(), &cfg).unwrap();
    let b = find_artifacts(SyntheticRecording::default().build().unwrap(), &cfg).unwrap();
    assert_eq!(a.exclude, b.exclude);
    assert_eq!(a.scores, b.scores);
}
