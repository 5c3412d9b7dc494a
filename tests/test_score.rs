mod common;
use common::{buffer_from_fn, sine};
use icadenoise::score::{detect, pearson, robust_zscore};
use icadenoise::{
    fit, score, ArtifactCriterion, CardiacMethod, ChannelIndex, ChannelKind, DetectionPolicy, ExclusionSet,
    IcaConfig, ScoringConfig,
};
use ndarray::Array1;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn is_subset(small: &[usize], big: &[usize]) -> bool {
    small.iter().all(|i| big.contains(i))
}

#[test]
fn robust_and_fixed_policies_are_monotone() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..50 {
        let n = rng.gen_range(3..20);
        let scores: Vec<f64> = (0..n).map(|_| rng.gen_range(-1.0..1.0) * rng.gen_range(0.0..1.0_f64).powi(3)).collect();
        let thresholds = [0.0, 0.5, 1.0, 2.0, 3.0, 5.0, 10.0];
        for pair in thresholds.windows(2) {
            let lo = detect(&scores, &DetectionPolicy::RobustZScore { threshold: pair[0] });
            let hi = detect(&scores, &DetectionPolicy::RobustZScore { threshold: pair[1] });
            assert!(is_subset(&hi, &lo), "robust {pair:?}: {hi:?} ⊄ {lo:?} for {scores:?}");
        }
        for pair in [0.1, 0.3, 0.5, 0.9].windows(2) {
            let lo = detect(&scores, &DetectionPolicy::Fixed { min_abs_correlation: pair[0] });
            let hi = detect(&scores, &DetectionPolicy::Fixed { min_abs_correlation: pair[1] });
            assert!(is_subset(&hi, &lo), "fixed {pair:?}: {hi:?} ⊄ {lo:?}");
        }
    }
}

#[test]
fn robust_zscore_is_one_sided() {
    // A component far *below* the typical |r| is never an artifact.
    let z = robust_zscore(&[0.4, 0.42, 0.38, 0.41, 0.0]);
    assert!(z[4] < 0.0);
    assert!(detect(&[0.4, 0.42, 0.38, 0.41, 0.0], &DetectionPolicy::default()).is_empty());
}

#[test]
fn reference_kind_selects_band() {
    // Ecg = 12 Hz + 10 × 5.3 Hz. Through the 8–16 Hz cardiac band only the
    // 12 Hz part survives; through the 1–10 Hz ocular band the 5.3 Hz part
    // dominates.
    let sfreq = 250.0;
    let mut buf = buffer_from_fn(&["A", "B", "C", "Ecg"], sfreq, 2500, |c, t| match c {
        0 => sine(12.0, t) + 0.5 * sine(5.3, t),
        1 => 0.3 * sine(12.0, t) + sine(5.3, t),
        2 => 0.7 * sine(12.0, t) - 0.4 * sine(5.3, t),
        _ => sine(12.0, t) + 10.0 * sine(5.3, t),
    });
    buf.set_kind(ChannelIndex(3), ChannelKind::Ecg);
    let model = fit(&buf, &IcaConfig { n_components: 2, ..IcaConfig::default() }).unwrap();

    let sources = model.sources(&buf).unwrap();
    let truth: Array1<f64> = (0..buf.n_times()).map(|i| sine(12.0, i as f64 / sfreq)).collect();
    let r_truth = |k: usize| pearson(sources.row(k), truth.view()).abs();
    let k = if r_truth(0) > r_truth(1) { 0 } else { 1 };

    let cfg = ScoringConfig { cardiac_method: CardiacMethod::Correlation, ..ScoringConfig::default() };
    let as_ecg = score(&model, &buf, "Ecg", &cfg).unwrap();
    assert!(as_ecg.scores[k].abs() > 0.95, "cardiac band scores {:?}", as_ecg.scores);

    buf.set_kind(ChannelIndex(3), ChannelKind::Eog);
    let as_eog = score(&model, &buf, "Ecg", &cfg).unwrap();
    assert!(as_eog.scores[k].abs() < 0.5, "ocular band scores {:?}", as_eog.scores);
}

#[test]
fn robust_threshold_holds_when_most_scores_tie() {
    let scores = [0.1, 0.1, 0.1, 0.1, 0.1, 0.1000001];
    for threshold in [10.0, 100.0, 1000.0] {
        assert!(detect(&scores, &DetectionPolicy::RobustZScore { threshold }).is_empty(), "threshold {threshold}");
    }
    assert!(robust_zscore(&scores).iter().all(|z| z.is_finite()));
}

#[test]
fn exclusion_set_serializes_by_component() {
    let mut set = ExclusionSet::new();
    set.insert(ArtifactCriterion::Cardiac, &[4]);
    set.insert(ArtifactCriterion::OcularVertical, &[0, 4]);
    let json = serde_json::to_value(&set).unwrap();
    assert_eq!(json["components"]["4"], serde_json::json!(["ocular_vertical", "cardiac"]));
    assert_eq!(json["components"]["0"], serde_json::json!(["ocular_vertical"]));
}
