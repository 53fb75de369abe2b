mod common;

use std::time::Duration;

use common::{choppy_uptrend, light_config, series};
use risk_engine::{
    features::{Feature, FeatureFrame},
    labeling::label_frame,
    store::RiskModelStore,
    trainer::RiskModelTrainer,
};

const WEEK: Duration = Duration::from_secs(7 * 86_400);

#[test]
fn same_seed_trains_identical_models() {
    let closes = choppy_uptrend(320);
    let frame = FeatureFrame::compute(&series("DET", &closes)).unwrap();
    let labels = label_frame(&frame).unwrap();

    let (a_dir, b_dir) = (tempfile::tempdir().unwrap(), tempfile::tempdir().unwrap());
    let trainer = RiskModelTrainer::new(&light_config(a_dir.path()));
    let a = trainer
        .train("DET", &frame, &labels, &RiskModelStore::open(a_dir.path(), WEEK).unwrap())
        .unwrap();
    let b = trainer
        .train("DET", &frame, &labels, &RiskModelStore::open(b_dir.path(), WEEK).unwrap())
        .unwrap();

    assert_eq!(a.metrics, b.metrics);
    assert_eq!(a.features_used, b.features_used);
    let features: Vec<Feature> = a.features_used.iter().map(|n| n.parse().unwrap()).collect();
    let row = frame.latest_row(&features).unwrap();
    let scaled = a.scaler.transform_row(&row).unwrap();
    assert_eq!(
        a.classifier.predict_proba(&scaled).unwrap(),
        b.classifier.predict_proba(&scaled).unwrap()
    );
}

#[test]
fn metrics_describe_the_fit() {
    let closes = choppy_uptrend(320);
    let frame = FeatureFrame::compute(&series("MET", &closes)).unwrap();
    let labels = label_frame(&frame).unwrap();
    let tmp = tempfile::tempdir().unwrap();
    let store = RiskModelStore::open(tmp.path(), WEEK).unwrap();

    let artifact = RiskModelTrainer::new(&light_config(tmp.path()))
        .train("MET", &frame, &labels, &store)
        .unwrap();
    let m = store.load_metrics("MET").unwrap();

    assert_eq!(m, artifact.metrics);
    assert_eq!(m.features_used.as_deref(), Some(artifact.features_used.as_slice()));
    assert_eq!(m.feature_importance.len(), artifact.features_used.len());
    let total: f64 = m.feature_importance.values().sum();
    assert!((total - 1.0).abs() < 1e-9 || total == 0.0);
    assert!((0.0..=1.0).contains(&m.cv_accuracy_mean));
    assert!(m.cv_accuracy_std >= 0.0);
    assert!(m.test_accuracy.is_some_and(|t| (0.0..=1.0).contains(&t)));
    assert!(!store.should_retrain("MET"));
}
