//! End-to-end library pipeline: load, window, train, evaluate

use bitacora::dataset::{DataLoader, FeatureExtractor, FeatureType, WindowedSampleBuilder};
use bitacora::model::{build_model, ModelConfig, ModelError, ModelKind};
use bitacora::session::{load_sessions, Partition};
use bitacora::{evaluate, fit, EvalReport};
use std::num::NonZeroUsize;

fn batch(n: usize) -> NonZeroUsize {
    NonZeroUsize::new(n).unwrap()
}

fn run(feature_type: FeatureType, use_tfidf: bool, kind: ModelKind) -> EvalReport {
    let (train, test) = load_sessions(
        "tests/fixtures/hdfs_structured.csv",
        "tests/fixtures/hdfs_labels.csv",
        0.5,
        Partition::Sequential,
        0,
    )
    .unwrap();

    let extractor = FeatureExtractor::fit(&train, feature_type, use_tfidf);
    let builder = WindowedSampleBuilder::new(&extractor, 3);
    let train_data = builder.build(&train);
    let test_data = builder.build(&test);

    let config = ModelConfig {
        kind,
        embedding_dim: 8,
        hidden_size: 16,
        kernel_sizes: vec![2, 3],
        ..ModelConfig::default()
    };
    let mut model = build_model(&extractor.meta_data(), &config, 3).unwrap();
    let report = fit(
        model.as_mut(),
        &DataLoader::new(&train_data, batch(16)).with_shuffle(1),
        30,
        0.05,
    )
    .unwrap();
    assert!(report.final_loss().unwrap() < report.epoch_losses[0]);

    evaluate(model.as_ref(), &DataLoader::new(&test_data, batch(64)), 2).unwrap()
}

#[test]
fn test_cnn_flags_sessions_with_unseen_events() {
    let report = run(FeatureType::Sequentials, false, ModelKind::Cnn);

    // Every anomalous test session has a next event the model has never seen
    assert_eq!(report.recall, 1.0);
    assert!(report.f1 > 0.5);
    assert_eq!(report.sessions, 8);
    assert_eq!(report.windows, 86);
    assert_eq!(report.actual_anomalies, 3);
    assert!(report.window_topk_accuracy > 0.0 && report.window_topk_accuracy < 1.0);
}

#[test]
fn test_pooled_model_runs_end_to_end() {
    let report = run(FeatureType::Sequentials, false, ModelKind::Pooled);
    assert_eq!(report.recall, 1.0);
    assert_eq!(report.to_metrics().len(), 4);
    assert!(report.to_metrics().contains_key("top2-acc"));
}

#[test]
fn test_semantic_tfidf_pipeline() {
    let report = run(FeatureType::Semantics, true, ModelKind::Cnn);
    assert_eq!(report.recall, 1.0);
    assert!((0.0..=1.0).contains(&report.precision));
}

#[test]
fn test_topk_larger_than_vocabulary_is_rejected() {
    let (train, test) = load_sessions(
        "tests/fixtures/hdfs_structured.csv",
        "tests/fixtures/hdfs_labels.csv",
        0.5,
        Partition::Sequential,
        0,
    )
    .unwrap();
    let extractor = FeatureExtractor::fit(&train, FeatureType::Sequentials, false);
    let test_data = WindowedSampleBuilder::new(&extractor, 3).build(&test);
    let config = ModelConfig {
        kernel_sizes: vec![2],
        ..ModelConfig::default()
    };
    let model = build_model(&extractor.meta_data(), &config, 3).unwrap();

    let err = evaluate(model.as_ref(), &DataLoader::new(&test_data, batch(64)), 50).unwrap_err();
    assert!(matches!(err, ModelError::InvalidConfig(_)));
}

#[test]
fn test_empty_evaluation_set_is_an_error() {
    let (train, test) = load_sessions(
        "tests/fixtures/hdfs_structured.csv",
        "tests/fixtures/hdfs_labels.csv",
        0.5,
        Partition::Sequential,
        0,
    )
    .unwrap();
    let extractor = FeatureExtractor::fit(&train, FeatureType::Sequentials, false);
    // No session is longer than 20 templates
    let test_data = WindowedSampleBuilder::new(&extractor, 20).build(&test);
    assert!(test_data.is_empty());

    let config = ModelConfig {
        kernel_sizes: vec![2],
        ..ModelConfig::default()
    };
    let model = build_model(&extractor.meta_data(), &config, 20).unwrap();
    let err = evaluate(model.as_ref(), &DataLoader::new(&test_data, batch(64)), 1).unwrap_err();
    assert!(matches!(err, ModelError::EmptyEvaluationSet));
}
