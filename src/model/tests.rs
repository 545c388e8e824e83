// Model scenarios: construction checks, batch validation, gradients, training

use super::*;
use crate::dataset::{
    FeatureExtractor, Features, FlattenedDataset, WindowSample, WindowedSampleBuilder,
};
use crate::session::{Session, SessionMap};

fn cyclic_sessions() -> SessionMap {
    let cycle = ["open", "read", "close"];
    (0..4)
        .map(|i| Session {
            key: format!("blk_{}", i),
            templates: (0..12).map(|t| cycle[(t + i) % 3].to_string()).collect(),
            label: 0,
        })
        .collect()
}

fn dataset(feature_type: FeatureType, window_size: usize) -> (FeatureExtractor, FlattenedDataset) {
    let sessions = cyclic_sessions();
    let extractor = FeatureExtractor::fit(&sessions, feature_type, false);
    let data = WindowedSampleBuilder::new(&extractor, window_size).build(&sessions);
    (extractor, data)
}

fn small_config(kind: ModelKind) -> ModelConfig {
    ModelConfig {
        kind,
        embedding_dim: 4,
        hidden_size: 8,
        kernel_sizes: vec![1, 2],
        freeze_embeddings: false,
        seed: 7,
    }
}

fn train(model: &mut dyn ForecastModel, data: &FlattenedDataset, steps: usize) -> (f32, f32) {
    let batch: Batch = data.iter().collect();
    let mut adam = Adam::new(0.05);
    let first = model.forward(&batch).unwrap().loss;
    for _ in 0..steps {
        model.zero_grad();
        model.accumulate_gradients(&batch).unwrap();
        adam.step(model.parameters_mut());
    }
    (first, model.forward(&batch).unwrap().loss)
}

#[test]
fn test_cnn_learns_cyclic_sequence() {
    let (extractor, data) = dataset(FeatureType::Sequentials, 2);
    let mut model = build_model(&extractor.meta_data(), &small_config(ModelKind::Cnn), 2).unwrap();
    let (before, after) = train(model.as_mut(), &data, 60);
    assert!(after < before * 0.5, "loss {} -> {}", before, after);
}

#[test]
fn test_pooled_learns_cyclic_sequence() {
    let (extractor, data) = dataset(FeatureType::Sequentials, 1);
    let mut model =
        build_model(&extractor.meta_data(), &small_config(ModelKind::Pooled), 1).unwrap();
    let (before, after) = train(model.as_mut(), &data, 60);
    assert!(after < before * 0.5, "loss {} -> {}", before, after);
}

#[test]
fn test_semantic_models_train() {
    let (extractor, data) = dataset(FeatureType::Semantics, 2);
    for kind in [ModelKind::Cnn, ModelKind::Pooled] {
        let mut model = build_model(&extractor.meta_data(), &small_config(kind), 2).unwrap();
        let (before, after) = train(model.as_mut(), &data, 40);
        assert!(after < before, "{:?}: loss {} -> {}", kind, before, after);
    }
}

#[test]
fn test_predictions_are_distributions() {
    let (extractor, data) = dataset(FeatureType::Sequentials, 2);
    let model = build_model(&extractor.meta_data(), &small_config(ModelKind::Cnn), 2).unwrap();
    let batch: Batch = data.iter().take(5).collect();
    let out = model.forward(&batch).unwrap();

    assert_eq!(out.y_pred.dim(), (5, extractor.meta_data().num_labels));
    for row in out.y_pred.rows() {
        assert!((row.sum() - 1.0).abs() < 1e-5);
    }
    assert!(out.loss.is_finite() && out.loss > 0.0);
}

#[test]
fn test_conv_weight_gradient_matches_finite_difference() {
    let (extractor, data) = dataset(FeatureType::Sequentials, 2);
    let mut model = build_model(&extractor.meta_data(), &small_config(ModelKind::Cnn), 2).unwrap();
    let batch: Batch = data.iter().take(4).collect();

    model.zero_grad();
    model.accumulate_gradients(&batch).unwrap();
    // Parameter 0 is the embedding table, 1 the first convolution's weight
    let analytic = model.parameters()[1].grad[[0, 0]];

    let eps = 5e-3;
    model.parameters_mut()[1].value[[0, 0]] += eps;
    let plus = model.forward(&batch).unwrap().loss;
    model.parameters_mut()[1].value[[0, 0]] -= 2.0 * eps;
    let minus = model.forward(&batch).unwrap().loss;
    let numeric = (plus - minus) / (2.0 * eps);

    assert!(
        (numeric - analytic).abs() < 5e-3 + 0.05 * analytic.abs(),
        "numeric {} analytic {}",
        numeric,
        analytic
    );
}

#[test]
fn test_frozen_embeddings_are_not_parameters() {
    let (extractor, _) = dataset(FeatureType::Sequentials, 2);
    let meta = extractor.meta_data();
    let trainable = build_model(&meta, &small_config(ModelKind::Cnn), 2).unwrap();

    let mut config = small_config(ModelKind::Cnn);
    config.freeze_embeddings = true;
    let frozen = build_model(&meta, &config, 2).unwrap();

    assert_eq!(
        trainable.parameter_count() - frozen.parameter_count(),
        meta.vocab_size * 4
    );
    assert_eq!(trainable.parameters().len(), frozen.parameters().len() + 1);
}

#[test]
fn test_pretrained_matrix_shape_is_checked() {
    let (extractor, _) = dataset(FeatureType::Sequentials, 2);
    let meta = extractor
        .meta_data()
        .with_pretrain_matrix(Array2::zeros((2, 4)));
    let err = build_model(&meta, &small_config(ModelKind::Cnn), 2).err().unwrap();
    assert!(matches!(err, ModelError::ShapeMismatch { found: 2, .. }));
}

#[test]
fn test_kernel_wider_than_window_is_rejected() {
    let (extractor, _) = dataset(FeatureType::Sequentials, 2);
    let mut config = small_config(ModelKind::Cnn);
    config.kernel_sizes = vec![2, 3];
    let err = build_model(&extractor.meta_data(), &config, 2).err().unwrap();
    assert!(matches!(err, ModelError::InvalidConfig(_)));

    config.kernel_sizes.clear();
    assert!(build_model(&extractor.meta_data(), &config, 2).is_err());
}

#[test]
fn test_check_batch_rejections() {
    let sample = |features: Features, label: usize| WindowSample {
        session_idx: 0,
        features,
        window_label: label,
        session_label: 0,
    };

    let empty = Batch::new(Vec::new());
    assert!(matches!(
        check_batch(&empty, "sequentials", Some(2), 5),
        Err(ModelError::EmptyBatch)
    ));

    let semantic = sample(Features::Semantics(vec![vec![2], vec![3]]), 2);
    assert!(matches!(
        check_batch(&Batch::new(vec![&semantic]), "sequentials", Some(2), 5),
        Err(ModelError::FeatureMismatch { found: "semantics", .. })
    ));

    let short = sample(Features::Sequentials(vec![2]), 2);
    assert!(matches!(
        check_batch(&Batch::new(vec![&short]), "sequentials", Some(2), 5),
        Err(ModelError::ShapeMismatch { expected: 2, found: 1, .. })
    ));
    assert!(check_batch(&Batch::new(vec![&short]), "sequentials", None, 5).is_ok());

    let bad_label = sample(Features::Sequentials(vec![2, 3]), 9);
    assert!(matches!(
        check_batch(&Batch::new(vec![&bad_label]), "sequentials", Some(2), 5),
        Err(ModelError::LabelOutOfRange { label: 9, num_labels: 5 })
    ));
}

#[test]
fn test_model_rejects_mismatched_features() {
    let (extractor, data) = dataset(FeatureType::Sequentials, 2);
    let mut semantic_meta = extractor.meta_data();
    semantic_meta.feature_type = FeatureType::Semantics;
    let model = build_model(&semantic_meta, &small_config(ModelKind::Pooled), 2).unwrap();

    let batch: Batch = data.iter().take(2).collect();
    assert!(matches!(
        model.forward(&batch),
        Err(ModelError::FeatureMismatch { .. })
    ));
}

#[test]
fn test_same_seed_same_model() {
    let (extractor, data) = dataset(FeatureType::Sequentials, 2);
    let meta = extractor.meta_data();
    let a = build_model(&meta, &small_config(ModelKind::Cnn), 2).unwrap();
    let b = build_model(&meta, &small_config(ModelKind::Cnn), 2).unwrap();
    let batch: Batch = data.iter().take(3).collect();
    assert_eq!(a.forward(&batch).unwrap().y_pred, b.forward(&batch).unwrap().y_pred);
}

#[test]
fn test_expected_features() {
    let (extractor, _) = dataset(FeatureType::Semantics, 2);
    let mut meta = extractor.meta_data();
    assert_eq!(expected_features(&meta), "semantics");
    meta.use_tfidf = true;
    assert_eq!(expected_features(&meta), "tfidf");
    meta.feature_type = FeatureType::Sequentials;
    assert_eq!(expected_features(&meta), "sequentials");
}
