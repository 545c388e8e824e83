use anyhow::{Context, Result};
use bitacora::cli::{Cli, OutputFormat};
use bitacora::config::ExperimentConfig;
use bitacora::dataset::{DataLoader, FeatureExtractor, WindowedSampleBuilder};
use bitacora::model::build_model;
use bitacora::report::{DatasetStats, RunReport};
use bitacora::session::load_sessions_with_stats;
use bitacora::{fit, Evaluator};
use clap::Parser;
use ndarray::Array2;
use std::num::NonZeroUsize;
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber; `RUST_LOG` wins unless --debug is set
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Read a `[rows][cols]` JSON matrix
fn load_pretrained(path: &Path) -> Result<Array2<f32>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed reading embeddings {}", path.display()))?;
    let rows: Vec<Vec<f32>> = serde_json::from_str(&content)
        .with_context(|| format!("failed parsing embeddings {}", path.display()))?;

    let cols = rows.first().map(Vec::len).unwrap_or(0);
    if let Some(bad) = rows.iter().position(|r| r.len() != cols) {
        anyhow::bail!(
            "embedding row {} has {} values, expected {}",
            bad,
            rows[bad].len(),
            cols
        );
    }
    let n_rows = rows.len();
    let flat: Vec<f32> = rows.into_iter().flatten().collect();
    Ok(Array2::from_shape_vec((n_rows, cols), flat)?)
}

fn run(config: &ExperimentConfig, format: OutputFormat) -> Result<()> {
    let (Some(log_file), Some(label_file)) = (&config.data.log_file, &config.data.label_file)
    else {
        anyhow::bail!("Both --log-file and --label-file are required (or set them in --config)");
    };

    let (train, test, index_stats) = load_sessions_with_stats(
        log_file,
        label_file,
        config.data.test_ratio,
        config.data.partition,
        config.data.seed,
    )
    .context("failed loading sessions")?;

    let window_size = config.features.window_size;
    let extractor = FeatureExtractor::fit(
        &train,
        config.features.feature_type,
        config.features.use_tfidf,
    );
    let builder = WindowedSampleBuilder::new(&extractor, window_size);
    let train_data = builder.build(&train);
    let test_data = builder.build(&test);

    let mut meta = extractor.meta_data();
    if let Some(path) = &config.model.pretrained_embeddings {
        meta = meta.with_pretrain_matrix(load_pretrained(path)?);
    }
    let mut model = build_model(&meta, &config.model_config(), window_size)?;
    let evaluator = Evaluator::new(config.model.topk);
    evaluator.validate(meta.num_labels)?;

    let batch_size =
        NonZeroUsize::new(config.train.batch_size).context("batch_size must be positive")?;
    let mut train_loader = DataLoader::new(&train_data, batch_size);
    if config.train.shuffle {
        train_loader = train_loader.with_shuffle(config.data.seed);
    }
    let training = fit(
        model.as_mut(),
        &train_loader,
        config.train.epochs,
        config.train.learning_rate,
    )?;

    let test_loader = DataLoader::new(&test_data, batch_size);
    let evaluation = evaluator.evaluate(model.as_ref(), &test_loader)?;

    let dataset = DatasetStats {
        log_records: index_stats.records,
        skipped_records: index_stats.skipped_records,
        train_sessions: train.len(),
        test_sessions: test.len(),
        train_windows: train_data.len(),
        test_windows: test_data.len(),
        vocab_size: meta.vocab_size,
        num_labels: meta.num_labels,
    };
    let report = RunReport::new(model.name(), dataset, training, evaluation);
    match format {
        OutputFormat::Text => print!("{}", report.to_text()),
        OutputFormat::Json => println!("{}", report.to_json()?),
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.debug);

    let mut config = match &args.config {
        Some(path) => ExperimentConfig::from_file(path)?,
        None => ExperimentConfig::default(),
    };
    args.apply_overrides(&mut config);
    config.validate()?;

    run(&config, args.format)
}
