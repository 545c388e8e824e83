use super::{
    split_sessions, IndexStats, LoadError, LogRecord, Partition, Result, SessionIndexer, SessionMap,
};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

/// Session key → raw label text (e.g. `"Anomaly"` / `"Normal"`)
pub type LabelTable = HashMap<String, String>;

const CONTENT_COLUMN: &str = "Content";
const TEMPLATE_COLUMN: &str = "EventTemplate";
const BLOCK_ID_COLUMN: &str = "BlockId";
const LABEL_COLUMN: &str = "Label";

fn column_index(headers: &csv::StringRecord, path: &Path, column: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h.trim() == column)
        .ok_or_else(|| LoadError::MissingColumn {
            path: path.to_path_buf(),
            column: column.to_string(),
        })
}

/// Read a structured log table with at least `Content` and `EventTemplate` columns
///
/// The whole file is read into memory. Extra columns are ignored; empty cells
/// are kept as empty strings.
pub fn load_log_records(path: impl AsRef<Path>) -> Result<Vec<LogRecord>> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    let content_idx = column_index(&headers, path, CONTENT_COLUMN)?;
    let template_idx = column_index(&headers, path, TEMPLATE_COLUMN)?;

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        records.push(LogRecord::new(
            row.get(content_idx).unwrap_or_default(),
            row.get(template_idx).unwrap_or_default(),
        ));
    }
    info!(path = %path.display(), rows = records.len(), "loaded structured log");
    Ok(records)
}

/// Read a label table with `BlockId` and `Label` columns
///
/// Later rows win when a key appears twice.
pub fn load_label_table(path: impl AsRef<Path>) -> Result<LabelTable> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    let key_idx = column_index(&headers, path, BLOCK_ID_COLUMN)?;
    let label_idx = column_index(&headers, path, LABEL_COLUMN)?;

    let mut labels = LabelTable::new();
    for row in reader.records() {
        let row = row?;
        labels.insert(
            row.get(key_idx).unwrap_or_default().to_string(),
            row.get(label_idx).unwrap_or_default().to_string(),
        );
    }
    info!(path = %path.display(), labels = labels.len(), "loaded label table");
    Ok(labels)
}

/// Load an HDFS-style structured log and its labels into train/test sessions
///
/// Records are grouped by block id, labelled, and partitioned with
/// [`split_sessions`]. Both halves are insertion-ordered maps.
///
/// # Errors
/// I/O and CSV failures, missing columns, an invalid ratio, or a session with
/// no label ([`LoadError::MissingLabel`]).
pub fn load_sessions(
    log_file: impl AsRef<Path>,
    label_file: impl AsRef<Path>,
    test_ratio: f64,
    partition: Partition,
    random_seed: u64,
) -> Result<(SessionMap, SessionMap)> {
    let (train, test, _) =
        load_sessions_with_stats(log_file, label_file, test_ratio, partition, random_seed)?;
    Ok((train, test))
}

/// [`load_sessions`] that also returns the indexing counters
pub fn load_sessions_with_stats(
    log_file: impl AsRef<Path>,
    label_file: impl AsRef<Path>,
    test_ratio: f64,
    partition: Partition,
    random_seed: u64,
) -> Result<(SessionMap, SessionMap, IndexStats)> {
    let records = load_log_records(log_file)?;
    let labels = load_label_table(label_file)?;

    let indexer = SessionIndexer::hdfs();
    let (mut sessions, stats) = indexer.index(&records);
    indexer.assign_labels(&mut sessions, &labels)?;

    let (train, test) = split_sessions(sessions, test_ratio, partition, random_seed)?;
    info!(
        train_sessions = train.len(),
        train_anomalies = train.anomaly_count(),
        test_sessions = test.len(),
        test_anomalies = test.anomaly_count(),
        ?partition,
        "partitioned sessions"
    );
    Ok((train, test, stats))
}
