// Session Indexing and Train/Test Partitioning
//
// Raw structured log records are grouped into sessions keyed by an identifier
// found in the free-text content (HDFS block ids such as `blk_-1608999687919862906`).
// Each session keeps its template sequence in stream order and a binary
// ground-truth label taken from a separate label table.
//
// Pipeline position:
//   structured log + labels → SessionIndexer → DatasetSplitter → windowing
//
// The session order produced here is significant: downstream windowing assigns
// each session a stable integer index by enumerating this order once.

mod indexer;
mod loader;
mod split;

pub use indexer::{
    extract_session_keys, IndexStats, LogRecord, SessionIndexer, ANOMALY_LABEL,
    HDFS_BLOCK_PATTERN,
};
pub use loader::{
    load_label_table, load_log_records, load_sessions, load_sessions_with_stats, LabelTable,
};
pub use split::{split_sessions, Partition};

use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading log/label tables and building sessions
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Missing column '{column}' in {}", path.display())]
    MissingColumn { path: PathBuf, column: String },

    #[error("No label found for session '{0}'")]
    MissingLabel(String),

    #[error("Invalid test ratio {0}: must lie strictly between 0 and 1")]
    InvalidRatio(f64),

    #[error("Test ratio {test_ratio} leaves the {side} split empty for {sessions} session(s)")]
    EmptySplit {
        sessions: usize,
        test_ratio: f64,
        side: &'static str,
    },
}

pub type Result<T> = std::result::Result<T, LoadError>;

/// One logical session: every template emitted for a key, in stream order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Extracted session key (e.g. `blk_38865049064139660`)
    pub key: String,
    /// Event templates in the order their records were encountered
    pub templates: Vec<String>,
    /// Ground truth: 1 = anomaly, 0 = normal
    pub label: u8,
}

impl Session {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            templates: Vec::new(),
            label: 0,
        }
    }

    pub fn is_anomalous(&self) -> bool {
        self.label > 0
    }
}

/// Insertion-ordered mapping from session key to [`Session`]
///
/// Iteration order is the order keys were first inserted and never changes
/// afterwards; a side index gives O(1) lookup by key.
#[derive(Debug, Clone, Default)]
pub struct SessionMap {
    sessions: Vec<Session>,
    index: HashMap<String, usize>,
}

impl SessionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the session for `key`, creating an empty one at the end if absent
    pub fn entry(&mut self, key: &str) -> &mut Session {
        let pos = match self.index.get(key) {
            Some(&pos) => pos,
            None => {
                self.sessions.push(Session::new(key));
                self.index.insert(key.to_string(), self.sessions.len() - 1);
                self.sessions.len() - 1
            }
        };
        &mut self.sessions[pos]
    }

    /// Append a complete session; a session with an existing key replaces it in place
    pub fn insert(&mut self, session: Session) {
        match self.index.get(&session.key) {
            Some(&pos) => self.sessions[pos] = session,
            None => {
                self.index.insert(session.key.clone(), self.sessions.len());
                self.sessions.push(session);
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&Session> {
        self.index.get(key).map(|&pos| &self.sessions[pos])
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Session> {
        self.sessions.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Session> {
        self.sessions.iter_mut()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.sessions.iter().map(|s| s.key.as_str())
    }

    /// Number of sessions labelled anomalous
    pub fn anomaly_count(&self) -> usize {
        self.sessions.iter().filter(|s| s.is_anomalous()).count()
    }

    /// Total number of templates across all sessions
    pub fn template_count(&self) -> usize {
        self.sessions.iter().map(|s| s.templates.len()).sum()
    }

    pub fn into_sessions(self) -> Vec<Session> {
        self.sessions
    }
}

impl FromIterator<Session> for SessionMap {
    fn from_iter<I: IntoIterator<Item = Session>>(iter: I) -> Self {
        let mut map = SessionMap::new();
        for session in iter {
            map.insert(session);
        }
        map
    }
}

impl<'a> IntoIterator for &'a SessionMap {
    type Item = &'a Session;
    type IntoIter = std::slice::Iter<'a, Session>;

    fn into_iter(self) -> Self::IntoIter {
        self.sessions.iter()
    }
}
