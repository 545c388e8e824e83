use super::{LabelTable, LoadError, Result, SessionMap};
use regex::Regex;
use tracing::{debug, info};

/// HDFS block identifier: `blk_` followed by an optionally negative integer
pub const HDFS_BLOCK_PATTERN: &str = r"blk_-?\d+";

/// Label text marking a session as anomalous; any other text is normal
pub const ANOMALY_LABEL: &str = "Anomaly";

/// One row of a structured (already templated) log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Raw free-text message
    pub content: String,
    /// Normalized event template for the message
    pub event_template: String,
}

impl LogRecord {
    pub fn new(content: impl Into<String>, event_template: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            event_template: event_template.into(),
        }
    }
}

/// Counters describing one indexing pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexStats {
    /// Records seen
    pub records: usize,
    /// Records that matched at least one session key
    pub indexed_records: usize,
    /// Records with no session key in their content
    pub skipped_records: usize,
    /// Distinct sessions created
    pub sessions: usize,
}

/// Extract the distinct session keys in `content`, in order of first occurrence
///
/// A key repeated inside one message is reported once.
///
/// # Example
/// ```
/// use bitacora::session::extract_session_keys;
/// use regex::Regex;
///
/// let re = Regex::new(r"blk_-?\d+").unwrap();
/// let keys = extract_session_keys(&re, "Deleting blk_-12 and blk_7, then blk_-12 again");
/// assert_eq!(keys, vec!["blk_-12", "blk_7"]);
/// ```
pub fn extract_session_keys<'a>(pattern: &Regex, content: &'a str) -> Vec<&'a str> {
    let mut keys: Vec<&str> = Vec::new();
    for m in pattern.find_iter(content) {
        let key = m.as_str();
        if !keys.contains(&key) {
            keys.push(key);
        }
    }
    keys
}

/// Groups log records into per-session template sequences
///
/// Records whose content yields no key are skipped. This is not an error:
/// bulk logs routinely contain lines unrelated to any session, and the skip
/// count is reported through [`IndexStats`] and tracing instead.
#[derive(Debug, Clone)]
pub struct SessionIndexer {
    pattern: Regex,
}

impl SessionIndexer {
    /// Create an indexer with a custom key extraction pattern
    pub fn new(pattern: &str) -> std::result::Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
        })
    }

    /// Indexer for HDFS block ids
    pub fn hdfs() -> Self {
        Self {
            pattern: Regex::new(HDFS_BLOCK_PATTERN).expect("HDFS block pattern is a valid regex"),
        }
    }

    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }

    /// Group records into sessions
    ///
    /// A record naming several distinct keys contributes its template to each
    /// of those sessions. Sessions are ordered by first sighting and their
    /// templates by record order; nothing is re-sorted.
    pub fn index<'a, I>(&self, records: I) -> (SessionMap, IndexStats)
    where
        I: IntoIterator<Item = &'a LogRecord>,
    {
        let mut sessions = SessionMap::new();
        let mut stats = IndexStats::default();

        for (row, record) in records.into_iter().enumerate() {
            stats.records += 1;
            let keys = extract_session_keys(&self.pattern, &record.content);
            if keys.is_empty() {
                stats.skipped_records += 1;
                debug!(row, "record has no session key; skipped");
                continue;
            }
            stats.indexed_records += 1;
            for key in keys {
                sessions
                    .entry(key)
                    .templates
                    .push(record.event_template.clone());
            }
        }

        stats.sessions = sessions.len();
        info!(
            records = stats.records,
            indexed = stats.indexed_records,
            skipped = stats.skipped_records,
            sessions = stats.sessions,
            "indexed log records into sessions"
        );
        (sessions, stats)
    }

    /// Assign each session's label from the key → label-text table
    ///
    /// # Errors
    /// [`LoadError::MissingLabel`] for the first session with no table entry.
    /// No label is imputed.
    pub fn assign_labels(&self, sessions: &mut SessionMap, labels: &LabelTable) -> Result<()> {
        for session in sessions.iter_mut() {
            let text = labels
                .get(&session.key)
                .ok_or_else(|| LoadError::MissingLabel(session.key.clone()))?;
            session.label = u8::from(text == ANOMALY_LABEL);
        }
        Ok(())
    }
}

impl Default for SessionIndexer {
    fn default() -> Self {
        Self::hdfs()
    }
}
