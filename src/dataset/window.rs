use super::{FeatureExtractor, FlattenedDataset, WindowSample};
use crate::session::{Session, SessionMap};
use tracing::info;

/// Expands sessions into stride-1 sliding windows
///
/// A session with `T` templates yields `max(0, T - L)` windows; window `i`
/// covers templates `[i, i + L)` and is labelled with template `i + L`.
/// Sessions with `T <= L` yield nothing: there is no padding.
#[derive(Debug, Clone, Copy)]
pub struct WindowedSampleBuilder<'a> {
    extractor: &'a FeatureExtractor,
    window_size: usize,
}

impl<'a> WindowedSampleBuilder<'a> {
    pub fn new(extractor: &'a FeatureExtractor, window_size: usize) -> Self {
        Self {
            extractor,
            window_size,
        }
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Number of windows a sequence of `n_templates` produces
    pub fn window_count(&self, n_templates: usize) -> usize {
        n_templates.saturating_sub(self.window_size)
    }

    /// Windows of one session tagged with `session_idx`
    pub fn session_windows(&self, session_idx: usize, session: &Session) -> Vec<WindowSample> {
        let count = self.window_count(session.templates.len());
        if count == 0 {
            return Vec::new();
        }

        let (label_ids, features) = self.extractor.encode(&session.templates);
        (0..count)
            .map(|i| WindowSample {
                session_idx,
                features: features.window(i, self.window_size),
                window_label: label_ids[i + self.window_size],
                session_label: session.label,
            })
            .collect()
    }

    /// Flatten every session in map order
    ///
    /// Session indices are the enumeration positions in `sessions` and are
    /// fixed here; later stages must not recompute them.
    pub fn build(&self, sessions: &SessionMap) -> FlattenedDataset {
        let total: usize = sessions
            .iter()
            .map(|s| self.window_count(s.templates.len()))
            .sum();

        let mut samples = Vec::with_capacity(total);
        let mut short_sessions = 0usize;
        for (session_idx, session) in sessions.iter().enumerate() {
            let windows = self.session_windows(session_idx, session);
            if windows.is_empty() {
                short_sessions += 1;
            }
            samples.extend(windows);
        }

        info!(
            sessions = sessions.len(),
            short_sessions,
            windows = samples.len(),
            window_size = self.window_size,
            "flattened sessions into windows"
        );
        FlattenedDataset::new(samples, sessions.len())
    }
}
