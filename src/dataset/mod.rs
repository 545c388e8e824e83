//! Model-ready window samples derived from sessions
//!
//! - [`vocab`]: template/word id tables with reserved `<pad>`/`<oov>` ids
//! - [`features`]: vocabulary fitting, tf-idf weights and [`MetaData`]
//! - [`window`]: sliding-window expansion of sessions into a flat sample list
//! - [`loader`]: batched iteration over a [`FlattenedDataset`]

pub mod features;
pub mod loader;
pub mod vocab;
pub mod window;

pub use features::{tokenize_template, FeatureExtractor, FeatureType, MetaData};
pub use loader::{Batch, DataLoader};
pub use vocab::{Vocab, OOV_ID, PAD_ID};
pub use window::WindowedSampleBuilder;

/// Per-position features of a template sequence
#[derive(Debug, Clone, PartialEq)]
pub enum Features {
    /// One template id per position
    Sequentials(Vec<usize>),
    /// One bag of word ids per position
    Semantics(Vec<Vec<usize>>),
    /// One sparse `(word id, tf-idf weight)` list per position
    Tfidf(Vec<Vec<(usize, f32)>>),
}

impl Features {
    /// Number of positions
    pub fn len(&self) -> usize {
        match self {
            Features::Sequentials(ids) => ids.len(),
            Features::Semantics(bags) => bags.len(),
            Features::Tfidf(weights) => weights.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of positions `[start, start + len)`
    ///
    /// # Panics
    /// If the range exceeds the sequence.
    pub fn window(&self, start: usize, len: usize) -> Features {
        let range = start..start + len;
        match self {
            Features::Sequentials(ids) => Features::Sequentials(ids[range].to_vec()),
            Features::Semantics(bags) => Features::Semantics(bags[range].to_vec()),
            Features::Tfidf(weights) => Features::Tfidf(weights[range].to_vec()),
        }
    }

    /// Short name of the representation, used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Features::Sequentials(_) => "sequentials",
            Features::Semantics(_) => "semantics",
            Features::Tfidf(_) => "tfidf",
        }
    }
}

/// One fixed-length window of a session
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSample {
    /// Enumeration index of the owning session, assigned once when flattening
    pub session_idx: usize,
    /// Features for templates `[i, i + L)`
    pub features: Features,
    /// Template id at position `i + L`
    pub window_label: usize,
    /// Ground truth of the owning session
    pub session_label: u8,
}

/// Flat, random-access list of window samples
///
/// The session → windows relation survives only through
/// [`WindowSample::session_idx`].
#[derive(Debug, Clone, Default)]
pub struct FlattenedDataset {
    samples: Vec<WindowSample>,
    num_sessions: usize,
}

impl FlattenedDataset {
    pub fn new(samples: Vec<WindowSample>, num_sessions: usize) -> Self {
        Self {
            samples,
            num_sessions,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&WindowSample> {
        self.samples.get(idx)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, WindowSample> {
        self.samples.iter()
    }

    pub fn samples(&self) -> &[WindowSample] {
        &self.samples
    }

    /// Number of sessions enumerated while flattening, including those too
    /// short to yield a window
    pub fn num_sessions(&self) -> usize {
        self.num_sessions
    }
}

impl std::ops::Index<usize> for FlattenedDataset {
    type Output = WindowSample;

    fn index(&self, idx: usize) -> &WindowSample {
        &self.samples[idx]
    }
}

impl<'a> IntoIterator for &'a FlattenedDataset {
    type Item = &'a WindowSample;
    type IntoIter = std::slice::Iter<'a, WindowSample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.iter()
    }
}
