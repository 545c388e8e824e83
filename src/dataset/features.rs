use super::vocab::{Vocab, OOV_ID};
use super::Features;
use crate::session::SessionMap;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

/// How a template is represented at each window position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum FeatureType {
    /// The template id itself
    #[default]
    Sequentials,
    /// The bag of words making up the template text
    Semantics,
}

impl std::fmt::Display for FeatureType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeatureType::Sequentials => write!(f, "sequentials"),
            FeatureType::Semantics => write!(f, "semantics"),
        }
    }
}

/// Vocabulary and label cardinalities needed to size a model
///
/// Computed once from the training sessions and read-only afterwards.
#[derive(Debug, Clone)]
pub struct MetaData {
    /// Rows of the embedding table (templates for sequentials, words for semantics)
    pub vocab_size: usize,
    /// Size of the next-event label space (always the template vocabulary)
    pub num_labels: usize,
    pub feature_type: FeatureType,
    pub use_tfidf: bool,
    /// Optional `[vocab_size, embedding_dim]` initial embedding table
    pub pretrain_matrix: Option<Array2<f32>>,
}

impl MetaData {
    pub fn with_pretrain_matrix(mut self, matrix: Array2<f32>) -> Self {
        self.pretrain_matrix = Some(matrix);
        self
    }
}

/// Split template text into lower-cased alphabetic words
///
/// Placeholders such as `<*>`, numbers and punctuation produce no words.
pub fn tokenize_template(template: &str) -> Vec<String> {
    template
        .split(|c: char| !c.is_ascii_alphabetic())
        .filter(|w| !w.is_empty())
        .map(str::to_ascii_lowercase)
        .collect()
}

/// Fitted template/word vocabularies and idf weights
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    feature_type: FeatureType,
    use_tfidf: bool,
    templates: Vocab,
    words: Vocab,
    /// Indexed by word id; reserved ids carry 0.0
    idf: Vec<f32>,
}

impl FeatureExtractor {
    /// Fit vocabularies on the training sessions
    ///
    /// `use_tfidf` only applies to [`FeatureType::Semantics`]; it is ignored
    /// (with a warning) for sequentials.
    pub fn fit(sessions: &SessionMap, feature_type: FeatureType, use_tfidf: bool) -> Self {
        let use_tfidf = if use_tfidf && feature_type == FeatureType::Sequentials {
            warn!("tf-idf weighting requires semantic features; ignoring");
            false
        } else {
            use_tfidf
        };

        let templates = Vocab::from_tokens(sessions.iter().flat_map(|s| s.templates.iter()));

        let mut words = Vocab::new();
        let mut idf = Vec::new();
        if feature_type == FeatureType::Semantics {
            let distinct: Vec<&str> = (0..templates.len())
                .skip(2)
                .filter_map(|id| templates.decode(id))
                .collect();

            let mut doc_freq: HashMap<usize, usize> = HashMap::new();
            for template in &distinct {
                let mut seen = HashSet::new();
                for word in tokenize_template(template) {
                    let id = words.add(&word);
                    if seen.insert(id) {
                        *doc_freq.entry(id).or_insert(0) += 1;
                    }
                }
            }

            let n_docs = distinct.len() as f32;
            idf = (0..words.len())
                .map(|id| match doc_freq.get(&id) {
                    Some(&df) => ((1.0 + n_docs) / (1.0 + df as f32)).ln() + 1.0,
                    None => 0.0,
                })
                .collect();
        }

        info!(
            templates = templates.len(),
            words = words.len(),
            %feature_type,
            use_tfidf,
            "fitted feature vocabularies"
        );

        Self {
            feature_type,
            use_tfidf,
            templates,
            words,
            idf,
        }
    }

    pub fn feature_type(&self) -> FeatureType {
        self.feature_type
    }

    pub fn use_tfidf(&self) -> bool {
        self.use_tfidf
    }

    pub fn templates(&self) -> &Vocab {
        &self.templates
    }

    pub fn words(&self) -> &Vocab {
        &self.words
    }

    pub fn meta_data(&self) -> MetaData {
        let vocab_size = match self.feature_type {
            FeatureType::Sequentials => self.templates.len(),
            FeatureType::Semantics => self.words.len(),
        };
        MetaData {
            vocab_size,
            num_labels: self.templates.len(),
            feature_type: self.feature_type,
            use_tfidf: self.use_tfidf,
            pretrain_matrix: None,
        }
    }

    /// Template id used as a prediction target
    pub fn template_id(&self, template: &str) -> usize {
        self.templates.encode(template)
    }

    /// Word ids of a template; unknown words map to `<oov>`
    pub fn template_words(&self, template: &str) -> Vec<usize> {
        tokenize_template(template)
            .iter()
            .map(|w| self.words.encode(w))
            .collect()
    }

    /// Sparse tf-idf weights of a template's words
    ///
    /// Unknown words are dropped since they carry no idf.
    pub fn template_tfidf(&self, template: &str) -> Vec<(usize, f32)> {
        let words = self.template_words(template);
        if words.is_empty() {
            return Vec::new();
        }
        let total = words.len() as f32;
        let mut counts: Vec<(usize, usize)> = Vec::new();
        for id in words.into_iter().filter(|&id| id != OOV_ID) {
            match counts.iter_mut().find(|(w, _)| *w == id) {
                Some((_, c)) => *c += 1,
                None => counts.push((id, 1)),
            }
        }
        counts
            .into_iter()
            .map(|(id, c)| (id, c as f32 / total * self.idf[id]))
            .collect()
    }

    /// Encode a full template sequence: label ids plus per-position features
    ///
    /// Each distinct template is encoded once per call.
    pub fn encode(&self, templates: &[String]) -> (Vec<usize>, Features) {
        let label_ids: Vec<usize> = templates.iter().map(|t| self.template_id(t)).collect();
        let features = match (self.feature_type, self.use_tfidf) {
            (FeatureType::Sequentials, _) => Features::Sequentials(label_ids.clone()),
            (FeatureType::Semantics, false) => {
                let mut cache: HashMap<&str, Vec<usize>> = HashMap::new();
                Features::Semantics(
                    templates
                        .iter()
                        .map(|t| {
                            cache
                                .entry(t.as_str())
                                .or_insert_with(|| self.template_words(t))
                                .clone()
                        })
                        .collect(),
                )
            }
            (FeatureType::Semantics, true) => {
                let mut cache: HashMap<&str, Vec<(usize, f32)>> = HashMap::new();
                Features::Tfidf(
                    templates
                        .iter()
                        .map(|t| {
                            cache
                                .entry(t.as_str())
                                .or_insert_with(|| self.template_tfidf(t))
                                .clone()
                        })
                        .collect(),
                )
            }
        };
        (label_ids, features)
    }
}
