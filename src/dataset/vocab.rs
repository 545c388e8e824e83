use std::collections::HashMap;

/// Reserved id for padding
pub const PAD_ID: usize = 0;

/// Reserved id for tokens never seen while fitting; also the inert embedding row
pub const OOV_ID: usize = 1;

const RESERVED: [&str; 2] = ["<pad>", "<oov>"];

/// Insertion-ordered token ↔ id table with reserved `<pad>` and `<oov>` entries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocab {
    tokens: Vec<String>,
    ids: HashMap<String, usize>,
}

impl Default for Vocab {
    fn default() -> Self {
        let tokens: Vec<String> = RESERVED.iter().map(|t| t.to_string()).collect();
        let ids = tokens
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i))
            .collect();
        Self { tokens, ids }
    }
}

impl Vocab {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a vocabulary from tokens in first-seen order
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut vocab = Self::new();
        for token in tokens {
            vocab.add(token.as_ref());
        }
        vocab
    }

    /// Add a token if absent; returns its id
    pub fn add(&mut self, token: &str) -> usize {
        if let Some(&id) = self.ids.get(token) {
            return id;
        }
        let id = self.tokens.len();
        self.tokens.push(token.to_string());
        self.ids.insert(token.to_string(), id);
        id
    }

    /// Id for `token`, or [`OOV_ID`] when unknown
    pub fn encode(&self, token: &str) -> usize {
        self.ids.get(token).copied().unwrap_or(OOV_ID)
    }

    pub fn decode(&self, id: usize) -> Option<&str> {
        self.tokens.get(id).map(String::as_str)
    }

    /// Number of ids including the reserved ones
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// True when only reserved entries are present
    pub fn is_empty(&self) -> bool {
        self.tokens.len() == RESERVED.len()
    }
}
