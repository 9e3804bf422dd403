//! Text Index - Inverted word → positions index over a text
//!
//! Words are maximal runs of word characters, lower-cased; a word's
//! position is its ordinal among all words of the text.
//!
//! # Example
//! ```ignore
//! let mut index = TextIndex::new();
//! index.build("Rust is great. Rust is fun!");
//! assert_eq!(index.search("rust"), &[0, 3]);
//! assert_eq!(index.context("great", 1), vec!["is great rust"]);
//! ```

use crate::storage::{RosterError, RosterResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::OnceLock;

const TEXT_INDEX_VERSION: u32 = 1;

fn word_pattern() -> &'static Regex {
    static WORDS: OnceLock<Regex> = OnceLock::new();
    WORDS.get_or_init(|| Regex::new(r"\b\w+\b").expect("word pattern is valid"))
}

/// Split text into lower-cased words
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    word_pattern()
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Inverted index from words to their positions
#[derive(Debug, Clone, Default)]
pub struct TextIndex {
    /// word → positions, ascending
    positions: HashMap<String, Vec<usize>>,
    /// Tokenized text, for context windows
    words: Vec<String>,
    original_text: String,
}

/// Serialization format for JSON persistence
#[derive(Serialize, Deserialize)]
struct TextIndexData {
    version: u32,
    original_text: String,
    word_positions: HashMap<String, Vec<usize>>,
    word_counts: HashMap<String, usize>,
}

impl TextIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the index from `text`, replacing any previous content
    pub fn build(&mut self, text: &str) {
        self.original_text = text.to_string();
        self.words = tokenize(text);
        self.positions.clear();

        for (position, word) in self.words.iter().enumerate() {
            self.positions.entry(word.clone()).or_default().push(position);
        }

        tracing::debug!(
            words = self.words.len(),
            distinct = self.positions.len(),
            "Built text index"
        );
    }

    /// Positions of `term` (case-insensitive); empty when absent
    pub fn search(&self, term: &str) -> &[usize] {
        self.positions
            .get(&term.to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of occurrences of `term`
    pub fn count(&self, term: &str) -> usize {
        self.search(term).len()
    }

    /// The `n` most frequent words, ties broken by first occurrence
    pub fn most_common(&self, n: usize) -> Vec<(&str, usize)> {
        let mut counts: Vec<(&str, usize, usize)> = self
            .positions
            .iter()
            .map(|(word, pos)| (word.as_str(), pos.len(), pos.first().copied().unwrap_or(0)))
            .collect();

        counts.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
        counts
            .into_iter()
            .take(n)
            .map(|(word, count, _)| (word, count))
            .collect()
    }

    /// Windows of `size` words on each side of every occurrence of `word`
    pub fn context(&self, word: &str, size: usize) -> Vec<String> {
        self.search(word)
            .iter()
            .map(|&pos| {
                let start = pos.saturating_sub(size);
                let end = pos.saturating_add(size).saturating_add(1).min(self.words.len());
                self.words[start..end].join(" ")
            })
            .collect()
    }

    pub fn original_text(&self) -> &str {
        &self.original_text
    }

    /// Total number of words
    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    /// Number of distinct words
    pub fn distinct_words(&self) -> usize {
        self.positions.len()
    }

    pub fn contains(&self, term: &str) -> bool {
        self.positions.contains_key(&term.to_lowercase())
    }

    /// Save index to a JSON file
    pub fn save_json(&self, path: &Path) -> RosterResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let data = TextIndexData {
            version: TEXT_INDEX_VERSION,
            original_text: self.original_text.clone(),
            word_positions: self.positions.clone(),
            word_counts: self
                .positions
                .iter()
                .map(|(w, p)| (w.clone(), p.len()))
                .collect(),
        };

        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, &data).map_err(|e| {
            RosterError::Serialization(format!("Failed to save text index: {}", e))
        })?;

        tracing::info!(path = %path.display(), words = self.words.len(), "Saved text index");
        Ok(())
    }

    /// Load index from a JSON file
    ///
    /// The index is rebuilt from the stored text; stored positions must agree.
    pub fn load_json(path: &Path) -> RosterResult<Self> {
        let reader = BufReader::new(File::open(path)?);
        let data: TextIndexData = serde_json::from_reader(reader).map_err(|e| {
            RosterError::Serialization(format!("Failed to load text index: {}", e))
        })?;

        if data.version > TEXT_INDEX_VERSION {
            return Err(RosterError::UnsupportedVersion(data.version));
        }

        let mut index = Self::new();
        index.build(&data.original_text);

        if index.positions != data.word_positions {
            return Err(RosterError::Corruption(
                "text index positions do not match stored text".to_string(),
            ));
        }

        Ok(index)
    }
}
