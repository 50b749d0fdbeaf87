use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use shopdb_core::traits::Scorer;
use shopdb_core::types::ScorerKind;

use crate::analyzer::Analyzer;

/// Token-overlap scorer used when no TF-IDF vocabulary is available.
///
/// `score = |unique query tokens ∩ document tokens| / |unique query tokens|`,
/// with the same analyzer as the TF-IDF index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordMatcher {
    analyzer: Analyzer,
    docs: Vec<BTreeSet<String>>,
}

impl KeywordMatcher {
    pub fn new(documents: &[String], analyzer: Analyzer) -> Self {
        let docs = documents.iter().map(|d| analyzer.tokenize(d).into_iter().collect()).collect();
        Self { analyzer, docs }
    }

    pub fn analyzer(&self) -> &Analyzer { &self.analyzer }
}

impl Scorer for KeywordMatcher {
    fn kind(&self) -> ScorerKind { ScorerKind::Keyword }

    fn doc_count(&self) -> usize { self.docs.len() }

    fn score_all(&self, query: &str) -> Vec<f32> {
        let query: BTreeSet<String> = self.analyzer.tokenize(query).into_iter().collect();
        if query.is_empty() {
            return vec![0.0; self.docs.len()];
        }
        let denom = query.len() as f32;
        self.docs
            .iter()
            .map(|doc| query.iter().filter(|t| doc.contains(*t)).count() as f32 / denom)
            .collect()
    }
}
