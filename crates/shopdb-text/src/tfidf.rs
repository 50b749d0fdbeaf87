//! TF-IDF document-term matrix with L2-normalized sparse rows.
//!
//! `idf(t) = ln((1 + N) / (1 + df(t))) + 1`, so every kept term has
//! `idf >= 1` and no term can divide by zero. Cosine similarity against a
//! normalized query vector is then a plain sparse dot product.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

use shopdb_core::config::IndexConfig;
use shopdb_core::error::{Error, Result};
use shopdb_core::traits::Scorer;
use shopdb_core::types::ScorerKind;

use crate::analyzer::Analyzer;

/// Sparse vector: `(column, weight)` pairs sorted by column.
pub type SparseVec = Vec<(u32, f32)>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TfIdfIndex {
    analyzer: Analyzer,
    vocabulary: BTreeMap<String, u32>,
    idf: Vec<f32>,
    rows: Vec<SparseVec>,
    sublinear_tf: bool,
}

impl TfIdfIndex {
    /// Builds the index over `documents` in one pass.
    ///
    /// Fails on invalid parameters or if any weight comes out non-finite;
    /// nothing is returned half-built. An empty vocabulary is not an error,
    /// callers check `is_empty` and pick another scorer.
    pub fn build(documents: &[String], config: &IndexConfig) -> Result<Self> {
        config.validate()?;
        let analyzer = Analyzer::new(config.extra_stop_words.clone());
        let tokenized: Vec<Vec<String>> = documents.iter().map(|d| analyzer.tokenize(d)).collect();
        let n_docs = documents.len();

        let mut df: HashMap<&str, usize> = HashMap::new();
        for tokens in &tokenized {
            let unique: HashSet<&str> = tokens.iter().map(String::as_str).collect();
            for term in unique {
                *df.entry(term).or_insert(0) += 1;
            }
        }

        let max_doc_count = config.max_df * n_docs as f64;
        let mut kept: Vec<(&str, usize)> = df
            .into_iter()
            .filter(|(_, count)| *count >= config.min_df && (*count as f64) <= max_doc_count)
            .collect();
        kept.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        kept.truncate(config.max_features);
        kept.sort_by(|a, b| a.0.cmp(b.0));

        let mut vocabulary = BTreeMap::new();
        let mut idf = Vec::with_capacity(kept.len());
        for (col, (term, count)) in kept.iter().enumerate() {
            let col = u32::try_from(col).map_err(|_| Error::IndexBuild("vocabulary exceeds u32 columns".into()))?;
            vocabulary.insert(term.to_string(), col);
            idf.push((((1 + n_docs) as f64 / (1 + count) as f64).ln() + 1.0) as f32);
        }

        let mut index = Self { analyzer, vocabulary, idf, rows: Vec::with_capacity(n_docs), sublinear_tf: config.sublinear_tf };
        for tokens in &tokenized {
            let row = index.weigh(tokens.iter().map(String::as_str));
            if row.iter().any(|(_, w)| !w.is_finite()) {
                return Err(Error::IndexBuild("non-finite term weight".into()));
            }
            index.rows.push(row);
        }
        Ok(index)
    }

    /// Normalized TF-IDF vector of a query. Out-of-vocabulary terms are
    /// ignored, so an all-OOV query is the zero (empty) vector.
    pub fn vectorize(&self, text: &str) -> SparseVec {
        let tokens = self.analyzer.tokenize(text);
        self.weigh(tokens.iter().map(String::as_str))
    }

    fn weigh<'t>(&self, tokens: impl Iterator<Item = &'t str>) -> SparseVec {
        let mut counts: BTreeMap<u32, u32> = BTreeMap::new();
        for token in tokens {
            if let Some(&col) = self.vocabulary.get(token) {
                *counts.entry(col).or_insert(0) += 1;
            }
        }
        let mut vec: SparseVec = counts
            .into_iter()
            .map(|(col, tf)| {
                let tf = if self.sublinear_tf { 1.0 + (tf as f32).ln() } else { tf as f32 };
                (col, tf * self.idf[col as usize])
            })
            .collect();
        let norm = vec.iter().map(|(_, w)| w * w).sum::<f32>().sqrt();
        if norm > 0.0 {
            for (_, w) in &mut vec {
                *w /= norm;
            }
        }
        vec
    }

    pub fn is_empty(&self) -> bool { self.vocabulary.is_empty() }

    pub fn row_count(&self) -> usize { self.rows.len() }

    pub fn vocabulary(&self) -> &BTreeMap<String, u32> { &self.vocabulary }

    pub fn idf(&self, term: &str) -> Option<f32> { self.vocabulary.get(term).map(|&c| self.idf[c as usize]) }

    pub fn row(&self, doc: usize) -> Option<&SparseVec> { self.rows.get(doc) }

    /// Cosine similarity of the query against every row.
    pub fn similarities(&self, query: &SparseVec) -> Vec<f32> {
        self.rows.iter().map(|row| dot(query, row).clamp(0.0, 1.0)).collect()
    }
}

impl Scorer for TfIdfIndex {
    fn kind(&self) -> ScorerKind { ScorerKind::TfIdf }

    fn doc_count(&self) -> usize { self.rows.len() }

    fn score_all(&self, query: &str) -> Vec<f32> {
        let q = self.vectorize(query);
        if q.is_empty() {
            return vec![0.0; self.rows.len()];
        }
        self.similarities(&q)
    }
}

/// Merge-join dot product of two column-sorted sparse vectors.
pub fn dot(a: &SparseVec, b: &SparseVec) -> f32 {
    let (mut i, mut j, mut sum) = (0, 0, 0.0f32);
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                sum += a[i].1 * b[j].1;
                i += 1;
                j += 1;
            }
        }
    }
    sum
}
