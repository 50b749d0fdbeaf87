use crate::error::Result;
use crate::types::{ProductRecord, ScorerKind};

/// Supplies product rows per category.
pub trait RecordSource: Send + Sync {
    /// Categories in declared order.
    fn categories(&self) -> Result<Vec<String>>;
    /// Rows of one category in file order. Unknown categories yield no rows.
    fn load_records(&self, category: &str) -> Result<Vec<ProductRecord>>;
}

/// Scores a query against every document of a corpus.
pub trait Scorer: Send + Sync {
    fn kind(&self) -> ScorerKind;
    /// Number of documents scored by `score_all`.
    fn doc_count(&self) -> usize;
    /// One score in `[0, 1]` per document, in document order.
    fn score_all(&self, query: &str) -> Vec<f32>;
}
