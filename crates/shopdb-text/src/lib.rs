//! shopdb-text
//!
//! Text analysis, TF-IDF and keyword scoring, retrieval, snapshots and the
//! `CatalogSearch` handle that serves one index generation at a time.

#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod analyzer;
pub mod index;
pub mod keyword;
pub mod retrieve;
pub mod service;
pub mod store;
pub mod tfidf;

pub use analyzer::Analyzer;
pub use index::{build_index, IndexGeneration, ScoringStrategy};
pub use keyword::KeywordMatcher;
pub use retrieve::{infer_category, paginate, rank, recommend, top_k, RetrieveOptions};
pub use service::{CatalogSearch, Origin, RebuildReport};
pub use store::{IndexStore, JsonIndexStore};
pub use tfidf::TfIdfIndex;
