#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod config;
pub mod corpus;
pub mod error;
pub mod price;
pub mod records;
pub mod traits;
pub mod types;

pub use corpus::{build_corpus, CategoryRecords, Corpus};
pub use error::{Error, Result};
pub use price::{parse_price_constraints, PriceConstraint, PriceParser};
pub use types::{FieldValue, MetadataEntry, Page, ProductRecord, RankedHit, ScorerKind};
