use serde::{Deserialize, Serialize};
use std::hash::Hasher;
use twox_hash::XxHash64;

use crate::config::CorpusConfig;
use crate::types::{is_price_field, FieldValue, MetadataEntry, ProductRecord};

/// All records of one category, in file order.
#[derive(Debug, Clone, Default)]
pub struct CategoryRecords {
    pub category: String,
    pub records: Vec<ProductRecord>,
}

impl CategoryRecords {
    pub fn new(category: impl Into<String>, records: Vec<ProductRecord>) -> Self {
        Self { category: category.into(), records }
    }
}

/// Searchable documents and their metadata, aligned by index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Corpus {
    pub documents: Vec<String>,
    pub metadata: Vec<MetadataEntry>,
}

impl Corpus {
    pub fn len(&self) -> usize { self.documents.len() }

    pub fn is_empty(&self) -> bool { self.documents.is_empty() }

    /// Stable 64-bit digest of the corpus content. Two corpora built from the
    /// same records with the same settings share a fingerprint.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = XxHash64::with_seed(0);
        hasher.write_usize(self.documents.len());
        for (doc, meta) in self.documents.iter().zip(&self.metadata) {
            hasher.write(doc.as_bytes());
            hasher.write_u8(0);
            hasher.write(meta.category.as_bytes());
            hasher.write_u8(0);
            hasher.write_u64(meta.price.map_or(u64::MAX, f64::to_bits));
            hash_record(&mut hasher, &meta.record);
        }
        hasher.finish()
    }
}

/// Field names and values, so a renamed column changes the digest even when
/// the document text does not.
fn hash_record(hasher: &mut XxHash64, record: &ProductRecord) {
    hasher.write_usize(record.len());
    for (name, value) in record.fields() {
        hasher.write(name.as_bytes());
        hasher.write_u8(0);
        match value {
            FieldValue::Text(s) => {
                hasher.write_u8(1);
                hasher.write(s.as_bytes());
                hasher.write_u8(0);
            }
            FieldValue::Number(n) => {
                hasher.write_u8(2);
                hasher.write_u64(n.to_bits());
            }
            FieldValue::Bool(b) => hasher.write_u8(if *b { 3 } else { 4 }),
            FieldValue::Null => hasher.write_u8(5),
        }
    }
}

/// Turns product rows into one normalized document per record.
///
/// Categories are visited in the given order, records in file order. Price
/// fields only feed `MetadataEntry::price`; they never reach the document
/// text. A record without any text still yields an (empty) document so that
/// `documents[i]` and `metadata[i]` always describe the same record.
pub fn build_corpus(records_by_category: &[CategoryRecords], config: &CorpusConfig) -> Corpus {
    let mut corpus = Corpus::default();
    for group in records_by_category {
        let category_text = normalize_text(&group.category);
        for (position, record) in group.records.iter().enumerate() {
            let values: Vec<(bool, String)> = record
                .fields()
                .filter(|(name, _)| !is_price_field(name))
                .filter_map(|(name, value)| {
                    let text = normalize_text(&value.as_text()?);
                    let important = config.important_fields.iter().any(|f| name.contains(f.as_str()));
                    (!text.is_empty()).then_some((important, text))
                })
                .collect();
            let mut parts: Vec<&str> = Vec::new();
            if !category_text.is_empty() {
                parts.extend(std::iter::repeat(category_text.as_str()).take(config.category_weight));
            }
            for (important, text) in &values {
                let weight = if *important { config.important_weight.max(1) } else { 1 };
                for _ in 0..weight { parts.push(text); }
            }
            corpus.documents.push(parts.join(" "));
            corpus.metadata.push(MetadataEntry {
                category: group.category.clone(),
                position,
                record: record.clone(),
                price: record.price(),
            });
        }
    }
    corpus
}

/// Lower-cases, turns every non-alphanumeric character into a space and
/// collapses whitespace.
pub fn normalize_text(text: &str) -> String {
    let mapped: String = text
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .to_lowercase();
    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn laptop(brand: &str, model: &str, price: f64) -> ProductRecord {
        ProductRecord::new().with("brand", brand).with("model", model).with("price", price)
    }

    #[test]
    fn documents_follow_category_then_file_order() {
        let input = vec![
            CategoryRecords::new("laptop", vec![laptop("Dell", "XPS 13", 90000.0), laptop("HP", "Pavilion", 60000.0)]),
            CategoryRecords::new("mobile", vec![laptop("Apple", "iPhone 15", 79999.0)]),
        ];
        let corpus = build_corpus(&input, &CorpusConfig::default());
        assert_eq!(corpus.len(), 3);
        assert_eq!(corpus.metadata.len(), 3);
        assert_eq!(corpus.documents[0], "dell xps 13");
        assert_eq!(corpus.metadata[1].position, 1);
        assert_eq!(corpus.metadata[2].category, "mobile");
        assert_eq!(corpus.metadata[2].position, 0);
    }

    #[test]
    fn price_is_kept_out_of_document_text() {
        let input = vec![CategoryRecords::new("laptop", vec![laptop("Dell", "XPS", 123456.0)])];
        let corpus = build_corpus(&input, &CorpusConfig::default());
        assert!(!corpus.documents[0].contains("123456"));
        assert_eq!(corpus.metadata[0].price, Some(123456.0));
    }

    #[test]
    fn empty_record_still_yields_a_document() {
        let input = vec![CategoryRecords::new("misc", vec![ProductRecord::new().with("notes", "  "), laptop("Acer", "Swift", 1.0)])];
        let corpus = build_corpus(&input, &CorpusConfig::default());
        assert_eq!(corpus.documents, vec![String::new(), "acer swift".to_string()]);
        assert_eq!(corpus.metadata.len(), 2);
    }

    #[test]
    fn empty_input_is_an_empty_corpus() {
        let corpus = build_corpus(&[], &CorpusConfig::default());
        assert!(corpus.is_empty() && corpus.metadata.is_empty());
    }

    #[test]
    fn punctuation_is_normalized() {
        assert_eq!(normalize_text("Intel Core i7-1165G7, 16GB/512GB"), "intel core i7 1165g7 16gb 512gb");
    }

    #[test]
    fn weights_repeat_category_and_important_fields() {
        let config = CorpusConfig { category_weight: 2, important_fields: vec!["brand".into()], important_weight: 3 };
        let input = vec![CategoryRecords::new("laptop", vec![laptop("Dell", "XPS", 1.0)])];
        let corpus = build_corpus(&input, &config);
        assert_eq!(corpus.documents[0], "laptop laptop dell dell dell xps");
    }

    #[test]
    fn fingerprint_tracks_content() {
        let input = vec![CategoryRecords::new("laptop", vec![laptop("Dell", "XPS", 1.0)])];
        let a = build_corpus(&input, &CorpusConfig::default());
        let b = build_corpus(&input, &CorpusConfig::default());
        assert_eq!(a.fingerprint(), b.fingerprint());
        let changed = vec![CategoryRecords::new("laptop", vec![laptop("Dell", "XPS", 2.0)])];
        assert_ne!(a.fingerprint(), build_corpus(&changed, &CorpusConfig::default()).fingerprint());
    }

    #[test]
    fn fingerprint_tracks_field_names() {
        let named = |field: &str| {
            let rec = ProductRecord::new().with("brand", "Dell").with(field, "XPS 13");
            build_corpus(&[CategoryRecords::new("laptop", vec![rec])], &CorpusConfig::default())
        };
        let (model, name) = (named("model"), named("name"));
        assert_eq!(model.documents, name.documents);
        assert_ne!(model.fingerprint(), name.fingerprint());
    }
}
