//! Domain types shared by the corpus builder, the scorers and the retriever.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::price::compile;

/// First number in a price cell, thousands separators included.
static PRICE_NUMBER: Lazy<Regex> = Lazy::new(|| compile(r"\d[\d,]*(?:\.\d+)?"));

/// A single field value of a product row.
///
/// Rows come from loosely typed sources, so every value is one of a small set
/// of shapes. Nested JSON arrays/objects are flattened to `Text` on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Bool(bool),
    Null,
}

impl FieldValue {
    /// Text form used for documents. `None` for nulls and blank strings.
    pub fn as_text(&self) -> Option<String> {
        match self {
            FieldValue::Text(s) => {
                let s = s.trim();
                if s.is_empty() { None } else { Some(s.to_string()) }
            }
            FieldValue::Number(n) if !n.is_finite() => None,
            FieldValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => Some(format!("{}", *n as i64)),
            FieldValue::Number(n) => Some(n.to_string()),
            FieldValue::Bool(b) => Some(b.to_string()),
            FieldValue::Null => None,
        }
    }

    /// Numeric reading of a price-like value.
    ///
    /// Text reads its first numeric run with separators removed, so
    /// `"₹54,990"` and `"Rs. 54,990"` both read as `54990`.
    pub fn as_price(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) if n.is_finite() && *n >= 0.0 => Some(*n),
            FieldValue::Text(s) => {
                let digits = PRICE_NUMBER.find(s)?.as_str().replace(',', "");
                digits.parse::<f64>().ok().filter(|p| p.is_finite())
            }
            _ => None,
        }
    }
}

impl From<serde_json::Value> for FieldValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Bool(b),
            Value::Number(n) => n.as_f64().map_or(FieldValue::Null, FieldValue::Number),
            Value::String(s) => FieldValue::Text(s),
            Value::Array(items) => {
                let parts: Vec<String> = items.into_iter().filter_map(|v| FieldValue::from(v).as_text()).collect();
                if parts.is_empty() { FieldValue::Null } else { FieldValue::Text(parts.join(" ")) }
            }
            other @ Value::Object(_) => FieldValue::Text(other.to_string()),
        }
    }
}

/// One product row: an open bag of normalized field names to values.
///
/// Any column set is accepted. `brand`, `model` (or `name` / `title`) and a
/// price-like field are the documented subset the engine reads directly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductRecord {
    fields: BTreeMap<String, FieldValue>,
}

impl ProductRecord {
    pub fn new() -> Self { Self::default() }

    /// Builds a record from a JSON object, normalizing column names.
    pub fn from_json(object: serde_json::Map<String, serde_json::Value>) -> Self {
        object.into_iter().fold(Self::new(), |rec, (k, v)| rec.with(&k, FieldValue::from(v)))
    }

    /// Inserts a field under its normalized name.
    pub fn with(mut self, name: &str, value: impl Into<FieldValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: &str, value: impl Into<FieldValue>) {
        self.fields.insert(normalize_field_name(name), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> { self.fields.get(&normalize_field_name(name)) }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize { self.fields.len() }

    pub fn is_empty(&self) -> bool { self.fields.is_empty() }

    pub fn brand(&self) -> Option<String> { self.get("brand").and_then(FieldValue::as_text) }

    /// Display name: the first of `name`, `model`, `title` that has text.
    pub fn display_name(&self) -> Option<String> {
        ["name", "model", "title"].iter().find_map(|f| self.get(f).and_then(FieldValue::as_text))
    }

    /// First price-like field (field name order) that resolves to a number.
    pub fn price(&self) -> Option<f64> {
        self.fields.iter().filter(|(k, _)| is_price_field(k)).find_map(|(_, v)| v.as_price())
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self { FieldValue::Text(s.to_string()) }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self { FieldValue::Text(s) }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self { FieldValue::Number(n) }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self { FieldValue::Number(n as f64) }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self { FieldValue::Bool(b) }
}

/// `" Selling Price "` -> `"selling_price"`.
pub fn normalize_field_name(name: &str) -> String {
    name.trim().to_lowercase().split_whitespace().collect::<Vec<_>>().join("_")
}

pub fn is_price_field(name: &str) -> bool { name.contains("price") }

/// Side-table entry aligned with a document. Never used for scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataEntry {
    pub category: String,
    /// Ordinal position of the record inside its category.
    pub position: usize,
    pub record: ProductRecord,
    pub price: Option<f64>,
}

/// Which scorer produced a hit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScorerKind {
    TfIdf,
    Keyword,
}

/// One retrieval result. `score` is in `[0, 1]`, higher is better.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedHit {
    pub doc_index: usize,
    pub score: f32,
    pub meta: MetadataEntry,
    pub source: ScorerKind,
}

/// A page of hits out of a larger sorted, filtered list. Pages are 1-based.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub hits: Vec<RankedHit>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
}
