use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::CatalogFormat;
use crate::corpus::CategoryRecords;
use crate::error::{Error, Result};
use crate::traits::RecordSource;
use crate::types::{FieldValue, ProductRecord};

/// Lists `<root>/*.<extension>` in name order.
fn list_files(root: &Path, extension: &str) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().and_then(|s| s.to_str()) == Some(extension))
        .collect();
    files.sort();
    files
}

/// Declared categories, or one per catalog file when none are declared.
fn discover_categories(root: &Path, declared: &[String], extension: &str) -> Result<Vec<String>> {
    if !declared.is_empty() {
        return Ok(declared.to_vec());
    }
    if !root.is_dir() {
        return Err(Error::DataUnavailable(format!("catalog directory {} does not exist", root.display())));
    }
    Ok(list_files(root, extension)
        .iter()
        .filter_map(|p| p.file_stem().map(|s| s.to_string_lossy().to_string()))
        .collect())
}

/// Path of a category file, or `None` (logged) when it is missing.
fn category_file(root: &Path, category: &str, extension: &str) -> Option<PathBuf> {
    let path = root.join(format!("{category}.{extension}"));
    if path.is_file() {
        Some(path)
    } else {
        warn!(category, path = %path.display(), "category file missing, treating as empty");
        None
    }
}

/// Reads `<root>/<category>.json`, each an array of flat JSON objects.
pub struct JsonDirSource {
    root: PathBuf,
    categories: Vec<String>,
}

impl JsonDirSource {
    /// With an empty `categories` list every `*.json` under `root` is a
    /// category, sorted by name.
    pub fn new(root: impl Into<PathBuf>, categories: Vec<String>) -> Self {
        Self { root: root.into(), categories }
    }

    pub fn root(&self) -> &Path { &self.root }
}

impl RecordSource for JsonDirSource {
    fn categories(&self) -> Result<Vec<String>> { discover_categories(&self.root, &self.categories, CatalogFormat::Json.extension()) }

    fn load_records(&self, category: &str) -> Result<Vec<ProductRecord>> {
        let Some(path) = category_file(&self.root, category, CatalogFormat::Json.extension()) else {
            return Ok(Vec::new());
        };
        let bytes = fs::read(&path)?;
        let rows: Vec<serde_json::Map<String, serde_json::Value>> = serde_json::from_slice(&bytes)
            .map_err(|e| Error::Operation(format!("failed to parse {}: {}", path.display(), e)))?;
        debug!(category, rows = rows.len(), "loaded category");
        Ok(rows.into_iter().map(ProductRecord::from_json).collect())
    }
}

/// Reads `<root>/<category>.csv`. The header row names the fields; cells that
/// parse as numbers become `FieldValue::Number`, empty cells `Null`.
pub struct CsvDirSource {
    root: PathBuf,
    categories: Vec<String>,
}

impl CsvDirSource {
    /// With an empty `categories` list every `*.csv` under `root` is a
    /// category, sorted by name.
    pub fn new(root: impl Into<PathBuf>, categories: Vec<String>) -> Self {
        Self { root: root.into(), categories }
    }

    pub fn root(&self) -> &Path { &self.root }
}

impl RecordSource for CsvDirSource {
    fn categories(&self) -> Result<Vec<String>> { discover_categories(&self.root, &self.categories, CatalogFormat::Csv.extension()) }

    fn load_records(&self, category: &str) -> Result<Vec<ProductRecord>> {
        let Some(path) = category_file(&self.root, category, CatalogFormat::Csv.extension()) else {
            return Ok(Vec::new());
        };
        let parse_err = |e: csv::Error| Error::Operation(format!("failed to parse {}: {}", path.display(), e));
        let mut reader = csv::ReaderBuilder::new().flexible(true).trim(csv::Trim::All).from_path(&path).map_err(parse_err)?;
        let headers = reader.headers().map_err(parse_err)?.clone();
        let mut records = Vec::new();
        for row in reader.records() {
            let row = row.map_err(parse_err)?;
            let mut record = ProductRecord::new();
            for (name, cell) in headers.iter().zip(row.iter()) {
                record.insert(name, csv_cell(cell));
            }
            records.push(record);
        }
        debug!(category, rows = records.len(), "loaded category");
        Ok(records)
    }
}

fn csv_cell(cell: &str) -> FieldValue {
    if cell.is_empty() || cell.eq_ignore_ascii_case("nan") {
        return FieldValue::Null;
    }
    match cell.parse::<f64>() {
        Ok(n) if n.is_finite() => FieldValue::Number(n),
        _ => FieldValue::Text(cell.to_string()),
    }
}

/// Record source for a catalog directory in the configured format.
pub fn catalog_source(format: CatalogFormat, root: impl Into<PathBuf>, categories: Vec<String>) -> Box<dyn RecordSource> {
    match format {
        CatalogFormat::Json => Box::new(JsonDirSource::new(root, categories)),
        CatalogFormat::Csv => Box::new(CsvDirSource::new(root, categories)),
    }
}

/// In-memory rows, mainly for embedding callers and tests.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    order: Vec<String>,
    rows: BTreeMap<String, Vec<ProductRecord>>,
}

impl MemorySource {
    pub fn new() -> Self { Self::default() }

    pub fn with_category(mut self, category: &str, records: Vec<ProductRecord>) -> Self {
        if !self.rows.contains_key(category) {
            self.order.push(category.to_string());
        }
        self.rows.insert(category.to_string(), records);
        self
    }
}

impl RecordSource for MemorySource {
    fn categories(&self) -> Result<Vec<String>> { Ok(self.order.clone()) }

    fn load_records(&self, category: &str) -> Result<Vec<ProductRecord>> {
        Ok(self.rows.get(category).cloned().unwrap_or_default())
    }
}

/// Loads every category of `source` in declared order.
pub fn load_all(source: &dyn RecordSource) -> Result<Vec<CategoryRecords>> {
    let mut out = Vec::new();
    for category in source.categories()? {
        let records = source.load_records(&category)?;
        out.push(CategoryRecords::new(category, records));
    }
    if out.iter().all(|c| c.records.is_empty()) {
        warn!("no product records available in any category");
    }
    Ok(out)
}
