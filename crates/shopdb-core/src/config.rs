//! Configuration loader and path helpers.
//!
//! Uses Figment to merge built-in defaults, `config.toml`, `config.<env>.toml`
//! and `SHOPDB_*` env vars (`__` separates nested keys, e.g.
//! `SHOPDB_INDEX__MAX_DF=0.9`). Provides helpers to expand `~` and `${VAR}`
//! and to resolve relative paths against a known base directory.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::price::DEFAULT_AROUND_TOLERANCE;

pub struct Config {
    figment: Figment,
    env_name: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_for_env(None)
    }

    pub fn load_for_env(env: Option<&str>) -> Result<Self> {
        let env_name = match env {
            Some(env) => env.to_string(),
            None => env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string()),
        };

        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("SHOPDB_").split("__"));

        let config = Self { figment, env_name };
        config.settings()?.validate_for_env(&config.env_name)?;
        Ok(config)
    }

    pub fn env_name(&self) -> &str { &self.env_name }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to get '{}': {}", key, e)))
    }

    pub fn settings(&self) -> Result<Settings> {
        self.figment.extract().map_err(|e| Error::InvalidConfig(e.to_string()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub data: DataConfig,
    pub corpus: CorpusConfig,
    pub index: IndexConfig,
    pub retrieval: RetrievalConfig,
}

/// File format of the catalog directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogFormat {
    /// `<category>.json`, an array of flat objects.
    #[default]
    Json,
    /// `<category>.csv` with a header row.
    Csv,
}

impl CatalogFormat {
    pub fn extension(self) -> &'static str {
        match self {
            CatalogFormat::Json => "json",
            CatalogFormat::Csv => "csv",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    /// Directory holding one file per category.
    pub catalog_dir: String,
    pub format: CatalogFormat,
    /// Where the index snapshot is mirrored. Empty disables persistence.
    pub persist_dir: String,
    /// Declared category order. Empty means "every catalog file, sorted".
    pub categories: Vec<String>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            catalog_dir: "data/catalog".to_string(),
            format: CatalogFormat::Json,
            persist_dir: "data/persist".to_string(),
            categories: vec!["laptop".to_string(), "mobile".to_string(), "headphone".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusConfig {
    /// How many times the category tag is prepended to each document.
    pub category_weight: usize,
    /// Fields whose name contains one of these get `important_weight` copies.
    pub important_fields: Vec<String>,
    pub important_weight: usize,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            category_weight: 0,
            important_fields: ["name", "model", "brand", "title", "processor", "ram", "storage", "memory", "display", "camera", "battery", "os"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            important_weight: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyChoice {
    /// TF-IDF, degrading to keyword overlap when the vocabulary is empty.
    Auto,
    /// Always use keyword overlap.
    Keyword,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    pub strategy: StrategyChoice,
    pub max_features: usize,
    pub min_df: usize,
    pub max_df: f64,
    pub sublinear_tf: bool,
    pub extra_stop_words: Vec<String>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyChoice::Auto,
            max_features: 1000,
            min_df: 1,
            max_df: 0.85,
            sublinear_tf: false,
            extra_stop_words: Vec::new(),
        }
    }
}

impl IndexConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_features == 0 {
            return Err(Error::InvalidConfig("index.max_features must be at least 1".into()));
        }
        if self.min_df == 0 {
            return Err(Error::InvalidConfig("index.min_df must be at least 1".into()));
        }
        if !(self.max_df > 0.0 && self.max_df <= 1.0) {
            return Err(Error::InvalidConfig(format!("index.max_df must be in (0, 1], got {}", self.max_df)));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryKeywords {
    pub category: String,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub default_top_k: usize,
    pub max_top_k: usize,
    pub default_page_size: usize,
    pub max_page_size: usize,
    /// Hits must score strictly above this.
    pub min_score: f32,
    pub recommend_min_score: f32,
    pub around_tolerance: f64,
    pub infer_category: bool,
    pub require_price: bool,
    /// Checked in order; the first category with a keyword in the query wins.
    pub category_keywords: Vec<CategoryKeywords>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        let kw = |category: &str, words: &[&str]| CategoryKeywords {
            category: category.to_string(),
            keywords: words.iter().map(|w| w.to_string()).collect(),
        };
        Self {
            default_top_k: 10,
            max_top_k: 50,
            default_page_size: 10,
            max_page_size: 100,
            min_score: 0.0,
            recommend_min_score: 0.1,
            around_tolerance: DEFAULT_AROUND_TOLERANCE,
            infer_category: false,
            require_price: false,
            category_keywords: vec![
                kw("headphone", &["headphone", "headset", "earbud"]),
                kw("mobile", &["mobile", "smartphone", "phone"]),
                kw("laptop", &["laptop", "notebook", "pc"]),
            ],
        }
    }
}

impl Settings {
    pub fn validate_for_env(&self, env: &str) -> Result<()> {
        self.index.validate()?;
        let r = &self.retrieval;
        if r.max_top_k == 0 || r.max_page_size == 0 {
            return Err(Error::InvalidConfig("retrieval limits must be at least 1".into()));
        }
        if !(0.0..1.0).contains(&r.around_tolerance) {
            return Err(Error::InvalidConfig(format!("retrieval.around_tolerance must be in [0, 1), got {}", r.around_tolerance)));
        }
        match env {
            "prod" | "production" => {
                if self.data.persist_dir.trim().is_empty() {
                    return Err(Error::InvalidConfig("prod config requires data.persist_dir for warm restarts".into()));
                }
            }
            "dev" | "development" => {}
            "test" | "testing" => {}
            _ => {}
        }
        Ok(())
    }

    pub fn catalog_dir(&self, base: &Path) -> PathBuf { resolve_with_base(base, &self.data.catalog_dir) }

    pub fn persist_dir(&self, base: &Path) -> Option<PathBuf> {
        let dir = self.data.persist_dir.trim();
        (!dir.is_empty()).then(|| resolve_with_base(base, dir))
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn defaults_validate_in_every_env() {
        let settings = Settings::default();
        for env in ["dev", "prod", "test", "staging"] {
            assert!(settings.validate_for_env(env).is_ok(), "{env}");
        }
    }

    #[test]
    fn files_and_env_are_layered() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                r#"
                    [data]
                    catalog_dir = "catalog"
                    format = "csv"
                    categories = ["mobile"]

                    [index]
                    max_features = 200
                "#,
            )?;
            jail.create_file("config.test.toml", "[index]\nmin_df = 2\n")?;
            jail.set_env("SHOPDB_INDEX__MAX_DF", "0.5");

            let config = Config::load_for_env(Some("test")).map_err(|e| e.to_string())?;
            let settings = config.settings().map_err(|e| e.to_string())?;
            assert_eq!(settings.data.catalog_dir, "catalog");
            assert_eq!(settings.data.format, CatalogFormat::Csv);
            assert_eq!(settings.data.categories, vec!["mobile".to_string()]);
            assert_eq!(settings.index.max_features, 200);
            assert_eq!(settings.index.min_df, 2);
            assert_eq!(settings.index.max_df, 0.5);
            // untouched keys keep their defaults
            assert_eq!(settings.retrieval.max_top_k, 50);
            let k: usize = config.get("index.max_features").map_err(|e| e.to_string())?;
            assert_eq!(k, 200);
            Ok(())
        });
    }

    #[test]
    fn env_specific_file_is_only_read_for_its_env() {
        Jail::expect_with(|jail| {
            jail.create_file("config.prod.toml", "[index]\nmax_features = 7\n")?;
            let dev = Config::load_for_env(Some("dev")).map_err(|e| e.to_string())?;
            assert_eq!(dev.settings().map_err(|e| e.to_string())?.index.max_features, 1000);
            let prod = Config::load_for_env(Some("prod")).map_err(|e| e.to_string())?;
            assert_eq!(prod.settings().map_err(|e| e.to_string())?.index.max_features, 7);
            Ok(())
        });
    }

    #[test]
    fn invalid_thresholds_are_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", "[index]\nmax_df = 1.5\n")?;
            assert!(matches!(Config::load_for_env(Some("dev")), Err(Error::InvalidConfig(_))));
            Ok(())
        });
    }

    #[test]
    fn prod_requires_persist_dir() {
        let mut settings = Settings::default();
        settings.data.persist_dir = String::new();
        assert!(settings.validate_for_env("prod").is_err());
        assert!(settings.validate_for_env("dev").is_ok());
        assert_eq!(settings.persist_dir(Path::new("/srv")), None);
    }

    #[test]
    fn relative_paths_resolve_against_base() {
        let settings = Settings::default();
        assert_eq!(settings.catalog_dir(Path::new("/srv/shop")), PathBuf::from("/srv/shop/data/catalog"));
        assert_eq!(resolve_with_base(Path::new("/srv"), "/abs/dir"), PathBuf::from("/abs/dir"));
    }
}
