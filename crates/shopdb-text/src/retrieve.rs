//! Ranking, filtering and slicing over a scored corpus.
//!
//! Scores are always computed for the whole corpus first; price and category
//! only narrow the candidate list afterwards.

use std::cmp::Ordering;
use tracing::debug;

use shopdb_core::config::{CategoryKeywords, RetrievalConfig};
use shopdb_core::price::{PriceConstraint, PriceParser};
use shopdb_core::traits::Scorer;
use shopdb_core::types::{MetadataEntry, Page, RankedHit};

use crate::index::IndexGeneration;

/// Per-request knobs. Anything left `None` falls back to the query text or
/// the configured defaults.
#[derive(Debug, Clone, Default)]
pub struct RetrieveOptions {
    pub category: Option<String>,
    pub price: Option<PriceConstraint>,
    pub infer_category: Option<bool>,
    pub require_price: Option<bool>,
    pub min_score: Option<f32>,
}

impl RetrieveOptions {
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn price(mut self, price: PriceConstraint) -> Self {
        self.price = Some(price);
        self
    }
}

/// All hits for `query`, filtered and sorted, before any truncation.
pub fn rank(gen: &IndexGeneration, query: &str, opts: &RetrieveOptions, config: &RetrievalConfig) -> Vec<RankedHit> {
    let query = query.trim();
    if query.is_empty() || gen.is_empty() {
        return Vec::new();
    }

    let price = opts.price.unwrap_or_else(|| PriceParser::new(config.around_tolerance).parse(query));
    let category = opts.category.clone().or_else(|| {
        opts.infer_category
            .unwrap_or(config.infer_category)
            .then(|| infer_category(query, &config.category_keywords))
            .flatten()
    });
    let require_price = opts.require_price.unwrap_or(config.require_price) && !price.is_unbounded();
    let min_score = opts.min_score.unwrap_or(config.min_score).max(0.0);

    let scores = gen.strategy().score_all(query);
    let metadata = &gen.corpus().metadata;
    let mut hits: Vec<(usize, f32)> = scores
        .into_iter()
        .enumerate()
        .filter(|(_, score)| *score > min_score)
        .filter(|(i, _)| accepts(&metadata[*i], category.as_deref(), &price, require_price))
        .collect();
    hits.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal).then(a.0.cmp(&b.0)));

    debug!(query, ?category, min_price = price.min_price, max_price = price.max_price, hits = hits.len(), scorer = ?gen.kind(), "ranked");
    let kind = gen.kind();
    hits.into_iter()
        .map(|(doc_index, score)| RankedHit { doc_index, score, meta: metadata[doc_index].clone(), source: kind })
        .collect()
}

fn accepts(meta: &MetadataEntry, category: Option<&str>, price: &PriceConstraint, require_price: bool) -> bool {
    if category.is_some_and(|c| meta.category != c) {
        return false;
    }
    match meta.price {
        Some(p) => price.contains(p),
        None => !require_price,
    }
}

/// Best `top_k` hits.
pub fn top_k(gen: &IndexGeneration, query: &str, k: usize, opts: &RetrieveOptions, config: &RetrievalConfig) -> Vec<RankedHit> {
    let mut hits = rank(gen, query, opts, config);
    hits.truncate(k);
    hits
}

/// 1-based page of the same list `top_k` truncates.
pub fn paginate(hits: Vec<RankedHit>, page: usize, page_size: usize) -> Page {
    let page = page.max(1);
    let page_size = page_size.max(1);
    let total = hits.len();
    let total_pages = total.div_ceil(page_size);
    let hits = hits.into_iter().skip((page - 1).saturating_mul(page_size)).take(page_size).collect();
    Page { hits, total, page, page_size, total_pages }
}

/// First configured category with a keyword occurring in the query.
pub fn infer_category(query: &str, table: &[CategoryKeywords]) -> Option<String> {
    let query = query.to_lowercase();
    table
        .iter()
        .find(|entry| entry.keywords.iter().any(|k| !k.is_empty() && query.contains(&k.to_lowercase())))
        .map(|entry| entry.category.clone())
}

/// Items similar to `title`, without the item the title names.
pub fn recommend(gen: &IndexGeneration, title: &str, top_n: usize, config: &RetrievalConfig) -> Vec<RankedHit> {
    let title = title.trim();
    if title.is_empty() || gen.is_empty() {
        return Vec::new();
    }
    let lowered = title.to_lowercase();
    let metadata = &gen.corpus().metadata;
    let source = metadata.iter().position(|m| {
        ["name", "model", "title"].iter().any(|field| {
            m.record
                .get(field)
                .and_then(|v| v.as_text())
                .is_some_and(|v| lowered.contains(&v.to_lowercase()))
        })
    });

    let threshold = config.recommend_min_score.max(0.0);
    let mut hits: Vec<(usize, f32)> = gen
        .strategy()
        .score_all(title)
        .into_iter()
        .enumerate()
        .filter(|(i, score)| Some(*i) != source && *score > threshold)
        .collect();
    hits.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal).then(a.0.cmp(&b.0)));
    hits.truncate(top_n);
    let kind = gen.kind();
    hits.into_iter()
        .map(|(doc_index, score)| RankedHit { doc_index, score, meta: metadata[doc_index].clone(), source: kind })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use shopdb_core::config::{CorpusConfig, IndexConfig, StrategyChoice};
    use shopdb_core::corpus::{build_corpus, CategoryRecords};
    use shopdb_core::types::{ProductRecord, ScorerKind};

    fn product(brand: &str, model: &str, price: Option<f64>) -> ProductRecord {
        let rec = ProductRecord::new().with("brand", brand).with("model", model);
        match price {
            Some(p) => rec.with("price", p),
            None => rec,
        }
    }

    fn generation(config: &IndexConfig) -> IndexGeneration {
        let groups = vec![
            CategoryRecords::new(
                "laptop",
                vec![
                    product("Dell", "Inspiron gaming laptop", Some(45000.0)),
                    product("HP", "Pavilion gaming laptop", Some(65000.0)),
                    product("Lenovo", "IdeaPad office laptop", None),
                    product("Asus", "ROG gaming beast", Some(150000.0)),
                ],
            ),
            CategoryRecords::new(
                "mobile",
                vec![
                    product("Samsung", "Galaxy gaming phone", Some(30000.0)),
                    product("Apple", "iPhone 15", Some(79999.0)),
                ],
            ),
            CategoryRecords::new("headphone", vec![product("Sony", "WH-1000XM5 wireless", Some(29990.0))]),
        ];
        let corpus = build_corpus(&groups, &CorpusConfig::default());
        IndexGeneration::build(corpus, config, 1).unwrap()
    }

    fn indices(hits: &[RankedHit]) -> Vec<usize> { hits.iter().map(|h| h.doc_index).collect() }

    #[test]
    fn hits_are_sorted_and_zero_scores_dropped() {
        let gen = generation(&IndexConfig::default());
        let hits = rank(&gen, "gaming laptop", &RetrieveOptions::default(), &RetrievalConfig::default());
        assert!(!hits.is_empty());
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
        assert!(hits.iter().all(|h| h.score > 0.0 && h.score <= 1.0));
        assert!(!indices(&hits).contains(&5));
        assert_eq!(hits[0].source, ScorerKind::TfIdf);
    }

    #[test]
    fn price_parsed_from_query_filters_after_scoring() {
        let gen = generation(&IndexConfig::default());
        let hits = rank(&gen, "gaming laptop under 50000", &RetrieveOptions::default(), &RetrievalConfig::default());
        for hit in &hits {
            if let Some(p) = hit.meta.price {
                assert!(p <= 50000.0);
            }
        }
        assert!(indices(&hits).contains(&0));
        assert!(!indices(&hits).contains(&1));
        assert!(!indices(&hits).contains(&3));
    }

    #[test]
    fn unpriced_items_survive_unless_required() {
        let gen = generation(&IndexConfig::default());
        let config = RetrievalConfig::default();
        let hits = rank(&gen, "office laptop under 50000", &RetrieveOptions::default(), &config);
        assert!(indices(&hits).contains(&2));
        let strict = RetrieveOptions { require_price: Some(true), ..RetrieveOptions::default() };
        assert!(!indices(&rank(&gen, "office laptop under 50000", &strict, &config)).contains(&2));
        // no active bound, nothing to require
        assert!(indices(&rank(&gen, "office laptop", &strict, &config)).contains(&2));
    }

    #[test]
    fn explicit_filters_override_the_query() {
        let gen = generation(&IndexConfig::default());
        let opts = RetrieveOptions::default().category("mobile").price(PriceConstraint::new(Some(20000.0), Some(40000.0)));
        let hits = rank(&gen, "gaming under 1000", &opts, &RetrievalConfig::default());
        assert_eq!(indices(&hits), vec![4]);
        assert!(hits.iter().all(|h| h.meta.category == "mobile"));
    }

    #[test]
    fn category_can_be_inferred_from_keywords() {
        let gen = generation(&IndexConfig::default());
        let opts = RetrieveOptions { infer_category: Some(true), ..RetrieveOptions::default() };
        let hits = rank(&gen, "gaming phone", &opts, &RetrievalConfig::default());
        assert_eq!(indices(&hits), vec![4]);
        let config = RetrievalConfig::default();
        assert_eq!(infer_category("noise cancelling headset", &config.category_keywords).as_deref(), Some("headphone"));
        assert_eq!(infer_category("gaming notebook", &config.category_keywords).as_deref(), Some("laptop"));
        assert_eq!(infer_category("smart watch", &config.category_keywords), None);
    }

    #[test]
    fn min_score_is_a_strict_floor() {
        let gen = generation(&IndexConfig::default());
        let all = rank(&gen, "gaming laptop", &RetrieveOptions::default(), &RetrievalConfig::default());
        let floor = all[1].score;
        let opts = RetrieveOptions { min_score: Some(floor), ..RetrieveOptions::default() };
        let high = rank(&gen, "gaming laptop", &opts, &RetrievalConfig::default());
        assert!(high.iter().all(|h| h.score > floor));
        assert!(high.len() < all.len());
    }

    #[test]
    fn stop_word_and_blank_queries_return_nothing() {
        let gen = generation(&IndexConfig::default());
        let config = RetrievalConfig::default();
        assert!(rank(&gen, "the and of", &RetrieveOptions::default(), &config).is_empty());
        assert!(rank(&gen, "   ", &RetrieveOptions::default(), &config).is_empty());
        assert!(rank(&gen, "zzzz", &RetrieveOptions::default(), &config).is_empty());
    }

    #[test]
    fn keyword_fallback_honors_the_same_contract() {
        let forced = IndexConfig { strategy: StrategyChoice::Keyword, ..IndexConfig::default() };
        let gen = generation(&forced);
        let opts = RetrieveOptions::default().category("laptop").price(PriceConstraint::new(None, Some(70000.0)));
        let hits = rank(&gen, "gaming laptop", &opts, &RetrievalConfig::default());
        // Dell and HP match both tokens, Lenovo one; ROG is over budget
        assert_eq!(indices(&hits), vec![0, 1, 2]);
        assert_eq!(hits[2].score, 0.5);
        assert_eq!(hits[0].score, 1.0);
        assert_eq!(hits[0].source, ScorerKind::Keyword);
        assert!(!indices(&hits).contains(&4));
    }

    /// 25 widgets, 10 gizmos and one widget-gizmo combo at index 35.
    fn widgets(config: &IndexConfig) -> IndexGeneration {
        let records = (0..25).map(|i| ProductRecord::new().with("name", format!("widget model{i}"))).collect();
        let mut others: Vec<ProductRecord> = (0..10).map(|i| ProductRecord::new().with("name", format!("gizmo part{i}"))).collect();
        others.push(ProductRecord::new().with("name", "widget gizmo combo"));
        let groups = vec![CategoryRecords::new("misc", records), CategoryRecords::new("other", others)];
        let corpus = build_corpus(&groups, &CorpusConfig::default());
        IndexGeneration::build(corpus, config, 1).unwrap()
    }

    #[test]
    fn pages_slice_the_ranked_list() {
        let gen = widgets(&IndexConfig::default());
        let config = RetrievalConfig::default();
        let opts = RetrieveOptions::default().category("misc");

        let all = rank(&gen, "widget", &opts, &config);
        assert_eq!(all.len(), 25);
        let page = paginate(all.clone(), 2, 10);
        assert_eq!(page.total, 25);
        assert_eq!(page.total_pages, 3);
        assert_eq!(indices(&page.hits), indices(&all[10..20]));
        assert_eq!(paginate(all.clone(), 3, 10).hits.len(), 5);
        assert!(paginate(all.clone(), 4, 10).hits.is_empty());
        assert_eq!(indices(&top_k(&gen, "widget", 10, &opts, &config)), indices(&all[..10]));
    }

    #[test]
    fn keyword_pages_slice_the_same_way() {
        let forced = IndexConfig { strategy: StrategyChoice::Keyword, ..IndexConfig::default() };
        let gen = widgets(&forced);
        let config = RetrievalConfig::default();
        let opts = RetrieveOptions::default();

        // the combo matches both tokens, every other doc one of them
        let all = rank(&gen, "widget gizmo", &opts, &config);
        assert_eq!(all.len(), 36);
        assert_eq!(all[0].doc_index, 35);
        assert_eq!(all[0].score, 1.0);
        assert!(all[1..].iter().all(|h| h.score == 0.5 && h.source == ScorerKind::Keyword));

        let page = paginate(all.clone(), 2, 10);
        assert_eq!(page.total, 36);
        assert_eq!(page.total_pages, 4);
        assert_eq!(indices(&page.hits), (9..19).collect::<Vec<_>>());
        assert_eq!(indices(&page.hits), indices(&all[10..20]));
        assert_eq!(paginate(all.clone(), 4, 10).hits.len(), 6);
        assert_eq!(indices(&top_k(&gen, "widget gizmo", 10, &opts, &config)), indices(&all[..10]));
    }

    #[test]
    fn recommend_excludes_the_source_item() {
        let gen = generation(&IndexConfig::default());
        let hits = recommend(&gen, "Inspiron gaming laptop", 3, &RetrievalConfig::default());
        assert!(!hits.is_empty());
        assert!(!indices(&hits).contains(&0));
        assert!(hits.iter().all(|h| h.score > 0.1));
        assert_eq!(hits[0].doc_index, 1);
        assert!(recommend(&gen, "", 3, &RetrievalConfig::default()).is_empty());
    }
}
