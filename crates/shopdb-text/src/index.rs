use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use shopdb_core::config::{IndexConfig, StrategyChoice};
use shopdb_core::corpus::Corpus;
use shopdb_core::error::{Error, Result};
use shopdb_core::traits::Scorer;
use shopdb_core::types::ScorerKind;

use crate::analyzer::Analyzer;
use crate::keyword::KeywordMatcher;
use crate::tfidf::TfIdfIndex;

/// Scorer chosen once when a generation is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScoringStrategy {
    TfIdf(TfIdfIndex),
    Keyword(KeywordMatcher),
}

impl ScoringStrategy {
    /// TF-IDF unless the vocabulary comes out empty or keyword scoring is
    /// forced by configuration.
    pub fn build(documents: &[String], config: &IndexConfig) -> Result<Self> {
        let analyzer = Analyzer::new(config.extra_stop_words.clone());
        if config.strategy == StrategyChoice::Keyword {
            return Ok(Self::Keyword(KeywordMatcher::new(documents, analyzer)));
        }
        let index = TfIdfIndex::build(documents, config)?;
        if index.is_empty() {
            warn!(documents = documents.len(), "empty tf-idf vocabulary; using keyword matcher");
            return Ok(Self::Keyword(KeywordMatcher::new(documents, analyzer)));
        }
        Ok(Self::TfIdf(index))
    }

    pub fn vocabulary_len(&self) -> usize {
        match self {
            Self::TfIdf(index) => index.vocabulary().len(),
            Self::Keyword(_) => 0,
        }
    }

    fn scorer(&self) -> &dyn Scorer {
        match self {
            Self::TfIdf(index) => index,
            Self::Keyword(matcher) => matcher,
        }
    }
}

impl Scorer for ScoringStrategy {
    fn kind(&self) -> ScorerKind { self.scorer().kind() }

    fn doc_count(&self) -> usize { self.scorer().doc_count() }

    fn score_all(&self, query: &str) -> Vec<f32> { self.scorer().score_all(query) }
}

/// Documents, metadata and scorer of one build, replaced together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexGeneration {
    generation: u64,
    fingerprint: u64,
    config: IndexConfig,
    corpus: Corpus,
    strategy: ScoringStrategy,
}

impl IndexGeneration {
    pub fn build(corpus: Corpus, config: &IndexConfig, generation: u64) -> Result<Self> {
        if corpus.documents.len() != corpus.metadata.len() {
            return Err(Error::IndexBuild(format!(
                "{} documents but {} metadata entries",
                corpus.documents.len(),
                corpus.metadata.len()
            )));
        }
        let strategy = ScoringStrategy::build(&corpus.documents, config)?;
        Self::assemble(corpus, config, strategy, generation)
    }

    /// Keyword-only generation, for when the TF-IDF build itself failed.
    pub fn keyword_only(corpus: Corpus, config: &IndexConfig, generation: u64) -> Result<Self> {
        let analyzer = Analyzer::new(config.extra_stop_words.clone());
        let strategy = ScoringStrategy::Keyword(KeywordMatcher::new(&corpus.documents, analyzer));
        Self::assemble(corpus, config, strategy, generation)
    }

    fn assemble(corpus: Corpus, config: &IndexConfig, strategy: ScoringStrategy, generation: u64) -> Result<Self> {
        if strategy.doc_count() != corpus.len() {
            return Err(Error::IndexBuild(format!("scorer covers {} of {} documents", strategy.doc_count(), corpus.len())));
        }
        let generation = Self { generation, fingerprint: corpus.fingerprint(), config: config.clone(), corpus, strategy };
        info!(
            generation = generation.generation,
            documents = generation.len(),
            vocabulary = generation.vocabulary_len(),
            strategy = ?generation.kind(),
            "index generation built"
        );
        Ok(generation)
    }

    /// Checks a deserialized generation before it is served.
    pub fn verify(&self) -> Result<()> {
        if self.corpus.documents.len() != self.corpus.metadata.len() || self.strategy.doc_count() != self.corpus.len() {
            return Err(Error::IndexBuild("snapshot is misaligned".into()));
        }
        Ok(())
    }

    /// True when this generation was built from the same corpus and settings.
    pub fn matches(&self, fingerprint: u64, config: &IndexConfig) -> bool {
        self.fingerprint == fingerprint && &self.config == config
    }

    pub fn generation(&self) -> u64 { self.generation }

    pub fn fingerprint(&self) -> u64 { self.fingerprint }

    pub fn config(&self) -> &IndexConfig { &self.config }

    pub fn corpus(&self) -> &Corpus { &self.corpus }

    pub fn strategy(&self) -> &ScoringStrategy { &self.strategy }

    pub fn kind(&self) -> ScorerKind { self.strategy.kind() }

    pub fn len(&self) -> usize { self.corpus.len() }

    pub fn is_empty(&self) -> bool { self.corpus.is_empty() }

    pub fn vocabulary_len(&self) -> usize { self.strategy.vocabulary_len() }
}

/// Builds the scorer for `documents`, TF-IDF when possible.
pub fn build_index(documents: &[String], config: &IndexConfig) -> Result<ScoringStrategy> {
    ScoringStrategy::build(documents, config)
}
