//! The served catalog index: warm start, rebuild and atomic swap.
//!
//! Readers clone the current `Arc<IndexGeneration>` under a short read lock
//! and work on that snapshot for the whole request. Rebuilds happen off to the
//! side under `rebuild_lock` and are published with one pointer assignment.

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use shopdb_core::config::Settings;
use shopdb_core::corpus::{build_corpus, Corpus};
use shopdb_core::error::{Error, Result};
use shopdb_core::records::load_all;
use shopdb_core::traits::RecordSource;
use shopdb_core::types::{Page, RankedHit, ScorerKind};

use crate::index::IndexGeneration;
use crate::retrieve::{self, RetrieveOptions};
use crate::store::IndexStore;

/// Where the installed generation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// Freshly built from the record source.
    Built,
    /// Loaded from a matching snapshot.
    Restored,
    /// TF-IDF build failed; keyword matcher over the fresh corpus.
    Degraded,
}

#[derive(Debug, Clone, Serialize)]
pub struct RebuildReport {
    pub generation: u64,
    pub documents: usize,
    pub vocabulary: usize,
    pub strategy: ScorerKind,
    pub origin: Origin,
}

impl RebuildReport {
    fn new(gen: &IndexGeneration, origin: Origin) -> Self {
        Self { generation: gen.generation(), documents: gen.len(), vocabulary: gen.vocabulary_len(), strategy: gen.kind(), origin }
    }
}

pub struct CatalogSearch {
    settings: Settings,
    source: Box<dyn RecordSource>,
    store: Option<Box<dyn IndexStore>>,
    current: RwLock<Option<Arc<IndexGeneration>>>,
    rebuild_lock: Mutex<()>,
    next_generation: AtomicU64,
}

impl CatalogSearch {
    pub fn new(settings: Settings, source: Box<dyn RecordSource>) -> Self {
        Self {
            settings,
            source,
            store: None,
            current: RwLock::new(None),
            rebuild_lock: Mutex::new(()),
            next_generation: AtomicU64::new(1),
        }
    }

    pub fn with_store(mut self, store: Box<dyn IndexStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn settings(&self) -> &Settings { &self.settings }

    /// Installs a first generation: a matching snapshot if there is one,
    /// otherwise a fresh build. Errors only when nothing can be served.
    pub fn open(&self) -> Result<RebuildReport> {
        let _guard = self.rebuild_lock.try_lock().ok_or(Error::RebuildInProgress)?;

        let snapshot = match &self.store {
            Some(store) => store.load_index().unwrap_or_else(|e| {
                warn!(error = %e, "ignoring unreadable index snapshot");
                None
            }),
            None => None,
        };

        let (corpus, snapshot) = match (self.load_corpus(), snapshot) {
            (Ok(corpus), snapshot) => (corpus, snapshot),
            (Err(e), Some(snapshot)) => {
                warn!(error = %e, "record source failed; serving last snapshot");
                return Ok(self.restore(snapshot));
            }
            (Err(e), None) => (empty_if_unavailable(e)?, None),
        };

        if let Some(snapshot) = snapshot {
            if snapshot.matches(corpus.fingerprint(), &self.settings.index) {
                return Ok(self.restore(snapshot));
            }
            info!(generation = snapshot.generation(), "index snapshot is stale; rebuilding");
            self.next_generation.fetch_max(snapshot.generation() + 1, Ordering::SeqCst);
        }

        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        match IndexGeneration::build(corpus.clone(), &self.settings.index, generation) {
            Ok(built) => Ok(self.install(built, Origin::Built)),
            Err(e) => {
                warn!(error = %e, "tf-idf build failed; serving keyword matcher");
                let fallback = IndexGeneration::keyword_only(corpus, &self.settings.index, generation)?;
                Ok(self.install(fallback, Origin::Degraded))
            }
        }
    }

    /// Rebuilds from the record source and swaps the result in. On failure
    /// the served generation is left as it was.
    pub fn rebuild(&self) -> Result<RebuildReport> {
        let _guard = self.rebuild_lock.try_lock().ok_or(Error::RebuildInProgress)?;
        let corpus = self
            .load_corpus()
            .or_else(empty_if_unavailable)
            .inspect_err(|e| warn!(error = %e, "rebuild failed loading records"))?;
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        let built = IndexGeneration::build(corpus, &self.settings.index, generation)
            .inspect_err(|e| warn!(error = %e, "rebuild failed; keeping current index"))?;
        Ok(self.install(built, Origin::Built))
    }

    fn load_corpus(&self) -> Result<Corpus> {
        let groups = load_all(self.source.as_ref())?;
        Ok(build_corpus(&groups, &self.settings.corpus))
    }

    fn restore(&self, snapshot: IndexGeneration) -> RebuildReport {
        self.next_generation.fetch_max(snapshot.generation() + 1, Ordering::SeqCst);
        info!(generation = snapshot.generation(), documents = snapshot.len(), "index restored from snapshot");
        let report = RebuildReport::new(&snapshot, Origin::Restored);
        *self.current.write() = Some(Arc::new(snapshot));
        report
    }

    fn install(&self, gen: IndexGeneration, origin: Origin) -> RebuildReport {
        let report = RebuildReport::new(&gen, origin);
        let gen = Arc::new(gen);
        if let Some(store) = &self.store {
            if let Err(e) = store.save_index(&gen) {
                warn!(error = %e, generation = report.generation, "failed to persist index snapshot");
            }
        }
        *self.current.write() = Some(gen);
        info!(generation = report.generation, documents = report.documents, strategy = ?report.strategy, ?origin, "index installed");
        report
    }

    /// The generation requests should run against, if any.
    pub fn current(&self) -> Option<Arc<IndexGeneration>> { self.current.read().clone() }

    /// The installed generation, opening one first on a cold start. `None`
    /// while another thread holds the rebuild lock or when nothing can be
    /// served.
    fn serving(&self) -> Option<Arc<IndexGeneration>> {
        if let Some(gen) = self.current() {
            return Some(gen);
        }
        debug!("no index installed; opening on first request");
        match self.open() {
            Ok(_) | Err(Error::RebuildInProgress) => {}
            Err(e) => warn!(error = %e, "cold start failed; serving no results"),
        }
        self.current()
    }

    /// Top hits for `query`; `top_k` defaults to and is capped by configuration.
    pub fn retrieve(&self, query: &str, top_k: Option<usize>, opts: &RetrieveOptions) -> Vec<RankedHit> {
        let Some(gen) = self.serving() else {
            return Vec::new();
        };
        let cfg = &self.settings.retrieval;
        let k = top_k.unwrap_or(cfg.default_top_k).min(cfg.max_top_k);
        retrieve::top_k(&gen, query, k, opts, cfg)
    }

    /// 1-based page of hits for `query`.
    pub fn search_page(&self, query: &str, page: usize, page_size: Option<usize>, opts: &RetrieveOptions) -> Page {
        let cfg = &self.settings.retrieval;
        let page_size = page_size.unwrap_or(cfg.default_page_size).clamp(1, cfg.max_page_size);
        let hits = match self.serving() {
            Some(gen) => retrieve::rank(&gen, query, opts, cfg),
            None => Vec::new(),
        };
        retrieve::paginate(hits, page, page_size)
    }

    pub fn recommend(&self, title: &str, top_n: Option<usize>) -> Vec<RankedHit> {
        let Some(gen) = self.serving() else {
            return Vec::new();
        };
        let cfg = &self.settings.retrieval;
        let n = top_n.unwrap_or(cfg.default_top_k).min(cfg.max_top_k);
        retrieve::recommend(&gen, title, n, cfg)
    }
}

fn empty_if_unavailable(e: Error) -> Result<Corpus> {
    match e {
        Error::DataUnavailable(reason) => {
            warn!(%reason, "catalog unavailable; indexing an empty corpus");
            Ok(Corpus::default())
        }
        e => Err(e),
    }
}
