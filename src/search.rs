use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

use crate::models::MovieSummary;
use crate::omdb::OmdbApi;

// Queries shorter than this (after trimming) never reach the network.
pub const MIN_QUERY_LEN: usize = 3;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum SearchResult {
    #[default]
    Idle,
    Loading,
    Loaded(Vec<MovieSummary>),
    Failed(String),
}

pub fn qualifies(query: &str) -> bool {
    query.trim().chars().count() >= MIN_QUERY_LEN
}

/// Issues search lookups and guarantees that only the latest one's outcome
/// is ever applied: each lookup captures the generation counter at issue
/// time, and on completion the counter is re-checked inside the channel's
/// critical section, so a superseded lookup can never publish after a
/// newer one. Last write wins by issue order, not completion order.
pub struct SearchController {
    api: Arc<dyn OmdbApi>,
    generation: Arc<AtomicU64>,
    result_tx: Arc<watch::Sender<SearchResult>>,
}

impl SearchController {
    pub fn new(api: Arc<dyn OmdbApi>) -> Self {
        let (result_tx, _) = watch::channel(SearchResult::Idle);
        Self {
            api,
            generation: Arc::new(AtomicU64::new(0)),
            result_tx: Arc::new(result_tx),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchResult> {
        self.result_tx.subscribe()
    }

    pub fn result(&self) -> SearchResult {
        self.result_tx.borrow().clone()
    }

    // Schedules a lookup cycle for a new query value; returns true when a
    // network lookup was actually issued. Bumping the generation first
    // invalidates any still-pending lookup, including when the new query
    // is too short to trigger one.
    pub fn set_query(&self, query: &str) -> bool {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let term = query.trim().to_string();
        if term.chars().count() < MIN_QUERY_LEN {
            self.result_tx.send_replace(SearchResult::Loaded(Vec::new()));
            return false;
        }

        self.result_tx.send_replace(SearchResult::Loading);
        let api = Arc::clone(&self.api);
        let current = Arc::clone(&self.generation);
        let result_tx = Arc::clone(&self.result_tx);
        tokio::spawn(async move {
            let outcome = api.search(&term).await;
            let next = match outcome {
                Ok(movies) => SearchResult::Loaded(movies),
                Err(e) => SearchResult::Failed(e.to_string()),
            };
            // The generation re-check and the publication happen inside
            // one send_if_modified so no newer lookup can be issued (and
            // publish) between them.
            let applied = result_tx.send_if_modified(|slot| {
                if current.load(Ordering::SeqCst) != generation {
                    return false;
                }
                *slot = next;
                true
            });
            if !applied {
                debug!("Discarding superseded lookup for '{}'", term);
            }
        });
        true
    }
}
