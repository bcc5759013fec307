use std::sync::Arc;
use tokio::sync::watch;
use tracing::warn;

use crate::models::MovieDetail;
use crate::omdb::OmdbApi;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DetailState {
    pub loading: bool,
    pub detail: Option<MovieDetail>,
}

/// Fetches the full record for a selected identifier. Unlike the search
/// path there is no supersede check here: completions apply in arrival
/// order, so a slow fetch for an earlier selection can land after a newer
/// one. Callers relying on selection/detail agreement must check the ids.
pub struct MovieDetailLoader {
    api: Arc<dyn OmdbApi>,
    state_tx: Arc<watch::Sender<DetailState>>,
}

impl MovieDetailLoader {
    pub fn new(api: Arc<dyn OmdbApi>) -> Self {
        let (state_tx, _) = watch::channel(DetailState::default());
        Self {
            api,
            state_tx: Arc::new(state_tx),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<DetailState> {
        self.state_tx.subscribe()
    }

    pub fn state(&self) -> DetailState {
        self.state_tx.borrow().clone()
    }

    pub fn load(&self, imdb_id: &str) {
        self.state_tx.send_modify(|s| s.loading = true);
        let api = Arc::clone(&self.api);
        let state_tx = Arc::clone(&self.state_tx);
        let id = imdb_id.to_string();
        tokio::spawn(async move {
            match api.lookup(&id).await {
                Ok(detail) => {
                    state_tx.send_replace(DetailState {
                        loading: false,
                        detail: Some(detail),
                    });
                }
                Err(e) => {
                    // The detail path has no error state; the record is
                    // left as it was.
                    warn!("Failed to fetch detail for {}: {}", id, e);
                    state_tx.send_modify(|s| s.loading = false);
                }
            }
        });
    }

    pub fn clear(&self) {
        self.state_tx.send_replace(DetailState::default());
    }
}
