use anyhow::{Context, Result};
use std::path::PathBuf;
use tokio::sync::watch;
use tracing::warn;

use crate::models::WatchedMovie;

// Recomputed on demand; nothing here is stored separately.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WatchedSummary {
    pub count: usize,
    pub avg_imdb_rating: f64,
    pub avg_user_rating: f64,
    pub avg_runtime: f64,
}

// Ordered watched collection, mirrored wholesale to a single JSON file
// after every mutation. Duplicate identifiers are allowed: adding the
// same movie twice stores it twice.
pub struct WatchedListStore {
    path: PathBuf,
    movies: Vec<WatchedMovie>,
    change_tx: watch::Sender<Vec<WatchedMovie>>,
}

impl WatchedListStore {
    // An absent or unparsable file yields an empty collection.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let movies = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<Vec<WatchedMovie>>(&content) {
                Ok(movies) => movies,
                Err(e) => {
                    warn!(
                        "Watched list at {} is corrupt ({}), starting empty",
                        path.display(),
                        e
                    );
                    Vec::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                warn!(
                    "Failed to read watched list at {} ({}), starting empty",
                    path.display(),
                    e
                );
                Vec::new()
            }
        };
        let (change_tx, _) = watch::channel(movies.clone());
        Self {
            path,
            movies,
            change_tx,
        }
    }

    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("popcorn")
            .join("watched.json")
    }

    pub fn movies(&self) -> &[WatchedMovie] {
        &self.movies
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<WatchedMovie>> {
        self.change_tx.subscribe()
    }

    pub fn user_rating_for(&self, imdb_id: &str) -> Option<u32> {
        self.movies
            .iter()
            .find(|m| m.imdb_id == imdb_id)
            .map(|m| m.user_rating)
    }

    // No uniqueness check; persists before returning.
    pub fn add(&mut self, movie: WatchedMovie) -> Result<()> {
        self.movies.push(movie);
        self.persist()
    }

    // Removes every matching entry; an absent id is a no-op.
    pub fn remove(&mut self, imdb_id: &str) -> Result<()> {
        self.movies.retain(|m| m.imdb_id != imdb_id);
        self.persist()
    }

    pub fn summary(&self) -> WatchedSummary {
        WatchedSummary {
            count: self.movies.len(),
            avg_imdb_rating: average(self.movies.iter().map(|m| m.imdb_rating)),
            avg_user_rating: average(self.movies.iter().map(|m| f64::from(m.user_rating))),
            avg_runtime: average(self.movies.iter().map(|m| f64::from(m.runtime))),
        }
    }

    fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let json =
            serde_json::to_string_pretty(&self.movies).context("serializing watched list")?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("writing {}", self.path.display()))?;
        self.change_tx.send_replace(self.movies.clone());
        Ok(())
    }
}

// Each element is divided by the length and the quotients summed, so an
// empty input sums to 0 without ever dividing by a zero count.
fn average<I>(values: I) -> f64
where
    I: ExactSizeIterator<Item = f64>,
{
    let len = values.len() as f64;
    values.map(|v| v / len).sum()
}
