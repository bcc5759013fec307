use anyhow::{bail, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

use crate::detail::{DetailState, MovieDetailLoader};
use crate::models::WatchedMovie;
use crate::omdb::{self, OmdbApi};
use crate::search::{self, SearchController, SearchResult};
use crate::watched::{WatchedListStore, WatchedSummary};

pub const DEFAULT_TITLE: &str = "popcorn";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Enter,
    Escape,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    FocusSearch,
    CloseDetail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Focus {
    Search,
    #[default]
    Body,
}

#[derive(Debug, Clone, Copy, Default)]
struct PendingRating {
    rating: u32,
    decisions: u32,
}

// Top-level owner of the session state: query, selection, window title,
// key bindings, watched list. Rendering lives outside; a frontend
// subscribes to the watch channels and redraws on change.
pub struct Session {
    search: SearchController,
    detail: MovieDetailLoader,
    watched: Mutex<WatchedListStore>,
    query_tx: Arc<watch::Sender<String>>,
    selected_tx: Arc<watch::Sender<Option<String>>>,
    title_tx: Arc<watch::Sender<String>>,
    focus_tx: Arc<watch::Sender<Focus>>,
    bindings: Mutex<HashMap<Key, Action>>,
    pending: Mutex<PendingRating>,
}

impl Session {
    // Must run inside a tokio runtime (spawns the title follower). Enter
    // stays bound for the whole session since the search view never
    // unmounts; Escape is bound only while a detail is open.
    pub fn new(api: Arc<dyn OmdbApi>, store: WatchedListStore) -> Arc<Self> {
        let (query_tx, _) = watch::channel(String::new());
        let (selected_tx, _) = watch::channel(None);
        let (title_tx, _) = watch::channel(DEFAULT_TITLE.to_string());
        let (focus_tx, _) = watch::channel(Focus::default());
        let session = Arc::new(Self {
            search: SearchController::new(Arc::clone(&api)),
            detail: MovieDetailLoader::new(api),
            watched: Mutex::new(store),
            query_tx: Arc::new(query_tx),
            selected_tx: Arc::new(selected_tx),
            title_tx: Arc::new(title_tx),
            focus_tx: Arc::new(focus_tx),
            bindings: Mutex::new(HashMap::from([(Key::Enter, Action::FocusSearch)])),
            pending: Mutex::new(PendingRating::default()),
        });
        session.spawn_title_follower();
        session
    }

    // Keeps the window title at "Movie | {title}" while a detail view is
    // open. Reverting on close happens in close_detail so that every exit
    // path is covered.
    fn spawn_title_follower(self: &Arc<Self>) {
        let mut detail_rx = self.detail.subscribe();
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            while detail_rx.changed().await.is_ok() {
                let state = detail_rx.borrow_and_update().clone();
                let Some(session) = weak.upgrade() else { break };
                if let Some(detail) = state.detail.as_ref() {
                    if !state.loading {
                        // The selection is re-read inside the channel's
                        // critical section: close_detail clears it before
                        // resetting the title, so a late completion can
                        // never retitle an already-closed view.
                        session.title_tx.send_if_modified(|title| {
                            if session.selected().is_none() {
                                return false;
                            }
                            *title = format!("Movie | {}", detail.title);
                            true
                        });
                    }
                }
            }
        });
    }

    // Changing the search term always closes an open detail panel: a
    // qualifying query deselects before the lookup is issued.
    pub fn set_query(&self, query: &str) {
        self.query_tx.send_replace(query.to_string());
        if search::qualifies(query) {
            self.close_detail();
        }
        self.search.set_query(query);
    }

    pub fn query(&self) -> String {
        self.query_tx.borrow().clone()
    }

    pub fn search_result(&self) -> SearchResult {
        self.search.result()
    }

    pub fn subscribe_search(&self) -> watch::Receiver<SearchResult> {
        self.search.subscribe()
    }

    // Toggle: picking the already-selected movie closes it.
    pub fn select(&self, imdb_id: &str) {
        let already = self.selected().as_deref() == Some(imdb_id);
        if already {
            self.close_detail();
            return;
        }
        self.selected_tx.send_replace(Some(imdb_id.to_string()));
        *self.pending.lock().unwrap() = PendingRating::default();
        self.bindings
            .lock()
            .unwrap()
            .insert(Key::Escape, Action::CloseDetail);
        self.detail.load(imdb_id);
    }

    pub fn selected(&self) -> Option<String> {
        self.selected_tx.borrow().clone()
    }

    pub fn detail_state(&self) -> DetailState {
        self.detail.state()
    }

    pub fn subscribe_detail(&self) -> watch::Receiver<DetailState> {
        self.detail.subscribe()
    }

    // The single exit path for the detail view. Selection is cleared
    // before the title is reset; the title follower relies on that order.
    pub fn close_detail(&self) {
        self.selected_tx.send_replace(None);
        self.detail.clear();
        self.bindings.lock().unwrap().remove(&Key::Escape);
        self.title_tx.send_replace(DEFAULT_TITLE.to_string());
        *self.pending.lock().unwrap() = PendingRating::default();
    }

    // Every adjustment is counted, including re-rating to a new value.
    pub fn rate(&self, rating: u32) {
        let mut pending = self.pending.lock().unwrap();
        pending.rating = rating.clamp(1, 10);
        pending.decisions += 1;
    }

    pub fn add_watched(&self) -> Result<()> {
        let state = self.detail.state();
        let Some(detail) = state.detail else {
            bail!("no movie detail loaded");
        };
        let pending = *self.pending.lock().unwrap();
        if pending.rating == 0 {
            bail!("rate the movie before adding it");
        }
        let movie = WatchedMovie {
            imdb_id: detail.imdb_id.clone(),
            title: detail.title.clone(),
            year: detail.year.clone(),
            poster: detail.poster.clone(),
            imdb_rating: detail.imdb_rating.parse().unwrap_or(0.0),
            runtime: omdb::parse_runtime_minutes(&detail.runtime).unwrap_or(0),
            user_rating: pending.rating,
            rating_decisions: pending.decisions,
        };
        self.watched.lock().unwrap().add(movie)?;
        self.close_detail();
        Ok(())
    }

    pub fn remove_watched(&self, imdb_id: &str) -> Result<()> {
        self.watched.lock().unwrap().remove(imdb_id)
    }

    pub fn watched_movies(&self) -> Vec<WatchedMovie> {
        self.watched.lock().unwrap().movies().to_vec()
    }

    pub fn watched_summary(&self) -> WatchedSummary {
        self.watched.lock().unwrap().summary()
    }

    pub fn subscribe_watched(&self) -> watch::Receiver<Vec<WatchedMovie>> {
        self.watched.lock().unwrap().subscribe()
    }

    pub fn watched_rating_for(&self, imdb_id: &str) -> Option<u32> {
        self.watched.lock().unwrap().user_rating_for(imdb_id)
    }

    pub fn title(&self) -> String {
        self.title_tx.borrow().clone()
    }

    pub fn subscribe_title(&self) -> watch::Receiver<String> {
        self.title_tx.subscribe()
    }

    pub fn focus(&self) -> Focus {
        *self.focus_tx.borrow()
    }

    pub fn set_focus(&self, focus: Focus) {
        self.focus_tx.send_replace(focus);
    }

    // Enter while the search field already has focus is ignored.
    pub fn handle_key(&self, key: Key) {
        let action = self.bindings.lock().unwrap().get(&key).copied();
        match action {
            Some(Action::FocusSearch) => {
                if self.focus() != Focus::Search {
                    self.set_focus(Focus::Search);
                    self.set_query("");
                }
            }
            Some(Action::CloseDetail) => self.close_detail(),
            None => {}
        }
    }
}
