use popcorn::models::{MovieDetail, MovieSummary};
use popcorn::omdb::{LookupError, OmdbApi};
use popcorn::search::{SearchController, SearchResult};
use popcorn::session::{Focus, Key, Session, DEFAULT_TITLE};
use popcorn::watched::WatchedListStore;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

#[derive(Default)]
struct FakeOmdb {
    search_calls: AtomicUsize,
    catalog: HashMap<String, Vec<MovieSummary>>,
    search_delays: HashMap<String, Duration>,
    fail_terms: HashSet<String>,
    details: HashMap<String, MovieDetail>,
    detail_delays: HashMap<String, Duration>,
}

#[async_trait::async_trait]
impl OmdbApi for FakeOmdb {
    async fn search(&self, term: &str) -> Result<Vec<MovieSummary>, LookupError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.search_delays.get(term) {
            tokio::time::sleep(*delay).await;
        }
        if self.fail_terms.contains(term) {
            return Err(LookupError::Transport("connection reset".to_string()));
        }
        self.catalog.get(term).cloned().ok_or(LookupError::NotFound)
    }

    async fn lookup(&self, imdb_id: &str) -> Result<MovieDetail, LookupError> {
        if let Some(delay) = self.detail_delays.get(imdb_id) {
            tokio::time::sleep(*delay).await;
        }
        self.details
            .get(imdb_id)
            .cloned()
            .ok_or(LookupError::NotFound)
    }
}

fn summary(id: &str, title: &str) -> MovieSummary {
    MovieSummary {
        imdb_id: id.to_string(),
        title: title.to_string(),
        year: "2005".to_string(),
        poster: "https://example.com/poster.jpg".to_string(),
    }
}

fn detail(id: &str, title: &str, runtime: &str, rating: &str) -> MovieDetail {
    MovieDetail {
        imdb_id: id.to_string(),
        title: title.to_string(),
        year: "2010".to_string(),
        poster: "https://example.com/poster.jpg".to_string(),
        runtime: runtime.to_string(),
        imdb_rating: rating.to_string(),
        plot: "A plot.".to_string(),
        released: "16 Jul 2010".to_string(),
        actors: "Actor A, Actor B".to_string(),
        director: "Director A".to_string(),
        genre: "Action".to_string(),
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..10_000 {
        if condition() {
            return;
        }
        // Time-based poll: a bare yield_now never releases the OS thread, so
        // on the multi_thread flavor the spin can exhaust before the worker
        // threads ever run the spawned lookups (REVIEW_FINDINGS.md F5).
        tokio::time::sleep(Duration::from_micros(50)).await;
    }
    panic!("condition not reached");
}

fn session_fixture(api: FakeOmdb) -> (Arc<Session>, TempDir) {
    let dir = TempDir::new().unwrap();
    let store = WatchedListStore::load(dir.path().join("watched.json"));
    (Session::new(Arc::new(api), store), dir)
}

#[tokio::test]
async fn short_query_clears_results_without_network() {
    let api = Arc::new(FakeOmdb::default());
    let controller = SearchController::new(api.clone());

    assert!(!controller.set_query("ab"));
    assert_eq!(controller.result(), SearchResult::Loaded(Vec::new()));
    assert!(!controller.set_query("  b  "));
    assert_eq!(api.search_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn stale_lookup_never_overwrites_newer_result() {
    let batman_results = vec![summary("tt0372784", "Batman Begins")];
    let api = Arc::new(FakeOmdb {
        catalog: HashMap::from([
            ("bat".to_string(), vec![summary("tt0000001", "Bats")]),
            ("batman".to_string(), batman_results.clone()),
        ]),
        search_delays: HashMap::from([
            ("bat".to_string(), Duration::from_millis(500)),
            ("batman".to_string(), Duration::from_millis(50)),
        ]),
        ..Default::default()
    });
    let controller = SearchController::new(api.clone());

    controller.set_query("ab");
    controller.set_query("bat");
    controller.set_query("batman");
    assert_eq!(controller.result(), SearchResult::Loading);

    // Lets both lookups complete; "bat" resolves after "batman" and must be
    // discarded as superseded.
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(controller.result(), SearchResult::Loaded(batman_results));
    assert_eq!(api.search_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn rapid_requeries_settle_on_last_query() {
    let batman_results = vec![summary("tt0372784", "Batman Begins")];
    let api = Arc::new(FakeOmdb {
        catalog: HashMap::from([
            ("bat".to_string(), vec![summary("tt0000001", "Bats")]),
            ("batman".to_string(), batman_results.clone()),
        ]),
        search_delays: HashMap::from([("bat".to_string(), Duration::from_micros(200))]),
        ..Default::default()
    });
    let controller = SearchController::new(api.clone());

    // On real threads a superseded completion races the newer publication;
    // whatever the interleaving, the last issued query must win.
    for _ in 0..200 {
        controller.set_query("bat");
        controller.set_query("batman");
        wait_until(|| controller.result() != SearchResult::Loading).await;
        // Leaves the slower lookup time to land wrongly if it ever could.
        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(
            controller.result(),
            SearchResult::Loaded(batman_results.clone())
        );
    }
}

#[tokio::test]
async fn no_results_maps_to_fixed_message() {
    let controller = SearchController::new(Arc::new(FakeOmdb::default()));
    controller.set_query("zzzzzz");
    wait_until(|| controller.result() != SearchResult::Loading).await;
    assert_eq!(
        controller.result(),
        SearchResult::Failed("Movie not found".to_string())
    );
}

#[tokio::test]
async fn transport_failure_maps_to_fixed_message() {
    let api = FakeOmdb {
        fail_terms: HashSet::from(["batman".to_string()]),
        ..Default::default()
    };
    let controller = SearchController::new(Arc::new(api));
    controller.set_query("batman");
    wait_until(|| controller.result() != SearchResult::Loading).await;
    assert_eq!(
        controller.result(),
        SearchResult::Failed("Something went wrong with fetching movies".to_string())
    );
}

#[tokio::test]
async fn selecting_twice_toggles_the_detail_closed() {
    let api = FakeOmdb {
        details: HashMap::from([(
            "tt1375666".to_string(),
            detail("tt1375666", "Inception", "148 min", "8.8"),
        )]),
        ..Default::default()
    };
    let (session, _dir) = session_fixture(api);

    session.select("tt1375666");
    assert_eq!(session.selected().as_deref(), Some("tt1375666"));
    wait_until(|| !session.detail_state().loading).await;
    wait_until(|| session.title() == "Movie | Inception").await;

    session.select("tt1375666");
    assert_eq!(session.selected(), None);
    assert_eq!(session.detail_state().detail, None);
    assert_eq!(session.title(), DEFAULT_TITLE);
}

#[tokio::test]
async fn qualifying_query_deselects_but_short_query_does_not() {
    let api = FakeOmdb {
        catalog: HashMap::from([("batman".to_string(), vec![summary("tt0372784", "Batman Begins")])]),
        details: HashMap::from([(
            "tt1375666".to_string(),
            detail("tt1375666", "Inception", "148 min", "8.8"),
        )]),
        ..Default::default()
    };
    let (session, _dir) = session_fixture(api);

    session.select("tt1375666");
    wait_until(|| !session.detail_state().loading).await;
    session.set_query("ab");
    assert_eq!(session.selected().as_deref(), Some("tt1375666"));

    session.set_query("batman");
    assert_eq!(session.selected(), None);
    assert_eq!(session.title(), DEFAULT_TITLE);
    wait_until(|| session.search_result() != SearchResult::Loading).await;
    assert!(matches!(session.search_result(), SearchResult::Loaded(m) if m.len() == 1));
}

#[tokio::test]
async fn escape_closes_detail_only_while_bound() {
    let api = FakeOmdb {
        details: HashMap::from([(
            "tt1375666".to_string(),
            detail("tt1375666", "Inception", "148 min", "8.8"),
        )]),
        ..Default::default()
    };
    let (session, _dir) = session_fixture(api);

    // Not bound yet: nothing to close, nothing happens.
    session.handle_key(Key::Escape);
    assert_eq!(session.selected(), None);

    session.select("tt1375666");
    wait_until(|| !session.detail_state().loading).await;
    session.handle_key(Key::Escape);
    assert_eq!(session.selected(), None);
    assert_eq!(session.title(), DEFAULT_TITLE);
}

#[tokio::test]
async fn enter_focuses_search_and_clears_query_unless_focused() {
    let api = FakeOmdb {
        catalog: HashMap::from([("batman".to_string(), vec![summary("tt0372784", "Batman Begins")])]),
        ..Default::default()
    };
    let (session, _dir) = session_fixture(api);

    session.set_focus(Focus::Body);
    session.set_query("batman");
    session.handle_key(Key::Enter);
    assert_eq!(session.focus(), Focus::Search);
    assert_eq!(session.query(), "");
    assert_eq!(session.search_result(), SearchResult::Loaded(Vec::new()));

    // Already focused: the press is ignored and the query survives.
    session.set_query("batman");
    session.handle_key(Key::Enter);
    assert_eq!(session.query(), "batman");
}

#[tokio::test]
async fn add_watched_commits_rating_and_closes() {
    let api = FakeOmdb {
        details: HashMap::from([(
            "tt1375666".to_string(),
            detail("tt1375666", "Inception", "148 min", "8.8"),
        )]),
        ..Default::default()
    };
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("watched.json");
    let store = WatchedListStore::load(&path);
    let session = Session::new(Arc::new(api), store);

    session.select("tt1375666");
    wait_until(|| !session.detail_state().loading).await;
    assert!(session.add_watched().is_err());

    session.rate(7);
    session.rate(8);
    session.add_watched().unwrap();

    let movies = session.watched_movies();
    assert_eq!(movies.len(), 1);
    assert_eq!(movies[0].imdb_id, "tt1375666");
    assert_eq!(movies[0].runtime, 148);
    assert_eq!(movies[0].imdb_rating, 8.8);
    assert_eq!(movies[0].user_rating, 8);
    assert_eq!(movies[0].rating_decisions, 2);
    assert_eq!(session.selected(), None);
    assert_eq!(session.title(), DEFAULT_TITLE);
    assert_eq!(session.watched_rating_for("tt1375666"), Some(8));

    // The mutation hit disk before add_watched returned.
    let reloaded = WatchedListStore::load(&path);
    assert_eq!(reloaded.movies(), movies.as_slice());
}

#[tokio::test]
async fn malformed_runtime_is_stored_as_zero() {
    let api = FakeOmdb {
        details: HashMap::from([(
            "tt0000002".to_string(),
            detail("tt0000002", "Oddity", "N/A", "N/A"),
        )]),
        ..Default::default()
    };
    let (session, _dir) = session_fixture(api);

    session.select("tt0000002");
    wait_until(|| !session.detail_state().loading).await;
    session.rate(5);
    session.add_watched().unwrap();

    let movies = session.watched_movies();
    assert_eq!(movies[0].runtime, 0);
    assert_eq!(movies[0].imdb_rating, 0.0);
}

#[tokio::test(start_paused = true)]
async fn late_detail_completion_does_not_retitle_after_close() {
    let api = FakeOmdb {
        details: HashMap::from([(
            "tt1375666".to_string(),
            detail("tt1375666", "Inception", "148 min", "8.8"),
        )]),
        detail_delays: HashMap::from([("tt1375666".to_string(), Duration::from_millis(500))]),
        ..Default::default()
    };
    let (session, _dir) = session_fixture(api);

    session.select("tt1375666");
    session.close_detail();
    assert_eq!(session.title(), DEFAULT_TITLE);

    // The fetch lands after the view is gone; a stale completion must not
    // retitle the closed view.
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(session.selected(), None);
    assert_eq!(session.title(), DEFAULT_TITLE);
}

#[tokio::test(start_paused = true)]
async fn detail_reflects_last_completed_fetch() {
    // The detail path has no supersede check: a slow fetch for an earlier
    // selection lands after a newer one and wins. This pins the behavior so
    // a change to it is a deliberate decision, not an accident.
    let api = FakeOmdb {
        details: HashMap::from([
            (
                "tt-slow".to_string(),
                detail("tt-slow", "Slow Movie", "100 min", "6.0"),
            ),
            (
                "tt-fast".to_string(),
                detail("tt-fast", "Fast Movie", "90 min", "7.0"),
            ),
        ]),
        detail_delays: HashMap::from([
            ("tt-slow".to_string(), Duration::from_millis(500)),
            ("tt-fast".to_string(), Duration::from_millis(50)),
        ]),
        ..Default::default()
    };
    let (session, _dir) = session_fixture(api);

    session.select("tt-slow");
    session.select("tt-fast");
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(session.selected().as_deref(), Some("tt-fast"));
    let loaded = session.detail_state().detail.unwrap();
    assert_eq!(loaded.imdb_id, "tt-slow");
}
