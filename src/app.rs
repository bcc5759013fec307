// Line-oriented frontend: feeds input into the session and redraws from
// the observable state. The core does not depend on it.

use anyhow::Result;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::models::{MovieSummary, WatchedMovie};
use crate::omdb::{OmdbApi, OmdbClient};
use crate::search::SearchResult;
use crate::session::{Focus, Key, Session};
use crate::watched::WatchedListStore;

const HELP: &str = "\
Type a search term to look up movies (3+ characters).
  :o <n>    open detail for result n
  :r <1-10> rate the open movie
  :a        add the rated movie to the watched list
  :w        show the watched list
  :d <id>   delete a watched movie by imdb id
  <empty>   Enter key (focus search, clear query)
  :x        Escape key (close detail)
  :h        help
  :q        quit";

pub async fn run() -> Result<()> {
    let api: Arc<dyn OmdbApi> = Arc::new(OmdbClient::from_env()?);
    let store = WatchedListStore::load(WatchedListStore::default_path());
    let session = Session::new(api, store);

    println!("popcorn - search, rate, remember");
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut results: Vec<MovieSummary> = Vec::new();

    while let Some(line) = lines.next_line().await? {
        let input = line.trim();
        match input {
            "" => {
                session.handle_key(Key::Enter);
                if session.focus() == Focus::Search {
                    println!("(search focused, query cleared)");
                }
            }
            ":q" => break,
            ":h" => println!("{HELP}"),
            ":x" => {
                session.handle_key(Key::Escape);
                println!("(detail closed)");
            }
            ":a" => match session.add_watched() {
                Ok(()) => println!("Added to watched list."),
                Err(e) => println!("Cannot add: {e}"),
            },
            ":w" => print_watched(&session),
            _ if input.starts_with(":o ") => {
                match input[3..].trim().parse::<usize>() {
                    Ok(n) if n >= 1 && n <= results.len() => {
                        session.select(&results[n - 1].imdb_id);
                        print_detail(&session).await;
                    }
                    _ => println!("No such result."),
                }
            }
            _ if input.starts_with(":r ") => match input[3..].trim().parse::<u32>() {
                Ok(rating) if (1..=10).contains(&rating) => {
                    session.rate(rating);
                    println!("Rated {rating}/10 (not added yet, :a to commit).");
                }
                _ => println!("Rating must be 1-10."),
            },
            _ if input.starts_with(":d ") => {
                let id = input[3..].trim();
                match session.remove_watched(id) {
                    Ok(()) => print_watched(&session),
                    Err(e) => println!("Delete failed: {e}"),
                }
            }
            term => {
                session.set_focus(Focus::Search);
                session.set_query(term);
                results = print_results(&session).await;
                session.set_focus(Focus::Body);
            }
        }
    }
    Ok(())
}

async fn print_results(session: &Session) -> Vec<MovieSummary> {
    match settled_search(session).await {
        SearchResult::Loaded(movies) => {
            println!("Found {} results", movies.len());
            for (i, movie) in movies.iter().enumerate() {
                println!("  {}. {} ({})", i + 1, movie.title, movie.year);
            }
            movies
        }
        SearchResult::Failed(message) => {
            println!("{message}");
            Vec::new()
        }
        SearchResult::Idle | SearchResult::Loading => Vec::new(),
    }
}

// The REPL is sequential, so waiting for the tri-state to leave Loading is
// enough; a richer frontend would redraw on every change instead.
async fn settled_search(session: &Session) -> SearchResult {
    let mut rx = session.subscribe_search();
    loop {
        let current = rx.borrow_and_update().clone();
        if current != SearchResult::Loading {
            return current;
        }
        if rx.changed().await.is_err() {
            return SearchResult::Idle;
        }
    }
}

async fn print_detail(session: &Session) {
    let mut rx = session.subscribe_detail();
    loop {
        let state = rx.borrow_and_update().clone();
        if !state.loading {
            if let Some(detail) = state.detail {
                println!("[{}]", session.title());
                println!("{} ({})", detail.title, detail.year);
                println!("{} - {}", detail.released, detail.runtime);
                println!("{}", detail.genre);
                println!("{} IMDb rating", detail.imdb_rating);
                if let Some(rating) = session.watched_rating_for(&detail.imdb_id) {
                    println!("You rated this movie {rating}/10 already.");
                }
                println!("{}", detail.plot);
                println!("Starring {}", detail.actors);
                println!("Directed by {}", detail.director);
            } else {
                println!("No detail available.");
            }
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

fn print_watched(session: &Session) {
    let movies = session.watched_movies();
    let summary = session.watched_summary();
    println!("Movies you watched: {}", summary.count);
    println!(
        "  avg imdb {:.2} | avg yours {:.2} | avg runtime {:.2} min",
        summary.avg_imdb_rating, summary.avg_user_rating, summary.avg_runtime
    );
    for movie in &movies {
        print_watched_movie(movie);
    }
}

fn print_watched_movie(movie: &WatchedMovie) {
    println!(
        "  {} ({}) - imdb {} - yours {} - {} min [{}]",
        movie.title, movie.year, movie.imdb_rating, movie.user_rating, movie.runtime, movie.imdb_id
    );
}
