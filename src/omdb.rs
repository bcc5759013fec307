use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::env;
use thiserror::Error;

use anyhow::Context;

use crate::models::{MovieDetail, MovieSummary};

const OMDB_BASE: &str = "https://www.omdbapi.com/";

// The display strings are the exact messages shown to the user; a
// superseded lookup is not an error and never reaches this type.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("Something went wrong with fetching movies")]
    Transport(String),
    #[error("Movie not found")]
    NotFound,
}

#[async_trait]
pub trait OmdbApi: Send + Sync {
    async fn search(&self, term: &str) -> Result<Vec<MovieSummary>, LookupError>;
    async fn lookup(&self, imdb_id: &str) -> Result<MovieDetail, LookupError>;
}

#[derive(Debug, Clone)]
pub struct OmdbClient {
    client: Client,
    api_key: String,
}

impl OmdbClient {
    pub fn from_env() -> anyhow::Result<Self> {
        let api_key = env::var("OMDB_API_KEY").context("OMDB_API_KEY not set")?;
        Ok(Self {
            client: Client::new(),
            api_key,
        })
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: &str) -> Result<T, LookupError> {
        let res = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| LookupError::Transport(e.to_string()))?;
        let status = res.status();
        if !status.is_success() {
            return Err(LookupError::Transport(format!("{url} -> {status}")));
        }
        res.json::<T>()
            .await
            .map_err(|e| LookupError::Transport(e.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(rename = "Response")]
    response: String,
    #[serde(rename = "Search", default)]
    search: Vec<MovieSummary>,
}

#[async_trait]
impl OmdbApi for OmdbClient {
    async fn search(&self, term: &str) -> Result<Vec<MovieSummary>, LookupError> {
        let url = format!(
            "{OMDB_BASE}?apikey={}&s={}",
            self.api_key,
            urlencoding::encode(term)
        );
        let data: SearchResponse = self.get_json(&url).await?;
        // OMDb signals "no results" in-band: HTTP 200 with Response "False".
        if data.response == "False" {
            return Err(LookupError::NotFound);
        }
        Ok(data.search)
    }

    async fn lookup(&self, imdb_id: &str) -> Result<MovieDetail, LookupError> {
        let url = format!(
            "{OMDB_BASE}?apikey={}&i={}",
            self.api_key,
            urlencoding::encode(imdb_id)
        );
        self.get_json(&url).await
    }
}

// Leading numeric token of OMDb's free-text runtime ("142 min" -> 142);
// None when the text does not start with a number ("N/A").
pub fn parse_runtime_minutes(text: &str) -> Option<u32> {
    text.split_whitespace().next()?.parse().ok()
}
