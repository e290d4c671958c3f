use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::config;
use crate::error::ApiError;
use crate::models::{
    GenreList, Movie, MovieCredits, MovieDetail, Paginated, Person, PersonMovieCredits, VideoList,
};

/// Typed access to the metadata endpoints behind the gateway proxy.
#[async_trait]
pub trait TmdbApi: Send + Sync {
    async fn trending(&self, page: u32) -> Result<Paginated<Movie>, ApiError>;
    async fn genres(&self) -> Result<GenreList, ApiError>;
    async fn discover(&self, genre_id: i32, page: u32) -> Result<Paginated<Movie>, ApiError>;
    async fn search(&self, query: &str, page: u32) -> Result<Paginated<Movie>, ApiError>;
    async fn movie_details(&self, id: i32) -> Result<MovieDetail, ApiError>;
    async fn movie_credits(&self, id: i32) -> Result<MovieCredits, ApiError>;
    async fn movie_videos(&self, id: i32) -> Result<VideoList, ApiError>;
    async fn movie_recommendations(&self, id: i32) -> Result<Paginated<Movie>, ApiError>;
    async fn person_details(&self, id: i32) -> Result<Person, ApiError>;
    async fn person_movie_credits(&self, id: i32) -> Result<PersonMovieCredits, ApiError>;
}

#[derive(Debug, Clone)]
pub struct TmdbClient {
    client: Client,
    base: String,
}

impl TmdbClient {
    pub fn new(base: impl Into<String>) -> Result<Self> {
        let user_agent = format!("cinehub/{}", env!("CARGO_PKG_VERSION"));
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .user_agent(user_agent)
            .build()
            .context("Failed to build TMDB HTTP client")?;
        Ok(Self {
            client,
            base: base.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(config::api_base())
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base, path);
        debug!("GET {} {:?}", url, params);
        let res = self.client.get(&url).query(params).send().await?;
        let status = res.status();
        let bytes = res.bytes().await?;
        if !status.is_success() {
            return Err(ApiError::Upstream {
                status: status.as_u16(),
                message: upstream_message(&bytes),
            });
        }
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl TmdbApi for TmdbClient {
    async fn trending(&self, page: u32) -> Result<Paginated<Movie>, ApiError> {
        self.get_json("/trending/movie/week", &[("page", page.to_string())])
            .await
    }

    async fn genres(&self) -> Result<GenreList, ApiError> {
        self.get_json("/genre/movie/list", &[]).await
    }

    async fn discover(&self, genre_id: i32, page: u32) -> Result<Paginated<Movie>, ApiError> {
        self.get_json(
            "/discover/movie",
            &[
                ("with_genres", genre_id.to_string()),
                ("page", page.to_string()),
                ("sort_by", "popularity.desc".to_string()),
            ],
        )
        .await
    }

    async fn search(&self, query: &str, page: u32) -> Result<Paginated<Movie>, ApiError> {
        self.get_json(
            "/search/movie",
            &[("query", query.to_string()), ("page", page.to_string())],
        )
        .await
    }

    async fn movie_details(&self, id: i32) -> Result<MovieDetail, ApiError> {
        self.get_json(&format!("/movie/{id}"), &[]).await
    }

    async fn movie_credits(&self, id: i32) -> Result<MovieCredits, ApiError> {
        self.get_json(&format!("/movie/{id}/credits"), &[]).await
    }

    async fn movie_videos(&self, id: i32) -> Result<VideoList, ApiError> {
        self.get_json(&format!("/movie/{id}/videos"), &[]).await
    }

    async fn movie_recommendations(&self, id: i32) -> Result<Paginated<Movie>, ApiError> {
        self.get_json(&format!("/movie/{id}/recommendations"), &[])
            .await
    }

    async fn person_details(&self, id: i32) -> Result<Person, ApiError> {
        self.get_json(&format!("/person/{id}"), &[]).await
    }

    async fn person_movie_credits(&self, id: i32) -> Result<PersonMovieCredits, ApiError> {
        self.get_json(&format!("/person/{id}/movie_credits"), &[])
            .await
    }
}

/// Best human-readable message from an error body: TMDB's `status_message`,
/// the proxy's own `message`/`error`, or the raw text.
fn upstream_message(body: &[u8]) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        status_message: Option<String>,
        message: Option<String>,
        error: Option<String>,
    }

    serde_json::from_slice::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.status_message.or(b.message).or(b.error))
        .unwrap_or_else(|| String::from_utf8_lossy(body).trim().to_string())
}
