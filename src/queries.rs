use std::sync::Arc;
use std::time::Duration;

use crate::browse::{Feed, HomeFilter};
use crate::cache::{QueryCache, QueryKey, QueryOptions, QueryState};
use crate::infinite::{InfiniteQueryCache, Pages};
use crate::models::{
    GenreList, Movie, MovieCredits, MovieDetail, Paginated, Person, PersonMovieCredits, VideoList,
};
use crate::tmdb::TmdbApi;

pub const LIST_STALE_TIME: Duration = Duration::from_secs(5 * 60);
pub const SEARCH_STALE_TIME: Duration = Duration::from_secs(60);
pub const GENRE_STALE_TIME: Duration = Duration::from_secs(24 * 60 * 60);

pub type MovieList = QueryState<Pages<Movie>>;

/// Cached, deduplicated access to every endpoint the UI reads. One instance
/// per session; clones share the same caches.
#[derive(Clone)]
pub struct MovieQueries {
    api: Arc<dyn TmdbApi>,
    trending: InfiniteQueryCache<Movie>,
    discover: InfiniteQueryCache<Movie>,
    search: InfiniteQueryCache<Movie>,
    genres: QueryCache<GenreList>,
    details: QueryCache<MovieDetail>,
    credits: QueryCache<MovieCredits>,
    videos: QueryCache<VideoList>,
    recommendations: QueryCache<Paginated<Movie>>,
    person: QueryCache<Person>,
    person_credits: QueryCache<PersonMovieCredits>,
}

pub fn trending_key() -> QueryKey {
    QueryKey::new("trendingMovies")
}

pub fn discover_key(genre: Option<i32>) -> QueryKey {
    QueryKey::new("discoverMovies").with(genre)
}

pub fn search_key(query: &str) -> QueryKey {
    QueryKey::new("searchMovies").with(query.trim())
}

pub fn genres_key() -> QueryKey {
    QueryKey::new("genres")
}

fn selected_genre(genre: Option<i32>) -> Option<i32> {
    genre.filter(|g| *g != 0)
}

fn by_id(resource: &'static str, id: i32) -> QueryKey {
    QueryKey::new(resource).with(id)
}

fn by_id_options(id: i32) -> QueryOptions {
    QueryOptions::default().enabled(id != 0)
}

impl MovieQueries {
    pub fn new(api: Arc<dyn TmdbApi>) -> Self {
        Self {
            api,
            trending: InfiniteQueryCache::new(),
            discover: InfiniteQueryCache::new(),
            search: InfiniteQueryCache::new(),
            genres: QueryCache::new(),
            details: QueryCache::new(),
            credits: QueryCache::new(),
            videos: QueryCache::new(),
            recommendations: QueryCache::new(),
            person: QueryCache::new(),
            person_credits: QueryCache::new(),
        }
    }

    pub async fn trending(&self) -> MovieList {
        let api = self.api.clone();
        self.trending
            .query(
                trending_key(),
                QueryOptions::stale_after(LIST_STALE_TIME),
                move |page| {
                    let api = api.clone();
                    async move { api.trending(page).await }
                },
            )
            .await
    }

    pub async fn trending_next_page(&self) -> MovieList {
        let api = self.api.clone();
        self.trending
            .fetch_next_page(trending_key(), move |page| async move {
                api.trending(page).await
            })
            .await
    }

    /// Movies of one genre by popularity. Inert while no genre is selected;
    /// genre id 0 counts as none.
    pub async fn discover(&self, genre: Option<i32>) -> MovieList {
        let genre = selected_genre(genre);
        let api = self.api.clone();
        let options = QueryOptions::stale_after(LIST_STALE_TIME).enabled(genre.is_some());
        let genre_id = genre.unwrap_or_default();
        self.discover
            .query(discover_key(genre), options, move |page| {
                let api = api.clone();
                async move { api.discover(genre_id, page).await }
            })
            .await
    }

    pub async fn discover_next_page(&self, genre: Option<i32>) -> MovieList {
        let genre = selected_genre(genre);
        let Some(genre_id) = genre else {
            return QueryState::default();
        };
        let api = self.api.clone();
        self.discover
            .fetch_next_page(discover_key(genre), move |page| async move {
                api.discover(genre_id, page).await
            })
            .await
    }

    /// Title search. Inert while the query is blank.
    pub async fn search(&self, query: &str) -> MovieList {
        let query = query.trim().to_string();
        let api = self.api.clone();
        let options = QueryOptions::stale_after(SEARCH_STALE_TIME).enabled(!query.is_empty());
        self.search
            .query(search_key(&query), options, move |page| {
                let api = api.clone();
                let query = query.clone();
                async move { api.search(&query, page).await }
            })
            .await
    }

    pub async fn search_next_page(&self, query: &str) -> MovieList {
        let query = query.trim().to_string();
        if query.is_empty() {
            return QueryState::default();
        }
        let api = self.api.clone();
        self.search
            .fetch_next_page(search_key(&query), move |page| async move {
                api.search(&query, page).await
            })
            .await
    }

    /// The list the home page shows for `filter`: search over genre over
    /// trending. Inactive feeds are neither fetched nor shown.
    pub async fn home_feed(&self, filter: &HomeFilter) -> MovieList {
        match filter.active_feed() {
            Feed::Search => self.search(filter.query()).await,
            Feed::Discover => self.discover(filter.genre()).await,
            Feed::Trending => self.trending().await,
        }
    }

    pub async fn home_feed_next_page(&self, filter: &HomeFilter) -> MovieList {
        match filter.active_feed() {
            Feed::Search => self.search_next_page(filter.query()).await,
            Feed::Discover => self.discover_next_page(filter.genre()).await,
            Feed::Trending => self.trending_next_page().await,
        }
    }

    pub async fn genres(&self) -> QueryState<GenreList> {
        let api = self.api.clone();
        self.genres
            .query(
                genres_key(),
                QueryOptions::stale_after(GENRE_STALE_TIME),
                move || async move { api.genres().await },
            )
            .await
    }

    pub async fn movie_details(&self, id: i32) -> QueryState<MovieDetail> {
        let api = self.api.clone();
        self.details
            .query(by_id("movieDetails", id), by_id_options(id), move || async move {
                api.movie_details(id).await
            })
            .await
    }

    pub async fn movie_credits(&self, id: i32) -> QueryState<MovieCredits> {
        let api = self.api.clone();
        self.credits
            .query(by_id("movieCredits", id), by_id_options(id), move || async move {
                api.movie_credits(id).await
            })
            .await
    }

    pub async fn movie_videos(&self, id: i32) -> QueryState<VideoList> {
        let api = self.api.clone();
        self.videos
            .query(by_id("movieVideos", id), by_id_options(id), move || async move {
                api.movie_videos(id).await
            })
            .await
    }

    pub async fn movie_recommendations(&self, id: i32) -> QueryState<Paginated<Movie>> {
        let api = self.api.clone();
        self.recommendations
            .query(
                by_id("movieRecommendations", id),
                by_id_options(id),
                move || async move { api.movie_recommendations(id).await },
            )
            .await
    }

    pub async fn person_details(&self, id: i32) -> QueryState<Person> {
        let api = self.api.clone();
        self.person
            .query(by_id("personDetails", id), by_id_options(id), move || async move {
                api.person_details(id).await
            })
            .await
    }

    pub async fn person_movie_credits(&self, id: i32) -> QueryState<PersonMovieCredits> {
        let api = self.api.clone();
        self.person_credits
            .query(
                by_id("personMovieCredits", id),
                by_id_options(id),
                move || async move { api.person_movie_credits(id).await },
            )
            .await
    }

    pub fn observe_trending(&self) -> MovieList {
        self.trending.observe(&trending_key())
    }

    pub fn observe_discover(&self, genre: Option<i32>) -> MovieList {
        self.discover.observe(&discover_key(selected_genre(genre)))
    }

    pub fn observe_search(&self, query: &str) -> MovieList {
        self.search.observe(&search_key(query))
    }

    pub fn invalidate_trending(&self) {
        self.trending.invalidate(&trending_key())
    }
}
