use anyhow::anyhow;
use std::cmp::Ordering;
use std::str::FromStr;

use crate::models::{GenreList, Movie, PersonMovieCredits, Video};

/// Number of "known for" titles shown on a person page.
pub const KNOWN_FOR_LIMIT: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feed {
    Search,
    Discover,
    Trending,
}

/// Search box and genre chip state of the home page. Searching and genre
/// filtering are mutually exclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HomeFilter {
    query: String,
    genre: Option<i32>,
}

impl HomeFilter {
    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn genre(&self) -> Option<i32> {
        self.genre
    }

    pub fn set_query(&mut self, query: &str) {
        self.query = query.trim().to_string();
        if !self.query.is_empty() {
            self.genre = None;
        }
    }

    /// Clicking the selected genre clears it; any genre click clears the search.
    pub fn toggle_genre(&mut self, id: i32) {
        self.genre = if self.genre == Some(id) { None } else { Some(id) };
        self.query.clear();
    }

    pub fn active_feed(&self) -> Feed {
        if !self.query.is_empty() {
            Feed::Search
        } else if self.genre.is_some_and(|g| g != 0) {
            Feed::Discover
        } else {
            Feed::Trending
        }
    }
}

/// First YouTube trailer or teaser, in upstream order.
pub fn pick_trailer(videos: &[Video]) -> Option<&Video> {
    videos.iter().find(|v| {
        v.site == "YouTube" && (v.video_type == "Trailer" || v.video_type == "Teaser")
    })
}

/// Secondary sort for a person's "known for" row. The credits endpoint is not
/// ordered by prominence, so the order is a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KnownForOrder {
    #[default]
    Rating,
    Popularity,
    VoteCount,
    ReleaseDate,
}

impl FromStr for KnownForOrder {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "rating" | "vote_average" => Ok(KnownForOrder::Rating),
            "popularity" => Ok(KnownForOrder::Popularity),
            "votes" | "vote_count" => Ok(KnownForOrder::VoteCount),
            "release_date" | "newest" => Ok(KnownForOrder::ReleaseDate),
            other => Err(anyhow!("unknown known-for order '{}'", other)),
        }
    }
}

impl KnownForOrder {
    fn compare(&self, a: &Movie, b: &Movie) -> Ordering {
        // Descending in every policy.
        match self {
            KnownForOrder::Rating => b.vote_average.total_cmp(&a.vote_average),
            KnownForOrder::Popularity => b.popularity.total_cmp(&a.popularity),
            KnownForOrder::VoteCount => b.vote_count.cmp(&a.vote_count),
            // ISO dates sort lexically; undated titles go last.
            KnownForOrder::ReleaseDate => b.release_date.cmp(&a.release_date),
        }
    }
}

/// Cast credits that have a poster, best first per `order`, at most `limit`.
pub fn known_for(credits: &PersonMovieCredits, order: KnownForOrder, limit: usize) -> Vec<&Movie> {
    let mut movies: Vec<&Movie> = credits
        .cast
        .iter()
        .filter(|m| m.poster_path.as_deref().is_some_and(|p| !p.is_empty()))
        .collect();
    movies.sort_by(|a, b| order.compare(a, b));
    movies.truncate(limit);
    movies
}

/// Up to `max` genre names for a list-view movie, joined the way movie cards
/// show them.
pub fn genre_names(movie: &Movie, catalog: &GenreList, max: usize) -> String {
    movie
        .genre_ids
        .as_deref()
        .unwrap_or_default()
        .iter()
        .take(max)
        .filter_map(|id| catalog.name_of(*id))
        .collect::<Vec<_>>()
        .join(" • ")
}

pub fn format_runtime(minutes: Option<u32>) -> Option<String> {
    minutes.filter(|m| *m > 0).map(|m| format!("{m} min"))
}
