use serde::{Deserialize, Deserializer, Serialize};
use std::ops::Deref;

/// Page size TMDB uses for every paginated list endpoint.
pub const UPSTREAM_PAGE_SIZE: usize = 20;

/// Treats an explicit `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Movie {
    pub id: i32,
    pub title: String,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub backdrop_path: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub vote_average: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub vote_count: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub release_date: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub overview: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre_ids: Option<Vec<i32>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub popularity: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub adult: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub original_language: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub original_title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub video: bool,
}

impl Movie {
    pub fn year(&self) -> Option<&str> {
        self.release_date
            .split('-')
            .next()
            .filter(|y| y.len() == 4)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Hash)]
pub struct Genre {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GenreList {
    pub genres: Vec<Genre>,
}

impl GenreList {
    pub fn name_of(&self, id: i32) -> Option<&str> {
        self.genres
            .iter()
            .find(|g| g.id == id)
            .map(|g| g.name.as_str())
    }
}

/// Full movie record from `/movie/{id}`; structurally a [`Movie`] plus the
/// detail-only fields.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MovieDetail {
    #[serde(flatten)]
    pub movie: Movie,
    #[serde(default)]
    pub genres: Vec<Genre>,
    #[serde(default)]
    pub runtime: Option<u32>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tagline: String,
}

impl Deref for MovieDetail {
    type Target = Movie;

    fn deref(&self) -> &Movie {
        &self.movie
    }
}

impl From<MovieDetail> for Movie {
    fn from(detail: MovieDetail) -> Self {
        let mut movie = detail.movie;
        if movie.genre_ids.is_none() {
            movie.genre_ids = Some(detail.genres.iter().map(|g| g.id).collect());
        }
        movie
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Paginated<T> {
    pub page: u32,
    pub results: Vec<T>,
    pub total_pages: u32,
    pub total_results: u32,
}

impl<T> Paginated<T> {
    /// Page number to request after this one, `None` once the last page is in.
    pub fn next_page(&self) -> Option<u32> {
        if self.page < self.total_pages {
            Some(self.page + 1)
        } else {
            None
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CastMember {
    pub id: i32,
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub character: String,
    #[serde(default)]
    pub profile_path: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CrewMember {
    pub id: i32,
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub job: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub department: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MovieCredits {
    pub id: i32,
    #[serde(default)]
    pub cast: Vec<CastMember>,
    #[serde(default)]
    pub crew: Vec<CrewMember>,
}

impl MovieCredits {
    pub fn directors(&self) -> impl Iterator<Item = &CrewMember> {
        self.crew.iter().filter(|c| c.job == "Director")
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Video {
    pub id: String,
    pub key: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    pub site: String,
    #[serde(rename = "type")]
    pub video_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub official: bool,
}

impl Video {
    pub fn youtube_embed_url(&self) -> Option<String> {
        if self.site.eq_ignore_ascii_case("YouTube") {
            Some(format!("https://www.youtube.com/embed/{}?autoplay=1", self.key))
        } else {
            None
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct VideoList {
    pub id: i32,
    #[serde(default)]
    pub results: Vec<Video>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Person {
    pub id: i32,
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub biography: String,
    #[serde(default)]
    pub birthday: Option<String>,
    #[serde(default)]
    pub deathday: Option<String>,
    #[serde(default)]
    pub place_of_birth: Option<String>,
    #[serde(default)]
    pub profile_path: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub known_for_department: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct PersonMovieCredits {
    #[serde(default)]
    pub cast: Vec<Movie>,
    #[serde(default)]
    pub crew: Vec<Movie>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn detail_flattens_into_movie_fields() {
        let detail: MovieDetail = serde_json::from_value(json!({
            "id": 550,
            "title": "Fight Club",
            "poster_path": null,
            "vote_average": 8.4,
            "vote_count": 27000,
            "release_date": "1999-10-15",
            "overview": "An insomniac office worker...",
            "popularity": 61.4,
            "genres": [{ "id": 18, "name": "Drama" }],
            "runtime": 139,
            "status": "Released",
            "tagline": "Mischief. Mayhem. Soap."
        }))
        .unwrap();

        assert_eq!(detail.title, "Fight Club");
        assert_eq!(detail.year(), Some("1999"));
        assert_eq!(detail.runtime, Some(139));
        let movie: Movie = detail.into();
        assert_eq!(movie.genre_ids, Some(vec![18]));
    }

    #[test]
    fn next_page_stops_at_total_pages() {
        let page = |n| Paginated::<Movie> {
            page: n,
            results: vec![],
            total_pages: 3,
            total_results: 0,
        };
        assert_eq!(page(1).next_page(), Some(2));
        assert_eq!(page(2).next_page(), Some(3));
        assert_eq!(page(3).next_page(), None);
    }

    #[test]
    fn null_scalars_decode_as_empty() {
        let movie: Movie = serde_json::from_value(json!({
            "id": 9,
            "title": "Untitled Project",
            "release_date": null,
            "overview": null,
            "vote_average": null,
            "vote_count": null,
            "adult": null
        }))
        .unwrap();
        assert_eq!(movie.release_date, "");
        assert_eq!(movie.overview, "");
        assert_eq!(movie.vote_count, 0);
        assert_eq!(movie.year(), None);

        let detail: MovieDetail = serde_json::from_value(json!({
            "id": 9,
            "title": "Untitled Project",
            "overview": null,
            "tagline": null,
            "status": null
        }))
        .unwrap();
        assert_eq!(detail.tagline, "");

        let cast: CastMember = serde_json::from_value(json!({
            "id": 3,
            "name": "Someone",
            "character": null
        }))
        .unwrap();
        assert_eq!(cast.character, "");
    }

    #[test]
    fn movie_without_title_is_rejected() {
        let parsed = serde_json::from_value::<Movie>(json!({ "id": 1 }));
        assert!(parsed.is_err());
    }
}
