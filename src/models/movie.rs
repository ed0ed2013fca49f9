use chrono::Datelike;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::InvariantViolation;
use crate::entities::movies;
use crate::validation::{Validator, is_unique};

pub const MAX_TITLE_BYTES: usize = 500;
pub const EARLIEST_YEAR: i32 = 1888;
pub const MAX_GENRES: usize = 5;

/// Accepted values of the `sort` query parameter for movie listings.
pub const SORT_SAFELIST: &[&str] = &[
    "id", "title", "year", "runtime", "-id", "-title", "-year", "-runtime",
];

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid runtime format")]
pub struct InvalidRuntimeFormat;

/// Running time in minutes, written on the wire as `"<n> mins"`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Runtime(pub i32);

impl fmt::Display for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} mins", self.0)
    }
}

impl FromStr for Runtime {
    type Err = InvalidRuntimeFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(' ');
        let (Some(number), Some("mins"), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(InvalidRuntimeFormat);
        };
        number
            .parse::<i32>()
            .map(Self)
            .map_err(|_| InvalidRuntimeFormat)
    }
}

impl Serialize for Runtime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Runtime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Movie {
    pub id: i32,
    pub created_at: String,
    pub title: String,
    pub year: i32,
    pub runtime: Runtime,
    pub genres: Vec<String>,
    /// Concurrency token; clients echo it back via `X-Expected-Version`.
    pub version: i32,
}

/// The genres column is written only by this crate, so a value that is not
/// a JSON string array is corrupt storage rather than bad client input.
impl TryFrom<movies::Model> for Movie {
    type Error = InvariantViolation;

    fn try_from(model: movies::Model) -> Result<Self, Self::Error> {
        let genres = serde_json::from_str(&model.genres).map_err(|e| {
            InvariantViolation::new(format!("movie {} has undecodable genres: {e}", model.id))
        })?;

        Ok(Self {
            id: model.id,
            created_at: model.created_at,
            title: model.title,
            year: model.year,
            runtime: Runtime(model.runtime),
            genres,
            version: model.version,
        })
    }
}

/// Body of `POST /v1/movies`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MovieInput {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub year: i32,
    #[serde(default)]
    pub runtime: Runtime,
    #[serde(default)]
    pub genres: Option<Vec<String>>,
}

impl MovieInput {
    #[must_use]
    pub fn into_movie(self) -> Movie {
        Movie {
            id: 0,
            created_at: String::new(),
            title: self.title,
            year: self.year,
            runtime: self.runtime,
            genres: self.genres.unwrap_or_default(),
            version: 1,
        }
    }
}

/// Body of `PATCH /v1/movies/{id}`; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MoviePatch {
    pub title: Option<String>,
    pub year: Option<i32>,
    pub runtime: Option<Runtime>,
    pub genres: Option<Vec<String>>,
}

impl MoviePatch {
    pub fn apply(self, movie: &mut Movie) {
        if let Some(title) = self.title {
            movie.title = title;
        }
        if let Some(year) = self.year {
            movie.year = year;
        }
        if let Some(runtime) = self.runtime {
            movie.runtime = runtime;
        }
        if let Some(genres) = self.genres {
            movie.genres = genres;
        }
    }
}

pub fn validate_movie(v: &mut Validator, movie: &Movie) {
    v.check(!movie.title.is_empty(), "title", "must be provided");
    v.check(
        movie.title.len() <= MAX_TITLE_BYTES,
        "title",
        "must not be more than 500 bytes long",
    );

    v.check(movie.year != 0, "year", "must be provided");
    v.check(
        movie.year >= EARLIEST_YEAR,
        "year",
        "must be greater than 1888",
    );
    v.check(
        movie.year <= chrono::Utc::now().year(),
        "year",
        "must not be in the future",
    );

    v.check(movie.runtime.0 != 0, "runtime", "must be provided");
    v.check(movie.runtime.0 > 0, "runtime", "must be a positive integer");

    v.check(!movie.genres.is_empty(), "genres", "must contain at least 1 genre");
    v.check(
        movie.genres.len() <= MAX_GENRES,
        "genres",
        "must not contain more than 5 genres",
    );
    v.check(
        is_unique(&movie.genres),
        "genres",
        "must not contain duplicate values",
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn casablanca() -> Movie {
        Movie {
            id: 1,
            created_at: String::new(),
            title: "Casablanca".to_string(),
            year: 1942,
            runtime: Runtime(102),
            genres: vec!["drama".to_string(), "romance".to_string()],
            version: 1,
        }
    }

    #[test]
    fn test_runtime_wire_format() {
        assert_eq!(serde_json::to_string(&Runtime(102)).unwrap(), "\"102 mins\"");
        let parsed: Runtime = serde_json::from_str("\"107 mins\"").unwrap();
        assert_eq!(parsed, Runtime(107));
    }

    #[test]
    fn test_runtime_rejects_other_formats() {
        for raw in ["\"107\"", "\"107 minutes\"", "\"abc mins\"", "107", "\"1 2 mins\""] {
            assert!(serde_json::from_str::<Runtime>(raw).is_err(), "{raw}");
        }
    }

    #[test]
    fn test_valid_movie() {
        let mut v = Validator::new();
        validate_movie(&mut v, &casablanca());
        assert!(v.valid(), "{:?}", v.errors());
    }

    #[test]
    fn test_invalid_movie_fields() {
        let movie = Movie {
            title: String::new(),
            year: 1500,
            runtime: Runtime(-1),
            genres: vec!["drama".to_string(), "drama".to_string()],
            ..casablanca()
        };

        let mut v = Validator::new();
        validate_movie(&mut v, &movie);
        let errors = v.into_errors();
        assert_eq!(errors["title"], "must be provided");
        assert_eq!(errors["year"], "must be greater than 1888");
        assert_eq!(errors["runtime"], "must be a positive integer");
        assert_eq!(errors["genres"], "must not contain duplicate values");
    }

    #[test]
    fn test_too_many_genres() {
        let movie = Movie {
            genres: (0..6).map(|i| format!("genre-{i}")).collect(),
            ..casablanca()
        };
        let mut v = Validator::new();
        validate_movie(&mut v, &movie);
        assert_eq!(v.errors()["genres"], "must not contain more than 5 genres");
    }

    #[test]
    fn test_patch_only_touches_present_fields() {
        let mut movie = casablanca();
        let patch: MoviePatch = serde_json::from_str(r#"{"year": 1943}"#).unwrap();
        patch.apply(&mut movie);

        assert_eq!(movie.year, 1943);
        assert_eq!(movie.title, "Casablanca");
        assert_eq!(movie.runtime, Runtime(102));
        assert_eq!(movie.version, 1);
    }

    fn stored(genres: &str) -> movies::Model {
        movies::Model {
            id: 3,
            created_at: "2026-01-01T00:00:00+00:00".to_string(),
            title: "Casablanca".to_string(),
            year: 1942,
            runtime: 102,
            genres: genres.to_string(),
            version: 4,
        }
    }

    #[test]
    fn test_decode_stored_movie() {
        let movie = Movie::try_from(stored(r#"["drama","romance"]"#)).unwrap();
        assert_eq!(movie.genres, vec!["drama", "romance"]);
        assert_eq!(movie.runtime, Runtime(102));
        assert_eq!(movie.version, 4);
    }

    #[test]
    fn test_corrupt_genres_column_is_an_invariant_violation() {
        for raw in ["not json", "", r#"{"drama": true}"#, "[1, 2]"] {
            let err = Movie::try_from(stored(raw)).unwrap_err();
            assert!(err.0.contains("undecodable genres"), "{raw}: {err}");
        }
    }
}
