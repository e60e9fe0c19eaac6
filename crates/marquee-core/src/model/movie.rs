//! The movie catalog resource.

use super::Versioned;
use crate::validation::Validator;
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Running time in minutes. JSON form is `"<n> mins"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Runtime(pub i32);

#[derive(Debug, thiserror::Error)]
#[error("invalid runtime format")]
pub struct RuntimeFormatError;

impl TryFrom<String> for Runtime {
    type Error = RuntimeFormatError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let (minutes, unit) = value.split_once(' ').ok_or(RuntimeFormatError)?;
        if unit != "mins" {
            return Err(RuntimeFormatError);
        }
        minutes
            .parse::<i32>()
            .map(Runtime)
            .map_err(|_| RuntimeFormatError)
    }
}

impl From<Runtime> for String {
    fn from(runtime: Runtime) -> Self {
        runtime.to_string()
    }
}

impl fmt::Display for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} mins", self.0)
    }
}

/// The client-editable part of a movie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovieDetails {
    pub title: String,
    pub year: i32,
    pub runtime: Runtime,
    pub genres: Vec<String>,
}

impl MovieDetails {
    pub fn validate(&self, v: &mut Validator) {
        v.check(!self.title.is_empty(), "title", "must be provided");
        v.check(self.title.len() <= 500, "title", "must not be more than 500 bytes long");

        v.check(self.year != 0, "year", "must be provided");
        v.check(self.year >= 1888, "year", "must be greater than 1888");
        v.check(
            self.year <= Utc::now().year(),
            "year",
            "must not be in the future",
        );

        v.check(self.runtime.0 != 0, "runtime", "must be provided");
        v.check(self.runtime.0 > 0, "runtime", "must be a positive integer");

        v.check(!self.genres.is_empty(), "genres", "must contain at least 1 genre");
        v.check(self.genres.len() <= 5, "genres", "must not contain more than 5 genres");
        let unique: HashSet<&str> = self.genres.iter().map(String::as_str).collect();
        v.check(
            unique.len() == self.genres.len(),
            "genres",
            "must not contain duplicate values",
        );
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Movie {
    pub id: i64,
    #[serde(skip_serializing)]
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub details: MovieDetails,
    pub version: i32,
}

impl Versioned for Movie {
    fn id(&self) -> i64 {
        self.id
    }

    fn version(&self) -> i32 {
        self.version
    }

    fn set_version(&mut self, version: i32) {
        self.version = version;
    }
}
