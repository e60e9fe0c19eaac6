//! Listing filters, sorting and pagination metadata for the catalog.

use crate::validation::Validator;
use serde::Serialize;

/// Sort keys accepted by `GET /v1/movies`.
pub const SORT_SAFELIST: &[&str] = &[
    "id", "title", "year", "runtime", "-id", "-title", "-year", "-runtime",
];

const MAX_PAGE: i64 = 10_000_000;
const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortColumn {
    Id,
    Title,
    Year,
    Runtime,
}

impl SortColumn {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortColumn::Id => "id",
            SortColumn::Title => "title",
            SortColumn::Year => "year",
            SortColumn::Runtime => "runtime",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sort {
    pub column: SortColumn,
    pub direction: SortDirection,
}

impl Sort {
    /// Parse a safelisted sort key; a leading `-` means descending.
    pub fn parse(raw: &str) -> Option<Self> {
        if !SORT_SAFELIST.contains(&raw) {
            return None;
        }
        let (direction, name) = match raw.strip_prefix('-') {
            Some(name) => (SortDirection::Desc, name),
            None => (SortDirection::Asc, raw),
        };
        let column = match name {
            "id" => SortColumn::Id,
            "title" => SortColumn::Title,
            "year" => SortColumn::Year,
            "runtime" => SortColumn::Runtime,
            _ => return None,
        };
        Some(Self { column, direction })
    }
}

impl Default for Sort {
    fn default() -> Self {
        Self {
            column: SortColumn::Id,
            direction: SortDirection::Asc,
        }
    }
}

/// Paging and ordering requested by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filters {
    pub page: i64,
    pub page_size: i64,
    pub sort: String,
}

impl Default for Filters {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 20,
            sort: "id".to_string(),
        }
    }
}

impl Filters {
    pub fn validate(&self, v: &mut Validator) {
        v.check(self.page > 0, "page", "must be greater than zero");
        v.check(self.page <= MAX_PAGE, "page", "must be a maximum of 10 million");
        v.check(self.page_size > 0, "page_size", "must be greater than zero");
        v.check(self.page_size <= MAX_PAGE_SIZE, "page_size", "must be a maximum of 100");
        v.check(Sort::parse(&self.sort).is_some(), "sort", "invalid sort value");
    }

    /// The parsed sort; callers validate first, anything else falls back to `id`.
    pub fn sort(&self) -> Sort {
        Sort::parse(&self.sort).unwrap_or_default()
    }

    pub fn limit(&self) -> i64 {
        self.page_size
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.page_size
    }
}

/// A catalog listing request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MovieQuery {
    /// Words that must all appear in the title; empty matches everything.
    pub title: String,
    /// Genres that must all be present on the movie.
    pub genres: Vec<String>,
    pub filters: Filters,
}

/// Pagination summary returned alongside a listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Metadata {
    pub current_page: i64,
    pub page_size: i64,
    pub first_page: i64,
    pub last_page: i64,
    pub total_records: i64,
}

impl Metadata {
    /// All-zero when there are no records.
    pub fn calculate(total_records: i64, page: i64, page_size: i64) -> Self {
        if total_records == 0 {
            return Self::default();
        }
        Self {
            current_page: page,
            page_size,
            first_page: 1,
            last_page: (total_records + page_size - 1) / page_size,
            total_records,
        }
    }
}
