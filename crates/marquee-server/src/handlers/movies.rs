use crate::error::{ApiError, FieldErrors};
use crate::extract::{JsonBody, parse_id};
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::{Extension, Json};
use marquee_control::{AccessDecisionSequencer, Requirement};
use marquee_core::model::{
    Filters, Movie, MovieDetails, MovieQuery, PERMISSION_MOVIES_READ, PERMISSION_MOVIES_WRITE,
    Runtime,
};
use marquee_core::store::VersionedStore;
use marquee_core::{Identity, Validator};
use serde::Deserialize;
use serde_json::{Value, json};

/// Query string of `GET /v1/movies`. Everything arrives as text and is
/// validated here so bad numbers become field errors.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListParams {
    pub title: Option<String>,
    pub genres: Option<String>,
    pub page: Option<String>,
    pub page_size: Option<String>,
    pub sort: Option<String>,
}

fn read_int(v: &mut Validator, key: &str, raw: Option<&str>, default: i64) -> i64 {
    match raw {
        None | Some("") => default,
        Some(s) => s.parse().unwrap_or_else(|_| {
            v.add_error(key, "must be an integer value");
            default
        }),
    }
}

fn read_csv(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// `GET /v1/movies`
pub async fn list(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Query(params): Query<ListParams>,
) -> Result<Json<Value>, ApiError> {
    state
        .access()
        .authorize(&identity, Requirement::Permission(PERMISSION_MOVIES_READ))
        .await?;

    let mut v = Validator::new();
    let defaults = Filters::default();
    let filters = Filters {
        page: read_int(&mut v, "page", params.page.as_deref(), defaults.page),
        page_size: read_int(&mut v, "page_size", params.page_size.as_deref(), defaults.page_size),
        sort: params.sort.unwrap_or(defaults.sort),
    };
    filters.validate(&mut v);
    if !v.valid() {
        return Err(ApiError::Validation(v.into_errors()));
    }

    let query = MovieQuery {
        title: params.title.unwrap_or_default(),
        genres: read_csv(params.genres.as_deref()),
        filters,
    };
    let (movies, metadata) = state.movies().list_movies(&query).await?;

    Ok(Json(json!({ "movies": movies, "metadata": metadata })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CreateMovieInput {
    pub title: String,
    pub year: i32,
    pub runtime: Option<Runtime>,
    pub genres: Vec<String>,
}

/// `POST /v1/movies`
pub async fn create(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    JsonBody(input): JsonBody<CreateMovieInput>,
) -> Result<(StatusCode, HeaderMap, Json<Value>), ApiError> {
    state
        .access()
        .authorize(&identity, Requirement::Permission(PERMISSION_MOVIES_WRITE))
        .await?;

    let details = MovieDetails {
        title: input.title,
        year: input.year,
        runtime: input.runtime.unwrap_or(Runtime(0)),
        genres: input.genres,
    };
    let mut v = Validator::new();
    details.validate(&mut v);
    if !v.valid() {
        return Err(ApiError::Validation(v.into_errors()));
    }

    let movie = state.movies().insert_movie(&details).await?;

    let mut headers = HeaderMap::new();
    let location = HeaderValue::from_str(&format!("/v1/movies/{}", movie.id))
        .map_err(|e| ApiError::Internal(e.into()))?;
    headers.insert(header::LOCATION, location);

    Ok((StatusCode::CREATED, headers, Json(json!({ "movie": movie }))))
}

/// `GET /v1/movies/{id}`
pub async fn show(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(raw_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state
        .access()
        .authorize(&identity, Requirement::Permission(PERMISSION_MOVIES_READ))
        .await?;

    let id = parse_id(&raw_id)?;
    let movie = VersionedStore::<Movie>::get(&**state.movies(), id)
        .await?
        .ok_or_else(ApiError::not_found)?;

    Ok(Json(json!({ "movie": movie })))
}

/// Partial update. `version` is the version the client last read.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UpdateMovieInput {
    pub title: Option<String>,
    pub year: Option<i32>,
    pub runtime: Option<Runtime>,
    pub genres: Option<Vec<String>>,
    pub version: Option<i32>,
}

/// `PATCH /v1/movies/{id}`
pub async fn update(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(raw_id): Path<String>,
    JsonBody(input): JsonBody<UpdateMovieInput>,
) -> Result<Json<Value>, ApiError> {
    state
        .access()
        .authorize(&identity, Requirement::Permission(PERMISSION_MOVIES_WRITE))
        .await?;

    let id = parse_id(&raw_id)?;
    let Some(expected_version) = input.version else {
        return Err(ApiError::field("version", "must be provided"));
    };

    let outcome = state
        .movie_guard()
        .compare_and_swap(id, expected_version, move |movie: &mut Movie| {
            let details = &mut movie.details;
            if let Some(title) = input.title {
                details.title = title;
            }
            if let Some(year) = input.year {
                details.year = year;
            }
            if let Some(runtime) = input.runtime {
                details.runtime = runtime;
            }
            if let Some(genres) = input.genres {
                details.genres = genres;
            }

            let mut v = Validator::new();
            details.validate(&mut v);
            if v.valid() {
                Ok(())
            } else {
                Err::<(), FieldErrors>(v.into_errors())
            }
        })
        .await?;
    let movie = AccessDecisionSequencer::settle(outcome)?;

    Ok(Json(json!({ "movie": movie })))
}

/// `DELETE /v1/movies/{id}`
pub async fn delete(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(raw_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state
        .access()
        .authorize(&identity, Requirement::Permission(PERMISSION_MOVIES_WRITE))
        .await?;

    let id = parse_id(&raw_id)?;
    if !state.movies().delete_movie(id).await? {
        return Err(ApiError::not_found());
    }

    Ok(Json(json!({ "message": "movie successfully deleted" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_int() {
        let mut v = Validator::new();
        assert_eq!(read_int(&mut v, "page", None, 1), 1);
        assert_eq!(read_int(&mut v, "page", Some("3"), 1), 3);
        assert!(v.valid());
        assert_eq!(read_int(&mut v, "page", Some("three"), 1), 1);
        assert_eq!(v.errors()["page"], "must be an integer value");
    }

    #[test]
    fn test_read_csv() {
        assert_eq!(
            read_csv(Some("drama, comedy,,")),
            vec!["drama".to_string(), "comedy".to_string()]
        );
        assert!(read_csv(None).is_empty());
    }
}
