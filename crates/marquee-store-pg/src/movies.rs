use crate::PgStore;
use async_trait::async_trait;
use marquee_core::StoreError;
use marquee_core::model::{Metadata, Movie, MovieDetails, MovieQuery, Runtime};
use marquee_core::store::{MovieStore, VersionedStore};
use sqlx::Row;
use sqlx::postgres::PgRow;

const MOVIE_COLUMNS: &str = "id, created_at, title, year, runtime, genres, version";

fn movie_from_row(row: &PgRow) -> Result<Movie, sqlx::Error> {
    Ok(Movie {
        id: row.try_get("id")?,
        created_at: row.try_get("created_at")?,
        details: MovieDetails {
            title: row.try_get("title")?,
            year: row.try_get("year")?,
            runtime: Runtime(row.try_get("runtime")?),
            genres: row.try_get("genres")?,
        },
        version: row.try_get("version")?,
    })
}

#[async_trait]
impl VersionedStore<Movie> for PgStore {
    async fn get(&self, id: i64) -> Result<Option<Movie>, StoreError> {
        let sql = format!("SELECT {MOVIE_COLUMNS} FROM movies WHERE id = $1");
        let row = self
            .bounded(sqlx::query(&sql).bind(id).fetch_optional(&self.pool))
            .await?;
        row.as_ref()
            .map(movie_from_row)
            .transpose()
            .map_err(StoreError::backend)
    }

    async fn conditional_update(
        &self,
        record: &Movie,
        expected_version: i32,
    ) -> Result<Option<i32>, StoreError> {
        let row = self
            .bounded(
                sqlx::query(
                    "UPDATE movies
                     SET title = $1, year = $2, runtime = $3, genres = $4, version = version + 1
                     WHERE id = $5 AND version = $6
                     RETURNING version",
                )
                .bind(&record.details.title)
                .bind(record.details.year)
                .bind(record.details.runtime.0)
                .bind(&record.details.genres)
                .bind(record.id)
                .bind(expected_version)
                .fetch_optional(&self.pool),
            )
            .await?;
        row.map(|r| r.try_get::<i32, _>("version"))
            .transpose()
            .map_err(StoreError::backend)
    }
}

#[async_trait]
impl MovieStore for PgStore {
    async fn insert_movie(&self, details: &MovieDetails) -> Result<Movie, StoreError> {
        let sql = format!(
            "INSERT INTO movies (title, year, runtime, genres)
             VALUES ($1, $2, $3, $4)
             RETURNING {MOVIE_COLUMNS}"
        );
        let row = self
            .bounded(
                sqlx::query(&sql)
                    .bind(&details.title)
                    .bind(details.year)
                    .bind(details.runtime.0)
                    .bind(&details.genres)
                    .fetch_one(&self.pool),
            )
            .await?;
        movie_from_row(&row).map_err(StoreError::backend)
    }

    async fn delete_movie(&self, id: i64) -> Result<bool, StoreError> {
        let result = self
            .bounded(
                sqlx::query("DELETE FROM movies WHERE id = $1")
                    .bind(id)
                    .execute(&self.pool),
            )
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_movies(&self, query: &MovieQuery) -> Result<(Vec<Movie>, Metadata), StoreError> {
        let sort = query.filters.sort();
        // Column and direction come from a closed enum, never from the request text.
        let sql = format!(
            "SELECT count(*) OVER() AS total, {MOVIE_COLUMNS}
             FROM movies
             WHERE (to_tsvector('simple', title) @@ plainto_tsquery('simple', $1) OR $1 = '')
             AND (genres @> $2 OR $2 = '{{}}')
             ORDER BY {} {}, id ASC
             LIMIT $3 OFFSET $4",
            sort.column.as_str(),
            sort.direction.as_sql(),
        );

        let rows = self
            .bounded(
                sqlx::query(&sql)
                    .bind(&query.title)
                    .bind(&query.genres)
                    .bind(query.filters.limit())
                    .bind(query.filters.offset())
                    .fetch_all(&self.pool),
            )
            .await?;

        let mut total = 0;
        let mut movies = Vec::with_capacity(rows.len());
        for row in &rows {
            total = row.try_get::<i64, _>("total").map_err(StoreError::backend)?;
            movies.push(movie_from_row(row).map_err(StoreError::backend)?);
        }

        let metadata = Metadata::calculate(total, query.filters.page, query.filters.page_size);
        Ok((movies, metadata))
    }
}
