use crate::PgStore;
use async_trait::async_trait;
use marquee_core::StoreError;
use marquee_core::model::{NewUser, PasswordHash, User};
use marquee_core::store::{UserStore, VersionedStore};
use sqlx::Row;
use sqlx::postgres::PgRow;

const USER_COLUMNS: &str = "id, created_at, name, email::text AS email, password_hash, activated, version";

fn user_from_row(row: &PgRow) -> Result<User, sqlx::Error> {
    Ok(User {
        id: row.try_get("id")?,
        created_at: row.try_get("created_at")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        password_hash: PasswordHash::new(row.try_get::<String, _>("password_hash")?),
        activated: row.try_get("activated")?,
        version: row.try_get("version")?,
    })
}

#[async_trait]
impl VersionedStore<User> for PgStore {
    async fn get(&self, id: i64) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = self
            .bounded(sqlx::query(&sql).bind(id).fetch_optional(&self.pool))
            .await?;
        row.as_ref()
            .map(user_from_row)
            .transpose()
            .map_err(StoreError::backend)
    }

    async fn conditional_update(
        &self,
        record: &User,
        expected_version: i32,
    ) -> Result<Option<i32>, StoreError> {
        let row = self
            .bounded(
                sqlx::query(
                    "UPDATE users
                     SET name = $1, email = $2, password_hash = $3, activated = $4, version = version + 1
                     WHERE id = $5 AND version = $6
                     RETURNING version",
                )
                .bind(&record.name)
                .bind(&record.email)
                .bind(record.password_hash.as_str())
                .bind(record.activated)
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
impl UserStore for PgStore {
    async fn insert_user(&self, user: &NewUser) -> Result<User, StoreError> {
        let sql = format!(
            "INSERT INTO users (name, email, password_hash, activated)
             VALUES ($1, $2, $3, $4)
             RETURNING {USER_COLUMNS}"
        );
        let row = self
            .bounded(
                sqlx::query(&sql)
                    .bind(&user.name)
                    .bind(&user.email)
                    .bind(user.password_hash.as_str())
                    .bind(user.activated)
                    .fetch_one(&self.pool),
            )
            .await?;
        user_from_row(&row).map_err(StoreError::backend)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1::citext");
        let row = self
            .bounded(sqlx::query(&sql).bind(email).fetch_optional(&self.pool))
            .await?;
        row.as_ref()
            .map(user_from_row)
            .transpose()
            .map_err(StoreError::backend)
    }
}
