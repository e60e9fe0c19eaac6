use crate::{PgStore, corrupt};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marquee_core::StoreError;
use marquee_core::model::{Scope, TokenHash, TokenRecord};
use marquee_core::store::TokenStore;
use sqlx::Row;

#[async_trait]
impl TokenStore for PgStore {
    async fn insert_token(&self, record: &TokenRecord) -> Result<(), StoreError> {
        self.bounded(
            sqlx::query("INSERT INTO tokens (hash, user_id, expiry, scope) VALUES ($1, $2, $3, $4)")
                .bind(&record.hash.as_bytes()[..])
                .bind(record.user_id)
                .bind(record.expiry)
                .bind(record.scope.as_str())
                .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn find_token(
        &self,
        hash: &TokenHash,
        scope: Scope,
    ) -> Result<Option<TokenRecord>, StoreError> {
        let row = self
            .bounded(
                sqlx::query(
                    "SELECT hash, user_id, expiry, scope FROM tokens WHERE hash = $1 AND scope = $2",
                )
                .bind(&hash.as_bytes()[..])
                .bind(scope.as_str())
                .fetch_optional(&self.pool),
            )
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let raw_hash: Vec<u8> = row.try_get("hash").map_err(StoreError::backend)?;
        let raw_scope: String = row.try_get("scope").map_err(StoreError::backend)?;
        let expiry: DateTime<Utc> = row.try_get("expiry").map_err(StoreError::backend)?;
        let user_id: i64 = row.try_get("user_id").map_err(StoreError::backend)?;

        Ok(Some(TokenRecord {
            hash: TokenHash::from_slice(&raw_hash)
                .ok_or_else(|| corrupt("hash", format!("{} bytes", raw_hash.len())))?,
            user_id,
            scope: raw_scope.parse().map_err(|e| corrupt("scope", e))?,
            expiry,
        }))
    }

    async fn delete_tokens_for_user(&self, scope: Scope, user_id: i64) -> Result<u64, StoreError> {
        let result = self
            .bounded(
                sqlx::query("DELETE FROM tokens WHERE scope = $1 AND user_id = $2")
                    .bind(scope.as_str())
                    .bind(user_id)
                    .execute(&self.pool),
            )
            .await?;
        Ok(result.rows_affected())
    }
}
