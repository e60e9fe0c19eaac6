use crate::PgStore;
use async_trait::async_trait;
use marquee_core::StoreError;
use marquee_core::store::PermissionStore;
use sqlx::Row;

#[async_trait]
impl PermissionStore for PgStore {
    async fn permissions_for_user(&self, user_id: i64) -> Result<Vec<String>, StoreError> {
        let rows = self
            .bounded(
                sqlx::query(
                    "SELECT permissions.code
                     FROM permissions
                     INNER JOIN users_permissions ON users_permissions.permission_id = permissions.id
                     WHERE users_permissions.user_id = $1",
                )
                .bind(user_id)
                .fetch_all(&self.pool),
            )
            .await?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("code"))
            .collect::<Result<Vec<_>, _>>()
            .map_err(StoreError::backend)
    }

    async fn grant_permissions(&self, user_id: i64, codes: &[String]) -> Result<(), StoreError> {
        self.bounded(
            sqlx::query(
                "INSERT INTO users_permissions (user_id, permission_id)
                 SELECT $1, permissions.id FROM permissions WHERE permissions.code = ANY($2)
                 ON CONFLICT DO NOTHING",
            )
            .bind(user_id)
            .bind(codes)
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }
}
