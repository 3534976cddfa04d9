use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::{Storage, StorageError, StorageResult};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AdminUser {
    pub id: Uuid,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl Storage {
    pub async fn find_admin_by_username(&self, username: &str) -> StorageResult<Option<AdminUser>> {
        let admin = sqlx::query_as::<_, AdminUser>("SELECT * FROM admin_users WHERE LOWER(username) = LOWER($1)")
            .bind(username.trim())
            .fetch_optional(&self.pool)
            .await?;
        Ok(admin)
    }

    pub async fn get_admin(&self, id: Uuid) -> StorageResult<AdminUser> {
        sqlx::query_as::<_, AdminUser>("SELECT * FROM admin_users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StorageError::NotFound("admin"))
    }

    pub async fn count_admins(&self) -> StorageResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM admin_users").fetch_one(&self.pool).await?;
        Ok(count)
    }

    pub async fn create_admin(&self, username: &str, password_hash: &str) -> StorageResult<AdminUser> {
        let admin = sqlx::query_as::<_, AdminUser>(
            "INSERT INTO admin_users (id, username, password_hash, created_at) VALUES ($1, $2, $3, NOW()) RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(username.trim())
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await?;
        tracing::info!(admin_id = %admin.id, username = %admin.username, "admin user created");
        Ok(admin)
    }

    pub async fn update_admin_password(&self, id: Uuid, password_hash: &str) -> StorageResult<()> {
        let result = sqlx::query("UPDATE admin_users SET password_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound("admin"));
        }
        Ok(())
    }

    pub async fn touch_admin_login(&self, id: Uuid) -> StorageResult<()> {
        sqlx::query("UPDATE admin_users SET last_login_at = NOW() WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(())
    }
}
