use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool, sqlite::SqliteRow};

use crate::{
    db::error::{DbError, DbResult},
    models::{CreateUser, User},
};

pub struct SqliteUserRepo {
    pool: SqlitePool,
}

impl SqliteUserRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn map_user(row: &SqliteRow) -> DbResult<User> {
    Ok(User {
        id: row.try_get("id")?,
        auth_id: row.try_get("auth_id")?,
        email: row.try_get("email")?,
        name: row.try_get("name")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl crate::db::repos::UserRepo for SqliteUserRepo {
    async fn create(&self, input: CreateUser) -> DbResult<User> {
        let result = sqlx::query("INSERT INTO users (auth_id, email, name) VALUES (?, ?, ?)")
            .bind(&input.auth_id)
            .bind(&input.email)
            .bind(&input.name)
            .execute(&self.pool)
            .await?;

        let id = result.last_insert_rowid();
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::Internal("user vanished after insert".to_string()))
    }

    async fn get_by_id(&self, id: i64) -> DbResult<Option<User>> {
        let row = sqlx::query(
            "SELECT id, auth_id, email, name, created_at, updated_at FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_user).transpose()
    }

    async fn get_by_session(&self, token: &str, now: DateTime<Utc>) -> DbResult<Option<User>> {
        let row = sqlx::query(
            r#"
            SELECT u.id, u.auth_id, u.email, u.name, u.created_at, u.updated_at
            FROM users u
            JOIN sessions s ON s.user_id = u.id
            WHERE s.token = ? AND s.expires_at > ?
            "#,
        )
        .bind(token)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_user).transpose()
    }

    async fn create_session(
        &self,
        user_id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> DbResult<()> {
        sqlx::query("INSERT INTO sessions (token, user_id, expires_at) VALUES (?, ?, ?)")
            .bind(token)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
