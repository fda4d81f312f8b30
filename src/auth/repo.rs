use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
}

impl User {
    /// Combined lookup used by both login and the signup uniqueness check:
    /// matches on display name or email with one query.
    pub async fn find_by_name_or_email(db: &PgPool, ident: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, phone, password_hash
            FROM users
            WHERE name = $1 OR email = $1
            "#,
        )
        .bind(ident)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Same as above but checks two distinct candidate values at once.
    pub async fn exists_by_name_or_email(
        db: &PgPool,
        name: &str,
        email: &str,
    ) -> anyhow::Result<bool> {
        let row: Option<(i32,)> = sqlx::query_as(
            r#"
            SELECT id FROM users
            WHERE name = $1 OR email = $2
            "#,
        )
        .bind(name)
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(row.is_some())
    }

    pub async fn find_by_id(db: &PgPool, id: i32) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, phone, password_hash
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn create(
        db: &PgPool,
        name: &str,
        email: &str,
        phone: &str,
        password_hash: &str,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, phone, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, email, phone, password_hash
            "#,
        )
        .bind(name)
        .bind(email)
        .bind(phone)
        .bind(password_hash)
        .fetch_one(db)
        .await?;
        Ok(user)
    }
}
