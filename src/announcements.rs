use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use tracing::instrument;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Broadcast message: no owner, no status, unauthenticated CRUD.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Announcement {
    pub id: i32,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct AnnouncementBody {
    pub title: String,
    pub description: String,
}

impl Announcement {
    async fn find_by_id(db: &PgPool, id: i32) -> anyhow::Result<Option<Announcement>> {
        let row = sqlx::query_as::<_, Announcement>(
            "SELECT id, title, description FROM announcements WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(row)
    }

    async fn list(db: &PgPool) -> anyhow::Result<Vec<Announcement>> {
        let rows = sqlx::query_as::<_, Announcement>(
            "SELECT id, title, description FROM announcements ORDER BY id",
        )
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    async fn create(db: &PgPool, body: &AnnouncementBody) -> anyhow::Result<Announcement> {
        let row = sqlx::query_as::<_, Announcement>(
            r#"
            INSERT INTO announcements (title, description)
            VALUES ($1, $2)
            RETURNING id, title, description
            "#,
        )
        .bind(&body.title)
        .bind(&body.description)
        .fetch_one(db)
        .await?;
        Ok(row)
    }

    async fn update(
        db: &PgPool,
        id: i32,
        body: &AnnouncementBody,
    ) -> anyhow::Result<Option<Announcement>> {
        let row = sqlx::query_as::<_, Announcement>(
            r#"
            UPDATE announcements
            SET title = $2, description = $3
            WHERE id = $1
            RETURNING id, title, description
            "#,
        )
        .bind(id)
        .bind(&body.title)
        .bind(&body.description)
        .fetch_optional(db)
        .await?;
        Ok(row)
    }

    async fn delete(db: &PgPool, id: i32) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM announcements WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_announcement).get(list_announcements))
        .route(
            "/:id",
            get(get_announcement)
                .put(update_announcement)
                .delete(delete_announcement),
        )
}

#[instrument(skip(state, body))]
async fn create_announcement(
    State(state): State<AppState>,
    Json(body): Json<AnnouncementBody>,
) -> ApiResult<(StatusCode, Json<Announcement>)> {
    let created = Announcement::create(&state.db, &body).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[instrument(skip(state))]
async fn list_announcements(State(state): State<AppState>) -> ApiResult<Json<Vec<Announcement>>> {
    Ok(Json(Announcement::list(&state.db).await?))
}

#[instrument(skip(state))]
async fn get_announcement(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<Json<Announcement>> {
    let found = Announcement::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Announcement not found".into()))?;
    Ok(Json(found))
}

#[instrument(skip(state, body))]
async fn update_announcement(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(body): Json<AnnouncementBody>,
) -> ApiResult<Json<Announcement>> {
    let updated = Announcement::update(&state.db, id, &body)
        .await?
        .ok_or_else(|| ApiError::NotFound("Announcement not found".into()))?;
    Ok(Json(updated))
}

#[instrument(skip(state))]
async fn delete_announcement(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<StatusCode> {
    if !Announcement::delete(&state.db, id).await? {
        return Err(ApiError::NotFound("Announcement not found".into()));
    }
    Ok(StatusCode::NO_CONTENT)
}
