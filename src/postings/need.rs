use async_trait::async_trait;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use tracing::instrument;

use super::service::{self, PostingStore, PostingVariant};
use super::{BulkDeleteResponse, MutationResponse, PostingStatus, StatusResponse};
use crate::auth::{AuthUser, User};
use crate::error::ApiResult;
use crate::state::AppState;

/// A request for food. `user_name` is a display snapshot taken at creation;
/// user records are immutable, so it never drifts.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct NeedPosting {
    pub id: i32,
    pub user_id: i32,
    pub user_name: String,
    pub date: String,
    pub time: String,
    pub location: String,
    pub place_name: String,
    pub contact_name: String,
    pub contact_number: String,
    pub activity_name: String,
    pub quantity: i32,
    pub notes: String,
    pub status: PostingStatus,
}

#[derive(Debug, Deserialize)]
pub struct CreateNeed {
    pub date: String,
    pub time: String,
    pub location: String,
    pub place_name: String,
    pub contact_name: String,
    pub contact_number: String,
    pub activity_name: String,
    pub quantity: i32,
    pub notes: String,
}

impl PostingVariant for NeedPosting {
    type New = CreateNeed;

    const KIND: &'static str = "need";
}

#[async_trait]
impl PostingStore<NeedPosting> for PgPool {
    async fn insert(&self, owner: &User, new: CreateNeed) -> anyhow::Result<i32> {
        let (id,): (i32,) = sqlx::query_as(
            r#"
            INSERT INTO need_postings
                (user_id, user_name, date, time, location, place_name,
                 contact_name, contact_number, activity_name, quantity, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id
            "#,
        )
        .bind(owner.id)
        .bind(&owner.name)
        .bind(&new.date)
        .bind(&new.time)
        .bind(&new.location)
        .bind(&new.place_name)
        .bind(&new.contact_name)
        .bind(&new.contact_number)
        .bind(&new.activity_name)
        .bind(new.quantity)
        .bind(&new.notes)
        .fetch_one(self)
        .await?;
        Ok(id)
    }

    async fn list_all(&self) -> anyhow::Result<Vec<NeedPosting>> {
        let rows = sqlx::query_as::<_, NeedPosting>(
            r#"
            SELECT id, user_id, user_name, date, time, location, place_name,
                   contact_name, contact_number, activity_name, quantity, notes, status
            FROM need_postings
            ORDER BY id
            "#,
        )
        .fetch_all(self)
        .await?;
        Ok(rows)
    }

    async fn delete_by_owner(&self, owner_id: i32) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM need_postings WHERE user_id = $1")
            .bind(owner_id)
            .execute(self)
            .await?;
        Ok(result.rows_affected())
    }

    async fn owner_of(&self, id: i32) -> anyhow::Result<Option<i32>> {
        let row: Option<(i32,)> = sqlx::query_as("SELECT user_id FROM need_postings WHERE id = $1")
            .bind(id)
            .fetch_optional(self)
            .await?;
        Ok(row.map(|(user_id,)| user_id))
    }

    async fn delete_by_id(&self, id: i32) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM need_postings WHERE id = $1")
            .bind(id)
            .execute(self)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_status(
        &self,
        id: i32,
        status: PostingStatus,
    ) -> anyhow::Result<Option<NeedPosting>> {
        let row = sqlx::query_as::<_, NeedPosting>(
            r#"
            UPDATE need_postings
            SET status = $2
            WHERE id = $1
            RETURNING id, user_id, user_name, date, time, location, place_name,
                      contact_name, contact_number, activity_name, quantity, notes, status
            "#,
        )
        .bind(id)
        .bind(status)
        .fetch_optional(self)
        .await?;
        Ok(row)
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/need", post(create_need).get(list_need).delete(delete_owned_need))
        .route("/need/accept/:id", post(accept_need))
        .route("/need/reject/:id", post(reject_need))
        .route("/need/:id", delete(delete_need))
}

#[instrument(skip(state, actor, payload))]
async fn create_need(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Json(payload): Json<CreateNeed>,
) -> ApiResult<(StatusCode, Json<MutationResponse>)> {
    let id = service::create::<NeedPosting, _>(&state.db, &actor, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(MutationResponse {
            message: "Data successfully inserted".into(),
            id,
        }),
    ))
}

#[instrument(skip(state))]
async fn list_need(State(state): State<AppState>) -> ApiResult<Json<Vec<NeedPosting>>> {
    let postings = service::list_all::<NeedPosting, _>(&state.db).await?;
    Ok(Json(postings))
}

#[instrument(skip(state, actor))]
async fn delete_owned_need(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
) -> ApiResult<Json<BulkDeleteResponse>> {
    let deleted = service::delete_owned::<NeedPosting, _>(&state.db, &actor).await?;
    Ok(Json(BulkDeleteResponse {
        message: "All food requests successfully deleted".into(),
        deleted,
    }))
}

#[instrument(skip(state, actor))]
async fn accept_need(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i32>,
) -> ApiResult<Json<StatusResponse<NeedPosting>>> {
    let posting =
        service::set_status::<NeedPosting, _>(&state.db, &actor, id, PostingStatus::Accepted).await?;
    Ok(Json(StatusResponse {
        message: "Food request successfully accepted".into(),
        posting,
    }))
}

#[instrument(skip(state, actor))]
async fn reject_need(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i32>,
) -> ApiResult<Json<StatusResponse<NeedPosting>>> {
    let posting =
        service::set_status::<NeedPosting, _>(&state.db, &actor, id, PostingStatus::Rejected).await?;
    Ok(Json(StatusResponse {
        message: "Food request is rejected".into(),
        posting,
    }))
}

#[instrument(skip(state, actor))]
async fn delete_need(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i32>,
) -> ApiResult<Json<MutationResponse>> {
    service::delete_one::<NeedPosting, _>(&state.db, &actor, id).await?;
    Ok(Json(MutationResponse {
        message: format!("Food request with ID {id} successfully deleted"),
        id,
    }))
}
