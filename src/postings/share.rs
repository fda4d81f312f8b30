use std::collections::HashMap;

use async_trait::async_trait;
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    routing::{delete, post},
    Json, Router,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use tracing::instrument;
use uuid::Uuid;

use super::service::{self, PostingStore, PostingVariant};
use super::{BulkDeleteResponse, MutationResponse, PostingStatus, StatusResponse};
use crate::auth::{AuthUser, User};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::storage::StorageClient;

const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// An offer of food. Carries everything a need posting does plus the food
/// description, expiry, container and pickup details, and an optional
/// image URL produced by the object store before insertion.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SharePosting {
    pub id: i32,
    pub user_id: i32,
    pub user_name: String,
    pub date: String,
    pub time: String,
    pub location: String,
    pub contact_name: String,
    pub contact_number: String,
    pub activity_name: String,
    pub food_name: String,
    pub food_kind: String,
    pub quantity: i32,
    pub notes: String,
    pub expiry_date: String,
    pub expiry_time: String,
    pub food_type: Option<String>,
    pub container: Option<String>,
    pub picked_up: Option<String>,
    pub image_url: Option<String>,
    pub status: PostingStatus,
}

#[derive(Debug, Deserialize)]
pub struct CreateShare {
    pub date: String,
    pub time: String,
    pub location: String,
    pub contact_name: String,
    pub contact_number: String,
    pub activity_name: String,
    pub food_name: String,
    pub food_kind: String,
    pub quantity: i32,
    pub notes: String,
    pub expiry_date: String,
    pub expiry_time: String,
    pub food_type: Option<String>,
    pub container: Option<String>,
    pub picked_up: Option<String>,
    pub image_url: Option<String>,
}

impl PostingVariant for SharePosting {
    type New = CreateShare;

    const KIND: &'static str = "share";
}

#[async_trait]
impl PostingStore<SharePosting> for PgPool {
    async fn insert(&self, owner: &User, new: CreateShare) -> anyhow::Result<i32> {
        let (id,): (i32,) = sqlx::query_as(
            r#"
            INSERT INTO share_postings
                (user_id, user_name, date, time, location, contact_name,
                 contact_number, activity_name, food_name, food_kind, quantity,
                 notes, expiry_date, expiry_time, food_type, container,
                 picked_up, image_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
                    $14, $15, $16, $17, $18)
            RETURNING id
            "#,
        )
        .bind(owner.id)
        .bind(&owner.name)
        .bind(&new.date)
        .bind(&new.time)
        .bind(&new.location)
        .bind(&new.contact_name)
        .bind(&new.contact_number)
        .bind(&new.activity_name)
        .bind(&new.food_name)
        .bind(&new.food_kind)
        .bind(new.quantity)
        .bind(&new.notes)
        .bind(&new.expiry_date)
        .bind(&new.expiry_time)
        .bind(&new.food_type)
        .bind(&new.container)
        .bind(&new.picked_up)
        .bind(&new.image_url)
        .fetch_one(self)
        .await?;
        Ok(id)
    }

    async fn list_all(&self) -> anyhow::Result<Vec<SharePosting>> {
        let rows = sqlx::query_as::<_, SharePosting>(
            r#"
            SELECT id, user_id, user_name, date, time, location, contact_name,
                   contact_number, activity_name, food_name, food_kind, quantity,
                   notes, expiry_date, expiry_time, food_type, container,
                   picked_up, image_url, status
            FROM share_postings
            ORDER BY id
            "#,
        )
        .fetch_all(self)
        .await?;
        Ok(rows)
    }

    async fn delete_by_owner(&self, owner_id: i32) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM share_postings WHERE user_id = $1")
            .bind(owner_id)
            .execute(self)
            .await?;
        Ok(result.rows_affected())
    }

    async fn owner_of(&self, id: i32) -> anyhow::Result<Option<i32>> {
        let row: Option<(i32,)> =
            sqlx::query_as("SELECT user_id FROM share_postings WHERE id = $1")
                .bind(id)
                .fetch_optional(self)
                .await?;
        Ok(row.map(|(user_id,)| user_id))
    }

    async fn delete_by_id(&self, id: i32) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM share_postings WHERE id = $1")
            .bind(id)
            .execute(self)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_status(
        &self,
        id: i32,
        status: PostingStatus,
    ) -> anyhow::Result<Option<SharePosting>> {
        let row = sqlx::query_as::<_, SharePosting>(
            r#"
            UPDATE share_postings
            SET status = $2
            WHERE id = $1
            RETURNING id, user_id, user_name, date, time, location, contact_name,
                      contact_number, activity_name, food_name, food_kind, quantity,
                      notes, expiry_date, expiry_time, food_type, container,
                      picked_up, image_url, status
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
        .route(
            "/share",
            post(create_share).get(list_share).delete(delete_owned_share),
        )
        .route("/share/accept/:id", post(accept_share))
        .route("/share/reject/:id", post(reject_share))
        .route("/share/:id", delete(delete_share))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

struct ImagePart {
    filename: String,
    content_type: String,
    body: Bytes,
}

/// Splits the multipart body into text fields and the optional image part.
async fn read_share_form(
    mut mp: Multipart,
) -> ApiResult<(HashMap<String, String>, Option<ImagePart>)> {
    let mut fields = HashMap::new();
    let mut image = None;

    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        if name == "image" {
            let filename = field
                .file_name()
                .map(str::to_string)
                .unwrap_or_else(|| "image".into());
            let content_type = field
                .content_type()
                .map(str::to_string)
                .unwrap_or_else(|| "application/octet-stream".into());
            let body = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(e.to_string()))?;
            image = Some(ImagePart {
                filename,
                content_type,
                body,
            });
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| ApiError::BadRequest(e.to_string()))?;
            fields.insert(name, value);
        }
    }

    Ok((fields, image))
}

fn require(fields: &mut HashMap<String, String>, name: &str) -> ApiResult<String> {
    fields
        .remove(name)
        .ok_or_else(|| ApiError::BadRequest(format!("{name} is required")))
}

fn build_create_share(
    mut fields: HashMap<String, String>,
    image_url: Option<String>,
) -> ApiResult<CreateShare> {
    let quantity = require(&mut fields, "quantity")?
        .parse::<i32>()
        .map_err(|_| ApiError::BadRequest("quantity must be an integer".into()))?;
    Ok(CreateShare {
        date: require(&mut fields, "date")?,
        time: require(&mut fields, "time")?,
        location: require(&mut fields, "location")?,
        contact_name: require(&mut fields, "contact_name")?,
        contact_number: require(&mut fields, "contact_number")?,
        activity_name: require(&mut fields, "activity_name")?,
        food_name: require(&mut fields, "food_name")?,
        food_kind: require(&mut fields, "food_kind")?,
        quantity,
        notes: require(&mut fields, "notes")?,
        expiry_date: require(&mut fields, "expiry_date")?,
        expiry_time: require(&mut fields, "expiry_time")?,
        food_type: fields.remove("food_type"),
        container: fields.remove("container"),
        picked_up: fields.remove("picked_up"),
        image_url,
    })
}

fn image_object_key(filename: &str) -> String {
    let ext = filename.rsplit('.').next().filter(|e| *e != filename);
    match ext {
        Some(ext) => format!("share_food/{}.{}", Uuid::new_v4(), ext),
        None => format!("share_food/{}", Uuid::new_v4()),
    }
}

/// Validates the text fields first, then uploads the image (when present)
/// through the object store; a rejected form must not leave an orphaned
/// object in the bucket. The workflow itself does no binary I/O.
async fn prepare_create_share(
    storage: &dyn StorageClient,
    fields: HashMap<String, String>,
    image: Option<ImagePart>,
) -> ApiResult<CreateShare> {
    let mut new = build_create_share(fields, None)?;

    if let Some(part) = image {
        let key = image_object_key(&part.filename);
        let url = storage
            .put_object(&key, part.body, &part.content_type)
            .await?;
        new.image_url = Some(url);
    }

    Ok(new)
}

#[instrument(skip(state, actor, mp))]
async fn create_share(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    mp: Multipart,
) -> ApiResult<(StatusCode, Json<CreatedShareResponse>)> {
    let (fields, image) = read_share_form(mp).await?;

    let new = prepare_create_share(state.storage.as_ref(), fields, image).await?;
    let image_url = new.image_url.clone();
    let id = service::create::<SharePosting, _>(&state.db, &actor, new).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedShareResponse {
            message: "Shared food successfully inserted".into(),
            id,
            image_url,
        }),
    ))
}

#[derive(Debug, Serialize)]
pub struct CreatedShareResponse {
    pub message: String,
    pub id: i32,
    pub image_url: Option<String>,
}

#[instrument(skip(state))]
async fn list_share(State(state): State<AppState>) -> ApiResult<Json<Vec<SharePosting>>> {
    let postings = service::list_all::<SharePosting, _>(&state.db).await?;
    Ok(Json(postings))
}

#[instrument(skip(state, actor))]
async fn delete_owned_share(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
) -> ApiResult<Json<BulkDeleteResponse>> {
    let deleted = service::delete_owned::<SharePosting, _>(&state.db, &actor).await?;
    Ok(Json(BulkDeleteResponse {
        message: "All food shares successfully deleted".into(),
        deleted,
    }))
}

#[instrument(skip(state, actor))]
async fn accept_share(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i32>,
) -> ApiResult<Json<StatusResponse<SharePosting>>> {
    let posting =
        service::set_status::<SharePosting, _>(&state.db, &actor, id, PostingStatus::Accepted)
            .await?;
    Ok(Json(StatusResponse {
        message: "Food request successfully accepted".into(),
        posting,
    }))
}

#[instrument(skip(state, actor))]
async fn reject_share(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i32>,
) -> ApiResult<Json<StatusResponse<SharePosting>>> {
    let posting =
        service::set_status::<SharePosting, _>(&state.db, &actor, id, PostingStatus::Rejected)
            .await?;
    Ok(Json(StatusResponse {
        message: "Food request is rejected".into(),
        posting,
    }))
}

#[instrument(skip(state, actor))]
async fn delete_share(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<i32>,
) -> ApiResult<Json<MutationResponse>> {
    service::delete_one::<SharePosting, _>(&state.db, &actor, id).await?;
    Ok(Json(MutationResponse {
        message: format!("Food request with ID {id} successfully deleted"),
        id,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_fields() -> HashMap<String, String> {
        [
            ("date", "2025-06-01"),
            ("time", "10:00"),
            ("location", "-6.2,106.8"),
            ("contact_name", "Budi"),
            ("contact_number", "0812"),
            ("activity_name", "Friday kitchen"),
            ("food_name", "Nasi kotak"),
            ("food_kind", "Rice box"),
            ("quantity", "25"),
            ("notes", "halal"),
            ("expiry_date", "2025-06-01"),
            ("expiry_time", "18:00"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn builds_create_share_from_complete_form() {
        let new = build_create_share(full_fields(), Some("https://x/y.jpg".into())).unwrap();
        assert_eq!(new.quantity, 25);
        assert_eq!(new.food_name, "Nasi kotak");
        assert_eq!(new.image_url.as_deref(), Some("https://x/y.jpg"));
        assert!(new.food_type.is_none());
    }

    #[test]
    fn missing_mandatory_field_is_bad_request() {
        let mut fields = full_fields();
        fields.remove("food_name");
        let err = build_create_share(fields, None).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[test]
    fn non_numeric_quantity_is_bad_request() {
        let mut fields = full_fields();
        fields.insert("quantity".into(), "many".into());
        let err = build_create_share(fields, None).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::storage::StorageError;

    #[derive(Default)]
    struct CountingStorage {
        puts: AtomicUsize,
    }

    #[async_trait]
    impl StorageClient for CountingStorage {
        async fn put_object(
            &self,
            key: &str,
            _body: Bytes,
            _content_type: &str,
        ) -> Result<String, StorageError> {
            self.puts.fetch_add(1, Ordering::SeqCst);
            Ok(self.public_url(key))
        }

        fn public_url(&self, key: &str) -> String {
            format!("https://fake.local/{key}")
        }
    }

    fn image_part() -> ImagePart {
        ImagePart {
            filename: "lunch.jpg".into(),
            content_type: "image/jpeg".into(),
            body: Bytes::from_static(b"\xff\xd8\xff"),
        }
    }

    #[tokio::test]
    async fn invalid_form_never_reaches_the_object_store() {
        let storage = CountingStorage::default();
        let mut fields = full_fields();
        fields.remove("food_name");

        let err = prepare_create_share(&storage, fields, Some(image_part()))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
        assert_eq!(storage.puts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn valid_form_uploads_once_and_carries_the_url() {
        let storage = CountingStorage::default();
        let new = prepare_create_share(&storage, full_fields(), Some(image_part()))
            .await
            .unwrap();
        assert_eq!(storage.puts.load(Ordering::SeqCst), 1);
        let url = new.image_url.expect("image url set");
        assert!(url.starts_with("https://fake.local/share_food/"));
        assert!(url.ends_with(".jpg"));
    }

    #[tokio::test]
    async fn form_without_image_skips_the_object_store() {
        let storage = CountingStorage::default();
        let new = prepare_create_share(&storage, full_fields(), None)
            .await
            .unwrap();
        assert_eq!(storage.puts.load(Ordering::SeqCst), 0);
        assert!(new.image_url.is_none());
    }

    #[test]
    fn image_keys_keep_extension_and_never_collide() {
        let a = image_object_key("lunch.jpg");
        let b = image_object_key("lunch.jpg");
        assert!(a.starts_with("share_food/"));
        assert!(a.ends_with(".jpg"));
        assert_ne!(a, b);

        let bare = image_object_key("noext");
        assert!(bare.starts_with("share_food/"));
        assert!(!bare.contains("noext"));
    }
}
