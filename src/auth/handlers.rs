use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument};

use super::dto::{LoginRequest, SignupRequest, SignupResponse, TokenResponse};
use super::password;
use super::repo::User;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const MIN_PASSWORD_LEN: usize = 8;

fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    Json(mut payload): Json<SignupRequest>,
) -> ApiResult<(StatusCode, Json<SignupResponse>)> {
    payload.email = payload.email.trim().to_lowercase();
    payload.name = payload.name.trim().to_string();

    if payload.name.is_empty() {
        return Err(ApiError::BadRequest("Name must not be empty".into()));
    }
    if !is_valid_email(&payload.email) {
        return Err(ApiError::BadRequest("Invalid email".into()));
    }
    if payload.password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::BadRequest("Password too short".into()));
    }

    // Friendly pre-check; the unique constraints on users.name/users.email
    // are the actual enforcement under concurrent signups.
    if User::exists_by_name_or_email(&state.db, &payload.name, &payload.email).await? {
        return Err(ApiError::Conflict("Username or Email already in use.".into()));
    }

    let hash = password::hash_password(&payload.password)?;

    let user = match User::create(&state.db, &payload.name, &payload.email, &payload.phone, &hash)
        .await
    {
        Ok(user) => user,
        Err(e) => {
            // A racing signup can slip past the pre-check and land on the
            // constraint instead.
            if let Some(sqlx::Error::Database(db_err)) = e.downcast_ref::<sqlx::Error>() {
                if db_err.is_unique_violation() {
                    return Err(ApiError::Conflict("Username or Email already in use.".into()));
                }
            }
            return Err(ApiError::Internal(e));
        }
    };

    info!(user_id = user.id, "user created");
    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            message: "User created successfully!".into(),
            user_id: user.id,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let user = User::find_by_name_or_email(&state.db, &payload.username)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    let ok = password::verify_password(&payload.password, &user.password_hash)?;
    if !ok {
        return Err(ApiError::Forbidden("Wrong username or password".into()));
    }

    let token = state.jwt.sign(user.id)?;

    info!(user_id = user.id, "login ok");
    Ok(Json(TokenResponse {
        access_token: token,
        token_type: "Bearer".into(),
        username: user.name,
    }))
}
