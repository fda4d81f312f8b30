use axum::Router;

use crate::state::AppState;

mod dto;
pub mod extractors;
pub mod handlers;
pub mod jwt;
pub mod password;
pub mod repo;

pub use extractors::AuthUser;
pub use repo::User;

pub fn router() -> Router<AppState> {
    handlers::router()
}
