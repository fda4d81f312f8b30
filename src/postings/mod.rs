use axum::Router;
use serde::{Deserialize, Serialize};

use crate::state::AppState;

pub mod need;
pub mod service;
pub mod share;

/// Lifecycle status shared by both posting variants. Transitions are
/// one-shot and unconditional: any posting can be set to Accepted or
/// Rejected at any time, last write wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "status_enum")]
pub enum PostingStatus {
    Pending,
    Accepted,
    Rejected,
}

/// Response for create/delete mutations: a human-readable message plus the
/// affected id.
#[derive(Debug, Serialize)]
pub struct MutationResponse {
    pub message: String,
    pub id: i32,
}

/// Response for accept/reject: message plus the updated record.
#[derive(Debug, Serialize)]
pub struct StatusResponse<P> {
    pub message: String,
    pub posting: P,
}

#[derive(Debug, Serialize)]
pub struct BulkDeleteResponse {
    pub message: String,
    pub deleted: u64,
}

pub fn router() -> Router<AppState> {
    Router::new().merge(need::router()).merge(share::router())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_to_wire_strings() {
        assert_eq!(
            serde_json::to_string(&PostingStatus::Pending).unwrap(),
            r#""Pending""#
        );
        assert_eq!(
            serde_json::to_string(&PostingStatus::Accepted).unwrap(),
            r#""Accepted""#
        );
        assert_eq!(
            serde_json::to_string(&PostingStatus::Rejected).unwrap(),
            r#""Rejected""#
        );
    }

    #[test]
    fn status_deserializes_from_wire_strings() {
        let s: PostingStatus = serde_json::from_str(r#""Accepted""#).unwrap();
        assert_eq!(s, PostingStatus::Accepted);
        assert!(serde_json::from_str::<PostingStatus>(r#""accepted""#).is_err());
    }
}
