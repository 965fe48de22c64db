//! HTTP error responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use log::error;

use crate::graph::GraphError;
use crate::ingest::IngestError;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized,
    NotFound(&'static str),
    Unavailable(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            ApiError::Unauthorized => {
                (StatusCode::UNAUTHORIZED, "you are not signed in").into_response()
            }
            ApiError::NotFound(what) => {
                (StatusCode::NOT_FOUND, format!("not found: {}", what)).into_response()
            }
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg).into_response(),
            ApiError::Internal(msg) => {
                error!("{}", msg);
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::Internal(format!("db error: {}", err))
    }
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::EmptyBatch
            | IngestError::MalformedCondition { .. }
            | IngestError::TimestampOutOfRange { .. } => {
                ApiError::BadRequest(err.to_string())
            }
            IngestError::UnknownDevice => ApiError::NotFound("isu"),
            IngestError::BufferFull { .. } => ApiError::Unavailable(err.to_string()),
            IngestError::Registry(e) => e.into(),
        }
    }
}

impl From<GraphError> for ApiError {
    fn from(err: GraphError) -> Self {
        match err {
            GraphError::Db(e) => e.into(),
            GraphError::DayOutOfRange(_) => {
                ApiError::BadRequest("bad format: datetime".to_string())
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferFull;

    fn status_of(err: impl Into<ApiError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn test_ingest_errors_map_to_status() {
        assert_eq!(status_of(IngestError::EmptyBatch), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(IngestError::UnknownDevice), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(IngestError::TimestampOutOfRange {
                index: 0,
                enqueued: 0,
                timestamp: i64::MIN
            }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(IngestError::BufferFull {
                enqueued: 0,
                source: BufferFull { capacity: 1 }
            }),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(IngestError::Registry(sqlx::Error::PoolTimedOut)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_graph_errors_are_server_errors() {
        let err = GraphError::Classify(crate::classify::ClassifyError::UnexpectedTrueCount(4));
        assert_eq!(status_of(err), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            status_of(GraphError::TimestampOutOfRange(i64::MIN)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(status_of(GraphError::DayOutOfRange(i64::MAX)), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(ApiError::Unauthorized), StatusCode::UNAUTHORIZED);
    }
}
