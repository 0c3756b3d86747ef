//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use fulfillment::FulfillmentError;
use storage::StoreError;
use thiserror::Error;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client (e.g. a malformed id in the path).
    BadRequest(String),
    /// Error from the catalog service or the fulfillment core.
    Fulfillment(FulfillmentError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = match self {
            ApiError::BadRequest(msg) => {
                return error_body(StatusCode::BAD_REQUEST, msg);
            }
            ApiError::Fulfillment(err) => err,
        };

        if let FulfillmentError::Rejected(lines) = &err {
            let body = serde_json::json!({ "error": "rejected", "lines": lines });
            return (StatusCode::CONFLICT, axum::Json(body)).into_response();
        }

        let status = status_for(&err);
        if status.is_server_error() {
            tracing::error!(error = %err, retryable = err.is_retryable(), "request failed");
        }

        let body = serde_json::json!({
            "error": err.to_string(),
            "retryable": err.is_retryable(),
        });
        (status, axum::Json(body)).into_response()
    }
}

fn error_body(status: StatusCode, message: String) -> Response {
    let body = serde_json::json!({ "error": message });
    (status, axum::Json(body)).into_response()
}

fn status_for(err: &FulfillmentError) -> StatusCode {
    match err {
        FulfillmentError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        FulfillmentError::Rejected(_) | FulfillmentError::InvalidTransition { .. } => {
            StatusCode::CONFLICT
        }
        FulfillmentError::NotFound { .. } => StatusCode::NOT_FOUND,
        FulfillmentError::CommitFailed(_) => StatusCode::SERVICE_UNAVAILABLE,
        FulfillmentError::Store(StoreError::Conflict { .. }) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<FulfillmentError> for ApiError {
    fn from(err: FulfillmentError) -> Self {
        ApiError::Fulfillment(err)
    }
}

/// Errors that stop the server from starting.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to install Prometheus recorder: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("failed to connect to database: {0}")]
    Database(#[from] sqlx::Error),

    #[error("failed to prepare store: {0}")]
    Store(#[from] StoreError),

    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::ProductId;
    use domain::OrderStatus;
    use fulfillment::{LineFailure, LineFailureReason};

    async fn json(response: Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_rejection_lists_lines() {
        let product_id = ProductId::new();
        let err = ApiError::from(FulfillmentError::Rejected(vec![LineFailure::new(
            product_id,
            LineFailureReason::Inactive,
        )]));

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let body = json(response).await;
        assert_eq!(body["error"], "rejected");
        assert_eq!(body["lines"][0]["product_id"], product_id.to_string());
        assert_eq!(body["lines"][0]["reason"], "inactive");
    }

    #[tokio::test]
    async fn test_commit_failure_is_retryable_503() {
        let err = ApiError::from(FulfillmentError::CommitFailed(StoreError::Unavailable(
            "connection reset".to_string(),
        )));

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json(response).await["retryable"], true);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(&FulfillmentError::InvalidRequest("no lines".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&FulfillmentError::NotFound {
                entity: "order",
                id: "x".to_string()
            }),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&FulfillmentError::InvalidTransition {
                current: OrderStatus::Cancelled,
                action: "cancel"
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&FulfillmentError::Internal("join error".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
