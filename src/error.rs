use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::{auth::AuthError, drinks::DrinkError};

/// Failure outcome of a request, rendered as
/// `{"success": false, "error": <status>, "message": <text>}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid request")]
    BadRequest,
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("Resource not found")]
    NotFound,
    #[error("Unprocessable")]
    Unprocessable,
    #[error("Internal Server Error")]
    Internal,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest => StatusCode::BAD_REQUEST,
            ApiError::Auth(e) => e.status(),
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Unprocessable => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DrinkError> for ApiError {
    fn from(err: DrinkError) -> Self {
        match err {
            DrinkError::NotFound(_) => ApiError::NotFound,
            other => {
                error!(error = %other, "drink operation failed");
                ApiError::Unprocessable
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut body = json!({
            "success": false,
            "error": status.as_u16(),
            "message": self.to_string(),
        });
        if let ApiError::Auth(e) = &self {
            body["code"] = e.code().into();
        }
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_of(err: ApiError) -> (StatusCode, serde_json::Value) {
        let res = err.into_response();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn fixed_messages_per_status() {
        let (status, body) = body_of(ApiError::Unprocessable).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body, json!({"success": false, "error": 422, "message": "Unprocessable"}));

        let (_, body) = body_of(ApiError::NotFound).await;
        assert_eq!(body["message"], "Resource not found");
        let (_, body) = body_of(ApiError::BadRequest).await;
        assert_eq!(body["message"], "Invalid request");
    }

    #[tokio::test]
    async fn auth_errors_carry_code_and_description() {
        let (status, body) = body_of(AuthError::PermissionDenied.into()).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], 403);
        assert_eq!(body["code"], "unauthorized");
        assert_eq!(body["message"], "Permission not found.");
    }

    #[test]
    fn missing_drink_is_not_found() {
        assert!(matches!(ApiError::from(DrinkError::NotFound(7)), ApiError::NotFound));
        assert!(matches!(
            ApiError::from(DrinkError::DuplicateTitle("water".into())),
            ApiError::Unprocessable
        ));
    }
}
