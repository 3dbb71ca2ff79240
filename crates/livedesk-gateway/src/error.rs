// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Failure responses.
//!
//! Every failure is a JSON body `{"success": false, "error", "code"}` with a
//! status matching the error class. Storage and internal detail is logged and
//! replaced by a generic message.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use livedesk_core::LivedeskError;
use serde::Serialize;

/// Wire shape of a failed request.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub code: &'static str,
}

/// A [`LivedeskError`] on its way to the client.
#[derive(Debug)]
pub struct ApiError(pub LivedeskError);

impl From<LivedeskError> for ApiError {
    fn from(err: LivedeskError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            LivedeskError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            LivedeskError::Validation(_) => StatusCode::BAD_REQUEST,
            LivedeskError::NotFound { .. } => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn body(&self) -> ErrorResponse {
        let (error, code) = if self.0.is_client_error() {
            (self.0.to_string(), self.0.code())
        } else {
            ("internal error".to_string(), "internal")
        };
        ErrorResponse {
            success: false,
            error,
            code,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if !self.0.is_client_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        (self.status(), Json(self.body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_keep_their_message() {
        let err = ApiError(LivedeskError::Validation("message is required".into()));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        let body = err.body();
        assert!(!body.success);
        assert_eq!(body.code, "validation");
        assert!(body.error.contains("message is required"));
    }

    #[test]
    fn unauthorized_and_not_found_statuses() {
        assert_eq!(
            ApiError(LivedeskError::invalid_widget_key()).status(),
            StatusCode::UNAUTHORIZED
        );
        let missing = ApiError(LivedeskError::NotFound {
            kind: "visitor",
            id: "v_1".into(),
        });
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        assert_eq!(missing.body().code, "not_found");
    }

    #[test]
    fn storage_detail_is_hidden() {
        let err = ApiError(LivedeskError::Storage {
            source: "disk I/O error at /var/lib/livedesk".into(),
        });
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = err.body();
        assert_eq!(body.code, "internal");
        assert_eq!(body.error, "internal error");
    }
}
