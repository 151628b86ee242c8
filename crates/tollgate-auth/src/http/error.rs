//! Error responses for the OAuth endpoints.

use axum::Json;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, ClientError};

/// RFC 6749 error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub error_description: String,
}

impl AuthError {
    /// HTTP status for this error.
    #[must_use]
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::Client(ClientError::BadClientSecret) | Self::Unauthorized { .. } => {
                StatusCode::UNAUTHORIZED
            }
            Self::Client(_) | Self::Grant(_) | Self::InvalidRequest { .. } => {
                StatusCode::BAD_REQUEST
            }
            Self::Storage { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Configuration { .. } | Self::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn public_description(&self) -> String {
        match self {
            Self::Storage { .. } => "the service is temporarily unavailable".to_string(),
            Self::Configuration { .. } | Self::Internal { .. } => {
                "an internal error occurred".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.http_status();

        if self.is_server_error() {
            tracing::error!(error = %self, category = %self.category(), "Request failed");
        } else {
            tracing::debug!(kind = self.kind(), status = status.as_u16(), "Request rejected");
        }

        let mut headers = HeaderMap::new();
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
        if status == StatusCode::UNAUTHORIZED {
            let challenge = match &self {
                AuthError::Client(_) => "Basic realm=\"oauth2\"",
                _ => "Bearer realm=\"oauth2\"",
            };
            headers.insert(header::WWW_AUTHENTICATE, HeaderValue::from_static(challenge));
        }
        if status == StatusCode::SERVICE_UNAVAILABLE {
            headers.insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
        }

        let body = ErrorBody {
            error: self.oauth_error_code().to_string(),
            error_description: self.public_description(),
        };
        (status, headers, Json(body)).into_response()
    }
}
