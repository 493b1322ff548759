use agora_types::wire::ErrorBody;
use agora_types::AgoraError;
use axum::extract::rejection::JsonRejection;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

/// Relay-specific error wrapper that maps to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error(transparent)]
    Agora(#[from] AgoraError),
}

impl From<JsonRejection> for RelayError {
    fn from(rejection: JsonRejection) -> Self {
        RelayError::Agora(AgoraError::Validation(rejection.body_text()))
    }
}

impl RelayError {
    fn status_and_kind(&self) -> (StatusCode, &'static str) {
        match self {
            RelayError::Agora(AgoraError::Unauthorized(_)) => {
                (StatusCode::UNAUTHORIZED, "unauthorized")
            }
            RelayError::Agora(AgoraError::UnknownRecipient(_)) => {
                (StatusCode::NOT_FOUND, "unknown recipient")
            }
            RelayError::Agora(AgoraError::Validation(_)) => {
                (StatusCode::BAD_REQUEST, "validation error")
            }
            RelayError::Agora(AgoraError::Conflict(_)) => (StatusCode::CONFLICT, "conflict"),
            RelayError::Agora(AgoraError::InvalidSignature) => {
                (StatusCode::FORBIDDEN, "invalid signature")
            }
            RelayError::Agora(AgoraError::QueueFull(_)) => {
                (StatusCode::TOO_MANY_REQUESTS, "queue full")
            }
            RelayError::Agora(AgoraError::RateLimited) => {
                (StatusCode::TOO_MANY_REQUESTS, "rate limited")
            }
            RelayError::Agora(AgoraError::Transport(_)) => {
                (StatusCode::BAD_GATEWAY, "transport error")
            }
            RelayError::Agora(AgoraError::Serialization(_)) => {
                (StatusCode::BAD_REQUEST, "serialization error")
            }
            RelayError::Agora(AgoraError::Internal(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error")
            }
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let (status, kind) = self.status_and_kind();
        let body = ErrorBody {
            error: kind.to_string(),
            detail: self.to_string(),
        };

        if status == StatusCode::UNAUTHORIZED {
            return (
                status,
                [(header::WWW_AUTHENTICATE, "Bearer")],
                axum::Json(body),
            )
                .into_response();
        }
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: AgoraError) -> StatusCode {
        RelayError::from(err).into_response().status()
    }

    #[test]
    fn error_kinds_map_to_statuses() {
        assert_eq!(status_of(AgoraError::Unauthorized("x".into())), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(AgoraError::UnknownRecipient("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(status_of(AgoraError::Validation("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(AgoraError::Conflict("x".into())), StatusCode::CONFLICT);
        assert_eq!(status_of(AgoraError::InvalidSignature), StatusCode::FORBIDDEN);
        assert_eq!(status_of(AgoraError::QueueFull("x".into())), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(status_of(AgoraError::RateLimited), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            status_of(AgoraError::Internal("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn unauthorized_carries_challenge_header() {
        let resp = RelayError::from(AgoraError::Unauthorized("x".into())).into_response();
        assert_eq!(resp.headers()[header::WWW_AUTHENTICATE], "Bearer");
    }
}
