use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response}
};

pub const LOCKED_COOKIES_MESSAGE: &str = "Browser cookies are locked and anonymous access is blocked. Please close your browser (Chrome/Edge) temporarily and try again to allow access.";

/// Failures of the fetch pipeline, from request validation to file transfer.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("{0}")]
    Validation(String),

    #[error("This video is private or unavailable")]
    Private,

    #[error("This video is age-restricted and cannot be downloaded")]
    AgeRestricted,

    #[error("Requested format is not available")]
    FormatUnavailable,

    #[error("{}", LOCKED_COOKIES_MESSAGE)]
    CredentialsLocked,

    #[error("{0}")]
    Engine(String),

    #[error("yt-dlp did not finish within {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("Downloaded file not found in temp directory")]
    OutputNotFound,

    #[error("failed to parse video metadata: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("file system error: {0}")]
    Io(#[from] std::io::Error)
}

impl FetchError {
    /// Maps an engine diagnostic onto the access/availability variants the
    /// HTTP layer distinguishes, falling back to [`FetchError::Engine`].
    pub fn from_engine_message(message: String) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("private video") {
            FetchError::Private
        } else if lower.contains("age-restricted")
            || lower.contains("age restricted")
            || lower.contains("confirm your age")
        {
            FetchError::AgeRestricted
        } else if lower.contains("requested format is not available") {
            FetchError::FormatUnavailable
        } else {
            FetchError::Engine(message)
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            FetchError::Validation(_) => StatusCode::BAD_REQUEST,
            FetchError::Private | FetchError::FormatUnavailable => StatusCode::NOT_FOUND,
            FetchError::AgeRestricted => StatusCode::FORBIDDEN,
            FetchError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            FetchError::CredentialsLocked
            | FetchError::Engine(_)
            | FetchError::OutputNotFound
            | FetchError::Metadata(_)
            | FetchError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

#[derive(Debug)]
pub struct AppError {
    pub message: String,
    pub status: StatusCode
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!("handler error: {}", self.message);
        } else {
            tracing::warn!("request rejected ({}): {}", self.status, self.message);
        }
        (self.status, Json(serde_json::json!({ "error": self.message }))).into_response()
    }
}

impl From<FetchError> for AppError {
    fn from(err: FetchError) -> Self {
        AppError::new(err.status(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_private() {
        let err = FetchError::from_engine_message("ERROR: [youtube] abc: Private video. Sign in".to_string());
        assert!(matches!(err, FetchError::Private));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_classify_age_restricted() {
        let err = FetchError::from_engine_message(
            "ERROR: Sign in to confirm your age. This video may be inappropriate".to_string()
        );
        assert!(matches!(err, FetchError::AgeRestricted));
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_classify_format_unavailable() {
        let err = FetchError::from_engine_message(
            "ERROR: [youtube] abc: Requested format is not available".to_string()
        );
        assert!(matches!(err, FetchError::FormatUnavailable));
    }

    #[test]
    fn test_classify_other_keeps_message() {
        let err = FetchError::from_engine_message("ERROR: unable to download webpage".to_string());
        assert_eq!(err.to_string(), "ERROR: unable to download webpage");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_message_mentioning_page_is_not_age_restricted() {
        let err = FetchError::from_engine_message("ERROR: unable to extract page data".to_string());
        assert!(matches!(err, FetchError::Engine(_)));
    }

    #[test]
    fn test_timeout_maps_to_gateway_timeout() {
        let err = FetchError::Timeout(Duration::from_secs(120));
        assert_eq!(err.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(err.to_string(), "yt-dlp did not finish within 120s");
    }

    #[test]
    fn test_app_error_from_fetch_error() {
        let err: AppError = FetchError::CredentialsLocked.into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, LOCKED_COOKIES_MESSAGE);
    }
}
