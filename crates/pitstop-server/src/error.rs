use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use pitstop_core::PitstopError;

// ---------------------------------------------------------------------------
// Internal sentinel for explicit 404 errors
// ---------------------------------------------------------------------------

/// Carries an explicit HTTP 404 through the `anyhow::Error` chain for
/// failures that have no `PitstopError` variant (unknown routes).
#[derive(Debug)]
struct NotFoundError(String);

impl std::fmt::Display for NotFoundError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for NotFoundError {}

// ---------------------------------------------------------------------------
// AppError
// ---------------------------------------------------------------------------

/// Unified error type for HTTP responses.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    /// 400 Bad Request with the given message.
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self(PitstopError::InvalidStatus(msg.into()).into())
    }

    /// 404 Not Found with the given message.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self(NotFoundError(msg.into()).into())
    }

    fn status(&self) -> StatusCode {
        if self.0.downcast_ref::<NotFoundError>().is_some() {
            return StatusCode::NOT_FOUND;
        }
        match self.0.downcast_ref::<PitstopError>() {
            Some(e) => match e {
                PitstopError::SprintNotFound(_)
                | PitstopError::IssueNotFound(_)
                | PitstopError::MemberNotFound(_)
                | PitstopError::RecommendationNotFound(_)
                | PitstopError::NoActiveSprint => StatusCode::NOT_FOUND,
                PitstopError::NotInitialized
                | PitstopError::InvalidStatus(_)
                | PitstopError::InvalidPriority(_)
                | PitstopError::InvalidConfig(_) => StatusCode::BAD_REQUEST,
                PitstopError::TrackerNotConfigured
                | PitstopError::TrackerUnavailable(_)
                | PitstopError::NoDataSource(_)
                | PitstopError::Http(_) => StatusCode::SERVICE_UNAVAILABLE,
                PitstopError::Store(_)
                | PitstopError::Io(_)
                | PitstopError::Yaml(_)
                | PitstopError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            None => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %format!("{:#}", self.0), "request failed");
        }
        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
