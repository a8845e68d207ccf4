//! API error responses.
//!
//! Every handler failure becomes an [`ObserverError`], rendered as
//! `{ "error": "<message>", "status": <code> }` with the matching HTTP
//! status.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// A failed API request.
#[derive(Debug, thiserror::Error)]
pub enum ObserverError {
    /// No meme has the requested name.
    #[error("meme '{name}' not found")]
    UnknownMeme {
        /// The name from the request path.
        name: String,
    },

    /// `?trend=` named something other than `random`, `up`, or `down`.
    #[error("unknown trend '{value}', expected random, up, or down")]
    UnknownTrend {
        /// The rejected query value.
        value: String,
    },
}

impl ObserverError {
    /// HTTP status for this error.
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::UnknownMeme { .. } => StatusCode::NOT_FOUND,
            Self::UnknownTrend { .. } => StatusCode::BAD_REQUEST,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    status: u16,
}

impl IntoResponse for ObserverError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            error: self.to_string(),
            status: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}
