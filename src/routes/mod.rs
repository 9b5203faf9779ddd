pub mod calendar;

use axum::{
    Router,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use calfix_core::IcsError;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::fetch::FetchError;
use crate::state::AppState;

/// Build the full application router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(calendar::router())
        .fallback(not_found)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "File not found")
}

/// Per-request failures, converted to a status code and a plain-text body.
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Modify(#[from] IcsError),
}

impl AppError {
    fn stage(&self) -> &'static str {
        match self {
            AppError::Fetch(_) => "fetch",
            AppError::Modify(_) => "modify",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::Fetch(_) => StatusCode::BAD_GATEWAY,
            AppError::Modify(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Error message including every underlying cause.
    fn detail(&self) -> String {
        let mut detail = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            detail.push_str(": ");
            detail.push_str(&cause.to_string());
            source = std::error::Error::source(cause);
        }
        detail
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let detail = self.detail();
        error!(stage = self.stage(), error = %detail, "Failed to serve calendar");
        (self.status(), detail).into_response()
    }
}
