//! The rewritten feed endpoint

use axum::{
    Router,
    extract::State,
    http::{Method, StatusCode, Uri, header},
    response::{IntoResponse, Response},
    routing::any,
};
use calfix_core::modify_ics;
use tracing::info;

use crate::routes::AppError;
use crate::state::AppState;

pub const CALENDAR_PATH: &str = "/calendar.ics";
const CALENDAR_CONTENT_TYPE: &str = "text/calendar";

pub fn router() -> Router<AppState> {
    Router::new().route(CALENDAR_PATH, any(calendar_feed))
}

/// GET /calendar.ics - Fetch the upstream feed, patch it and return it
async fn calendar_feed(
    method: Method,
    uri: Uri,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    // only a plain GET is served, methods and query strings look like an unknown route
    if method != Method::GET || uri.query().is_some() {
        return Ok((StatusCode::NOT_FOUND, "File not found").into_response());
    }

    let upstream = state.fetcher.fetch().await?;
    let modified = modify_ics(&upstream, &state.pipeline)?;

    info!(
        upstream = %state.fetcher.url(),
        bytes = modified.len(),
        "Served modified calendar"
    );

    Ok(([(header::CONTENT_TYPE, CALENDAR_CONTENT_TYPE)], modified).into_response())
}
