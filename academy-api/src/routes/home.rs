//! Landing Page Routes
//!
//! - `GET /` - the full landing page view-model
//! - `GET /fragments/home/:section` - one section, for lazy loading

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    routing::get,
    Json, Router,
};
use serde_json::Value;

use crate::error::{ApiError, ApiResult};
use crate::home::{HomePageContext, HomePageContextBuilder, HomeSection};
use crate::state::AppState;

/// Header htmx sends with partial requests.
const HX_REQUEST: &str = "hx-request";

async fn build_context(state: &AppState) -> ApiResult<HomePageContext> {
    let offset = state.overview.config().utc_offset();
    let context = HomePageContextBuilder::new(state.content.as_ref(), state.clock.now_utc(), offset)
        .build()
        .await?;
    Ok(context)
}

fn is_partial_request(headers: &HeaderMap) -> bool {
    headers
        .get(HX_REQUEST)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.trim().eq_ignore_ascii_case("true"))
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// GET / - Landing page
pub async fn home_page(State(state): State<AppState>) -> ApiResult<Json<HomePageContext>> {
    Ok(Json(build_context(&state).await?))
}

/// GET /fragments/home/:section - One landing section
///
/// Partial (htmx) requests get `force_visible: true` so the section renders
/// without waiting for its reveal animation.
pub async fn home_section(
    State(state): State<AppState>,
    Path(section): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    let section: HomeSection = section.parse().map_err(ApiError::section_not_found)?;
    let context = build_context(&state).await?;
    Ok(Json(context.section_payload(section, is_partial_request(&headers))?))
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(home_page))
        .route("/fragments/home/:section", get(home_section))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_partial_request_detection() {
        let mut headers = HeaderMap::new();
        assert!(!is_partial_request(&headers));

        headers.insert(HX_REQUEST, HeaderValue::from_static("true"));
        assert!(is_partial_request(&headers));

        headers.insert(HX_REQUEST, HeaderValue::from_static("false"));
        assert!(!is_partial_request(&headers));
    }
}
