//! Login / Logout Routes
//!
//! Sessions are signed tokens carried in an HttpOnly cookie. Redirect
//! targets taken from `next` are only followed when they stay on this site.

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::auth::{
    clear_session_cookie, issue_session_token, resolve_next_url, session_cookie, SessionConfig,
    Viewer,
};
use crate::constants::{HOME_PATH, LOGIN_ERROR_MESSAGE, OVERVIEW_PATH};
use crate::error::ApiResult;
use crate::middleware::MaybeViewer;
use crate::state::AppState;

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

/// Login form body. `remember` is an HTML checkbox: present means on.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub remember: Option<String>,
    pub next: Option<String>,
}

impl LoginForm {
    fn remember(&self) -> bool {
        self.remember
            .as_deref()
            .is_some_and(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "on" | "true" | "1"))
    }
}

/// View-model for the login page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoginContext {
    pub next: Option<String>,
    pub username: String,
    pub error: Option<String>,
}

// ============================================================================
// HELPERS
// ============================================================================

fn request_is_secure(headers: &HeaderMap, config: &SessionConfig) -> bool {
    config.secure_cookie
        || headers
            .get("x-forwarded-proto")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|proto| proto.eq_ignore_ascii_case("https"))
}

fn safe_next(headers: &HeaderMap, config: &SessionConfig, candidate: Option<&str>) -> Option<String> {
    let host = headers.get(header::HOST).and_then(|v| v.to_str().ok());
    resolve_next_url(candidate, host, request_is_secure(headers, config))
}

/// First non-blank `next`; the form body wins over the query string.
fn pick_next<'a>(body: Option<&'a str>, query: Option<&'a str>) -> Option<&'a str> {
    [body, query]
        .into_iter()
        .flatten()
        .find(|candidate| !candidate.trim().is_empty())
}

/// Where a signed-in viewer lands: staff go to the dashboard.
fn landing_for(viewer: &Viewer, next: Option<String>) -> String {
    if viewer.is_staff {
        OVERVIEW_PATH.to_string()
    } else {
        next.unwrap_or_else(|| HOME_PATH.to_string())
    }
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// GET /login - Login page context, or a redirect when already signed in
pub async fn login_page(
    State(state): State<AppState>,
    MaybeViewer(viewer): MaybeViewer,
    headers: HeaderMap,
    Query(query): Query<NextQuery>,
) -> Response {
    let next = safe_next(&headers, &state.session, query.next.as_deref());
    if let Some(viewer) = viewer {
        return Redirect::to(&landing_for(&viewer, None)).into_response();
    }

    Json(LoginContext {
        next,
        ..LoginContext::default()
    })
    .into_response()
}

/// POST /login - Check credentials and start a session
pub async fn login(
    State(state): State<AppState>,
    MaybeViewer(current): MaybeViewer,
    headers: HeaderMap,
    Query(query): Query<NextQuery>,
    Form(form): Form<LoginForm>,
) -> ApiResult<Response> {
    if let Some(viewer) = current {
        return Ok(Redirect::to(&landing_for(&viewer, None)).into_response());
    }

    let config = &state.session;
    let candidate = pick_next(form.next.as_deref(), query.next.as_deref());
    let next = safe_next(&headers, config, candidate);
    let username = form.username.trim();

    let viewer = if username.is_empty() || form.password.is_empty() {
        None
    } else {
        state.credentials.authenticate(username, &form.password).await
    };

    let Some(viewer) = viewer else {
        tracing::info!(username = %username, "Login rejected");
        let context = LoginContext {
            next,
            username: username.to_string(),
            error: Some(LOGIN_ERROR_MESSAGE.to_string()),
        };
        return Ok((StatusCode::UNAUTHORIZED, Json(context)).into_response());
    };

    let remember = form.remember();
    let token = issue_session_token(config, &viewer, remember)?;
    let cookie = session_cookie(config, &token, remember.then_some(config.lifetime_secs));

    tracing::info!(username = %viewer.username, staff = viewer.is_staff, remember, "Login succeeded");
    let target = landing_for(&viewer, next);
    Ok(([(header::SET_COOKIE, cookie)], Redirect::to(&target)).into_response())
}

/// GET|POST /logout - End the session
pub async fn logout(
    State(state): State<AppState>,
    MaybeViewer(viewer): MaybeViewer,
    headers: HeaderMap,
    Query(query): Query<NextQuery>,
    form: Option<Form<NextQuery>>,
) -> Response {
    let config = &state.session;
    if let Some(viewer) = viewer {
        tracing::info!(username = %viewer.username, "Logout");
    }

    let body = form.as_ref().and_then(|Form(form)| form.next.as_deref());
    let target = safe_next(&headers, config, pick_next(body, query.next.as_deref()))
        .unwrap_or_else(|| HOME_PATH.to_string());
    ([(header::SET_COOKIE, clear_session_cookie(config))], Redirect::to(&target)).into_response()
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/login", get(login_page).post(login))
        .route("/logout", get(logout).post(logout))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_remember_checkbox_values() {
        let mut form = LoginForm::default();
        assert!(!form.remember());

        form.remember = Some("on".to_string());
        assert!(form.remember());

        form.remember = Some("false".to_string());
        assert!(!form.remember());
    }

    #[test]
    fn test_pick_next_prefers_body() {
        assert_eq!(pick_next(Some("/a"), Some("/b")), Some("/a"));
        assert_eq!(pick_next(None, Some("/b")), Some("/b"));
        assert_eq!(pick_next(Some("  "), Some("/b")), Some("/b"));
        assert_eq!(pick_next(Some(""), None), None);
        assert_eq!(pick_next(None, None), None);
    }

    #[test]
    fn test_landing_for_staff_ignores_next() {
        let staff = Viewer::new("admin").staff();
        assert_eq!(landing_for(&staff, Some("/courses".to_string())), OVERVIEW_PATH);

        let learner = Viewer::new("hoa");
        assert_eq!(landing_for(&learner, Some("/courses".to_string())), "/courses");
        assert_eq!(landing_for(&learner, None), HOME_PATH);
    }

    #[test]
    fn test_forwarded_proto_marks_request_secure() {
        let config = SessionConfig::default();
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("globalenglish.vn"));

        assert_eq!(
            safe_next(&headers, &config, Some("http://globalenglish.vn/courses")),
            Some("http://globalenglish.vn/courses".to_string())
        );

        headers.insert("x-forwarded-proto", HeaderValue::from_static("https"));
        assert_eq!(safe_next(&headers, &config, Some("http://globalenglish.vn/courses")), None);
        assert_eq!(
            safe_next(&headers, &config, Some("https://globalenglish.vn/courses")),
            Some("https://globalenglish.vn/courses".to_string())
        );
    }
}
