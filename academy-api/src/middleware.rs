//! Axum middleware for sessions and staff authorization.
//!
//! - [`session_middleware`] resolves the session cookie into a [`Viewer`]
//!   and stores it in request extensions. It never rejects a request:
//!   anonymous visitors still reach the landing page and login form.
//! - [`require_staff`] guards the admin surface, returning 401 for
//!   anonymous requests and 403 for non-staff viewers.

use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::auth::{read_cookie, validate_session_token, SessionConfig, Viewer};
use crate::error::ApiError;

// ============================================================================
// MIDDLEWARE STATE
// ============================================================================

/// Shared state for the session middleware.
#[derive(Debug, Clone)]
pub struct SessionMiddlewareState {
    pub session_config: Arc<SessionConfig>,
}

impl SessionMiddlewareState {
    pub fn new(session_config: Arc<SessionConfig>) -> Self {
        Self { session_config }
    }
}

// ============================================================================
// MIDDLEWARE FUNCTIONS
// ============================================================================

/// Attach the signed-in [`Viewer`], if any, to the request.
///
/// A missing, expired or tampered cookie leaves the request anonymous.
pub async fn session_middleware(
    State(state): State<SessionMiddlewareState>,
    mut request: Request,
    next: Next,
) -> Response {
    let config = &state.session_config;

    if let Some(token) = read_cookie(request.headers(), &config.cookie_name) {
        match validate_session_token(config, &token) {
            Ok(viewer) => {
                request.extensions_mut().insert(viewer);
            }
            Err(e) => {
                tracing::debug!(code = %e.code, "Ignoring invalid session cookie");
            }
        }
    }

    next.run(request).await
}

/// Reject requests that do not come from a staff viewer.
pub async fn require_staff(request: Request, next: Next) -> Result<Response, AuthMiddlewareError> {
    match request.extensions().get::<Viewer>() {
        None => Err(AuthMiddlewareError(ApiError::unauthorized(
            "Sign in to view the admin overview",
        ))),
        Some(viewer) if !viewer.is_staff => {
            tracing::info!(username = %viewer.username, "Non-staff viewer denied admin access");
            Err(AuthMiddlewareError(ApiError::forbidden(
                "Staff access is required for the admin overview",
            )))
        }
        Some(_) => Ok(next.run(request).await),
    }
}

// ============================================================================
// ERROR HANDLING
// ============================================================================

/// Error wrapper returned by the auth middleware and extractors.
#[derive(Debug)]
pub struct AuthMiddlewareError(pub ApiError);

impl IntoResponse for AuthMiddlewareError {
    fn into_response(self) -> Response {
        self.0.into_response()
    }
}

// ============================================================================
// TYPED EXTRACTORS
// ============================================================================

/// The signed-in viewer. Rejects with 401 when the request is anonymous.
#[derive(Debug, Clone)]
pub struct ViewerExtractor(pub Viewer);

#[async_trait]
impl<S> FromRequestParts<S> for ViewerExtractor
where
    S: Send + Sync,
{
    type Rejection = AuthMiddlewareError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Viewer>()
            .cloned()
            .map(ViewerExtractor)
            .ok_or_else(|| AuthMiddlewareError(ApiError::unauthorized("Sign in required")))
    }
}

impl std::ops::Deref for ViewerExtractor {
    type Target = Viewer;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// The signed-in viewer, or `None` for anonymous requests.
#[derive(Debug, Clone)]
pub struct MaybeViewer(pub Option<Viewer>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeViewer
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeViewer(parts.extensions.get::<Viewer>().cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{issue_session_token, SessionSecret};
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        middleware,
        routing::get,
        Router,
    };
    use tower::ServiceExt;

    fn test_config() -> Arc<SessionConfig> {
        Arc::new(SessionConfig {
            secret: SessionSecret::new("middleware_test_secret_long_enough_32".to_string())
                .expect("valid secret"),
            ..SessionConfig::default()
        })
    }

    fn test_app(config: Arc<SessionConfig>) -> Router {
        let admin = Router::new()
            .route("/admin", get(|ViewerExtractor(v): ViewerExtractor| async move { v.username }))
            .layer(middleware::from_fn(require_staff));

        Router::new()
            .route(
                "/whoami",
                get(|MaybeViewer(v): MaybeViewer| async move {
                    v.map(|v| v.username).unwrap_or_else(|| "anonymous".to_string())
                }),
            )
            .merge(admin)
            .layer(middleware::from_fn_with_state(
                SessionMiddlewareState::new(config),
                session_middleware,
            ))
    }

    fn request(path: &str, cookie: Option<String>) -> Request<Body> {
        let mut builder = Request::builder().uri(path);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::empty()).expect("request")
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        String::from_utf8(bytes.to_vec()).expect("utf8")
    }

    #[tokio::test]
    async fn test_anonymous_request_passes_through() {
        let response = test_app(test_config())
            .oneshot(request("/whoami", None))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "anonymous");
    }

    #[tokio::test]
    async fn test_valid_cookie_attaches_viewer() {
        let config = test_config();
        let token = issue_session_token(&config, &Viewer::new("lan").staff(), true).expect("token");
        let cookie = format!("{}={}", config.cookie_name, token);

        let response = test_app(config.clone())
            .oneshot(request("/whoami", Some(cookie)))
            .await
            .expect("response");
        assert_eq!(body_text(response).await, "lan");
    }

    #[tokio::test]
    async fn test_garbage_cookie_is_anonymous() {
        let cookie = "academy_session=not-a-jwt".to_string();
        let response = test_app(test_config())
            .oneshot(request("/whoami", Some(cookie)))
            .await
            .expect("response");
        assert_eq!(body_text(response).await, "anonymous");
    }

    #[tokio::test]
    async fn test_admin_requires_login() {
        let response = test_app(test_config())
            .oneshot(request("/admin", None))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_admin_rejects_non_staff() {
        let config = test_config();
        let token = issue_session_token(&config, &Viewer::new("learner"), true).expect("token");
        let cookie = format!("{}={}", config.cookie_name, token);

        let response = test_app(config.clone())
            .oneshot(request("/admin", Some(cookie)))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_admin_allows_staff() {
        let config = test_config();
        let token = issue_session_token(&config, &Viewer::new("lan").staff(), true).expect("token");
        let cookie = format!("{}={}", config.cookie_name, token);

        let response = test_app(config.clone())
            .oneshot(request("/admin", Some(cookie)))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "lan");
    }
}
