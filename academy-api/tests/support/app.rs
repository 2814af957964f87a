//! In-memory application wiring for router-level tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use academy_api::auth::{issue_session_token, SessionConfig, SessionSecret};
use academy_api::jobs::{OverviewWarmer, WarmupConfig, WarmupCoordinator};
use academy_api::routes::AppRouterBuilder;
use academy_api::{
    ApiConfig, AppState, InMemoryContentSource, InMemoryOverviewSource, OverviewConfig,
    OverviewService, SiteConfig, StaticCredentialStore, Viewer,
};
use academy_storage::{CacheStore, FallbackCache, InMemoryCacheStore};
use academy_test_utils::fixtures::manual_clock;
use academy_test_utils::ManualClock;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request},
    response::Response,
    Router,
};
use serde_json::Value;
use tower::ServiceExt;

pub const TEST_SECRET: &str = "router-tests-session-secret-with-enough-entropy";
pub const STAFF_USER: &str = "admin";
pub const STAFF_PASSWORD: &str = "quan-tri-2024";
pub const LEARNER_USER: &str = "hoa";
pub const LEARNER_PASSWORD: &str = "hoc-vien-2024";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub source: Arc<InMemoryOverviewSource>,
    pub content: Arc<InMemoryContentSource>,
    pub clock: Arc<ManualClock>,
}

impl TestApp {
    pub fn new() -> Self {
        let clock = manual_clock();
        let store: Arc<dyn CacheStore> = Arc::new(InMemoryCacheStore::with_clock(clock.clone()));
        Self::with_store(store, clock)
    }

    pub fn with_store(store: Arc<dyn CacheStore>, clock: Arc<ManualClock>) -> Self {
        let source = Arc::new(InMemoryOverviewSource::new());
        let content = Arc::new(InMemoryContentSource::new());
        let overview_config = OverviewConfig::default();

        let overview = Arc::new(OverviewService::new(
            FallbackCache::with_clock(store.clone(), clock.clone()),
            source.clone(),
            overview_config.clone(),
            clock.clone(),
        ));
        let warmup = Arc::new(WarmupCoordinator::new(
            Arc::new(OverviewWarmer::new(overview.clone())),
            store.clone(),
            clock.clone(),
            WarmupConfig {
                cooldown: Duration::from_secs(60),
                lock_ttl: Duration::from_secs(15),
                startup_warmup: false,
            },
            overview_config.activity_limit,
        ));

        let session = SessionConfig {
            secret: SessionSecret::new(TEST_SECRET.to_string()).expect("test secret"),
            clock: clock.clone(),
            ..SessionConfig::default()
        };
        let credentials = StaticCredentialStore::new()
            .with_user(Viewer::new(STAFF_USER).staff(), STAFF_PASSWORD)
            .with_user(Viewer::new(LEARNER_USER), LEARNER_PASSWORD);

        let state = AppState {
            overview,
            warmup,
            content: content.clone(),
            credentials: Arc::new(credentials),
            session: Arc::new(session),
            site: Arc::new(SiteConfig::default()),
            store,
            clock: clock.clone(),
            start_time: Instant::now(),
        };

        let router = AppRouterBuilder::new(state.clone(), ApiConfig::default())
            .expect("development config is accepted")
            .metrics_endpoint(false)
            .build();

        Self {
            router,
            state,
            source,
            content,
            clock,
        }
    }

    /// `Cookie` header value carrying a session for `viewer`.
    pub fn cookie_for(&self, viewer: &Viewer) -> String {
        let token = issue_session_token(&self.state.session, viewer, false).expect("sign session");
        format!("{}={}", self.state.session.cookie_name, token)
    }

    pub fn staff_cookie(&self) -> String {
        self.cookie_for(&Viewer::new(STAFF_USER).staff())
    }

    pub fn finance_cookie(&self) -> String {
        self.cookie_for(&Viewer::new("ketoan").staff().superuser())
    }

    pub fn learner_cookie(&self) -> String {
        self.cookie_for(&Viewer::new(LEARNER_USER))
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response {
        let mut builder = Request::builder().method(Method::GET).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).expect("request")).await
    }

    pub async fn post_json(&self, uri: &str, cookie: &str, body: Option<Value>) -> Response {
        let builder = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::COOKIE, cookie);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        };
        self.send(request.expect("request")).await
    }

    pub async fn post_form(&self, uri: &str, form: &str) -> Response {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::HOST, "globalenglish.vn")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(form.to_string()))
            .expect("request");
        self.send(request).await
    }
}

pub async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

pub fn header_str<'a>(response: &'a Response, name: header::HeaderName) -> Option<&'a str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}
