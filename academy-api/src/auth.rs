//! Authentication Module
//!
//! Session handling for the login flow and the admin overview:
//! 1. Credential checks through the [`CredentialStore`] trait
//! 2. Signed session tokens (HS256 JWT) carried in a cookie
//! 3. The [`Viewer`] capability model (staff, finance visibility)
//! 4. Safe `next` redirect resolution

use std::collections::HashMap;
use std::sync::Arc;

use academy_core::{AcademyError, ConfigError, VisibilityTier};
use academy_storage::{Clock, SystemClock};
use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

use crate::constants::{
    BROWSER_SESSION_LIFETIME_SECS, DEFAULT_SESSION_COOKIE, DEFAULT_SESSION_LIFETIME_SECS,
    INSECURE_DEFAULT_SECRET, MIN_SESSION_SECRET_LENGTH,
};
use crate::error::{ApiError, ApiResult};

/// Permissions that unlock financial figures on the dashboard.
pub const FINANCE_PERMISSIONS: [&str; 2] = ["view_finance_metrics", "view_finance"];

/// Base host for relative redirect targets when the request has no `Host`.
const FALLBACK_REDIRECT_HOST: &str = "localhost";

// ============================================================================
// SESSION SECRET (TYPE-SAFE)
// ============================================================================

/// Session signing secret that never shows up in logs.
#[derive(Clone)]
pub struct SessionSecret(SecretString);

impl SessionSecret {
    /// # Errors
    /// Returns error if the secret is empty.
    pub fn new(secret: String) -> Result<Self, AcademyError> {
        if secret.is_empty() {
            return Err(AcademyError::Config(ConfigError::MissingRequired {
                field: "session_secret".to_string(),
            }));
        }
        Ok(Self(SecretString::new(secret.into())))
    }

    /// Expose the secret value (only for cryptographic operations).
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    pub fn len(&self) -> usize {
        self.0.expose_secret().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.expose_secret().is_empty()
    }

    pub fn is_insecure_default(&self) -> bool {
        self.0.expose_secret() == INSECURE_DEFAULT_SECRET
    }
}

impl std::fmt::Debug for SessionSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SessionSecret([REDACTED, {} chars])", self.len())
    }
}

fn build_session_secret(secret_str: String) -> SessionSecret {
    let normalized = if secret_str.trim().is_empty() {
        INSECURE_DEFAULT_SECRET.to_string()
    } else {
        secret_str
    };

    match SessionSecret::new(normalized) {
        Ok(secret) => secret,
        Err(_) => SessionSecret(SecretString::new(INSECURE_DEFAULT_SECRET.to_string().into())),
    }
}

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Session cookie configuration.
#[derive(Clone)]
pub struct SessionConfig {
    pub secret: SessionSecret,

    /// Lifetime of a "remember me" session in seconds
    pub lifetime_secs: i64,

    pub cookie_name: String,

    /// Mark the cookie `Secure`
    pub secure_cookie: bool,

    /// Clock for token time validation (injected for testing)
    pub clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("secret", &self.secret)
            .field("lifetime_secs", &self.lifetime_secs)
            .field("cookie_name", &self.cookie_name)
            .field("secure_cookie", &self.secure_cookie)
            .finish_non_exhaustive()
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            secret: build_session_secret(INSECURE_DEFAULT_SECRET.to_string()),
            lifetime_secs: DEFAULT_SESSION_LIFETIME_SECS,
            cookie_name: DEFAULT_SESSION_COOKIE.to_string(),
            secure_cookie: false,
            clock: Arc::new(SystemClock),
        }
    }
}

impl SessionConfig {
    /// Create the session configuration from environment variables.
    ///
    /// - `ACADEMY_SESSION_SECRET`: token signing secret
    /// - `ACADEMY_SESSION_LIFETIME_SECS`: "remember me" lifetime (default: 14 days)
    /// - `ACADEMY_SESSION_COOKIE`: cookie name (default: academy_session)
    /// - `ACADEMY_SESSION_SECURE`: mark cookie Secure (default: false)
    pub fn from_env() -> Self {
        let secret_str = std::env::var("ACADEMY_SESSION_SECRET")
            .unwrap_or_else(|_| INSECURE_DEFAULT_SECRET.to_string());

        Self {
            secret: build_session_secret(secret_str),
            lifetime_secs: std::env::var("ACADEMY_SESSION_LIFETIME_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_SESSION_LIFETIME_SECS),
            cookie_name: std::env::var("ACADEMY_SESSION_COOKIE")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_SESSION_COOKIE.to_string()),
            secure_cookie: std::env::var("ACADEMY_SESSION_SECURE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(false),
            clock: Arc::new(SystemClock),
        }
    }

    /// Refuse insecure secrets in production; warn elsewhere.
    pub fn validate_for_production(&self, is_production: bool) -> ApiResult<()> {
        if self.secret.is_insecure_default() {
            if is_production {
                return Err(ApiError::invalid_input(
                    "Cannot start in production with the default session secret. \
                     Set ACADEMY_SESSION_SECRET to a secure value.",
                ));
            }
            tracing::warn!(
                "Using the default session secret. Set ACADEMY_SESSION_SECRET before deploying."
            );
        } else if self.secret.len() < MIN_SESSION_SECRET_LENGTH {
            if is_production {
                return Err(ApiError::invalid_input(format!(
                    "Session secret is too short for production use ({} chars). \
                     It must be at least {} characters long.",
                    self.secret.len(),
                    MIN_SESSION_SECRET_LENGTH
                )));
            }
            tracing::warn!(
                length = self.secret.len(),
                "Session secret is short; use at least 32 characters in production"
            );
        }
        Ok(())
    }

    fn now_epoch_secs(&self) -> i64 {
        self.clock.now_utc().timestamp()
    }
}

// ============================================================================
// VIEWER
// ============================================================================

/// The signed-in user as far as this service cares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewer {
    pub username: String,
    pub is_staff: bool,
    pub is_superuser: bool,
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl Viewer {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            is_staff: false,
            is_superuser: false,
            permissions: Vec::new(),
        }
    }

    pub fn staff(mut self) -> Self {
        self.is_staff = true;
        self
    }

    pub fn superuser(mut self) -> Self {
        self.is_staff = true;
        self.is_superuser = true;
        self
    }

    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.permissions.push(permission.into());
        self
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }

    /// Superusers and holders of a finance permission see revenue figures.
    pub fn can_view_finance(&self) -> bool {
        self.is_superuser || FINANCE_PERMISSIONS.iter().any(|p| self.has_permission(p))
    }

    pub fn tier(&self) -> VisibilityTier {
        VisibilityTier::for_viewer(self.can_view_finance())
    }
}

// ============================================================================
// SESSION TOKENS
// ============================================================================

/// Claims carried by the session token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    #[serde(default)]
    pub staff: bool,
    #[serde(default)]
    pub superuser: bool,
    #[serde(default)]
    pub perms: Vec<String>,
}

impl SessionClaims {
    fn for_viewer(viewer: &Viewer, now: i64, lifetime_secs: i64) -> Self {
        Self {
            sub: viewer.username.clone(),
            iat: now,
            exp: now + lifetime_secs,
            staff: viewer.is_staff,
            superuser: viewer.is_superuser,
            perms: viewer.permissions.clone(),
        }
    }

    fn into_viewer(self) -> Viewer {
        Viewer {
            username: self.sub,
            is_staff: self.staff,
            is_superuser: self.superuser,
            permissions: self.perms,
        }
    }
}

/// Sign a session token for `viewer`.
///
/// `remember` selects the long lifetime; otherwise the token lives for a
/// browser session's worth of hours.
pub fn issue_session_token(config: &SessionConfig, viewer: &Viewer, remember: bool) -> ApiResult<String> {
    let lifetime = if remember {
        config.lifetime_secs
    } else {
        BROWSER_SESSION_LIFETIME_SECS
    };
    let claims = SessionClaims::for_viewer(viewer, config.now_epoch_secs(), lifetime);
    let key = EncodingKey::from_secret(config.secret.expose().as_bytes());

    encode(&Header::new(Algorithm::HS256), &claims, &key)
        .map_err(|e| ApiError::internal_error(format!("Failed to sign session: {}", e)))
}

/// Verify a session token and recover the viewer.
///
/// Signature is checked by `jsonwebtoken`; expiry is checked against the
/// configured clock.
pub fn validate_session_token(config: &SessionConfig, token: &str) -> ApiResult<Viewer> {
    let key = DecodingKey::from_secret(config.secret.expose().as_bytes());

    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.required_spec_claims = std::collections::HashSet::from(["exp".to_string()]);

    let claims = decode::<SessionClaims>(token, &key, &validation)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                ApiError::invalid_token("Session signature is invalid")
            }
            _ => ApiError::invalid_token(format!("Session validation failed: {}", e)),
        })?
        .claims;

    if claims.exp < config.now_epoch_secs() {
        return Err(ApiError::token_expired());
    }

    Ok(claims.into_viewer())
}

// ============================================================================
// CREDENTIALS
// ============================================================================

/// Password verification backend.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// The viewer for a valid username/password pair, `None` otherwise.
    async fn authenticate(&self, username: &str, password: &str) -> Option<Viewer>;
}

struct StoredUser {
    password_sha256: String,
    viewer: Viewer,
}

/// Fixed set of accounts with SHA-256 password digests.
#[derive(Default)]
pub struct StaticCredentialStore {
    users: HashMap<String, StoredUser>,
}

pub fn password_digest(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

impl StaticCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an account from a plaintext password.
    pub fn with_user(self, viewer: Viewer, password: &str) -> Self {
        self.with_user_digest(viewer, password_digest(password))
    }

    /// Add an account from a hex SHA-256 digest.
    pub fn with_user_digest(mut self, viewer: Viewer, digest: impl Into<String>) -> Self {
        self.users.insert(
            viewer.username.clone(),
            StoredUser {
                password_sha256: digest.into().to_ascii_lowercase(),
                viewer,
            },
        );
        self
    }

    /// Load the bootstrap admin account.
    ///
    /// - `ACADEMY_ADMIN_USERNAME`
    /// - `ACADEMY_ADMIN_PASSWORD_SHA256`: hex digest of the password
    pub fn from_env() -> Self {
        let username = std::env::var("ACADEMY_ADMIN_USERNAME").ok();
        let digest = std::env::var("ACADEMY_ADMIN_PASSWORD_SHA256").ok();
        match (username, digest) {
            (Some(username), Some(digest)) if !username.trim().is_empty() => {
                Self::new().with_user_digest(Viewer::new(username.trim()).superuser(), digest)
            }
            _ => {
                tracing::warn!("No admin account configured; logins will be rejected");
                Self::new()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl CredentialStore for StaticCredentialStore {
    async fn authenticate(&self, username: &str, password: &str) -> Option<Viewer> {
        let user = self.users.get(username)?;
        let candidate = password_digest(password);
        let matches = candidate.len() == user.password_sha256.len()
            && candidate
                .bytes()
                .zip(user.password_sha256.bytes())
                .fold(0u8, |acc, (a, b)| acc | (a ^ b))
                == 0;
        matches.then(|| user.viewer.clone())
    }
}

// ============================================================================
// COOKIES
// ============================================================================

/// Value of cookie `name` from the request's `Cookie` headers.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

/// `Set-Cookie` value for a session. `max_age` of `None` makes it a
/// browser-session cookie.
pub fn session_cookie(config: &SessionConfig, token: &str, max_age: Option<i64>) -> String {
    let mut cookie = format!("{}={}; Path=/; HttpOnly; SameSite=Lax", config.cookie_name, token);
    if let Some(max_age) = max_age {
        cookie.push_str(&format!("; Max-Age={}", max_age));
    }
    if config.secure_cookie {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value that removes the session cookie.
pub fn clear_session_cookie(config: &SessionConfig) -> String {
    session_cookie(config, "", Some(0))
}

// ============================================================================
// REDIRECTS
// ============================================================================

/// Accept `candidate` as a post-login/logout target only when it stays on
/// this site.
///
/// The candidate is resolved against `http(s)://<host>/`, so relative
/// targets such as `dashboard`, `courses/ielts` or `?tab=1` are accepted as
/// written. Absolute URLs must point at `host` (port included) and must use
/// `https` when the request itself was secure. Scheme-relative (`//x`),
/// backslashed and userinfo-carrying targets are rejected.
pub fn resolve_next_url(candidate: Option<&str>, host: Option<&str>, secure: bool) -> Option<String> {
    let candidate = candidate?.trim();
    if candidate.is_empty()
        || candidate.starts_with("//")
        || candidate.contains('\\')
        || candidate.chars().any(char::is_control)
    {
        return None;
    }

    let scheme = if secure { "https" } else { "http" };
    let base = Url::parse(&format!("{}://{}/", scheme, host.unwrap_or(FALLBACK_REDIRECT_HOST))).ok()?;

    let resolved = match Url::parse(candidate) {
        Ok(absolute) => {
            if host.is_none() {
                return None;
            }
            let allowed_scheme = match absolute.scheme() {
                "https" => true,
                "http" => !secure,
                _ => false,
            };
            if !allowed_scheme {
                return None;
            }
            absolute
        }
        Err(url::ParseError::RelativeUrlWithoutBase) => base.join(candidate).ok()?,
        Err(_) => return None,
    };

    let same_origin = resolved.username().is_empty()
        && resolved.password().is_none()
        && resolved.host() == base.host()
        && resolved.port() == base.port();
    same_origin.then(|| candidate.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use academy_storage::ManualClock;
    use axum::http::HeaderValue;
    use chrono::{TimeZone, Utc};
    use std::time::Duration;

    fn test_config() -> (SessionConfig, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().expect("valid date"),
        ));
        let config = SessionConfig {
            secret: SessionSecret::new("test_secret_that_is_long_enough_for_hs256".to_string())
                .expect("Test secret should be valid"),
            clock: clock.clone(),
            ..SessionConfig::default()
        };
        (config, clock)
    }

    #[test]
    fn test_secret_debug_is_redacted() {
        let secret = SessionSecret::new("hunter2".to_string()).expect("valid");
        let debug = format!("{:?}", secret);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("7 chars"));
        assert!(SessionSecret::new(String::new()).is_err());
    }

    #[test]
    fn test_finance_visibility() {
        assert!(!Viewer::new("staff").staff().can_view_finance());
        assert!(Viewer::new("root").superuser().can_view_finance());
        assert!(Viewer::new("acct")
            .staff()
            .with_permission("view_finance_metrics")
            .can_view_finance());
        assert_eq!(Viewer::new("staff").staff().tier(), VisibilityTier::Masked);
        assert_eq!(Viewer::new("root").superuser().tier(), VisibilityTier::Full);
    }

    #[test]
    fn test_session_round_trip() -> ApiResult<()> {
        let (config, _clock) = test_config();
        let viewer = Viewer::new("lan").staff().with_permission("view_finance");

        let token = issue_session_token(&config, &viewer, true)?;
        assert_eq!(validate_session_token(&config, &token)?, viewer);
        Ok(())
    }

    #[test]
    fn test_browser_session_expires_sooner() -> ApiResult<()> {
        let (config, clock) = test_config();
        let viewer = Viewer::new("lan");

        let short = issue_session_token(&config, &viewer, false)?;
        let long = issue_session_token(&config, &viewer, true)?;
        clock.advance(Duration::from_secs(BROWSER_SESSION_LIFETIME_SECS as u64 + 1));

        let err = validate_session_token(&config, &short).expect_err("should be expired");
        assert_eq!(err.code, crate::error::ErrorCode::TokenExpired);
        assert!(validate_session_token(&config, &long).is_ok());
        Ok(())
    }

    #[test]
    fn test_tampered_token_rejected() -> ApiResult<()> {
        let (config, _clock) = test_config();
        let token = issue_session_token(&config, &Viewer::new("lan"), true)?;

        let (other, _) = test_config();
        let other = SessionConfig {
            secret: SessionSecret::new("a_completely_different_secret_value!!".to_string())
                .expect("valid"),
            ..other
        };
        let err = validate_session_token(&other, &token).expect_err("bad signature");
        assert_eq!(err.code, crate::error::ErrorCode::InvalidToken);
        Ok(())
    }

    #[tokio::test]
    async fn test_static_credentials() {
        let store = StaticCredentialStore::new()
            .with_user(Viewer::new("admin").superuser(), "s3cret")
            .with_user_digest(Viewer::new("teacher"), password_digest("chalk").to_uppercase());

        assert_eq!(
            store.authenticate("admin", "s3cret").await.map(|v| v.is_superuser),
            Some(true)
        );
        assert!(store.authenticate("admin", "wrong").await.is_none());
        assert!(store.authenticate("nobody", "s3cret").await.is_none());
        assert!(store.authenticate("teacher", "chalk").await.is_some());
    }

    #[test]
    fn test_read_cookie() {
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("theme=dark; academy_session=abc.def"));
        headers.append(header::COOKIE, HeaderValue::from_static("other=1"));

        assert_eq!(read_cookie(&headers, "academy_session"), Some("abc.def".to_string()));
        assert_eq!(read_cookie(&headers, "other"), Some("1".to_string()));
        assert_eq!(read_cookie(&headers, "missing"), None);
    }

    #[test]
    fn test_session_cookie_attributes() {
        let (mut config, _clock) = test_config();
        assert_eq!(
            session_cookie(&config, "tok", None),
            "academy_session=tok; Path=/; HttpOnly; SameSite=Lax"
        );

        config.secure_cookie = true;
        let cookie = session_cookie(&config, "tok", Some(60));
        assert!(cookie.contains("Max-Age=60"));
        assert!(cookie.ends_with("; Secure"));
        assert!(clear_session_cookie(&config).contains("Max-Age=0"));
    }

    #[test]
    fn test_resolve_next_url() {
        let host = Some("globalenglish.vn");
        assert_eq!(resolve_next_url(Some("/courses"), host, false), Some("/courses".to_string()));
        assert_eq!(resolve_next_url(Some("//evil.com"), host, false), None);
        assert_eq!(resolve_next_url(Some("https://evil.com/x"), host, false), None);
        assert_eq!(
            resolve_next_url(Some("http://globalenglish.vn/a"), host, false),
            Some("http://globalenglish.vn/a".to_string())
        );
        assert_eq!(resolve_next_url(Some("http://globalenglish.vn/a"), host, true), None);
        assert_eq!(resolve_next_url(Some("https://user@globalenglish.vn/"), host, true), None);
        assert_eq!(resolve_next_url(Some("javascript:alert(1)"), host, false), None);
        assert_eq!(resolve_next_url(Some("/\\evil.com"), host, false), None);
        assert_eq!(resolve_next_url(Some("  "), host, false), None);
        assert_eq!(resolve_next_url(None, host, false), None);
    }

    #[test]
    fn test_resolve_next_url_relative_targets() {
        let host = Some("globalenglish.vn");
        let accepted = [
            "dashboard",
            "courses/ielts",
            "?tab=1",
            "#pricing",
            "../teachers",
            "/courses?level=b1",
        ];
        for target in accepted {
            assert_eq!(
                resolve_next_url(Some(target), host, false),
                Some(target.to_string()),
                "{target}"
            );
            assert_eq!(resolve_next_url(Some(target), host, true), Some(target.to_string()), "{target}");
        }

        // No Host header: relative targets still stay on site.
        assert_eq!(resolve_next_url(Some("dashboard"), None, false), Some("dashboard".to_string()));
        assert_eq!(resolve_next_url(Some("https://globalenglish.vn/"), None, false), None);

        let rejected = [
            "///evil.com",
            "\\\\evil.com",
            "http:evil.com",
            "https://evil.com@globalenglish.vn/",
            "https://globalenglish.vn.evil.com/",
            "mailto:admin@globalenglish.vn",
            "data:text/html,hi",
        ];
        for target in rejected {
            assert_eq!(resolve_next_url(Some(target), host, false), None, "{target}");
        }
    }

    #[test]
    fn test_resolve_next_url_matches_host_port() {
        let host = Some("localhost:8000");
        assert_eq!(
            resolve_next_url(Some("http://localhost:8000/courses"), host, false),
            Some("http://localhost:8000/courses".to_string())
        );
        assert_eq!(resolve_next_url(Some("http://localhost:9000/courses"), host, false), None);
        assert_eq!(resolve_next_url(Some("http://localhost/courses"), host, false), None);
        assert_eq!(
            resolve_next_url(Some("https://GlobalEnglish.vn/a"), Some("globalenglish.vn"), true),
            Some("https://GlobalEnglish.vn/a".to_string())
        );
    }
}
