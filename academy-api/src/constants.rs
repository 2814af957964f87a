//! Constants for the Academy API
//!
//! Centralizing constants makes them easy to find, modify, and test.

// ============================================================================
// SERVER
// ============================================================================

pub const DEFAULT_BIND_HOST: &str = "0.0.0.0";

pub const DEFAULT_BIND_PORT: u16 = 8000;

/// Default CORS max age in seconds (24 hours)
pub const DEFAULT_CORS_MAX_AGE_SECS: u64 = 86400;

// ============================================================================
// ADMIN OVERVIEW
// ============================================================================

/// TTL shared by the KPI, chart and activity families (30 minutes)
pub const DEFAULT_OVERVIEW_TTL_SECS: u64 = 1800;

/// Number of activity items shown on the dashboard
pub const DEFAULT_ACTIVITY_LIMIT: usize = 3;

/// Upper bound accepted from `?limit=`
pub const MAX_ACTIVITY_LIMIT: usize = 50;

/// Local time offset used for chart buckets and timestamps (UTC+7)
pub const DEFAULT_UTC_OFFSET_SECS: i32 = 7 * 3600;

/// Delay suggested to clients polling a loading fragment
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 3;

/// Client-side refresh cadence for the dashboard fragments
pub const KPI_REFRESH_INTERVAL_SECS: u64 = 60;
pub const CHART_REFRESH_INTERVAL_SECS: u64 = 300;
pub const ACTIVITY_REFRESH_INTERVAL_SECS: u64 = 60;

// ============================================================================
// WARM-UP
// ============================================================================

/// Minimum gap between two accepted warm-ups of the same scope
pub const DEFAULT_WARMUP_COOLDOWN_SECS: u64 = 60;

/// TTL of the cross-process warm-up lock
pub const DEFAULT_WARMUP_LOCK_TTL_SECS: u64 = 15;

pub const WARMUP_LOCK_PREFIX: &str = "admin_overview:warmup:lock";

pub const WARMUP_RECENT_PREFIX: &str = "admin_overview:warmup:recent";

// ============================================================================
// CACHE BACKEND
// ============================================================================

/// Default LMDB map size in megabytes
pub const DEFAULT_LMDB_MAP_SIZE_MB: usize = 64;

// ============================================================================
// SESSION
// ============================================================================

pub const DEFAULT_SESSION_COOKIE: &str = "academy_session";

/// Lifetime of a "remember me" session (14 days)
pub const DEFAULT_SESSION_LIFETIME_SECS: i64 = 14 * 24 * 3600;

/// Lifetime of a browser session token when "remember me" is off (12 hours)
pub const BROWSER_SESSION_LIFETIME_SECS: i64 = 12 * 3600;

/// Minimum required length for session signing secrets
pub const MIN_SESSION_SECRET_LENGTH: usize = 32;

pub const INSECURE_DEFAULT_SECRET: &str = "INSECURE_DEFAULT_SECRET_CHANGE_IN_PRODUCTION";

pub const LOGIN_ERROR_MESSAGE: &str =
    "Tên đăng nhập hoặc mật khẩu không đúng. Vui lòng thử lại.";

// ============================================================================
// ROUTES
// ============================================================================

pub const HOME_PATH: &str = "/";
pub const LOGIN_PATH: &str = "/login";
pub const OVERVIEW_PATH: &str = "/admin/overview";

// ============================================================================
// SITE
// ============================================================================

pub const DEFAULT_BRAND_NAME: &str = "Global English";
pub const DEFAULT_APP_VERSION: &str = "v1.0.0";
pub const DEFAULT_APP_ENVIRONMENT: &str = "PROD";
pub const DEFAULT_BUILD_COMMIT: &str = "abc1234";
pub const STORAGE_USAGE_PLACEHOLDER: &str = "--";
