//! API Configuration Module
//!
//! Server binding, CORS, admin overview tuning, cache backend selection and
//! the admin footer metadata. Everything is loaded from `ACADEMY_*`
//! environment variables with defaults suitable for development.

use std::path::PathBuf;
use std::time::Duration;

use academy_core::ServiceStatus;
use chrono::{DateTime, FixedOffset, Offset, Utc};

use crate::constants::{
    DEFAULT_ACTIVITY_LIMIT, DEFAULT_APP_ENVIRONMENT, DEFAULT_APP_VERSION, DEFAULT_BIND_HOST,
    DEFAULT_BIND_PORT, DEFAULT_BRAND_NAME, DEFAULT_BUILD_COMMIT, DEFAULT_CORS_MAX_AGE_SECS,
    DEFAULT_LMDB_MAP_SIZE_MB, DEFAULT_OVERVIEW_TTL_SECS, DEFAULT_RETRY_AFTER_SECS,
    DEFAULT_UTC_OFFSET_SECS, MAX_ACTIVITY_LIMIT,
};

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

// ============================================================================
// API CONFIGURATION
// ============================================================================

/// Server binding and CORS.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_host: String,
    pub bind_port: u16,

    /// Allowed CORS origins. Empty means allow all origins (dev mode).
    pub cors_origins: Vec<String>,

    /// Max age for CORS preflight cache in seconds.
    pub cors_max_age_secs: u64,

    /// Deployment environment name (`development`, `production`, ...).
    pub environment: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_host: DEFAULT_BIND_HOST.to_string(),
            bind_port: DEFAULT_BIND_PORT,
            cors_origins: Vec::new(),
            cors_max_age_secs: DEFAULT_CORS_MAX_AGE_SECS,
            environment: "development".to_string(),
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// - `ACADEMY_BIND_HOST` / `ACADEMY_BIND_PORT`
    /// - `ACADEMY_CORS_ORIGINS`: comma-separated allowed origins (empty = allow all)
    /// - `ACADEMY_CORS_MAX_AGE_SECS`: preflight cache duration (default: 86400)
    /// - `ACADEMY_ENVIRONMENT`: deployment environment (default: development)
    pub fn from_env() -> Self {
        let cors_origins = std::env::var("ACADEMY_CORS_ORIGINS")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            bind_host: env_non_empty("ACADEMY_BIND_HOST")
                .unwrap_or_else(|| DEFAULT_BIND_HOST.to_string()),
            bind_port: env_parse("ACADEMY_BIND_PORT").unwrap_or(DEFAULT_BIND_PORT),
            cors_origins,
            cors_max_age_secs: env_parse("ACADEMY_CORS_MAX_AGE_SECS")
                .unwrap_or(DEFAULT_CORS_MAX_AGE_SECS),
            environment: env_non_empty("ACADEMY_ENVIRONMENT")
                .unwrap_or_else(|| "development".to_string())
                .to_lowercase(),
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self.environment.as_str(), "production" | "prod")
    }

    /// Check if a given origin is allowed.
    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        if self.cors_origins.is_empty() {
            return true;
        }

        self.cors_origins.iter().any(|allowed| {
            if allowed == origin {
                return true;
            }
            // Wildcard subdomains: *.globalenglish.vn
            if let Some(pattern) = allowed.strip_prefix("*.") {
                if let Some(origin_domain) = origin.strip_prefix("https://") {
                    return origin_domain.ends_with(&format!(".{}", pattern))
                        || origin_domain == pattern;
                }
            }
            false
        })
    }
}

// ============================================================================
// OVERVIEW CONFIGURATION
// ============================================================================

/// Admin overview caching and display settings.
#[derive(Debug, Clone)]
pub struct OverviewConfig {
    pub kpi_ttl: Duration,
    pub chart_ttl: Duration,
    pub activity_ttl: Duration,
    /// Activity items shown when the request gives no `limit`.
    pub activity_limit: usize,
    /// Offset of the academy's local time from UTC, in seconds.
    pub utc_offset_secs: i32,
    /// `Retry-After` sent with loading fragments.
    pub retry_after: Duration,
}

impl Default for OverviewConfig {
    fn default() -> Self {
        Self {
            kpi_ttl: Duration::from_secs(DEFAULT_OVERVIEW_TTL_SECS),
            chart_ttl: Duration::from_secs(DEFAULT_OVERVIEW_TTL_SECS),
            activity_ttl: Duration::from_secs(DEFAULT_OVERVIEW_TTL_SECS),
            activity_limit: DEFAULT_ACTIVITY_LIMIT,
            utc_offset_secs: DEFAULT_UTC_OFFSET_SECS,
            retry_after: Duration::from_secs(DEFAULT_RETRY_AFTER_SECS),
        }
    }
}

impl OverviewConfig {
    /// Create OverviewConfig from environment variables.
    ///
    /// - `ACADEMY_OVERVIEW_KPI_TTL_SECS`, `ACADEMY_OVERVIEW_CHART_TTL_SECS`,
    ///   `ACADEMY_OVERVIEW_ACTIVITY_TTL_SECS` (default: 1800 each)
    /// - `ACADEMY_OVERVIEW_ACTIVITY_LIMIT` (default: 3, capped at 50)
    /// - `ACADEMY_UTC_OFFSET_HOURS` (default: 7)
    /// - `ACADEMY_OVERVIEW_RETRY_AFTER_SECS` (default: 3)
    pub fn from_env() -> Self {
        let ttl = |key: &str| {
            Duration::from_secs(env_parse(key).unwrap_or(DEFAULT_OVERVIEW_TTL_SECS))
        };

        let utc_offset_secs = env_parse::<i32>("ACADEMY_UTC_OFFSET_HOURS")
            .filter(|hours| (-23..=23).contains(hours))
            .map(|hours| hours * 3600)
            .unwrap_or(DEFAULT_UTC_OFFSET_SECS);

        Self {
            kpi_ttl: ttl("ACADEMY_OVERVIEW_KPI_TTL_SECS"),
            chart_ttl: ttl("ACADEMY_OVERVIEW_CHART_TTL_SECS"),
            activity_ttl: ttl("ACADEMY_OVERVIEW_ACTIVITY_TTL_SECS"),
            activity_limit: env_parse::<usize>("ACADEMY_OVERVIEW_ACTIVITY_LIMIT")
                .unwrap_or(DEFAULT_ACTIVITY_LIMIT)
                .clamp(1, MAX_ACTIVITY_LIMIT),
            utc_offset_secs,
            retry_after: Duration::from_secs(
                env_parse("ACADEMY_OVERVIEW_RETRY_AFTER_SECS").unwrap_or(DEFAULT_RETRY_AFTER_SECS),
            ),
        }
    }

    pub fn utc_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_secs).unwrap_or_else(|| Utc.fix())
    }
}

// ============================================================================
// CACHE BACKEND CONFIGURATION
// ============================================================================

/// Which shared cache store to open.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CacheBackendConfig {
    /// Process-private store; the fallback map still applies.
    #[default]
    InMemory,
    /// LMDB environment shared by every process on the host.
    Lmdb { path: PathBuf, map_size_mb: usize },
}

impl CacheBackendConfig {
    /// - `ACADEMY_CACHE_LMDB_PATH`: directory for the LMDB store (unset = in-memory)
    /// - `ACADEMY_CACHE_LMDB_MAP_SIZE_MB` (default: 64)
    pub fn from_env() -> Self {
        match env_non_empty("ACADEMY_CACHE_LMDB_PATH") {
            Some(path) => Self::Lmdb {
                path: PathBuf::from(path),
                map_size_mb: env_parse("ACADEMY_CACHE_LMDB_MAP_SIZE_MB")
                    .unwrap_or(DEFAULT_LMDB_MAP_SIZE_MB),
            },
            None => Self::InMemory,
        }
    }
}

// ============================================================================
// SITE CONFIGURATION
// ============================================================================

/// Metadata shown in the admin footer.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    pub brand_name: String,
    pub app_version: String,
    pub app_environment: String,
    pub build_commit: String,
    pub build_timestamp: Option<DateTime<Utc>>,
    pub worker_status: ServiceStatus,
    pub cache_status: ServiceStatus,
    pub mail_status: ServiceStatus,
    pub storage_db_usage: Option<String>,
    pub storage_media_usage: Option<String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            brand_name: DEFAULT_BRAND_NAME.to_string(),
            app_version: DEFAULT_APP_VERSION.to_string(),
            app_environment: DEFAULT_APP_ENVIRONMENT.to_string(),
            build_commit: DEFAULT_BUILD_COMMIT.to_string(),
            build_timestamp: None,
            worker_status: ServiceStatus::Unknown,
            cache_status: ServiceStatus::Unknown,
            mail_status: ServiceStatus::Unknown,
            storage_db_usage: None,
            storage_media_usage: None,
        }
    }
}

impl SiteConfig {
    /// - `ACADEMY_APP_VERSION`, `ACADEMY_APP_ENV`, `ACADEMY_BUILD_COMMIT`
    /// - `ACADEMY_BUILD_TIMESTAMP` (RFC 3339)
    /// - `ACADEMY_WORKER_STATUS`, `ACADEMY_CACHE_STATUS`, `ACADEMY_MAIL_STATUS`
    /// - `ACADEMY_STORAGE_DB_USAGE`, `ACADEMY_STORAGE_MEDIA_USAGE`
    pub fn from_env() -> Self {
        let status = |key: &str| ServiceStatus::normalize(std::env::var(key).ok().as_deref());

        Self {
            brand_name: DEFAULT_BRAND_NAME.to_string(),
            app_version: env_non_empty("ACADEMY_APP_VERSION")
                .unwrap_or_else(|| DEFAULT_APP_VERSION.to_string()),
            app_environment: env_non_empty("ACADEMY_APP_ENV")
                .unwrap_or_else(|| DEFAULT_APP_ENVIRONMENT.to_string())
                .to_uppercase(),
            build_commit: env_non_empty("ACADEMY_BUILD_COMMIT")
                .map(|commit| commit.chars().take(7).collect())
                .unwrap_or_else(|| DEFAULT_BUILD_COMMIT.to_string()),
            build_timestamp: env_non_empty("ACADEMY_BUILD_TIMESTAMP")
                .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                .map(|at| at.with_timezone(&Utc)),
            worker_status: status("ACADEMY_WORKER_STATUS"),
            cache_status: status("ACADEMY_CACHE_STATUS"),
            mail_status: status("ACADEMY_MAIL_STATUS"),
            storage_db_usage: env_non_empty("ACADEMY_STORAGE_DB_USAGE"),
            storage_media_usage: env_non_empty("ACADEMY_STORAGE_MEDIA_USAGE"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    struct EnvVarGuard {
        key: &'static str,
        previous: Option<String>,
    }

    impl EnvVarGuard {
        fn set(key: &'static str, value: Option<&str>) -> Self {
            let previous = std::env::var(key).ok();
            match value {
                Some(value) => std::env::set_var(key, value),
                None => std::env::remove_var(key),
            }
            Self { key, previous }
        }
    }

    impl Drop for EnvVarGuard {
        fn drop(&mut self) {
            match self.previous.as_deref() {
                Some(value) => std::env::set_var(self.key, value),
                None => std::env::remove_var(self.key),
            }
        }
    }

    #[test]
    fn test_default_config() {
        let config = ApiConfig::default();
        assert!(config.cors_origins.is_empty());
        assert_eq!(config.bind_port, 8000);
        assert!(!config.is_production());

        let overview = OverviewConfig::default();
        assert_eq!(overview.kpi_ttl, Duration::from_secs(1800));
        assert_eq!(overview.activity_limit, 3);
        assert_eq!(overview.utc_offset().local_minus_utc(), 7 * 3600);
    }

    #[test]
    fn test_origin_allowed() {
        let mut config = ApiConfig::default();
        assert!(config.is_origin_allowed("http://localhost:3000"));

        config.cors_origins = vec![
            "https://globalenglish.vn".to_string(),
            "*.globalenglish.vn".to_string(),
        ];
        assert!(config.is_origin_allowed("https://globalenglish.vn"));
        assert!(config.is_origin_allowed("https://admin.globalenglish.vn"));
        assert!(!config.is_origin_allowed("https://evilglobalenglish.vn"));
        assert!(!config.is_origin_allowed("http://admin.globalenglish.vn"));
    }

    #[test]
    fn test_overview_config_from_env() {
        let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        let _ttl = EnvVarGuard::set("ACADEMY_OVERVIEW_KPI_TTL_SECS", Some("120"));
        let _limit = EnvVarGuard::set("ACADEMY_OVERVIEW_ACTIVITY_LIMIT", Some("500"));
        let _offset = EnvVarGuard::set("ACADEMY_UTC_OFFSET_HOURS", Some("99"));

        let config = OverviewConfig::from_env();
        assert_eq!(config.kpi_ttl, Duration::from_secs(120));
        assert_eq!(config.chart_ttl, Duration::from_secs(1800));
        assert_eq!(config.activity_limit, MAX_ACTIVITY_LIMIT);
        assert_eq!(config.utc_offset_secs, DEFAULT_UTC_OFFSET_SECS);
    }

    #[test]
    fn test_cache_backend_from_env() {
        let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        {
            let _path = EnvVarGuard::set("ACADEMY_CACHE_LMDB_PATH", None);
            assert_eq!(CacheBackendConfig::from_env(), CacheBackendConfig::InMemory);
        }

        let _path = EnvVarGuard::set("ACADEMY_CACHE_LMDB_PATH", Some("/var/cache/academy"));
        let _size = EnvVarGuard::set("ACADEMY_CACHE_LMDB_MAP_SIZE_MB", None);
        assert_eq!(
            CacheBackendConfig::from_env(),
            CacheBackendConfig::Lmdb {
                path: PathBuf::from("/var/cache/academy"),
                map_size_mb: DEFAULT_LMDB_MAP_SIZE_MB,
            }
        );
    }

    #[test]
    fn test_site_config_normalises_footer_values() {
        let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        let _env = EnvVarGuard::set("ACADEMY_APP_ENV", Some("staging"));
        let _commit = EnvVarGuard::set("ACADEMY_BUILD_COMMIT", Some("0123456789abcdef"));
        let _stamp = EnvVarGuard::set("ACADEMY_BUILD_TIMESTAMP", Some("not a date"));
        let _worker = EnvVarGuard::set("ACADEMY_WORKER_STATUS", Some("Running"));
        let _cache = EnvVarGuard::set("ACADEMY_CACHE_STATUS", Some("offline"));
        let _mail = EnvVarGuard::set("ACADEMY_MAIL_STATUS", None);

        let site = SiteConfig::from_env();
        assert_eq!(site.app_environment, "STAGING");
        assert_eq!(site.build_commit, "0123456");
        assert_eq!(site.build_timestamp, None);
        assert_eq!(site.worker_status, ServiceStatus::Up);
        assert_eq!(site.cache_status, ServiceStatus::Down);
        assert_eq!(site.mail_status, ServiceStatus::Unknown);
    }
}
