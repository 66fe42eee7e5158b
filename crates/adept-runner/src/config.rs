//! Configuration for the runner.
//!
//! The configuration lives in a YAML file (`adept.yaml` by default, see
//! `--config-file`). Every section except `auth` is optional and falls back
//! to defaults. Credentials may come from the environment instead of the
//! file:
//!
//! - `ADEPT_LOGIN` overrides `auth.login`
//! - `ADEPT_PASSWORD` overrides `auth.password`
//! - `ADEPT_CHECK_URL` overrides `admin.check_url`

use std::path::Path;
use std::time::Duration;

use adept_core::scheduler::{DEFAULT_INTERVAL_MINUTES, DEFAULT_SNAPSHOT_AUTH_RETRIES, SchedulerConfig};
use serde::Deserialize;

use crate::error::ConfigError;

/// Complete runner configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RunnerConfig {
    /// Portal credentials.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Operator integrations.
    #[serde(default)]
    pub admin: AdminConfig,
    /// Poll timing and retry budgets.
    #[serde(default)]
    pub polling: PollingConfig,
    /// Portal URLs.
    #[serde(default)]
    pub endpoints: EndpointsConfig,
    /// Log output.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl RunnerConfig {
    /// Load, apply environment overrides, and validate.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut config = Self::parse(&contents)?;
        config.apply_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse YAML without overrides or validation.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Apply overrides from `lookup`, which maps a variable name to its value.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(login) = lookup("ADEPT_LOGIN") {
            self.auth.login = login;
        }
        if let Some(password) = lookup("ADEPT_PASSWORD") {
            self.auth.password = password;
        }
        if let Some(check_url) = lookup("ADEPT_CHECK_URL") {
            self.admin.check_url = Some(check_url).filter(|url| !url.trim().is_empty());
        }
    }

    /// Reject configurations the runner cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("auth.page", &self.auth.page),
            ("auth.login", &self.auth.login),
            ("auth.domain", &self.auth.domain),
            ("auth.password", &self.auth.password),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::Missing { field });
            }
        }

        if self.polling.max_passes_per_tick == 0 {
            return Err(ConfigError::Invalid {
                field: "polling.max_passes_per_tick",
                reason: String::from("must be at least 1"),
            });
        }
        if self.polling.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "polling.request_timeout_secs",
                reason: String::from("must be at least 1"),
            });
        }

        let urls = [
            ("endpoints.portal_url", self.endpoints.portal_url.as_str()),
            ("endpoints.auth_url", self.endpoints.auth_url.as_str()),
            ("endpoints.hero_bag_url", self.endpoints.hero_bag_url.as_str()),
        ];
        for (field, url) in urls {
            reqwest::Url::parse(url).map_err(|e| ConfigError::Invalid {
                field,
                reason: e.to_string(),
            })?;
        }
        if let Some(check_url) = &self.admin.check_url {
            reqwest::Url::parse(check_url).map_err(|e| ConfigError::Invalid {
                field: "admin.check_url",
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }
}

/// Portal login form fields.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AuthConfig {
    /// Landing page the login form redirects to (`Page`).
    #[serde(default)]
    pub page: String,
    /// Account login (`Login`).
    #[serde(default)]
    pub login: String,
    /// Account domain (`Domain`).
    #[serde(default)]
    pub domain: String,
    /// Account password (`Password`).
    #[serde(default)]
    pub password: String,
    /// `User-Agent` header for every request.
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("page", &self.page)
            .field("login", &self.login)
            .field("domain", &self.domain)
            .field("password", &"<redacted>")
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

/// Operator integrations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AdminConfig {
    /// Health-check URL pinged after every tick.
    #[serde(default)]
    pub check_url: Option<String>,
}

/// Poll timing and retry budgets.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PollingConfig {
    /// Nominal minutes between polls; the actual delay is jittered by 25%.
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,
    /// Ceiling on convergence passes within one tick.
    #[serde(default = "default_max_passes_per_tick")]
    pub max_passes_per_tick: u32,
    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Pause before retrying a timed-out request.
    #[serde(default = "default_timeout_retry_delay_secs")]
    pub timeout_retry_delay_secs: u64,
    /// Pause between failed login attempts at startup.
    #[serde(default = "default_auth_retry_delay_secs")]
    pub auth_retry_delay_secs: u64,
    /// Re-authentications attempted for one expired snapshot.
    #[serde(default = "default_snapshot_auth_retries")]
    pub snapshot_auth_retries: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_minutes: default_interval_minutes(),
            max_passes_per_tick: default_max_passes_per_tick(),
            request_timeout_secs: default_request_timeout_secs(),
            timeout_retry_delay_secs: default_timeout_retry_delay_secs(),
            auth_retry_delay_secs: default_auth_retry_delay_secs(),
            snapshot_auth_retries: default_snapshot_auth_retries(),
        }
    }
}

impl PollingConfig {
    /// Settings for the poll scheduler.
    pub const fn scheduler(&self) -> SchedulerConfig {
        SchedulerConfig {
            interval_minutes: self.interval_minutes,
            snapshot_auth_retries: self.snapshot_auth_retries,
        }
    }

    /// Per-request timeout.
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Pause before retrying a timed-out request.
    pub const fn timeout_retry_delay(&self) -> Duration {
        Duration::from_secs(self.timeout_retry_delay_secs)
    }

    /// Pause between failed login attempts.
    pub const fn auth_retry_delay(&self) -> Duration {
        Duration::from_secs(self.auth_retry_delay_secs)
    }
}

/// Portal URLs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EndpointsConfig {
    /// Portal landing page, fetched first to obtain session cookies. Action
    /// links are resolved relative to it.
    #[serde(default = "default_portal_url")]
    pub portal_url: String,
    /// Login form target.
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    /// `HeroBag` snapshot endpoint.
    #[serde(default = "default_hero_bag_url")]
    pub hero_bag_url: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            portal_url: default_portal_url(),
            auth_url: default_auth_url(),
            hero_bag_url: default_hero_bag_url(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
    /// Filter directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: default_log_level(),
        }
    }
}

const fn default_interval_minutes() -> u64 {
    DEFAULT_INTERVAL_MINUTES
}

const fn default_max_passes_per_tick() -> u32 {
    adept_core::engine::DEFAULT_MAX_PASSES
}

const fn default_request_timeout_secs() -> u64 {
    30
}

const fn default_timeout_retry_delay_secs() -> u64 {
    5
}

const fn default_auth_retry_delay_secs() -> u64 {
    60
}

const fn default_snapshot_auth_retries() -> u32 {
    DEFAULT_SNAPSHOT_AUTH_RETRIES
}

fn default_portal_url() -> String {
    "https://portal.sf.mail.ru/skyforgenews".to_owned()
}

fn default_auth_url() -> String {
    "https://auth.mail.ru/cgi-bin/auth".to_owned()
}

fn default_hero_bag_url() -> String {
    "https://portal.sf.mail.ru/cult/HeroBag:loadData".to_owned()
}

fn default_log_level() -> String {
    "info".to_owned()
}
