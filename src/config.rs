use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Environment variable that overrides `general.database_path`.
pub const DATABASE_URL_ENV: &str = "CINEVAULT_DATABASE_URL";

/// Environment variable that overrides `mailer.smtp_password`.
pub const SMTP_PASSWORD_ENV: &str = "CINEVAULT_SMTP_PASSWORD";

/// Longest accepted activation or authentication token lifetime (one year).
pub const MAX_TOKEN_TTL_HOURS: i64 = 24 * 365;

/// Longest accepted password-reset token lifetime (one day).
pub const MAX_PASSWORD_RESET_TTL_MINUTES: i64 = 24 * 60;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub server: ServerConfig,

    pub security: SecurityConfig,

    pub limiter: LimiterConfig,

    pub mailer: MailerConfig,

    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_path: String,

    pub log_level: String,

    /// "pretty" or "json"
    pub log_format: String,

    /// Number of tokio worker threads (default: 0)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    /// Maximum database connections (default: 5)
    pub max_db_connections: u32,

    /// Minimum database connections (default: 1)
    pub min_db_connections: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: "sqlite:data/cinevault.db".to_string(),
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            worker_threads: 0,
            max_db_connections: 5,
            min_db_connections: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,

    /// Reported by the healthcheck (development|staging|production).
    pub environment: String,

    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 4000,
            environment: "development".to_string(),
            cors_allowed_origins: vec!["http://localhost:4000".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Argon2 memory cost in KiB (default: 19456 = 19MB)
    pub argon2_memory_cost_kib: u32,

    /// Argon2 time cost (iterations) - higher = more CPU work
    pub argon2_time_cost: u32,

    /// Argon2 parallelism (default: 1)
    pub argon2_parallelism: u32,

    pub activation_token_ttl_hours: i64,

    pub authentication_token_ttl_hours: i64,

    pub password_reset_token_ttl_minutes: i64,

    /// Deadline applied to every store operation, including password hashing.
    pub store_timeout_ms: u64,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            argon2_memory_cost_kib: 19_456,
            argon2_time_cost: 2,
            argon2_parallelism: 1,
            activation_token_ttl_hours: 3 * 24,
            authentication_token_ttl_hours: 24,
            password_reset_token_ttl_minutes: 45,
            store_timeout_ms: 3_000,
        }
    }
}

impl SecurityConfig {
    #[must_use]
    pub const fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    // The lifetimes saturate instead of panicking on an unvalidated config;
    // token issuance then fails with an out-of-range error.

    #[must_use]
    pub fn activation_ttl(&self) -> chrono::Duration {
        chrono::Duration::try_hours(self.activation_token_ttl_hours)
            .unwrap_or(chrono::Duration::MAX)
    }

    #[must_use]
    pub fn authentication_ttl(&self) -> chrono::Duration {
        chrono::Duration::try_hours(self.authentication_token_ttl_hours)
            .unwrap_or(chrono::Duration::MAX)
    }

    #[must_use]
    pub fn password_reset_ttl(&self) -> chrono::Duration {
        chrono::Duration::try_minutes(self.password_reset_token_ttl_minutes)
            .unwrap_or(chrono::Duration::MAX)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimiterConfig {
    pub enabled: bool,

    /// Tokens refilled per second for each client IP.
    pub rps: f64,

    /// Bucket capacity.
    pub burst: u32,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rps: 2.0,
            burst: 4,
        }
    }
}

/// How outgoing mail leaves the process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailTransport {
    #[default]
    Smtp,
    /// Development only: messages are logged (token masked), never sent.
    Log,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmtpSecurity {
    #[default]
    Starttls,
    Tls,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailerConfig {
    pub transport: MailTransport,

    /// `From` mailbox, e.g. `Cinevault <no-reply@example.com>`
    pub sender: String,

    pub smtp_host: String,

    pub smtp_port: u16,

    pub smtp_username: String,

    /// Prefer `CINEVAULT_SMTP_PASSWORD` over writing this to disk.
    pub smtp_password: String,

    pub smtp_security: SmtpSecurity,

    /// Per-send deadline, also used as the SMTP connection timeout.
    pub timeout_seconds: u64,
}

impl Default for MailerConfig {
    fn default() -> Self {
        Self {
            transport: MailTransport::Smtp,
            sender: "Cinevault <no-reply@cinevault.local>".to_string(),
            smtp_host: "localhost".to_string(),
            smtp_port: 587,
            smtp_username: String::new(),
            smtp_password: String::new(),
            smtp_security: SmtpSecurity::Starttls,
            timeout_seconds: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let paths = Self::config_paths();

        let mut config = None;
        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                config = Some(Self::load_from_path(path)?);
                break;
            }
        }

        let mut config = config.unwrap_or_else(|| {
            info!("No config file found, using defaults");
            Self::default()
        });

        if let Ok(url) = std::env::var(DATABASE_URL_ENV)
            && !url.is_empty()
        {
            config.general.database_path = url;
        }

        if let Ok(password) = std::env::var(SMTP_PASSWORD_ENV)
            && !password.is_empty()
        {
            config.mailer.smtp_password = password;
        }

        Ok(config)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("cinevault").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".cinevault").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            Self::default().save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.general.max_db_connections == 0 {
            anyhow::bail!("general.max_db_connections must be > 0");
        }

        if self.general.min_db_connections > self.general.max_db_connections {
            anyhow::bail!("general.min_db_connections cannot exceed max_db_connections");
        }

        if self.security.store_timeout_ms == 0 {
            anyhow::bail!("security.store_timeout_ms must be > 0");
        }

        if self.security.activation_token_ttl_hours <= 0
            || self.security.authentication_token_ttl_hours <= 0
            || self.security.password_reset_token_ttl_minutes <= 0
        {
            anyhow::bail!("Token lifetimes must be positive");
        }

        if self.security.activation_token_ttl_hours > MAX_TOKEN_TTL_HOURS
            || self.security.authentication_token_ttl_hours > MAX_TOKEN_TTL_HOURS
        {
            anyhow::bail!(
                "Activation and authentication token lifetimes must be at most {MAX_TOKEN_TTL_HOURS} hours"
            );
        }

        if self.security.password_reset_token_ttl_minutes > MAX_PASSWORD_RESET_TTL_MINUTES {
            anyhow::bail!(
                "security.password_reset_token_ttl_minutes must be at most {MAX_PASSWORD_RESET_TTL_MINUTES}"
            );
        }

        if self.mailer.transport == MailTransport::Smtp
            && (self.mailer.smtp_host.is_empty() || self.mailer.smtp_port == 0)
        {
            anyhow::bail!("mailer.smtp_host and mailer.smtp_port are required for SMTP delivery");
        }

        if self.mailer.timeout_seconds == 0 {
            anyhow::bail!("mailer.timeout_seconds must be > 0");
        }

        if self.limiter.enabled && (self.limiter.rps <= 0.0 || self.limiter.burst == 0) {
            anyhow::bail!("Rate limiter rps and burst must be > 0 when enabled");
        }

        Ok(())
    }
}
