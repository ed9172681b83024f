use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use crate::recruitment::AllocationStrategy;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub recruitment: RecruitmentConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let log_format = match env::var("APP_LOG_FORMAT") {
            Ok(raw) => LogFormat::parse(&raw).ok_or(ConfigError::InvalidLogFormat(raw))?,
            Err(_) => LogFormat::Compact,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                log_format,
            },
            recruitment: RecruitmentConfig::from_env()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl LogFormat {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "compact" | "text" => Some(Self::Compact),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub log_format: LogFormat,
}

/// Recruitment policy knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecruitmentConfig {
    /// Applied when a new cycle does not specify its own limit.
    pub default_max_applications: u32,
    pub allocation_strategy: AllocationStrategy,
    /// Extra attempts for the allocation status batch after a failed write.
    pub write_retries: u32,
}

impl Default for RecruitmentConfig {
    fn default() -> Self {
        Self {
            default_max_applications: 3,
            allocation_strategy: AllocationStrategy::default(),
            write_retries: 2,
        }
    }
}

impl RecruitmentConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let default_max_applications = match env::var("RECRUIT_DEFAULT_MAX_APPLICATIONS") {
            Ok(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|value| *value > 0)
                .ok_or(ConfigError::InvalidMaxApplications)?,
            Err(_) => defaults.default_max_applications,
        };

        let allocation_strategy = match env::var("RECRUIT_ALLOCATION_STRATEGY") {
            Ok(raw) => raw
                .parse::<AllocationStrategy>()
                .map_err(|_| ConfigError::InvalidStrategy(raw))?,
            Err(_) => defaults.allocation_strategy,
        };

        let write_retries = match env::var("RECRUIT_WRITE_RETRIES") {
            Ok(raw) => raw
                .trim()
                .parse::<u32>()
                .map_err(|_| ConfigError::InvalidWriteRetries)?,
            Err(_) => defaults.write_retries,
        };

        Ok(Self {
            default_max_applications,
            allocation_strategy,
            write_retries,
        })
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidLogFormat(String),
    InvalidMaxApplications,
    InvalidStrategy(String),
    InvalidWriteRetries,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidLogFormat(value) => {
                write!(f, "APP_LOG_FORMAT must be compact or json (found '{value}')")
            }
            ConfigError::InvalidMaxApplications => write!(
                f,
                "RECRUIT_DEFAULT_MAX_APPLICATIONS must be a positive integer"
            ),
            ConfigError::InvalidStrategy(value) => write!(
                f,
                "RECRUIT_ALLOCATION_STRATEGY must be deferred_acceptance or settled_window (found '{value}')"
            ),
            ConfigError::InvalidWriteRetries => {
                write!(f, "RECRUIT_WRITE_RETRIES must be a non-negative integer")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}
