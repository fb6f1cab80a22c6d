use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use crate::assessment::{Presentation, ScoringMode};

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
    pub api: ApiConfig,
    pub assessment: AssessmentConfig,
}

const DEFAULT_API_URL: &str = "http://127.0.0.1:8000/api";
const MAX_TIMEOUT_SECS: u64 = 300;
const MAX_GET_RETRIES: u8 = 5;

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

        let base_url = ApiConfig::normalize_base_url(
            &env::var("APP_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
        )?;
        let timeout_secs = env::var("APP_API_TIMEOUT_SECS")
            .unwrap_or_else(|_| "15".to_string())
            .trim()
            .parse::<u64>()
            .ok()
            .filter(|secs| (1..=MAX_TIMEOUT_SECS).contains(secs))
            .ok_or(ConfigError::InvalidTimeout)?;
        let get_retries = env::var("APP_API_GET_RETRIES")
            .unwrap_or_else(|_| "1".to_string())
            .trim()
            .parse::<u8>()
            .ok()
            .filter(|retries| *retries <= MAX_GET_RETRIES)
            .ok_or(ConfigError::InvalidRetries)?;

        let scoring_mode = match env::var("APP_SCORING_MODE") {
            Ok(raw) => raw
                .parse::<ScoringMode>()
                .map_err(|_| ConfigError::InvalidScoringMode { value: raw })?,
            Err(_) => ScoringMode::default(),
        };
        let presentation = match env::var("APP_PRESENTATION") {
            Ok(raw) => raw
                .parse::<Presentation>()
                .map_err(|_| ConfigError::InvalidPresentation { value: raw })?,
            Err(_) => Presentation::default(),
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            api: ApiConfig {
                base_url,
                timeout: Duration::from_secs(timeout_secs),
                get_retries,
            },
            assessment: AssessmentConfig {
                scoring_mode,
                presentation,
            },
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

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Connection settings for the external REST API holding questions and user records.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub get_retries: u8,
}

impl ApiConfig {
    /// Accepts `http`/`https` URLs and strips trailing slashes so paths can be appended.
    pub fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
        let trimmed = raw.trim().trim_end_matches('/');
        let has_scheme = trimmed.starts_with("http://") || trimmed.starts_with("https://");
        let has_host = trimmed
            .split_once("://")
            .map(|(_, rest)| !rest.is_empty())
            .unwrap_or(false);

        if has_scheme && has_host {
            Ok(trimmed.to_string())
        } else {
            Err(ConfigError::InvalidApiUrl {
                value: raw.to_string(),
            })
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            timeout: Duration::from_secs(15),
            get_retries: 1,
        }
    }
}

/// Scoring and presentation flags for assessment sessions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssessmentConfig {
    pub scoring_mode: ScoringMode,
    pub presentation: Presentation,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidApiUrl { value: String },
    InvalidTimeout,
    InvalidRetries,
    InvalidScoringMode { value: String },
    InvalidPresentation { value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidApiUrl { value } => {
                write!(f, "APP_API_URL must be an http(s) URL, got '{value}'")
            }
            ConfigError::InvalidTimeout => write!(
                f,
                "APP_API_TIMEOUT_SECS must be between 1 and {MAX_TIMEOUT_SECS}"
            ),
            ConfigError::InvalidRetries => write!(
                f,
                "APP_API_GET_RETRIES must be between 0 and {MAX_GET_RETRIES}"
            ),
            ConfigError::InvalidScoringMode { value } => write!(
                f,
                "APP_SCORING_MODE must be 'weighted' or 'multiplicative', got '{value}'"
            ),
            ConfigError::InvalidPresentation { value } => write!(
                f,
                "APP_PRESENTATION must be 'gated', 'auto-advance' or 'free', got '{value}'"
            ),
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
