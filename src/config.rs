/// Configuration management for the contest backend
use crate::{
    error::{ApiError, ApiResult},
    rate_limit::RateLimitConfig,
    token::TokenConfig,
};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Main server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub authentication: AuthConfig,
    pub storage: StorageConfig,
    pub sessions: SessionConfig,
    pub limits: LimitsConfig,
    pub rate_limit: RateLimitConfig,
}

/// Service-level configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    /// Base URL clients reach this service at
    pub public_url: String,
    /// New admins are created active
    pub admin_auto_activate: bool,
    pub shutdown_grace: Duration,
}

/// Token secrets and lifetimes
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub access_token_secret: String,
    pub refresh_token_secret: String,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
}

/// Object storage backend selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectStorageConfig {
    Drive {
        credentials: PathBuf,
        save_directory: String,
    },
    Disk {
        location: PathBuf,
    },
}

/// Persistence configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub database_path: PathBuf,
    pub objects: ObjectStorageConfig,
}

/// Session store configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// `None` keeps sessions in process memory
    pub redis_url: Option<String>,
}

/// Bounds on external calls and request sizes
#[derive(Debug, Clone)]
pub struct LimitsConfig {
    pub external_call_timeout: Duration,
    pub probe_timeout: Duration,
    pub ffprobe_path: String,
    pub upload_limit_bytes: usize,
}

fn parse_var<T: FromStr>(name: &str, default: T) -> ApiResult<T> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ApiError::Config(format!("Invalid value for {}: {}", name, raw))),
        Err(_) => Ok(default),
    }
}

fn required_var(name: &str) -> ApiResult<String> {
    env::var(name).map_err(|_| ApiError::Config(format!("{} is required", name)))
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> ApiResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("CONTEST_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 = parse_var("CONTEST_PORT", 8080)?;
        let public_url = env::var("CONTEST_PUBLIC_URL")
            .unwrap_or_else(|_| format!("http://{}:{}", hostname, port));

        let access_token_secret = required_var("CONTEST_ACCESS_TOKEN_SECRET")?;
        let refresh_token_secret = required_var("CONTEST_REFRESH_TOKEN_SECRET")?;
        let access_ttl: u64 = parse_var("CONTEST_ACCESS_TOKEN_TTL_SECS", 900)?;
        let refresh_ttl: u64 = parse_var("CONTEST_REFRESH_TOKEN_TTL_SECS", 604_800)?;

        let database_path: PathBuf = env::var("CONTEST_DATABASE_PATH")
            .unwrap_or_else(|_| "./data/contest.sqlite".to_string())
            .into();

        let backend = env::var("CONTEST_STORAGE_BACKEND").unwrap_or_else(|_| "drive".to_string());
        let objects = match backend.as_str() {
            "drive" => ObjectStorageConfig::Drive {
                credentials: required_var("CONTEST_DRIVE_CREDENTIALS")?.into(),
                save_directory: env::var("CONTEST_DRIVE_SAVE_DIRECTORY")
                    .unwrap_or_else(|_| "M2M Gdrive Backend".to_string()),
            },
            "disk" => ObjectStorageConfig::Disk {
                location: env::var("CONTEST_DISK_STORAGE_PATH")
                    .unwrap_or_else(|_| "./data/objects".to_string())
                    .into(),
            },
            other => {
                return Err(ApiError::Config(format!(
                    "Unknown storage backend: {}",
                    other
                )))
            }
        };

        let redis_url = env::var("CONTEST_REDIS_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        let external_call_timeout: u64 = parse_var("CONTEST_EXTERNAL_CALL_TIMEOUT_SECS", 30)?;
        let probe_timeout: u64 = parse_var("CONTEST_PROBE_TIMEOUT_SECS", 60)?;
        let ffprobe_path = env::var("CONTEST_FFPROBE_PATH").unwrap_or_else(|_| "ffprobe".to_string());
        let upload_limit_bytes: usize = parse_var("CONTEST_UPLOAD_LIMIT_BYTES", 268_435_456)?;

        let admin_auto_activate = parse_var("CONTEST_ADMIN_AUTO_ACTIVATE", false)?;
        let shutdown_grace: u64 = parse_var("CONTEST_SHUTDOWN_GRACE_SECS", 30)?;
        let rate_limit_enabled = parse_var("CONTEST_RATE_LIMIT_ENABLED", true)?;

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                public_url,
                admin_auto_activate,
                shutdown_grace: Duration::from_secs(shutdown_grace),
            },
            authentication: AuthConfig {
                access_token_secret,
                refresh_token_secret,
                access_token_ttl: Duration::from_secs(access_ttl),
                refresh_token_ttl: Duration::from_secs(refresh_ttl),
            },
            storage: StorageConfig {
                database_path,
                objects,
            },
            sessions: SessionConfig { redis_url },
            limits: LimitsConfig {
                external_call_timeout: Duration::from_secs(external_call_timeout),
                probe_timeout: Duration::from_secs(probe_timeout),
                ffprobe_path,
                upload_limit_bytes,
            },
            rate_limit: RateLimitConfig {
                enabled: rate_limit_enabled,
                ..RateLimitConfig::default()
            },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> ApiResult<()> {
        if self.service.hostname.is_empty() {
            return Err(ApiError::Config("Hostname cannot be empty".to_string()));
        }

        let auth = &self.authentication;
        if auth.access_token_secret.len() < 32 || auth.refresh_token_secret.len() < 32 {
            return Err(ApiError::Config(
                "Token secrets must be at least 32 characters".to_string(),
            ));
        }

        if auth.access_token_secret == auth.refresh_token_secret {
            return Err(ApiError::Config(
                "Access and refresh token secrets must differ".to_string(),
            ));
        }

        if auth.access_token_ttl.is_zero() || auth.refresh_token_ttl.is_zero() {
            return Err(ApiError::Config(
                "Token lifetimes must be positive".to_string(),
            ));
        }

        if self.limits.external_call_timeout.is_zero() || self.limits.probe_timeout.is_zero() {
            return Err(ApiError::Config("Timeouts must be positive".to_string()));
        }

        Ok(())
    }

    /// Token service settings derived from the authentication section
    pub fn token_config(&self) -> TokenConfig {
        TokenConfig {
            access_secret: self.authentication.access_token_secret.clone(),
            refresh_secret: self.authentication.refresh_token_secret.clone(),
            access_ttl: self.authentication.access_token_ttl,
            refresh_ttl: self.authentication.refresh_token_ttl,
        }
    }

    /// Configuration suitable for tests: disk objects, in-memory sessions
    pub fn for_tests(database_path: PathBuf, objects_dir: PathBuf) -> Self {
        ServerConfig {
            service: ServiceConfig {
                hostname: "127.0.0.1".to_string(),
                port: 0,
                public_url: "http://127.0.0.1".to_string(),
                admin_auto_activate: true,
                shutdown_grace: Duration::from_secs(1),
            },
            authentication: AuthConfig {
                access_token_secret: "test-access-secret-test-access-secret".to_string(),
                refresh_token_secret: "test-refresh-secret-test-refresh-secret".to_string(),
                access_token_ttl: Duration::from_secs(900),
                refresh_token_ttl: Duration::from_secs(604_800),
            },
            storage: StorageConfig {
                database_path,
                objects: ObjectStorageConfig::Disk {
                    location: objects_dir,
                },
            },
            sessions: SessionConfig { redis_url: None },
            limits: LimitsConfig {
                external_call_timeout: Duration::from_secs(5),
                probe_timeout: Duration::from_secs(5),
                ffprobe_path: "ffprobe".to_string(),
                upload_limit_bytes: 16 * 1024 * 1024,
            },
            rate_limit: RateLimitConfig {
                enabled: false,
                ..RateLimitConfig::default()
            },
        }
    }
}
