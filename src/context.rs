/// Application context and dependency injection
use crate::{
    account::AccountManager,
    config::{ObjectStorageConfig, ServerConfig},
    db,
    error::{ApiError, ApiResult},
    media::{MediaRepository, MediaService},
    probe::{FfprobeProber, VideoProber},
    rate_limit::RateLimiter,
    storage::{DiskStorage, DriveCredentials, DriveStorage, ObjectStorage},
    token::{MemorySessionStore, RedisSessionStore, SessionStore, TokenService},
};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{info, warn};

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub accounts: Arc<AccountManager>,
    pub sessions: Arc<dyn SessionStore>,
    pub tokens: Arc<TokenService>,
    pub storage: Arc<dyn ObjectStorage>,
    pub media: Arc<MediaService>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppContext {
    /// Connect every backing service; any failure here is fatal
    pub async fn new(config: ServerConfig) -> ApiResult<Self> {
        config.validate()?;

        let db = db::create_pool(&config.storage.database_path, db::DatabaseOptions::default())
            .await?;
        db::run_migrations(&db).await?;
        db::test_connection(&db).await?;

        let sessions: Arc<dyn SessionStore> = match &config.sessions.redis_url {
            Some(url) => Arc::new(
                RedisSessionStore::connect(url, config.limits.external_call_timeout).await?,
            ),
            None => {
                warn!("CONTEST_REDIS_URL not set, sessions are kept in memory");
                Arc::new(MemorySessionStore::new())
            }
        };
        sessions.ping().await?;

        let storage: Arc<dyn ObjectStorage> = match &config.storage.objects {
            ObjectStorageConfig::Drive {
                credentials,
                save_directory,
            } => {
                let credentials = DriveCredentials::from_file(credentials).await?;
                Arc::new(
                    DriveStorage::connect(
                        credentials,
                        save_directory,
                        config.limits.external_call_timeout,
                    )
                    .await?,
                )
            }
            ObjectStorageConfig::Disk { location } => {
                tokio::fs::create_dir_all(location).await.map_err(|e| {
                    ApiError::Config(format!(
                        "Failed to create object directory {}: {}",
                        location.display(),
                        e
                    ))
                })?;
                Arc::new(DiskStorage::new(
                    location.clone(),
                    config.service.public_url.clone(),
                ))
            }
        };
        info!("Object storage backend: {}", storage.name());

        let prober: Arc<dyn VideoProber> = Arc::new(FfprobeProber::new(
            config.limits.ffprobe_path.clone(),
            config.limits.probe_timeout,
        ));

        Ok(Self::from_parts(config, db, sessions, storage, prober))
    }

    /// Assemble a context from already-connected services
    pub fn from_parts(
        config: ServerConfig,
        db: SqlitePool,
        sessions: Arc<dyn SessionStore>,
        storage: Arc<dyn ObjectStorage>,
        prober: Arc<dyn VideoProber>,
    ) -> Self {
        let accounts = Arc::new(AccountManager::new(
            db.clone(),
            config.service.admin_auto_activate,
        ));
        let tokens = Arc::new(TokenService::new(&config.token_config(), sessions.clone()));
        let media = Arc::new(MediaService::new(
            MediaRepository::new(db.clone()),
            storage.clone(),
            prober,
        ));
        let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));

        Self {
            config: Arc::new(config),
            db,
            accounts,
            sessions,
            tokens,
            storage,
            media,
            rate_limiter,
        }
    }
}
