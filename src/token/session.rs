/// Session store: token identifier -> subject, with store-enforced expiry
///
/// Liveness of a token for authorization purposes is decided here. The store
/// must offer atomic single-key set/get/delete, and `delete` must report the
/// exact number of removed entries: single-use refresh tokens rely on it.
use super::TokenError;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::collections::HashMap;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Backend for session entries
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Register `token_id -> subject`, expiring after `ttl`
    async fn put(&self, token_id: &str, subject: &str, ttl: Duration) -> Result<(), TokenError>;

    /// Subject of a live entry, if any
    async fn get(&self, token_id: &str) -> Result<Option<String>, TokenError>;

    /// Remove an entry, returning how many entries were deleted (0 or 1)
    async fn delete(&self, token_id: &str) -> Result<u64, TokenError>;

    /// Connectivity check used at startup and by the health endpoint
    async fn ping(&self) -> Result<(), TokenError>;
}

/// Redis-backed session store
#[derive(Clone)]
pub struct RedisSessionStore {
    connection: ConnectionManager,
    key_prefix: String,
    timeout: Duration,
}

impl RedisSessionStore {
    /// Connect to Redis; every later call is bounded by `timeout`
    pub async fn connect(redis_url: &str, timeout: Duration) -> Result<Self, TokenError> {
        info!("Connecting to Redis session store at {}", redis_url);

        let client = Client::open(redis_url).map_err(|e| {
            error!("Failed to create Redis client: {}", e);
            TokenError::Storage(format!("Redis client creation failed: {}", e))
        })?;

        let connection = tokio::time::timeout(timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| TokenError::Storage("Redis connection timed out".to_string()))?
            .map_err(|e| {
                error!("Failed to connect to Redis: {}", e);
                TokenError::Storage(format!("Redis connection failed: {}", e))
            })?;

        info!("Redis session store connected");

        Ok(Self {
            connection,
            key_prefix: "contest:session:".to_string(),
            timeout,
        })
    }

    fn build_key(&self, token_id: &str) -> String {
        format!("{}{}", self.key_prefix, token_id)
    }

    async fn bounded<T, F>(&self, op: &str, key: &str, fut: F) -> Result<T, TokenError>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                warn!("Redis {} failed for {}: {}", op, key, e);
                Err(TokenError::Storage(format!("Redis {} failed: {}", op, e)))
            }
            Err(_) => {
                warn!("Redis {} timed out for {}", op, key);
                Err(TokenError::Storage(format!("Redis {} timed out", op)))
            }
        }
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn put(&self, token_id: &str, subject: &str, ttl: Duration) -> Result<(), TokenError> {
        let key = self.build_key(token_id);
        let secs = ttl.as_secs().max(1);
        debug!("Session SET: {} (TTL: {}s)", key, secs);

        let mut conn = self.connection.clone();
        self.bounded("SET", &key, conn.set_ex::<_, _, ()>(&key, subject, secs))
            .await
    }

    async fn get(&self, token_id: &str) -> Result<Option<String>, TokenError> {
        let key = self.build_key(token_id);

        let mut conn = self.connection.clone();
        self.bounded("GET", &key, conn.get::<_, Option<String>>(&key))
            .await
    }

    async fn delete(&self, token_id: &str) -> Result<u64, TokenError> {
        let key = self.build_key(token_id);
        debug!("Session DEL: {}", key);

        let mut conn = self.connection.clone();
        self.bounded("DEL", &key, conn.del::<_, u64>(&key)).await
    }

    async fn ping(&self) -> Result<(), TokenError> {
        let mut conn = self.connection.clone();
        let pong: String = self
            .bounded("PING", "-", redis::cmd("PING").query_async(&mut conn))
            .await?;

        if pong != "PONG" {
            return Err(TokenError::Storage(
                "Unexpected Redis PING response".to_string(),
            ));
        }

        Ok(())
    }
}

/// In-process session store for development and tests
///
/// Entries past their deadline behave exactly like deleted ones.
#[derive(Default)]
pub struct MemorySessionStore {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let entries = self.entries.lock().await;
        entries.values().filter(|(_, deadline)| *deadline > now).count()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn put(&self, token_id: &str, subject: &str, ttl: Duration) -> Result<(), TokenError> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        entries.retain(|_, (_, deadline)| *deadline > now);
        entries.insert(token_id.to_string(), (subject.to_string(), now + ttl));
        Ok(())
    }

    async fn get(&self, token_id: &str) -> Result<Option<String>, TokenError> {
        let entries = self.entries.lock().await;
        Ok(entries
            .get(token_id)
            .filter(|(_, deadline)| *deadline > Instant::now())
            .map(|(subject, _)| subject.clone()))
    }

    async fn delete(&self, token_id: &str) -> Result<u64, TokenError> {
        let mut entries = self.entries.lock().await;
        match entries.remove(token_id) {
            Some((_, deadline)) if deadline > Instant::now() => Ok(1),
            _ => Ok(0),
        }
    }

    async fn ping(&self) -> Result<(), TokenError> {
        Ok(())
    }
}
