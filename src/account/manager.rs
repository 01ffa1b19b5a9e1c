/// Admin account manager using runtime queries
use crate::{
    account::CreateAdminRequest,
    db::models::Admin,
    error::{ApiError, ApiResult},
};
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};
use uuid::Uuid;

const ADMIN_COLUMNS: &str =
    "id, username, password_hash, name, profile_image_url, is_active, created_at, updated_at";

const INVALID_CREDENTIALS: &str = "invalid username or password";
const INACTIVE_ACCOUNT: &str = "account is not active";

/// Admin account service
pub struct AccountManager {
    db: SqlitePool,
    auto_activate: bool,
    hash_cost: u32,
}

impl AccountManager {
    /// Create a new account manager
    pub fn new(db: SqlitePool, auto_activate: bool) -> Self {
        Self {
            db,
            auto_activate,
            hash_cost: 10,
        }
    }

    /// Override the bcrypt cost (tests use the minimum)
    pub fn with_hash_cost(mut self, cost: u32) -> Self {
        self.hash_cost = cost;
        self
    }

    async fn hash_password(&self, password: String) -> ApiResult<String> {
        let cost = self.hash_cost;
        tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|e| ApiError::Internal(format!("Password hashing task failed: {}", e)))?
            .map_err(|e| ApiError::Internal(format!("Password hashing failed: {}", e)))
    }

    async fn verify_password(password: String, hash: String) -> ApiResult<bool> {
        tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash).unwrap_or(false))
            .await
            .map_err(|e| ApiError::Internal(format!("Password verification task failed: {}", e)))
    }

    /// Create a new admin
    pub async fn create_admin(&self, request: CreateAdminRequest) -> ApiResult<Admin> {
        if self.get_by_username(&request.username).await?.is_some() {
            return Err(ApiError::Conflict("Username already exist".to_string()));
        }

        let password_hash = self.hash_password(request.password).await?;

        let now = Utc::now();
        let admin = Admin {
            id: Uuid::new_v4().to_string(),
            username: request.username,
            password_hash,
            name: request.name,
            profile_image_url: request.profile_image_url.unwrap_or_default(),
            is_active: self.auto_activate,
            created_at: now,
            updated_at: now,
        };

        let inserted = sqlx::query(
            "INSERT INTO admin (id, username, password_hash, name, profile_image_url, is_active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(&admin.id)
        .bind(&admin.username)
        .bind(&admin.password_hash)
        .bind(&admin.name)
        .bind(&admin.profile_image_url)
        .bind(admin.is_active)
        .bind(admin.created_at)
        .bind(admin.updated_at)
        .execute(&self.db)
        .await;

        match inserted {
            Ok(_) => {}
            // Lost a race with a concurrent create for the same username
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                return Err(ApiError::Conflict("Username already exist".to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        info!(
            "Created admin {} (active: {})",
            admin.username, admin.is_active
        );

        Ok(admin)
    }

    /// Look up an admin by username
    pub async fn get_by_username(&self, username: &str) -> ApiResult<Option<Admin>> {
        let admin = sqlx::query_as::<_, Admin>(&format!(
            "SELECT {} FROM admin WHERE username = ?1",
            ADMIN_COLUMNS
        ))
        .bind(username)
        .fetch_optional(&self.db)
        .await?;

        Ok(admin)
    }

    /// Look up an admin that is allowed to act (exists and is active)
    pub async fn get_active(&self, username: &str) -> ApiResult<Admin> {
        match self.get_by_username(username).await? {
            Some(admin) if admin.is_active => Ok(admin),
            Some(_) => Err(ApiError::Unauthorized(INACTIVE_ACCOUNT.to_string())),
            None => Err(ApiError::Unauthorized("account not found".to_string())),
        }
    }

    /// Check credentials
    ///
    /// Unknown usernames and wrong passwords are indistinguishable to the caller.
    pub async fn login(&self, username: &str, password: &str) -> ApiResult<Admin> {
        let Some(admin) = self.get_by_username(username).await? else {
            debug!("Login for unknown username {}", username);
            return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()));
        };

        let valid =
            Self::verify_password(password.to_string(), admin.password_hash.clone()).await?;
        if !valid {
            warn!("Invalid password for {}", username);
            return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()));
        }

        if !admin.is_active {
            return Err(ApiError::Unauthorized(INACTIVE_ACCOUNT.to_string()));
        }

        Ok(admin)
    }

    /// Replace an admin's password
    pub async fn change_password(&self, username: &str, new_password: String) -> ApiResult<()> {
        let password_hash = self.hash_password(new_password).await?;

        let result = sqlx::query(
            "UPDATE admin SET password_hash = ?1, updated_at = ?2 WHERE username = ?3",
        )
        .bind(&password_hash)
        .bind(Utc::now())
        .bind(username)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound("Account not found".to_string()));
        }

        info!("Password changed for {}", username);
        Ok(())
    }

    /// Mark an admin active or inactive
    #[cfg(test)]
    pub(crate) async fn set_active(&self, username: &str, active: bool) -> ApiResult<()> {
        let result = sqlx::query("UPDATE admin SET is_active = ?1, updated_at = ?2 WHERE username = ?3")
            .bind(active)
            .bind(Utc::now())
            .bind(username)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound("Account not found".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    async fn manager(auto_activate: bool) -> AccountManager {
        let pool = db::create_memory_pool().await.unwrap();
        db::run_migrations(&pool).await.unwrap();
        AccountManager::new(pool, auto_activate).with_hash_cost(4)
    }

    fn request(username: &str) -> CreateAdminRequest {
        CreateAdminRequest {
            name: "Alice".to_string(),
            username: username.to_string(),
            password: "password123".to_string(),
            profile_image_url: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_login() {
        let accounts = manager(true).await;
        let admin = accounts.create_admin(request("alice")).await.unwrap();
        assert!(admin.is_active);
        assert_ne!(admin.password_hash, "password123");

        let logged_in = accounts.login("alice", "password123").await.unwrap();
        assert_eq!(logged_in.id, admin.id);
    }

    #[tokio::test]
    async fn test_duplicate_username_conflicts() {
        let accounts = manager(true).await;
        accounts.create_admin(request("alice")).await.unwrap();

        let err = accounts.create_admin(request("alice")).await.unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_bad_credentials_are_indistinguishable() {
        let accounts = manager(true).await;
        accounts.create_admin(request("alice")).await.unwrap();

        let wrong_password = accounts.login("alice", "wrongpass1").await.unwrap_err();
        let unknown_user = accounts.login("bob", "password123").await.unwrap_err();
        assert_eq!(wrong_password.to_string(), unknown_user.to_string());
        assert_eq!(unknown_user.to_string(), INVALID_CREDENTIALS);
    }

    #[tokio::test]
    async fn test_inactive_admin_cannot_login() {
        let accounts = manager(false).await;
        let admin = accounts.create_admin(request("alice")).await.unwrap();
        assert!(!admin.is_active);

        let err = accounts.login("alice", "password123").await.unwrap_err();
        assert_eq!(err.to_string(), INACTIVE_ACCOUNT);
        assert!(accounts.get_active("alice").await.is_err());

        accounts.set_active("alice", true).await.unwrap();
        assert!(accounts.login("alice", "password123").await.is_ok());
    }

    #[tokio::test]
    async fn test_change_password() {
        let accounts = manager(true).await;
        accounts.create_admin(request("alice")).await.unwrap();

        accounts
            .change_password("alice", "newpassword1".to_string())
            .await
            .unwrap();

        assert!(accounts.login("alice", "password123").await.is_err());
        assert!(accounts.login("alice", "newpassword1").await.is_ok());
    }
}
