/// Google Drive object storage backend (Drive REST v3)
///
/// Authenticates with an OAuth refresh token read from a credentials file and
/// keeps a cached access token. On connect the save directory and one child
/// folder per [`Folder`] are created if missing.
use crate::{
    error::{ApiError, ApiResult},
    storage::{Folder, ObjectData, ObjectStorage, StoredObject},
};
use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info};

const API_BASE: &str = "https://www.googleapis.com/drive/v3";
const UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";
const FOLDER_MIME: &str = "application/vnd.google-apps.folder";

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

/// OAuth client credentials plus a long-lived refresh token
#[derive(Debug, Clone, Deserialize)]
pub struct DriveCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl DriveCredentials {
    /// Read credentials from a JSON file
    pub async fn from_file(path: &Path) -> ApiResult<Self> {
        let raw = tokio::fs::read(path).await.map_err(|e| {
            ApiError::Config(format!(
                "Failed to read Drive credentials {}: {}",
                path.display(),
                e
            ))
        })?;

        serde_json::from_slice(&raw)
            .map_err(|e| ApiError::Config(format!("Invalid Drive credentials file: {}", e)))
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// Drive-backed storage
pub struct DriveStorage {
    client: Client,
    credentials: DriveCredentials,
    token: Mutex<Option<CachedToken>>,
    folders: HashMap<Folder, String>,
}

/// Drive query string literal
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

fn folder_query(name: &str, parent_id: &str) -> String {
    format!(
        "name = {} and mimeType = '{}' and {} in parents and trashed = false",
        quote(name),
        FOLDER_MIME,
        quote(parent_id)
    )
}

/// Public view URL for a shared Drive file
pub fn public_url(id: &str) -> String {
    format!("https://drive.google.com/uc?export=view&id={}", id)
}

fn upstream(step: &str, e: impl std::fmt::Display) -> ApiError {
    ApiError::Upstream(format!("Drive {} failed: {}", step, e))
}

async fn check(step: &str, response: reqwest::Response) -> ApiResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(upstream(step, format!("{} {}", status, body)))
}

impl DriveStorage {
    /// Authenticate and make sure the folder layout exists
    pub async fn connect(
        credentials: DriveCredentials,
        save_directory: &str,
        timeout: Duration,
    ) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        let mut storage = Self {
            client,
            credentials,
            token: Mutex::new(None),
            folders: HashMap::new(),
        };

        info!("Ensuring Drive directory '{}'", save_directory);
        let root = storage.ensure_folder(save_directory, "root").await?;
        debug!("Drive save directory id: {}", root);

        for folder in Folder::ALL {
            let id = storage.ensure_folder(folder.as_str(), &root).await?;
            debug!("Drive {} directory id: {}", folder.as_str(), id);
            storage.folders.insert(folder, id);
        }

        Ok(storage)
    }

    async fn access_token(&self) -> ApiResult<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }

        let params = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("refresh_token", self.credentials.refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];

        let response = self
            .client
            .post(&self.credentials.token_uri)
            .form(&params)
            .send()
            .await
            .map_err(|e| upstream("token refresh", e))?;
        let token: TokenResponse = check("token refresh", response)
            .await?
            .json()
            .await
            .map_err(|e| upstream("token refresh", e))?;

        // Refresh a minute early
        let lifetime = Duration::from_secs(token.expires_in.saturating_sub(60));
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });

        Ok(token.access_token)
    }

    async fn ensure_folder(&self, name: &str, parent_id: &str) -> ApiResult<String> {
        let token = self.access_token().await?;
        let query = folder_query(name, parent_id);

        let response = self
            .client
            .get(format!("{}/files", API_BASE))
            .bearer_auth(&token)
            .query(&[("q", query.as_str()), ("fields", "files(id)"), ("spaces", "drive")])
            .send()
            .await
            .map_err(|e| upstream("folder lookup", e))?;
        let existing: FileList = check("folder lookup", response)
            .await?
            .json()
            .await
            .map_err(|e| upstream("folder lookup", e))?;

        if let Some(folder) = existing.files.into_iter().next() {
            return Ok(folder.id);
        }

        info!("Creating Drive directory '{}'", name);
        let response = self
            .client
            .post(format!("{}/files", API_BASE))
            .bearer_auth(&token)
            .json(&json!({
                "name": name,
                "mimeType": FOLDER_MIME,
                "parents": [parent_id],
            }))
            .send()
            .await
            .map_err(|e| upstream("folder create", e))?;
        let created: DriveFile = check("folder create", response)
            .await?
            .json()
            .await
            .map_err(|e| upstream("folder create", e))?;

        Ok(created.id)
    }
}

#[async_trait]
impl ObjectStorage for DriveStorage {
    async fn upload(
        &self,
        folder: Folder,
        name: &str,
        mime_type: &str,
        data: Vec<u8>,
    ) -> ApiResult<StoredObject> {
        let parent = self
            .folders
            .get(&folder)
            .ok_or_else(|| ApiError::Internal(format!("No Drive folder for {}", folder.as_str())))?;
        let token = self.access_token().await?;

        // Resumable upload: open a session with the metadata, then send the bytes
        let response = self
            .client
            .post(format!("{}/files?uploadType=resumable", UPLOAD_BASE))
            .bearer_auth(&token)
            .header("X-Upload-Content-Type", mime_type)
            .json(&json!({
                "name": name,
                "mimeType": mime_type,
                "parents": [parent],
            }))
            .send()
            .await
            .map_err(|e| upstream("upload session", e))?;
        let response = check("upload session", response).await?;

        let session_url = response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| upstream("upload session", "missing Location header"))?;

        let response = self
            .client
            .put(session_url)
            .bearer_auth(&token)
            .header(header::CONTENT_TYPE, mime_type)
            .body(data)
            .send()
            .await
            .map_err(|e| upstream("upload", e))?;
        let file: DriveFile = check("upload", response)
            .await?
            .json()
            .await
            .map_err(|e| upstream("upload", e))?;

        info!("Uploaded '{}' to Drive as {}", name, file.id);

        Ok(StoredObject {
            url: public_url(&file.id),
            id: file.id,
        })
    }

    async fn share_public(&self, id: &str) -> ApiResult<()> {
        let token = self.access_token().await?;

        let response = self
            .client
            .post(format!("{}/files/{}/permissions", API_BASE, id))
            .bearer_auth(&token)
            .json(&json!({ "type": "anyone", "role": "reader" }))
            .send()
            .await
            .map_err(|e| upstream("share", e))?;
        check("share", response).await?;

        Ok(())
    }

    async fn download(&self, id: &str) -> ApiResult<Option<ObjectData>> {
        // Drive ids are URL-safe; anything else cannot exist
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Ok(None);
        }

        let token = self.access_token().await?;
        let response = self
            .client
            .get(format!("{}/files/{}", API_BASE, id))
            .bearer_auth(&token)
            .query(&[("alt", "media")])
            .send()
            .await
            .map_err(|e| upstream("download", e))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = check("download", response).await?;

        let mime_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response
            .bytes()
            .await
            .map_err(|e| upstream("download", e))?
            .to_vec();

        Ok(Some(ObjectData { bytes, mime_type }))
    }

    fn name(&self) -> &'static str {
        "drive"
    }
}
