/// Disk-based object storage backend
use crate::{
    error::{ApiError, ApiResult},
    storage::{Folder, ObjectData, ObjectStorage, StoredObject},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;
use uuid::Uuid;

/// Sidecar kept next to each object
#[derive(Debug, Serialize, Deserialize)]
struct ObjectMeta {
    name: String,
    folder: String,
    mime_type: String,
}

/// Disk storage backend
///
/// Objects are sharded by the first two characters of their id:
/// `{base}/{shard}/{id}` with metadata in `{base}/{shard}/{id}.json`.
/// Public URLs point at this service's asset route.
#[derive(Clone)]
pub struct DiskStorage {
    base_path: PathBuf,
    public_url: String,
}

impl DiskStorage {
    /// Create a new disk storage backend
    pub fn new(base_path: PathBuf, public_url: impl Into<String>) -> Self {
        Self {
            base_path,
            public_url: public_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn object_path(&self, id: &str) -> PathBuf {
        if id.len() >= 2 && id.is_char_boundary(2) {
            self.base_path.join(&id[0..2]).join(id)
        } else {
            self.base_path.join("_").join(id)
        }
    }

    fn meta_path(&self, id: &str) -> PathBuf {
        self.object_path(id).with_extension("json")
    }

    /// Ids are generated here; anything else could escape the base path
    fn is_valid_id(id: &str) -> bool {
        Uuid::parse_str(id).is_ok()
    }
}

#[async_trait]
impl ObjectStorage for DiskStorage {
    async fn upload(
        &self,
        folder: Folder,
        name: &str,
        mime_type: &str,
        data: Vec<u8>,
    ) -> ApiResult<StoredObject> {
        let id = Uuid::new_v4().to_string();
        let path = self.object_path(&id);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                ApiError::Upstream(format!("Failed to create object directory: {}", e))
            })?;
        }

        fs::write(&path, data)
            .await
            .map_err(|e| ApiError::Upstream(format!("Failed to write object {}: {}", id, e)))?;

        let meta = ObjectMeta {
            name: name.to_string(),
            folder: folder.as_str().to_string(),
            mime_type: mime_type.to_string(),
        };
        let meta = serde_json::to_vec(&meta)
            .map_err(|e| ApiError::Internal(format!("Failed to encode object metadata: {}", e)))?;
        fs::write(self.meta_path(&id), meta).await.map_err(|e| {
            ApiError::Upstream(format!("Failed to write object metadata {}: {}", id, e))
        })?;

        Ok(StoredObject {
            url: format!("{}/api/v1/assets/{}", self.public_url, id),
            id,
        })
    }

    async fn share_public(&self, _id: &str) -> ApiResult<()> {
        // Served through the public asset route
        Ok(())
    }

    async fn download(&self, id: &str) -> ApiResult<Option<ObjectData>> {
        if !Self::is_valid_id(id) {
            return Ok(None);
        }

        let bytes = match fs::read(self.object_path(id)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ApiError::Upstream(format!(
                    "Failed to read object {}: {}",
                    id, e
                )))
            }
        };

        let mime_type = match fs::read(self.meta_path(id)).await {
            Ok(raw) => serde_json::from_slice::<ObjectMeta>(&raw)
                .ok()
                .map(|meta| meta.mime_type),
            Err(_) => None,
        };

        Ok(Some(ObjectData { bytes, mime_type }))
    }

    fn name(&self) -> &'static str {
        "disk"
    }
}
