/// Object storage for uploaded media
///
/// Binary content lives outside the database; records keep only the storage id
/// and public URL returned here. Backends: Google Drive (production) and the
/// local disk (development and tests).

pub mod disk;
pub mod drive;

pub use disk::DiskStorage;
pub use drive::{DriveCredentials, DriveStorage};

use crate::error::ApiResult;
use async_trait::async_trait;

/// Destination folder for an upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Folder {
    Contestant,
    Carousel,
    Gallery,
}

impl Folder {
    pub const ALL: [Folder; 3] = [Folder::Contestant, Folder::Carousel, Folder::Gallery];

    pub fn as_str(&self) -> &'static str {
        match self {
            Folder::Contestant => "contestant",
            Folder::Carousel => "carousel",
            Folder::Gallery => "gallery",
        }
    }
}

/// Reference to a stored object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub id: String,
    pub url: String,
}

/// Downloaded object content
#[derive(Debug, Clone)]
pub struct ObjectData {
    pub bytes: Vec<u8>,
    pub mime_type: Option<String>,
}

/// Object storage backend trait
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store `data` under `name` in `folder`, returning its id and public URL
    async fn upload(
        &self,
        folder: Folder,
        name: &str,
        mime_type: &str,
        data: Vec<u8>,
    ) -> ApiResult<StoredObject>;

    /// Grant anonymous read access to an object
    async fn share_public(&self, id: &str) -> ApiResult<()>;

    /// Fetch an object; `None` if it does not exist
    async fn download(&self, id: &str) -> ApiResult<Option<ObjectData>>;

    /// Backend name for logs
    fn name(&self) -> &'static str;
}
