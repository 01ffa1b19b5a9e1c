/// Record types stored in the contest database
///
/// Field names on the wire follow the public API: timestamps are snake_case,
/// everything else camelCase.
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// Admin account record
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Admin {
    pub id: String,
    pub username: String,
    /// bcrypt hash; never leaves the server
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub name: String,
    #[serde(rename = "profileImageUrl")]
    pub profile_image_url: String,
    #[serde(rename = "isActive")]
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Uploader snapshot embedded in media records
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Uploader {
    #[sqlx(rename = "uploader_name")]
    pub name: String,
    #[sqlx(rename = "uploader_username")]
    pub username: String,
    #[sqlx(rename = "uploader_profile_image_url")]
    #[serde(rename = "profileImageUrl")]
    pub profile_image_url: String,
}

impl From<&Admin> for Uploader {
    fn from(admin: &Admin) -> Self {
        Self {
            name: admin.name.clone(),
            username: admin.username.clone(),
            profile_image_url: admin.profile_image_url.clone(),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CarouselContent {
    pub title: String,
    pub description: String,
    /// Milliseconds; 0 until the prober has run
    pub duration: i64,
    #[sqlx(rename = "storage_id")]
    pub id: String,
    #[sqlx(rename = "public_url")]
    pub url: String,
}

/// Carousel video record
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Carousel {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[sqlx(flatten)]
    pub uploader: Uploader,
    #[sqlx(flatten)]
    pub content: CarouselContent,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct GalleryContent {
    pub title: String,
    pub description: String,
    #[sqlx(rename = "storage_id")]
    pub id: String,
    #[sqlx(rename = "public_url")]
    pub url: String,
}

/// Gallery image record
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Gallery {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[sqlx(flatten)]
    pub uploader: Uploader,
    #[sqlx(flatten)]
    pub content: GalleryContent,
}

#[derive(Debug, Clone, Default, FromRow, Serialize)]
pub struct ContestantVideo {
    #[sqlx(rename = "video_url")]
    pub url: String,
    #[sqlx(rename = "video_id")]
    pub id: String,
}

/// Contest submission
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Contestant {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub school: String,
    pub title: String,
    #[sqlx(flatten)]
    pub video: ContestantVideo,
}
