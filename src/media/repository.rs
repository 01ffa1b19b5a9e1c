/// Media record persistence using runtime queries
use crate::{
    db::models::{Carousel, Contestant, ContestantVideo, Gallery},
    error::{ApiError, ApiResult},
    media::{ContestantListing, GalleryListing, SortOrder},
};
use chrono::Utc;
use sqlx::SqlitePool;

const CAROUSEL_COLUMNS: &str = "id, uploader_name, uploader_username, uploader_profile_image_url, \
     title, description, duration, storage_id, public_url, created_at, updated_at";

const GALLERY_COLUMNS: &str = "id, uploader_name, uploader_username, uploader_profile_image_url, \
     title, description, storage_id, public_url, created_at, updated_at";

const CONTESTANT_COLUMNS: &str =
    "id, name, email, phone, school, title, video_id, video_url, created_at, updated_at";

/// Media record store
#[derive(Clone)]
pub struct MediaRepository {
    db: SqlitePool,
}

impl MediaRepository {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn insert_carousel(&self, carousel: &Carousel) -> ApiResult<()> {
        sqlx::query(&format!(
            "INSERT INTO carousel ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            CAROUSEL_COLUMNS
        ))
        .bind(&carousel.id)
        .bind(&carousel.uploader.name)
        .bind(&carousel.uploader.username)
        .bind(&carousel.uploader.profile_image_url)
        .bind(&carousel.content.title)
        .bind(&carousel.content.description)
        .bind(carousel.content.duration)
        .bind(&carousel.content.id)
        .bind(&carousel.content.url)
        .bind(carousel.created_at)
        .bind(carousel.updated_at)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// All carousel items ordered by `updated_at`
    pub async fn list_carousel(&self, sort: SortOrder) -> ApiResult<Vec<Carousel>> {
        let items = sqlx::query_as::<_, Carousel>(&format!(
            "SELECT {} FROM carousel ORDER BY updated_at {}, id {}",
            CAROUSEL_COLUMNS,
            sort.as_sql(),
            sort.as_sql()
        ))
        .fetch_all(&self.db)
        .await?;

        Ok(items)
    }

    pub async fn get_carousel(&self, id: &str) -> ApiResult<Option<Carousel>> {
        let item = sqlx::query_as::<_, Carousel>(&format!(
            "SELECT {} FROM carousel WHERE id = ?1",
            CAROUSEL_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        Ok(item)
    }

    /// Fill in a probed duration; `updated_at` is left alone so ordering is stable
    pub async fn set_carousel_duration(&self, id: &str, duration_ms: i64) -> ApiResult<()> {
        let result = sqlx::query("UPDATE carousel SET duration = ?1 WHERE id = ?2")
            .bind(duration_ms)
            .bind(id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound(format!("Carousel {} not found", id)));
        }

        Ok(())
    }

    pub async fn insert_gallery(&self, gallery: &Gallery) -> ApiResult<()> {
        sqlx::query(&format!(
            "INSERT INTO gallery ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            GALLERY_COLUMNS
        ))
        .bind(&gallery.id)
        .bind(&gallery.uploader.name)
        .bind(&gallery.uploader.username)
        .bind(&gallery.uploader.profile_image_url)
        .bind(&gallery.content.title)
        .bind(&gallery.content.description)
        .bind(&gallery.content.id)
        .bind(&gallery.content.url)
        .bind(gallery.created_at)
        .bind(gallery.updated_at)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    pub async fn list_gallery(&self, listing: &GalleryListing) -> ApiResult<Vec<Gallery>> {
        let items = sqlx::query_as::<_, Gallery>(&format!(
            "SELECT {} FROM gallery ORDER BY updated_at {}, id {} LIMIT ?1 OFFSET ?2",
            GALLERY_COLUMNS,
            listing.sort.as_sql(),
            listing.sort.as_sql()
        ))
        .bind(listing.page.sql_limit())
        .bind(listing.page.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(items)
    }

    pub async fn insert_contestant(&self, contestant: &Contestant) -> ApiResult<()> {
        sqlx::query(&format!(
            "INSERT INTO contestant ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            CONTESTANT_COLUMNS
        ))
        .bind(&contestant.id)
        .bind(&contestant.name)
        .bind(&contestant.email)
        .bind(&contestant.phone)
        .bind(&contestant.school)
        .bind(&contestant.title)
        .bind(&contestant.video.id)
        .bind(&contestant.video.url)
        .bind(contestant.created_at)
        .bind(contestant.updated_at)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// Attach the stored video to a pre-created contestant
    pub async fn set_contestant_video(
        &self,
        id: &str,
        video: &ContestantVideo,
    ) -> ApiResult<Contestant> {
        let result = sqlx::query(
            "UPDATE contestant SET video_id = ?1, video_url = ?2, updated_at = ?3 WHERE id = ?4",
        )
        .bind(&video.id)
        .bind(&video.url)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound(format!("Contestant {} not found", id)));
        }

        self.get_contestant(id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Contestant {} not found", id)))
    }

    pub async fn get_contestant(&self, id: &str) -> ApiResult<Option<Contestant>> {
        let contestant = sqlx::query_as::<_, Contestant>(&format!(
            "SELECT {} FROM contestant WHERE id = ?1",
            CONTESTANT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        Ok(contestant)
    }

    /// One page of contestants; the sort column comes from a whitelist
    pub async fn list_contestants(&self, listing: &ContestantListing) -> ApiResult<Vec<Contestant>> {
        let items = sqlx::query_as::<_, Contestant>(&format!(
            "SELECT {} FROM contestant ORDER BY {} {}, id {} LIMIT ?1 OFFSET ?2",
            CONTESTANT_COLUMNS,
            listing.sort_by.column(),
            listing.sort.as_sql(),
            listing.sort.as_sql()
        ))
        .bind(listing.page.sql_limit())
        .bind(listing.page.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(items)
    }

    pub async fn count_contestants(&self) -> ApiResult<i64> {
        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM contestant")
            .fetch_one(&self.db)
            .await?;

        Ok(total)
    }
}
