/// Media upload pipelines
///
/// Each pipeline runs its steps in order and stops at the first failure. Steps
/// that leave state behind (a stored object without a record, a record without
/// its video) are logged with the ids involved.
use crate::{
    account::AccountManager,
    db::models::{
        Admin, Carousel, CarouselContent, Contestant, ContestantVideo, Gallery, GalleryContent,
        Uploader,
    },
    error::ApiResult,
    media::{
        stored_name, ContestantListing, ContestantPage, GalleryListing, MediaRepository, SortOrder,
    },
    metrics,
    probe::VideoProber,
    storage::{Folder, ObjectStorage, StoredObject},
};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// A validated file part
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    /// Sniffed from the content
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Contestant submission fields
#[derive(Debug, Clone)]
pub struct ContestantSubmission {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub school: String,
    pub title: String,
}

/// Media pipelines over the repository and object storage
pub struct MediaService {
    repository: MediaRepository,
    storage: Arc<dyn ObjectStorage>,
    prober: Arc<dyn VideoProber>,
}

impl MediaService {
    pub fn new(
        repository: MediaRepository,
        storage: Arc<dyn ObjectStorage>,
        prober: Arc<dyn VideoProber>,
    ) -> Self {
        Self {
            repository,
            storage,
            prober,
        }
    }

    pub fn repository(&self) -> &MediaRepository {
        &self.repository
    }

    /// Upload and publish an object
    async fn store(
        &self,
        folder: Folder,
        name: &str,
        file: UploadedFile,
    ) -> ApiResult<StoredObject> {
        let stored = self
            .storage
            .upload(folder, name, &file.mime_type, file.bytes)
            .await?;

        if let Err(e) = self.storage.share_public(&stored.id).await {
            error!(
                "Stored object {} ({}) could not be shared: {}",
                stored.id,
                folder.as_str(),
                e
            );
            return Err(e);
        }

        Ok(stored)
    }

    /// Store a carousel video, persist its record and start duration probing
    pub async fn create_carousel(
        &self,
        uploader: &Admin,
        title: String,
        description: String,
        file: UploadedFile,
    ) -> ApiResult<Carousel> {
        let name = stored_name(&[&title, &uploader.username, &file.file_name]);

        let stored = match self.store(Folder::Carousel, &name, file).await {
            Ok(stored) => stored,
            Err(e) => {
                metrics::record_media_upload("carousel", false);
                return Err(e);
            }
        };

        let now = Utc::now();
        let carousel = Carousel {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            uploader: Uploader::from(uploader),
            content: CarouselContent {
                title,
                description,
                duration: 0,
                id: stored.id.clone(),
                url: stored.url.clone(),
            },
        };

        if let Err(e) = self.repository.insert_carousel(&carousel).await {
            error!(
                "Carousel object {} stored but record insert failed: {}",
                stored.id, e
            );
            metrics::record_media_upload("carousel", false);
            return Err(e);
        }

        metrics::record_media_upload("carousel", true);
        info!("Created carousel {} by {}", carousel.id, uploader.username);

        self.spawn_duration_probe(carousel.id.clone(), stored.url);

        Ok(carousel)
    }

    /// Probe a stored video in the background and record its duration
    pub fn spawn_duration_probe(&self, record_id: String, source: String) -> JoinHandle<()> {
        let repository = self.repository.clone();
        let prober = self.prober.clone();

        tokio::spawn(async move {
            let ok = enrich_duration(&repository, prober.as_ref(), &record_id, &source)
                .await
                .is_ok();
            metrics::record_enrichment_job(ok);
        })
    }

    /// Store a gallery image and persist its record
    pub async fn create_gallery(
        &self,
        uploader: &Admin,
        title: String,
        description: String,
        file: UploadedFile,
    ) -> ApiResult<Gallery> {
        let name = stored_name(&[&title, &uploader.username, &file.file_name]);

        let stored = match self.store(Folder::Gallery, &name, file).await {
            Ok(stored) => stored,
            Err(e) => {
                metrics::record_media_upload("gallery", false);
                return Err(e);
            }
        };

        let now = Utc::now();
        let gallery = Gallery {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            uploader: Uploader::from(uploader),
            content: GalleryContent {
                title,
                description,
                id: stored.id.clone(),
                url: stored.url,
            },
        };

        if let Err(e) = self.repository.insert_gallery(&gallery).await {
            error!(
                "Gallery object {} stored but record insert failed: {}",
                stored.id, e
            );
            metrics::record_media_upload("gallery", false);
            return Err(e);
        }

        metrics::record_media_upload("gallery", true);
        info!("Created gallery {} by {}", gallery.id, uploader.username);

        Ok(gallery)
    }

    /// Record a submission, then store its video and attach it
    ///
    /// The record exists before the upload starts; if the upload fails it keeps
    /// an empty video reference.
    pub async fn submit_contestant(
        &self,
        submission: ContestantSubmission,
        video: UploadedFile,
    ) -> ApiResult<Contestant> {
        let now = Utc::now();
        let contestant = Contestant {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            name: submission.name,
            email: submission.email,
            phone: submission.phone,
            school: submission.school,
            title: submission.title,
            video: ContestantVideo::default(),
        };
        self.repository.insert_contestant(&contestant).await?;

        let name = stored_name(&[
            &contestant.title,
            &contestant.name,
            &contestant.school,
            &video.file_name,
        ]);

        let stored = match self.store(Folder::Contestant, &name, video).await {
            Ok(stored) => stored,
            Err(e) => {
                error!(
                    "Contestant {} recorded without video, upload failed: {}",
                    contestant.id, e
                );
                metrics::record_media_upload("contestant", false);
                return Err(e);
            }
        };

        let video = ContestantVideo {
            url: stored.url,
            id: stored.id,
        };
        let updated = match self
            .repository
            .set_contestant_video(&contestant.id, &video)
            .await
        {
            Ok(updated) => updated,
            Err(e) => {
                error!(
                    "Contestant {} video {} stored but not attached: {}",
                    contestant.id, video.id, e
                );
                metrics::record_media_upload("contestant", false);
                return Err(e);
            }
        };

        metrics::record_media_upload("contestant", true);
        info!("Contestant {} submitted video {}", updated.id, video.id);

        Ok(updated)
    }

    pub async fn list_carousel(&self, sort: SortOrder) -> ApiResult<Vec<Carousel>> {
        self.repository.list_carousel(sort).await
    }

    /// One page of gallery items with uploader fields taken from current accounts
    ///
    /// Each uploader is looked up once per call. Items whose uploader no
    /// longer exists, or whose lookup fails, keep the stored snapshot.
    pub async fn list_gallery(
        &self,
        accounts: &AccountManager,
        listing: &GalleryListing,
    ) -> ApiResult<Vec<Gallery>> {
        let mut items = self.repository.list_gallery(listing).await?;
        let mut uploaders: HashMap<String, Option<Uploader>> = HashMap::new();

        for item in items.iter_mut() {
            let username = item.uploader.username.clone();
            let current = match uploaders.get(&username) {
                Some(cached) => cached.clone(),
                None => {
                    let fetched = match accounts.get_by_username(&username).await {
                        Ok(Some(admin)) => Some(Uploader::from(&admin)),
                        Ok(None) => {
                            warn!("Gallery {} uploader {} no longer exists", item.id, username);
                            None
                        }
                        Err(e) => {
                            error!(
                                "Gallery {} uploader {} lookup failed, keeping snapshot: {}",
                                item.id, username, e
                            );
                            None
                        }
                    };
                    uploaders.insert(username, fetched.clone());
                    fetched
                }
            };

            if let Some(uploader) = current {
                item.uploader = uploader;
            }
        }

        Ok(items)
    }

    pub async fn list_contestants(
        &self,
        listing: &ContestantListing,
    ) -> ApiResult<ContestantPage<Contestant>> {
        let data = self.repository.list_contestants(listing).await?;
        let total = self.repository.count_contestants().await?;

        Ok(ContestantPage {
            data,
            sort_by: listing.sort_by.column(),
            sort: listing.sort.as_param(),
            limit: listing.page.limit,
            page: listing.page.page,
            total,
        })
    }

    pub async fn get_contestant(&self, id: &str) -> ApiResult<Option<Contestant>> {
        self.repository.get_contestant(id).await
    }
}

/// Probe `source` and store the duration on carousel `record_id`
pub async fn enrich_duration(
    repository: &MediaRepository,
    prober: &dyn VideoProber,
    record_id: &str,
    source: &str,
) -> ApiResult<()> {
    let duration = match prober.duration_ms(source).await {
        Ok(duration) => duration,
        Err(e) => {
            warn!("Duration probe failed for carousel {}: {}", record_id, e);
            return Err(e);
        }
    };

    if let Err(e) = repository.set_carousel_duration(record_id, duration).await {
        error!(
            "Probed duration {}ms for carousel {} but could not store it: {}",
            duration, record_id, e
        );
        return Err(e);
    }

    debug!("Carousel {} duration {}ms", record_id, duration);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::error::ApiError;
    use crate::media::ListQuery;
    use crate::storage::{DiskStorage, ObjectData};
    use async_trait::async_trait;

    struct FixedProber(ApiResult<i64>);

    #[async_trait]
    impl VideoProber for FixedProber {
        async fn duration_ms(&self, _source: &str) -> ApiResult<i64> {
            match &self.0 {
                Ok(ms) => Ok(*ms),
                Err(e) => Err(ApiError::Upstream(e.to_string())),
            }
        }
    }

    /// Storage whose uploads always fail
    struct BrokenStorage;

    #[async_trait]
    impl ObjectStorage for BrokenStorage {
        async fn upload(
            &self,
            _folder: Folder,
            _name: &str,
            _mime_type: &str,
            _data: Vec<u8>,
        ) -> ApiResult<StoredObject> {
            Err(ApiError::Upstream("drive unavailable".to_string()))
        }

        async fn share_public(&self, _id: &str) -> ApiResult<()> {
            Ok(())
        }

        async fn download(&self, _id: &str) -> ApiResult<Option<ObjectData>> {
            Ok(None)
        }

        fn name(&self) -> &'static str {
            "broken"
        }
    }

    struct Fixture {
        service: MediaService,
        accounts: AccountManager,
        pool: sqlx::SqlitePool,
        _dir: tempfile::TempDir,
    }

    async fn fixture(storage: Option<Arc<dyn ObjectStorage>>, probe: ApiResult<i64>) -> Fixture {
        let pool = db::create_memory_pool().await.unwrap();
        db::run_migrations(&pool).await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let storage = storage.unwrap_or_else(|| {
            Arc::new(DiskStorage::new(dir.path().to_path_buf(), "http://localhost"))
        });

        Fixture {
            service: MediaService::new(
                MediaRepository::new(pool.clone()),
                storage,
                Arc::new(FixedProber(probe)),
            ),
            accounts: AccountManager::new(pool.clone(), true).with_hash_cost(4),
            pool,
            _dir: dir,
        }
    }

    async fn admin(accounts: &AccountManager, username: &str, name: &str) -> Admin {
        accounts
            .create_admin(crate::account::CreateAdminRequest {
                name: name.to_string(),
                username: username.to_string(),
                password: "password123".to_string(),
                profile_image_url: None,
            })
            .await
            .unwrap()
    }

    fn file(name: &str, mime: &str) -> UploadedFile {
        UploadedFile {
            file_name: name.to_string(),
            mime_type: mime.to_string(),
            bytes: b"content".to_vec(),
        }
    }

    #[tokio::test]
    async fn test_carousel_duration_is_enriched() {
        let fx = fixture(None, Ok(4_200)).await;
        let uploader = admin(&fx.accounts, "alice", "Alice").await;

        let carousel = fx
            .service
            .create_carousel(&uploader, "Intro".into(), String::new(), file("clip.mp4", "video/mp4"))
            .await
            .unwrap();
        assert_eq!(carousel.content.duration, 0);

        fx.service
            .spawn_duration_probe(carousel.id.clone(), carousel.content.url.clone())
            .await
            .unwrap();

        let stored = fx.service.repository().get_carousel(&carousel.id).await.unwrap().unwrap();
        assert_eq!(stored.content.duration, 4_200);
    }

    #[tokio::test]
    async fn test_failed_probe_leaves_duration_unset() {
        let fx = fixture(None, Err(ApiError::Upstream("no ffprobe".into()))).await;
        let uploader = admin(&fx.accounts, "alice", "Alice").await;
        let carousel = fx
            .service
            .create_carousel(&uploader, "Intro".into(), String::new(), file("clip.mp4", "video/mp4"))
            .await
            .unwrap();

        let result = enrich_duration(
            fx.service.repository(),
            fx.service.prober.as_ref(),
            &carousel.id,
            &carousel.content.url,
        )
        .await;
        assert!(result.is_err());

        let stored = fx.service.repository().get_carousel(&carousel.id).await.unwrap().unwrap();
        assert_eq!(stored.content.duration, 0);
    }

    #[tokio::test]
    async fn test_gallery_uploader_is_refreshed() {
        let fx = fixture(None, Ok(0)).await;
        let uploader = admin(&fx.accounts, "alice", "Alice").await;

        for title in ["One", "Two"] {
            fx.service
                .create_gallery(&uploader, title.into(), String::new(), file("a.png", "image/png"))
                .await
                .unwrap();
        }

        sqlx::query("UPDATE admin SET name = 'Alice Renamed' WHERE username = 'alice'")
            .execute(&fx.pool)
            .await
            .unwrap();

        let listing = GalleryListing::from(&ListQuery::default());
        let items = fx.service.list_gallery(&fx.accounts, &listing).await.unwrap();
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|g| g.uploader.name == "Alice Renamed"));
    }

    #[tokio::test]
    async fn test_gallery_keeps_snapshot_when_lookup_fails() {
        let fx = fixture(None, Ok(0)).await;
        let uploader = admin(&fx.accounts, "alice", "Alice").await;
        fx.service
            .create_gallery(&uploader, "One".into(), String::new(), file("a.png", "image/png"))
            .await
            .unwrap();

        let broken_pool = db::create_memory_pool().await.unwrap();
        broken_pool.close().await;
        let broken_accounts = AccountManager::new(broken_pool, true);

        let listing = GalleryListing::from(&ListQuery::default());
        let items = fx.service.list_gallery(&broken_accounts, &listing).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].uploader.name, "Alice");
        assert_eq!(items[0].uploader.username, "alice");
    }

    #[tokio::test]
    async fn test_contestant_upload_failure_keeps_record() {
        let fx = fixture(Some(Arc::new(BrokenStorage)), Ok(0)).await;

        let submission = ContestantSubmission {
            name: "Budi".into(),
            email: "budi@example.com".into(),
            phone: "081234567890".into(),
            school: "SMA Negeri 1".into(),
            title: "Lagu".into(),
        };
        let err = fx
            .service
            .submit_contestant(submission, file("v.mp4", "video/mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Upstream(_)));

        let page = fx
            .service
            .list_contestants(&ContestantListing::from(&ListQuery::default()))
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert!(page.data[0].video.id.is_empty());
    }

    #[tokio::test]
    async fn test_contestant_submission_stores_video() {
        let fx = fixture(None, Ok(0)).await;

        let submission = ContestantSubmission {
            name: "Budi".into(),
            email: "budi@example.com".into(),
            phone: "081234567890".into(),
            school: "SMA Negeri 1".into(),
            title: "Lagu".into(),
        };
        let contestant = fx
            .service
            .submit_contestant(submission, file("v.mp4", "video/mp4"))
            .await
            .unwrap();

        assert!(!contestant.video.id.is_empty());
        assert!(contestant.video.url.ends_with(&contestant.video.id));
        let fetched = fx.service.get_contestant(&contestant.id).await.unwrap().unwrap();
        assert_eq!(fetched.video.id, contestant.video.id);
    }
}
