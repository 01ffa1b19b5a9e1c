/// Carousel, gallery and contestant media
///
/// `repository` holds the SQL, `service` the upload pipelines, and this module
/// the listing parameters shared by both.

mod repository;
mod service;

pub use repository::MediaRepository;
pub use service::{enrich_duration, ContestantSubmission, MediaService, UploadedFile};

use serde::{Deserialize, Serialize};

/// Ordering on the sort column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    /// `"1"` or `"-1"`; anything else falls back to ascending
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("-1") => SortOrder::Descending,
            _ => SortOrder::Ascending,
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        }
    }

    /// Echoed back to clients the way they send it
    pub fn as_param(&self) -> &'static str {
        match self {
            SortOrder::Ascending => "1",
            SortOrder::Descending => "-1",
        }
    }
}

/// Contestant columns clients may sort by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContestantSort {
    UpdatedAt,
    CreatedAt,
    Name,
    Email,
    Phone,
    School,
    Title,
}

impl ContestantSort {
    /// Unknown columns fall back to `updated_at`
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("created_at") => ContestantSort::CreatedAt,
            Some("name") => ContestantSort::Name,
            Some("email") => ContestantSort::Email,
            Some("phone") => ContestantSort::Phone,
            Some("school") => ContestantSort::School,
            Some("title") => ContestantSort::Title,
            _ => ContestantSort::UpdatedAt,
        }
    }

    pub fn column(&self) -> &'static str {
        match self {
            ContestantSort::UpdatedAt => "updated_at",
            ContestantSort::CreatedAt => "created_at",
            ContestantSort::Name => "name",
            ContestantSort::Email => "email",
            ContestantSort::Phone => "phone",
            ContestantSort::School => "school",
            ContestantSort::Title => "title",
        }
    }
}

/// Raw listing query string; values are parsed leniently
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    pub sort: Option<String>,
    pub sort_by: Option<String>,
    pub limit: Option<String>,
    pub page: Option<String>,
}

/// Offset pagination; a limit of 0 means "no limit"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: u32,
    pub page: u32,
}

impl Page {
    /// Parse with defaults; values below `min_limit` or a page below 1 keep the default
    fn parse(query: &ListQuery, default_limit: u32, min_limit: u32) -> Self {
        let limit = query
            .limit
            .as_deref()
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .filter(|limit| *limit >= min_limit as i64 && *limit <= u32::MAX as i64)
            .map(|limit| limit as u32)
            .unwrap_or(default_limit);
        let page = query
            .page
            .as_deref()
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .filter(|page| *page >= 1 && *page <= u32::MAX as i64)
            .map(|page| page as u32)
            .unwrap_or(1);

        Self { limit, page }
    }

    /// SQLite `LIMIT` value; -1 is unbounded
    pub fn sql_limit(&self) -> i64 {
        if self.limit == 0 {
            -1
        } else {
            self.limit as i64
        }
    }

    /// Rows to skip; saturates so far-out pages come back empty
    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1)
            .checked_mul(self.limit as i64)
            .unwrap_or(i64::MAX)
    }
}

/// Normalized contestant listing parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContestantListing {
    pub sort_by: ContestantSort,
    pub sort: SortOrder,
    pub page: Page,
}

impl From<&ListQuery> for ContestantListing {
    fn from(query: &ListQuery) -> Self {
        Self {
            sort_by: ContestantSort::parse(query.sort_by.as_deref()),
            sort: SortOrder::parse(query.sort.as_deref()),
            page: Page::parse(query, 1, 0),
        }
    }
}

/// Normalized gallery listing parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GalleryListing {
    pub sort: SortOrder,
    pub page: Page,
}

impl From<&ListQuery> for GalleryListing {
    fn from(query: &ListQuery) -> Self {
        Self {
            sort: SortOrder::parse(query.sort.as_deref()),
            page: Page::parse(query, 10, 1),
        }
    }
}

/// Contestant listing response
#[derive(Debug, Clone, Serialize)]
pub struct ContestantPage<T> {
    pub data: Vec<T>,
    pub sort_by: &'static str,
    pub sort: &'static str,
    pub limit: u32,
    pub page: u32,
    pub total: i64,
}

/// `<part>_-_<part>_-_...` name used for stored objects
pub fn stored_name(parts: &[&str]) -> String {
    parts.join("_-_")
}
