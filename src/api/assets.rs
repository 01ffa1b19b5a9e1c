/// Stored object delivery
///
/// Images are re-encoded to WebP on the way out; everything else is served as
/// stored, with byte-range support so videos can be seeked.
use crate::{
    context::AppContext,
    error::{ApiError, ApiResult},
    transcode,
};
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::Response,
    routing::get,
    Router,
};
use tracing::debug;

const CACHE_CONTROL: &str = "public, max-age=31536000";

pub fn routes() -> Router<AppContext> {
    Router::new().route("/assets/:id", get(get_asset))
}

fn build(builder: axum::http::response::Builder, body: Body) -> ApiResult<Response> {
    builder
        .body(body)
        .map_err(|e| ApiError::Internal(format!("Failed to build asset response: {}", e)))
}

async fn get_asset(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let object = ctx
        .storage
        .download(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Data Not Found".to_string()))?;

    let etag = format!("\"{}\"", id);
    let not_modified = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == etag);
    if not_modified {
        return build(
            Response::builder()
                .status(StatusCode::NOT_MODIFIED)
                .header(header::ETAG, etag)
                .header(header::CACHE_CONTROL, CACHE_CONTROL),
            Body::empty(),
        );
    }

    if transcode::is_image(&object.bytes) {
        debug!("Transcoding asset {} to WebP", id);
        let webp = transcode::to_webp(object.bytes).await?;
        return build(
            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, transcode::WEBP_MIME)
                .header(header::CONTENT_LENGTH, webp.len().to_string())
                .header(header::ETAG, etag)
                .header(header::CACHE_CONTROL, CACHE_CONTROL),
            Body::from(webp),
        );
    }

    let mime_type = object
        .mime_type
        .unwrap_or_else(|| "application/octet-stream".to_string());
    let data = object.bytes;
    let total_size = data.len();

    let range = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| parse_range(v, total_size));

    if let Some((start, end)) = range {
        let partial = data[start..=end].to_vec();
        return build(
            Response::builder()
                .status(StatusCode::PARTIAL_CONTENT)
                .header(header::CONTENT_TYPE, mime_type)
                .header(header::CONTENT_LENGTH, partial.len().to_string())
                .header(
                    header::CONTENT_RANGE,
                    format!("bytes {}-{}/{}", start, end, total_size),
                )
                .header(header::ETAG, etag)
                .header(header::CACHE_CONTROL, CACHE_CONTROL)
                .header(header::ACCEPT_RANGES, "bytes"),
            Body::from(partial),
        );
    }

    build(
        Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, mime_type)
            .header(header::CONTENT_LENGTH, total_size.to_string())
            .header(header::ETAG, etag)
            .header(header::CACHE_CONTROL, CACHE_CONTROL)
            .header(header::ACCEPT_RANGES, "bytes"),
        Body::from(data),
    )
}

/// Inclusive byte positions of a single `bytes=` range
fn parse_range(range: &str, total_size: usize) -> Option<(usize, usize)> {
    if total_size == 0 {
        return None;
    }
    let ranges = range.trim().strip_prefix("bytes=")?;
    let (start, end) = ranges.split_once('-')?;

    match (start.is_empty(), end.is_empty()) {
        // bytes=-500: the last 500 bytes
        (true, false) => {
            let suffix: usize = end.parse().ok()?;
            if suffix == 0 {
                return None;
            }
            Some((total_size.saturating_sub(suffix), total_size - 1))
        }
        (false, true) => {
            let start: usize = start.parse().ok()?;
            (start < total_size).then_some((start, total_size - 1))
        }
        (false, false) => {
            let start: usize = start.parse().ok()?;
            let end = end.parse::<usize>().ok()?.min(total_size - 1);
            (start <= end).then_some((start, end))
        }
        (true, true) => None,
    }
}
