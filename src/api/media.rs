/// Public media listings
use crate::{
    api::response::Envelope,
    context::AppContext,
    db::models::{Carousel, Gallery},
    error::ApiResult,
    media::{GalleryListing, ListQuery, SortOrder},
};
use axum::{
    extract::{Query, State},
    routing::get,
    Router,
};

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/carousel", get(list_carousel))
        .route("/gallery", get(list_gallery))
}

async fn list_carousel(
    State(ctx): State<AppContext>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Envelope<Vec<Carousel>>> {
    let items = ctx
        .media
        .list_carousel(SortOrder::parse(query.sort.as_deref()))
        .await?;

    Ok(Envelope::ok(items))
}

async fn list_gallery(
    State(ctx): State<AppContext>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Envelope<Vec<Gallery>>> {
    let listing = GalleryListing::from(&query);
    let items = ctx.media.list_gallery(&ctx.accounts, &listing).await?;

    Ok(Envelope::ok(items))
}
