/// API routes and handlers
pub mod admin;
pub mod assets;
pub mod contest;
pub mod forms;
pub mod media;
pub mod middleware;
pub mod response;

use crate::context::AppContext;
use axum::{middleware::from_fn_with_state, Router};

/// Build the `/api/v1` routes
///
/// Protected routes sit behind the access-token gate; the gate runs before any
/// body is read.
pub fn routes(ctx: AppContext) -> Router<AppContext> {
    let protected = admin::protected_routes()
        .route_layer(from_fn_with_state(ctx, middleware::require_access_token));

    Router::new()
        .merge(admin::public_routes())
        .merge(protected)
        .merge(contest::routes())
        .merge(media::routes())
        .merge(assets::routes())
}
