//! API router.
//!
//! Returns a composable `Router` with every route under `/api/`.
//! Protected routes pass through `require_identity`; `/api/health` does not.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::pipeline::processor::IngestionPipeline;

/// Room for multipart framing and the kind field on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Build the API router around a shared pipeline.
pub fn api_router(pipeline: Arc<IngestionPipeline>) -> Router {
    let max_body = usize::try_from(pipeline.limits().max_upload_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD_BYTES);
    let ctx = ApiContext::new(pipeline);

    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let protected = Router::new()
        .route(
            "/sources",
            get(endpoints::sources::list).post(endpoints::sources::upload),
        )
        .route(
            "/sources/:id",
            get(endpoints::sources::detail).delete(endpoints::sources::delete),
        )
        .route("/sources/:id/extract", post(endpoints::sources::reextract))
        .route("/sources/:id/audit", get(endpoints::audit::for_source))
        .route("/audit", get(endpoints::audit::trail))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(
            middleware::identity::require_identity,
        ))
        .layer(DefaultBodyLimit::max(max_body));

    let unprotected = Router::new()
        .route("/health", get(endpoints::health::check))
        .with_state(ctx);

    Router::new()
        .nest("/api", protected.merge(unprotected))
        .layer(TraceLayer::new_for_http())
}
