//! CDI Map API
//!
//! REST service for the monthly CDI drought map: publication review workflow
//! for admins and reviewers, and public access to published maps and exports.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod pagination;
pub mod state;
pub mod views;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Extension, Router,
};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;

/// Routes under `/api/v1`.
fn api_routes() -> Router {
    Router::new()
        .route(
            "/administrations",
            get(handlers::administrations::list_administrations_handler),
        )
        // Admin
        .route(
            "/admin/cdi-geonode",
            get(handlers::catalog::cdi_geonode_handler),
        )
        .route(
            "/admin/publications",
            get(handlers::publications::list_publications_handler)
                .post(handlers::publications::create_publication_handler),
        )
        .route(
            "/admin/publication/:id",
            get(handlers::publications::get_publication_handler)
                .put(handlers::publications::update_publication_handler)
                .delete(handlers::publications::delete_publication_handler),
        )
        .route(
            "/admin/publication/:id/bulk-validation",
            post(handlers::publications::bulk_validation_handler),
        )
        .route(
            "/admin/publication-reviews/:id",
            get(handlers::publications::publication_reviews_handler),
        )
        .route(
            "/admin/publication-review/:id",
            get(handlers::reviews::admin_review_handler),
        )
        .route(
            "/admin/reviewers",
            get(handlers::reviews::list_reviewers_handler),
        )
        // Reviewer
        .route(
            "/reviewer/reviews",
            get(handlers::reviews::my_reviews_handler),
        )
        .route(
            "/reviewer/review/:id",
            get(handlers::reviews::my_review_handler).put(handlers::reviews::update_my_review_handler),
        )
        // Public maps
        .route("/maps", get(handlers::maps::list_maps_handler))
        .route("/map/:id", get(handlers::maps::map_detail_handler))
        .route("/map/:id/export", get(handlers::maps::export_map_handler))
        .route("/dates", get(handlers::maps::dates_handler))
        // Jobs
        .route("/job/:id", get(handlers::jobs::job_status_handler))
}

/// Build the full application router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api/v1", api_routes())
        // Health and metrics
        .route("/health", get(handlers::health::health_handler))
        .route("/ready", get(handlers::health::ready_handler))
        .route("/metrics", get(handlers::health::metrics_handler))
        // Middleware
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
}
