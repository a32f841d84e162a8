//! meterscan-api library
//!
//! HTTP service for meter-photo readings: upload a photo, have the vision
//! API estimate the reading, confirm it, and list a customer's history.

pub mod api;
pub mod db;
pub mod error;
pub mod services;
pub mod usecases;

pub use crate::error::{ApiError, ApiResult};

use axum::extract::DefaultBodyLimit;
use axum::{middleware, Router};
use governor::Quota;
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::api::middleware::ClientRateLimiter;
use crate::db::MeasureRepository;
use crate::services::image_store::IMAGE_ROUTE_PREFIX;
use crate::services::VisionClient;

/// Largest accepted request body (base64 photos)
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Measure store over the connection pool
    pub measures: MeasureRepository,
    /// Vision client, one instance reused by every request
    pub vision: Arc<dyn VisionClient>,
    /// Request quota, one bucket per client IP
    pub rate_limiter: Arc<ClientRateLimiter>,
    /// Directory served under `/temp`
    pub images_dir: PathBuf,
}

impl AppState {
    pub fn new(db: SqlitePool, vision: Arc<dyn VisionClient>, images_dir: PathBuf) -> Self {
        Self {
            measures: MeasureRepository::new(db),
            vision,
            rate_limiter: Arc::new(api::middleware::rate_limiter(
                api::middleware::default_quota(),
            )),
            images_dir,
        }
    }

    /// Replace the default request quota
    pub fn with_quota(mut self, quota: Quota) -> Self {
        self.rate_limiter = Arc::new(api::middleware::rate_limiter(quota));
        self
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let images = ServeDir::new(&state.images_dir);

    Router::new()
        .merge(api::measure_routes())
        .merge(api::health_routes())
        .nest_service(IMAGE_ROUTE_PREFIX, images)
        .layer(middleware::from_fn_with_state(state.clone(), api::rate_limit))
        .layer(middleware::from_fn(api::security_headers))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
