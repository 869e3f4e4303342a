use crate::AppCore;
use axum::{
    Extension, Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::services::ServeDir;

use super::api;

pub fn build_router(core: Arc<AppCore>) -> Router {
    // Completed videos are served straight from the download directory;
    // filenames are whatever the remote source assigned.
    let videos = ServeDir::new(core.config.download_dir.clone());

    Router::new()
        .route("/health", get(health_check))
        .route("/generate-video", post(api::generate_video))
        .nest_service("/videos", videos)
        .layer(Extension(core))
}

async fn health_check() -> &'static str {
    "OK"
}
