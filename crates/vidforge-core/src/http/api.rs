use crate::AppCore;
use crate::http::ApiError;
use crate::models::GenerationJob;
use axum::{Json, extract::Extension, http::StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Serialize)]
pub struct GenerateAccepted {
    pub message: &'static str,
    pub prompt: String,
}

/// Accept a generation request. The response goes out immediately; the
/// multi-minute workflow runs on a background task whose outcome is only
/// observable through logs and the video directory.
pub async fn generate_video(
    Extension(core): Extension<Arc<AppCore>>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<GenerateAccepted>), ApiError> {
    let prompt = match body.get("prompt") {
        Some(Value::String(text)) if !text.trim().is_empty() => text.clone(),
        _ => {
            return Err(ApiError::bad_request(
                "A non-empty \"prompt\" string is required.",
            ));
        }
    };

    let Some(permit) = core.gate.try_admit() else {
        return Err(ApiError::too_many_requests(
            "Another video is being generated. Retry once the current job finishes.",
        ));
    };

    let engine = core.engine.clone();
    let job_prompt = prompt.clone();
    tokio::spawn(async move {
        let mut job = GenerationJob::new(job_prompt);
        engine.execute(&mut job).await;
        info!(job_id = %job.id, status = ?job.status, "Background job finished");
        permit.release();
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(GenerateAccepted {
            message: "Video generation started.",
            prompt,
        }),
    ))
}
