use std::sync::Arc;

use axum::Router;
use axum::extract::{Multipart, Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Json;

use crate::error::{ApiError, ApiResult};
use crate::schemas::{HealthResponse, JobResponse, SubmitResponse, UnloadResponse};
use crate::service::{Studio, SubmitRequest};

pub fn router(studio: Arc<Studio>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/edit", post(submit_edit))
        .route("/jobs/{id}", get(get_job))
        .route("/results/{filename}", get(get_result))
        .route("/model/unload", post(unload_model))
        .with_state(studio)
}

async fn health(State(studio): State<Arc<Studio>>) -> Json<HealthResponse> {
    let status = studio.residency_status();
    Json(HealthResponse {
        ok: true,
        model: studio.model_name().to_string(),
        model_loaded: status.loaded,
        timeout_minutes: studio.idle_timeout().as_secs_f64() / 60.0,
        minutes_since_last_request: round2(status.idle.as_secs_f64() / 60.0),
        minutes_until_unload: status
            .until_unload
            .map(|d| round2(d.as_secs_f64() / 60.0)),
    })
}

/// POST /edit handler for multipart submissions. Fields: `file` (required),
/// `file2`, `file3`, `prompt`, `negative_prompt`, `num_inference_steps`,
/// `true_cfg_scale`, `seed`.
async fn submit_edit(
    State(studio): State<Arc<Studio>>,
    mut multipart: Multipart,
) -> ApiResult<Json<SubmitResponse>> {
    let mut request = SubmitRequest::default();

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        match name.as_str() {
            // Slots keyed by field name, not body order, so the admission
            // layer can report which upload a decode failure belongs to.
            "file" => {
                request.images[0] = Some(field.bytes().await.map_err(bad_multipart)?.to_vec())
            }
            "file2" => {
                request.images[1] = Some(field.bytes().await.map_err(bad_multipart)?.to_vec())
            }
            "file3" => {
                request.images[2] = Some(field.bytes().await.map_err(bad_multipart)?.to_vec())
            }
            "prompt" => request.prompt = field.text().await.map_err(bad_multipart)?,
            "negative_prompt" => {
                request.negative_prompt = Some(field.text().await.map_err(bad_multipart)?)
            }
            "num_inference_steps" => {
                let text = field.text().await.map_err(bad_multipart)?;
                request.steps = Some(text.trim().parse().map_err(|_| {
                    ApiError::BadRequest("num_inference_steps must be an integer".into())
                })?);
            }
            "true_cfg_scale" => {
                let text = field.text().await.map_err(bad_multipart)?;
                request.guidance_scale = Some(text.trim().parse().map_err(|_| {
                    ApiError::BadRequest("true_cfg_scale must be a number".into())
                })?);
            }
            "seed" => {
                let text = field.text().await.map_err(bad_multipart)?;
                if !text.trim().is_empty() {
                    request.seed = Some(text.trim().parse().map_err(|_| {
                        ApiError::BadRequest("seed must be a non-negative integer".into())
                    })?);
                }
            }
            _ => {}
        }
    }

    if request.images[0].is_none() {
        return Err(ApiError::Core(dr_core::Error::InvalidInput(
            "file is required".into(),
        )));
    }

    let job = studio.submit(request)?;
    Ok(Json(SubmitResponse {
        job_id: job.id,
        status: job.status,
    }))
}

async fn get_job(
    State(studio): State<Arc<Studio>>,
    Path(id): Path<String>,
) -> ApiResult<Json<JobResponse>> {
    let job = studio.job(&id)?;
    let result_url = job
        .result
        .as_deref()
        .filter(|name| studio.artifact_exists(name))
        .map(|name| format!("/results/{name}"));
    Ok(Json(JobResponse::from_job(&job, result_url)))
}

async fn get_result(
    State(studio): State<Arc<Studio>>,
    Path(filename): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let bytes = studio.artifact(&filename)?;
    Ok(([(header::CONTENT_TYPE, "image/png")], bytes))
}

async fn unload_model(State(studio): State<Arc<Studio>>) -> Json<UnloadResponse> {
    Json(UnloadResponse {
        previously_loaded: studio.force_unload(),
    })
}

fn bad_multipart(e: axum::extract::multipart::MultipartError) -> ApiError {
    ApiError::BadRequest(format!("malformed multipart body: {e}"))
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
