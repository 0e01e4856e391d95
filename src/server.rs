//! HTTP surface: upload, header extraction and frame conversion.

use std::io;
use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Extension, Json, Multipart, Query},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::pipeline::{self, HeaderValue, OutputFormat, RenderOptions};
use crate::resolver::resolve_name;
use crate::storage::Storage;
use crate::{CommonResult, DicomError};

pub struct AppState {
    pub storage: Storage,
    pub render: RenderOptions,
}

type ApiResult<T> = Result<T, (StatusCode, String)>;

pub fn routes(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/upload", post(upload))
        .route("/extract-header", get(extract_header))
        .route("/convert-to-png", get(convert_to_png))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(Extension(state))
}

pub fn status_for(error: &DicomError) -> StatusCode {
    match error {
        DicomError::UnknownTagName(_) | DicomError::InvalidFileName(_) => StatusCode::BAD_REQUEST,
        DicomError::TagNotFound(_) => StatusCode::NOT_FOUND,
        DicomError::Io(e) if e.kind() == io::ErrorKind::NotFound => StatusCode::NOT_FOUND,
        DicomError::Parse(_) | DicomError::FrameDecode { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        DicomError::UnsupportedEncoding(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        DicomError::Encode(_) | DicomError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn reject(status: StatusCode, message: impl Into<String>) -> (StatusCode, String) {
    let message = message.into();
    warn!(status = status.as_u16(), "{}", message);
    (status, message)
}

fn reject_error(error: DicomError) -> (StatusCode, String) {
    reject(status_for(&error), error.to_string())
}

/// Runs parsing and decoding off the async workers.
async fn run_blocking<T, F>(task: F) -> ApiResult<T>
where
    F: FnOnce() -> CommonResult<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(task).await {
        Ok(result) => result.map_err(reject_error),
        Err(e) => Err(reject(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("worker failed: {e}"),
        )),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

async fn upload(
    Extension(state): Extension<Arc<AppState>>,
    mut multipart: Multipart,
) -> ApiResult<Json<Value>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| reject(e.status(), e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| reject(StatusCode::BAD_REQUEST, "file field has no file name"))?;
        let data = field
            .bytes()
            .await
            .map_err(|e| reject(e.status(), e.body_text()))?;

        let stored = file_name.clone();
        run_blocking(move || state.storage.store(&stored, &data)).await?;
        info!(file_name = %file_name, "upload accepted");

        return Ok(Json(json!({ "message": "File uploaded and stored successfully" })));
    }

    Err(reject(StatusCode::BAD_REQUEST, "File is required"))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HeaderQuery {
    file_name: Option<String>,
    tag: Option<String>,
}

async fn extract_header(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<HeaderQuery>,
) -> ApiResult<Json<HeaderValue>> {
    let (Some(file_name), Some(tag)) = (non_empty(query.file_name), non_empty(query.tag)) else {
        return Err(reject(StatusCode::BAD_REQUEST, "Both fileName and tag are required"));
    };

    // unknown names are rejected without touching storage
    resolve_name(&tag).map_err(reject_error)?;

    let header = run_blocking(move || {
        let path = state.storage.locate(&file_name)?;
        pipeline::extract_header(path, &tag)
    })
    .await?;

    Ok(Json(header))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConvertQuery {
    file_name: Option<String>,
    format: Option<OutputFormat>,
}

async fn convert_to_png(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<ConvertQuery>,
) -> ApiResult<Response> {
    let Some(file_name) = non_empty(query.file_name) else {
        return Err(reject(StatusCode::BAD_REQUEST, "fileName is required"));
    };

    let mut options = state.render.clone();
    if let Some(format) = query.format {
        options.format = format;
    }

    let rendered = run_blocking(move || {
        let path = state.storage.locate(&file_name)?;
        pipeline::convert_file(path, &options)
    })
    .await?;

    Ok(([(header::CONTENT_TYPE, rendered.content_type)], rendered.bytes).into_response())
}
