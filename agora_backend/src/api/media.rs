use super::extract::{ApiJson, ApiPath};
use super::{ApiError, ApiResult, AppState};
use crate::media::{MediaService, MediaView, SaveMediaInput};
use anyhow::Context;
use axum::body::Body;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::http::{
    header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE},
    HeaderValue, StatusCode,
};
use axum::response::Response;
use axum::Json;
use serde::Deserialize;
use tokio::fs::File as TokioFile;
use tokio_util::io::ReaderStream;

#[derive(Debug, Deserialize)]
pub(crate) struct UpdateMediaRequest {
    #[serde(default)]
    title: Option<String>,
}

fn media_service(state: &AppState) -> MediaService {
    MediaService::new(
        state.database.clone(),
        state.config.paths.clone(),
        state.config.media.clone(),
    )
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> ApiError {
    ApiError::BadRequest(format!("invalid multipart upload: {}", err.body_text()))
}

pub(crate) async fn upload_media(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<MediaView>), ApiError> {
    let mut multipart = multipart?;
    let mut input = SaveMediaInput::default();
    let mut saw_file = false;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        match name.as_str() {
            "file" => {
                input.original_name = field.file_name().map(|s| s.to_string());
                input.mime = field.content_type().map(|s| s.to_string());
                let bytes = field.bytes().await.map_err(multipart_error)?;
                input.data = bytes.to_vec();
                saw_file = true;
            }
            "title" => input.title = Some(field.text().await.map_err(multipart_error)?),
            "thumbnail" => input.thumbnail = Some(field.text().await.map_err(multipart_error)?),
            "uploader_id" => {
                input.uploader_id = Some(field.text().await.map_err(multipart_error)?)
            }
            other => tracing::debug!(field = other, "ignoring unknown multipart field"),
        }
    }

    if !saw_file {
        return Err(ApiError::BadRequest("missing file field".into()));
    }

    let media = media_service(&state).save_upload(input).await?;
    Ok((StatusCode::CREATED, Json(media)))
}

pub(crate) async fn get_media(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<MediaView> {
    match media_service(&state).get(&id)? {
        Some(media) => Ok(Json(media)),
        None => Err(ApiError::NotFound(format!("media {id} not found"))),
    }
}

pub(crate) async fn update_media_title(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
    ApiJson(payload): ApiJson<UpdateMediaRequest>,
) -> ApiResult<MediaView> {
    let media = media_service(&state).update_title(&id, payload.title)?;
    Ok(Json(media))
}

pub(crate) async fn download_media(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> Result<Response, ApiError> {
    let Some(download) = media_service(&state)
        .prepare_download(&id)
        .await
        .map_err(ApiError::Internal)?
    else {
        return Err(ApiError::NotFound(format!("media {id} not found")));
    };

    let file = TokioFile::open(&download.absolute_path)
        .await
        .with_context(|| format!("unable to open {}", download.absolute_path.display()))
        .map_err(ApiError::Internal)?;
    let stream = ReaderStream::new(file);
    let mut response = Response::new(Body::from_stream(stream));
    let headers = response.headers_mut();

    let content_type = download
        .metadata
        .mime
        .clone()
        .unwrap_or_else(|| "application/octet-stream".into());
    if let Ok(value) = HeaderValue::from_str(&content_type) {
        headers.insert(CONTENT_TYPE, value);
    }

    if let Some(size) = download.metadata.size_bytes {
        if let Ok(value) = HeaderValue::from_str(&size.to_string()) {
            headers.insert(CONTENT_LENGTH, value);
        }
    }

    // Inline so that players and viewers can embed the asset directly.
    let disposition = format!("inline; filename=\"{}\"", download.metadata.filename);
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(CONTENT_DISPOSITION, value);
    }

    Ok(response)
}
