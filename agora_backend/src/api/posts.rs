use super::extract::{ApiJson, ApiPath, ApiQuery};
use super::{ApiError, ApiResult, AppState, PageParams};
use crate::content::{ContentService, CreatePostInput, PostView};
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(crate) struct CreatePostRequest {
    user_id: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    media_id: Option<String>,
    #[serde(default)]
    media_title: Option<String>,
    #[serde(default)]
    thumbnail: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListPostsParams {
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    offset: Option<usize>,
    #[serde(default)]
    author_id: Option<String>,
}

pub(crate) async fn create_post(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreatePostRequest>,
) -> Result<(StatusCode, Json<PostView>), ApiError> {
    let service = ContentService::new(state.database.clone());
    let post = service.create_post(CreatePostInput {
        author_id: payload.user_id,
        content: payload.content,
        media_id: payload.media_id,
        media_title: payload.media_title,
        thumbnail: payload.thumbnail,
    })?;
    Ok((StatusCode::CREATED, Json(post)))
}

pub(crate) async fn list_posts(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<ListPostsParams>,
) -> ApiResult<Vec<PostView>> {
    let service = ContentService::new(state.database.clone());
    let page = PageParams {
        limit: params.limit,
        offset: params.offset,
    };
    let (limit, offset) = page.resolve(&state);
    let posts = service.list_posts(params.author_id.as_deref(), limit, offset)?;
    Ok(Json(posts))
}

pub(crate) async fn get_post(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<PostView> {
    let service = ContentService::new(state.database.clone());
    match service.get_post(&id)? {
        Some(post) => Ok(Json(post)),
        None => Err(ApiError::NotFound(format!("post {id} not found"))),
    }
}

pub(crate) async fn delete_post(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> Result<StatusCode, ApiError> {
    let service = ContentService::new(state.database.clone());
    service.delete_post(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn feed(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<String>,
    ApiQuery(params): ApiQuery<PageParams>,
) -> ApiResult<Vec<PostView>> {
    let service = ContentService::new(state.database.clone());
    let (limit, offset) = params.resolve(&state);
    Ok(Json(service.feed(&user_id, limit, offset)?))
}
