use super::extract::{ApiJson, ApiPath, ApiQuery};
use super::{ApiError, ApiResult, AppState, PageParams};
use crate::content::{CommentNode, CommentView, ContentService, CreateCommentInput};
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(crate) struct CreateCommentRequest {
    user_id: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    media_id: Option<String>,
    #[serde(default)]
    media_title: Option<String>,
    #[serde(default)]
    thumbnail: Option<String>,
    #[serde(default)]
    parent_id: Option<String>,
}

pub(crate) async fn create_comment(
    State(state): State<AppState>,
    ApiPath(post_id): ApiPath<String>,
    ApiJson(payload): ApiJson<CreateCommentRequest>,
) -> Result<(StatusCode, Json<CommentView>), ApiError> {
    let service = ContentService::new(state.database.clone());
    let comment = service.create_comment(CreateCommentInput {
        post_id,
        author_id: payload.user_id,
        content: payload.content,
        media_id: payload.media_id,
        media_title: payload.media_title,
        thumbnail: payload.thumbnail,
        parent_id: payload.parent_id,
    })?;
    Ok((StatusCode::CREATED, Json(comment)))
}

pub(crate) async fn list_comments(
    State(state): State<AppState>,
    ApiPath(post_id): ApiPath<String>,
    ApiQuery(params): ApiQuery<PageParams>,
) -> ApiResult<Vec<CommentView>> {
    let service = ContentService::new(state.database.clone());
    let (limit, offset) = params.resolve(&state);
    Ok(Json(service.list_comments(&post_id, limit, offset)?))
}

pub(crate) async fn comment_tree(
    State(state): State<AppState>,
    ApiPath(post_id): ApiPath<String>,
) -> ApiResult<Vec<CommentNode>> {
    let service = ContentService::new(state.database.clone());
    Ok(Json(service.comment_tree(&post_id)?))
}

pub(crate) async fn delete_comment(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> Result<StatusCode, ApiError> {
    let service = ContentService::new(state.database.clone());
    service.delete_comment(&id)?;
    Ok(StatusCode::NO_CONTENT)
}
