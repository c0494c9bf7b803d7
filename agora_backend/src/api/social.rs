use super::extract::{ApiJson, ApiPath, ApiQuery};
use super::{ApiResult, AppState, PageParams};
use crate::database::models::LikeTarget;
use crate::social::{FollowSummary, LikeSummary, SocialService};
use crate::users::UserView;
use axum::extract::State;
use axum::Json;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(crate) struct LikeRequest {
    user_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FollowRequest {
    follower_id: String,
}

pub(crate) async fn like_post(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
    ApiJson(payload): ApiJson<LikeRequest>,
) -> ApiResult<LikeSummary> {
    let service = SocialService::new(state.database.clone());
    Ok(Json(service.like(LikeTarget::Post, &id, &payload.user_id)?))
}

pub(crate) async fn unlike_post(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
    ApiJson(payload): ApiJson<LikeRequest>,
) -> ApiResult<LikeSummary> {
    let service = SocialService::new(state.database.clone());
    Ok(Json(service.unlike(LikeTarget::Post, &id, &payload.user_id)?))
}

pub(crate) async fn like_comment(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
    ApiJson(payload): ApiJson<LikeRequest>,
) -> ApiResult<LikeSummary> {
    let service = SocialService::new(state.database.clone());
    Ok(Json(service.like(LikeTarget::Comment, &id, &payload.user_id)?))
}

pub(crate) async fn unlike_comment(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
    ApiJson(payload): ApiJson<LikeRequest>,
) -> ApiResult<LikeSummary> {
    let service = SocialService::new(state.database.clone());
    Ok(Json(service.unlike(LikeTarget::Comment, &id, &payload.user_id)?))
}

pub(crate) async fn follow_user(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
    ApiJson(payload): ApiJson<FollowRequest>,
) -> ApiResult<FollowSummary> {
    let service = SocialService::new(state.database.clone());
    Ok(Json(service.follow(&payload.follower_id, &id)?))
}

pub(crate) async fn unfollow_user(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
    ApiJson(payload): ApiJson<FollowRequest>,
) -> ApiResult<FollowSummary> {
    let service = SocialService::new(state.database.clone());
    Ok(Json(service.unfollow(&payload.follower_id, &id)?))
}

pub(crate) async fn list_followers(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
    ApiQuery(params): ApiQuery<PageParams>,
) -> ApiResult<Vec<UserView>> {
    let service = SocialService::new(state.database.clone());
    let (limit, offset) = params.resolve(&state);
    Ok(Json(service.followers(&id, limit, offset)?))
}

pub(crate) async fn list_following(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
    ApiQuery(params): ApiQuery<PageParams>,
) -> ApiResult<Vec<UserView>> {
    let service = SocialService::new(state.database.clone());
    let (limit, offset) = params.resolve(&state);
    Ok(Json(service.following(&id, limit, offset)?))
}
