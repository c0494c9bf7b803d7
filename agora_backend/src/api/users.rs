use super::extract::{ApiJson, ApiPath, ApiQuery};
use super::{ApiError, ApiResult, AppState, PageParams};
use crate::users::{CreateUserInput, UserService, UserView};
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

pub(crate) async fn create_user(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateUserInput>,
) -> Result<(StatusCode, Json<UserView>), ApiError> {
    let service = UserService::new(state.database.clone());
    let user = service.create_user(payload)?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub(crate) async fn get_user(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<UserView> {
    let service = UserService::new(state.database.clone());
    match service.get_user(&id)? {
        Some(user) => Ok(Json(user)),
        None => Err(ApiError::NotFound(format!("user {id} not found"))),
    }
}

pub(crate) async fn list_users(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<PageParams>,
) -> ApiResult<Vec<UserView>> {
    let service = UserService::new(state.database.clone());
    let (limit, offset) = params.resolve(&state);
    Ok(Json(service.list_users(limit, offset)?))
}
