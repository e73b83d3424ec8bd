use axum::extract::{Json, Path, State};
use axum::http::StatusCode;
use tracing::error;

use super::MessageResponse;
use crate::dto::UserDto;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

pub async fn list_users(State(state): State<AppState>) -> AppResult<Json<Vec<UserDto>>> {
    let users = state.admin.list_users().await.map_err(|err| {
        error!(error = %err, "failed to list users");
        err
    })?;
    Ok(Json(users))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> AppResult<Json<UserDto>> {
    Ok(Json(state.admin.get_user(user_id).await?))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> AppResult<Json<MessageResponse>> {
    state.admin.delete_user(user_id).await.map_err(|err| {
        if err.status() == StatusCode::INTERNAL_SERVER_ERROR {
            error!(user_id, error = %err, "failed to delete user");
            AppError::internal(format!("Error deleting user: {}", err.message()))
        } else {
            err
        }
    })?;

    Ok(Json(MessageResponse::new(format!(
        "User with ID {user_id} deleted successfully"
    ))))
}
