use axum::{extract::State, Json};
use iam_core::error::AppError;

use crate::dtos::ApiResponse;
use crate::middleware::SessionUser;
use crate::models::User;
use crate::AppState;

/// GET /api/get-account
///
/// The signed-in user with its password cleared, `sub` set to the user id.
pub async fn get_account(
    State(state): State<AppState>,
    session: Option<SessionUser>,
) -> Result<Json<ApiResponse<Option<User>>>, AppError> {
    let session = match session {
        Some(session) => session,
        None => return Ok(Json(ApiResponse::error("Please sign in first", None))),
    };

    let user = state
        .core
        .store
        .get_user(&session.owner, &session.name)
        .await?
        .filter(|user| !user.is_deleted);

    let user = match user {
        Some(user) => user,
        None => {
            return Ok(Json(ApiResponse::error(
                format!("The user: {} doesn't exist", session.id()),
                None,
            )))
        }
    };

    let mut response = ApiResponse::ok(Some(user.sanitized()));
    response.sub = Some(user.id.clone());
    response.name = Some(user.name);
    Ok(Json(response))
}
