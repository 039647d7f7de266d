use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use til_types::api::CreateUserRequest;
use til_types::models::User;

use crate::error::ApiError;
use crate::state::{AppState, with_db};

pub async fn list_users(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let users = with_db(&state, |db| db.find_all::<User>()).await?;
    Ok(Json(users))
}

pub async fn create_user(
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = User::new(req.name, req.username);
    let saved = with_db(&state, move |db| db.save(user)).await?;
    Ok((StatusCode::CREATED, Json(saved)))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let user = with_db(&state, move |db| db.get::<User>(id)).await?;
    Ok(Json(user))
}

/// What happens to the user's acronyms follows the store's integrity policy.
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    with_db(&state, move |db| {
        db.get::<User>(id)?;
        db.delete::<User>(id)
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_user_acronyms(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let acronyms = with_db(&state, move |db| {
        let user = db.get::<User>(id)?;
        db.acronyms_of(&user)
    })
    .await?;
    Ok(Json(acronyms))
}
