use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use til_types::api::CreateCategoryRequest;
use til_types::models::Category;

use crate::error::ApiError;
use crate::state::{AppState, with_db};

pub async fn list_categories(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let categories = with_db(&state, |db| db.find_all::<Category>()).await?;
    Ok(Json(categories))
}

pub async fn create_category(
    State(state): State<AppState>,
    Json(req): Json<CreateCategoryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let category = Category::new(req.name);
    let saved = with_db(&state, move |db| db.save(category)).await?;
    Ok((StatusCode::CREATED, Json(saved)))
}

pub async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let category = with_db(&state, move |db| db.get::<Category>(id)).await?;
    Ok(Json(category))
}

pub async fn get_category_acronyms(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let acronyms = with_db(&state, move |db| {
        let category = db.get::<Category>(id)?;
        db.acronyms_in_category(&category)
    })
    .await?;
    Ok(Json(acronyms))
}
