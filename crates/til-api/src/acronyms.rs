use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use til_types::api::{CreateAcronymRequest, SearchQuery, UpdateAcronymRequest};
use til_types::models::{Acronym, Category, User};

use crate::error::ApiError;
use crate::state::{AppState, with_db};

pub async fn list_acronyms(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let acronyms = with_db(&state, |db| db.find_all::<Acronym>()).await?;
    Ok(Json(acronyms))
}

pub async fn create_acronym(
    State(state): State<AppState>,
    Json(req): Json<CreateAcronymRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let acronym = Acronym::new(req.short, req.long, req.creator_id);
    let saved = with_db(&state, move |db| db.save(acronym)).await?;
    Ok((StatusCode::CREATED, Json(saved)))
}

pub async fn get_acronym(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let acronym = with_db(&state, move |db| db.get::<Acronym>(id)).await?;
    Ok(Json(acronym))
}

/// Overwrites `short` and `long`; the creator is left as stored.
pub async fn update_acronym(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateAcronymRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let updated = with_db(&state, move |db| {
        let mut acronym = db.get::<Acronym>(id)?;
        acronym.short = req.short;
        acronym.long = req.long;
        db.save(acronym)
    })
    .await?;
    Ok(Json(updated))
}

pub async fn delete_acronym(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    with_db(&state, move |db| {
        db.get::<Acronym>(id)?;
        db.delete::<Acronym>(id)
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_creator(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let creator: User = with_db(&state, move |db| {
        let acronym = db.get::<Acronym>(id)?;
        db.creator_of(&acronym)
    })
    .await?;
    Ok(Json(creator))
}

pub async fn get_categories(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let categories = with_db(&state, move |db| {
        let acronym = db.get::<Acronym>(id)?;
        db.categories_of(&acronym)
    })
    .await?;
    Ok(Json(categories))
}

pub async fn attach_category(
    State(state): State<AppState>,
    Path((id, category_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let pivot = with_db(&state, move |db| {
        let acronym = db.get::<Acronym>(id)?;
        let category = db.get::<Category>(category_id)?;
        db.attach_category(&acronym, &category)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(pivot)))
}

pub async fn search_acronyms(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let term = query
        .term
        .ok_or_else(|| ApiError::BadRequest("Missing search term in request".into()))?;
    let acronyms = with_db(&state, move |db| db.search(&term)).await?;
    Ok(Json(acronyms))
}
