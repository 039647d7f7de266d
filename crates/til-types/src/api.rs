use serde::{Deserialize, Serialize};
use uuid::Uuid;

// -- Acronyms --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateAcronymRequest {
    pub short: String,
    pub long: String,
    #[serde(rename = "creatorID")]
    pub creator_id: Uuid,
}

/// Body of `PUT /api/acronyms/{id}`. Only `short` and `long` are applied;
/// clients that send the whole acronym back are accepted.
#[derive(Debug, Deserialize)]
pub struct UpdateAcronymRequest {
    pub short: String,
    pub long: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub term: Option<String>,
}

// -- Users --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateUserRequest {
    pub name: String,
    pub username: String,
}

// -- Categories --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateCategoryRequest {
    pub name: String,
}

// -- Errors --

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
