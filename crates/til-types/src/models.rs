use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A person who creates acronyms.
///
/// `id` is `None` until the record has been saved; the store assigns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub name: String,
    pub username: String,
}

impl User {
    pub fn new(name: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            username: username.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acronym {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub short: String,
    pub long: String,
    /// References `User::id`. Not guaranteed to resolve: see the store's
    /// referential integrity setting.
    #[serde(rename = "creatorID")]
    pub creator_id: Uuid,
}

impl Acronym {
    pub fn new(short: impl Into<String>, long: impl Into<String>, creator_id: Uuid) -> Self {
        Self {
            id: None,
            short: short.into(),
            long: long.into(),
            creator_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub name: String,
}

impl Category {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
        }
    }
}

/// Join row linking one acronym to one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcronymCategoryPivot {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(rename = "acronymID")]
    pub acronym_id: Uuid,
    #[serde(rename = "categoryID")]
    pub category_id: Uuid,
}

impl AcronymCategoryPivot {
    pub fn new(acronym_id: Uuid, category_id: Uuid) -> Self {
        Self {
            id: None,
            acronym_id,
            category_id,
        }
    }
}

/// Session token persisted for a user. Issuance lives outside this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub token: String,
    #[serde(rename = "userID")]
    pub user_id: Uuid,
}

impl Token {
    pub fn new(token: impl Into<String>, user_id: Uuid) -> Self {
        Self {
            id: None,
            token: token.into(),
            user_id,
        }
    }
}
