//! Row mapping for the entity records defined in `til-types`.
//!
//! Every table has a TEXT `id` primary key followed by the columns listed in
//! `Entity::COLUMNS`, in that order. Rows are always selected as
//! `id, COLUMNS...` so `from_row` can read by position.

use rusqlite::types::{Type, Value};
use rusqlite::{Connection, Row};
use uuid::Uuid;

use til_types::models::{Acronym, AcronymCategoryPivot, Category, Token, User};

use crate::{DbError, DbResult, IntegrityPolicy};

pub trait Entity: Sized {
    /// Singular name used in errors and logs.
    const NAME: &'static str;
    const TABLE: &'static str;
    /// Non-id columns, in the order `values` yields them.
    const COLUMNS: &'static [&'static str];

    fn id(&self) -> Option<Uuid>;
    fn set_id(&mut self, id: Uuid);
    fn values(&self) -> Vec<Value>;
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;

    /// Runs before the row is written, on the same connection.
    fn validate(&self, _conn: &Connection, _policy: IntegrityPolicy) -> DbResult<()> {
        Ok(())
    }
}

/// A declared `REFERENCES` clause: `table.column` points at `parent.id`.
pub(crate) struct ForeignKey {
    pub table: &'static str,
    pub column: &'static str,
    pub parent: &'static str,
}

pub(crate) const FOREIGN_KEYS: &[ForeignKey] = &[
    ForeignKey { table: Acronym::TABLE, column: "creator_id", parent: User::TABLE },
    ForeignKey { table: Token::TABLE, column: "user_id", parent: User::TABLE },
    ForeignKey { table: AcronymCategoryPivot::TABLE, column: "acronym_id", parent: Acronym::TABLE },
    ForeignKey { table: AcronymCategoryPivot::TABLE, column: "category_id", parent: Category::TABLE },
];

/// `id, col1, col2...`, optionally qualified with a table alias.
pub(crate) fn column_list<E: Entity>(alias: Option<&str>) -> String {
    std::iter::once("id")
        .chain(E::COLUMNS.iter().copied())
        .map(|c| match alias {
            Some(a) => format!("{}.{}", a, c),
            None => c.to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

pub(crate) fn uuid_value(id: Uuid) -> Value {
    Value::Text(id.to_string())
}

fn uuid_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

impl Entity for User {
    const NAME: &'static str = "user";
    const TABLE: &'static str = "users";
    const COLUMNS: &'static [&'static str] = &["name", "username"];

    fn id(&self) -> Option<Uuid> {
        self.id
    }

    fn set_id(&mut self, id: Uuid) {
        self.id = Some(id);
    }

    fn values(&self) -> Vec<Value> {
        vec![Value::Text(self.name.clone()), Value::Text(self.username.clone())]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(uuid_at(row, 0)?),
            name: row.get(1)?,
            username: row.get(2)?,
        })
    }

    fn validate(&self, conn: &Connection, policy: IntegrityPolicy) -> DbResult<()> {
        if !policy.enforce_unique_usernames {
            return Ok(());
        }

        let own_id = self.id.map(|id| id.to_string()).unwrap_or_default();
        let taken: bool = conn.query_row(
            "SELECT EXISTS (SELECT 1 FROM users WHERE username = ?1 AND id <> ?2)",
            (&self.username, &own_id),
            |row| row.get(0),
        )?;

        if taken {
            return Err(DbError::Conflict(format!(
                "username '{}' is already taken",
                self.username
            )));
        }
        Ok(())
    }
}

impl Entity for Acronym {
    const NAME: &'static str = "acronym";
    const TABLE: &'static str = "acronyms";
    const COLUMNS: &'static [&'static str] = &["short", "long", "creator_id"];

    fn id(&self) -> Option<Uuid> {
        self.id
    }

    fn set_id(&mut self, id: Uuid) {
        self.id = Some(id);
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.short.clone()),
            Value::Text(self.long.clone()),
            uuid_value(self.creator_id),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(uuid_at(row, 0)?),
            short: row.get(1)?,
            long: row.get(2)?,
            creator_id: uuid_at(row, 3)?,
        })
    }
}

impl Entity for Category {
    const NAME: &'static str = "category";
    const TABLE: &'static str = "categories";
    const COLUMNS: &'static [&'static str] = &["name"];

    fn id(&self) -> Option<Uuid> {
        self.id
    }

    fn set_id(&mut self, id: Uuid) {
        self.id = Some(id);
    }

    fn values(&self) -> Vec<Value> {
        vec![Value::Text(self.name.clone())]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(uuid_at(row, 0)?),
            name: row.get(1)?,
        })
    }
}

impl Entity for AcronymCategoryPivot {
    const NAME: &'static str = "acronym category link";
    const TABLE: &'static str = "acronym_category_pivot";
    const COLUMNS: &'static [&'static str] = &["acronym_id", "category_id"];

    fn id(&self) -> Option<Uuid> {
        self.id
    }

    fn set_id(&mut self, id: Uuid) {
        self.id = Some(id);
    }

    fn values(&self) -> Vec<Value> {
        vec![uuid_value(self.acronym_id), uuid_value(self.category_id)]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(uuid_at(row, 0)?),
            acronym_id: uuid_at(row, 1)?,
            category_id: uuid_at(row, 2)?,
        })
    }
}

impl Entity for Token {
    const NAME: &'static str = "token";
    const TABLE: &'static str = "tokens";
    const COLUMNS: &'static [&'static str] = &["token", "user_id"];

    fn id(&self) -> Option<Uuid> {
        self.id
    }

    fn set_id(&mut self, id: Uuid) {
        self.id = Some(id);
    }

    fn values(&self) -> Vec<Value> {
        vec![Value::Text(self.token.clone()), uuid_value(self.user_id)]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(uuid_at(row, 0)?),
            token: row.get(1)?,
            user_id: uuid_at(row, 2)?,
        })
    }
}
