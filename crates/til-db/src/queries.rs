use rusqlite::types::Value;
use rusqlite::{Connection, params_from_iter};
use tracing::{debug, warn};
use uuid::Uuid;

use til_types::models::{Acronym, AcronymCategoryPivot, Category, User};

use crate::models::{Entity, FOREIGN_KEYS, column_list, uuid_value};
use crate::{Database, DbError, DbResult, IntegrityPolicy, ReferentialIntegrity};

impl Database {
    // -- Entity store --

    /// Insert-or-update by identity. A record without an id gets a fresh one.
    /// There is no version check: the last write to an id wins.
    pub fn save<E: Entity>(&self, entity: E) -> DbResult<E> {
        let policy = self.policy();
        self.with_conn(|conn| save_entity(conn, policy, entity))
    }

    pub fn find_all<E: Entity>(&self) -> DbResult<Vec<E>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM {} ORDER BY rowid", column_list::<E>(None), E::TABLE);
            query_entities(conn, &sql, [])
        })
    }

    pub fn find<E: Entity>(&self, id: Uuid) -> DbResult<Option<E>> {
        self.with_conn(|conn| find_entity(conn, id))
    }

    /// Like `find`, but a miss is `DbError::NotFound`.
    pub fn get<E: Entity>(&self, id: Uuid) -> DbResult<E> {
        self.find(id)?.ok_or_else(|| not_found::<E>(id))
    }

    /// Deleting an id that does not exist is not an error. What happens to
    /// rows referencing the deleted one depends on `ReferentialIntegrity`.
    pub fn delete<E: Entity>(&self, id: Uuid) -> DbResult<()> {
        let referential = self.policy().referential;
        self.with_conn(|conn| {
            let id = id.to_string();
            match referential {
                ReferentialIntegrity::Cascade => {
                    let tx = conn.unchecked_transaction()?;
                    cascade_delete(&tx, E::TABLE, &id)?;
                    tx.commit()?;
                }
                ReferentialIntegrity::Unenforced | ReferentialIntegrity::Restrict => {
                    conn.execute(&format!("DELETE FROM {} WHERE id = ?1", E::TABLE), [&id])?;
                }
            }
            debug!("Deleted {} {}", E::NAME, id);
            Ok(())
        })
    }

    // -- Associations --

    /// Acronyms whose `creator_id` is this user.
    pub fn acronyms_of(&self, user: &User) -> DbResult<Vec<Acronym>> {
        let user_id = require_id(user)?;
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM acronyms WHERE creator_id = ?1 ORDER BY rowid",
                column_list::<Acronym>(None)
            );
            query_entities(conn, &sql, [uuid_value(user_id)])
        })
    }

    /// Fails with `NotFound` when the creator row no longer exists.
    pub fn creator_of(&self, acronym: &Acronym) -> DbResult<User> {
        let creator = self.with_conn(|conn| find_entity::<User>(conn, acronym.creator_id))?;
        creator.ok_or_else(|| {
            warn!(
                "Acronym {:?} references missing user {}",
                acronym.id, acronym.creator_id
            );
            not_found::<User>(acronym.creator_id)
        })
    }

    /// Categories joined through the pivot table. Duplicate pivot rows show up
    /// as duplicate categories.
    pub fn categories_of(&self, acronym: &Acronym) -> DbResult<Vec<Category>> {
        let acronym_id = require_id(acronym)?;
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {}
                 FROM categories c
                 JOIN acronym_category_pivot p ON p.category_id = c.id
                 WHERE p.acronym_id = ?1
                 ORDER BY p.rowid",
                column_list::<Category>(Some("c"))
            );
            query_entities(conn, &sql, [uuid_value(acronym_id)])
        })
    }

    pub fn acronyms_in_category(&self, category: &Category) -> DbResult<Vec<Acronym>> {
        let category_id = require_id(category)?;
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {}
                 FROM acronyms a
                 JOIN acronym_category_pivot p ON p.acronym_id = a.id
                 WHERE p.category_id = ?1
                 ORDER BY p.rowid",
                column_list::<Acronym>(Some("a"))
            );
            query_entities(conn, &sql, [uuid_value(category_id)])
        })
    }

    /// Inserts a pivot row linking the two. Without `dedupe_category_links`
    /// every call inserts a new row, even for a pair that is already linked.
    pub fn attach_category(
        &self,
        acronym: &Acronym,
        category: &Category,
    ) -> DbResult<AcronymCategoryPivot> {
        let acronym_id = require_id(acronym)?;
        let category_id = require_id(category)?;
        let policy = self.policy();

        self.with_conn(|conn| {
            if policy.dedupe_category_links {
                let sql = format!(
                    "SELECT {} FROM acronym_category_pivot
                     WHERE acronym_id = ?1 AND category_id = ?2
                     ORDER BY rowid LIMIT 1",
                    column_list::<AcronymCategoryPivot>(None)
                );
                let existing: Vec<AcronymCategoryPivot> =
                    query_entities(conn, &sql, [uuid_value(acronym_id), uuid_value(category_id)])?;
                if let Some(pivot) = existing.into_iter().next() {
                    debug!("Category {} already attached to acronym {}", category_id, acronym_id);
                    return Ok(pivot);
                }
            }

            save_entity(conn, policy, AcronymCategoryPivot::new(acronym_id, category_id))
        })
    }

    // -- Search --

    /// Acronyms whose `short` or `long` contains `term`, ignoring case.
    /// `%` and `_` in the term match literally.
    pub fn search(&self, term: &str) -> DbResult<Vec<Acronym>> {
        if term.is_empty() {
            return Err(DbError::InvalidInput("search term must not be empty".into()));
        }

        let pattern = like_pattern(&term.to_lowercase());
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM acronyms
                 WHERE til_fold(short) LIKE ?1 ESCAPE '\\'
                    OR til_fold(long) LIKE ?1 ESCAPE '\\'
                 ORDER BY rowid",
                column_list::<Acronym>(None)
            );
            query_entities(conn, &sql, [Value::Text(pattern)])
        })
    }
}

fn save_entity<E: Entity>(conn: &Connection, policy: IntegrityPolicy, mut entity: E) -> DbResult<E> {
    entity.validate(conn, policy)?;

    let id = match entity.id() {
        Some(id) => id,
        None => {
            let id = Uuid::new_v4();
            entity.set_id(id);
            id
        }
    };

    let placeholders: Vec<String> = (1..=E::COLUMNS.len() + 1).map(|i| format!("?{}", i)).collect();
    let updates: Vec<String> = E::COLUMNS
        .iter()
        .map(|c| format!("{} = excluded.{}", c, c))
        .collect();
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT(id) DO UPDATE SET {}",
        E::TABLE,
        column_list::<E>(None),
        placeholders.join(", "),
        updates.join(", ")
    );

    let values = std::iter::once(uuid_value(id)).chain(entity.values());
    conn.execute(&sql, params_from_iter(values))?;

    debug!("Saved {} {}", E::NAME, id);
    Ok(entity)
}

fn find_entity<E: Entity>(conn: &Connection, id: Uuid) -> DbResult<Option<E>> {
    let sql = format!("SELECT {} FROM {} WHERE id = ?1", column_list::<E>(None), E::TABLE);
    let row = conn
        .query_row(&sql, [id.to_string()], |row| E::from_row(row))
        .optional()?;
    Ok(row)
}

fn query_entities<E, P>(conn: &Connection, sql: &str, params: P) -> DbResult<Vec<E>>
where
    E: Entity,
    P: rusqlite::Params,
{
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, |row| E::from_row(row))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Deletes every row that (transitively) references `table.id = id`, then
/// the row itself.
fn cascade_delete(conn: &Connection, table: &str, id: &str) -> DbResult<()> {
    for fk in FOREIGN_KEYS.iter().filter(|fk| fk.parent == table) {
        let mut stmt =
            conn.prepare(&format!("SELECT id FROM {} WHERE {} = ?1", fk.table, fk.column))?;
        let child_ids: Vec<String> = stmt
            .query_map([id], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        drop(stmt);

        if !child_ids.is_empty() {
            debug!("Cascading delete of {} rows from {}", child_ids.len(), fk.table);
        }
        for child_id in &child_ids {
            cascade_delete(conn, fk.table, child_id)?;
        }
    }

    conn.execute(&format!("DELETE FROM {} WHERE id = ?1", table), [id])?;
    Ok(())
}

fn require_id<E: Entity>(entity: &E) -> DbResult<Uuid> {
    entity
        .id()
        .ok_or_else(|| DbError::InvalidInput(format!("{} has not been saved", E::NAME)))
}

fn not_found<E: Entity>(id: Uuid) -> DbError {
    DbError::NotFound {
        entity: E::NAME,
        id: id.to_string(),
    }
}

fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> DbResult<Option<T>>;
}

impl<T> OptionalExt<T> for Result<T, rusqlite::Error> {
    fn optional(self) -> DbResult<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use til_types::models::Token;

    fn db() -> Database {
        Database::open_in_memory(IntegrityPolicy::default()).unwrap()
    }

    fn db_with(policy: IntegrityPolicy) -> Database {
        Database::open_in_memory(policy).unwrap()
    }

    fn cascade() -> IntegrityPolicy {
        IntegrityPolicy {
            referential: ReferentialIntegrity::Cascade,
            ..Default::default()
        }
    }

    fn restrict() -> IntegrityPolicy {
        IntegrityPolicy {
            referential: ReferentialIntegrity::Restrict,
            ..Default::default()
        }
    }

    fn user(db: &Database, username: &str) -> User {
        db.save(User::new("Tim", username)).unwrap()
    }

    fn acronym(db: &Database, creator: &User, short: &str, long: &str) -> Acronym {
        db.save(Acronym::new(short, long, creator.id.unwrap())).unwrap()
    }

    fn count(db: &Database, table: &str) -> i64 {
        db.with_conn(|conn| {
            Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))?)
        })
        .unwrap()
    }

    // -- Entity store --

    #[test]
    fn save_assigns_id_and_find_returns_equal_record() {
        let db = db();
        let saved = db.save(User::new("Tim", "timc")).unwrap();

        let id = saved.id.expect("id assigned");
        assert!(!id.is_nil());
        assert_eq!(db.find::<User>(id).unwrap(), Some(saved));
    }

    #[test]
    fn save_assigns_distinct_ids() {
        let db = db();
        let a = db.save(Category::new("Teenager")).unwrap();
        let b = db.save(Category::new("Teenager")).unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(db.find_all::<Category>().unwrap().len(), 2);
    }

    #[test]
    fn save_with_existing_id_overwrites_last_write_wins() {
        let db = db();
        let creator = user(&db, "timc");
        let mut first = acronym(&db, &creator, "OMG", "Oh My God");
        let id = first.id;

        first.long = "Oh My Gosh".into();
        let second = db.save(first.clone()).unwrap();
        assert_eq!(second.id, id);

        first.long = "Oh My Goodness".into();
        db.save(first).unwrap();

        let stored = db.get::<Acronym>(id.unwrap()).unwrap();
        assert_eq!(stored.long, "Oh My Goodness");
        assert_eq!(db.find_all::<Acronym>().unwrap().len(), 1);
    }

    #[test]
    fn find_all_on_empty_table_is_empty() {
        assert!(db().find_all::<Acronym>().unwrap().is_empty());
    }

    #[test]
    fn find_miss_is_none_and_get_miss_is_not_found() {
        let db = db();
        let id = Uuid::new_v4();
        assert_eq!(db.find::<Category>(id).unwrap(), None);
        assert!(matches!(
            db.get::<Category>(id),
            Err(DbError::NotFound { entity: "category", .. })
        ));
    }

    #[test]
    fn delete_then_find_is_none() {
        let db = db();
        let category = db.save(Category::new("Funny")).unwrap();
        let id = category.id.unwrap();

        db.delete::<Category>(id).unwrap();
        assert_eq!(db.find::<Category>(id).unwrap(), None);
    }

    #[test]
    fn delete_of_unknown_id_is_ok() {
        db().delete::<User>(Uuid::new_v4()).unwrap();
    }

    #[test]
    fn tokens_round_trip() {
        let db = db();
        let owner = user(&db, "timc");
        let token = db.save(Token::new("abc123", owner.id.unwrap())).unwrap();
        assert_eq!(db.get::<Token>(token.id.unwrap()).unwrap(), token);
    }

    // -- Associations --

    #[test]
    fn acronyms_of_returns_exactly_the_users_rows() {
        let db = db();
        let none = user(&db, "none");
        let one = user(&db, "one");
        let many = user(&db, "many");

        let single = acronym(&db, &one, "OMG", "Oh My God");
        let a = acronym(&db, &many, "LOL", "Laugh Out Loud");
        let b = acronym(&db, &many, "IKR", "I Know Right");

        assert!(db.acronyms_of(&none).unwrap().is_empty());
        assert_eq!(db.acronyms_of(&one).unwrap(), vec![single]);
        assert_eq!(db.acronyms_of(&many).unwrap(), vec![a, b]);
    }

    #[test]
    fn accessors_reject_unsaved_records() {
        let db = db();
        assert!(matches!(
            db.acronyms_of(&User::new("Tim", "timc")),
            Err(DbError::InvalidInput(_))
        ));
        assert!(matches!(
            db.categories_of(&Acronym::new("OMG", "Oh My God", Uuid::new_v4())),
            Err(DbError::InvalidInput(_))
        ));
    }

    #[test]
    fn creator_of_resolves_parent() {
        let db = db();
        let creator = user(&db, "timc");
        let acronym = acronym(&db, &creator, "OMG", "Oh My God");
        assert_eq!(db.creator_of(&acronym).unwrap(), creator);
    }

    #[test]
    fn categories_of_joins_through_pivot() {
        let db = db();
        let creator = user(&db, "timc");
        let omg = acronym(&db, &creator, "OMG", "Oh My God");
        let lol = acronym(&db, &creator, "LOL", "Laugh Out Loud");
        let teen = db.save(Category::new("Teenager")).unwrap();
        let funny = db.save(Category::new("Funny")).unwrap();

        db.attach_category(&omg, &teen).unwrap();
        db.attach_category(&omg, &funny).unwrap();
        db.attach_category(&lol, &funny).unwrap();

        assert_eq!(db.categories_of(&omg).unwrap(), vec![teen.clone(), funny.clone()]);
        assert_eq!(db.categories_of(&lol).unwrap(), vec![funny.clone()]);
        assert_eq!(db.acronyms_in_category(&funny).unwrap(), vec![omg.clone(), lol]);
        assert_eq!(db.acronyms_in_category(&teen).unwrap(), vec![omg]);
    }

    #[test]
    fn attaching_twice_preserves_multiplicity_by_default() {
        let db = db();
        let creator = user(&db, "timc");
        let omg = acronym(&db, &creator, "OMG", "Oh My God");
        let teen = db.save(Category::new("Teenager")).unwrap();

        let first = db.attach_category(&omg, &teen).unwrap();
        let second = db.attach_category(&omg, &teen).unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(count(&db, "acronym_category_pivot"), 2);
        assert_eq!(db.categories_of(&omg).unwrap(), vec![teen.clone(), teen]);
    }

    #[test]
    fn attaching_twice_with_dedupe_returns_existing_link() {
        let db = db_with(IntegrityPolicy {
            dedupe_category_links: true,
            ..Default::default()
        });
        let creator = user(&db, "timc");
        let omg = acronym(&db, &creator, "OMG", "Oh My God");
        let teen = db.save(Category::new("Teenager")).unwrap();

        let first = db.attach_category(&omg, &teen).unwrap();
        let second = db.attach_category(&omg, &teen).unwrap();

        assert_eq!(first, second);
        assert_eq!(db.categories_of(&omg).unwrap(), vec![teen]);
    }

    // -- Search --

    fn search_fixture() -> (Database, Acronym, Acronym) {
        let db = db();
        let creator = user(&db, "timc");
        let sql = acronym(&db, &creator, "SQL", "Structured Query Language");
        let css = acronym(&db, &creator, "CSS", "cascading style sheets");
        (db, sql, css)
    }

    #[test]
    fn search_matches_short_case_insensitively() {
        let (db, sql, _) = search_fixture();
        assert_eq!(db.search("sql").unwrap(), vec![sql]);
    }

    #[test]
    fn search_matches_long_case_insensitively() {
        let (db, sql, css) = search_fixture();
        assert_eq!(db.search("language").unwrap(), vec![sql]);
        assert_eq!(db.search("STYLE").unwrap(), vec![css]);
    }

    #[test]
    fn search_returns_every_tied_row() {
        let (db, sql, _) = search_fixture();
        let creator = db.creator_of(&sql).unwrap();
        let twin = acronym(&db, &creator, "SQL", "Structured Query Language");
        assert_eq!(db.search("query").unwrap(), vec![sql, twin]);
    }

    #[test]
    fn search_treats_wildcards_literally() {
        let (db, _, _) = search_fixture();
        assert!(db.search("%").unwrap().is_empty());
        assert!(db.search("S_L").unwrap().is_empty());

        let creator = user(&db, "pct");
        let pct = acronym(&db, &creator, "PCT", "100% cotton");
        assert_eq!(db.search("0% c").unwrap(), vec![pct]);
    }

    #[test]
    fn empty_search_term_is_rejected() {
        let (db, _, _) = search_fixture();
        assert!(matches!(db.search(""), Err(DbError::InvalidInput(_))));
    }

    #[test]
    fn whitespace_term_is_a_literal_substring() {
        let db = db();
        let creator = user(&db, "timc");
        let omg = acronym(&db, &creator, "OMG", "Oh My God");
        let tla = acronym(&db, &creator, "TLA", "ThreeLetterAcronym");

        assert_eq!(db.search(" ").unwrap(), vec![omg]);
        assert_eq!(db.search("letter").unwrap(), vec![tla]);
    }

    #[test]
    fn search_folds_non_ascii_case() {
        let db = db();
        let creator = user(&db, "jürgen");
        let uml = acronym(&db, &creator, "ÜML", "Über Modeling Ä");

        assert_eq!(db.search("über").unwrap(), vec![uml.clone()]);
        assert_eq!(db.search("üml").unwrap(), vec![uml.clone()]);
        assert_eq!(db.search("MODELING ä").unwrap(), vec![uml]);
        assert!(db.search("ö").unwrap().is_empty());
    }

    #[test]
    fn empty_search_term_is_rejected_before_touching_the_store() {
        let db = db();
        let guard = db.conn.lock().unwrap();
        // Would block forever on the held lock if the store were consulted.
        assert!(matches!(db.search(""), Err(DbError::InvalidInput(_))));
        drop(guard);
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("sql"), "%sql%");
        assert_eq!(like_pattern("50%_off\\"), "%50\\%\\_off\\\\%");
    }

    // -- Referential integrity --

    #[test]
    fn unenforced_delete_leaves_dangling_creator() {
        let db = db();
        let creator = user(&db, "timc");
        let omg = acronym(&db, &creator, "OMG", "Oh My God");
        let teen = db.save(Category::new("Teenager")).unwrap();
        db.attach_category(&omg, &teen).unwrap();

        db.delete::<User>(creator.id.unwrap()).unwrap();

        let orphan = db.get::<Acronym>(omg.id.unwrap()).unwrap();
        assert_eq!(orphan.creator_id, creator.id.unwrap());
        assert!(matches!(
            db.creator_of(&orphan),
            Err(DbError::NotFound { entity: "user", .. })
        ));

        db.delete::<Acronym>(omg.id.unwrap()).unwrap();
        assert_eq!(count(&db, "acronym_category_pivot"), 1);
    }

    #[test]
    fn unenforced_save_accepts_unknown_creator() {
        let db = db();
        let saved = db.save(Acronym::new("OMG", "Oh My God", Uuid::new_v4())).unwrap();
        assert!(saved.id.is_some());
    }

    #[test]
    fn restrict_rejects_unknown_creator() {
        let db = db_with(restrict());
        let result = db.save(Acronym::new("OMG", "Oh My God", Uuid::new_v4()));
        assert!(matches!(result, Err(DbError::Constraint(_))));
    }

    #[test]
    fn restrict_refuses_deleting_referenced_user() {
        let db = db_with(restrict());
        let creator = user(&db, "timc");
        acronym(&db, &creator, "OMG", "Oh My God");

        let result = db.delete::<User>(creator.id.unwrap());
        assert!(matches!(result, Err(DbError::Constraint(_))));
        assert!(db.find::<User>(creator.id.unwrap()).unwrap().is_some());
    }

    #[test]
    fn cascade_removes_dependents_transitively() {
        let db = db_with(cascade());
        let creator = user(&db, "timc");
        let other = user(&db, "other");
        let omg = acronym(&db, &creator, "OMG", "Oh My God");
        let kept = acronym(&db, &other, "LOL", "Laugh Out Loud");
        let teen = db.save(Category::new("Teenager")).unwrap();
        db.attach_category(&omg, &teen).unwrap();
        db.attach_category(&kept, &teen).unwrap();
        db.save(Token::new("abc123", creator.id.unwrap())).unwrap();

        db.delete::<User>(creator.id.unwrap()).unwrap();

        assert_eq!(db.find_all::<Acronym>().unwrap(), vec![kept.clone()]);
        assert_eq!(db.acronyms_in_category(&teen).unwrap(), vec![kept]);
        assert_eq!(count(&db, "tokens"), 0);
        assert!(db.find::<Category>(teen.id.unwrap()).unwrap().is_some());
    }

    // -- Username uniqueness --

    #[test]
    fn duplicate_usernames_allowed_by_default() {
        let db = db();
        user(&db, "timc");
        user(&db, "timc");
        assert_eq!(db.find_all::<User>().unwrap().len(), 2);
    }

    #[test]
    fn duplicate_usernames_rejected_when_enforced() {
        let db = db_with(IntegrityPolicy {
            enforce_unique_usernames: true,
            ..Default::default()
        });
        let mut tim = user(&db, "timc");

        let result = db.save(User::new("Other Tim", "timc"));
        assert!(matches!(result, Err(DbError::Conflict(_))));

        tim.name = "Tim C".into();
        db.save(tim).unwrap();
    }
}
