use panorama_types::models::{Feedback, Role};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::error::is_key_violation;
use crate::models::UserRow;
use crate::{Database, DbError};

impl Database {
    // -- Users --

    /// Existence check and insert run in the same write transaction, with the
    /// UNIQUE constraint as the final word.
    pub fn create_user(
        &self,
        name: &str,
        role: Role,
        hashed_password: &str,
        salt: &str,
    ) -> Result<i64, DbError> {
        self.transaction(|tx| insert_user(tx, name, role, hashed_password, salt))
    }

    pub fn get_user_by_name(&self, name: &str) -> Result<Option<UserRow>, DbError> {
        self.with_conn(|conn| find_user_by_name(conn, name))
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>, DbError> {
        self.with_conn(|conn| find_user_by_id(conn, id))
    }

    pub fn user_count(&self) -> Result<i64, DbError> {
        self.with_conn(count_users)
    }

    // -- Feedback --

    /// The scene check and the insert share one write transaction, so a
    /// concurrent delete cannot slip in between. `None` if the scene is gone.
    pub fn add_feedback(
        &self,
        user_id: i64,
        message: &str,
        date: &str,
        scene_id: i64,
    ) -> Result<Option<i64>, DbError> {
        self.transaction(|tx| {
            if crate::graph::find_scene(tx, scene_id)?.is_none() {
                return Ok(None);
            }
            insert_feedback(tx, user_id, message, date, scene_id).map(Some)
        })
    }

    pub fn get_feedback(&self, id: i64) -> Result<Option<Feedback>, DbError> {
        self.with_conn(|conn| find_feedback(conn, id))
    }

    pub fn get_feedback_for_scene(&self, scene_id: i64) -> Result<Vec<Feedback>, DbError> {
        self.with_conn(|conn| feedback_for_scene(conn, scene_id))
    }

    /// Returns whether a row was removed.
    pub fn delete_feedback(&self, id: i64) -> Result<bool, DbError> {
        self.transaction(|tx| {
            let n = tx.execute("DELETE FROM feedback WHERE id = ?1", [id])?;
            Ok(n > 0)
        })
    }
}

// -- Users --

pub fn insert_user(
    conn: &Connection,
    name: &str,
    role: Role,
    hashed_password: &str,
    salt: &str,
) -> Result<i64, DbError> {
    if find_user_by_name(conn, name)?.is_some() {
        return Err(DbError::DuplicateName(name.to_string()));
    }

    conn.execute(
        "INSERT INTO users (name, role, hashed_password, salt) VALUES (?1, ?2, ?3, ?4)",
        params![name, role.as_str(), hashed_password, salt],
    )
    .map_err(|e| {
        if is_key_violation(&e) {
            DbError::DuplicateName(name.to_string())
        } else {
            e.into()
        }
    })?;

    Ok(conn.last_insert_rowid())
}

pub fn find_user_by_name(conn: &Connection, name: &str) -> Result<Option<UserRow>, DbError> {
    let row = conn
        .query_row(
            "SELECT id, name, role, hashed_password, salt FROM users WHERE name = ?1",
            [name],
            user_from_row,
        )
        .optional()?;
    Ok(row)
}

pub fn find_user_by_id(conn: &Connection, id: i64) -> Result<Option<UserRow>, DbError> {
    let row = conn
        .query_row(
            "SELECT id, name, role, hashed_password, salt FROM users WHERE id = ?1",
            [id],
            user_from_row,
        )
        .optional()?;
    Ok(row)
}

pub fn count_users(conn: &Connection) -> Result<i64, DbError> {
    Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))?)
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    let role: String = row.get(2)?;
    let role = role
        .parse::<Role>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;

    Ok(UserRow {
        id: row.get(0)?,
        name: row.get(1)?,
        role,
        hashed_password: row.get(3)?,
        salt: row.get(4)?,
    })
}

// -- Feedback --

pub fn insert_feedback(
    conn: &Connection,
    user_id: i64,
    message: &str,
    date: &str,
    scene_id: i64,
) -> Result<i64, DbError> {
    conn.execute(
        "INSERT INTO feedback (user_id, message, date, scene_id) VALUES (?1, ?2, ?3, ?4)",
        params![user_id, message, date, scene_id],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn find_feedback(conn: &Connection, id: i64) -> Result<Option<Feedback>, DbError> {
    let row = conn
        .query_row(
            "SELECT id, user_id, message, date, scene_id FROM feedback WHERE id = ?1",
            [id],
            feedback_from_row,
        )
        .optional()?;
    Ok(row)
}

/// Oldest first; callers decide presentation order.
pub fn feedback_for_scene(conn: &Connection, scene_id: i64) -> Result<Vec<Feedback>, DbError> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, message, date, scene_id FROM feedback
         WHERE scene_id = ?1
         ORDER BY id ASC",
    )?;

    let rows = stmt
        .query_map([scene_id], feedback_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows)
}

fn feedback_from_row(row: &Row<'_>) -> rusqlite::Result<Feedback> {
    Ok(Feedback {
        id: row.get(0)?,
        user_id: row.get(1)?,
        message: row.get(2)?,
        date: row.get(3)?,
        scene_id: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph;
    use crate::testing::open_temp;

    #[test]
    fn duplicate_username_is_rejected_without_a_second_row() {
        let (_dir, db) = open_temp();

        db.create_user("mika", Role::Visitor, "hash", "SALT").unwrap();
        let err = db
            .create_user("mika", Role::Curator, "other", "SALT2")
            .unwrap_err();
        assert!(matches!(err, DbError::DuplicateName(ref n) if n == "mika"));
        assert_eq!(db.user_count().unwrap(), 1);

        let row = db.get_user_by_name("mika").unwrap().unwrap();
        assert_eq!(row.role, Role::Visitor);
        assert_eq!(row.hashed_password, "hash");
    }

    #[test]
    fn unique_constraint_maps_to_duplicate_name() {
        let (_dir, db) = open_temp();
        db.create_user("ren", Role::Visitor, "h", "s").unwrap();

        // Bypass the pre-check to exercise the constraint path.
        let err = db
            .transaction(|tx| -> Result<(), DbError> {
                tx.execute(
                    "INSERT INTO users (name, role, hashed_password, salt) VALUES ('ren', 'visitor', 'h', 's')",
                    [],
                )
                .map_err(|e| {
                    if is_key_violation(&e) {
                        DbError::DuplicateName("ren".into())
                    } else {
                        e.into()
                    }
                })?;
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(err, DbError::DuplicateName(_)));
    }

    #[test]
    fn user_lookup_by_id_and_name_agree() {
        let (_dir, db) = open_temp();
        let id = db.create_user("ana", Role::Curator, "h", "s").unwrap();

        let by_id = db.get_user_by_id(id).unwrap().unwrap();
        let by_name = db.get_user_by_name("ana").unwrap().unwrap();
        assert_eq!(by_id, by_name);
        assert_eq!(by_id.to_user().role, Role::Curator);
        assert!(db.get_user_by_name("nobody").unwrap().is_none());
    }

    #[test]
    fn feedback_add_list_delete() {
        let (_dir, db) = open_temp();
        let user = db.create_user("vis", Role::Visitor, "h", "s").unwrap();
        let scene = db
            .transaction(|tx| graph::insert_scene(tx, "s", "photo", None))
            .unwrap();

        let first = db.add_feedback(user, "nice", "2024/01/01 10:00:00", scene).unwrap().unwrap();
        let second = db.add_feedback(user, "again", "2024/01/01 10:05:00", scene).unwrap().unwrap();

        let all = db.get_feedback_for_scene(scene).unwrap();
        assert_eq!(all.iter().map(|f| f.id).collect::<Vec<_>>(), vec![first, second]);

        assert!(db.delete_feedback(first).unwrap());
        assert!(!db.delete_feedback(first).unwrap());
        assert!(db.get_feedback(first).unwrap().is_none());
        assert_eq!(db.get_feedback(second).unwrap().unwrap().message, "again");
        // No scene, no row.
        assert_eq!(db.add_feedback(user, "lost", "2024/01/01 10:10:00", scene + 1).unwrap(), None);
        assert_eq!(db.get_feedback_for_scene(scene + 1).unwrap(), vec![]);
    }
}
