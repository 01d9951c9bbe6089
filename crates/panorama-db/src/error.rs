use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("connection lock poisoned ({0})")]
    Poisoned(String),

    #[error("username '{0}' already exists")]
    DuplicateName(String),

    #[error("scene {0} is already the target of a hotspot")]
    HotspotTaken(i64),
}

/// True when `err` is a UNIQUE or PRIMARY KEY violation.
pub(crate) fn is_key_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => {
            e.code == ErrorCode::ConstraintViolation
                && (e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
        }
        _ => false,
    }
}
