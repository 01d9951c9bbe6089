use std::sync::Arc;

use panorama_db::Database;
use panorama_db::models::UserRow;
use panorama_types::models::{Role, User};
use tracing::info;

use crate::error::Result;

/// User accounts. Rows are created once and never updated or deleted.
#[derive(Clone)]
pub struct IdentityStore {
    db: Arc<Database>,
}

impl IdentityStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn find_by_name(&self, name: &str) -> Result<Option<UserRow>> {
        Ok(self.db.get_user_by_name(name)?)
    }

    pub fn find_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        Ok(self.db.get_user_by_id(id)?)
    }

    /// Fails with `DuplicateName` when the name is taken; no row is written then.
    pub fn create(&self, name: &str, role: Role, hashed_password: &str, salt: &str) -> Result<User> {
        let id = self.db.create_user(name, role, hashed_password, salt)?;
        info!("Registered {} '{}' as user {}", role, name, id);
        Ok(User {
            id,
            name: name.to_string(),
            role,
        })
    }

    pub fn count(&self) -> Result<i64> {
        Ok(self.db.user_count()?)
    }

    /// No accounts yet: the bootstrap rule applies.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.count()? == 0)
    }
}
