/// Database row types that have no public API counterpart.
/// Scenes, hotspots and feedback map straight onto `panorama_types::models`.
use panorama_types::models::{Role, User};

/// A `users` row, credentials included. Never handed past the identity layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRow {
    pub id: i64,
    pub name: String,
    pub role: Role,
    pub hashed_password: String,
    pub salt: String,
}

impl UserRow {
    pub fn to_user(&self) -> User {
        User {
            id: self.id,
            name: self.name.clone(),
            role: self.role,
        }
    }
}

/// The slice of a `scenes` row needed to rebuild the tree shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneLinkRow {
    pub id: i64,
    pub parent_id: Option<i64>,
    pub path: Option<String>,
}

/// Row counts removed for one scene during a cascading delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeCounts {
    pub edges: usize,
    pub feedback: usize,
}
