//! Error taxonomy for the scene graph core.
//!
//! Every public operation returns [`Result`]. Not-found, authorization and
//! validation outcomes are ordinary values the caller is expected to handle;
//! `Store` and `Blob` are infrastructure failures.

use std::fmt;

use panorama_db::DbError;
use panorama_types::api::Submission;
use panorama_types::models::Role;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Scene,
    User,
    Feedback,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Entity::Scene => "scene",
            Entity::User => "user",
            Entity::Feedback => "feedback",
        })
    }
}

/// Mutations guarded by the access gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Register,
    CreateScene,
    SetScenePath,
    LinkHotspot,
    PublishScene,
    DeleteScene,
    AddFeedback,
    DeleteFeedback,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Action::Register => "register",
            Action::CreateScene => "create scene",
            Action::SetScenePath => "set scene path",
            Action::LinkHotspot => "link hotspot",
            Action::PublishScene => "publish scene",
            Action::DeleteScene => "delete scene",
            Action::AddFeedback => "add feedback",
            Action::DeleteFeedback => "delete feedback",
        })
    }
}

/// What the caller lacked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Role(Role),
    /// No role at all, or a role other than visitor (registration).
    NotVisitor,
    /// A known account, not just a role tag.
    Identity,
    Owner,
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requirement::Role(role) => write!(f, "role {role}"),
            Requirement::NotVisitor => f.write_str("a non-visitor session"),
            Requirement::Identity => f.write_str("a registered identity"),
            Requirement::Owner => f.write_str("ownership"),
        }
    }
}

/// A rejected input together with the original submission.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejected {
    pub field: &'static str,
    pub reason: String,
    pub input: Submission,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("{entity} {id} not found")]
    NotFound { entity: Entity, id: String },

    #[error("username '{0}' is already taken")]
    DuplicateName(String),

    #[error("{action} requires {required}")]
    Unauthorized {
        action: Action,
        required: Requirement,
    },

    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("invalid {}: {}", .0.field, .0.reason)]
    Validation(Box<Rejected>),

    #[error("scene {0} is already the target of a hotspot")]
    HotspotTaken(i64),

    #[error("blob {path}: {source}")]
    Blob {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Store(DbError),
}

impl Error {
    pub fn not_found(entity: Entity, id: impl ToString) -> Self {
        Error::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn unauthorized(action: Action, required: Requirement) -> Self {
        Error::Unauthorized { action, required }
    }

    pub fn invalid(field: &'static str, reason: impl Into<String>, input: Submission) -> Self {
        Error::Validation(Box::new(Rejected {
            field,
            reason: reason.into(),
            input,
        }))
    }

    /// The caller can act on this outcome (re-render, redirect, retry with
    /// different input); the rest are infrastructure failures.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Error::Store(_) | Error::Blob { .. })
    }

    /// Original input for a validation failure.
    pub fn submission(&self) -> Option<&Submission> {
        match self {
            Error::Validation(rejected) => Some(&rejected.input),
            _ => None,
        }
    }
}

impl From<DbError> for Error {
    fn from(err: DbError) -> Self {
        match err {
            DbError::DuplicateName(name) => Error::DuplicateName(name),
            DbError::HotspotTaken(child) => Error::HotspotTaken(child),
            other => Error::Store(other),
        }
    }
}
