use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::models::{HotspotRatio, Role};

// -- Session --

/// Identity carrier handed in by the caller on every request.
/// Only `user_id` and `role` are ever consulted for authorization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: Option<i64>,
    pub username: Option<String>,
    pub role: Option<Role>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn is_anonymous(&self) -> bool {
        self.user_id.is_none() && self.role.is_none()
    }
}

// -- Auth --

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

// -- Scenes --

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewSceneRequest {
    pub title: String,
    #[serde(rename = "type")]
    pub scene_type: String,
    pub parent_id: Option<i64>,
    pub image: Bytes,
    /// File extension for the stored image, e.g. `jpg`.
    pub extension: String,
    /// Where the new scene is reachable from inside its parent's image.
    pub hotspot: Option<HotspotRatio>,
}

// -- Feedback --

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeedbackRequest {
    pub scene_id: i64,
    pub message: String,
}

/// The caller's original input, returned untouched with a validation failure
/// so a form can be re-rendered without losing what was typed.
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    Register(RegisterRequest),
    Scene(NewSceneRequest),
    Hotspot {
        parent_id: i64,
        child_id: i64,
        ratio: HotspotRatio,
    },
    Feedback(FeedbackRequest),
}
