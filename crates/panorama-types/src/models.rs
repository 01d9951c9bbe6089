use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Account role. Stored in the `users.role` column as its lowercase tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Curator,
    Visitor,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Curator => "curator",
            Role::Visitor => "visitor",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown role tag '{0}'")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "curator" => Ok(Role::Curator),
            "visitor" => Ok(Role::Visitor),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// Public view of an account. Credentials never leave the identity store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub role: Role,
}

/// Lifecycle of a scene relative to its image blob.
/// A deleted scene has no row, so it has no representation here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SceneState {
    Draft,
    Published,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub id: i64,
    pub name: String,
    /// Blob reference, `data/{id}.{ext}`. `None` while the scene is a draft.
    pub path: Option<String>,
    #[serde(rename = "type")]
    pub scene_type: String,
    /// `None` marks the root of a story.
    pub parent_id: Option<i64>,
}

impl Scene {
    pub fn state(&self) -> SceneState {
        match self.path {
            Some(_) => SceneState::Published,
            None => SceneState::Draft,
        }
    }
}

/// Position of a hotspot inside the parent's image, each axis in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HotspotRatio {
    pub x_ratio: f64,
    pub y_ratio: f64,
}

impl HotspotRatio {
    pub fn new(x_ratio: f64, y_ratio: f64) -> Self {
        Self { x_ratio, y_ratio }
    }

    pub fn is_valid(&self) -> bool {
        let in_unit = |v: f64| v.is_finite() && (0.0..=1.0).contains(&v);
        in_unit(self.x_ratio) && in_unit(self.y_ratio)
    }
}

/// A scene together with the hotspot that leads to it, if any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneEntry {
    #[serde(flatten)]
    pub scene: Scene,
    pub hotspot: Option<HotspotRatio>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    pub id: i64,
    pub user_id: i64,
    pub message: String,
    pub date: String,
    pub scene_id: i64,
}

/// Everything a scene page shows: the scene, where it links to, and what
/// visitors said about it (newest first).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneDetail {
    pub scene: SceneEntry,
    pub children: Vec<SceneEntry>,
    pub feedback: Vec<Feedback>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_tags_round_trip_through_str_and_serde() {
        for role in [Role::Curator, Role::Visitor] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
            let json = serde_json::to_string(&role).unwrap();
            assert_eq!(json, format!("\"{}\"", role.as_str()));
        }
        let err = "admin".parse::<Role>().unwrap_err();
        assert_eq!(err.to_string(), "unknown role tag 'admin'");
    }

    #[test]
    fn scene_state_follows_path() {
        let mut scene = Scene {
            id: 1,
            name: "lobby".into(),
            path: None,
            scene_type: "panorama".into(),
            parent_id: None,
        };
        assert_eq!(scene.state(), SceneState::Draft);

        scene.path = Some("data/1.jpg".into());
        assert_eq!(scene.state(), SceneState::Published);
    }

    #[test]
    fn hotspot_ratio_bounds() {
        assert!(HotspotRatio::new(0.0, 1.0).is_valid());
        assert!(HotspotRatio::new(0.3, 0.6).is_valid());
        assert!(!HotspotRatio::new(-0.1, 0.5).is_valid());
        assert!(!HotspotRatio::new(0.5, 1.01).is_valid());
        assert!(!HotspotRatio::new(f64::NAN, 0.5).is_valid());
    }

    #[test]
    fn scene_entry_serializes_flat() {
        let entry = SceneEntry {
            scene: Scene {
                id: 2,
                name: "hall".into(),
                path: Some("data/2.jpg".into()),
                scene_type: "photo".into(),
                parent_id: Some(1),
            },
            hotspot: Some(HotspotRatio::new(0.25, 0.75)),
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["type"], "photo");
        assert_eq!(value["parent_id"], 1);
        assert_eq!(value["hotspot"]["x_ratio"], 0.25);
    }
}
