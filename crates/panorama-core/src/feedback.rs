use std::sync::Arc;

use panorama_db::Database;
use panorama_types::models::Feedback;
use tracing::info;

use crate::error::{Entity, Error, Result};

/// Visitor comments on scenes. Append-only apart from single-row removal and
/// the cascade that runs when a scene is deleted.
#[derive(Clone)]
pub struct FeedbackService {
    db: Arc<Database>,
}

impl FeedbackService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Appends to an existing scene. Bounding the message is the caller's job.
    pub fn add(&self, user_id: i64, message: &str, date: &str, scene_id: i64) -> Result<Feedback> {
        let id = self
            .db
            .add_feedback(user_id, message, date, scene_id)?
            .ok_or_else(|| Error::not_found(Entity::Scene, scene_id))?;
        info!("User {} left feedback {} on scene {}", user_id, id, scene_id);
        Ok(Feedback {
            id,
            user_id,
            message: message.to_string(),
            date: date.to_string(),
            scene_id,
        })
    }

    /// Oldest first.
    pub fn list_for_scene(&self, scene_id: i64) -> Result<Vec<Feedback>> {
        Ok(self.db.get_feedback_for_scene(scene_id)?)
    }

    pub fn get(&self, feedback_id: i64) -> Result<Feedback> {
        self.db
            .get_feedback(feedback_id)?
            .ok_or_else(|| Error::not_found(Entity::Feedback, feedback_id))
    }

    pub fn delete(&self, feedback_id: i64) -> Result<()> {
        if !self.db.delete_feedback(feedback_id)? {
            return Err(Error::not_found(Entity::Feedback, feedback_id));
        }
        info!("Deleted feedback {}", feedback_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Fixture, scene_request};
    use panorama_types::models::Role;

    #[test]
    fn add_list_get_delete() {
        let fx = Fixture::new();
        let user = fx.identities().create("vis", Role::Visitor, "h", "s").unwrap();
        let scene = fx.graph().publish_scene(&scene_request("A", None, None)).unwrap();
        let feedback = fx.feedback();

        let a = feedback.add(user.id, "lovely", "2024/05/01 09:00:00", scene.id).unwrap();
        let b = feedback.add(user.id, "again", "2024/05/01 09:01:00", scene.id).unwrap();
        assert_eq!(feedback.get(a.id).unwrap(), a);
        assert_eq!(feedback.list_for_scene(scene.id).unwrap(), vec![a.clone(), b.clone()]);

        feedback.delete(a.id).unwrap();
        assert_eq!(feedback.list_for_scene(scene.id).unwrap(), vec![b]);
        assert!(matches!(
            feedback.delete(a.id),
            Err(Error::NotFound { entity: Entity::Feedback, .. })
        ));
        assert!(matches!(feedback.get(a.id), Err(Error::NotFound { .. })));
    }

    #[test]
    fn feedback_on_unknown_or_deleted_scene_is_not_found() {
        let fx = Fixture::new();
        let user = fx.identities().create("vis", Role::Visitor, "h", "s").unwrap();
        let err = fx.feedback().add(user.id, "hello?", "2024/05/01 09:00:00", 404).unwrap_err();
        assert!(matches!(err, Error::NotFound { entity: Entity::Scene, .. }));

        let scene = fx.graph().publish_scene(&scene_request("A", None, None)).unwrap();
        fx.graph().delete_scene(scene.id).unwrap();
        let err = fx.feedback().add(user.id, "too late", "2024/05/01 09:00:00", scene.id).unwrap_err();
        assert!(matches!(err, Error::NotFound { entity: Entity::Scene, .. }));
        assert!(err.is_recoverable());
    }
}
