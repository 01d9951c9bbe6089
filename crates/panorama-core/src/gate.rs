//! Authorization in front of every mutation.
//!
//! Each guarded call either performs its change or returns
//! [`Error::Unauthorized`] without touching any store. Reads go straight to
//! the services returned by [`AccessGate::graph`] and [`AccessGate::feedback`],
//! whose mutating methods are not reachable from outside this crate.

use std::sync::Arc;

use panorama_db::Database;
use panorama_types::api::{FeedbackRequest, LoginRequest, NewSceneRequest, RegisterRequest, Session, Submission};
use panorama_types::models::{Feedback, HotspotRatio, Role, Scene, User};
use tracing::{info, warn};

use crate::auth;
use crate::error::{Action, Error, Requirement, Result};
use crate::feedback::FeedbackService;
use crate::graph::{DeletionReport, GraphService};
use crate::identity::IdentityStore;
use crate::storage::BlobStore;

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_USERNAME_LEN: usize = 64;
pub const MAX_MESSAGE_LEN: usize = 255;
pub const FEEDBACK_DATE_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// Outcome of a successful registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub user: User,
    /// The session the caller should continue with. A self-registered visitor
    /// is logged in, and so is the first curator registered from a bootstrap
    /// session; a curator registering someone else keeps their own.
    pub session: Session,
}

#[derive(Clone)]
pub struct AccessGate {
    identities: IdentityStore,
    graph: GraphService,
    feedback: FeedbackService,
}

impl AccessGate {
    pub fn new(identities: IdentityStore, graph: GraphService, feedback: FeedbackService) -> Self {
        Self {
            identities,
            graph,
            feedback,
        }
    }

    /// Wires every service over one database and blob store.
    pub fn from_stores(db: Arc<Database>, blobs: Arc<dyn BlobStore>) -> Self {
        Self::new(
            IdentityStore::new(db.clone()),
            GraphService::new(db.clone(), blobs),
            FeedbackService::new(db),
        )
    }

    pub fn graph(&self) -> &GraphService {
        &self.graph
    }

    pub fn feedback(&self) -> &FeedbackService {
        &self.feedback
    }

    pub fn identities(&self) -> &IdentityStore {
        &self.identities
    }

    /// Role the session acts with. While no account exists at all, an
    /// anonymous session is treated as curator so the first curator can be
    /// registered; nothing is persisted for it.
    pub fn effective_role(&self, session: &Session) -> Result<Option<Role>> {
        if let Some(role) = session.role {
            return Ok(Some(role));
        }
        if session.is_anonymous() && self.identities.is_empty()? {
            return Ok(Some(Role::Curator));
        }
        Ok(None)
    }

    fn require_role(&self, session: &Session, action: Action, role: Role) -> Result<()> {
        if self.effective_role(session)? == Some(role) {
            return Ok(());
        }
        warn!(
            "Denied {} for user {:?} (role {:?})",
            action, session.user_id, session.role
        );
        Err(Error::unauthorized(action, Requirement::Role(role)))
    }

    // -- Accounts --

    pub fn register(&self, session: &Session, req: &RegisterRequest) -> Result<Registration> {
        let (role, bootstrap) = match self.effective_role(session)? {
            Some(Role::Visitor) => {
                warn!("Denied {} for visitor {:?}", Action::Register, session.user_id);
                return Err(Error::unauthorized(Action::Register, Requirement::NotVisitor));
            }
            Some(Role::Curator) => (Role::Curator, session.role.is_none()),
            None => (Role::Visitor, false),
        };

        let username = req.username.trim();
        let reject = |field, reason: &str| Err(Error::invalid(field, reason, Submission::Register(req.clone())));
        if username.is_empty() {
            return reject("username", "must not be empty");
        }
        if username.chars().count() > MAX_USERNAME_LEN {
            return reject("username", "must be at most 64 characters");
        }
        if !auth::is_alphanumeric(&req.password) {
            return reject("password", "must contain only letters and digits");
        }
        if req.password.len() < MIN_PASSWORD_LEN {
            return reject("password", "must be at least 8 characters");
        }

        let salt = auth::generate_salt();
        let hashed = auth::hash(&req.password, &salt);
        let user = self.identities.create(username, role, &hashed, &salt)?;

        let session = match role {
            Role::Visitor => session_for(&user),
            Role::Curator if bootstrap => {
                info!("Bootstrap session continues as curator {} '{}'", user.id, user.name);
                session_for(&user)
            }
            Role::Curator => session.clone(),
        };
        Ok(Registration { user, session })
    }

    pub fn login(&self, req: &LoginRequest) -> Result<Session> {
        let row = self.identities.find_by_name(req.username.trim())?;
        if !auth::authenticate(row.as_ref(), &req.password) {
            warn!("Failed login for '{}'", req.username);
            return Err(Error::InvalidCredentials);
        }
        let user = row.map(|r| r.to_user()).ok_or(Error::InvalidCredentials)?;
        info!("User {} '{}' logged in as {}", user.id, user.name, user.role);
        Ok(session_for(&user))
    }

    // -- Scenes --

    /// First step of a hand-driven publish: a draft row with no path.
    pub fn create_scene(
        &self,
        session: &Session,
        name: &str,
        scene_type: &str,
        parent_id: Option<i64>,
    ) -> Result<i64> {
        self.require_role(session, Action::CreateScene, Role::Curator)?;
        self.graph.create_scene(name, scene_type, parent_id)
    }

    pub fn set_path(&self, session: &Session, scene_id: i64, path: &str) -> Result<()> {
        self.require_role(session, Action::SetScenePath, Role::Curator)?;
        self.graph.set_path(scene_id, path)
    }

    pub fn link_hotspot(
        &self,
        session: &Session,
        parent_id: i64,
        child_id: i64,
        ratio: HotspotRatio,
    ) -> Result<()> {
        self.require_role(session, Action::LinkHotspot, Role::Curator)?;
        self.graph.link_hotspot(parent_id, child_id, ratio)
    }

    pub fn publish_scene(&self, session: &Session, req: &NewSceneRequest) -> Result<Scene> {
        self.require_role(session, Action::PublishScene, Role::Curator)?;
        self.graph.publish_scene(req)
    }

    pub fn delete_scene(&self, session: &Session, scene_id: i64) -> Result<DeletionReport> {
        self.require_role(session, Action::DeleteScene, Role::Curator)?;
        self.graph.delete_scene(scene_id)
    }

    // -- Feedback --

    pub fn add_feedback(&self, session: &Session, req: &FeedbackRequest) -> Result<Feedback> {
        self.require_role(session, Action::AddFeedback, Role::Visitor)?;
        let author = self.resolve_visitor(session, Action::AddFeedback)?;

        let message = req.message.trim();
        if message.is_empty() {
            return Err(Error::invalid("message", "must not be empty", Submission::Feedback(req.clone())));
        }
        if message.chars().count() > MAX_MESSAGE_LEN {
            return Err(Error::invalid(
                "message",
                "must be at most 255 characters",
                Submission::Feedback(req.clone()),
            ));
        }

        let date = chrono::Utc::now().format(FEEDBACK_DATE_FORMAT).to_string();
        self.feedback.add(author.id, message, &date, req.scene_id)
    }

    /// Curators may delete any feedback; a visitor only their own.
    pub fn delete_feedback(&self, session: &Session, feedback_id: i64) -> Result<()> {
        match self.effective_role(session)? {
            Some(Role::Curator) => self.feedback.delete(feedback_id),
            Some(Role::Visitor) => {
                let caller = self.resolve_visitor(session, Action::DeleteFeedback)?;
                let feedback = self.feedback.get(feedback_id)?;
                if feedback.user_id != caller.id {
                    warn!(
                        "Denied {} of feedback {} for non-owner {}",
                        Action::DeleteFeedback,
                        feedback_id,
                        caller.id
                    );
                    return Err(Error::unauthorized(Action::DeleteFeedback, Requirement::Owner));
                }
                self.feedback.delete(feedback_id)
            }
            None => Err(Error::unauthorized(
                Action::DeleteFeedback,
                Requirement::Role(Role::Curator),
            )),
        }
    }

    /// The visitor account behind a session; a role tag alone is not enough.
    fn resolve_visitor(&self, session: &Session, action: Action) -> Result<User> {
        let user = match session.user_id {
            Some(id) => self.identities.find_by_id(id)?,
            None => None,
        };
        match user {
            Some(row) if row.role == Role::Visitor => Ok(row.to_user()),
            _ => {
                warn!("Denied {} for unresolvable identity {:?}", action, session.user_id);
                Err(Error::unauthorized(action, Requirement::Identity))
            }
        }
    }
}

fn session_for(user: &User) -> Session {
    Session {
        user_id: Some(user.id),
        username: Some(user.name.clone()),
        role: Some(user.role),
    }
}
