//! Scene graph core: stories made of scenes linked by image hotspots,
//! curated by curators and commented on by visitors.
//!
//! [`AccessGate`] is the entry point for every mutation; it authorizes the
//! caller's [`Session`](panorama_types::api::Session) and then delegates to
//! [`GraphService`], [`FeedbackService`] and [`IdentityStore`].

pub mod arena;
pub mod auth;
pub mod error;
pub mod feedback;
pub mod gate;
pub mod graph;
pub mod identity;
pub mod storage;

pub use arena::SceneArena;
pub use error::{Error, Result};
pub use feedback::FeedbackService;
pub use gate::{AccessGate, Registration};
pub use graph::{DeletionReport, GraphService};
pub use identity::IdentityStore;
pub use storage::{BlobStore, FsBlobStore};
