use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use panorama_db::Database;
use panorama_db::graph as store;
use panorama_types::api::{NewSceneRequest, Submission};
use panorama_types::models::{HotspotRatio, Scene, SceneDetail, SceneEntry};
use rusqlite::Connection;
use tracing::{info, warn};

use crate::arena::SceneArena;
use crate::error::{Entity, Error, Result};
use crate::storage::{BlobStore, SCENE_DIR, blob_scene_id, scene_blob_path};

const MAX_EXTENSION_LEN: usize = 8;

/// Temporary upload files younger than this may still be in use.
const STALE_PARTIAL_AGE: Duration = Duration::from_secs(3600);

/// What a cascading delete removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletionReport {
    /// Deleted scene ids, every scene after all of its descendants.
    pub scenes: Vec<i64>,
    pub edges: usize,
    pub feedback: usize,
    pub blobs_deleted: usize,
    /// Published scenes whose blob was already gone or could not be removed.
    pub blobs_missing: usize,
}

/// Tree queries, scene creation and cascading deletion over the scene,
/// hotspot and feedback tables plus the blob store.
///
/// Mutations are crate-private; outside callers go through
/// [`AccessGate`](crate::AccessGate).
#[derive(Clone)]
pub struct GraphService {
    db: Arc<Database>,
    blobs: Arc<dyn BlobStore>,
}

impl GraphService {
    pub fn new(db: Arc<Database>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { db, blobs }
    }

    // -- Queries --

    /// Story roots with their own hotspot (if any), id ascending.
    pub fn list_roots(&self) -> Result<Vec<SceneEntry>> {
        Ok(self.db.list_roots()?)
    }

    pub fn list_children(&self, scene_id: i64) -> Result<Vec<SceneEntry>> {
        Ok(self.db.list_children(scene_id)?)
    }

    pub fn get_scene(&self, scene_id: i64) -> Result<Scene> {
        self.db
            .get_scene(scene_id)?
            .ok_or_else(|| Error::not_found(Entity::Scene, scene_id))
    }

    /// Scene, its children and its feedback, newest feedback first.
    pub fn scene_detail(&self, scene_id: i64) -> Result<SceneDetail> {
        self.db.with_conn(|conn| {
            let scene = store::find_scene_entry(conn, scene_id)?
                .ok_or_else(|| Error::not_found(Entity::Scene, scene_id))?;
            let children = store::child_entries(conn, scene_id)?;
            let mut feedback = panorama_db::queries::feedback_for_scene(conn, scene_id)?;
            feedback.reverse();
            Ok(SceneDetail {
                scene,
                children,
                feedback,
            })
        })
    }

    /// Snapshot of the whole forest's shape.
    pub fn forest(&self) -> Result<SceneArena> {
        let links = self.db.with_conn(store::scene_links)?;
        Ok(SceneArena::from_links(links))
    }

    // -- Creation --

    /// Inserts a draft scene and returns its id. The scene has no path until
    /// [`set_path`](Self::set_path) runs; prefer [`publish_scene`](Self::publish_scene),
    /// which does both steps atomically.
    pub(crate) fn create_scene(&self, name: &str, scene_type: &str, parent_id: Option<i64>) -> Result<i64> {
        let id = self.db.transaction(|tx| {
            require_parent(tx, parent_id)?;
            Ok::<_, Error>(store::insert_scene(tx, name, scene_type, parent_id)?)
        })?;
        info!("Created draft scene {} '{}'", id, name);
        Ok(id)
    }

    pub(crate) fn set_path(&self, scene_id: i64, path: &str) -> Result<()> {
        self.db.transaction(|tx| {
            if store::set_scene_path(tx, scene_id, path)? {
                Ok(())
            } else {
                Err(Error::not_found(Entity::Scene, scene_id))
            }
        })
    }

    /// Adds the edge `parent_id -> child_id`. The child must already hang
    /// under `parent_id`, and may be the target of only one hotspot.
    pub(crate) fn link_hotspot(&self, parent_id: i64, child_id: i64, ratio: HotspotRatio) -> Result<()> {
        self.db.transaction(|tx| link_in(tx, parent_id, child_id, ratio))?;
        info!(
            "Linked hotspot {} -> {} at ({}, {})",
            parent_id, child_id, ratio.x_ratio, ratio.y_ratio
        );
        Ok(())
    }

    /// Creates a published scene in one transaction: insert the row, write
    /// the image to `data/{id}.{ext}`, record the path, and link the hotspot
    /// from the parent if one was given. On any failure nothing is committed
    /// and a blob that was already written is removed before the writer lock
    /// is released.
    pub(crate) fn publish_scene(&self, req: &NewSceneRequest) -> Result<Scene> {
        validate_new_scene(req)?;

        let scene = self.db.transaction(|tx| {
            let mut written = None;
            let result = self.publish_in(tx, req, &mut written);
            // A rolled-back id is handed out again by the next insert, so the
            // blob must go while no other writer can claim it.
            if let (Err(_), Some(path)) = (&result, written) {
                if let Err(cleanup) = self.blobs.delete(&path) {
                    warn!("Could not remove blob {} after failed publish: {}", path, cleanup);
                }
            }
            result
        })?;

        info!(
            "Published scene {} '{}' under {:?}",
            scene.id, scene.name, scene.parent_id
        );
        Ok(scene)
    }

    fn publish_in(&self, conn: &Connection, req: &NewSceneRequest, written: &mut Option<String>) -> Result<Scene> {
        let title = req.title.trim();
        let scene_type = req.scene_type.trim();

        require_parent(conn, req.parent_id)?;
        let id = store::insert_scene(conn, title, scene_type, req.parent_id)?;

        let path = scene_blob_path(id, &req.extension);
        self.blobs
            .save(&req.image, &path)
            .map_err(|source| Error::Blob {
                path: path.clone(),
                source,
            })?;
        *written = Some(path.clone());
        store::set_scene_path(conn, id, &path)?;

        if let (Some(parent_id), Some(ratio)) = (req.parent_id, req.hotspot) {
            link_in(conn, parent_id, id, ratio)?;
        }

        Ok(Scene {
            id,
            name: title.to_string(),
            path: Some(path),
            scene_type: scene_type.to_string(),
            parent_id: req.parent_id,
        })
    }

    // -- Deletion --

    /// Deletes `scene_id` and every transitive descendant: scene rows, hotspot
    /// edges touching any of them, and their feedback, in one transaction.
    /// Blobs are removed after the commit, best-effort.
    pub(crate) fn delete_scene(&self, scene_id: i64) -> Result<DeletionReport> {
        let (mut report, paths) = self.db.transaction(|tx| -> Result<(DeletionReport, Vec<String>)> {
            let arena = SceneArena::from_links(store::scene_links(tx)?);
            if !arena.contains(scene_id) {
                return Err(Error::not_found(Entity::Scene, scene_id));
            }

            let order = arena.subtree_post_order(scene_id);
            let mut report = DeletionReport::default();
            let mut paths = Vec::new();
            for &id in &order {
                let counts = store::purge_scene(tx, id)?;
                report.edges += counts.edges;
                report.feedback += counts.feedback;
                if let Some(path) = arena.get(id).and_then(|n| n.path.clone()) {
                    paths.push(path);
                }
            }
            report.scenes = order;
            Ok((report, paths))
        })?;

        for path in paths {
            if !self.blobs.exists(&path) {
                warn!("Blob {} missing while deleting scene tree {}", path, scene_id);
                report.blobs_missing += 1;
                continue;
            }
            match self.blobs.delete(&path) {
                Ok(()) => report.blobs_deleted += 1,
                Err(e) => {
                    warn!("Failed to delete blob {}: {}", path, e);
                    report.blobs_missing += 1;
                }
            }
        }

        info!(
            "Deleted scene tree {}: {} scenes, {} edges, {} feedback, {} blobs",
            scene_id,
            report.scenes.len(),
            report.edges,
            report.feedback,
            report.blobs_deleted
        );
        Ok(report)
    }

    /// Removes stored blobs no scene can ever point at, e.g. left behind by a
    /// crash between a blob write and its commit, plus stale temporary
    /// upload files. Runs under the writer lock so an in-flight publish is
    /// never mistaken for an orphan.
    ///
    /// A blob survives while its scene row exists and is either still a
    /// draft (the blob may be waiting for `set_path`) or published at exactly
    /// that path.
    pub fn sweep_orphan_blobs(&self) -> Result<Vec<String>> {
        self.db.transaction(|tx| {
            let scenes: HashMap<i64, Option<String>> = store::scene_links(tx)?
                .into_iter()
                .map(|link| (link.id, link.path))
                .collect();

            let stored = self.blobs.list().map_err(|source| Error::Blob {
                path: SCENE_DIR.to_string(),
                source,
            })?;

            let mut removed = Vec::new();
            for path in stored.into_iter().filter(|p| is_orphan(p, &scenes)) {
                match self.blobs.delete(&path) {
                    Ok(()) => removed.push(path),
                    Err(e) => warn!("Failed to delete orphan blob {}: {}", path, e),
                }
            }
            match self.blobs.remove_stale_partials(STALE_PARTIAL_AGE) {
                Ok(partials) => removed.extend(partials),
                Err(e) => warn!("Failed to clear partial uploads: {}", e),
            }
            Ok(removed)
        })
    }
}

fn is_orphan(path: &str, scenes: &HashMap<i64, Option<String>>) -> bool {
    match blob_scene_id(path).and_then(|id| scenes.get(&id)) {
        None => true,
        Some(None) => false,
        Some(Some(published)) => published != path,
    }
}

fn require_parent(conn: &Connection, parent_id: Option<i64>) -> Result<()> {
    if let Some(parent_id) = parent_id {
        if store::find_scene(conn, parent_id)?.is_none() {
            return Err(Error::not_found(Entity::Scene, parent_id));
        }
    }
    Ok(())
}

fn link_in(conn: &Connection, parent_id: i64, child_id: i64, ratio: HotspotRatio) -> Result<()> {
    let submission = || Submission::Hotspot {
        parent_id,
        child_id,
        ratio,
    };

    if !ratio.is_valid() {
        return Err(Error::invalid("hotspot", "ratios must lie within [0, 1]", submission()));
    }
    if store::find_scene(conn, parent_id)?.is_none() {
        return Err(Error::not_found(Entity::Scene, parent_id));
    }
    let child = store::find_scene(conn, child_id)?
        .ok_or_else(|| Error::not_found(Entity::Scene, child_id))?;
    if child.parent_id != Some(parent_id) {
        return Err(Error::invalid(
            "hotspot",
            format!("scene {child_id} is not a child of scene {parent_id}"),
            submission(),
        ));
    }

    store::insert_hotspot(conn, parent_id, child_id, ratio)?;
    Ok(())
}

fn validate_new_scene(req: &NewSceneRequest) -> Result<()> {
    let reject = |field, reason: &str| Err(Error::invalid(field, reason, Submission::Scene(req.clone())));

    if req.title.trim().is_empty() {
        return reject("title", "must not be empty");
    }
    if req.scene_type.trim().is_empty() {
        return reject("type", "must not be empty");
    }
    if req.image.is_empty() {
        return reject("image", "must not be empty");
    }
    let ext_ok = !req.extension.is_empty()
        && req.extension.len() <= MAX_EXTENSION_LEN
        && req.extension.chars().all(|c| c.is_ascii_alphanumeric());
    if !ext_ok {
        return reject("extension", "must be 1-8 ASCII letters or digits");
    }
    if let Some(ratio) = req.hotspot {
        if req.parent_id.is_none() {
            return reject("hotspot", "a root scene cannot be a hotspot target");
        }
        if !ratio.is_valid() {
            return reject("hotspot", "ratios must lie within [0, 1]");
        }
    }
    Ok(())
}
