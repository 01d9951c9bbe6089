use panorama_types::models::{HotspotRatio, Scene, SceneEntry};
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::debug;

use crate::error::is_key_violation;
use crate::models::{PurgeCounts, SceneLinkRow};
use crate::{Database, DbError};

const ENTRY_COLUMNS: &str = "s.id, s.name, s.path, s.type, s.parent_id, h.x_ratio, h.y_ratio
     FROM scenes s
     LEFT JOIN hotspot_edges h ON h.child_id = s.id";

impl Database {
    pub fn get_scene(&self, id: i64) -> Result<Option<Scene>, DbError> {
        self.with_conn(|conn| find_scene(conn, id))
    }

    pub fn list_roots(&self) -> Result<Vec<SceneEntry>, DbError> {
        self.with_conn(root_entries)
    }

    pub fn list_children(&self, parent_id: i64) -> Result<Vec<SceneEntry>, DbError> {
        self.with_conn(|conn| child_entries(conn, parent_id))
    }
}

// -- Scenes --

/// Inserts a draft scene (no path yet) and returns its id.
pub fn insert_scene(
    conn: &Connection,
    name: &str,
    scene_type: &str,
    parent_id: Option<i64>,
) -> Result<i64, DbError> {
    conn.execute(
        "INSERT INTO scenes (name, path, type, parent_id) VALUES (?1, NULL, ?2, ?3)",
        params![name, scene_type, parent_id],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Returns whether the scene existed.
pub fn set_scene_path(conn: &Connection, id: i64, path: &str) -> Result<bool, DbError> {
    let n = conn.execute(
        "UPDATE scenes SET path = ?1 WHERE id = ?2",
        params![path, id],
    )?;
    Ok(n > 0)
}

pub fn find_scene(conn: &Connection, id: i64) -> Result<Option<Scene>, DbError> {
    let row = conn
        .query_row(
            "SELECT id, name, path, type, parent_id FROM scenes WHERE id = ?1",
            [id],
            scene_from_row,
        )
        .optional()?;
    Ok(row)
}

pub fn find_scene_entry(conn: &Connection, id: i64) -> Result<Option<SceneEntry>, DbError> {
    let sql = format!("SELECT {ENTRY_COLUMNS} WHERE s.id = ?1");
    let row = conn.query_row(&sql, [id], entry_from_row).optional()?;
    Ok(row)
}

pub fn root_entries(conn: &Connection) -> Result<Vec<SceneEntry>, DbError> {
    let sql = format!("SELECT {ENTRY_COLUMNS} WHERE s.parent_id IS NULL ORDER BY s.id ASC");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], entry_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn child_entries(conn: &Connection, parent_id: i64) -> Result<Vec<SceneEntry>, DbError> {
    let sql = format!("SELECT {ENTRY_COLUMNS} WHERE s.parent_id = ?1 ORDER BY s.id ASC");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([parent_id], entry_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Every scene's id, parent and path, in id order.
pub fn scene_links(conn: &Connection) -> Result<Vec<SceneLinkRow>, DbError> {
    let mut stmt = conn.prepare("SELECT id, parent_id, path FROM scenes ORDER BY id ASC")?;
    let rows = stmt
        .query_map([], |row| {
            Ok(SceneLinkRow {
                id: row.get(0)?,
                parent_id: row.get(1)?,
                path: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn scene_from_row(row: &Row<'_>) -> rusqlite::Result<Scene> {
    Ok(Scene {
        id: row.get(0)?,
        name: row.get(1)?,
        path: row.get(2)?,
        scene_type: row.get(3)?,
        parent_id: row.get(4)?,
    })
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<SceneEntry> {
    let x: Option<f64> = row.get(5)?;
    let y: Option<f64> = row.get(6)?;
    Ok(SceneEntry {
        scene: scene_from_row(row)?,
        hotspot: x.zip(y).map(|(x, y)| HotspotRatio::new(x, y)),
    })
}

// -- Hotspots --

pub fn insert_hotspot(
    conn: &Connection,
    parent_id: i64,
    child_id: i64,
    ratio: HotspotRatio,
) -> Result<(), DbError> {
    conn.execute(
        "INSERT INTO hotspot_edges (id, child_id, x_ratio, y_ratio) VALUES (?1, ?2, ?3, ?4)",
        params![parent_id, child_id, ratio.x_ratio, ratio.y_ratio],
    )
    .map_err(|e| {
        if is_key_violation(&e) {
            DbError::HotspotTaken(child_id)
        } else {
            e.into()
        }
    })?;
    Ok(())
}

// -- Cascade --

/// Removes one scene row plus every hotspot edge touching it (either end) and
/// all feedback on it. Its children must already be gone.
pub fn purge_scene(conn: &Connection, id: i64) -> Result<PurgeCounts, DbError> {
    let feedback = conn.execute("DELETE FROM feedback WHERE scene_id = ?1", [id])?;
    let edges = conn.execute(
        "DELETE FROM hotspot_edges WHERE id = ?1 OR child_id = ?1",
        [id],
    )?;
    conn.execute("DELETE FROM scenes WHERE id = ?1", [id])?;

    debug!(
        "Purged scene {}: {} edges, {} feedback rows",
        id, edges, feedback
    );
    Ok(PurgeCounts { edges, feedback })
}
