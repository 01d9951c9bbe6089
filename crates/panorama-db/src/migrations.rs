use rusqlite::Connection;
use tracing::info;

use crate::DbError;

pub fn run(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            BEGIN;

            CREATE TABLE users (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                name            TEXT NOT NULL UNIQUE,
                role            TEXT NOT NULL CHECK (role IN ('curator', 'visitor')),
                hashed_password TEXT NOT NULL,
                salt            TEXT NOT NULL
            );

            -- path stays NULL until the image blob is written (draft)
            CREATE TABLE scenes (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                name        TEXT NOT NULL,
                path        TEXT,
                type        TEXT NOT NULL,
                parent_id   INTEGER REFERENCES scenes(id)
            );

            CREATE INDEX idx_scenes_parent ON scenes(parent_id);

            -- id is the owning parent scene; a scene is the target of at most one hotspot
            CREATE TABLE hotspot_edges (
                id          INTEGER NOT NULL REFERENCES scenes(id),
                child_id    INTEGER NOT NULL PRIMARY KEY REFERENCES scenes(id),
                x_ratio     REAL NOT NULL,
                y_ratio     REAL NOT NULL
            );

            CREATE INDEX idx_hotspot_edges_parent ON hotspot_edges(id);

            CREATE TABLE feedback (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id     INTEGER NOT NULL REFERENCES users(id),
                message     TEXT NOT NULL,
                date        TEXT NOT NULL,
                scene_id    INTEGER NOT NULL REFERENCES scenes(id)
            );

            CREATE INDEX idx_feedback_scene ON feedback(scene_id);

            INSERT INTO schema_version (version) VALUES (1);

            COMMIT;
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
