use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use tracing::{info, warn};
use uuid::Uuid;

/// Directory (relative to the blob root) holding scene images.
pub const SCENE_DIR: &str = "data";

/// Storage path for a scene image: `data/{scene_id}.{ext}`.
pub fn scene_blob_path(scene_id: i64, extension: &str) -> String {
    format!("{SCENE_DIR}/{scene_id}.{extension}")
}

/// Scene id encoded in a `data/{id}.{ext}` path.
pub fn blob_scene_id(path: &str) -> Option<i64> {
    let file = path.strip_prefix(SCENE_DIR)?.strip_prefix('/')?;
    let (id, _ext) = file.split_once('.')?;
    id.parse().ok()
}

const PARTIAL_SUFFIX: &str = ".part";

/// Temporary sibling written by `save` before the rename.
fn is_partial(file_name: &str) -> bool {
    file_name.starts_with('.') && file_name.ends_with(PARTIAL_SUFFIX)
}

/// Opaque image store. Paths are relative, `/`-separated.
pub trait BlobStore: Send + Sync {
    fn save(&self, bytes: &[u8], path: &str) -> io::Result<()>;
    fn delete(&self, path: &str) -> io::Result<()>;
    fn exists(&self, path: &str) -> bool;
    /// Every stored scene blob, as paths under [`SCENE_DIR`].
    fn list(&self) -> io::Result<Vec<String>>;

    /// Removes temporary files left by interrupted writes once they are at
    /// least `max_age` old. Returns the removed paths.
    fn remove_stale_partials(&self, max_age: Duration) -> io::Result<Vec<String>> {
        let _ = max_age;
        Ok(Vec::new())
    }
}

/// Blob store on the local filesystem.
///
/// Each blob lives at `{root}/{path}`. Writes go to a temporary sibling file
/// first and are renamed into place, so a reader never sees a partial image.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: PathBuf) -> io::Result<Self> {
        fs::create_dir_all(root.join(SCENE_DIR))?;
        info!("Blob storage directory: {}", root.display());
        Ok(Self { root })
    }

    fn resolve(&self, path: &str) -> io::Result<PathBuf> {
        let rel = Path::new(path);
        let safe = !path.is_empty()
            && rel
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(io::Error::new(
                ErrorKind::InvalidInput,
                format!("blob path '{path}' must be relative without '..'"),
            ));
        }
        Ok(self.root.join(rel))
    }
}

impl BlobStore for FsBlobStore {
    fn save(&self, bytes: &[u8], path: &str) -> io::Result<()> {
        let target = self.resolve(path)?;
        if let Some(dir) = target.parent() {
            fs::create_dir_all(dir)?;
        }

        let tmp = target.with_file_name(format!(".{}{PARTIAL_SUFFIX}", Uuid::new_v4()));
        let written = (|| -> io::Result<()> {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(bytes)?;
            file.sync_all()?;
            fs::rename(&tmp, &target)
        })();
        if written.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        written
    }

    /// Missing blobs are not an error.
    fn delete(&self, path: &str) -> io::Result<()> {
        let target = self.resolve(path)?;
        match fs::remove_file(&target) {
            Ok(()) => {
                info!("Deleted blob {}", path);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("Blob {} already gone", path);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn exists(&self, path: &str) -> bool {
        self.resolve(path).map(|p| p.is_file()).unwrap_or(false)
    }

    fn list(&self) -> io::Result<Vec<String>> {
        let mut paths = Vec::new();
        for entry in fs::read_dir(self.root.join(SCENE_DIR))? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                // in-flight writes
                if name.starts_with('.') {
                    continue;
                }
                paths.push(format!("{SCENE_DIR}/{name}"));
            }
        }
        paths.sort();
        Ok(paths)
    }

    fn remove_stale_partials(&self, max_age: Duration) -> io::Result<Vec<String>> {
        let mut removed = Vec::new();
        for entry in fs::read_dir(self.root.join(SCENE_DIR))? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !is_partial(&name) || !entry.file_type()?.is_file() {
                continue;
            }
            let age = entry
                .metadata()?
                .modified()?
                .elapsed()
                .unwrap_or(Duration::ZERO);
            if age < max_age {
                continue;
            }
            match fs::remove_file(entry.path()) {
                Ok(()) => removed.push(format!("{SCENE_DIR}/{name}")),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove partial blob {}: {}", name, e),
            }
        }
        removed.sort();
        Ok(removed)
    }
}
