//! Deterministic snapshot naming and scene persistence.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use sha2::{Digest, Sha256};
use thiserror::Error;

use common::FileFormat;
use scene::graph::Graph;

/// Snapshots land next to the scene, separated from working files.
pub const SNAPSHOT_DIR: &str = "cloud_submit";

#[derive(Debug, Error)]
pub enum PersistError {
    #[error(transparent)]
    Format(#[from] common::FileExtensionError),
    #[error("failed to write snapshot {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// `MMDDYYYYHHMMSS`, zero-padded, no separators.
pub fn timecode(stamp: DateTime<Local>) -> String {
    stamp.format("%m%d%Y%H%M%S").to_string()
}

/// Snapshot path for a scene:
/// `<dir>/cloud_submit/<base>[_<extra>]_<timecode><hash6>.<ext>`, where
/// `hash6` is the last 6 hex chars of a SHA-256 over `base[_extra]_timecode`.
pub fn snapshot_path(
    scene_path: &Path,
    extra_name: Option<&str>,
    stamp: DateTime<Local>,
) -> PathBuf {
    let dir = scene_path.parent().unwrap_or_else(|| Path::new(""));
    let stem = scene_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = scene_path
        .extension()
        .map(|s| s.to_string_lossy().into_owned());

    let mut base = stem;
    if let Some(extra) = extra_name {
        base = format!("{base}_{extra}");
    }

    let code = timecode(stamp);
    let digest = hex::encode(Sha256::digest(format!("{base}_{code}").as_bytes()));
    let hash6 = &digest[digest.len() - 6..];

    let file_name = match ext {
        Some(ext) => format!("{base}_{code}{hash6}.{ext}"),
        None => format!("{base}_{code}{hash6}"),
    };

    dir.join(SNAPSHOT_DIR).join(file_name)
}

pub trait SceneWriter {
    fn save(&self, graph: &Graph, path: &Path) -> Result<(), PersistError>;
}

/// Serializes the scene in the format implied by the target extension,
/// creating missing parent directories.
#[derive(Clone, Copy, Debug, Default)]
pub struct FileSceneWriter;

impl SceneWriter for FileSceneWriter {
    fn save(&self, graph: &Graph, path: &Path) -> Result<(), PersistError> {
        let format = FileFormat::from_file_name(&path.to_string_lossy())?;
        let serialized = graph.serialize(format);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| PersistError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        }

        fs::write(path, serialized).map_err(|source| PersistError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
