use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;

use crate::error::{MirrorError, Result};

/// Checks that `output_dir` exists and is a directory, returning its
/// absolute form.
pub async fn ensure_output_dir(output_dir: &Path) -> Result<PathBuf> {
    let metadata = match fs::metadata(output_dir).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(MirrorError::OutputDirMissing {
                path: output_dir.to_path_buf(),
            })
        }
        Err(source) => {
            return Err(MirrorError::OutputDirUnreadable {
                path: output_dir.to_path_buf(),
                source,
            })
        }
    };

    if !metadata.is_dir() {
        return Err(MirrorError::OutputNotDirectory {
            path: output_dir.to_path_buf(),
        });
    }

    fs::canonicalize(output_dir)
        .await
        .map_err(|source| MirrorError::OutputDirUnreadable {
            path: output_dir.to_path_buf(),
            source,
        })
}

/// Writes files below a single base directory.
#[derive(Debug, Clone)]
pub struct FileManager {
    base_dir: PathBuf,
}

impl FileManager {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Creates the base directory and any missing parents.
    pub async fn create_base_dir(&self) -> io::Result<()> {
        fs::create_dir_all(&self.base_dir).await
    }

    /// Maps a `/`-separated relative name onto a path under the base
    /// directory. Empty, `.` and `..` segments are dropped so the result never
    /// escapes the base directory.
    pub fn path_for(&self, relative: &str) -> PathBuf {
        let mut path = self.base_dir.clone();
        for segment in relative
            .split(['/', '\\'])
            .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        {
            path.push(segment);
        }
        path
    }

    /// Writes `content` to `relative`, creating intermediate directories.
    pub async fn save_file(&self, relative: &str, content: &[u8]) -> io::Result<PathBuf> {
        let file_path = self.path_for(relative);

        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&file_path, content).await?;

        Ok(file_path)
    }
}
