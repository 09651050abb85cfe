//! Timestamped parameter snapshots with bounded retention.
use crate::error::A2cError;
use anyhow::Result;
use chrono::Local;
use log::{debug, info};
use std::{
    fs,
    path::{Path, PathBuf},
};

const PREFIX: &str = "model-";

/// Manages snapshot files `model-%Y-%m-%d-%H-%M-%S-%f` in a directory.
///
/// Timestamps are zero-padded from the year down to nanoseconds, so the lexicographic
/// order of file names is the order of creation. After every save, only the
/// `n_keep` newest snapshots remain.
#[derive(Debug, Clone)]
pub struct CheckpointManager {
    dir: PathBuf,
    n_keep: usize,
}

impl CheckpointManager {
    /// Constructs a manager, creating `dir` if it does not exist.
    pub fn new(dir: impl AsRef<Path>, n_keep: usize) -> Result<Self> {
        if n_keep == 0 {
            return Err(A2cError::InvalidConfig("n_keep must be positive".to_string()).into());
        }
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir: dir.as_ref().to_path_buf(),
            n_keep,
        })
    }

    /// Directory of the snapshots.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The number of snapshots kept.
    pub fn n_keep(&self) -> usize {
        self.n_keep
    }

    /// Path of a new snapshot, distinct from every existing one.
    pub fn next_path(&self) -> PathBuf {
        loop {
            let name = Local::now().format("model-%Y-%m-%d-%H-%M-%S-%f").to_string();
            let path = self.dir.join(name);
            if !path.exists() {
                return path;
            }
        }
    }

    /// Snapshots in the directory, oldest first.
    pub fn list(&self) -> Result<Vec<PathBuf>> {
        let mut files = fs::read_dir(&self.dir)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<Vec<_>>>()?
            .into_iter()
            .filter(|p| {
                p.is_file()
                    && p.file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.starts_with(PREFIX))
            })
            .collect::<Vec<_>>();
        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(files)
    }

    /// Deletes the oldest snapshots beyond `n_keep` and returns their paths.
    pub fn prune(&self) -> Result<Vec<PathBuf>> {
        let files = self.list()?;
        let n_remove = files.len().saturating_sub(self.n_keep);
        let removed = files.into_iter().take(n_remove).collect::<Vec<_>>();
        for path in removed.iter() {
            fs::remove_file(path)?;
            debug!("Removed old snapshot {:?}", path);
        }
        Ok(removed)
    }

    /// Writes a snapshot with `write` and prunes old ones.
    pub fn save<F>(&self, write: F) -> Result<PathBuf>
    where
        F: FnOnce(&Path) -> Result<()>,
    {
        let path = self.next_path();
        write(&path)?;
        info!("Model saved to {:?}", path);
        self.prune()?;
        Ok(path)
    }

    /// Fails with [`A2cError::CheckpointNotFound`] if `path` is not a file.
    pub fn ensure_exists(path: &Path) -> Result<()> {
        if path.is_file() {
            Ok(())
        } else {
            Err(A2cError::CheckpointNotFound(path.to_path_buf()).into())
        }
    }
}
