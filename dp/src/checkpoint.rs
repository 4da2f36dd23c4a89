//! CheckpointStore - full-snapshot result persistence
//!
//! The map person id -> WorldInteraction is rewritten after every person so
//! a crashed run can resume from the last completed one. Writers are
//! serialised by a mutex and each snapshot lands via temp file and rename.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::domain::WorldInteraction;

/// Person id -> that person's results
pub type Snapshot = BTreeMap<String, WorldInteraction>;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("failed to read checkpoint {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write checkpoint {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("checkpoint {path} is malformed: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode checkpoint: {0}")]
    Encode(#[from] serde_json::Error),
}

pub struct CheckpointStore {
    path: PathBuf,
    snapshot: Mutex<Snapshot>,
}

impl CheckpointStore {
    /// Start an empty checkpoint at `path`; the file is written on first record
    pub fn fresh(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        debug!(?path, "CheckpointStore::fresh: called");
        Self {
            path,
            snapshot: Mutex::new(Snapshot::new()),
        }
    }

    /// Continue from an existing checkpoint, or start empty if there is none
    pub fn resume(path: impl Into<PathBuf>) -> Result<Self, CheckpointError> {
        let path = path.into();
        debug!(?path, "CheckpointStore::resume: called");
        let snapshot = if path.exists() { read_snapshot(&path)? } else { Snapshot::new() };
        info!("Resuming with {} completed persons from {}", snapshot.len(), path.display());
        Ok(Self {
            path,
            snapshot: Mutex::new(snapshot),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn contains(&self, person_id: &str) -> bool {
        self.snapshot.lock().await.contains_key(person_id)
    }

    pub async fn len(&self) -> usize {
        self.snapshot.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.snapshot.lock().await.is_empty()
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.snapshot.lock().await.clone()
    }

    /// Add one person's results and rewrite the snapshot
    pub async fn record(&self, person_id: &str, interaction: WorldInteraction) -> Result<(), CheckpointError> {
        debug!(person_id, days = interaction.len(), "CheckpointStore::record: called");
        let mut snapshot = self.snapshot.lock().await;
        snapshot.insert(person_id.to_string(), interaction);
        let body = serde_json::to_vec_pretty(&*snapshot)?;
        write_atomic(&self.path, &body).await?;
        debug!(persons = snapshot.len(), "CheckpointStore::record: snapshot written");
        Ok(())
    }
}

/// Load a checkpoint file
pub fn read_snapshot(path: &Path) -> Result<Snapshot, CheckpointError> {
    let body = std::fs::read_to_string(path).map_err(|source| CheckpointError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&body).map_err(|source| CheckpointError::Format {
        path: path.to_path_buf(),
        source,
    })
}

async fn write_atomic(path: &Path, body: &[u8]) -> Result<(), CheckpointError> {
    let write_err = |source: std::io::Error| CheckpointError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, body).await.map_err(write_err)?;
    tokio::fs::rename(&tmp, path).await.map_err(write_err)?;
    Ok(())
}
