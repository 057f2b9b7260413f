//! Persistence of the manually tracked game set as a flat JSON array.

use std::{
    collections::BTreeSet,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use futures::future::BoxFuture;
use tracing::debug;

use crate::{
    dao::storage::{StorageError, StorageResult},
    state::game::GameId,
};

/// Durable home of the manually requested game ids.
pub trait TrackedGameStore: Send + Sync {
    fn load(&self) -> BoxFuture<'static, StorageResult<BTreeSet<GameId>>>;
    fn save(&self, ids: BTreeSet<GameId>) -> BoxFuture<'static, StorageResult<()>>;
}

/// Stores the id set as a JSON array at a fixed path, rewritten in full on every change.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: Arc<Path>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Arc::from(path.into()),
        }
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TrackedGameStore for JsonFileStore {
    fn load(&self) -> BoxFuture<'static, StorageResult<BTreeSet<GameId>>> {
        let path = self.path.clone();
        Box::pin(async move {
            let contents = match tokio::fs::read_to_string(&path).await {
                Ok(contents) => contents,
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    debug!(path = %path.display(), "no tracked games file yet");
                    return Ok(BTreeSet::new());
                }
                Err(err) => {
                    return Err(StorageError::unavailable(
                        format!("failed to read `{}`", path.display()),
                        err,
                    ));
                }
            };

            if contents.trim().is_empty() {
                return Ok(BTreeSet::new());
            }

            let ids: Vec<GameId> =
                serde_json::from_str(&contents).map_err(|source| StorageError::Corrupt {
                    path: path.to_path_buf(),
                    source,
                })?;
            Ok(ids.into_iter().collect())
        })
    }

    fn save(&self, ids: BTreeSet<GameId>) -> BoxFuture<'static, StorageResult<()>> {
        let path = self.path.clone();
        Box::pin(async move {
            let ids: Vec<GameId> = ids.into_iter().collect();
            let encoded = serde_json::to_vec_pretty(&ids).map_err(|source| {
                StorageError::Corrupt {
                    path: path.to_path_buf(),
                    source,
                }
            })?;

            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await.map_err(|err| {
                    StorageError::unavailable(
                        format!("failed to create `{}`", parent.display()),
                        err,
                    )
                })?;
            }

            let tmp = path.with_extension("json.tmp");
            tokio::fs::write(&tmp, encoded).await.map_err(|err| {
                StorageError::unavailable(format!("failed to write `{}`", tmp.display()), err)
            })?;
            tokio::fs::rename(&tmp, &path).await.map_err(|err| {
                StorageError::unavailable(format!("failed to replace `{}`", path.display()), err)
            })?;

            debug!(path = %path.display(), count = ids.len(), "persisted tracked games");
            Ok(())
        })
    }
}
