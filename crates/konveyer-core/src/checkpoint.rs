//! Run checkpoint: the only state shared across invocations.
//!
//! A small JSON record of the last successfully processed index plus the
//! run configuration it was written under. Rewritten after every completed
//! item; written atomically (temp file + rename) so an interrupt mid-write
//! cannot corrupt it.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

use crate::error::{KonveyerError, Result};

/// The slice of run configuration echoed into the checkpoint file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointConfig {
    pub batch_size: usize,
    pub continue_on_error: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunCheckpoint {
    pub run_id: Uuid,
    /// Index of the last item that reached a terminal success state.
    /// `None` until the first item completes.
    pub last_index: Option<u64>,
    pub config: CheckpointConfig,
}

impl RunCheckpoint {
    pub fn new(config: CheckpointConfig) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            last_index: None,
            config,
        }
    }

    /// First index a resumed run should process.
    pub fn resume_from(&self) -> u64 {
        self.last_index.map(|i| i + 1).unwrap_or(0)
    }

    /// Record a completed index. `last_index` is monotone within a run.
    pub fn advance(&mut self, index: u64) {
        if self.last_index.map_or(true, |last| index > last) {
            self.last_index = Some(index);
        }
    }

    /// Load a checkpoint if one exists at `path`.
    pub async fn load(path: &Path) -> Result<Option<Self>> {
        match fs::read_to_string(path).await {
            Ok(content) => {
                let checkpoint: RunCheckpoint = serde_json::from_str(&content)?;
                debug!(path = %path.display(), last_index = ?checkpoint.last_index, "loaded checkpoint");
                Ok(Some(checkpoint))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Persist atomically: write a sibling temp file, then rename over the
    /// target. Rename within one directory keeps the swap atomic.
    pub async fn save(&self, path: &Path) -> Result<()> {
        let write = async {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent).await?;
                }
            }
            let tmp = tmp_path(path);
            let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
            fs::write(&tmp, json).await?;
            fs::rename(&tmp, path).await
        };
        write.await.map_err(|e| KonveyerError::CheckpointFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Default directory for checkpoint files when the caller does not pick one.
pub fn default_checkpoint_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("konveyer")
}
