//! JSON file persistence for channel state.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use paychan_core::error::{PaychanError, Result};
use paychan_core::types::{Account, Channel};

/// Current file format version
const VERSION: u8 = 1;

/// On-disk layout.
///
/// ```text
/// { "version": 1, "account": "0x…", "channels": [ … ] }
/// ```
#[derive(Serialize, Deserialize)]
struct StoreFile {
    version: u8,
    account: Account,
    channels: Vec<Channel>,
}

/// Channel-state file owned by one ledger engine.
///
/// Clones share one write lock, so saves through any of them never
/// interleave.
#[derive(Clone, Debug)]
pub struct ChannelStore {
    path: PathBuf,
    account: Account,
    write_lock: Arc<Mutex<()>>,
}

impl ChannelStore {
    /// Creates a store for `account` at `path`. Nothing touches disk until
    /// [`load`](Self::load) or [`save`](Self::save).
    pub fn new(path: impl AsRef<Path>, account: Account) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            account,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads stored channels. A missing file yields no channels.
    #[instrument(skip(self), fields(path = ?self.path))]
    pub async fn load(&self) -> Result<Vec<Channel>> {
        let contents = match fs::read(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No channel store yet");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let file: StoreFile = serde_json::from_slice(&contents)?;
        if file.version != VERSION {
            return Err(PaychanError::Ledger(format!(
                "channel store version mismatch: expected {}, got {}",
                VERSION, file.version
            )));
        }
        if file.account != self.account {
            return Err(PaychanError::Ledger(format!(
                "channel store belongs to {:?}, not {:?}",
                file.account, self.account
            )));
        }

        info!(count = file.channels.len(), "Loaded channels");
        Ok(file.channels)
    }

    /// Replaces the stored channel set.
    ///
    /// Writes to a uniquely named sibling temp file first and renames it
    /// over the target.
    pub async fn save(&self, channels: Vec<Channel>) -> Result<()> {
        let count = channels.len();
        let file = StoreFile {
            version: VERSION,
            account: self.account,
            channels,
        };
        let serialized = serde_json::to_vec_pretty(&file)?;

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let tmp = self
            .path
            .with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));
        fs::write(&tmp, serialized).await?;
        if let Err(e) = fs::rename(&tmp, &self.path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        debug!(count, path = ?self.path, "Saved channels");
        Ok(())
    }
}
