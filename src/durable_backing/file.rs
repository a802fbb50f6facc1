//! File-backed durable slots: one file per key under a directory

use super::DurableBacking;
use crate::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Extension of committed records
const RECORD_EXT: &str = "txt";

/// File-per-key durable backing
pub struct FileBacking {
    dir: PathBuf,
    tmp_seq: AtomicU64,
}

impl FileBacking {
    /// Open (and create if needed) a backing directory
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;

        tracing::debug!(dir = %dir.display(), "File backing opened");

        Ok(Self {
            dir,
            tmp_seq: AtomicU64::new(0),
        })
    }

    /// Backing directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, key: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", escape_key(key), RECORD_EXT))
    }

    /// Temporary path unique across processes sharing the directory
    fn tmp_path(&self, key: &str) -> PathBuf {
        let seq = self.tmp_seq.fetch_add(1, Ordering::Relaxed);
        self.dir.join(format!(
            ".{}.{}.{}.tmp",
            escape_key(key),
            std::process::id(),
            seq
        ))
    }
}

#[async_trait]
impl DurableBacking for FileBacking {
    async fn load(&self, key: &str) -> Result<Option<String>> {
        let path = self.record_path(key);

        match fs::read_to_string(&path).await {
            Ok(raw) => {
                let value = raw.trim();
                if value.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(value.to_string()))
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn store(&self, key: &str, value: &str) -> Result<()> {
        let path = self.record_path(key);
        let tmp_path = self.tmp_path(key);

        // Write-then-rename so readers never observe a partial record
        let write_result = async {
            let mut file = fs::File::create(&tmp_path).await?;
            file.write_all(value.as_bytes()).await?;
            file.sync_all().await?;
            fs::rename(&tmp_path, &path).await
        }
        .await;

        if let Err(e) = write_result {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }

        tracing::trace!(key = %key, path = %path.display(), "Record stored");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.record_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Map a key onto a file-name-safe string.
///
/// `[a-z0-9_.-]` pass through; every other byte becomes `%XX`. A leading dot
/// is escaped too so records never collide with temporary files.
fn escape_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for (i, b) in key.bytes().enumerate() {
        let safe = b.is_ascii_lowercase()
            || b.is_ascii_digit()
            || b == b'_'
            || b == b'-'
            || (b == b'.' && i > 0);
        if safe {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{:02X}", b));
        }
    }
    out
}
