use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use spillway_protocol::{canonical_text, chunk_count};

use crate::error::{Result, StoreError};

/// Fixed prefix of every cache id; the suffix is 16 random hex characters.
pub const ID_PREFIX: &str = "resp_";

const ID_SUFFIX_LEN: usize = 16;
const ID_RETRIES: usize = 8;

/// Metadata projection of a cached response: everything but the payload.
///
/// Exactly one metadata record exists per payload record, under the same id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResponseMetadata {
    pub id: String,
    pub tool_name: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub client_label: String,
    pub chunk_count: usize,
    /// Reserved for a future search index; never set by the proxy.
    #[serde(default)]
    pub indexed: bool,
}

/// On-disk TTL cache for parked responses.
///
/// The cache directory is not locked against other processes; concurrent
/// sweeps from a second proxy on the same directory can race and are
/// accepted. Within one process every record is replaced atomically.
#[derive(Debug, Clone)]
pub struct ResponseStore {
    dir: PathBuf,
    ttl: Duration,
    chunk_size: usize,
}

impl ResponseStore {
    /// Opens (creating if needed) a cache directory.
    pub async fn open(dir: &Path, ttl: Duration, chunk_size: usize) -> Result<Self> {
        tokio::fs::create_dir_all(dir).await?;
        Ok(Self {
            dir: dir.to_path_buf(),
            ttl,
            chunk_size,
        })
    }

    /// Persists a payload under a fresh random id and returns its metadata.
    ///
    /// The payload record is written before the metadata record; an id is
    /// never reused or overwritten.
    pub async fn save(
        &self,
        tool_name: &str,
        value: &Value,
        client_label: &str,
    ) -> Result<ResponseMetadata> {
        let id = self.allocate_id().await?;

        let rendered = canonical_text(value);
        let created_at = Utc::now();
        let metadata = ResponseMetadata {
            id: id.clone(),
            tool_name: tool_name.to_string(),
            size_bytes: rendered.len() as u64,
            created_at,
            expires_at: deadline_after(created_at, self.ttl),
            client_label: client_label.to_string(),
            chunk_count: chunk_count(&rendered, self.chunk_size),
            indexed: false,
        };

        write_atomic(&self.payload_path(&id), &serde_json::to_vec(value)?).await?;
        write_atomic(&self.meta_path(&id), &serde_json::to_vec_pretty(&metadata)?).await?;

        Ok(metadata)
    }

    /// Returns the payload for `id`, enforcing expiry lazily: an expired
    /// record is deleted on the spot and reported absent.
    pub async fn get(&self, id: &str) -> Result<Option<Value>> {
        validate_id(id)?;
        let Some(metadata) = self.read_metadata(id).await? else {
            return Ok(None);
        };
        if Utc::now() > metadata.expires_at {
            self.delete(id).await?;
            return Ok(None);
        }

        match tokio::fs::read(self.payload_path(id)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                // Stray metadata without a payload: unreadable, so absent.
                let _ = tokio::fs::remove_file(self.meta_path(id)).await;
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Returns the metadata for `id` without any expiry side effect.
    pub async fn get_metadata(&self, id: &str) -> Result<Option<ResponseMetadata>> {
        validate_id(id)?;
        self.read_metadata(id).await
    }

    /// Removes both records for `id`; `false` if either was already gone.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        validate_id(id)?;
        let payload_removed = remove_if_present(&self.payload_path(id)).await?;
        let meta_removed = remove_if_present(&self.meta_path(id)).await?;
        Ok(payload_removed && meta_removed)
    }

    /// Every parseable metadata record, oldest first. Expired entries are
    /// not filtered; callers may observe stale records between sweeps.
    pub async fn list(&self) -> Result<Vec<ResponseMetadata>> {
        let mut entries = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !name.ends_with(".meta.json") {
                continue;
            }
            match tokio::fs::read(entry.path()).await {
                Ok(bytes) => match serde_json::from_slice::<ResponseMetadata>(&bytes) {
                    Ok(metadata) => entries.push(metadata),
                    Err(err) => log::warn!("skipping unreadable cache record {name}: {err}"),
                },
                Err(err) => log::warn!("skipping unreadable cache record {name}: {err}"),
            }
        }
        entries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(entries)
    }

    /// Extends the deadline to `now + ttl`; never shortens it. `false` for
    /// an unknown id, and no record is created.
    pub async fn refresh(&self, id: &str) -> Result<bool> {
        validate_id(id)?;
        let Some(mut metadata) = self.read_metadata(id).await? else {
            return Ok(false);
        };
        metadata.expires_at = metadata.expires_at.max(deadline_after(Utc::now(), self.ttl));
        write_atomic(&self.meta_path(id), &serde_json::to_vec_pretty(&metadata)?).await?;
        Ok(true)
    }

    /// Deletes every expired record pair and returns how many were removed.
    ///
    /// Also drops orphan payload files left by a crash between the two
    /// record writes; orphans are not counted.
    pub async fn cleanup(&self) -> Result<usize> {
        let now = Utc::now();
        let mut removed = 0usize;
        for metadata in self.list().await? {
            if now > metadata.expires_at {
                self.delete(&metadata.id).await?;
                removed += 1;
            }
        }

        let mut dir = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(id) = name.strip_suffix(".json") else { continue };
            if id.ends_with(".meta") || validate_id(id).is_err() {
                continue;
            }
            if !tokio::fs::try_exists(self.meta_path(id)).await.unwrap_or(false) {
                log::debug!("removing orphan payload record {name}");
                let _ = tokio::fs::remove_file(entry.path()).await;
            }
        }

        Ok(removed)
    }

    /// Chunk size every payload was sized against at save time.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    async fn allocate_id(&self) -> Result<String> {
        for _ in 0..ID_RETRIES {
            let id = random_id()?;
            if !tokio::fs::try_exists(self.meta_path(&id)).await.unwrap_or(false) {
                return Ok(id);
            }
        }
        // 64 random bits colliding eight times in a row means the entropy
        // source is broken; surface that rather than overwrite.
        Err(StoreError::Io(std::io::Error::other(
            "could not allocate a fresh response id",
        )))
    }

    async fn read_metadata(&self, id: &str) -> Result<Option<ResponseMetadata>> {
        match tokio::fs::read(self.meta_path(id)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn payload_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    fn meta_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.meta.json"))
    }
}

fn deadline_after(from: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
    from.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn random_id() -> Result<String> {
    use std::fmt::Write;

    let mut bytes = [0u8; 8];
    getrandom::getrandom(&mut bytes)
        .map_err(|err| StoreError::Io(std::io::Error::other(err)))?;

    let mut id = String::with_capacity(ID_PREFIX.len() + ID_SUFFIX_LEN);
    id.push_str(ID_PREFIX);
    for byte in bytes {
        let _ = write!(id, "{byte:02x}");
    }
    Ok(id)
}

/// Ids are used as file names; reject anything that is not a well-formed
/// `resp_<hex>` token before it can touch the filesystem.
fn validate_id(id: &str) -> Result<()> {
    let suffix = id.strip_prefix(ID_PREFIX).ok_or_else(|| invalid_id(id))?;
    if suffix.len() != ID_SUFFIX_LEN || !suffix.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(invalid_id(id));
    }
    Ok(())
}

fn invalid_id(id: &str) -> StoreError {
    StoreError::InvalidId(id.to_string())
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await
}

async fn remove_if_present(path: &Path) -> Result<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err.into()),
    }
}
