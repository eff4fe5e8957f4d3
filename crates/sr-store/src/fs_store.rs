use std::{
    fmt,
    fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use sr_contracts::ShardContractRecord;
use tempfile::NamedTempFile;

use crate::codec::{sha256, to_canonical_cbor};
use crate::{
    ContractStore, ReadPreference, RecordId, ShardListing, StoreError, StoreResult, UnreadableShard,
    io_error,
};

/// Filesystem-backed store rooted at `<root>/.contracts`.
///
/// Each shard gets a directory named by the SHA-256 of its hash; each farmer's
/// record is one canonical CBOR file named by its [`RecordId`]. Files are
/// written to a temp file and moved into place without clobbering, so a
/// record is either fully present or absent.
#[derive(Clone)]
pub struct FsStore {
    shards_dir: PathBuf,
}

impl fmt::Debug for FsStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FsStore")
            .field("shards_dir", &self.shards_dir)
            .finish()
    }
}

impl FsStore {
    pub fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let shards_dir = root.as_ref().join(".contracts").join("shards");
        fs::create_dir_all(&shards_dir).map_err(|e| io_error(&shards_dir, e))?;
        Ok(Self { shards_dir })
    }

    fn shard_dir(&self, hash: &str) -> PathBuf {
        self.shards_dir.join(hex::encode(sha256(hash.as_bytes())))
    }

    fn put_blocking(&self, record: &ShardContractRecord) -> StoreResult<RecordId> {
        record.validate()?;
        let id = RecordId::for_record(record)?;
        let bytes = to_canonical_cbor(record)?;

        let dir = self.shard_dir(&record.hash);
        fs::create_dir_all(&dir).map_err(|e| io_error(&dir, e))?;
        let path = dir.join(id.file_name());

        let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| io_error(&dir, e))?;
        tmp.write_all(&bytes).map_err(|e| io_error(tmp.path(), e))?;
        tmp.as_file().sync_all().map_err(|e| io_error(tmp.path(), e))?;
        match tmp.persist_noclobber(&path) {
            Ok(_) => {
                log::debug!("wrote contract {id} to {}", path.display());
                Ok(id)
            }
            Err(err) if err.error.kind() == ErrorKind::AlreadyExists => Err(StoreError::Duplicate {
                hash: record.hash.clone(),
                farmer_id: record.farmer_id().to_string(),
            }),
            Err(err) => Err(io_error(&path, err.error)),
        }
    }

    fn read_shard(&self, hash: &str) -> StoreResult<Vec<ShardContractRecord>> {
        let dir = self.shard_dir(hash);
        let mut records = Vec::new();
        for (id, path) in record_files(&dir)? {
            let record = read_record(&path)?;
            if record.hash != hash || RecordId::for_record(&record)? != id {
                return Err(StoreError::Corrupt {
                    path,
                    reason: format!(
                        "record for shard '{}' farmer '{}' does not match its file name",
                        record.hash,
                        record.farmer_id()
                    ),
                });
            }
            records.push(record);
        }
        if records.is_empty() {
            return Err(StoreError::NotFound {
                hash: hash.to_string(),
            });
        }
        records.sort_by(|a, b| a.farmer_id().cmp(b.farmer_id()));
        Ok(records)
    }

    fn list_hashes_blocking(&self) -> StoreResult<ShardListing> {
        let entries = fs::read_dir(&self.shards_dir).map_err(|e| io_error(&self.shards_dir, e))?;
        let mut listing = ShardListing::default();
        for entry in entries {
            let entry = entry.map_err(|e| io_error(&self.shards_dir, e))?;
            let dir = entry.path();
            if !dir.is_dir() {
                continue;
            }
            let mut last_error = None;
            let mut hash = None;
            for (_, path) in record_files(&dir)? {
                match read_record(&path) {
                    Ok(record) => {
                        hash = Some(record.hash);
                        break;
                    }
                    Err(err) => last_error = Some(err),
                }
            }
            match (hash, last_error) {
                (Some(hash), _) => listing.hashes.push(hash),
                (None, Some(err)) => {
                    log::warn!("no readable record in shard directory {}: {err}", dir.display());
                    listing.unreadable.push(UnreadableShard {
                        location: dir,
                        reason: err.to_string(),
                    });
                }
                (None, None) => {}
            }
        }
        listing.hashes.sort();
        listing.unreadable.sort_by(|a, b| a.location.cmp(&b.location));
        Ok(listing)
    }

    async fn blocking<T, F>(&self, op: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(FsStore) -> StoreResult<T> + Send + 'static,
    {
        let this = self.clone();
        tokio::task::spawn_blocking(move || op(this))
            .await
            .map_err(|e| StoreError::Unavailable(format!("store task failed: {e}")))?
    }
}

/// Record files in a shard directory, sorted by id. Temp files are skipped.
fn record_files(dir: &Path) -> StoreResult<Vec<(RecordId, PathBuf)>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(io_error(dir, err)),
    };
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| io_error(dir, e))?;
        let name = entry.file_name();
        if let Some(id) = name.to_str().and_then(RecordId::from_file_name) {
            files.push((id, entry.path()));
        }
    }
    files.sort();
    Ok(files)
}

fn read_record(path: &Path) -> StoreResult<ShardContractRecord> {
    let bytes = fs::read(path).map_err(|e| io_error(path, e))?;
    serde_cbor::from_slice(&bytes).map_err(|e| StoreError::Corrupt {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

#[async_trait]
impl ContractStore for FsStore {
    async fn put(&self, record: &ShardContractRecord) -> StoreResult<RecordId> {
        let record = record.clone();
        self.blocking(move |store| store.put_blocking(&record)).await
    }

    /// A single directory tree has no replicas; every read is a primary read.
    async fn get_by_hash_from(
        &self,
        hash: &str,
        _preference: ReadPreference,
    ) -> StoreResult<Vec<ShardContractRecord>> {
        let hash = hash.to_string();
        self.blocking(move |store| store.read_shard(&hash)).await
    }

    async fn list_hashes(&self) -> StoreResult<ShardListing> {
        self.blocking(|store| store.list_hashes_blocking()).await
    }

    fn read_preference(&self) -> ReadPreference {
        ReadPreference::Primary
    }
}
