use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sr_store::to_canonical_cbor;
use tracing::{debug, warn};

use super::{AuditQueue, QueueError, io_error};
use crate::AuditPlanEntry;

const QUEUE_DIR: &str = "audits";
const QUEUE_FILE: &str = "queue.log";
const HEADER_LEN: u64 = 4;

/// One submitted batch, stored as a single frame so it lands atomically.
#[derive(Debug, Serialize, Deserialize)]
struct QueueFrame {
    entries: Vec<AuditPlanEntry>,
}

/// Append-only audit queue log of length-prefixed canonical CBOR frames.
///
/// Opening the log replays it. A torn final frame (an append cut short by a
/// crash) is cut off so later batches stay readable; a complete frame that
/// does not decode is refused as corrupt.
#[derive(Debug, Clone)]
pub struct FsAuditQueue {
    path: PathBuf,
    append_lock: Arc<Mutex<()>>,
}

impl FsAuditQueue {
    pub fn open(root: impl AsRef<Path>) -> Result<Self, QueueError> {
        let dir = root.as_ref().join(QUEUE_DIR);
        fs::create_dir_all(&dir).map_err(|e| io_error(&dir, e))?;
        let path = dir.join(QUEUE_FILE);
        if !path.exists() {
            File::create(&path).map_err(|e| io_error(&path, e))?;
        }

        let scan = scan_log(&path)?;
        if let Some(reason) = scan.torn {
            warn!(
                path = %path.display(),
                kept_bytes = scan.valid_len,
                reason = %reason,
                "cutting torn tail off audit queue log"
            );
            let file = OpenOptions::new()
                .write(true)
                .open(&path)
                .map_err(|e| io_error(&path, e))?;
            file.set_len(scan.valid_len).map_err(|e| io_error(&path, e))?;
            file.sync_all().map_err(|e| io_error(&path, e))?;
        }

        Ok(Self {
            path,
            append_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every audit ever queued, earliest first.
    pub fn load_all(&self) -> Result<Vec<AuditPlanEntry>, QueueError> {
        let scan = scan_log(&self.path)?;
        if let Some(reason) = scan.torn {
            return Err(QueueError::Corrupt(reason));
        }
        let mut entries: Vec<_> = scan
            .frames
            .into_iter()
            .flat_map(|frame| frame.entries)
            .collect();
        entries.sort();
        Ok(entries)
    }

    /// Audits scheduled at or before `now`, earliest first.
    pub fn due(&self, now: u64) -> Result<Vec<AuditPlanEntry>, QueueError> {
        let mut entries = self.load_all()?;
        entries.retain(|entry| entry.scheduled_time <= now);
        Ok(entries)
    }

    fn append_frame(&self, frame: &QueueFrame) -> Result<(), QueueError> {
        let bytes = to_canonical_cbor(frame)?;
        let len = u32::try_from(bytes.len())
            .map_err(|_| QueueError::Rejected("batch larger than 4GiB".into()))?;
        let mut buf = Vec::with_capacity(bytes.len() + HEADER_LEN as usize);
        buf.extend_from_slice(&len.to_le_bytes());
        buf.extend_from_slice(&bytes);

        let _guard = self
            .append_lock
            .lock()
            .map_err(|_| QueueError::Unavailable("audit queue lock poisoned".into()))?;
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .map_err(|e| io_error(&self.path, e))?;
        let before = file
            .metadata()
            .map_err(|e| io_error(&self.path, e))?
            .len();

        let written = file.write_all(&buf).and_then(|()| file.sync_all());
        if let Err(err) = written {
            // Never leave a partial frame behind for the next batch to land after.
            if let Err(rollback) = file.set_len(before).and_then(|()| file.sync_all()) {
                warn!(
                    path = %self.path.display(),
                    error = %rollback,
                    "could not roll back partial audit batch"
                );
            }
            return Err(io_error(&self.path, err));
        }
        Ok(())
    }
}

#[async_trait]
impl AuditQueue for FsAuditQueue {
    async fn add(&self, entries: Vec<AuditPlanEntry>) -> Result<(), QueueError> {
        let added = entries.len();
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.append_frame(&QueueFrame { entries }))
            .await
            .map_err(|e| QueueError::Unavailable(format!("queue task failed: {e}")))??;
        debug!(added, path = %self.path.display(), "appended audit batch");
        Ok(())
    }
}

#[derive(Default)]
struct LogScan {
    frames: Vec<QueueFrame>,
    /// Bytes covered by complete frames.
    valid_len: u64,
    /// Why reading stopped early, if the log ends in a partial frame.
    torn: Option<String>,
}

fn scan_log(path: &Path) -> Result<LogScan, QueueError> {
    let mut file = File::open(path).map_err(|e| io_error(path, e))?;
    let mut scan = LogScan::default();
    loop {
        let header = read_up_to(&mut file, HEADER_LEN).map_err(|e| io_error(path, e))?;
        if header.is_empty() {
            break;
        }
        let Ok(len_buf) = <[u8; 4]>::try_from(header.as_slice()) else {
            scan.torn = Some(format!(
                "truncated length header (read {} bytes)",
                header.len()
            ));
            break;
        };
        let len = u64::from(u32::from_le_bytes(len_buf));
        let payload = read_up_to(&mut file, len).map_err(|e| io_error(path, e))?;
        if (payload.len() as u64) < len {
            scan.torn = Some("truncated batch payload".into());
            break;
        }
        scan.frames.push(serde_cbor::from_slice(&payload)?);
        scan.valid_len += HEADER_LEN + len;
    }
    Ok(scan)
}

/// Read at most `limit` bytes; fewer means the file ended.
fn read_up_to(file: &mut File, limit: u64) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    std::io::Read::by_ref(file).take(limit).read_to_end(&mut buf)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(farmer: &str, at: u64, is_final: bool) -> AuditPlanEntry {
        AuditPlanEntry {
            hash: "shard".into(),
            farmer_id: farmer.into(),
            index: 0,
            scheduled_time: at,
            is_final,
            challenge: format!("{farmer}@{at}"),
        }
    }

    #[tokio::test]
    async fn batches_survive_reopen_in_time_order() {
        let tmp = TempDir::new().unwrap();
        {
            let queue = FsAuditQueue::open(tmp.path()).unwrap();
            queue.add(vec![entry("a", 300, true)]).await.unwrap();
            queue
                .add(vec![entry("b", 100, false), entry("b", 200, true)])
                .await
                .unwrap();
        }
        let queue = FsAuditQueue::open(tmp.path()).unwrap();
        let times: Vec<_> = queue
            .load_all()
            .unwrap()
            .iter()
            .map(|e| e.scheduled_time)
            .collect();
        assert_eq!(times, vec![100, 200, 300]);
        assert_eq!(queue.due(250).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn detects_truncated_batch() {
        let tmp = TempDir::new().unwrap();
        let queue = FsAuditQueue::open(tmp.path()).unwrap();
        queue.add(vec![entry("a", 1, true)]).await.unwrap();

        let bytes = std::fs::read(queue.path()).unwrap();
        std::fs::write(queue.path(), &bytes[..bytes.len() - 3]).unwrap();

        match queue.load_all() {
            Err(QueueError::Corrupt(_)) => {}
            other => panic!("expected corrupt log, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_log_loads_nothing() {
        let tmp = TempDir::new().unwrap();
        let queue = FsAuditQueue::open(tmp.path()).unwrap();
        assert!(queue.load_all().unwrap().is_empty());
    }

    fn append_raw(path: &Path, bytes: &[u8]) {
        let mut file = OpenOptions::new().append(true).open(path).unwrap();
        file.write_all(bytes).unwrap();
    }

    #[tokio::test]
    async fn reopen_cuts_torn_tail_so_later_batches_stay_readable() {
        let tmp = TempDir::new().unwrap();
        let intact_len = {
            let queue = FsAuditQueue::open(tmp.path()).unwrap();
            queue.add(vec![entry("a", 10, true)]).await.unwrap();
            let len = std::fs::metadata(queue.path()).unwrap().len();
            // Header promising 100 bytes followed by only two of them.
            let mut torn = 100u32.to_le_bytes().to_vec();
            torn.extend_from_slice(&[0xa1, 0x67]);
            append_raw(queue.path(), &torn);
            len
        };

        let queue = FsAuditQueue::open(tmp.path()).unwrap();
        assert_eq!(std::fs::metadata(queue.path()).unwrap().len(), intact_len);
        queue.add(vec![entry("b", 20, true)]).await.unwrap();

        let farmers: Vec<_> = queue
            .load_all()
            .unwrap()
            .into_iter()
            .map(|e| e.farmer_id)
            .collect();
        assert_eq!(farmers, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn reopen_cuts_partial_length_header() {
        let tmp = TempDir::new().unwrap();
        {
            let queue = FsAuditQueue::open(tmp.path()).unwrap();
            queue.add(vec![entry("a", 10, true)]).await.unwrap();
            append_raw(queue.path(), &[0x05, 0x00]);
        }
        let queue = FsAuditQueue::open(tmp.path()).unwrap();
        queue.add(vec![entry("b", 20, true)]).await.unwrap();
        assert_eq!(queue.load_all().unwrap().len(), 2);
    }

    #[test]
    fn undecodable_frame_is_refused_on_open() {
        let tmp = TempDir::new().unwrap();
        let path = FsAuditQueue::open(tmp.path()).unwrap().path().to_path_buf();
        let mut frame = 3u32.to_le_bytes().to_vec();
        frame.extend_from_slice(&[0xff, 0xff, 0xff]);
        append_raw(&path, &frame);

        let err = FsAuditQueue::open(tmp.path()).unwrap_err();
        assert!(matches!(err, QueueError::Cbor(_)), "got {err:?}");
    }
}
