//! Durable tracklet store backed by one append-only log file per session.
//!
//! Each record is framed as a little-endian `u32` byte length followed by the
//! bincode encoding of a [`TrackletRecord`]. Only record offsets are kept in
//! memory; window reads decode from disk.

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::reid::embedding::Embedding;
use crate::reid::error::{ReidError, Result, codec_error};
use crate::reid::identity::Identity;
use crate::reid::store::{TrackletRecord, TrackletStore, check_dimension, window_start};

const FILE_EXTENSION: &str = "reid";

#[derive(Debug)]
pub struct FileTrackletStore {
    path: PathBuf,
    handles: Option<Handles>,
    offsets: HashMap<Identity, Vec<u64>>,
    end: u64,
    next_sequence: u64,
    dimension: Option<usize>,
    sync: bool,
    /// Set after a failed write; every later append is refused.
    failed: bool,
}

#[derive(Debug)]
struct Handles {
    writer: File,
    reader: File,
}

impl FileTrackletStore {
    /// Create the log for a session at `<dir>/<camera stem>.reid`.
    ///
    /// A file left behind by an earlier run is truncated, never replayed.
    pub fn create(dir: impl AsRef<Path>, camera_id: &str, sync: bool) -> Result<Self> {
        let path = Self::log_path(dir.as_ref(), camera_id)?;
        fs::create_dir_all(dir.as_ref()).map_err(ReidError::StorageWrite)?;

        if path.exists() {
            warn!(path = %path.display(), "discarding stale tracklet log from a previous run");
        }

        let writer = File::options()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .map_err(ReidError::StorageWrite)?;
        let reader = File::open(&path).map_err(ReidError::StorageRead)?;

        debug!(path = %path.display(), "created tracklet log");

        Ok(Self {
            path,
            handles: Some(Handles { writer, reader }),
            offsets: HashMap::new(),
            end: 0,
            next_sequence: 0,
            dimension: None,
            sync,
            failed: false,
        })
    }

    /// Log file location for a camera identifier. The identifier's extension,
    /// if any, is dropped.
    pub fn log_path(dir: &Path, camera_id: &str) -> Result<PathBuf> {
        let stem = Path::new(camera_id)
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                ReidError::MalformedConfig(format!("invalid camera identifier {camera_id:?}"))
            })?;
        Ok(dir.join(format!("{stem}.{FILE_EXTENSION}")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Close and remove the log file.
    pub fn destroy(mut self) -> Result<()> {
        self.remove_file().map_err(ReidError::StorageWrite)
    }

    fn remove_file(&mut self) -> io::Result<()> {
        if self.handles.take().is_none() {
            return Ok(());
        }
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    fn handles(&self) -> io::Result<&Handles> {
        self.handles
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "tracklet log is closed"))
    }

    fn read_record(&self, offset: u64) -> io::Result<TrackletRecord> {
        let mut reader = &self.handles()?.reader;
        reader.seek(SeekFrom::Start(offset))?;

        let mut len = [0u8; 4];
        reader.read_exact(&mut len)?;
        let mut buf = vec![0u8; u32::from_le_bytes(len) as usize];
        reader.read_exact(&mut buf)?;

        bincode::deserialize(&buf).map_err(codec_error)
    }

    fn read_window(&self, offsets: &[u64], k: usize) -> io::Result<Vec<Embedding>> {
        offsets[window_start(offsets.len(), k)..]
            .iter()
            .map(|&offset| self.read_record(offset).map(|r| r.embedding))
            .collect()
    }

    fn write_frame(&mut self, payload: &[u8]) -> io::Result<()> {
        let len = u32::try_from(payload.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "record too large"))?;
        let mut writer = &self.handles()?.writer;
        writer.write_all(&len.to_le_bytes())?;
        writer.write_all(payload)?;
        writer.flush()?;
        if self.sync {
            writer.sync_data()?;
        }
        Ok(())
    }

    /// Cut a partially written frame off the end of the log.
    fn rollback(&self) -> io::Result<()> {
        let mut writer = &self.handles()?.writer;
        writer.set_len(self.end)?;
        writer.seek(SeekFrom::Start(self.end))?;
        Ok(())
    }
}

impl TrackletStore for FileTrackletStore {
    fn append(&mut self, identity: Identity, embedding: Embedding) -> Result<u64> {
        if self.failed {
            return Err(ReidError::StorageWrite(io::Error::other(
                "tracklet log is unusable after a failed write",
            )));
        }
        check_dimension(self.dimension, &embedding)?;
        let dim = embedding.dim();

        let sequence = self.next_sequence;
        let record = TrackletRecord {
            identity,
            sequence,
            embedding,
        };
        let payload = bincode::serialize(&record)
            .map_err(|e| ReidError::StorageWrite(codec_error(e)))?;

        let offset = self.end;
        if let Err(e) = self.write_frame(&payload) {
            self.failed = true;
            if let Err(rollback) = self.rollback() {
                warn!(
                    path = %self.path.display(),
                    error = %rollback,
                    "failed to roll back tracklet log"
                );
            }
            return Err(ReidError::StorageWrite(e));
        }

        self.end += 4 + payload.len() as u64;
        self.next_sequence += 1;
        self.dimension.get_or_insert(dim);
        self.offsets.entry(identity).or_default().push(offset);
        Ok(sequence)
    }

    fn query_window(&self, identity: Identity, k: usize) -> Result<Vec<Embedding>> {
        match self.offsets.get(&identity) {
            Some(offsets) => self.read_window(offsets, k).map_err(ReidError::StorageRead),
            None => Ok(Vec::new()),
        }
    }

    fn query_all_windows(&self, k: usize) -> Result<BTreeMap<Identity, Vec<Embedding>>> {
        self.offsets
            .iter()
            .map(|(&identity, offsets)| {
                self.read_window(offsets, k)
                    .map(|window| (identity, window))
                    .map_err(ReidError::StorageRead)
            })
            .collect()
    }

    fn len(&self) -> usize {
        self.next_sequence as usize
    }

    fn identities(&self) -> Vec<Identity> {
        let mut ids: Vec<Identity> = self.offsets.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    fn history_len(&self, identity: Identity) -> usize {
        self.offsets.get(&identity).map_or(0, Vec::len)
    }

    fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    fn close(self) -> Result<()> {
        self.destroy()
    }
}

impl Drop for FileTrackletStore {
    fn drop(&mut self) {
        if let Err(e) = self.remove_file() {
            warn!(path = %self.path.display(), error = %e, "failed to remove tracklet log");
        }
    }
}
