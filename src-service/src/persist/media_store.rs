//! Shared media storage.
//!
//! Records are written with a pending/publish protocol: a pending entry is
//! reserved, encoded bytes are streamed into it, and it is published only
//! once complete. Viewers never see a partial file.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Collection screenshots are filed under.
pub const SCREENSHOTS_RELATIVE_PATH: &str = "Pictures/Screenshots";

/// Metadata of one stored image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRecord {
    pub display_name: String,
    pub mime_type: &'static str,
    pub relative_path: String,
    /// Epoch milliseconds
    pub date_taken_ms: i64,
    pub width: u32,
    pub height: u32,
    pub is_pending: bool,
}

/// A reserved entry awaiting its bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEntry {
    /// Store-specific key of the reserved entry
    pub key: PathBuf,
    pub record: MediaRecord,
}

/// Error type for storage operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The pending entry could not be reserved
    Insert(String),
    /// Writing encoded bytes failed
    Write(String),
    /// The image could not be encoded
    Encode(String),
    /// Clearing the pending flag failed
    Publish(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Insert(msg) => write!(f, "Failed to create media entry: {}", msg),
            StorageError::Write(msg) => write!(f, "Failed to write image data: {}", msg),
            StorageError::Encode(msg) => write!(f, "Failed to encode image: {}", msg),
            StorageError::Publish(msg) => write!(f, "Failed to publish media entry: {}", msg),
        }
    }
}

impl std::error::Error for StorageError {}

/// Insert-pending / write / publish / delete-on-error storage protocol.
pub trait MediaStore: Send + Sync {
    /// Reserve a pending entry for `record`.
    fn insert_pending(&self, record: MediaRecord) -> Result<PendingEntry, StorageError>;

    /// Open the entry for writing.
    fn open_writer(&self, entry: &PendingEntry) -> Result<Box<dyn Write + Send>, StorageError>;

    /// Clear the pending flag. Returns the final location.
    fn publish(&self, entry: &PendingEntry) -> Result<PathBuf, StorageError>;

    /// Discard a reserved entry. Must tolerate entries already gone.
    fn delete(&self, entry: &PendingEntry);
}

/// [`MediaStore`] over a plain directory tree.
///
/// Pending entries are hidden `.pending-<name>` files next to their final
/// name; publishing renames them into place and stamps the modification
/// time with the record's date taken.
pub struct DirectoryMediaStore {
    root: PathBuf,
}

impl DirectoryMediaStore {
    /// Store rooted at `root`; records land in `root/<relative_path>`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store rooted at the user's home directory.
    pub fn user_default() -> Option<Self> {
        directories::UserDirs::new().map(|dirs| Self::new(dirs.home_dir()))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn collection_dir(&self, record: &MediaRecord) -> PathBuf {
        self.root.join(&record.relative_path)
    }

    fn final_path(&self, entry: &PendingEntry) -> PathBuf {
        self.collection_dir(&entry.record)
            .join(&entry.record.display_name)
    }
}

fn pending_name(display_name: &str) -> String {
    format!(".pending-{}", display_name)
}

impl MediaStore for DirectoryMediaStore {
    fn insert_pending(&self, record: MediaRecord) -> Result<PendingEntry, StorageError> {
        let dir = self.collection_dir(&record);
        fs::create_dir_all(&dir)
            .map_err(|e| StorageError::Insert(format!("{}: {}", dir.display(), e)))?;

        if dir.join(&record.display_name).exists() {
            return Err(StorageError::Insert(format!(
                "{} already exists",
                record.display_name
            )));
        }

        let key = dir.join(pending_name(&record.display_name));
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&key)
            .map_err(|e| StorageError::Insert(format!("{}: {}", key.display(), e)))?;

        debug!("Reserved pending entry {:?}", key);
        Ok(PendingEntry {
            key,
            record: MediaRecord {
                is_pending: true,
                ..record
            },
        })
    }

    fn open_writer(&self, entry: &PendingEntry) -> Result<Box<dyn Write + Send>, StorageError> {
        let file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&entry.key)
            .map_err(|e| StorageError::Write(format!("{}: {}", entry.key.display(), e)))?;
        Ok(Box::new(BufWriter::new(file)))
    }

    fn publish(&self, entry: &PendingEntry) -> Result<PathBuf, StorageError> {
        let target = self.final_path(entry);

        if let Ok(file) = File::options().write(true).open(&entry.key) {
            let taken = UNIX_EPOCH + Duration::from_millis(entry.record.date_taken_ms.max(0) as u64);
            if let Err(e) = file.set_modified(taken) {
                debug!("Could not set date taken on {:?}: {}", entry.key, e);
            }
        }

        fs::rename(&entry.key, &target)
            .map_err(|e| StorageError::Publish(format!("{}: {}", target.display(), e)))?;
        Ok(target)
    }

    fn delete(&self, entry: &PendingEntry) {
        match fs::remove_file(&entry.key) {
            Ok(()) => debug!("Deleted pending entry {:?}", entry.key),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to delete pending entry {:?}: {}", entry.key, e),
        }
    }
}

/// Modification time of a published file in epoch milliseconds.
pub fn modified_ms(path: &Path) -> Option<i64> {
    let modified = fs::metadata(path).and_then(|m| m.modified()).ok()?;
    let since = modified.duration_since(SystemTime::UNIX_EPOCH).ok()?;
    Some(since.as_millis() as i64)
}
