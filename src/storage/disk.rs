//! Disk access for JQLDB tables
//!
//! Each table is one JSON file. Queries hold an exclusive OS-level lock on the
//! file (`flock` on Unix, `LockFileEx` on Windows) for their whole duration and
//! rewrite the document wholesale on every mutation.

use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::{debug, trace, warn};

use super::table::TableData;
use crate::error::{Error, Result};

/// An open table file holding an exclusive lock
///
/// The lock is released when this struct is dropped, whether the query
/// succeeded or failed.
#[derive(Debug)]
pub struct LockedTable {
    file: File,
    path: PathBuf,
}

impl LockedTable {
    /// Open a table file and block until an exclusive lock is acquired
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let name = table_name(path);

        let metadata = fs::metadata(path).map_err(|_| Error::TableNotFound(name.clone()))?;
        if !metadata.is_file() || metadata.permissions().readonly() {
            return Err(Error::TableAccessDenied(name));
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::PermissionDenied => Error::TableAccessDenied(name.clone()),
                std::io::ErrorKind::NotFound => Error::TableNotFound(name.clone()),
                _ => Error::Io(e),
            })?;

        FileExt::lock_exclusive(&file).map_err(|source| {
            warn!(path = %path.display(), error = %source, "Failed to lock table file");
            Error::Lock {
                table: name.clone(),
                source,
            }
        })?;
        trace!(path = %path.display(), "Acquired exclusive table lock");

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Path of the locked file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rewrite the whole table document through the locked handle
    ///
    /// The document is fully encoded before the file is truncated.
    pub fn write(&mut self, table: &TableData) -> Result<()> {
        let json = serde_json::to_vec(table)?;

        self.file.seek(SeekFrom::Start(0))?;
        self.file.set_len(0)?;
        self.file.write_all(&json)?;
        self.file.sync_all()?;

        debug!(path = %self.path.display(), bytes = json.len(), "Rewrote table file");
        Ok(())
    }
}

impl Drop for LockedTable {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!(path = %self.path.display(), error = %e, "Failed to release table lock");
        } else {
            trace!(path = %self.path.display(), "Released table lock");
        }
    }
}

/// Read and decode a table file without locking it
pub fn read_table(path: impl AsRef<Path>) -> Result<TableData> {
    let path = path.as_ref();
    let json = fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::TableNotFound(table_name(path)),
        _ => Error::Io(e),
    })?;
    Ok(serde_json::from_str(&json)?)
}

/// Encode and write a table file without locking it (table creation)
pub fn write_table(path: impl AsRef<Path>, table: &TableData) -> Result<()> {
    let json = serde_json::to_vec(table)?;
    fs::write(path, json)?;
    Ok(())
}

/// Size in bytes of a table's encoded document
pub fn encoded_len(table: &TableData) -> Result<usize> {
    Ok(serde_json::to_vec(table)?.len())
}

fn table_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
