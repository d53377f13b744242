//! Fusion configuration and state files.
//!
//! One configuration file and one state file per sensor, named after the
//! sensor id. Files hold the raw blob. Configuration files written by older
//! tools may start with a 4-byte little-endian length header equal to the
//! maximum configuration size; that header is stripped on read.

use std::fs::File;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Length of the legacy configuration header.
pub const LEGACY_HEADER_LEN: usize = 4;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("cannot open {path:?} for writing: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("short write to {path:?}: {written} of {expected} bytes")]
    ShortWrite {
        path: PathBuf,
        written: usize,
        expected: usize,
    },

    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path:?} is empty")]
    Empty { path: PathBuf },

    #[error("{path:?} holds {size} bytes, more than the {max} byte limit")]
    Oversize {
        path: PathBuf,
        size: usize,
        max: usize,
    },

    #[error("fusion engine rejected the {what} loaded from {path:?}: {status}")]
    Rejected {
        what: &'static str,
        path: PathBuf,
        status: crate::fusion::EngineStatus,
    },
}

/// Drop a legacy length header if the blob carries one.
///
/// A header is present only when the input is exactly `max_size + 4` bytes
/// and its first four bytes decode (little-endian) to `max_size`.
pub fn strip_legacy_header(raw: &[u8], max_size: usize) -> &[u8] {
    if raw.len() == max_size + LEGACY_HEADER_LEN {
        let mut header = [0u8; LEGACY_HEADER_LEN];
        header.copy_from_slice(&raw[..LEGACY_HEADER_LEN]);
        if u32::from_le_bytes(header) as usize == max_size {
            return &raw[LEGACY_HEADER_LEN..];
        }
    }
    raw
}

/// Directory holding per-sensor blob files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobStore {
    dir: PathBuf,
}

impl BlobStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `<data dir>/bme69x-agent/conf`, falling back to `./conf`.
    pub fn default_dir() -> PathBuf {
        dirs::data_local_dir()
            .map(|d| d.join("bme69x-agent"))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("conf")
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn config_path(&self, sensor_id: &str) -> PathBuf {
        self.dir
            .join(format!("bsec_config_{}.txt", file_safe(sensor_id)))
    }

    pub fn state_path(&self, sensor_id: &str) -> PathBuf {
        self.dir
            .join(format!("state_data_{}.txt", file_safe(sensor_id)))
    }

    pub fn write_config(&self, sensor_id: &str, blob: &[u8]) -> Result<PathBuf, PersistenceError> {
        let path = self.config_path(sensor_id);
        write_blob(&path, blob)?;
        info!(path = %path.display(), bytes = blob.len(), "saved fusion configuration");
        Ok(path)
    }

    pub fn write_state(&self, sensor_id: &str, blob: &[u8]) -> Result<PathBuf, PersistenceError> {
        let path = self.state_path(sensor_id);
        write_blob(&path, blob)?;
        info!(path = %path.display(), bytes = blob.len(), "saved fusion state");
        Ok(path)
    }

    /// Read the configuration for `sensor_id`; `None` if no file exists.
    pub fn read_config(
        &self,
        sensor_id: &str,
        max_size: usize,
    ) -> Result<Option<Vec<u8>>, PersistenceError> {
        read_config_file(&self.config_path(sensor_id), max_size)
    }

    /// Read the state for `sensor_id`; `None` if no file exists.
    pub fn read_state(
        &self,
        sensor_id: &str,
        max_size: usize,
    ) -> Result<Option<Vec<u8>>, PersistenceError> {
        let path = self.state_path(sensor_id);
        let Some(raw) = read_blob(&path)? else {
            return Ok(None);
        };
        if raw.len() > max_size {
            return Err(PersistenceError::Oversize {
                path,
                size: raw.len(),
                max: max_size,
            });
        }
        Ok(Some(raw))
    }
}

impl Default for BlobStore {
    fn default() -> Self {
        Self::new(Self::default_dir())
    }
}

/// Read a configuration file from an arbitrary path, stripping a legacy header.
///
/// Anything else is returned as read; the engine decides whether it is usable.
pub fn read_config_file(path: &Path, max_size: usize) -> Result<Option<Vec<u8>>, PersistenceError> {
    let Some(raw) = read_blob(path)? else {
        return Ok(None);
    };
    let blob = strip_legacy_header(&raw, max_size);
    if blob.len() != raw.len() {
        debug!(path = %path.display(), "stripped legacy configuration header");
    }
    Ok(Some(blob.to_vec()))
}

fn read_blob(path: &Path) -> Result<Option<Vec<u8>>, PersistenceError> {
    let raw = match std::fs::read(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "no blob file");
            return Ok(None);
        }
        Err(source) => {
            return Err(PersistenceError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    if raw.is_empty() {
        return Err(PersistenceError::Empty {
            path: path.to_path_buf(),
        });
    }
    Ok(Some(raw))
}

fn write_blob(path: &Path, blob: &[u8]) -> Result<(), PersistenceError> {
    let open_err = |source| PersistenceError::Open {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(open_err)?;
    }
    let mut file = File::create(path).map_err(open_err)?;

    let write_err = |source| PersistenceError::Write {
        path: path.to_path_buf(),
        source,
    };
    let written = file.write(blob).map_err(write_err)?;
    if written != blob.len() {
        return Err(PersistenceError::ShortWrite {
            path: path.to_path_buf(),
            written,
            expected: blob.len(),
        });
    }
    file.flush().map_err(write_err)
}

fn file_safe(sensor_id: &str) -> String {
    sensor_id
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> BlobStore {
        BlobStore::new(std::env::temp_dir().join(format!("bme69x-blob-{}", uuid::Uuid::new_v4())))
    }

    #[test]
    fn test_file_names() {
        let store = BlobStore::new("/var/lib/bme");
        assert_eq!(
            store.config_path("sensor_0x76"),
            PathBuf::from("/var/lib/bme/bsec_config_sensor_0x76.txt")
        );
        assert_eq!(
            store.state_path("kitchen"),
            PathBuf::from("/var/lib/bme/state_data_kitchen.txt")
        );
        assert_eq!(
            store.state_path("a/b"),
            PathBuf::from("/var/lib/bme/state_data_a_b.txt")
        );
    }

    #[test]
    fn test_legacy_header_stripped() {
        let mut raw = 8u32.to_le_bytes().to_vec();
        raw.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(strip_legacy_header(&raw, 8), &[1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_wrong_header_value_kept() {
        let mut raw = 7u32.to_le_bytes().to_vec();
        raw.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(strip_legacy_header(&raw, 8), raw.as_slice());
    }

    #[test]
    fn test_exact_size_kept() {
        let raw = [9u8; 8];
        assert_eq!(strip_legacy_header(&raw, 8), &raw);
    }

    #[test]
    fn test_missing_file_is_none() {
        let store = temp_store();
        assert!(store.read_config("nobody", 16).unwrap().is_none());
        assert!(store.read_state("nobody", 16).unwrap().is_none());
    }

    #[test]
    fn test_write_then_read_state() {
        let store = temp_store();
        store.write_state("s1", &[1, 2, 3]).unwrap();
        assert_eq!(store.read_state("s1", 16).unwrap(), Some(vec![1, 2, 3]));
        assert!(matches!(
            store.read_state("s1", 2),
            Err(PersistenceError::Oversize { size: 3, max: 2, .. })
        ));
        let _ = std::fs::remove_dir_all(store.dir());
    }

    #[test]
    fn test_oversized_config_returned_as_read() {
        let store = temp_store();
        std::fs::create_dir_all(store.dir()).unwrap();
        let mut raw = 7u32.to_le_bytes().to_vec();
        raw.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        std::fs::write(store.config_path("s1"), &raw).unwrap();
        assert_eq!(store.read_config("s1", 8).unwrap(), Some(raw));
        let _ = std::fs::remove_dir_all(store.dir());
    }

    #[test]
    fn test_write_failure_keeps_cause() {
        let store = temp_store();
        std::fs::create_dir_all(store.dir()).unwrap();
        // A directory where the file should go cannot be opened for writing
        std::fs::create_dir_all(store.state_path("s1")).unwrap();
        let err = store.write_state("s1", &[1, 2, 3]).unwrap_err();
        assert!(matches!(err, PersistenceError::Open { .. }));
        assert!(std::error::Error::source(&err).is_some());
        let _ = std::fs::remove_dir_all(store.dir());
    }

    #[test]
    fn test_write_error_reports_io_source() {
        let err = PersistenceError::Write {
            path: PathBuf::from("/tmp/state_data_s1.txt"),
            source: std::io::Error::new(ErrorKind::Other, "disk full"),
        };
        assert!(err.to_string().contains("disk full"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_empty_file_rejected() {
        let store = temp_store();
        std::fs::create_dir_all(store.dir()).unwrap();
        std::fs::write(store.config_path("s1"), b"").unwrap();
        assert!(matches!(
            store.read_config("s1", 16),
            Err(PersistenceError::Empty { .. })
        ));
        let _ = std::fs::remove_dir_all(store.dir());
    }
}
