//! File-backed [`ByteStore`].
//!
//! Emulates the EEPROM partition with a regular file of exactly `capacity`
//! bytes.  A missing file is created erased (all `0xFF`); a short file is
//! padded with erased bytes so a region written by a smaller configuration
//! still decodes.
//!
//! Writes and erases build the whole region in a sibling temp file, flush it
//! with `sync_all`, and `rename` it over the region.  A failure part way
//! leaves the previous region intact, matching the catalog's rollback.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use espir_core::domain::limits::ERASED_BYTE;
use espir_core::storage::backend::check_fits;
use espir_core::{ByteStore, StoreError};
use tracing::{debug, info};

/// A fixed-size catalog region stored in a file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    capacity: usize,
}

impl FileStore {
    /// Opens (creating if needed) the region at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the file cannot be created, read,
    /// or padded.
    pub fn open(path: impl AsRef<Path>, capacity: usize) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| backend(&path, "create directory", e))?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| backend(&path, "open", e))?;
        let len = file
            .metadata()
            .map_err(|e| backend(&path, "stat", e))?
            .len() as usize;

        if len < capacity {
            if len == 0 {
                info!("creating erased catalog region at {}", path.display());
            }
            file.seek(SeekFrom::Start(len as u64))
                .and_then(|_| file.write_all(&vec![ERASED_BYTE; capacity - len]))
                .and_then(|()| file.sync_all())
                .map_err(|e| backend(&path, "pad", e))?;
        }

        Ok(Self { path, capacity })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open_rw(&self) -> Result<File, StoreError> {
        OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.path)
            .map_err(|e| backend(&self.path, "open", e))
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Replaces the whole region with `region` via temp file and rename.
    fn replace_region(&self, region: &[u8], action: &str) -> Result<(), StoreError> {
        let temp = self.temp_path();
        let result = File::create(&temp)
            .and_then(|mut file| {
                file.write_all(region)?;
                file.sync_all()
            })
            .and_then(|()| std::fs::rename(&temp, &self.path));
        if let Err(e) = result {
            std::fs::remove_file(&temp).ok();
            return Err(backend(&self.path, action, e));
        }
        Ok(())
    }
}

impl ByteStore for FileStore {
    fn capacity(&self) -> usize {
        self.capacity
    }

    fn read(&self) -> Result<Vec<u8>, StoreError> {
        let mut region = Vec::with_capacity(self.capacity);
        self.open_rw()?
            .take(self.capacity as u64)
            .read_to_end(&mut region)
            .map_err(|e| backend(&self.path, "read", e))?;
        region.resize(self.capacity, ERASED_BYTE);
        Ok(region)
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), StoreError> {
        check_fits(bytes, self.capacity)?;
        // Bytes past the encoded catalog keep their previous contents.
        let mut region = self.read()?;
        region[..bytes.len()].copy_from_slice(bytes);
        self.replace_region(&region, "write")?;
        debug!("wrote {} bytes to {}", bytes.len(), self.path.display());
        Ok(())
    }

    fn erase(&mut self) -> Result<(), StoreError> {
        self.replace_region(&vec![ERASED_BYTE; self.capacity], "erase")?;
        info!("erased catalog region at {}", self.path.display());
        Ok(())
    }
}

fn backend(path: &Path, action: &str, err: std::io::Error) -> StoreError {
    StoreError::Backend(format!("{action} {}: {err}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn temp_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("espir_test_{}", Uuid::new_v4()))
            .join("store.bin")
    }

    fn cleanup(path: &Path) {
        if let Some(dir) = path.parent() {
            std::fs::remove_dir_all(dir).ok();
        }
    }

    #[test]
    fn test_open_creates_erased_region() {
        // Arrange
        let path = temp_path();

        // Act
        let store = FileStore::open(&path, 64).expect("open");

        // Assert
        assert_eq!(store.read().unwrap(), vec![0xFF; 64]);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 64);
        cleanup(&path);
    }

    #[test]
    fn test_write_survives_reopen() {
        // Arrange
        let path = temp_path();
        let mut store = FileStore::open(&path, 16).expect("open");

        // Act
        store.write(&[0xAA, 0x55, 0x00]).expect("write");
        let reopened = FileStore::open(&path, 16).expect("reopen");

        // Assert
        let region = reopened.read().unwrap();
        assert_eq!(&region[..3], &[0xAA, 0x55, 0x00]);
        assert!(region[3..].iter().all(|b| *b == 0xFF));
        cleanup(&path);
    }

    #[test]
    fn test_short_file_is_padded_with_erased_bytes() {
        let path = temp_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, [1, 2]).unwrap();

        let store = FileStore::open(&path, 4).expect("open");

        assert_eq!(store.read().unwrap(), vec![1, 2, 0xFF, 0xFF]);
        cleanup(&path);
    }

    #[test]
    fn test_oversized_write_is_refused() {
        let path = temp_path();
        let mut store = FileStore::open(&path, 2).expect("open");

        let result = store.write(&[1, 2, 3]);

        assert!(matches!(result, Err(StoreError::StorageFull { .. })));
        assert_eq!(store.read().unwrap(), vec![0xFF, 0xFF]);
        cleanup(&path);
    }

    #[test]
    fn test_failed_write_leaves_previous_region_intact() {
        // Arrange: a directory squatting on the temp path makes the write fail
        let path = temp_path();
        let mut store = FileStore::open(&path, 8).expect("open");
        store.write(&[0xAA, 0x55, 0x00]).expect("write");
        let before = store.read().unwrap();
        std::fs::create_dir_all(store.temp_path()).unwrap();

        // Act
        let result = store.write(&[0xAA, 0x55, 0x01, 0x02]);

        // Assert
        assert!(matches!(result, Err(StoreError::Backend(_))));
        assert_eq!(store.read().unwrap(), before);
        cleanup(&path);
    }

    #[test]
    fn test_write_leaves_no_temp_file_behind() {
        let path = temp_path();
        let mut store = FileStore::open(&path, 8).expect("open");

        store.write(&[1, 2, 3]).expect("write");

        assert!(!store.temp_path().exists());
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 8);
        cleanup(&path);
    }

    #[test]
    fn test_erase_resets_every_byte() {
        let path = temp_path();
        let mut store = FileStore::open(&path, 8).expect("open");
        store.write(&[0; 8]).unwrap();

        store.erase().expect("erase");

        assert_eq!(store.read().unwrap(), vec![0xFF; 8]);
        cleanup(&path);
    }
}
