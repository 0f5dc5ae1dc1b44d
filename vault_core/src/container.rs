//! Owns the vault's backing file. Exposes slot-indexed header I/O and
//! absolute-offset region I/O; never interprets the bytes it moves.

use crate::error::{Result, VaultError};
use crate::header::HEADER_SLOT_SIZE;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

pub struct VaultContainer {
    path: PathBuf,
    file: File,
}

impl VaultContainer {
    /// Opens (creating if absent) the backing file at `path` and takes a
    /// best-effort advisory exclusive lock. Locking failure is logged and
    /// otherwise ignored; concurrent mounts remain undefined behavior
    /// either way, lock or no lock.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;

        if let Err(e) = file.try_lock_exclusive() {
            log::warn!(
                "could not acquire advisory lock on {}: {e} (continuing without it)",
                path.display()
            );
        }

        Ok(VaultContainer { path, file })
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads exactly `HEADER_SLOT_SIZE` bytes at slot `i`'s offset. Short
    /// reads (e.g. a freshly created, still-empty vault) are zero-padded;
    /// a slot that has never been written decrypts under no password, the
    /// same as one full of random noise.
    pub fn read_slot(&mut self, i: usize) -> Result<Vec<u8>> {
        let offset = (i * HEADER_SLOT_SIZE) as u64;
        self.read_region_padded(offset, HEADER_SLOT_SIZE)
    }

    /// Writes exactly `HEADER_SLOT_SIZE` bytes at slot `i`'s offset.
    pub fn write_slot(&mut self, i: usize, blob: &[u8]) -> Result<()> {
        if blob.len() != HEADER_SLOT_SIZE {
            return Err(VaultError::InvalidArgument(format!(
                "slot blob must be {HEADER_SLOT_SIZE} bytes, got {}",
                blob.len()
            )));
        }
        let offset = (i * HEADER_SLOT_SIZE) as u64;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(blob)?;
        self.file.sync_data()?;
        Ok(())
    }

    /// Reads up to `size` bytes starting at `offset`; the caller parses
    /// the result. Short reads at the end of the file are zero-padded up
    /// to `size` so callers can always interpret a fixed-width prefix.
    pub fn read_region(&mut self, offset: u64, size: usize) -> Result<Vec<u8>> {
        self.read_region_padded(offset, size)
    }

    fn read_region_padded(&mut self, offset: u64, size: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; size];
        self.file.seek(SeekFrom::Start(offset))?;
        let mut filled = 0;
        loop {
            match self.file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) => return Err(VaultError::Io(e)),
            }
        }
        Ok(buf)
    }

    /// Writes `payload` at `offset`, then extends the file length to at
    /// least `offset + reserved_size`. `payload.len() <= reserved_size` is
    /// required so a volume region never grows past its fixed reservation.
    pub fn write_region(&mut self, offset: u64, payload: &[u8], reserved_size: u64) -> Result<()> {
        if payload.len() as u64 > reserved_size {
            return Err(VaultError::VolumeFull {
                needed: payload.len() as u64,
                capacity: reserved_size,
            });
        }
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(payload)?;
        let min_len = offset + reserved_size;
        let current_len = self.file.seek(SeekFrom::End(0))?;
        if current_len < min_len {
            self.file.set_len(min_len)?;
        }
        self.file.sync_data()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::NUM_HEADER_SLOTS;
    use tempfile::tempdir;

    #[test]
    fn slot_round_trip() {
        let dir = tempdir().unwrap();
        let mut vault = VaultContainer::open(dir.path().join("vault.dat")).unwrap();
        let blob = vec![0xABu8; HEADER_SLOT_SIZE];
        vault.write_slot(1, &blob).unwrap();
        assert_eq!(vault.read_slot(1).unwrap(), blob);
    }

    #[test]
    fn unwritten_slot_reads_as_zero_padding() {
        let dir = tempdir().unwrap();
        let mut vault = VaultContainer::open(dir.path().join("vault.dat")).unwrap();
        let slot = vault.read_slot(NUM_HEADER_SLOTS - 1).unwrap();
        assert_eq!(slot, vec![0u8; HEADER_SLOT_SIZE]);
    }

    #[test]
    fn region_write_extends_file_to_reservation() {
        let dir = tempdir().unwrap();
        let mut vault = VaultContainer::open(dir.path().join("vault.dat")).unwrap();
        vault.write_region(1000, b"hello", 1024).unwrap();
        let len = std::fs::metadata(vault.path()).unwrap().len();
        assert!(len >= 1000 + 1024);
    }

    #[test]
    fn region_write_rejects_oversized_payload() {
        let dir = tempdir().unwrap();
        let mut vault = VaultContainer::open(dir.path().join("vault.dat")).unwrap();
        let big = vec![0u8; 100];
        assert!(vault.write_region(0, &big, 10).is_err());
    }
}
