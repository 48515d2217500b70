use crate::ip::NormalizedIp;
use crate::record::BookmarkRecord;

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("a bookmark for {0} already exists")]
    DuplicateIp(NormalizedIp),
    #[error("no bookmark for {0}")]
    NotFound(NormalizedIp),
    #[error("bookmark file {path:?} is not a JSON array of records: {error}")]
    CorruptStore {
        path: PathBuf,
        error: serde_json::Error,
    },
    #[error("cannot write bookmark file {path:?}: {error}")]
    Persistence {
        path: PathBuf,
        error: std::io::Error,
    },
}

/// Ordered bookmark list kept write-through consistent with a JSON file.
///
/// Every mutation rewrites the whole file before it is applied in memory,
/// so a failed write leaves the in-memory list equal to the last state
/// that actually reached disk.
pub struct BookmarkStore {
    path: PathBuf,
    records: Vec<BookmarkRecord>,
}

impl BookmarkStore {
    /// Reads the backing file. A missing file is an empty store; a file
    /// that is present but unparseable is a [`StoreError::CorruptStore`],
    /// left to the caller to decide on.
    pub fn load<P: Into<PathBuf>>(path: P) -> Result<Self, StoreError> {
        let path = path.into();
        let records = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|error| {
                StoreError::CorruptStore {
                    path: path.clone(),
                    error,
                }
            })?,
            Err(error) if error.kind() == ErrorKind::NotFound => Vec::new(),
            Err(error) => return Err(StoreError::Persistence { path, error }),
        };
        Ok(Self { path, records })
    }

    pub fn empty<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            records: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insertion-ordered, read-only view of the records.
    pub fn list(&self) -> &[BookmarkRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn find(&self, ip: NormalizedIp) -> Option<&BookmarkRecord> {
        self.position(ip).map(|index| &self.records[index])
    }

    /// Appends and persists. The record's IP must not be bookmarked yet.
    pub fn add(&mut self, record: BookmarkRecord) -> Result<(), StoreError> {
        if self.position(record.ip).is_some() {
            return Err(StoreError::DuplicateIp(record.ip));
        }
        let mut next = self.records.clone();
        next.push(record);
        self.commit(next)
    }

    /// Replaces the record for `old_ip` in place, keeping its position in
    /// the display order, and persists. Fails if `old_ip` is absent or the
    /// new IP collides with a different entry.
    pub fn update(
        &mut self,
        old_ip: NormalizedIp,
        record: BookmarkRecord,
    ) -> Result<(), StoreError> {
        let index = self
            .position(old_ip)
            .ok_or(StoreError::NotFound(old_ip))?;
        if record.ip != old_ip && self.position(record.ip).is_some() {
            return Err(StoreError::DuplicateIp(record.ip));
        }
        let mut next = self.records.clone();
        next[index] = record;
        self.commit(next)
    }

    /// Removes and persists, returning the removed record.
    pub fn remove(&mut self, ip: NormalizedIp) -> Result<BookmarkRecord, StoreError> {
        let index = self.position(ip).ok_or(StoreError::NotFound(ip))?;
        let mut next = self.records.clone();
        let removed = next.remove(index);
        self.commit(next)?;
        Ok(removed)
    }

    fn position(&self, ip: NormalizedIp) -> Option<usize> {
        self.records.iter().position(|record| record.ip == ip)
    }

    // The whole file is rewritten on every mutation; the in-memory list is
    // only swapped after the write succeeded.
    fn commit(&mut self, next: Vec<BookmarkRecord>) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(&next).map_err(|error| {
            StoreError::Persistence {
                path: self.path.clone(),
                error: std::io::Error::new(ErrorKind::InvalidData, error),
            }
        })?;
        std::fs::write(&self.path, json).map_err(|error| StoreError::Persistence {
            path: self.path.clone(),
            error,
        })?;
        self.records = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::IpDetails;
    use tempfile::TempDir;

    fn record(ip: &str, city: &str) -> BookmarkRecord {
        BookmarkRecord {
            ip: ip.parse().unwrap(),
            added_at: None,
            details: IpDetails {
                city: Some(city.to_owned()),
                ..IpDetails::default()
            },
        }
    }

    fn store_in(dir: &TempDir) -> BookmarkStore {
        BookmarkStore::load(dir.path().join("bookmarks.json")).unwrap()
    }

    #[test]
    fn missing_file_is_empty_store() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert!(store.is_empty());
    }

    #[test]
    fn corrupt_file_is_surfaced() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bookmarks.json");
        std::fs::write(&path, "{ not json ]").unwrap();
        assert!(matches!(
            BookmarkStore::load(&path),
            Err(StoreError::CorruptStore { .. })
        ));
    }

    #[test]
    fn add_then_find_on_normalized_form() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        let added = record("::ffff:8.8.8.8", "Mountain View");
        store.add(added.clone()).unwrap();
        let found = store.find("8.8.8.8".parse().unwrap()).unwrap();
        assert_eq!(found, &added);
    }

    #[test]
    fn duplicate_add_leaves_store_unchanged() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        store.add(record("8.8.8.8", "Mountain View")).unwrap();
        let before = store.list().to_vec();
        assert!(matches!(
            store.add(record("8.8.8.8", "Elsewhere")),
            Err(StoreError::DuplicateIp(_))
        ));
        assert_eq!(store.list(), before.as_slice());
    }

    #[test]
    fn remove_missing_leaves_store_unchanged() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        store.add(record("8.8.8.8", "Mountain View")).unwrap();
        let before = store.list().to_vec();
        assert!(matches!(
            store.remove("1.1.1.1".parse().unwrap()),
            Err(StoreError::NotFound(_))
        ));
        assert_eq!(store.list(), before.as_slice());
    }

    #[test]
    fn reload_reproduces_in_memory_sequence() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        store.add(record("8.8.8.8", "Mountain View")).unwrap();
        store.add(record("1.1.1.1", "Sydney")).unwrap();
        store.remove("8.8.8.8".parse().unwrap()).unwrap();
        store.add(record("9.9.9.9", "Berkeley")).unwrap();

        let reloaded = BookmarkStore::load(store.path()).unwrap();
        assert_eq!(reloaded.list(), store.list());
    }

    #[test]
    fn single_add_round_trip() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        store.add(record("8.8.8.8", "Mountain View")).unwrap();
        assert_eq!(store.len(), 1);

        let reloaded = BookmarkStore::load(store.path()).unwrap();
        assert_eq!(reloaded.len(), 1);
        let only = &reloaded.list()[0];
        assert_eq!(only.ip, "8.8.8.8".parse().unwrap());
        assert_eq!(only.details.city.as_deref(), Some("Mountain View"));
    }

    #[test]
    fn update_same_ip_replaces_details_in_place() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        store.add(record("1.1.1.1", "Sydney")).unwrap();
        store.add(record("8.8.8.8", "Mountain View")).unwrap();

        store
            .update("1.1.1.1".parse().unwrap(), record("1.1.1.1", "Melbourne"))
            .unwrap();
        assert_eq!(store.list()[0].details.city.as_deref(), Some("Melbourne"));
        assert_eq!(store.list()[1].ip, "8.8.8.8".parse().unwrap());
    }

    #[test]
    fn update_to_new_ip_keeps_position() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        store.add(record("1.1.1.1", "Sydney")).unwrap();
        store.add(record("8.8.8.8", "Mountain View")).unwrap();

        store
            .update("1.1.1.1".parse().unwrap(), record("9.9.9.9", "Berkeley"))
            .unwrap();
        let ips: Vec<String> = store.list().iter().map(|r| r.ip.to_string()).collect();
        assert_eq!(ips, ["9.9.9.9", "8.8.8.8"]);
        assert!(store.find("1.1.1.1".parse().unwrap()).is_none());
    }

    #[test]
    fn update_collision_with_other_entry_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        store.add(record("1.1.1.1", "Sydney")).unwrap();
        store.add(record("8.8.8.8", "Mountain View")).unwrap();

        assert!(matches!(
            store.update("1.1.1.1".parse().unwrap(), record("8.8.8.8", "Elsewhere")),
            Err(StoreError::DuplicateIp(_))
        ));
        assert_eq!(store.list()[0].details.city.as_deref(), Some("Sydney"));
    }

    #[test]
    fn update_missing_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        assert!(matches!(
            store.update("1.1.1.1".parse().unwrap(), record("1.1.1.1", "Sydney")),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn failed_write_rolls_back_add() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        store.add(record("8.8.8.8", "Mountain View")).unwrap();
        let before = store.list().to_vec();

        // Point the store at an unwritable path: the parent directory of
        // the new location does not exist.
        store.path = dir.path().join("missing").join("bookmarks.json");
        assert!(matches!(
            store.add(record("1.1.1.1", "Sydney")),
            Err(StoreError::Persistence { .. })
        ));
        assert_eq!(store.list(), before.as_slice());
    }
}
