//! Scan store -- the record set shared by orchestrator and scheduler.
//!
//! Every mutation goes through [`ScanStore::update`], which applies a
//! closure to one scan while holding that scan's lock, so readers never
//! see a half-applied transition. Records are partitioned per scan id;
//! updates to different scans do not contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use uuid::Uuid;
use watchpost_core::{Scan, StorageError};

/// Persistence boundary for scans.
pub trait ScanStore: Send + Sync {
    /// Stores a new scan.
    fn insert(&self, scan: Scan) -> Result<(), StorageError>;

    /// Snapshot of one scan.
    fn get(&self, id: Uuid) -> Result<Option<Scan>, StorageError>;

    /// Applies `apply` atomically and returns the updated snapshot.
    fn update(&self, id: Uuid, apply: &mut dyn FnMut(&mut Scan)) -> Result<Scan, StorageError>;

    /// Up to `limit` scans accepted by `matches`, newest first. The filter
    /// runs before the cap.
    fn recent(
        &self,
        limit: usize,
        matches: &dyn Fn(&Scan) -> bool,
    ) -> Result<Vec<Scan>, StorageError>;
}

/// Runs `f` on scan `id` and returns its result with the updated snapshot.
pub fn update_with<R>(
    store: &dyn ScanStore,
    id: Uuid,
    f: impl FnOnce(&mut Scan) -> R,
) -> Result<(R, Scan), StorageError> {
    let mut f = Some(f);
    let mut result = None;
    let scan = store.update(id, &mut |scan| {
        if let Some(f) = f.take() {
            result = Some(f(scan));
        }
    })?;
    match result {
        Some(r) => Ok((r, scan)),
        None => Err(StorageError::WriteFailed(format!(
            "update of scan {id} was not applied"
        ))),
    }
}

/// In-memory [`ScanStore`].
#[derive(Debug, Default)]
pub struct MemoryScanStore {
    scans: RwLock<HashMap<Uuid, Arc<Mutex<Scan>>>>,
}

impl MemoryScanStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, id: Uuid) -> Result<Option<Arc<Mutex<Scan>>>, StorageError> {
        let scans = self.scans.read().map_err(|_| poisoned())?;
        Ok(scans.get(&id).cloned())
    }
}

fn poisoned() -> StorageError {
    StorageError::WriteFailed("scan store lock poisoned".to_owned())
}

impl ScanStore for MemoryScanStore {
    fn insert(&self, scan: Scan) -> Result<(), StorageError> {
        let mut scans = self.scans.write().map_err(|_| poisoned())?;
        if scans.contains_key(&scan.id) {
            return Err(StorageError::WriteFailed(format!(
                "scan {} already exists",
                scan.id
            )));
        }
        scans.insert(scan.id, Arc::new(Mutex::new(scan)));
        Ok(())
    }

    fn get(&self, id: Uuid) -> Result<Option<Scan>, StorageError> {
        match self.entry(id)? {
            Some(entry) => {
                let scan = entry.lock().map_err(|_| poisoned())?;
                Ok(Some(scan.clone()))
            }
            None => Ok(None),
        }
    }

    fn update(&self, id: Uuid, apply: &mut dyn FnMut(&mut Scan)) -> Result<Scan, StorageError> {
        let entry = self
            .entry(id)?
            .ok_or_else(|| StorageError::NotFound(id.to_string()))?;
        let mut scan = entry.lock().map_err(|_| poisoned())?;
        apply(&mut *scan);
        Ok(scan.clone())
    }

    fn recent(
        &self,
        limit: usize,
        matches: &dyn Fn(&Scan) -> bool,
    ) -> Result<Vec<Scan>, StorageError> {
        let entries: Vec<_> = {
            let scans = self.scans.read().map_err(|_| poisoned())?;
            scans.values().cloned().collect()
        };
        let mut snapshots = Vec::new();
        for entry in &entries {
            let scan = entry.lock().map_err(|_| poisoned())?;
            if matches(&*scan) {
                snapshots.push(scan.clone());
            }
        }
        snapshots.sort_by(|a, b| b.created.cmp(&a.created).then_with(|| b.id.cmp(&a.id)));
        snapshots.truncate(limit);
        Ok(snapshots)
    }
}
