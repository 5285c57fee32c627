//! Thread-safe live-entity collections
//!
//! Structural changes (insert, sweep, clear) take the write lock; whole
//! collection scans take the read lock. Snapshots clone the slot handles so
//! callers iterate without holding any lock, and a slot appended or removed
//! mid-iteration never disturbs them.

use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::entity::{Body, EntityId, Slot};
use crate::consts::LOCK_TIMEOUT;
use crate::error::{CoreError, CoreResult};

pub struct Registry<T> {
    name: &'static str,
    slots: RwLock<Vec<Arc<Slot<T>>>>,
}

impl<T: Body> Registry<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            slots: RwLock::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    fn lock_timeout(&self) -> CoreError {
        CoreError::LockTimeout {
            registry: self.name,
            timeout_ms: LOCK_TIMEOUT.as_millis() as u64,
        }
    }

    /// Insert unless `cap` active entities are already present.
    /// The count and the push happen under one write lock.
    pub fn insert_within(&self, id: EntityId, body: T, cap: usize) -> CoreResult<Arc<Slot<T>>> {
        let mut slots = self.write()?;
        let active = slots.iter().filter(|s| s.is_active()).count();
        if active >= cap {
            return Err(CoreError::PopulationCap {
                kind: self.name,
                cap,
            });
        }
        let slot = Arc::new(Slot::new(id, body));
        slots.push(Arc::clone(&slot));
        Ok(slot)
    }

    /// Active slots, in insertion order. Waits for the lock.
    pub fn snapshot(&self) -> Vec<Arc<Slot<T>>> {
        self.slots
            .read()
            .iter()
            .filter(|s| s.is_active())
            .cloned()
            .collect()
    }

    /// Like [`snapshot`](Self::snapshot) but gives up after the lock timeout
    pub fn try_snapshot(&self) -> CoreResult<Vec<Arc<Slot<T>>>> {
        Ok(self.read()?.iter().filter(|s| s.is_active()).cloned().collect())
    }

    /// [`try_snapshot`](Self::try_snapshot) that keeps the first timeout in
    /// `skipped` and yields no slots, so one contended registry does not
    /// hold back the others
    pub fn snapshot_or_skip(&self, skipped: &mut Option<CoreError>) -> Vec<Arc<Slot<T>>> {
        self.try_snapshot().unwrap_or_else(|e| {
            log::debug!("{} skipped this step: {}", self.name, e);
            skipped.get_or_insert(e);
            Vec::new()
        })
    }

    /// Run `f` over every slot with the read lock held for the whole scan
    pub fn scan<R>(&self, f: impl FnOnce(&[Arc<Slot<T>>]) -> R) -> CoreResult<R> {
        let slots = self.read()?;
        Ok(f(&slots))
    }

    /// Slots held, active or not
    pub fn len(&self) -> CoreResult<usize> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> CoreResult<bool> {
        Ok(self.read()?.is_empty())
    }

    pub fn active_count(&self) -> CoreResult<usize> {
        Ok(self.read()?.iter().filter(|s| s.is_active()).count())
    }

    /// Deactivate and drop one entity
    pub fn remove(&self, id: EntityId) -> CoreResult<bool> {
        let mut slots = self.write()?;
        match slots.iter().position(|s| s.id() == id) {
            Some(index) => {
                let slot = slots.swap_remove(index);
                slot.deactivate();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Evict inactive slots; returns how many went
    pub fn sweep_inactive(&self) -> CoreResult<usize> {
        let mut slots = self.write()?;
        let before = slots.len();
        slots.retain(|s| s.is_active());
        Ok(before - slots.len())
    }

    /// Deactivate and drop everything; returns how many were active
    pub fn clear(&self) -> usize {
        match self.write() {
            Ok(mut slots) => slots.drain(..).filter(|s| s.deactivate()).count(),
            Err(_) => {
                // Entities stop counting right away; cleanup evicts them later
                log::warn!("{} clear contended, deactivating in place", self.name);
                self.deactivate_all().unwrap_or_else(|e| {
                    log::warn!("{} clear skipped: {}", self.name, e);
                    0
                })
            }
        }
    }

    /// Deactivate everything without changing the structure
    pub fn deactivate_all(&self) -> CoreResult<usize> {
        Ok(self.read()?.iter().filter(|s| s.deactivate()).count())
    }

    fn read(&self) -> CoreResult<RwLockReadGuard<'_, Vec<Arc<Slot<T>>>>> {
        self.slots
            .try_read_for(LOCK_TIMEOUT)
            .ok_or_else(|| self.lock_timeout())
    }

    fn write(&self) -> CoreResult<RwLockWriteGuard<'_, Vec<Arc<Slot<T>>>>> {
        self.slots
            .try_write_for(LOCK_TIMEOUT)
            .ok_or_else(|| self.lock_timeout())
    }

    /// Hold the write lock, standing in for a long structural change
    #[cfg(test)]
    pub(crate) fn lock_exclusive(&self) -> RwLockWriteGuard<'_, Vec<Arc<Slot<T>>>> {
        self.slots.write()
    }
}
