//! In-process cache backend (single resource-server instance).

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use crate::services::cache::client::{CacheClient, CacheError, CacheResult};

// Expired entries are swept after this many writes.
const SWEEP_EVERY_WRITES: usize = 256;

struct Slot {
    value: String,
    expires_at: Instant,
}

impl Slot {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

#[derive(Default)]
struct Inner {
    slots: HashMap<String, Slot>,
    writes_since_sweep: usize,
}

impl Inner {
    fn note_write(&mut self, now: Instant) {
        self.writes_since_sweep += 1;
        if self.writes_since_sweep >= SWEEP_EVERY_WRITES {
            self.slots.retain(|_, slot| slot.is_live(now));
            self.writes_since_sweep = 0;
        }
    }
}

/// `HashMap` behind an `RwLock`. Each operation takes the lock once, so a
/// reader never observes a half-applied write.
#[derive(Default)]
pub struct MemoryCacheClient {
    inner: RwLock<Inner>,
}

impl std::fmt::Debug for MemoryCacheClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCacheClient").finish_non_exhaustive()
    }
}

impl MemoryCacheClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> CacheResult<RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|_| CacheError::BackendCommand("memory cache lock poisoned".into()))
    }

    fn write(&self) -> CacheResult<RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|_| CacheError::BackendCommand("memory cache lock poisoned".into()))
    }
}

#[async_trait]
impl CacheClient for MemoryCacheClient {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn get_string(&self, key: &str) -> CacheResult<Option<String>> {
        let now = Instant::now();
        let inner = self.read()?;
        Ok(inner
            .slots
            .get(key)
            .filter(|slot| slot.is_live(now))
            .map(|slot| slot.value.clone()))
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        let now = Instant::now();
        let mut inner = self.write()?;
        inner.slots.insert(
            key.to_string(),
            Slot {
                value: value.to_string(),
                expires_at: now + ttl,
            },
        );
        inner.note_write(now);
        Ok(())
    }

    async fn set_if_absent_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> CacheResult<bool> {
        let now = Instant::now();
        let mut inner = self.write()?;
        if inner.slots.get(key).is_some_and(|slot| slot.is_live(now)) {
            return Ok(false);
        }
        inner.slots.insert(
            key.to_string(),
            Slot {
                value: value.to_string(),
                expires_at: now + ttl,
            },
        );
        inner.note_write(now);
        Ok(true)
    }

    async fn del(&self, key: &str) -> CacheResult<u64> {
        let mut inner = self.write()?;
        Ok(inner.slots.remove(key).map_or(0, |_| 1))
    }
}
