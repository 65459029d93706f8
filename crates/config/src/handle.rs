use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::model::{ChecksumConfig, CopyConfig, QuirkConfig, TransportSettings};

/// Shared, process-scoped configuration.
///
/// Clones share state. Transport settings written through one clone are
/// seen by every copy that reads them afterwards; the last writer wins.
#[derive(Debug, Clone, Default)]
pub struct ConfigHandle {
    inner: Arc<RwLock<CopyConfig>>,
}

impl ConfigHandle {
    pub fn new(config: CopyConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// Returns a copy of the whole configuration.
    pub fn snapshot(&self) -> CopyConfig {
        self.read().clone()
    }

    pub fn checksum(&self) -> ChecksumConfig {
        self.read().checksum.clone()
    }

    pub fn quirks(&self) -> QuirkConfig {
        self.read().quirks.clone()
    }

    pub fn transport(&self) -> TransportSettings {
        self.read().transport
    }

    pub fn set_transport(&self, settings: TransportSettings) {
        self.write().transport = settings;
    }

    /// Turns off session reuse and stat-on-open for all later transfers.
    ///
    /// Returns `true` if either flag was still enabled.
    pub fn disable_session_reuse(&self) -> bool {
        let mut config = self.write();
        let changed = config.transport.session_reuse || config.transport.stat_on_open;
        config.transport.session_reuse = false;
        config.transport.stat_on_open = false;
        changed
    }

    // The guarded data are plain values, so a poisoned lock is still usable.
    fn read(&self) -> RwLockReadGuard<'_, CopyConfig> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, CopyConfig> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl From<CopyConfig> for ConfigHandle {
    fn from(config: CopyConfig) -> Self {
        Self::new(config)
    }
}
