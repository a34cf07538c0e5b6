//! Collaborator contracts: the durable step counter and runtime settings.
//!
//! The engine never persists anything itself. It reads the durable total
//! once at construction and forwards every increment, fire-and-forget.
//! Settings are re-read on every query because the host may change them
//! at any time.

use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Sender};
use tracing::{debug, warn};

use crate::error::StoreError;

/// Durable, externally owned total step counter.
pub trait StepTotalStore {
    /// Current persisted total. Called once at engine construction.
    fn read_total(&self) -> Result<u32, StoreError>;

    /// Add `delta` (never 0) to the persisted total.
    ///
    /// Implementations must not block the caller for I/O; wrap slow stores
    /// in [`BackgroundStore`].
    fn increment_total(&self, delta: u32) -> Result<(), StoreError>;
}

/// Host-owned runtime settings.
///
/// `None` means the value has not been loaded yet; the engine then uses the
/// safe default (`false`).
pub trait SettingsSource {
    fn pocket_detection_enabled(&self) -> Option<bool>;

    fn light_reminder_enabled(&self) -> Option<bool> {
        None
    }
}

impl<T: StepTotalStore + ?Sized> StepTotalStore for Arc<T> {
    fn read_total(&self) -> Result<u32, StoreError> {
        (**self).read_total()
    }

    fn increment_total(&self, delta: u32) -> Result<(), StoreError> {
        (**self).increment_total(delta)
    }
}

impl<T: SettingsSource + ?Sized> SettingsSource for Arc<T> {
    fn pocket_detection_enabled(&self) -> Option<bool> {
        (**self).pocket_detection_enabled()
    }

    fn light_reminder_enabled(&self) -> Option<bool> {
        (**self).light_reminder_enabled()
    }
}

// ============================================================================
// IN-MEMORY STORE
// ============================================================================

/// Process-local counter. Clones share the same total.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    total: Arc<AtomicU32>,
}

impl InMemoryStore {
    pub fn new(initial: u32) -> Self {
        Self {
            total: Arc::new(AtomicU32::new(initial)),
        }
    }

    pub fn total(&self) -> u32 {
        self.total.load(Ordering::Acquire)
    }
}

impl StepTotalStore for InMemoryStore {
    fn read_total(&self) -> Result<u32, StoreError> {
        Ok(self.total())
    }

    fn increment_total(&self, delta: u32) -> Result<(), StoreError> {
        // Saturate instead of wrapping.
        let _ = self
            .total
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |t| {
                Some(t.saturating_add(delta))
            });
        Ok(())
    }
}

// ============================================================================
// BACKGROUND STORE
// ============================================================================

enum WriteCommand {
    Increment(u32),
    Shutdown,
}

/// Moves increments of a slow store onto a dedicated writer thread.
///
/// `increment_total` only enqueues. Failures of the inner store are logged
/// by the writer and never reach the engine. Dropping the store drains the
/// queue and joins the writer.
pub struct BackgroundStore<S> {
    inner: Arc<S>,
    tx: Sender<WriteCommand>,
    worker: Option<JoinHandle<()>>,
}

impl<S> BackgroundStore<S>
where
    S: StepTotalStore + Send + Sync + 'static,
{
    pub fn spawn(inner: S) -> Self {
        let inner = Arc::new(inner);
        let (tx, rx) = unbounded::<WriteCommand>();

        let writer = Arc::clone(&inner);
        let worker = thread::spawn(move || {
            for command in rx.iter() {
                match command {
                    WriteCommand::Increment(delta) => {
                        if let Err(err) = writer.increment_total(delta) {
                            warn!(delta, %err, "durable step increment failed");
                        }
                    }
                    WriteCommand::Shutdown => break,
                }
            }
            debug!("background step writer stopped");
        });

        Self {
            inner,
            tx,
            worker: Some(worker),
        }
    }

    /// The wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S> StepTotalStore for BackgroundStore<S>
where
    S: StepTotalStore + Send + Sync + 'static,
{
    fn read_total(&self) -> Result<u32, StoreError> {
        self.inner.read_total()
    }

    fn increment_total(&self, delta: u32) -> Result<(), StoreError> {
        self.tx
            .send(WriteCommand::Increment(delta))
            .map_err(|_| StoreError::WorkerDisconnected)
    }
}

impl<S> Drop for BackgroundStore<S> {
    fn drop(&mut self) {
        let _ = self.tx.send(WriteCommand::Shutdown);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("background step writer panicked");
            }
        }
    }
}

// ============================================================================
// SHARED SETTINGS
// ============================================================================

const UNSET: u8 = 0;
const OFF: u8 = 1;
const ON: u8 = 2;

fn load_flag(flag: &AtomicU8) -> Option<bool> {
    match flag.load(Ordering::Acquire) {
        OFF => Some(false),
        ON => Some(true),
        _ => None,
    }
}

fn store_flag(flag: &AtomicU8, value: bool) {
    flag.store(if value { ON } else { OFF }, Ordering::Release);
}

/// Thread-safe settings the host can update while the engine runs.
#[derive(Debug)]
pub struct SharedSettings {
    pocket_detection: AtomicU8,
    light_reminder: AtomicU8,
}

impl SharedSettings {
    /// Settings not loaded yet: every flag reads as `None`.
    pub fn unloaded() -> Self {
        Self {
            pocket_detection: AtomicU8::new(UNSET),
            light_reminder: AtomicU8::new(UNSET),
        }
    }

    /// Settings with the stored defaults: pocket detection and light reminder on.
    pub fn with_defaults() -> Self {
        let settings = Self::unloaded();
        settings.set_pocket_detection(true);
        settings.set_light_reminder(true);
        settings
    }

    pub fn set_pocket_detection(&self, enabled: bool) {
        store_flag(&self.pocket_detection, enabled);
    }

    pub fn set_light_reminder(&self, enabled: bool) {
        store_flag(&self.light_reminder, enabled);
    }
}

impl Default for SharedSettings {
    fn default() -> Self {
        Self::unloaded()
    }
}

impl SettingsSource for SharedSettings {
    fn pocket_detection_enabled(&self) -> Option<bool> {
        load_flag(&self.pocket_detection)
    }

    fn light_reminder_enabled(&self) -> Option<bool> {
        load_flag(&self.light_reminder)
    }
}

/// Fixed settings, mostly for tests and replays.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticSettings {
    pub pocket_detection: Option<bool>,
    pub light_reminder: Option<bool>,
}

impl SettingsSource for StaticSettings {
    fn pocket_detection_enabled(&self) -> Option<bool> {
        self.pocket_detection
    }

    fn light_reminder_enabled(&self) -> Option<bool> {
        self.light_reminder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Records increments and optionally fails them.
    #[derive(Default)]
    struct RecordingStore {
        writes: Mutex<Vec<u32>>,
        fail: bool,
    }

    impl StepTotalStore for RecordingStore {
        fn read_total(&self) -> Result<u32, StoreError> {
            Ok(self.writes.lock().iter().sum())
        }

        fn increment_total(&self, delta: u32) -> Result<(), StoreError> {
            if self.fail {
                return Err(StoreError::write_failed(delta, "read-only"));
            }
            self.writes.lock().push(delta);
            Ok(())
        }
    }

    #[test]
    fn test_in_memory_store() {
        let store = InMemoryStore::new(10);
        let shared = store.clone();

        store.increment_total(5).unwrap();
        assert_eq!(shared.read_total().unwrap(), 15);

        store.increment_total(u32::MAX).unwrap();
        assert_eq!(shared.total(), u32::MAX);
    }

    #[test]
    fn test_background_store_drains_on_drop() {
        let recording = Arc::new(RecordingStore::default());
        {
            let store = BackgroundStore::spawn(Arc::clone(&recording));
            for delta in [1, 4, 2] {
                store.increment_total(delta).unwrap();
            }
        }
        assert_eq!(*recording.writes.lock(), vec![1, 4, 2]);
    }

    #[test]
    fn test_background_store_swallows_inner_failures() {
        let failing = RecordingStore {
            fail: true,
            ..Default::default()
        };
        let store = BackgroundStore::spawn(failing);
        assert!(store.increment_total(3).is_ok());
        assert_eq!(store.read_total().unwrap(), 0);
    }

    #[test]
    fn test_shared_settings() {
        let settings = SharedSettings::unloaded();
        assert_eq!(settings.pocket_detection_enabled(), None);
        assert_eq!(settings.light_reminder_enabled(), None);

        settings.set_pocket_detection(false);
        assert_eq!(settings.pocket_detection_enabled(), Some(false));

        let defaults = SharedSettings::with_defaults();
        assert_eq!(defaults.pocket_detection_enabled(), Some(true));
        assert_eq!(defaults.light_reminder_enabled(), Some(true));
    }

    #[test]
    fn test_static_settings_default_unloaded() {
        let settings = StaticSettings::default();
        assert_eq!(settings.pocket_detection_enabled(), None);
    }
}
