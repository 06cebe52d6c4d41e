//! # Runtime
//!
//! Owns the exclusivity region and the registry of live logical threads.
//! Cloning a [`Runtime`] is cheap; every clone refers to the same region.
//!
//! ## Entry point
//!
//! ```rust,ignore
//! let runtime = Runtime::new(RuntimeConfig::default())?;
//! let code = runtime.run(|| {
//!     // runs as a logical thread, holding the region
//!     0
//! })?;
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::ThreadId;
use std::time::Duration;

use parking_lot::RwLock;

use crate::config::RuntimeConfig;
use crate::error::{RuntimeError, RuntimeResult};
use crate::region::{Exclusive, ExclusivityRegion, StrategyKind};
use crate::thread::{LogicalId, LogicalThread, ThreadCore, ThreadHandle};

struct RuntimeInner {
    config: RuntimeConfig,
    region: Arc<ExclusivityRegion>,
    registry: RwLock<HashMap<ThreadId, ThreadHandle>>,
    next_id: AtomicU64,
}

/// Cooperative logical-thread runtime over one exclusivity region.
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

impl Runtime {
    /// Creates a runtime from a validated configuration.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::InvalidConfig`] if `config` fails validation.
    pub fn new(config: RuntimeConfig) -> RuntimeResult<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    /// Creates a runtime with default settings and an explicit strategy.
    #[must_use]
    pub fn with_strategy(strategy: StrategyKind) -> Self {
        Self::build(RuntimeConfig::with_strategy(strategy))
    }

    fn build(config: RuntimeConfig) -> Self {
        let region = Arc::new(ExclusivityRegion::new(
            config.strategy,
            config.max_transaction_retries,
        ));
        tracing::info!(
            strategy = %config.strategy,
            max_transaction_retries = config.max_transaction_retries,
            "runtime created"
        );
        Self {
            inner: Arc::new(RuntimeInner {
                config,
                region,
                registry: RwLock::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// The configuration this runtime was built with.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    /// The runtime's exclusivity region.
    #[inline]
    #[must_use]
    pub fn region(&self) -> &Arc<ExclusivityRegion> {
        &self.inner.region
    }

    /// The strategy of the region.
    #[inline]
    #[must_use]
    pub fn strategy(&self) -> StrategyKind {
        self.inner.region.strategy()
    }

    /// Wraps `value` in a cell guarded by this runtime's region.
    #[must_use]
    pub fn exclusive<T>(&self, value: T) -> Exclusive<T> {
        Exclusive::new(Arc::clone(&self.inner.region), value)
    }

    /// Spawns a logical thread named `<prefix>-<id>`.
    ///
    /// The thread competes for the region as soon as it starts; the caller
    /// does not need to hold it.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::SpawnFailed`] if the OS cannot create the thread.
    pub fn spawn<F, T>(&self, f: F) -> RuntimeResult<LogicalThread<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.spawn_inner(None, f)
    }

    /// Spawns a logical thread with an explicit name.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::SpawnFailed`] if the OS cannot create the thread.
    pub fn spawn_named<F, T>(&self, name: impl Into<String>, f: F) -> RuntimeResult<LogicalThread<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.spawn_inner(Some(name.into()), f)
    }

    fn spawn_inner<F, T>(&self, name: Option<String>, f: F) -> RuntimeResult<LogicalThread<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let id = LogicalId::new(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let name = name.unwrap_or_else(|| format!("{}-{}", self.inner.config.thread_name_prefix, id.get()));
        let handle = ThreadHandle::new(ThreadCore::new(
            id,
            name.clone(),
            Arc::clone(&self.inner.region),
        ));

        let mut builder = std::thread::Builder::new().name(name.clone());
        if let Some(size) = self.inner.config.stack_size {
            builder = builder.stack_size(size);
        }

        let runtime = self.clone();
        let own = handle.clone();
        let os = builder
            .spawn(move || {
                let _registration = Registration::bind(&runtime, &own);
                let _active = own.activate();
                f()
            })
            .map_err(|e| RuntimeError::SpawnFailed {
                name: name.clone(),
                reason: e.to_string(),
            })?;

        tracing::debug!(thread = %id, name = %name, "logical thread spawned");
        Ok(LogicalThread::new(handle, os))
    }

    /// Handle of the calling logical thread.
    ///
    /// # Panics
    ///
    /// Panics when called from an OS thread that was not spawned by this
    /// runtime.
    #[must_use]
    pub fn current(&self) -> ThreadHandle {
        match self.try_current() {
            Some(handle) => handle,
            None => panic!(
                "Runtime::current called from OS thread {:?}, which is not a logical thread of this runtime",
                std::thread::current().id()
            ),
        }
    }

    /// Handle of the calling logical thread, if it is one.
    #[must_use]
    pub fn try_current(&self) -> Option<ThreadHandle> {
        self.inner
            .registry
            .read()
            .get(&std::thread::current().id())
            .cloned()
    }

    /// Gives other logical threads a chance to run.
    ///
    /// # Panics
    ///
    /// Panics if the calling OS thread does not hold the region.
    pub fn yield_now(&self) {
        self.inner.region.exit();
        std::thread::yield_now();
        self.inner.region.enter();
    }

    /// Sleeps without holding the region.
    ///
    /// # Panics
    ///
    /// Panics if the calling OS thread does not hold the region.
    pub fn sleep(&self, duration: Duration) {
        self.inner.region.exit();
        std::thread::sleep(duration);
        self.inner.region.enter();
    }

    /// Number of logical threads currently running their body.
    #[must_use]
    pub fn live_threads(&self) -> usize {
        self.inner.registry.read().len()
    }

    /// Runs `f` as the first logical thread and waits for it.
    ///
    /// Enters the region, spawns, joins, exits. The calling OS thread must
    /// not hold the region already.
    ///
    /// # Errors
    ///
    /// Spawn failures and a panic of `f`, as [`RuntimeError`].
    pub fn run<F, T>(&self, f: F) -> RuntimeResult<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let _guard = self.inner.region.hold();
        let main = self.spawn_named(format!("{}-main", self.inner.config.thread_name_prefix), f)?;
        main.join()
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::build(RuntimeConfig::default())
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("region", &self.inner.region)
            .field("live_threads", &self.live_threads())
            .finish()
    }
}

/// Makes a logical thread discoverable through [`Runtime::current`] for the
/// duration of its body.
struct Registration<'a> {
    runtime: &'a Runtime,
    os_thread: ThreadId,
}

impl<'a> Registration<'a> {
    fn bind(runtime: &'a Runtime, handle: &ThreadHandle) -> Self {
        let os_thread = std::thread::current().id();
        handle.bind_os_thread(os_thread);
        runtime
            .inner
            .registry
            .write()
            .insert(os_thread, handle.clone());
        Self { runtime, os_thread }
    }
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.runtime.inner.registry.write().remove(&self.os_thread);
    }
}
