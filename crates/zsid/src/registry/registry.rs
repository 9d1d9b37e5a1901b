use core::fmt;
use std::{collections::HashMap, sync::Arc};

use parking_lot::{Mutex, MutexGuard, RwLock};
use portable_atomic::{AtomicU64, Ordering};
#[cfg(feature = "tracing")]
use std::time::Instant;
#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    AssignError, Error, GenerateError, GeneratorHandle, MonotonicClock, RegistryConfig, Result,
    TimeSource, UidFields, WorkerIdProvider, registry::gate::RefreshGate,
};

/// Proof that the caller holds the registry's build lock.
type BuildGuard<'a> = MutexGuard<'a, ()>;

/// A keyed registry of worker-id-bound UID generators.
///
/// Every configured domain gets its own [`GeneratorHandle`], built lazily on
/// first use with a worker id leased from the [`WorkerIdProvider`]. Handles
/// are rebuilt wholesale by [`Registry::refresh_all`] and individually when a
/// generator fails.
///
/// ## Synchronization
/// - One coarse build lock serializes every change to the mapping. Lookups
///   of already-built handles only take a short read lock on the mapping and
///   never wait for the build lock.
/// - A refresh gate admits one [`Registry::refresh_all`] at a time. Lookups
///   arriving while a refresh runs park until it finishes.
/// - A domain that is absent is built at most once per absence window, no
///   matter how many threads ask for it concurrently.
///
/// Share a registry between threads by reference or through an [`Arc`].
///
/// # Example
///
/// ```
/// use zsid::{Registry, RegistryConfig, SequentialWorkerIdProvider};
///
/// let registry = Registry::with_provider(
///     RegistryConfig::default(),
///     SequentialWorkerIdProvider::new(1, (1 << 20) - 1),
/// )
/// .unwrap();
///
/// let uid = registry.next_id("DefaultUser").unwrap();
/// let fields = registry.decode_id("DefaultUser", uid).unwrap();
/// assert_eq!(fields.worker_id, 1);
///
/// assert!(registry.next_id("Unknown").is_err());
/// ```
pub struct Registry<P, T = MonotonicClock> {
    config: RegistryConfig,
    provider: P,
    time: T,
    handles: RwLock<HashMap<String, Arc<GeneratorHandle<T>>>>,
    build_lock: Mutex<()>,
    gate: RefreshGate,
    generation: AtomicU64,
}

impl<P> Registry<P, MonotonicClock>
where
    P: WorkerIdProvider,
{
    /// Creates a registry whose generators read a [`MonotonicClock`] anchored
    /// at [`DEFAULT_EPOCH`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `config` fails validation.
    ///
    /// [`DEFAULT_EPOCH`]: crate::DEFAULT_EPOCH
    pub fn with_provider(config: RegistryConfig, provider: P) -> Result<Self> {
        Self::new(config, provider, MonotonicClock::default())
    }
}

impl<P, T> Registry<P, T>
where
    P: WorkerIdProvider,
    T: TimeSource + Clone + Send + Sync + 'static,
{
    /// Creates an empty registry. No handle is built until first use or the
    /// first [`Self::refresh_all`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `config` fails validation.
    pub fn new(config: RegistryConfig, provider: P, time: T) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            provider,
            time,
            handles: RwLock::new(HashMap::new()),
            build_lock: Mutex::new(()),
            gate: RefreshGate::new(),
            generation: AtomicU64::new(0),
        })
    }

    /// Rebuilds the handle of every configured domain from scratch.
    ///
    /// Only one refresh runs at a time; a concurrent call waits for the
    /// running one to finish and then performs its own. The mapping is
    /// cleared first and domains are rebuilt in lexical order.
    ///
    /// # Errors
    ///
    /// The first domain that fails to build aborts the refresh and its error
    /// is returned. That domain and every domain after it stay absent until
    /// they are next resolved.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(self)))]
    pub fn refresh_all(&self) -> Result<()> {
        #[cfg(feature = "tracing")]
        let start = Instant::now();

        let _ticket = self.gate.enter();
        let guard = self.build_lock.lock();

        let stale = core::mem::take(&mut *self.handles.write());
        let _generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;

        #[cfg(feature = "tracing")]
        tracing::info!(
            generation = _generation,
            dropped = stale.len(),
            "refreshing all generators"
        );
        drop(stale);

        for (key, _) in self.config.domains() {
            self.build_key(key, &guard)?;
        }

        #[cfg(feature = "tracing")]
        tracing::info!(
            generation = _generation,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "refresh done"
        );
        Ok(())
    }

    /// Returns the live handle for `key`, building it if it is absent.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidDomain`] if `key` is not configured. Checked before
    ///   anything else, including waiting for a running refresh.
    /// - [`Error::Assignment`] or [`Error::Generation`] if building the handle
    ///   failed. Nothing is installed in that case.
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    pub fn resolve(&self, key: &str) -> Result<Arc<GeneratorHandle<T>>> {
        if !self.config.contains(key) {
            return Err(Error::invalid_domain(key));
        }

        loop {
            self.gate.wait_settled();
            if let Some(handle) = self.lookup(key) {
                return Ok(handle);
            }

            #[cfg(feature = "tracing")]
            let start = Instant::now();

            let guard = self.build_lock.lock();
            // A refresh that passed the gate but not yet the lock rebuilds
            // this domain anyway.
            if self.gate.is_active() {
                drop(guard);
                continue;
            }

            if self.lookup(key).is_none() {
                #[cfg(feature = "tracing")]
                tracing::warn!(domain = key, "no generator for domain, building one");
                self.build_key(key, &guard)?;
            }
            let handle = self.lookup(key).ok_or_else(|| Error::unresolved_domain(key));
            drop(guard);

            #[cfg(feature = "tracing")]
            tracing::debug!(
                domain = key,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "slow path resolve done"
            );
            return handle;
        }
    }

    /// Produces the next UID for `key`.
    ///
    /// If the generator fails, the domain is rebuilt with a fresh worker id
    /// and the call is retried once on the new handle.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidDomain`] if `key` is not configured.
    /// - [`Error::Assignment`] if a worker id could not be leased.
    /// - [`Error::Generation`] if the retry failed as well.
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    pub fn next_id(&self, key: &str) -> Result<u64> {
        self.with_recovery(key, |handle| handle.produce())
    }

    /// Decodes `uid` with the generator of `key`.
    ///
    /// Follows the same rebuild-and-retry-once policy as [`Self::next_id`].
    /// A malformed UID therefore costs a rebuild of the domain, including a
    /// fresh worker id lease and, for buffered domains, a refilled buffer.
    /// Callers decoding untrusted input should check
    /// [`UidLayout::decompose`] first.
    ///
    /// [`UidLayout::decompose`]: crate::UidLayout::decompose
    ///
    /// # Errors
    ///
    /// Same as [`Self::next_id`]; a UID that cannot belong to the layout
    /// surfaces as [`Error::Generation`].
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    pub fn decode_id(&self, key: &str, uid: u64) -> Result<UidFields> {
        self.with_recovery(key, |handle| handle.decode(uid))
    }

    fn with_recovery<R>(
        &self,
        key: &str,
        op: impl Fn(&GeneratorHandle<T>) -> Result<R, GenerateError>,
    ) -> Result<R> {
        let handle = self.resolve(key)?;
        let _err = match op(&handle) {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        #[cfg(feature = "tracing")]
        tracing::error!(
            domain = key,
            worker_id = handle.worker_id(),
            "generator failed, rebuilding: {_err}"
        );

        let fresh = self.rebuild(key, &handle)?;
        drop(handle);
        op(&fresh).map_err(Error::from)
    }

    /// Replaces the handle that just failed, unless another thread already
    /// did, and returns the handle now installed.
    fn rebuild(
        &self,
        key: &str,
        failed: &Arc<GeneratorHandle<T>>,
    ) -> Result<Arc<GeneratorHandle<T>>> {
        let guard = self.build_lock.lock();
        match self.lookup(key) {
            Some(current) if !Arc::ptr_eq(&current, failed) => Ok(current),
            _ => self.build_key(key, &guard),
        }
    }

    /// Leases a worker id, builds the configured variant for `key` and
    /// installs it, replacing any previous handle.
    fn build_key(&self, key: &str, _guard: &BuildGuard<'_>) -> Result<Arc<GeneratorHandle<T>>> {
        let variant = self
            .config
            .variant(key)
            .ok_or_else(|| Error::invalid_domain(key))?;

        let token = self.provider.assign()?;
        let layout = self.config.layout();
        if token.get() > layout.max_worker_id() {
            return Err(AssignError::OutOfRange {
                id: token.get(),
                max: layout.max_worker_id(),
            }
            .into());
        }

        let generation = self.generation.load(Ordering::Acquire);
        let handle = Arc::new(GeneratorHandle::build(
            key,
            token,
            generation,
            variant,
            layout,
            self.time.clone(),
            self.config.buffer(),
        )?);

        let _previous = self
            .handles
            .write()
            .insert(key.to_owned(), Arc::clone(&handle));

        #[cfg(feature = "tracing")]
        tracing::info!(
            domain = key,
            worker_id = token.get(),
            %variant,
            generation,
            replaced = _previous.is_some(),
            "generator built"
        );

        Ok(handle)
    }
}

impl<P, T> Registry<P, T> {
    fn lookup(&self, key: &str) -> Option<Arc<GeneratorHandle<T>>> {
        self.handles.read().get(key).cloned()
    }

    /// The handle currently installed for `key`, without building one.
    pub fn peek(&self, key: &str) -> Option<Arc<GeneratorHandle<T>>> {
        self.lookup(key)
    }

    /// Domains that currently have a handle installed, in lexical order.
    pub fn built_domains(&self) -> Vec<String> {
        let mut domains: Vec<_> = self.handles.read().keys().cloned().collect();
        domains.sort_unstable();
        domains
    }

    /// Number of refreshes started so far.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// The configuration this registry was built with.
    pub const fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// The worker id provider generators are leased from.
    pub const fn provider(&self) -> &P {
        &self.provider
    }
}

impl<P, T> fmt::Debug for Registry<P, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("config", &self.config)
            .field("generation", &self.generation())
            .field("built", &self.built_domains())
            .finish_non_exhaustive()
    }
}
