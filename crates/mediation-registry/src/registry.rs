use crate::adapter::{Adapter, AdapterFactory, AdapterLoadResponse, PlatformContext, ShowCallbacks, ViewContext};
use crate::error::{AdapterError, AdapterErrorCode};
use crate::exactly_once::ExactlyOnceCallbacks;
use mediation_cache::{HandleInvalidator, RuntimeHandleId};
use mediation_circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitStateSnapshot};
use mediation_clock::MonotonicClock;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct InitState {
    last_signature: Option<String>,
    initialized: bool,
    /// Set by a fatal load error (§7: "disabled until next init signature
    /// change"); cleared only when `ensure_initialized` observes a
    /// credential signature different from `last_signature`.
    disabled: bool,
}

/// A per-adapter operational read: its circuit state and last init
/// signature, for host diagnostics screens.
#[derive(Debug, Clone)]
pub struct AdapterHealth {
    pub name: String,
    pub circuit_state: CircuitStateSnapshot,
    pub last_init_signature: Option<String>,
    pub disabled: bool,
}

fn credential_signature(credentials: &BTreeMap<String, String>) -> String {
    // Hashing, never logging: the signature lets `ensure_initialized` tell
    // whether effective credentials changed without ever retaining or
    // printing a credential value.
    let mut hasher = Sha256::new();
    for (key, value) in credentials {
        hasher.update(key.as_bytes());
        hasher.update([0u8]);
        hasher.update(value.as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}

/// Holds adapter factories registered by host code at startup; instantiates
/// them lazily; manages per-adapter init idempotency, circuit breaking, and
/// the weak handle->adapter lookup used to invalidate runtime handles.
pub struct AdapterRegistry {
    clock: Arc<dyn MonotonicClock>,
    breaker_config: CircuitBreakerConfig,
    factories: Mutex<BTreeMap<String, Arc<dyn AdapterFactory>>>,
    instances: Mutex<BTreeMap<String, Arc<dyn Adapter>>>,
    init_locks: Mutex<BTreeMap<String, Arc<tokio::sync::Mutex<InitState>>>>,
    breakers: Mutex<BTreeMap<String, Arc<CircuitBreaker>>>,
    handle_owners: Mutex<BTreeMap<RuntimeHandleId, String>>,
}

impl AdapterRegistry {
    pub fn new(clock: Arc<dyn MonotonicClock>, breaker_config: CircuitBreakerConfig) -> Self {
        Self {
            clock,
            breaker_config,
            factories: Mutex::new(BTreeMap::new()),
            instances: Mutex::new(BTreeMap::new()),
            init_locks: Mutex::new(BTreeMap::new()),
            breakers: Mutex::new(BTreeMap::new()),
            handle_owners: Mutex::new(BTreeMap::new()),
        }
    }

    fn normalize(name: &str) -> String {
        name.to_ascii_lowercase()
    }

    /// Case-insensitive; the latest registration for a name wins as long as
    /// it happens before `initialize()`.
    pub fn register(&self, name: &str, factory: Arc<dyn AdapterFactory>) {
        self.factories.lock().unwrap().insert(Self::normalize(name), factory);
    }

    /// Eagerly instantiates one instance per registered factory.
    pub fn initialize(&self, _platform_context: &PlatformContext) {
        let factories = self.factories.lock().unwrap();
        let mut instances = self.instances.lock().unwrap();
        for (name, factory) in factories.iter() {
            tracing::debug!(adapter = %name, "instantiating adapter");
            instances.insert(name.clone(), factory.create());
        }
    }

    pub fn known_names(&self) -> Vec<String> {
        self.instances.lock().unwrap().keys().cloned().collect()
    }

    /// Returns entries in the order requested, silently dropping unknown
    /// names (placement adapter lists outlive individual registrations).
    pub fn runtime_entries(&self, names: &[String]) -> Vec<(String, Arc<dyn Adapter>)> {
        let instances = self.instances.lock().unwrap();
        names
            .iter()
            .filter_map(|name| {
                let key = Self::normalize(name);
                instances.get(&key).map(|adapter| (key, adapter.clone()))
            })
            .collect()
    }

    fn init_lock_for(&self, name: &str) -> Arc<tokio::sync::Mutex<InitState>> {
        self.init_locks
            .lock()
            .unwrap()
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(InitState { last_signature: None, initialized: false, disabled: false })))
            .clone()
    }

    fn breaker_for(&self, name: &str) -> Arc<CircuitBreaker> {
        self.breakers
            .lock()
            .unwrap()
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(self.breaker_config, self.clock.clone())))
            .clone()
    }

    pub fn is_circuit_open(&self, name: &str) -> bool {
        self.breaker_for(&Self::normalize(name)).is_open()
    }

    /// Non-blocking: if another task currently holds the per-adapter init
    /// lock this reports "not disabled" rather than waiting, the same
    /// best-effort posture `health_snapshot` already takes on this state.
    pub fn is_disabled(&self, name: &str) -> bool {
        let lock = self.init_lock_for(&Self::normalize(name));
        lock.try_lock().map(|state| state.disabled).unwrap_or(false)
    }

    /// Marks an adapter disabled after a fatal load error (§7). Stays
    /// disabled until `ensure_initialized` next observes a credential
    /// signature different from the one that was last active.
    async fn disable_adapter(&self, key: &str) {
        let lock = self.init_lock_for(key);
        let mut state = lock.lock().await;
        state.disabled = true;
        state.initialized = false;
        tracing::warn!(adapter = %key, "adapter disabled after a fatal load error; excluded from auctions until its credential signature changes");
    }

    pub fn record_circuit_success(&self, name: &str) {
        self.breaker_for(&Self::normalize(name)).record_success();
    }

    pub fn record_circuit_failure(&self, name: &str) {
        self.breaker_for(&Self::normalize(name)).record_failure();
    }

    /// Serializes on a per-adapter async lock (picked through a sync lock on
    /// the lock map itself, §4.3.1) so concurrent loads for different
    /// adapters never block each other, while at most one init per adapter
    /// name runs at a time. Re-runs `init` when the credential signature
    /// differs from the last successful one, or the prior attempt failed.
    pub async fn ensure_initialized(
        &self,
        adapter_name: &str,
        credentials: BTreeMap<String, String>,
        timeout: Duration,
    ) -> Result<(), AdapterError> {
        let key = Self::normalize(adapter_name);
        let adapter = {
            let instances = self.instances.lock().unwrap();
            instances
                .get(&key)
                .cloned()
                .ok_or_else(|| AdapterError::fatal(AdapterErrorCode::Config, format!("adapter '{adapter_name}' is not registered")))?
        };

        let signature = credential_signature(&credentials);
        let lock = self.init_lock_for(&key);
        let mut state = lock.lock().await;

        let same_signature = state.last_signature.as_deref() == Some(signature.as_str());

        if state.initialized && !state.disabled && same_signature {
            return Ok(());
        }

        if state.disabled && same_signature {
            return Err(AdapterError::fatal(
                AdapterErrorCode::Config,
                format!("adapter '{adapter_name}' is disabled after a fatal load error; credentials unchanged"),
            ));
        }

        // Credentials changed since the last fatal disablement (or this is
        // the first init attempt): give the adapter a fresh chance.
        state.disabled = false;

        let platform_context = PlatformContext::default();
        let result = tokio::time::timeout(timeout, adapter.init(&platform_context, &credentials)).await;
        match result {
            Ok(Ok(())) => {
                state.initialized = true;
                state.last_signature = Some(signature);
                Ok(())
            }
            Ok(Err(err)) => {
                state.initialized = false;
                Err(err)
            }
            Err(_elapsed) => {
                state.initialized = false;
                Err(AdapterError::recoverable(AdapterErrorCode::Timeout, "adapter init timed out"))
            }
        }
    }

    /// Suspends until the adapter yields a result or `timeout` elapses.
    /// Registers any returned runtime handle's owning adapter for later
    /// weak-lookup invalidation.
    pub async fn load_interstitial(
        &self,
        adapter_name: &str,
        placement: &str,
        request_meta: &BTreeMap<String, String>,
        timeout: Duration,
    ) -> Result<AdapterLoadResponse, AdapterError> {
        let key = Self::normalize(adapter_name);
        let adapter = {
            let instances = self.instances.lock().unwrap();
            instances
                .get(&key)
                .cloned()
                .ok_or_else(|| AdapterError::fatal(AdapterErrorCode::Config, format!("adapter '{adapter_name}' is not registered")))?
        };

        match tokio::time::timeout(timeout, adapter.load_interstitial(placement, request_meta)).await {
            Ok(Ok(response)) => {
                if let Some(handle) = &response.handle {
                    self.handle_owners.lock().unwrap().insert(handle.clone(), key.clone());
                }
                Ok(response)
            }
            Ok(Err(err)) => {
                if err.fatal {
                    self.disable_adapter(&key).await;
                }
                Err(err)
            }
            Err(_elapsed) => Err(AdapterError::recoverable(AdapterErrorCode::Timeout, "adapter load timed out")),
        }
    }

    /// Dispatches on whatever executor the caller already arranged (the
    /// registry itself makes no thread-affinity decisions); guarantees
    /// exactly-once delivery of the terminal callback even if the adapter
    /// calls back more than once.
    pub async fn show_interstitial(&self, adapter_name: &str, handle: &RuntimeHandleId, view_context: &ViewContext, callbacks: Arc<dyn ShowCallbacks>) {
        let wrapped = ExactlyOnceCallbacks::wrap(callbacks);
        let adapter = self.instances.lock().unwrap().get(&Self::normalize(adapter_name)).cloned();
        match adapter {
            Some(adapter) => adapter.show_interstitial(handle, view_context, wrapped).await,
            None => wrapped.on_error(&AdapterError::fatal(AdapterErrorCode::Config, format!("adapter '{adapter_name}' is not registered"))),
        }
    }

    pub async fn show_rewarded(&self, adapter_name: &str, handle: &RuntimeHandleId, view_context: &ViewContext, callbacks: Arc<dyn ShowCallbacks>) {
        let wrapped = ExactlyOnceCallbacks::wrap(callbacks);
        let adapter = self.instances.lock().unwrap().get(&Self::normalize(adapter_name)).cloned();
        match adapter {
            Some(adapter) => adapter.show_rewarded(handle, view_context, wrapped).await,
            None => wrapped.on_error(&AdapterError::fatal(AdapterErrorCode::Config, format!("adapter '{adapter_name}' is not registered"))),
        }
    }

    pub async fn show_banner(&self, adapter_name: &str, handle: &RuntimeHandleId, view_context: &ViewContext, callbacks: Arc<dyn ShowCallbacks>) {
        let wrapped = ExactlyOnceCallbacks::wrap(callbacks);
        let adapter = self.instances.lock().unwrap().get(&Self::normalize(adapter_name)).cloned();
        match adapter {
            Some(adapter) => adapter.show_banner(handle, view_context, wrapped).await,
            None => wrapped.on_error(&AdapterError::fatal(AdapterErrorCode::Config, format!("adapter '{adapter_name}' is not registered"))),
        }
    }

    pub fn health_snapshot(&self) -> Vec<AdapterHealth> {
        let names = self.known_names();
        let signatures = self.init_locks.lock().unwrap();
        names
            .into_iter()
            .map(|name| {
                let state = signatures.get(&name).and_then(|lock| lock.try_lock().ok());
                let last_init_signature = state.as_ref().and_then(|state| state.last_signature.clone());
                let disabled = state.as_ref().map(|state| state.disabled).unwrap_or(false);
                AdapterHealth { circuit_state: self.breaker_for(&name).snapshot(), name, last_init_signature, disabled }
            })
            .collect()
    }

    /// Cancels per-adapter scopes and clears registries. Best-effort: a
    /// panicking `invalidate()` during teardown does not stop the rest.
    pub fn shutdown(&self) {
        tracing::info!("adapter registry shutdown: releasing outstanding handles");
        let owners: Vec<(RuntimeHandleId, String)> = self.handle_owners.lock().unwrap().drain().collect();
        let instances = self.instances.lock().unwrap();
        for (handle, adapter_name) in owners {
            if let Some(adapter) = instances.get(&adapter_name) {
                Self::invalidate_guarded(adapter.as_ref(), &handle);
            }
        }
        drop(instances);
        self.instances.lock().unwrap().clear();
        self.factories.lock().unwrap().clear();
        self.init_locks.lock().unwrap().clear();
        self.breakers.lock().unwrap().clear();
        tracing::info!("adapter registry shutdown complete");
    }

    fn invalidate_guarded(adapter: &dyn Adapter, handle: &RuntimeHandleId) {
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| adapter.invalidate(handle)));
        if outcome.is_err() {
            tracing::error!("adapter panicked during invalidate(); ignoring, per best-effort contract");
        }
    }
}

impl HandleInvalidator for AdapterRegistry {
    /// Best-effort release: looks up the owning adapter from the weak
    /// handle->name map recorded in `load_interstitial` and asks it to
    /// release the resource. Never propagates a panic outward.
    fn invalidate(&self, handle: &RuntimeHandleId) {
        let owner = self.handle_owners.lock().unwrap().remove(handle);
        let Some(adapter_name) = owner else {
            return;
        };
        let adapter = self.instances.lock().unwrap().get(&adapter_name).cloned();
        if let Some(adapter) = adapter {
            Self::invalidate_guarded(adapter.as_ref(), handle);
        }
    }
}
