//! The §10 supplemented Builder API: a host assembles one [`MediationController`]
//! by registering its transports, adapters, and credential source, then
//! calling [`MediationCoreBuilder::build`] once at startup.

use crate::config::MediationConfig;
use crate::controller::MediationController;
use crate::credential::{CredentialProvider, NullCredentialProvider};
use crate::executor::{self, Executor};
use crate::fallback::{FallbackPresenter, UnwiredFallbackPresenter};
use crate::presentation::PresentationCoordinator;
use mediation_cache::AdCache;
use mediation_circuit_breaker::CircuitBreakerConfig;
use mediation_clock::{MonotonicClock, SystemMonotonicClock};
use mediation_config::{AlwaysValidVerifier, ConfigGate, ConfigStore, ConfigTransport, InMemoryConfigStore, SignatureVerifier};
use mediation_registry::{AdapterDescriptor, AdapterFactory, AdapterRegistry, PlatformContext};
use mediation_s2s::{S2sClient, S2sTransport};
use mediation_telemetry::{ObservabilityConfig, Projector};
use std::collections::BTreeMap;
use std::sync::Arc;

pub struct MediationCoreBuilder {
    clock: Arc<dyn MonotonicClock>,
    config: MediationConfig,
    publisher_id: String,
    config_transport: Option<Arc<dyn ConfigTransport>>,
    config_verifier: Option<Arc<dyn SignatureVerifier>>,
    config_store: Option<Arc<dyn ConfigStore>>,
    config_public_key: Option<Vec<u8>>,
    s2s_transport: Option<Arc<dyn S2sTransport>>,
    s2s_api_key: Option<String>,
    credential_provider: Option<Arc<dyn CredentialProvider>>,
    adapters: Vec<(AdapterDescriptor, Arc<dyn AdapterFactory>)>,
    fallback_presenter: Option<Arc<dyn FallbackPresenter>>,
    platform_context: PlatformContext,
    caller_affine_executor: Option<Arc<dyn Executor>>,
    background_executor_capacity: usize,
}

impl MediationCoreBuilder {
    pub fn new(publisher_id: impl Into<String>) -> Self {
        Self {
            clock: Arc::new(SystemMonotonicClock::new()),
            config: MediationConfig::default(),
            publisher_id: publisher_id.into(),
            config_transport: None,
            config_verifier: None,
            config_store: None,
            config_public_key: None,
            s2s_transport: None,
            s2s_api_key: None,
            credential_provider: None,
            adapters: Vec::new(),
            fallback_presenter: None,
            platform_context: PlatformContext::default(),
            caller_affine_executor: None,
            background_executor_capacity: 8,
        }
    }

    pub fn with_config(mut self, config: MediationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn MonotonicClock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_config_transport(mut self, transport: Arc<dyn ConfigTransport>) -> Self {
        self.config_transport = Some(transport);
        self
    }

    pub fn with_config_verifier(mut self, verifier: Arc<dyn SignatureVerifier>) -> Self {
        self.config_verifier = Some(verifier);
        self
    }

    pub fn with_config_store(mut self, store: Arc<dyn ConfigStore>) -> Self {
        self.config_store = Some(store);
        self
    }

    pub fn with_config_public_key(mut self, public_key: Vec<u8>) -> Self {
        self.config_public_key = Some(public_key);
        self
    }

    pub fn with_s2s_transport(mut self, transport: Arc<dyn S2sTransport>) -> Self {
        self.s2s_transport = Some(transport);
        self
    }

    /// Presence, not the value, gates S2S eligibility; the key itself is
    /// only ever handed to the transport, never logged or compared.
    pub fn with_s2s_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.s2s_api_key = Some(api_key.into());
        self
    }

    pub fn with_credential_provider(mut self, provider: Arc<dyn CredentialProvider>) -> Self {
        self.credential_provider = Some(provider);
        self
    }

    pub fn with_adapter(mut self, descriptor: AdapterDescriptor, factory: Arc<dyn AdapterFactory>) -> Self {
        self.adapters.push((descriptor, factory));
        self
    }

    pub fn with_fallback_presenter(mut self, presenter: Arc<dyn FallbackPresenter>) -> Self {
        self.fallback_presenter = Some(presenter);
        self
    }

    pub fn with_platform_context(mut self, platform_context: PlatformContext) -> Self {
        self.platform_context = platform_context;
        self
    }

    pub fn with_caller_affine_executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.caller_affine_executor = Some(executor);
        self
    }

    /// Bounds the background executor's concurrent task count (config
    /// refresh, credential validation sweeps). Ignored in test mode, where
    /// the background executor always runs inline.
    pub fn with_background_executor_capacity(mut self, capacity: usize) -> Self {
        self.background_executor_capacity = capacity;
        self
    }

    pub fn build(self) -> Arc<MediationController> {
        let test_mode = self.config.test_mode;
        let breaker_config: CircuitBreakerConfig = self.config.circuit_breaker;

        let config_transport = self.config_transport.expect("MediationCoreBuilder requires a config transport");
        let config_gate = Arc::new(ConfigGate::new(
            self.clock.clone(),
            config_transport,
            self.config_verifier.unwrap_or_else(|| Arc::new(AlwaysValidVerifier)),
            self.config_store.unwrap_or_else(|| Arc::new(InMemoryConfigStore::default())),
            test_mode,
            self.config_public_key,
            self.config.config_ttl,
        ));

        let registry = Arc::new(AdapterRegistry::new(self.clock.clone(), breaker_config));
        let mut descriptors = BTreeMap::new();
        for (descriptor, factory) in self.adapters {
            registry.register(&descriptor.name, factory);
            descriptors.insert(descriptor.name.to_ascii_lowercase(), descriptor);
        }
        registry.initialize(&self.platform_context);

        let cache = Arc::new(AdCache::new(self.clock.clone(), registry.clone()));

        let network_executor = executor::network_executor(test_mode);
        let caller_affine = self.caller_affine_executor.unwrap_or_else(|| network_executor.clone());
        let background_executor = executor::background_executor(test_mode, self.background_executor_capacity);

        let presentation = Arc::new(PresentationCoordinator::new(self.clock.clone(), network_executor.clone(), self.config.render_timeout, !test_mode));

        let observability: ObservabilityConfig = self.config.observability.clone();
        let projector = Arc::new(Projector::new(observability));

        let s2s_api_key_present = self.s2s_api_key.is_some();
        let s2s_client = self.s2s_transport.map(S2sClient::new).map(Arc::new);

        Arc::new(MediationController {
            clock: self.clock,
            config: self.config,
            config_gate,
            registry,
            cache,
            s2s_client,
            s2s_api_key_present,
            publisher_id: self.publisher_id,
            credential_provider: self.credential_provider.unwrap_or_else(|| Arc::new(NullCredentialProvider)),
            descriptors,
            network_executor,
            caller_affine,
            background_executor,
            presentation,
            fallback_presenter: self.fallback_presenter.unwrap_or_else(|| Arc::new(UnwiredFallbackPresenter)),
            projector,
        })
    }
}
