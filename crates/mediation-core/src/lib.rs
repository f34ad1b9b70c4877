//! The Mediation Core: orchestrates an S2S-first, adapter-fallback ad
//! auction across a configurable set of third-party demand sources, behind
//! a signed remote config, a per-adapter circuit breaker, and a
//! single-slot ad cache.

mod builder;
mod config;
mod controller;
mod credential;
mod error;
mod executor;
mod facade;
mod fallback;
mod presentation;
mod validation;

pub use builder::MediationCoreBuilder;
pub use config::{MediationConfig, Mode};
pub use controller::MediationController;
pub use credential::{CredentialProvider, NullCredentialProvider};
pub use error::{LoadError, LoadOutcome, ShowError};
pub use executor::{BoundedExecutor, Executor, InlineExecutor, TokioExecutor};
pub use fallback::{FallbackPresenter, UnwiredFallbackPresenter};
pub use presentation::PresentationCoordinator;
pub use validation::{ValidationReport, ValidationResult, ValidationStatus};

/// Facade/global handle (§10): `mediation_core::install(controller)` then
/// `mediation_core::current()` from anywhere in the host process.
pub use facade::{current, install};
#[cfg(any(test, feature = "test-util"))]
pub use facade::reset;

// Re-exported so a host only needs `mediation-core` on its own dependency
// line for the collaborator types its builder methods take.
pub use mediation_cache::{Ad, AdFormat, RuntimeHandleId};
pub use mediation_circuit_breaker::{CircuitBreakerConfig, CircuitStateSnapshot};
pub use mediation_clock::{FakeClock, MonotonicClock, SystemMonotonicClock};
pub use mediation_config::{
    AlwaysValidVerifier, ConfigDiff, ConfigError, ConfigFetchError, ConfigGate, ConfigStore, ConfigTransport, FeatureFlags, InMemoryConfigStore,
    Placement, RemoteConfig, SignatureVerifier,
};
pub use mediation_registry::{
    Adapter, AdapterDescriptor, AdapterError, AdapterErrorCode, AdapterFactory, AdapterHealth, AdapterLoadResponse, CloseReason, PaidEvent,
    PlatformContext, ShowCallbacks, ViewContext,
};
pub use mediation_s2s::{ConsentSignals, S2sBidResponse, S2sErrorKind, S2sOutcome, S2sRequest, S2sTransport, S2sTransportError, S2sTransportResponse};
pub use mediation_telemetry::{ObservabilityConfig, Outcome, OutcomeCounters, Percentiles, Phase, Projector, TelemetrySpan};
