use crate::error::AdapterError;
use async_trait::async_trait;
use mediation_cache::RuntimeHandleId;
use std::collections::BTreeMap;

/// A name, S2S capability, and the set of credential key names an adapter
/// needs resolved from the host's credential provider. The core never owns
/// credential values themselves (§3 Adapter Descriptor).
#[derive(Debug, Clone)]
pub struct AdapterDescriptor {
    pub name: String,
    pub supports_s2s: bool,
    pub required_credential_keys: Vec<String>,
    pub enabled: bool,
    pub priority: i32,
}

/// Opaque platform handoff supplied at `initialize()`; the core treats it
/// as a bag of host-defined values and never inspects it.
#[derive(Debug, Clone, Default)]
pub struct PlatformContext {
    pub values: BTreeMap<String, String>,
}

/// Opaque view/surface handoff supplied at show time.
#[derive(Debug, Clone, Default)]
pub struct ViewContext {
    pub surface_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    Closed,
    Dismissed,
}

#[derive(Debug, Clone)]
pub struct PaidEvent {
    pub price_micros: u64,
    pub currency: String,
    pub precision: String,
}

/// Terminal/non-terminal show callbacks. `on_closed`/`on_error` are the two
/// terminal members; the registry guarantees at most one of them ever
/// fires per show attempt, regardless of what the adapter itself does.
pub trait ShowCallbacks: Send + Sync {
    fn on_impression(&self, _meta: &BTreeMap<String, String>) {}
    fn on_paid_event(&self, _event: &PaidEvent) {}
    fn on_click(&self, _meta: &BTreeMap<String, String>) {}
    fn on_reward_verified(&self, _reward_type: &str, _amount: f64) {}
    fn on_closed(&self, reason: CloseReason);
    fn on_error(&self, error: &AdapterError);
}

/// What an adapter's `load_interstitial` hands back on success: a runtime
/// handle to a ready-to-show resource, its own TTL (if the adapter knows
/// one), and redacted partner metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct AdapterLoadResponse {
    pub handle: Option<RuntimeHandleId>,
    pub ttl_ms: Option<u64>,
    pub price_micros: Option<u64>,
    pub currency: Option<String>,
    pub partner_meta: BTreeMap<String, String>,
}

impl AdapterLoadResponse {
    /// The core models auction scoring as a single `f64` eCPM; adapters
    /// report `price_micros` (and an informational `currency`, not used in
    /// scoring since the core does no currency conversion). Absent price
    /// scores as `0.0`, which only wins an auction if every other
    /// candidate also failed to report a price.
    pub fn ecpm_usd(&self) -> f64 {
        self.price_micros.map(|micros| micros as f64 / 1_000_000.0).unwrap_or(0.0)
    }
}

/// A pluggable integration with one third-party demand source.
#[async_trait]
pub trait Adapter: Send + Sync {
    async fn init(&self, platform_context: &PlatformContext, credentials: &BTreeMap<String, String>) -> Result<(), AdapterError>;

    async fn load_interstitial(
        &self,
        placement: &str,
        request_meta: &BTreeMap<String, String>,
    ) -> Result<AdapterLoadResponse, AdapterError>;

    async fn show_interstitial(&self, handle: &RuntimeHandleId, view_context: &ViewContext, callbacks: std::sync::Arc<dyn ShowCallbacks>);

    async fn show_rewarded(&self, handle: &RuntimeHandleId, view_context: &ViewContext, callbacks: std::sync::Arc<dyn ShowCallbacks>);

    /// Renders a banner into `view_context`'s surface (§6 `show_banner(viewContainer, handle)`).
    /// Same terminal-callback contract as `show_interstitial`/`show_rewarded`:
    /// `on_closed` fires when the adapter tears the banner down (e.g. the
    /// view is detached), `on_error` on a render failure.
    async fn show_banner(&self, handle: &RuntimeHandleId, view_context: &ViewContext, callbacks: std::sync::Arc<dyn ShowCallbacks>);

    /// Best-effort release; must never panic or propagate an error. The
    /// registry also guards every call site against a panicking adapter.
    fn invalidate(&self, handle: &RuntimeHandleId);
}

/// Host-registered factory producing one adapter instance. Registered by
/// name at startup; `AdapterRegistry::initialize` instantiates one
/// instance per registered factory.
pub trait AdapterFactory: Send + Sync {
    fn create(&self) -> std::sync::Arc<dyn Adapter>;
}
