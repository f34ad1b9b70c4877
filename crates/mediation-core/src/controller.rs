//! The Mediation Controller: the central `load()`/`show()` orchestrator
//! (§4.6). Assembled exclusively through [`crate::builder::MediationCoreBuilder`].

use crate::config::{MediationConfig, Mode};
use crate::credential::CredentialProvider;
use crate::error::{LoadError, LoadOutcome, ShowError};
use crate::executor::Executor;
use crate::fallback::FallbackPresenter;
use crate::presentation::PresentationCoordinator;
use crate::validation::{ValidationReport, ValidationResult};
use mediation_cache::{Ad, AdCache, AdFormat, HandleInvalidator};
use mediation_clock::MonotonicClock;
use mediation_config::{ConfigGate, Placement};
use mediation_registry::{AdapterDescriptor, AdapterError, AdapterErrorCode, AdapterHealth, AdapterRegistry, ShowCallbacks, ViewContext};
use mediation_s2s::{ConsentSignals, S2sClient, S2sErrorKind, S2sOutcome, S2sRequest};
use mediation_telemetry::{redact_metadata, Outcome, Projector, TelemetrySpan};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub struct MediationController {
    pub(crate) clock: Arc<dyn MonotonicClock>,
    pub(crate) config: MediationConfig,
    pub(crate) config_gate: Arc<ConfigGate>,
    pub(crate) registry: Arc<AdapterRegistry>,
    pub(crate) cache: Arc<AdCache>,
    pub(crate) s2s_client: Option<Arc<S2sClient>>,
    pub(crate) s2s_api_key_present: bool,
    pub(crate) publisher_id: String,
    pub(crate) credential_provider: Arc<dyn CredentialProvider>,
    pub(crate) descriptors: BTreeMap<String, AdapterDescriptor>,
    pub(crate) network_executor: Arc<dyn Executor>,
    pub(crate) caller_affine: Arc<dyn Executor>,
    pub(crate) background_executor: Arc<dyn Executor>,
    pub(crate) presentation: Arc<PresentationCoordinator>,
    pub(crate) fallback_presenter: Arc<dyn FallbackPresenter>,
    pub(crate) projector: Arc<Projector>,
}

/// Wraps a host's show callbacks so the presentation slot is released the
/// instant the terminal callback fires, exactly once, regardless of
/// whether the show went through an adapter or the markup fallback path.
struct ReleasingCallbacks {
    inner: Arc<dyn ShowCallbacks>,
    presentation: Arc<PresentationCoordinator>,
    placement: String,
    attempt: u64,
    released: AtomicBool,
}

impl ReleasingCallbacks {
    fn wrap(inner: Arc<dyn ShowCallbacks>, presentation: Arc<PresentationCoordinator>, placement: String, attempt: u64) -> Arc<Self> {
        Arc::new(Self { inner, presentation, placement, attempt, released: AtomicBool::new(false) })
    }

    /// Returns `true` the first time it's called for this attempt. The
    /// render-timeout watchdog and the genuine adapter callback race to
    /// deliver the terminal callback; only the winner forwards to the host.
    fn release_once(&self) -> bool {
        if !self.released.swap(true, Ordering::SeqCst) {
            self.presentation.release_attempt(&self.placement, self.attempt);
            true
        } else {
            false
        }
    }
}

impl ShowCallbacks for ReleasingCallbacks {
    fn on_impression(&self, meta: &BTreeMap<String, String>) {
        self.inner.on_impression(meta);
    }

    fn on_paid_event(&self, event: &mediation_registry::PaidEvent) {
        self.inner.on_paid_event(event);
    }

    fn on_click(&self, meta: &BTreeMap<String, String>) {
        self.inner.on_click(meta);
    }

    fn on_reward_verified(&self, reward_type: &str, amount: f64) {
        self.inner.on_reward_verified(reward_type, amount);
    }

    fn on_closed(&self, reason: mediation_registry::CloseReason) {
        if self.release_once() {
            self.inner.on_closed(reason);
        }
    }

    fn on_error(&self, error: &AdapterError) {
        if self.release_once() {
            self.inner.on_error(error);
        }
    }
}

impl MediationController {
    fn s2s_eligible(&self) -> bool {
        !matches!(self.config.mode, Mode::Byo) && self.config.enable_s2s_when_capable && self.s2s_api_key_present && self.s2s_client.is_some()
    }

    /// Sampling draw for telemetry. Test mode always samples, so a test
    /// asserting on `Projector` state never depends on an RNG outcome.
    fn sample(&self) -> f64 {
        if self.config.test_mode {
            0.0
        } else {
            rand::random::<f64>()
        }
    }

    fn default_ttl(&self, placement: &Placement) -> Duration {
        placement
            .refresh_interval_secs
            .map(|secs| Duration::from_secs(secs as u64 * 2))
            .unwrap_or(Duration::from_secs(3_600))
    }

    /// `Ok(Some(_))` is a filled auction, `Ok(None)` means "not eligible or
    /// no-fill, fall through to adapter fan-out", `Err(_)` is a terminal
    /// S2S failure that should be surfaced to the caller directly.
    async fn try_s2s(&self, placement: &Placement, trace_id: &str) -> Result<Option<LoadOutcome>, LoadError> {
        if !self.s2s_eligible() {
            return Ok(None);
        }
        let client = self.s2s_client.as_ref().expect("checked by s2s_eligible").clone();
        let timeout = Duration::from_millis(placement.timeout_ms.max(100) as u64);
        let request = S2sRequest {
            publisher_id: self.publisher_id.clone(),
            placement_id: placement.placement_id.clone(),
            floor_cpm: placement.floor_price,
            adapters: placement.enabled_networks.clone(),
            metadata: BTreeMap::new(),
            auction_type: "waterfall".to_string(),
            consent: ConsentSignals::default(),
        };

        self.projector.record(TelemetrySpan::start(trace_id, &placement.placement_id, "s2s"), self.sample());
        let start = self.clock.now();

        match client.request(&request, timeout).await {
            Ok(S2sOutcome::Fill(bid)) => {
                let latency_ms = self.clock.now().saturating_duration_since(start).as_millis() as u64;
                let span = TelemetrySpan::finish(trace_id, &placement.placement_id, "s2s", Outcome::Fill, latency_ms).with_metadata(&bid.metadata);
                self.projector.record(span, self.sample());

                let ttl = bid.ttl_ms.map(Duration::from_millis).unwrap_or_else(|| self.default_ttl(placement));
                let ecpm = bid.ecpm;
                let ad = Ad::new(
                    Uuid::new_v4().to_string(),
                    placement.placement_id.clone(),
                    "s2s",
                    placement.ad_type,
                    ecpm,
                    bid.creative,
                    bid.metadata,
                    None,
                    None,
                    self.clock.now(),
                )
                .map_err(|err| LoadError::InternalError(err.to_string()))?;
                self.cache.put(&placement.placement_id, ad, ttl);
                Ok(Some(LoadOutcome { placement: placement.placement_id.clone(), adapter: "s2s".to_string(), ecpm }))
            }
            Ok(S2sOutcome::NoFill) | Ok(S2sOutcome::BelowFloor) => {
                let latency_ms = self.clock.now().saturating_duration_since(start).as_millis() as u64;
                self.projector
                    .record(TelemetrySpan::finish(trace_id, &placement.placement_id, "s2s", Outcome::NoFill, latency_ms), self.sample());
                Ok(None)
            }
            Err(err) => {
                let latency_ms = self.clock.now().saturating_duration_since(start).as_millis() as u64;
                let outcome = if matches!(err, S2sErrorKind::Timeout) { Outcome::Timeout } else { Outcome::Error };
                let span = TelemetrySpan::finish(trace_id, &placement.placement_id, "s2s", outcome, latency_ms).with_error(err.code(), err.to_string());
                self.projector.record(span, self.sample());
                Err(match err {
                    S2sErrorKind::Timeout => LoadError::Timeout,
                    S2sErrorKind::NetworkError(_) | S2sErrorKind::Status5xx(_) => LoadError::NetworkError,
                    S2sErrorKind::NoFill | S2sErrorKind::BelowFloor => unreachable!("handled above as an Ok outcome"),
                    other => LoadError::InternalError(other.to_string()),
                })
            }
        }
    }

    /// The full §4.6 `load()` contract: validation-mode short-circuit, kill
    /// switch, placement resolution, an optional S2S first look, then
    /// bounded-parallel adapter fan-out racing the placement's overall wait
    /// budget, highest-eCPM-wins auction with enabled-networks tiebreak,
    /// and loser handle invalidation before the cache insert.
    pub async fn load(&self, placement_id: &str) -> Result<LoadOutcome, LoadError> {
        if self.config.validation_mode_enabled {
            return Err(LoadError::InternalError("validation_mode_enabled".to_string()));
        }
        if self.config_gate.feature_flags().kill_switch {
            return Err(LoadError::InternalError("kill_switch_active".to_string()));
        }
        let placement = self.config_gate.get_placement(placement_id).ok_or_else(|| LoadError::InvalidPlacement(placement_id.to_string()))?;
        let trace_id = Uuid::new_v4().to_string();

        if let Some(outcome) = self.try_s2s(&placement, &trace_id).await? {
            return Ok(outcome);
        }

        let candidates: Vec<String> = self
            .registry
            .runtime_entries(&placement.enabled_networks)
            .into_iter()
            .map(|(name, _)| name)
            .filter(|name| !self.registry.is_circuit_open(name) && !self.registry.is_disabled(name))
            .collect();

        if candidates.is_empty() {
            return Err(LoadError::NoFill);
        }

        let (tx, mut rx) = tokio::sync::mpsc::channel(candidates.len());
        for name in &candidates {
            let tx = tx.clone();
            let name = name.clone();
            let placement_id = placement.placement_id.clone();
            let registry = self.registry.clone();
            let credential_provider = self.credential_provider.clone();
            let per_call_timeout = Duration::from_millis(placement.timeout_ms as u64);
            let projector = self.projector.clone();
            let clock = self.clock.clone();
            let trace_id = trace_id.clone();
            let sample = self.sample();

            self.network_executor.spawn(Box::pin(async move {
                projector.record(TelemetrySpan::start(trace_id.clone(), placement_id.clone(), name.clone()), sample);
                let start = clock.now();
                let result = async {
                    // Credential lookups are a synchronous host callback (§6);
                    // bridge onto a blocking thread so a slow keychain lookup
                    // never stalls this executor's other tasks.
                    let lookup_name = name.clone();
                    let credentials = tokio::task::spawn_blocking(move || credential_provider.get(&lookup_name))
                        .await
                        .unwrap_or(None)
                        .unwrap_or_default();
                    registry.ensure_initialized(&name, credentials, per_call_timeout).await?;
                    registry.load_interstitial(&name, &placement_id, &BTreeMap::new(), per_call_timeout).await
                }
                .await;
                let latency_ms = clock.now().saturating_duration_since(start).as_millis() as u64;

                match &result {
                    Ok(_) => registry.record_circuit_success(&name),
                    Err(_) => registry.record_circuit_failure(&name),
                }

                let outcome = match &result {
                    Ok(_) => Outcome::Fill,
                    Err(err) if err.code == AdapterErrorCode::Timeout => Outcome::Timeout,
                    Err(_) => Outcome::Error,
                };
                let span = TelemetrySpan::finish(trace_id, placement_id, name.clone(), outcome, latency_ms);
                let span = match &result {
                    Err(err) => span.with_error(err.code.as_str(), err.message.clone()),
                    Ok(_) => span,
                };
                projector.record(span, sample);

                let _ = tx.send((name, result)).await;
            }));
        }
        drop(tx);

        // §4.6 step 8 / §5: the overall fan-out deadline is `placement.timeoutMs`,
        // the same budget each per-adapter task already self-bounds on, not
        // `maxWaitMs` (that field only bounds the S2S leg's own deadline floor).
        let global_deadline = Duration::from_millis(placement.timeout_ms as u64);
        let mut responses = HashMap::new();
        let _ = tokio::time::timeout(global_deadline, async {
            while let Some((name, result)) = rx.recv().await {
                responses.insert(name, result);
            }
        })
        .await;

        let mut winner: Option<(String, mediation_registry::AdapterLoadResponse)> = None;
        let mut losers: Vec<(String, mediation_registry::AdapterLoadResponse)> = Vec::new();
        for name in &candidates {
            let Some(Ok(response)) = responses.remove(name) else { continue };
            let ecpm = response.ecpm_usd();
            let supersedes = winner.as_ref().map(|(_, current)| ecpm > current.ecpm_usd()).unwrap_or(true);
            if supersedes {
                if let Some(previous) = winner.replace((name.clone(), response)) {
                    losers.push(previous);
                }
            } else {
                losers.push((name.clone(), response));
            }
        }

        for (_, response) in losers {
            if let Some(handle) = response.handle {
                self.registry.invalidate(&handle);
            }
        }

        match winner {
            Some((name, response)) => {
                let ecpm = response.ecpm_usd();
                let ttl = response.ttl_ms.map(Duration::from_millis).unwrap_or_else(|| self.default_ttl(&placement));
                let ad = Ad::new(
                    Uuid::new_v4().to_string(),
                    placement.placement_id.clone(),
                    name.clone(),
                    placement.ad_type,
                    ecpm,
                    Vec::new(),
                    response.partner_meta,
                    response.handle,
                    None,
                    self.clock.now(),
                )
                .map_err(|err| LoadError::InternalError(err.to_string()))?;
                self.cache.put(&placement.placement_id, ad, ttl);
                Ok(LoadOutcome { placement: placement.placement_id.clone(), adapter: name, ecpm })
            }
            None => Err(LoadError::NoFill),
        }
    }

    /// Callback-shim over [`Self::load`], dispatched on the caller-affine
    /// executor so the host's callback never runs on whatever task happened
    /// to finish last inside the fan-out.
    pub fn load_with_callback(self: &Arc<Self>, placement_id: String, callback: impl FnOnce(Result<LoadOutcome, LoadError>) + Send + 'static) {
        let this = self.clone();
        self.caller_affine.spawn(Box::pin(async move {
            let result = this.load(&placement_id).await;
            callback(result);
        }));
    }

    /// The §4.6 `show()` contract: peek without consuming, acquire the
    /// presentation slot, take (consuming) the cached ad, then dispatch to
    /// either the owning adapter or the markup fallback path. The slot is
    /// released exactly once, on the terminal callback.
    pub async fn show(&self, placement_id: &str, view_context: ViewContext, callbacks: Arc<dyn ShowCallbacks>) -> Result<(), ShowError> {
        if self.cache.peek(placement_id).is_none() {
            return Err(ShowError::NotReady);
        }
        let Some(attempt) = self.presentation.try_acquire(placement_id) else {
            return Err(ShowError::AlreadyShowing);
        };
        let ad = match self.cache.take(placement_id) {
            Some(ad) => ad,
            None => {
                self.presentation.release_attempt(placement_id, attempt);
                return Err(ShowError::NotReady);
            }
        };

        let releasing = ReleasingCallbacks::wrap(callbacks, self.presentation.clone(), placement_id.to_string(), attempt);
        self.presentation.arm_watchdog(placement_id, attempt, releasing.clone());

        match &ad.runtime_handle {
            Some(handle) => {
                let timed_out = match ad.format {
                    AdFormat::Rewarded | AdFormat::RewardedInterstitial => {
                        tokio::time::timeout(self.config.render_timeout, self.registry.show_rewarded(&ad.adapter, handle, &view_context, releasing.clone()))
                            .await
                            .is_err()
                    }
                    AdFormat::Banner => {
                        tokio::time::timeout(self.config.render_timeout, self.registry.show_banner(&ad.adapter, handle, &view_context, releasing.clone()))
                            .await
                            .is_err()
                    }
                    _ => {
                        tokio::time::timeout(self.config.render_timeout, self.registry.show_interstitial(&ad.adapter, handle, &view_context, releasing.clone()))
                            .await
                            .is_err()
                    }
                };
                if timed_out {
                    releasing.on_error(&AdapterError::recoverable(AdapterErrorCode::Timeout, "show exceeded the render timeout without a terminal callback"));
                }
            }
            None => {
                self.fallback_presenter.present(&ad, releasing);
            }
        }
        Ok(())
    }

    pub fn is_ready(&self, placement_id: &str) -> bool {
        self.cache.is_ready(placement_id)
    }

    async fn validate_one(name: String, descriptor: Option<AdapterDescriptor>, provider: Arc<dyn CredentialProvider>) -> ValidationResult {
        let Some(descriptor) = descriptor else {
            return ValidationResult::unknown_adapter();
        };

        let lookup_name = name.clone();
        let lookup = tokio::task::spawn_blocking(move || provider.get(&lookup_name));

        match tokio::time::timeout(Duration::from_millis(1_500), lookup).await {
            Ok(Ok(Some(creds))) => {
                let missing: Vec<String> = descriptor
                    .required_credential_keys
                    .iter()
                    .filter(|required| !creds.get(*required).map(|v| !v.trim().is_empty()).unwrap_or(false))
                    .cloned()
                    .collect();
                let redacted_details = redact_metadata(&creds);
                if missing.is_empty() {
                    ValidationResult::ok().with_redacted_details(redacted_details)
                } else {
                    ValidationResult::missing(missing).with_redacted_details(redacted_details)
                }
            }
            Ok(Ok(None)) => ValidationResult::missing(descriptor.required_credential_keys.clone()),
            Ok(Err(_join_err)) => ValidationResult::error("credential provider panicked"),
            Err(_elapsed) => ValidationResult::timeout(),
        }
    }

    /// Validation Mode (§6): resolves each requested (or, if `None`, every
    /// registered) adapter's credential readiness without running a live
    /// auction. Each lookup runs as its own unit of work on the background
    /// executor, so a sweep across many adapters doesn't serialize behind
    /// the slowest credential provider call.
    pub async fn validate_credentials(&self, networks: Option<Vec<String>>) -> ValidationReport {
        let names = networks.unwrap_or_else(|| self.descriptors.keys().cloned().collect());
        let (tx, mut rx) = tokio::sync::mpsc::channel(names.len().max(1));
        for name in &names {
            let tx = tx.clone();
            let name = name.clone();
            let descriptor = self.descriptors.get(&name.to_ascii_lowercase()).cloned();
            let provider = self.credential_provider.clone();
            self.background_executor.spawn(Box::pin(async move {
                let result = Self::validate_one(name.clone(), descriptor, provider).await;
                let _ = tx.send((name, result)).await;
            }));
        }
        drop(tx);

        let mut report = ValidationReport::new();
        while let Some((name, result)) = rx.recv().await {
            report.insert(name, result);
        }
        report
    }

    pub fn health_snapshot(&self) -> Vec<AdapterHealth> {
        self.registry.health_snapshot()
    }

    /// Direct access to the telemetry projector, for hosts wiring a sink or
    /// inspecting rolling outcome counters/latency percentiles.
    pub fn projector(&self) -> &Projector {
        &self.projector
    }

    pub fn config_hash(&self) -> Option<String> {
        self.config_gate.config_hash()
    }

    /// Graceful shutdown ordering (§10): drain in-flight shows up to
    /// `render_timeout`, then release the adapter registry. A shutdown
    /// never blocks longer than `render_timeout` regardless of how many
    /// placements are still busy.
    pub async fn shutdown(&self) {
        tracing::info!("mediation controller shutdown: draining in-flight shows");
        let mut waited = Duration::ZERO;
        while waited < self.config.render_timeout {
            let any_busy = self.config_gate.all_placements().iter().any(|p| self.presentation.is_busy(&p.placement_id));
            if !any_busy {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
            waited += Duration::from_millis(50);
        }
        tracing::info!("mediation controller shutdown: releasing adapter registry");
        self.registry.shutdown();
        tracing::info!("mediation controller shutdown complete");
    }
}
