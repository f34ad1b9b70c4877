use crate::hash::{config_hash, signing_message};
use crate::remote_config::{validate_schema, AdapterConfig, FeatureFlags, Placement, RemoteConfig, SchemaError};
use crate::store::ConfigStore;
use crate::transport::{ConfigFetchError, ConfigTransport};
use crate::verifier::SignatureVerifier;
use mediation_clock::{MonotonicClock, MonotonicInstant};
use std::sync::{Arc, RwLock};
use std::time::Duration;

pub const DEFAULT_CONFIG_TTL: Duration = Duration::from_millis(3_600_000);

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("production config gate requires a public key but none was supplied")]
    MissingPublicKey,
    #[error("remote config signature verification failed")]
    SignatureInvalid,
    #[error(transparent)]
    SchemaInvalid(#[from] SchemaError),
    #[error("remote config network error: {0}")]
    NetworkError(String),
    #[error("remote config body could not be parsed: {0}")]
    Malformed(String),
    #[error("no cached config is available and the remote fetch failed")]
    NoCachedConfig,
}

struct Snapshot {
    config: Arc<RemoteConfig>,
    fetched_at: MonotonicInstant,
}

/// Read-only comparison of the locally held config against a server-
/// reported hash, for hosts that want to log drift without forcing a
/// refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigDiff {
    UpToDate,
    Stale { local: String, server: String },
    NoLocalConfig,
}

/// Maintains a single current remote-config snapshot, refreshing it on a
/// TTL and guaranteeing that never-validated data never reaches a reader:
/// the in-memory snapshot is only ever replaced after signature
/// verification and schema validation both pass.
pub struct ConfigGate {
    clock: Arc<dyn MonotonicClock>,
    transport: Arc<dyn ConfigTransport>,
    verifier: Arc<dyn SignatureVerifier>,
    store: Arc<dyn ConfigStore>,
    test_mode: bool,
    public_key: Option<Vec<u8>>,
    ttl: Duration,
    snapshot: RwLock<Option<Snapshot>>,
}

impl ConfigGate {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        clock: Arc<dyn MonotonicClock>,
        transport: Arc<dyn ConfigTransport>,
        verifier: Arc<dyn SignatureVerifier>,
        store: Arc<dyn ConfigStore>,
        test_mode: bool,
        public_key: Option<Vec<u8>>,
        ttl: Duration,
    ) -> Self {
        let preloaded = store.load().map(|config| Snapshot { config: Arc::new(config), fetched_at: MonotonicInstant::ZERO });
        Self { clock, transport, verifier, store, test_mode, public_key, ttl, snapshot: RwLock::new(preloaded) }
    }

    fn is_stale(&self, snapshot: &Snapshot) -> bool {
        let now = self.clock.now();
        match now.checked_duration_since(snapshot.fetched_at) {
            Some(age) => age >= self.ttl,
            // `fetched_at` is ahead of `now` (clock moved backward, or a
            // forced `refresh()`): treat as maximally stale, never as fresh.
            None => true,
        }
    }

    /// Reads the cached snapshot synchronously; if it is older than the TTL
    /// (or there is none), attempts a remote fetch. A network failure falls
    /// back to the cached snapshot if one exists.
    pub async fn load(&self) -> Result<Arc<RemoteConfig>, ConfigError> {
        let needs_fetch = match self.snapshot.read().unwrap().as_ref() {
            Some(snapshot) => self.is_stale(snapshot),
            None => true,
        };

        if !needs_fetch {
            return Ok(self.snapshot.read().unwrap().as_ref().unwrap().config.clone());
        }

        match self.fetch_and_activate().await {
            Ok(config) => Ok(config),
            Err(ConfigError::NetworkError(reason)) => {
                let existing = self.snapshot.read().unwrap().as_ref().map(|s| s.config.clone());
                match existing {
                    Some(config) => {
                        tracing::warn!(reason = %reason, "remote config fetch failed, serving cached snapshot");
                        Ok(config)
                    }
                    None => Err(ConfigError::NoCachedConfig),
                }
            }
            Err(other) => Err(other),
        }
    }

    async fn fetch_and_activate(&self) -> Result<Arc<RemoteConfig>, ConfigError> {
        let bytes = self.transport.fetch().await.map_err(|err| match err {
            ConfigFetchError::Network(reason) => ConfigError::NetworkError(reason),
            ConfigFetchError::Malformed(reason) => ConfigError::Malformed(reason),
        })?;
        let config: RemoteConfig = serde_json::from_slice(&bytes).map_err(|err| ConfigError::Malformed(err.to_string()))?;

        if !self.test_mode {
            let public_key = self.public_key.as_deref().ok_or(ConfigError::MissingPublicKey)?;
            let message = signing_message(&config);
            if !self.verifier.verify(&message, &config.signature, public_key) {
                return Err(ConfigError::SignatureInvalid);
            }
        }

        validate_schema(&config)?;

        let config = Arc::new(config);
        self.store.save(&config);
        *self.snapshot.write().unwrap() = Some(Snapshot { config: config.clone(), fetched_at: self.clock.now() });
        tracing::info!(config_id = %config.config_id, version = config.version, "activated remote config");
        Ok(config)
    }

    /// Forces the next `load()` to treat the cache as infinitely stale.
    pub async fn refresh(&self) -> Result<Arc<RemoteConfig>, ConfigError> {
        if let Some(snapshot) = self.snapshot.write().unwrap().as_mut() {
            snapshot.fetched_at = MonotonicInstant::ZERO;
        }
        self.load().await
    }

    fn current(&self) -> Option<Arc<RemoteConfig>> {
        self.snapshot.read().unwrap().as_ref().map(|s| s.config.clone())
    }

    pub fn get_placement(&self, placement_id: &str) -> Option<Placement> {
        self.current()?.placements.get(placement_id).cloned()
    }

    pub fn all_placements(&self) -> Vec<Placement> {
        self.current().map(|c| c.placements.values().cloned().collect()).unwrap_or_default()
    }

    pub fn adapter_config(&self, name: &str) -> Option<AdapterConfig> {
        self.current()?.adapters.get(name).copied()
    }

    pub fn feature_flags(&self) -> FeatureFlags {
        self.current().map(|c| c.features).unwrap_or_default()
    }

    pub fn config_hash(&self) -> Option<String> {
        self.current().map(|c| config_hash(&c))
    }

    pub fn validate_hash(&self, server_hash: &str) -> bool {
        self.config_hash().as_deref() == Some(server_hash)
    }

    pub fn diff_against(&self, server_hash: &str) -> ConfigDiff {
        match self.config_hash() {
            None => ConfigDiff::NoLocalConfig,
            Some(local) if local == server_hash => ConfigDiff::UpToDate,
            Some(local) => ConfigDiff::Stale { local, server: server_hash.to_string() },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote_config::Placement;
    use crate::store::InMemoryConfigStore;
    use crate::verifier::AlwaysValidVerifier;
    use async_trait::async_trait;
    use mediation_cache::AdFormat;
    use mediation_clock::FakeClock;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    fn sample_config(version: u64) -> RemoteConfig {
        let mut placements = BTreeMap::new();
        placements.insert(
            "p1".to_string(),
            Placement {
                placement_id: "p1".to_string(),
                ad_type: AdFormat::Interstitial,
                enabled_networks: vec!["a".to_string()],
                timeout_ms: 5_000,
                max_wait_ms: 10_000,
                floor_price: None,
                refresh_interval_secs: None,
            },
        );
        RemoteConfig {
            config_id: "app-1".to_string(),
            version,
            timestamp: 1_700_000_000,
            placements,
            adapters: BTreeMap::new(),
            features: FeatureFlags::default(),
            tls_pins: BTreeMap::new(),
            signature: vec![],
        }
    }

    struct ScriptedTransport {
        responses: Mutex<Vec<Result<Vec<u8>, ConfigFetchError>>>,
    }

    #[async_trait]
    impl ConfigTransport for ScriptedTransport {
        async fn fetch(&self) -> Result<Vec<u8>, ConfigFetchError> {
            self.responses.lock().unwrap().remove(0)
        }
    }

    fn gate_with(responses: Vec<Result<Vec<u8>, ConfigFetchError>>, clock: FakeClock) -> ConfigGate {
        ConfigGate::new(
            Arc::new(clock),
            Arc::new(ScriptedTransport { responses: Mutex::new(responses) }),
            Arc::new(AlwaysValidVerifier),
            Arc::new(InMemoryConfigStore::default()),
            true,
            None,
            Duration::from_millis(1_000),
        )
    }

    #[tokio::test]
    async fn cold_start_activates_a_fetched_config() {
        let gate = gate_with(vec![Ok(serde_json::to_vec(&sample_config(1)).unwrap())], FakeClock::new());
        let config = gate.load().await.unwrap();
        assert_eq!(config, sample_config(1));
        assert!(gate.get_placement("p1").is_some());
    }

    #[tokio::test]
    async fn cold_start_with_no_cache_and_network_failure_is_fatal() {
        let gate = gate_with(vec![Err(ConfigFetchError::Network("dns".to_string()))], FakeClock::new());
        let err = gate.load().await.unwrap_err();
        assert!(matches!(err, ConfigError::NoCachedConfig));
    }

    #[tokio::test]
    async fn network_failure_after_a_good_fetch_falls_back_to_cache() {
        let clock = FakeClock::new();
        let gate = gate_with(
            vec![Ok(serde_json::to_vec(&sample_config(1)).unwrap()), Err(ConfigFetchError::Network("timeout".to_string()))],
            clock.clone(),
        );
        let first = gate.load().await.unwrap();
        assert_eq!(first.version, 1);
        clock.advance(Duration::from_millis(2_000));
        let second = gate.load().await.unwrap();
        assert_eq!(second.version, 1);
    }

    #[tokio::test]
    async fn within_ttl_does_not_refetch() {
        let clock = FakeClock::new();
        let gate = gate_with(vec![Ok(serde_json::to_vec(&sample_config(1)).unwrap())], clock.clone());
        gate.load().await.unwrap();
        clock.advance(Duration::from_millis(500));
        // A second fetch attempt would panic (no scripted response left);
        // reaching this line without panicking proves the cache was used.
        let config = gate.load().await.unwrap();
        assert_eq!(config.version, 1);
    }

    #[tokio::test]
    async fn refresh_forces_a_fetch_even_within_ttl() {
        let clock = FakeClock::new();
        let gate = gate_with(
            vec![Ok(serde_json::to_vec(&sample_config(1)).unwrap()), Ok(serde_json::to_vec(&sample_config(2)).unwrap())],
            clock,
        );
        gate.load().await.unwrap();
        let refreshed = gate.refresh().await.unwrap();
        assert_eq!(refreshed.version, 2);
    }

    #[tokio::test]
    async fn schema_invalid_config_is_rejected_and_keeps_prior_snapshot() {
        let clock = FakeClock::new();
        let mut bad = sample_config(2);
        bad.config_id = "".to_string();
        let gate = gate_with(
            vec![Ok(serde_json::to_vec(&sample_config(1)).unwrap()), Ok(serde_json::to_vec(&bad).unwrap())],
            clock,
        );
        gate.load().await.unwrap();
        let err = gate.refresh().await.unwrap_err();
        assert!(matches!(err, ConfigError::SchemaInvalid(_)));
        assert_eq!(gate.current().unwrap().version, 1);
    }

    #[tokio::test]
    async fn production_mode_without_public_key_fails_closed() {
        let gate = ConfigGate::new(
            Arc::new(FakeClock::new()),
            Arc::new(ScriptedTransport { responses: Mutex::new(vec![Ok(serde_json::to_vec(&sample_config(1)).unwrap())]) }),
            Arc::new(AlwaysValidVerifier),
            Arc::new(InMemoryConfigStore::default()),
            false,
            None,
            Duration::from_millis(1_000),
        );
        let err = gate.load().await.unwrap_err();
        assert!(matches!(err, ConfigError::MissingPublicKey));
    }

    #[test]
    fn hash_determinism_across_two_configs_built_with_different_insertion_order() {
        let mut a = sample_config(1);
        let mut b = sample_config(1);
        a.adapters.insert("x".to_string(), AdapterConfig { enabled: true, priority: 1 });
        a.adapters.insert("y".to_string(), AdapterConfig { enabled: false, priority: 2 });
        b.adapters.insert("y".to_string(), AdapterConfig { enabled: false, priority: 2 });
        b.adapters.insert("x".to_string(), AdapterConfig { enabled: true, priority: 1 });
        assert_eq!(config_hash(&a), config_hash(&b));
    }
}
