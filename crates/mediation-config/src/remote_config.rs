use mediation_cache::AdFormat;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A named ad slot surface bound to a format and an auction policy.
/// Immutable for the lifetime of the `RemoteConfig` version that produced
/// it; a new config version produces entirely new `Placement` values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub placement_id: String,
    pub ad_type: AdFormat,
    pub enabled_networks: Vec<String>,
    pub timeout_ms: u32,
    pub max_wait_ms: u32,
    pub floor_price: Option<f64>,
    pub refresh_interval_secs: Option<u32>,
}

/// The per-adapter knobs the remote config carries. This is distinct from
/// the richer `AdapterDescriptor` the adapter registry works with (name,
/// S2S capability, required credential keys): only `enabled`/`priority`
/// participate in `config_hash` and remote reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdapterConfig {
    pub enabled: bool,
    pub priority: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureFlags {
    pub kill_switch: bool,
    pub telemetry_enabled: bool,
    pub om_sdk_enabled: bool,
    pub experimental: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self { kill_switch: false, telemetry_enabled: true, om_sdk_enabled: false, experimental: false }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub config_id: String,
    pub version: u64,
    pub timestamp: u64,
    pub placements: BTreeMap<String, Placement>,
    pub adapters: BTreeMap<String, AdapterConfig>,
    pub features: FeatureFlags,
    /// `host -> pin[]` for optional TLS pinning, carried alongside the
    /// boolean feature flags but excluded from `config_hash` (only the
    /// "explicit sorted set of known boolean flags" participates).
    pub tls_pins: BTreeMap<String, Vec<String>>,
    /// Base64 (or otherwise transport-encoded) signature bytes over the
    /// canonical `{config_id, version, timestamp}` message; verified by an
    /// injected [`crate::SignatureVerifier`] before the config is trusted.
    pub signature: Vec<u8>,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SchemaError {
    #[error("config_id must not be blank")]
    BlankConfigId,
    #[error("version must be positive, got {0}")]
    NonPositiveVersion(u64),
    #[error("timestamp must be positive, got {0}")]
    NonPositiveTimestamp(u64),
    #[error("placement key must not be blank")]
    BlankPlacementKey,
    #[error("placement '{0}' has a blank placement_id")]
    BlankPlacementId(String),
    #[error("placement '{0}' timeout_ms {1} is outside (0, 30000]")]
    TimeoutOutOfRange(String, u32),
    #[error("placement '{0}' max_wait_ms {1} is outside (0, 60000]")]
    MaxWaitOutOfRange(String, u32),
    #[error("placement '{0}' timeout_ms {1} exceeds max_wait_ms {2}")]
    TimeoutExceedsMaxWait(String, u32, u32),
}

/// Validates the §3 data-model invariants before a config is ever trusted:
/// blank identifiers, non-positive version/timestamp, and each placement's
/// timeout/max-wait bounds and ordering.
pub fn validate_schema(config: &RemoteConfig) -> Result<(), SchemaError> {
    if config.config_id.trim().is_empty() {
        return Err(SchemaError::BlankConfigId);
    }
    if config.version == 0 {
        return Err(SchemaError::NonPositiveVersion(config.version));
    }
    if config.timestamp == 0 {
        return Err(SchemaError::NonPositiveTimestamp(config.timestamp));
    }
    for (key, placement) in &config.placements {
        if key.trim().is_empty() {
            return Err(SchemaError::BlankPlacementKey);
        }
        if placement.placement_id.trim().is_empty() {
            return Err(SchemaError::BlankPlacementId(key.clone()));
        }
        if placement.timeout_ms == 0 || placement.timeout_ms > 30_000 {
            return Err(SchemaError::TimeoutOutOfRange(key.clone(), placement.timeout_ms));
        }
        if placement.max_wait_ms == 0 || placement.max_wait_ms > 60_000 {
            return Err(SchemaError::MaxWaitOutOfRange(key.clone(), placement.max_wait_ms));
        }
        if placement.timeout_ms > placement.max_wait_ms {
            return Err(SchemaError::TimeoutExceedsMaxWait(key.clone(), placement.timeout_ms, placement.max_wait_ms));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn valid_config() -> RemoteConfig {
        let mut placements = BTreeMap::new();
        placements.insert(
            "main_menu".to_string(),
            Placement {
                placement_id: "main_menu".to_string(),
                ad_type: AdFormat::Interstitial,
                enabled_networks: vec!["a".to_string(), "b".to_string()],
                timeout_ms: 5_000,
                max_wait_ms: 10_000,
                floor_price: Some(0.0),
                refresh_interval_secs: Some(30),
            },
        );
        RemoteConfig {
            config_id: "cfg-1".to_string(),
            version: 1,
            timestamp: 1_700_000_000,
            placements,
            adapters: BTreeMap::new(),
            features: FeatureFlags::default(),
            tls_pins: BTreeMap::new(),
            signature: vec![],
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(validate_schema(&valid_config()).is_ok());
    }

    #[test]
    fn rejects_timeout_exceeding_max_wait() {
        let mut cfg = valid_config();
        cfg.placements.get_mut("main_menu").unwrap().timeout_ms = 20_000;
        cfg.placements.get_mut("main_menu").unwrap().max_wait_ms = 10_000;
        assert_eq!(
            validate_schema(&cfg).unwrap_err(),
            SchemaError::TimeoutExceedsMaxWait("main_menu".to_string(), 20_000, 10_000)
        );
    }

    #[test]
    fn rejects_blank_config_id() {
        let mut cfg = valid_config();
        cfg.config_id = "  ".to_string();
        assert_eq!(validate_schema(&cfg).unwrap_err(), SchemaError::BlankConfigId);
    }

    #[test]
    fn rejects_out_of_range_timeout() {
        let mut cfg = valid_config();
        cfg.placements.get_mut("main_menu").unwrap().timeout_ms = 30_001;
        cfg.placements.get_mut("main_menu").unwrap().max_wait_ms = 60_000;
        assert!(matches!(validate_schema(&cfg), Err(SchemaError::TimeoutOutOfRange(_, _))));
    }
}
