use crate::remote_config::RemoteConfig;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

#[derive(Serialize)]
struct CanonicalPlacement {
    #[serde(rename = "adType")]
    ad_type: String,
    #[serde(rename = "enabledNetworks")]
    enabled_networks: Vec<String>,
    #[serde(rename = "floorPrice")]
    floor_price: f64,
    #[serde(rename = "maxWaitMs")]
    max_wait_ms: u32,
    #[serde(rename = "refreshInterval")]
    refresh_interval: u32,
    #[serde(rename = "timeoutMs")]
    timeout_ms: u32,
}

#[derive(Serialize)]
struct CanonicalAdapter {
    enabled: bool,
    priority: i32,
}

#[derive(Serialize)]
struct CanonicalFeatures {
    #[serde(rename = "experimental")]
    experimental: bool,
    #[serde(rename = "killSwitch")]
    kill_switch: bool,
    #[serde(rename = "omSdkEnabled")]
    om_sdk_enabled: bool,
    #[serde(rename = "telemetryEnabled")]
    telemetry_enabled: bool,
}

/// Mirrors the wire shape `config_hash` hashes: alphabetically-keyed top
/// level (`adapters`, `appId`, `features`, `placements`, `version`), each
/// nested map keyed by `BTreeMap` (so serde_json emits sorted keys), and
/// `enabledNetworks` explicitly sorted regardless of the placement's own
/// (auction-significant) adapter ordering.
#[derive(Serialize)]
struct CanonicalConfig {
    adapters: BTreeMap<String, CanonicalAdapter>,
    #[serde(rename = "appId")]
    app_id: String,
    features: CanonicalFeatures,
    placements: BTreeMap<String, CanonicalPlacement>,
    version: u64,
}

fn ad_type_str(ad_type: mediation_cache::AdFormat) -> &'static str {
    use mediation_cache::AdFormat::*;
    match ad_type {
        Banner => "banner",
        Interstitial => "interstitial",
        Rewarded => "rewarded",
        RewardedInterstitial => "rewarded_interstitial",
        Native => "native",
        AppOpen => "app_open",
    }
}

fn canonicalize(config: &RemoteConfig) -> CanonicalConfig {
    let placements = config
        .placements
        .iter()
        .map(|(key, placement)| {
            let mut enabled_networks = placement.enabled_networks.clone();
            enabled_networks.sort();
            (
                key.clone(),
                CanonicalPlacement {
                    ad_type: ad_type_str(placement.ad_type).to_string(),
                    enabled_networks,
                    floor_price: placement.floor_price.unwrap_or(0.0),
                    max_wait_ms: placement.max_wait_ms,
                    refresh_interval: placement.refresh_interval_secs.unwrap_or(0),
                    timeout_ms: placement.timeout_ms,
                },
            )
        })
        .collect();

    let adapters = config
        .adapters
        .iter()
        .map(|(name, adapter)| (name.clone(), CanonicalAdapter { enabled: adapter.enabled, priority: adapter.priority }))
        .collect();

    CanonicalConfig {
        adapters,
        app_id: config.config_id.clone(),
        features: CanonicalFeatures {
            experimental: config.features.experimental,
            kill_switch: config.features.kill_switch,
            om_sdk_enabled: config.features.om_sdk_enabled,
            telemetry_enabled: config.features.telemetry_enabled,
        },
        placements,
        version: config.version,
    }
}

/// `v1:<lowercase hex sha256>` over the canonical JSON described above. Any
/// change to field ordering or numeric formatting that alters this output
/// is a breaking change for remote reconciliation.
pub fn config_hash(config: &RemoteConfig) -> String {
    let canonical = canonicalize(config);
    let json = serde_json::to_vec(&canonical).expect("canonical config is always serializable");
    let digest = Sha256::digest(&json);
    format!("v1:{}", hex::encode(digest))
}

#[derive(Serialize)]
struct SigningMessage {
    config_id: String,
    timestamp: u64,
    version: u64,
}

/// The exact bytes a [`crate::SignatureVerifier`] checks a signature
/// against: canonical JSON of `{config_id, version, timestamp}` only, never
/// the full config body.
pub fn signing_message(config: &RemoteConfig) -> Vec<u8> {
    let message = SigningMessage { config_id: config.config_id.clone(), timestamp: config.timestamp, version: config.version };
    serde_json::to_vec(&message).expect("signing message is always serializable")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote_config::{AdapterConfig, FeatureFlags, Placement};
    use mediation_cache::AdFormat;
    use std::collections::BTreeMap;

    fn base_config() -> RemoteConfig {
        let mut placements = BTreeMap::new();
        placements.insert(
            "p1".to_string(),
            Placement {
                placement_id: "p1".to_string(),
                ad_type: AdFormat::Interstitial,
                enabled_networks: vec!["b".to_string(), "a".to_string()],
                timeout_ms: 5_000,
                max_wait_ms: 10_000,
                floor_price: None,
                refresh_interval_secs: None,
            },
        );
        let mut adapters = BTreeMap::new();
        adapters.insert("a".to_string(), AdapterConfig { enabled: true, priority: 1 });
        RemoteConfig {
            config_id: "app-1".to_string(),
            version: 3,
            timestamp: 1_700_000_000,
            placements,
            adapters,
            features: FeatureFlags::default(),
            tls_pins: BTreeMap::new(),
            signature: vec![],
        }
    }

    #[test]
    fn hash_is_stable_across_identical_logical_configs() {
        let a = base_config();
        let mut b = base_config();
        // Re-insert in reverse logical order; BTreeMap normalizes regardless.
        b.adapters.insert("z".to_string(), AdapterConfig { enabled: false, priority: 0 });
        b.adapters.remove("z");
        assert_eq!(config_hash(&a), config_hash(&b));
    }

    #[test]
    fn hash_ignores_enabled_networks_ordering() {
        let a = base_config();
        let mut b = base_config();
        b.placements.get_mut("p1").unwrap().enabled_networks = vec!["a".to_string(), "b".to_string()];
        assert_eq!(config_hash(&a), config_hash(&b));
    }

    #[test]
    fn hash_changes_when_a_placement_field_changes() {
        let a = base_config();
        let mut b = base_config();
        b.placements.get_mut("p1").unwrap().timeout_ms = 6_000;
        assert_ne!(config_hash(&a), config_hash(&b));
    }

    #[test]
    fn hash_has_the_v1_prefix_and_is_hex() {
        let hash = config_hash(&base_config());
        assert!(hash.starts_with("v1:"));
        assert_eq!(hash.len(), 3 + 64);
        assert!(hash[3..].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn signing_message_excludes_everything_but_id_version_timestamp() {
        let msg = signing_message(&base_config());
        let text = String::from_utf8(msg).unwrap();
        assert!(text.contains("app-1"));
        assert!(!text.contains("p1"));
    }
}
