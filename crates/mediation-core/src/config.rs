//! Construction-time tunables (§3.1), distinct from [`mediation_config::RemoteConfig`]
//! which is the signed document fetched at runtime.

use mediation_circuit_breaker::CircuitBreakerConfig;
use mediation_telemetry::ObservabilityConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    /// Bring-your-own-demand: adapters only, no server-side auction path.
    Byo,
    /// Adapters plus an optional S2S first look when eligible.
    Hybrid,
    /// Fully managed: the host defers network selection to the server.
    Managed,
}

fn default_config_ttl() -> Duration {
    Duration::from_millis(3_600_000)
}

fn default_render_timeout() -> Duration {
    Duration::from_millis(3_500)
}

/// The knobs a host picks once at startup and hands to [`crate::MediationCoreBuilder`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediationConfig {
    pub mode: Mode,
    pub enable_s2s_when_capable: bool,
    /// Collapses executors to synchronous, bypasses signature verification
    /// in the config gate, and widens validation-mode's effective scope.
    pub test_mode: bool,
    /// When set, `load()` always resolves to a validation-mode response
    /// describing configuration state instead of running an auction.
    pub validation_mode_enabled: bool,
    pub circuit_breaker: CircuitBreakerConfig,
    pub observability: ObservabilityConfig,
    #[serde(with = "duration_millis")]
    pub config_ttl: Duration,
    #[serde(with = "duration_millis")]
    pub render_timeout: Duration,
}

impl Default for MediationConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Byo,
            enable_s2s_when_capable: false,
            test_mode: false,
            validation_mode_enabled: false,
            circuit_breaker: CircuitBreakerConfig::default(),
            observability: ObservabilityConfig::default(),
            config_ttl: default_config_ttl(),
            render_timeout: default_render_timeout(),
        }
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_are_byo_non_test_non_validation() {
        let config = MediationConfig::default();
        assert_eq!(config.mode, Mode::Byo);
        assert!(!config.test_mode);
        assert!(!config.validation_mode_enabled);
        assert_eq!(config.render_timeout, Duration::from_millis(3_500));
    }

    #[test]
    fn round_trips_through_json() {
        let config = MediationConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: MediationConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
