//! The Config Gate: a signed, versioned remote config with TTL, cached
//! fallback, schema validation, and deterministic hashing for
//! reconciliation with a server-reported hash.

mod gate;
mod hash;
mod remote_config;
mod store;
mod transport;
mod verifier;

pub use gate::{ConfigDiff, ConfigError, ConfigGate, DEFAULT_CONFIG_TTL};
pub use hash::{config_hash, signing_message};
pub use remote_config::{validate_schema, AdapterConfig, FeatureFlags, Placement, RemoteConfig, SchemaError};
pub use store::{ConfigStore, InMemoryConfigStore};
pub use transport::{ConfigFetchError, ConfigTransport};
pub use verifier::{AlwaysValidVerifier, SignatureVerifier};
