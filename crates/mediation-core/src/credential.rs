//! The external `CredentialProvider` seam (§6): the core never stores a
//! credential value, only resolves one per adapter per call through this
//! trait. Deliberately synchronous and `Send + Sync` rather than
//! `async_trait`, so a host can implement it with a plain keychain lookup
//! without pulling in an executor; [`crate::controller`] is the one place
//! that bridges it onto `spawn_blocking`.

use std::collections::BTreeMap;

pub trait CredentialProvider: Send + Sync {
    /// Resolves the credential bag for `adapter_name`, or `None` if the
    /// host has nothing configured for it.
    fn get(&self, adapter_name: &str) -> Option<BTreeMap<String, String>>;
}

/// Default used when a host wires none; every adapter init and credential
/// validation call sees an empty credential bag.
#[derive(Debug, Default)]
pub struct NullCredentialProvider;

impl CredentialProvider for NullCredentialProvider {
    fn get(&self, _adapter_name: &str) -> Option<BTreeMap<String, String>> {
        None
    }
}
