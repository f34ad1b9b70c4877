use crate::remote_config::RemoteConfig;
use std::sync::Mutex;

/// Durable cache persistence for the last-known-good remote config. The
/// core never picks a concrete storage medium (file, key-value store,
/// platform preferences) itself; hosts supply one, same spirit as the HTTP
/// transport and signature verifier seams.
pub trait ConfigStore: Send + Sync {
    fn load(&self) -> Option<RemoteConfig>;
    fn save(&self, config: &RemoteConfig);
}

/// Process-memory store used by tests and as the default when a host
/// supplies none.
#[derive(Default)]
pub struct InMemoryConfigStore {
    slot: Mutex<Option<RemoteConfig>>,
}

impl ConfigStore for InMemoryConfigStore {
    fn load(&self) -> Option<RemoteConfig> {
        self.slot.lock().unwrap().clone()
    }

    fn save(&self, config: &RemoteConfig) {
        *self.slot.lock().unwrap() = Some(config.clone());
    }
}
