//! The §10 supplemented Facade/global handle: most host SDKs want a single
//! process-wide mediation instance reachable from wherever a `load`/`show`
//! call originates, without threading an `Arc<MediationController>` through
//! every call site. Deliberately `std::sync::OnceLock` + `RwLock` rather
//! than `arc_swap`: installs are rare (once at startup, maybe once more in
//! a test harness via `reset`), so the extra dependency buys nothing here.

use crate::controller::MediationController;
use std::sync::{Arc, OnceLock, RwLock};

static INSTANCE: OnceLock<RwLock<Option<Arc<MediationController>>>> = OnceLock::new();

fn cell() -> &'static RwLock<Option<Arc<MediationController>>> {
    INSTANCE.get_or_init(|| RwLock::new(None))
}

/// Installs the process-wide controller. A second `install()` call replaces
/// the prior instance; callers that already hold a clone of the old `Arc`
/// keep it alive until they drop it.
pub fn install(controller: Arc<MediationController>) {
    *cell().write().unwrap() = Some(controller);
}

/// Returns the installed controller, or `None` if `install()` was never
/// called (or `reset()` ran since).
pub fn current() -> Option<Arc<MediationController>> {
    cell().read().unwrap().clone()
}

/// Test-only hook to uninstall between test cases that each call `install`.
#[cfg(any(test, feature = "test-util"))]
pub fn reset() {
    *cell().write().unwrap() = None;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::MediationCoreBuilder;
    use crate::config::MediationConfig;
    use mediation_config::{AlwaysValidVerifier, ConfigFetchError, ConfigTransport, InMemoryConfigStore};
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    struct NeverFetches;

    #[async_trait]
    impl ConfigTransport for NeverFetches {
        async fn fetch(&self) -> Result<Vec<u8>, ConfigFetchError> {
            Err(ConfigFetchError::Network("unused in this test".to_string()))
        }
    }

    fn a_controller() -> Arc<MediationController> {
        MediationCoreBuilder::new("pub-1")
            .with_config(MediationConfig { test_mode: true, ..MediationConfig::default() })
            .with_config_transport(Arc::new(NeverFetches))
            .with_config_verifier(Arc::new(AlwaysValidVerifier))
            .with_config_store(Arc::new(InMemoryConfigStore::default()))
            .build()
    }

    // Facade tests share one process-wide `OnceLock`; a lock keeps them from
    // clobbering each other when the test harness runs them concurrently.
    static FACADE_TEST_LOCK: StdMutex<()> = StdMutex::new(());

    #[test]
    fn current_is_none_before_any_install() {
        let _guard = FACADE_TEST_LOCK.lock().unwrap();
        reset();
        assert!(current().is_none());
    }

    #[test]
    fn install_then_current_returns_the_same_instance() {
        let _guard = FACADE_TEST_LOCK.lock().unwrap();
        reset();
        let controller = a_controller();
        install(controller.clone());
        let fetched = current().expect("installed controller should be retrievable");
        assert!(Arc::ptr_eq(&controller, &fetched));
    }

    #[test]
    fn a_second_install_replaces_the_first() {
        let _guard = FACADE_TEST_LOCK.lock().unwrap();
        reset();
        install(a_controller());
        let second = a_controller();
        install(second.clone());
        assert!(Arc::ptr_eq(&current().unwrap(), &second));
    }

    #[test]
    fn reset_uninstalls() {
        let _guard = FACADE_TEST_LOCK.lock().unwrap();
        install(a_controller());
        reset();
        assert!(current().is_none());
    }
}
