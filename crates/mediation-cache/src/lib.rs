//! Per-placement single-slot ad cache: TTL eviction, single-use `take`, and
//! deterministic invalidation of superseded or expired runtime handles.

use mediation_clock::{MonotonicClock, MonotonicInstant};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Upper bound on a creative payload the core will hold; beyond this it is
/// the host's job to stream the creative separately and hand the core only
/// a reference.
pub const MAX_CREATIVE_BYTES: usize = 256 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdFormat {
    Banner,
    Interstitial,
    Rewarded,
    RewardedInterstitial,
    Native,
    AppOpen,
}

/// An opaque per-ad identifier owned by the adapter that produced it,
/// representing a ready-to-show resource. The cache is the sole owner of
/// when a binding is invalidated; the registry only does a weak lookup by
/// this id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuntimeHandleId(pub String);

impl RuntimeHandleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AdError {
    #[error("ad creative payload of {0} bytes exceeds the {MAX_CREATIVE_BYTES} byte bound")]
    CreativeTooLarge(usize),
    #[error("ad expiry {expiry:?} is not after its creation time {created_at:?}")]
    ExpiryNotAfterCreation { expiry: MonotonicInstant, created_at: MonotonicInstant },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ad {
    pub id: String,
    pub placement: String,
    pub adapter: String,
    pub format: AdFormat,
    pub ecpm: f64,
    pub creative: Vec<u8>,
    pub metadata: BTreeMap<String, String>,
    pub runtime_handle: Option<RuntimeHandleId>,
    pub expiry: Option<MonotonicInstant>,
    pub created_at: MonotonicInstant,
}

impl Ad {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: impl Into<String>,
        placement: impl Into<String>,
        adapter: impl Into<String>,
        format: AdFormat,
        ecpm: f64,
        creative: Vec<u8>,
        metadata: BTreeMap<String, String>,
        runtime_handle: Option<RuntimeHandleId>,
        expiry: Option<MonotonicInstant>,
        created_at: MonotonicInstant,
    ) -> Result<Self, AdError> {
        if creative.len() > MAX_CREATIVE_BYTES {
            return Err(AdError::CreativeTooLarge(creative.len()));
        }
        if let Some(expiry) = expiry {
            if expiry <= created_at {
                return Err(AdError::ExpiryNotAfterCreation { expiry, created_at });
            }
        }
        Ok(Self {
            id: id.into(),
            placement: placement.into(),
            adapter: adapter.into(),
            format,
            ecpm: ecpm.max(0.0),
            creative,
            metadata,
            runtime_handle,
            expiry,
            created_at,
        })
    }
}

/// Host-supplied hook releasing an adapter's runtime resource when the
/// cache decides a handle's lifetime has ended. Must not panic or block;
/// "best-effort release" per the adapter registry contract.
pub trait HandleInvalidator: Send + Sync {
    fn invalidate(&self, handle: &RuntimeHandleId);
}

/// Default invalidator used when a host wires none; a safe no-op.
#[derive(Debug, Default)]
pub struct NullInvalidator;

impl HandleInvalidator for NullInvalidator {
    fn invalidate(&self, _handle: &RuntimeHandleId) {}
}

struct Slot {
    ad: Ad,
    expiry: MonotonicInstant,
}

/// One slot per placement, TTL-evicting, single-consumer `take`. Mutations
/// are serialized behind one mutex; at this scale (one slot per placement,
/// low placement cardinality) a single lock is not a bottleneck.
pub struct AdCache {
    clock: Arc<dyn MonotonicClock>,
    invalidator: Arc<dyn HandleInvalidator>,
    slots: Mutex<HashMap<String, Slot>>,
}

impl AdCache {
    pub fn new(clock: Arc<dyn MonotonicClock>, invalidator: Arc<dyn HandleInvalidator>) -> Self {
        Self { clock, invalidator, slots: Mutex::new(HashMap::new()) }
    }

    /// Inserts `ad` for `placement`, superseding and invalidating any prior
    /// ad's handle. `default_ttl` is used only when `ad.expiry` is absent;
    /// the controller computes it from the placement's refresh interval.
    pub fn put(&self, placement: &str, ad: Ad, default_ttl: Duration) {
        let now = self.clock.now();
        let expiry = ad.expiry.unwrap_or(now + default_ttl);
        let mut slots = self.slots.lock().unwrap();
        self.prune_locked(&mut slots, now);
        if let Some(previous) = slots.remove(placement) {
            if let Some(handle) = previous.ad.runtime_handle {
                tracing::debug!(placement, adapter = previous.ad.adapter, "invalidating superseded ad handle");
                self.invalidator.invalidate(&handle);
            }
        }
        slots.insert(placement.to_string(), Slot { ad, expiry });
    }

    /// Evict-then-read: returns the ad without removing it, first dropping
    /// (and invalidating) the slot if it has expired.
    pub fn peek(&self, placement: &str) -> Option<Ad> {
        let now = self.clock.now();
        let mut slots = self.slots.lock().unwrap();
        self.prune_locked(&mut slots, now);
        slots.get(placement).map(|slot| slot.ad.clone())
    }

    /// Evict-then-remove: returns the ad if live, leaving the slot empty.
    /// The caller takes ownership of any runtime handle binding; the cache
    /// does not invalidate it here, since the ad is now in active use, not
    /// superseded or expired.
    pub fn take(&self, placement: &str) -> Option<Ad> {
        let now = self.clock.now();
        let mut slots = self.slots.lock().unwrap();
        self.prune_locked(&mut slots, now);
        slots.remove(placement).map(|slot| slot.ad)
    }

    pub fn is_ready(&self, placement: &str) -> bool {
        self.peek(placement).is_some()
    }

    /// Scans and removes every expired slot, invalidating their handles.
    pub fn prune(&self) {
        let now = self.clock.now();
        let mut slots = self.slots.lock().unwrap();
        self.prune_locked(&mut slots, now);
    }

    fn prune_locked(&self, slots: &mut HashMap<String, Slot>, now: MonotonicInstant) {
        let expired: Vec<String> = slots
            .iter()
            .filter(|(_, slot)| now >= slot.expiry)
            .map(|(placement, _)| placement.clone())
            .collect();
        for placement in expired {
            if let Some(slot) = slots.remove(&placement) {
                if let Some(handle) = slot.ad.runtime_handle {
                    tracing::debug!(placement, "invalidating expired ad handle");
                    self.invalidator.invalidate(&handle);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediation_clock::FakeClock;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingInvalidator(AtomicUsize);

    impl HandleInvalidator for CountingInvalidator {
        fn invalidate(&self, _handle: &RuntimeHandleId) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn ad(placement: &str, handle: Option<&str>, clock: &FakeClock) -> Ad {
        Ad::new(
            "ad-1",
            placement,
            "adapter-a",
            AdFormat::Interstitial,
            1.5,
            vec![],
            BTreeMap::new(),
            handle.map(RuntimeHandleId::new),
            None,
            clock.now(),
        )
        .unwrap()
    }

    #[test]
    fn put_then_peek_then_take_then_empty() {
        let clock = FakeClock::new();
        let cache = AdCache::new(Arc::new(clock.clone()), Arc::new(NullInvalidator));
        cache.put("p1", ad("p1", None, &clock), Duration::from_secs(60));
        assert!(cache.peek("p1").is_some());
        assert!(cache.take("p1").is_some());
        assert!(cache.peek("p1").is_none());
        assert!(cache.take("p1").is_none());
    }

    #[test]
    fn ttl_expiry_evicts_on_peek() {
        let clock = FakeClock::new();
        let cache = AdCache::new(Arc::new(clock.clone()), Arc::new(NullInvalidator));
        cache.put("p1", ad("p1", None, &clock), Duration::from_millis(100));
        clock.advance(Duration::from_millis(150));
        assert!(cache.peek("p1").is_none());
    }

    #[test]
    fn put_invalidates_prior_handle() {
        let clock = FakeClock::new();
        let invalidator = Arc::new(CountingInvalidator(AtomicUsize::new(0)));
        let cache = AdCache::new(Arc::new(clock.clone()), invalidator.clone());
        cache.put("p1", ad("p1", Some("h1"), &clock), Duration::from_secs(60));
        cache.put("p1", ad("p1", Some("h2"), &clock), Duration::from_secs(60));
        assert_eq!(invalidator.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn take_does_not_invalidate_the_handle_it_hands_out() {
        let clock = FakeClock::new();
        let invalidator = Arc::new(CountingInvalidator(AtomicUsize::new(0)));
        let cache = AdCache::new(Arc::new(clock.clone()), invalidator.clone());
        cache.put("p1", ad("p1", Some("h1"), &clock), Duration::from_secs(60));
        let taken = cache.take("p1").unwrap();
        assert_eq!(taken.runtime_handle, Some(RuntimeHandleId::new("h1")));
        assert_eq!(invalidator.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn take_returns_the_exact_ad_that_was_put() {
        let clock = FakeClock::new();
        let cache = AdCache::new(Arc::new(clock.clone()), Arc::new(NullInvalidator));
        let inserted = ad("p1", Some("h1"), &clock);
        cache.put("p1", inserted.clone(), Duration::from_secs(60));
        assert_eq!(cache.take("p1").unwrap(), inserted);
    }

    #[test]
    fn expiry_not_after_creation_is_rejected() {
        let clock = FakeClock::new();
        let now = clock.now();
        let err = Ad::new(
            "ad-1", "p1", "a", AdFormat::Interstitial, 1.0, vec![], BTreeMap::new(), None, Some(now), now,
        )
        .unwrap_err();
        assert!(matches!(err, AdError::ExpiryNotAfterCreation { .. }));
    }

    #[test]
    fn concurrent_take_never_hands_out_the_same_ad_twice() {
        let clock = FakeClock::new();
        let cache = Arc::new(AdCache::new(Arc::new(clock.clone()), Arc::new(NullInvalidator)));
        cache.put("p1", ad("p1", None, &clock), Duration::from_secs(60));
        let c1 = cache.clone();
        let c2 = cache.clone();
        let t1 = std::thread::spawn(move || c1.take("p1"));
        let t2 = std::thread::spawn(move || c2.take("p1"));
        let r1 = t1.join().unwrap();
        let r2 = t2.join().unwrap();
        assert!(r1.is_some() ^ r2.is_some());
    }
}
