//! An `Ad` can carry no `runtime_handle` (the S2S markup-fill path has no
//! adapter-owned resource to dispatch a show against). `show()` needs
//! *something* to call when that happens: the host wires a
//! [`FallbackPresenter`] that knows how to render raw creative markup, and
//! the default reports a terminal error rather than silently dropping the
//! show or panicking.

use mediation_cache::Ad;
use mediation_registry::{AdapterError, AdapterErrorCode, ShowCallbacks};
use std::sync::Arc;

pub trait FallbackPresenter: Send + Sync {
    fn present(&self, ad: &Ad, callbacks: Arc<dyn ShowCallbacks>);
}

/// Used when a host never wires a real markup renderer. Reports a
/// configuration error on the show attempt instead of silently doing
/// nothing with the cached ad.
#[derive(Debug, Default)]
pub struct UnwiredFallbackPresenter;

impl FallbackPresenter for UnwiredFallbackPresenter {
    fn present(&self, ad: &Ad, callbacks: Arc<dyn ShowCallbacks>) {
        tracing::error!(placement = %ad.placement, "ad has no runtime handle and no fallback presenter is wired");
        callbacks.on_error(&AdapterError::fatal(
            AdapterErrorCode::Config,
            "no FallbackPresenter is wired to render a handle-less (S2S markup) ad",
        ));
    }
}
