//! The Adapter Registry: holds adapter factories and live instances,
//! enforces per-adapter init idempotency, gates calls behind a circuit
//! breaker, and routes load/show/invalidate uniformly across adapters.

mod adapter;
mod error;
mod exactly_once;
mod registry;

pub use adapter::{
    Adapter, AdapterDescriptor, AdapterFactory, AdapterLoadResponse, CloseReason, PaidEvent, PlatformContext, ShowCallbacks, ViewContext,
};
pub use error::{AdapterError, AdapterErrorCode};
pub use exactly_once::ExactlyOnceCallbacks;
pub use mediation_cache::RuntimeHandleId;
pub use registry::{AdapterHealth, AdapterRegistry};
