//! The S2S Auction Client: a single-shot server-side bid request with a
//! normalized error taxonomy, used by the mediation controller as an
//! optional first attempt before falling through to adapter fan-out.

mod client;
mod error;
mod request;
mod response;
mod transport;

pub use client::S2sClient;
pub use error::S2sErrorKind;
pub use request::{ConsentSignals, S2sRequest};
pub use response::{S2sBidResponse, S2sOutcome};
pub use transport::{S2sTransport, S2sTransportError, S2sTransportResponse};
