/// The public `load()` error taxonomy (§4.6, §7): the caller branches on a
/// tagged variant, never on message text.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LoadError {
    #[error("no demand source filled this placement")]
    NoFill,
    #[error("load exceeded the placement's overall wait budget")]
    Timeout,
    #[error("a network error prevented the auction from completing")]
    NetworkError,
    #[error("placement '{0}' is not present in the active remote config")]
    InvalidPlacement(String),
    #[error("internal mediation error: {0}")]
    InternalError(String),
}

impl LoadError {
    pub fn code(&self) -> &'static str {
        match self {
            LoadError::NoFill => "NO_FILL",
            LoadError::Timeout => "TIMEOUT",
            LoadError::NetworkError => "NETWORK_ERROR",
            LoadError::InvalidPlacement(_) => "INVALID_PLACEMENT",
            LoadError::InternalError(_) => "INTERNAL_ERROR",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ShowError {
    #[error("no ad is ready for this placement")]
    NotReady,
    #[error("a show is already in progress for this placement")]
    AlreadyShowing,
}

/// What a successful `load()` resolves to: enough for the host to decide
/// whether/when to call `show()`, without exposing cache internals.
#[derive(Debug, Clone)]
pub struct LoadOutcome {
    pub placement: String,
    pub adapter: String,
    pub ecpm: f64,
}
