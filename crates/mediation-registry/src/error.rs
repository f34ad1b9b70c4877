/// Normalized adapter error code (design note "Exception-as-control-flow"):
/// the controller branches on this tag, never on message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterErrorCode {
    NoFill,
    Timeout,
    NetworkError,
    Status4xx,
    Status5xx,
    BelowFloor,
    CircuitOpen,
    Config,
    Error,
}

impl AdapterErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdapterErrorCode::NoFill => "no_fill",
            AdapterErrorCode::Timeout => "timeout",
            AdapterErrorCode::NetworkError => "network_error",
            AdapterErrorCode::Status4xx => "status_4xx",
            AdapterErrorCode::Status5xx => "status_5xx",
            AdapterErrorCode::BelowFloor => "below_floor",
            AdapterErrorCode::CircuitOpen => "circuit_open",
            AdapterErrorCode::Config => "config",
            AdapterErrorCode::Error => "error",
        }
    }
}

/// A tagged adapter failure. `fatal` distinguishes the two dispositions in
/// §7: a recoverable error only drops this one result (the circuit breaker
/// still records a failure), while a fatal error (e.g. bad credentials)
/// additionally disables the adapter until its next init-signature change.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{code:?}: {message}")]
pub struct AdapterError {
    pub code: AdapterErrorCode,
    pub message: String,
    pub fatal: bool,
}

impl AdapterError {
    pub fn recoverable(code: AdapterErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), fatal: false }
    }

    pub fn fatal(code: AdapterErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), fatal: true }
    }
}
