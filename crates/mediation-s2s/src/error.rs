/// The §4.5 error taxonomy, normalized so the mediation controller branches
/// on a tagged code, never on message text (design note "Exception-as-
/// control-flow").
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum S2sErrorKind {
    /// Recoverable: the controller falls through to the adapter fan-out.
    #[error("s2s auction returned no_fill")]
    NoFill,
    #[error("s2s auction timed out")]
    Timeout,
    #[error("s2s auction network error: {0}")]
    NetworkError(String),
    /// Mapped to `NoFill` for caller semantics, but kept distinct here so
    /// telemetry can tell the two apart.
    #[error("s2s bid was below the placement floor")]
    BelowFloor,
    #[error("s2s auction returned client error status {0}")]
    Status4xx(u16),
    #[error("s2s auction returned server error status {0}")]
    Status5xx(u16),
    #[error("s2s auction error: {0}")]
    Error(String),
}

impl S2sErrorKind {
    /// `true` for the two taxonomy members the controller treats as
    /// "proceed to adapter fan-out" rather than "surface to the caller".
    pub fn is_recoverable_as_no_fill(&self) -> bool {
        matches!(self, S2sErrorKind::NoFill | S2sErrorKind::BelowFloor)
    }

    pub fn code(&self) -> &'static str {
        match self {
            S2sErrorKind::NoFill => "no_fill",
            S2sErrorKind::Timeout => "timeout",
            S2sErrorKind::NetworkError(_) => "network_error",
            S2sErrorKind::BelowFloor => "below_floor",
            S2sErrorKind::Status4xx(_) => "status_4xx",
            S2sErrorKind::Status5xx(_) => "status_5xx",
            S2sErrorKind::Error(_) => "error",
        }
    }
}
