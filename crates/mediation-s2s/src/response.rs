use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct S2sBidResponse {
    pub adapter: String,
    pub ecpm: f64,
    pub ttl_ms: Option<u64>,
    pub creative: Vec<u8>,
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum S2sOutcome {
    Fill(S2sBidResponse),
    NoFill,
    BelowFloor,
}

/// The JSON body shape a 2xx S2S response is expected to carry.
#[derive(Debug, Deserialize)]
pub(crate) struct S2sWireBody {
    #[serde(default)]
    pub no_fill: bool,
    #[serde(default)]
    pub below_floor: bool,
    pub bid: Option<S2sBidResponse>,
}
