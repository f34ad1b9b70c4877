use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Nullable consent fields passed through to the server-side auction
/// unmodified; the core neither interprets nor enforces them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsentSignals {
    pub gdpr_applies: Option<bool>,
    pub tcf_string: Option<String>,
    pub us_privacy: Option<String>,
    pub coppa: Option<bool>,
    pub limit_ad_tracking: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S2sRequest {
    pub publisher_id: String,
    pub placement_id: String,
    pub floor_cpm: Option<f64>,
    pub adapters: Vec<String>,
    pub metadata: BTreeMap<String, String>,
    pub auction_type: String,
    pub consent: ConsentSignals,
}
