//! Validation Mode (§6): lets a host ask "would this adapter set even
//! init?" without running a live auction. Credential *values* never appear
//! in a [`ValidationResult`] — only which required keys were present.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationStatus {
    Ok,
    MissingCredentials,
    UnknownAdapter,
    Timeout,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub status: ValidationStatus,
    /// Names of required credential keys that were absent, never the
    /// values themselves.
    pub missing_keys: Vec<String>,
    pub message: Option<String>,
    /// Whatever non-credential diagnostic metadata the lookup turned up,
    /// passed through `redact_metadata` so a sensitive value never leaks
    /// into a validation report (§6 `redactedDetails`).
    pub redacted_details: BTreeMap<String, String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self { status: ValidationStatus::Ok, missing_keys: Vec::new(), message: None, redacted_details: BTreeMap::new() }
    }

    pub fn missing(missing_keys: Vec<String>) -> Self {
        Self { status: ValidationStatus::MissingCredentials, missing_keys, message: None, redacted_details: BTreeMap::new() }
    }

    pub fn unknown_adapter() -> Self {
        Self { status: ValidationStatus::UnknownAdapter, missing_keys: Vec::new(), message: None, redacted_details: BTreeMap::new() }
    }

    pub fn timeout() -> Self {
        Self {
            status: ValidationStatus::Timeout,
            missing_keys: Vec::new(),
            message: Some("credential lookup timed out".to_string()),
            redacted_details: BTreeMap::new(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { status: ValidationStatus::Error, missing_keys: Vec::new(), message: Some(message.into()), redacted_details: BTreeMap::new() }
    }

    /// Attaches redacted credential-lookup metadata to an otherwise-built
    /// result (used when the lookup succeeded and returned values worth
    /// surfacing, redacted, to the host).
    pub fn with_redacted_details(mut self, redacted_details: BTreeMap<String, String>) -> Self {
        self.redacted_details = redacted_details;
        self
    }
}

pub type ValidationReport = BTreeMap<String, ValidationResult>;
