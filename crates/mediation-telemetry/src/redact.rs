use std::collections::BTreeMap;

pub const MASK: &str = "***";
const MAX_KEYS: usize = 8;
const MAX_KEY_LEN: usize = 64;
const MAX_VALUE_LEN: usize = 256;

/// Key name fragments this lineage treats as sensitive regardless of which
/// adapter or host supplies them. Credential keys (`key`, `secret`, ...) and
/// placement identifiers are both covered: open question (a) in the design
/// notes resolves in favor of treating `placement_id` as sensitive, since it
/// can be joined against publisher-side analytics to re-identify a user.
const SENSITIVE_FRAGMENTS: &[&str] = &[
    "key", "secret", "token", "password", "credential", "auth", "placement_id",
];

pub fn is_sensitive_key(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    SENSITIVE_FRAGMENTS.iter().any(|frag| lower.contains(frag))
}

/// Projects an arbitrary metadata map into one safe to queue for upload:
/// sensitive keys masked, key/value lengths bounded, key count capped.
pub fn redact_metadata(source: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for (key, value) in source.iter().take(MAX_KEYS) {
        let key = truncate(key, MAX_KEY_LEN);
        let value = if is_sensitive_key(&key) {
            MASK.to_string()
        } else {
            truncate(value, MAX_VALUE_LEN)
        };
        out.insert(key, value);
    }
    out
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_sensitive_keys() {
        let mut m = BTreeMap::new();
        m.insert("api_key".to_string(), "sk_live_abc123".to_string());
        m.insert("network".to_string(), "adapter_x".to_string());
        let redacted = redact_metadata(&m);
        assert_eq!(redacted["api_key"], MASK);
        assert_eq!(redacted["network"], "adapter_x");
    }

    #[test]
    fn caps_key_count() {
        let mut m = BTreeMap::new();
        for i in 0..20 {
            m.insert(format!("k{i:02}"), "v".to_string());
        }
        assert_eq!(redact_metadata(&m).len(), MAX_KEYS);
    }

    #[test]
    fn placement_id_is_masked() {
        let mut m = BTreeMap::new();
        m.insert("placement_id".to_string(), "main_menu_interstitial".to_string());
        assert_eq!(redact_metadata(&m)["placement_id"], MASK);
    }
}
