use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::constants::DEFAULT_CHANNEL;

/// Variables of one channel, keyed by lower-cased variable name.
pub type VariableMap = HashMap<String, String>;

/// Per-channel variable maps collected from `ChanVariable(...)` or
/// `Variable(...)` lines.
///
/// Channel and variable names are stored lower-cased. Variables whose line
/// carries no `(channel)` qualifier land in the `default` bucket until
/// [`fold_default_into`](Self::fold_default_into) binds them to a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableBuckets {
    buckets: HashMap<String, VariableMap>,
}

impl VariableBuckets {
    /// Empty set holding only the `default` bucket.
    pub fn new() -> Self {
        let mut buckets = HashMap::new();
        buckets.insert(DEFAULT_CHANNEL.to_string(), VariableMap::new());
        Self { buckets }
    }

    /// Store `name = value` under `channel`, creating the bucket if needed.
    pub fn insert(&mut self, channel: &str, name: &str, value: impl Into<String>) {
        self.buckets
            .entry(channel.to_lowercase())
            .or_default()
            .insert(name.to_lowercase(), value.into());
    }

    /// Merge the `default` bucket into `channel` and drop it.
    ///
    /// Values already present under `channel` are kept; `default` only
    /// supplies the names the channel bucket lacks.
    pub fn fold_default_into(&mut self, channel: &str) {
        let channel = channel.to_lowercase();
        let defaults = self
            .buckets
            .remove(DEFAULT_CHANNEL)
            .unwrap_or_default();
        let target = self
            .buckets
            .entry(channel)
            .or_default();
        for (name, value) in defaults {
            target
                .entry(name)
                .or_insert(value);
        }
    }

    /// Variables of one channel (case-insensitive).
    pub fn get(&self, channel: &str) -> Option<&VariableMap> {
        self.buckets
            .get(&channel.to_lowercase())
    }

    /// Single variable lookup (both names case-insensitive).
    pub fn variable(&self, channel: &str, name: &str) -> Option<&str> {
        self.get(channel)?
            .get(&name.to_lowercase())
            .map(|s| s.as_str())
    }

    /// Whether the unbound `default` bucket is still present.
    pub fn has_default(&self) -> bool {
        self.buckets
            .contains_key(DEFAULT_CHANNEL)
    }

    /// Channel names with a bucket, including `default` when present.
    pub fn channels(&self) -> impl Iterator<Item = &str> {
        self.buckets
            .keys()
            .map(|s| s.as_str())
    }

    /// All buckets.
    pub fn as_map(&self) -> &HashMap<String, VariableMap> {
        &self.buckets
    }
}

impl Default for VariableBuckets {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_has_empty_default_bucket() {
        let vars = VariableBuckets::new();
        assert!(vars.has_default());
        assert_eq!(vars.get("default"), Some(&VariableMap::new()));
    }

    #[test]
    fn insert_lower_cases_channel_and_name() {
        let mut vars = VariableBuckets::new();
        vars.insert("SIP/100-0001", "MyVar", "Value");
        assert_eq!(vars.variable("sip/100-0001", "myvar"), Some("Value"));
        assert_eq!(vars.variable("SIP/100-0001", "MYVAR"), Some("Value"));
    }

    #[test]
    fn fold_keeps_channel_values_over_defaults() {
        let mut vars = VariableBuckets::new();
        vars.insert("default", "codec", "ulaw");
        vars.insert("default", "lang", "en");
        vars.insert("sip/100", "codec", "alaw");

        vars.fold_default_into("SIP/100");

        assert!(!vars.has_default());
        assert_eq!(vars.variable("sip/100", "codec"), Some("alaw"));
        assert_eq!(vars.variable("sip/100", "lang"), Some("en"));
    }

    #[test]
    fn fold_creates_missing_channel_bucket() {
        let mut vars = VariableBuckets::new();
        vars.insert("default", "lang", "fr");
        vars.fold_default_into("IAX2/peer-7");
        assert_eq!(vars.variable("iax2/peer-7", "lang"), Some("fr"));
        assert_eq!(
            vars.channels()
                .count(),
            1
        );
    }
}
