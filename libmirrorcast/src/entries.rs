//! Schema-driven account entries
//!
//! A configuration document holds group-level defaults at the top level and
//! one partial entry per account under `entries`. Each entry is completed
//! against a [`Schema`]:
//!
//! 1. schema fields missing on the entry are copied from the top level,
//! 2. fields still missing take the schema default, if any,
//! 3. required fields still missing fail the whole load.
//!
//! Precedence is therefore entry, then top level, then schema default.
//!
//! # Examples
//!
//! ```
//! use libmirrorcast::entries::{build_raw_entries, FieldSpec, Schema};
//! use serde_json::json;
//!
//! let schema = Schema::new()
//!     .field("pageId", FieldSpec::required())
//!     .field("timeout", FieldSpec::with_default(json!(30)));
//!
//! let entries = build_raw_entries(&schema, &json!({
//!     "pageId": "shared",
//!     "entries": [{}, {"pageId": "own"}]
//! }))
//! .unwrap();
//!
//! assert_eq!(entries[0]["pageId"], "shared");
//! assert_eq!(entries[1]["pageId"], "own");
//! assert_eq!(entries[1]["timeout"], 30);
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::expand_path;
use crate::error::{ConfigError, MirrorError, Result};

/// A partially or fully completed entry, keyed by field name
pub type RawEntry = Map<String, Value>;

/// Description of one configuration field
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldSpec {
    pub required: bool,
    pub default: Option<Value>,
}

impl FieldSpec {
    pub fn optional() -> Self {
        Self::default()
    }

    pub fn required() -> Self {
        Self {
            required: true,
            default: None,
        }
    }

    pub fn with_default(default: Value) -> Self {
        Self {
            required: false,
            default: Some(default),
        }
    }

    pub fn required_with_default(default: Value) -> Self {
        Self {
            required: true,
            default: Some(default),
        }
    }
}

/// Ordered set of field descriptions; missing fields are reported in this order
#[derive(Debug, Clone, Default)]
pub struct Schema {
    fields: Vec<(String, FieldSpec)>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field, replacing any earlier description with the same name
    pub fn field(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        let name = name.into();
        self.fields.retain(|(existing, _)| *existing != name);
        self.fields.push((name, spec));
        self
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldSpec)> {
        self.fields.iter().map(|(name, spec)| (name.as_str(), spec))
    }
}

/// `null` counts as absent so that an explicit null can still be filled in.
fn is_present(entry: &RawEntry, key: &str) -> bool {
    entry.get(key).is_some_and(|value| !value.is_null())
}

fn complete_entry(schema: &Schema, top: &RawEntry, mut entry: RawEntry) -> RawEntry {
    for (key, _) in schema.fields() {
        if !is_present(&entry, key) && is_present(top, key) {
            entry.insert(key.to_string(), top[key].clone());
        }
    }

    for (key, spec) in schema.fields() {
        if !is_present(&entry, key) {
            if let Some(default) = &spec.default {
                entry.insert(key.to_string(), default.clone());
            }
        }
    }

    entry
}

fn check_required(schema: &Schema, entry: &RawEntry, index: usize) -> Result<()> {
    let missing: Vec<String> = schema
        .fields()
        .filter(|(key, spec)| spec.required && !is_present(entry, key))
        .map(|(key, _)| key.to_string())
        .collect();

    if missing.is_empty() {
        return Ok(());
    }

    Err(ConfigError::Validation {
        index: index + 1,
        name: entry.get("name").and_then(Value::as_str).map(str::to_string),
        missing,
    }
    .into())
}

/// Complete and validate every entry of a configuration document
///
/// # Errors
///
/// Returns `ConfigError::Validation` for the first entry missing a required
/// field (1-based index), and `ConfigError::Invalid` when the document or
/// an entry is not a JSON object or `entries` is not an array.
pub fn build_raw_entries(schema: &Schema, config: &Value) -> Result<Vec<RawEntry>> {
    let top = config
        .as_object()
        .ok_or_else(|| ConfigError::Invalid("configuration must be a JSON object".to_string()))?;

    let entries = top
        .get("entries")
        .ok_or_else(|| ConfigError::MissingField("entries".to_string()))?
        .as_array()
        .ok_or_else(|| ConfigError::Invalid("`entries` must be an array".to_string()))?;

    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| -> Result<RawEntry> {
            let partial = entry.as_object().cloned().ok_or_else(|| {
                ConfigError::Invalid(format!("entry {} must be a JSON object", index + 1))
            })?;
            let completed = complete_entry(schema, top, partial);
            check_required(schema, &completed, index)?;
            Ok(completed)
        })
        .collect()
}

/// One mirrored account, fully validated
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    #[serde(default)]
    pub name: Option<String>,
    pub facebook_access_token: String,
    pub page_id: String,
    pub mastodon_server_url: String,
    pub mastodon_access_token: String,
    pub db_location: String,
    pub db_name: String,
    pub graph_api_url: String,
    pub request_timeout_secs: u64,
}

impl Entry {
    pub const DEFAULT_GRAPH_API_URL: &'static str = "https://graph.facebook.com/v5.0";
    pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

    /// The schema every mirror entry is validated against
    pub fn schema(default_db_location: &str) -> Schema {
        Schema::new()
            .field("name", FieldSpec::optional())
            .field("facebookAccessToken", FieldSpec::required())
            .field("pageId", FieldSpec::required())
            .field("mastodonServerUrl", FieldSpec::required())
            .field("mastodonAccessToken", FieldSpec::required())
            .field("dbLocation", FieldSpec::with_default(json!(default_db_location)))
            .field("dbName", FieldSpec::required())
            .field(
                "graphApiUrl",
                FieldSpec::with_default(json!(Self::DEFAULT_GRAPH_API_URL)),
            )
            .field(
                "requestTimeoutSecs",
                FieldSpec::with_default(json!(Self::DEFAULT_REQUEST_TIMEOUT_SECS)),
            )
    }

    /// Name for logs and reports, falling back to the page id
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.page_id)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn ledger_dir(&self) -> PathBuf {
        expand_path(&self.db_location)
    }
}

impl std::fmt::Debug for Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entry")
            .field("name", &self.name)
            .field("facebook_access_token", &"[REDACTED]")
            .field("page_id", &self.page_id)
            .field("mastodon_server_url", &self.mastodon_server_url)
            .field("mastodon_access_token", &"[REDACTED]")
            .field("db_location", &self.db_location)
            .field("db_name", &self.db_name)
            .field("graph_api_url", &self.graph_api_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

/// Build typed entries from a configuration document
pub fn build_entries(config: &Value, default_db_location: &str) -> Result<Vec<Entry>> {
    let schema = Entry::schema(default_db_location);

    build_raw_entries(&schema, config)?
        .into_iter()
        .enumerate()
        .map(|(index, raw)| -> Result<Entry> {
            let entry = serde_json::from_value::<Entry>(Value::Object(raw))
                .map_err(|e| MirrorError::from(ConfigError::Parse(e)))?;

            // A zero timeout would fail every network call of the account
            if entry.request_timeout_secs == 0 {
                return Err(ConfigError::Invalid(format!(
                    "Entry {} (name: {}): requestTimeoutSecs must be at least 1",
                    index + 1,
                    entry.label()
                ))
                .into());
            }

            Ok(entry)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn description() -> Schema {
        Schema::new()
            .field("notRequiredKey", FieldSpec::optional())
            .field("requiredKey", FieldSpec::required())
            .field("keyWithDefault", FieldSpec::with_default(json!(33)))
            .field("requiredKeyWithDefault", FieldSpec::required_with_default(json!(44)))
    }

    fn object(value: Value) -> RawEntry {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_merge_keys_from_top() {
        let entries = build_raw_entries(
            &description(),
            &json!({
                "requiredKey": 12,
                "entries": [{"requiredKey": 23}, {}]
            }),
        )
        .unwrap();

        assert_eq!(
            entries[0],
            object(json!({"requiredKey": 23, "keyWithDefault": 33, "requiredKeyWithDefault": 44}))
        );
        assert_eq!(
            entries[1],
            object(json!({"requiredKey": 12, "keyWithDefault": 33, "requiredKeyWithDefault": 44}))
        );
    }

    #[test]
    fn test_sets_defaults() {
        let entries = build_raw_entries(
            &description(),
            &json!({"entries": [{"requiredKey": 12}]}),
        )
        .unwrap();

        assert_eq!(
            entries[0],
            object(json!({"requiredKey": 12, "keyWithDefault": 33, "requiredKeyWithDefault": 44}))
        );
    }

    #[test]
    fn test_top_level_beats_schema_default() {
        let entries = build_raw_entries(
            &description(),
            &json!({"keyWithDefault": 1, "entries": [{"requiredKey": 12}]}),
        )
        .unwrap();

        assert_eq!(entries[0]["keyWithDefault"], 1);
    }

    #[test]
    fn test_check_required_keys() {
        let result = build_raw_entries(&description(), &json!({"entries": [{}]}));

        match result {
            Err(MirrorError::Config(ConfigError::Validation { index, missing, .. })) => {
                assert_eq!(index, 1);
                assert_eq!(missing, vec!["requiredKey".to_string()]);
            }
            other => panic!("Expected validation error, got {:?}", other),
        }

        assert!(build_raw_entries(&description(), &json!({"entries": [{"requiredKey": 12}]})).is_ok());
    }

    #[test]
    fn test_failing_entry_fails_whole_call() {
        let result = build_raw_entries(
            &description(),
            &json!({"entries": [{"requiredKey": 1}, {"name": "second"}, {"requiredKey": 3}]}),
        );

        match result {
            Err(MirrorError::Config(ConfigError::Validation { index, name, .. })) => {
                assert_eq!(index, 2);
                assert_eq!(name.as_deref(), Some("second"));
            }
            other => panic!("Expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_null_is_treated_as_absent() {
        let entries = build_raw_entries(
            &description(),
            &json!({"requiredKey": 5, "entries": [{"requiredKey": null}]}),
        )
        .unwrap();

        assert_eq!(entries[0]["requiredKey"], 5);
    }

    #[test]
    fn test_unknown_keys_are_kept_and_top_level_extras_are_not_copied() {
        let entries = build_raw_entries(
            &description(),
            &json!({"unrelated": true, "entries": [{"requiredKey": 1, "extra": "x"}]}),
        )
        .unwrap();

        assert_eq!(entries[0]["extra"], "x");
        assert!(!entries[0].contains_key("unrelated"));
        assert!(!entries[0].contains_key("entries"));
    }

    #[test]
    fn test_missing_entries_array() {
        let result = build_raw_entries(&description(), &json!({"requiredKey": 1}));
        assert!(matches!(
            result,
            Err(MirrorError::Config(ConfigError::MissingField(_)))
        ));

        let result = build_raw_entries(&description(), &json!({"entries": {}}));
        assert!(matches!(result, Err(MirrorError::Config(ConfigError::Invalid(_)))));
    }

    #[test]
    fn test_build_entries_typed() {
        let entries = build_entries(
            &json!({
                "facebookAccessToken": "fb-token",
                "mastodonServerUrl": "https://mastodon.example",
                "mastodonAccessToken": "masto-token",
                "entries": [
                    {"name": "bakery", "pageId": "111", "dbName": "bakery.db"},
                    {"pageId": "222", "dbName": "other.db", "requestTimeoutSecs": 5}
                ]
            }),
            "/var/lib/mirrorcast",
        )
        .unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].label(), "bakery");
        assert_eq!(entries[0].db_location, "/var/lib/mirrorcast");
        assert_eq!(entries[0].graph_api_url, Entry::DEFAULT_GRAPH_API_URL);
        assert_eq!(entries[0].request_timeout(), Duration::from_secs(30));
        assert_eq!(entries[1].label(), "222");
        assert_eq!(entries[1].request_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_build_entries_reports_all_missing_keys_in_schema_order() {
        let result = build_entries(&json!({"entries": [{"pageId": "1"}]}), "/tmp");

        match result {
            Err(MirrorError::Config(ConfigError::Validation { missing, .. })) => {
                assert_eq!(
                    missing,
                    vec![
                        "facebookAccessToken",
                        "mastodonServerUrl",
                        "mastodonAccessToken",
                        "dbName"
                    ]
                );
            }
            other => panic!("Expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_build_entries_wrong_type_is_parse_error() {
        let result = build_entries(
            &json!({"entries": [{
                "facebookAccessToken": "a",
                "pageId": "1",
                "mastodonServerUrl": "https://m.example",
                "mastodonAccessToken": "b",
                "dbName": "x.db",
                "requestTimeoutSecs": "soon"
            }]}),
            "/tmp",
        );

        assert!(matches!(result, Err(MirrorError::Config(ConfigError::Parse(_)))));
    }

    #[test]
    fn test_build_entries_rejects_zero_timeout() {
        let result = build_entries(
            &json!({"entries": [{
                "name": "bakery",
                "facebookAccessToken": "a",
                "pageId": "1",
                "mastodonServerUrl": "https://m.example",
                "mastodonAccessToken": "b",
                "dbName": "x.db",
                "requestTimeoutSecs": 0
            }]}),
            "/tmp",
        );

        match result {
            Err(MirrorError::Config(ConfigError::Invalid(msg))) => {
                assert!(msg.contains("Entry 1 (name: bakery)"));
                assert!(msg.contains("requestTimeoutSecs"));
            }
            other => panic!("Expected invalid config error, got {:?}", other),
        }
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let entries = build_entries(
            &json!({"entries": [{
                "facebookAccessToken": "fb-secret",
                "pageId": "1",
                "mastodonServerUrl": "https://m.example",
                "mastodonAccessToken": "masto-secret",
                "dbName": "x.db"
            }]}),
            "/tmp",
        )
        .unwrap();

        let debug = format!("{:?}", entries[0]);
        assert!(!debug.contains("fb-secret"));
        assert!(!debug.contains("masto-secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
