//! SSH public key injection into instance metadata.

use serde_json::{Map, Value};

/// Metadata field holding `user:key` lines.
pub const SSH_KEYS: &str = "ssh-keys";

/// Deprecated spelling still honored by the compute API.
pub const DEPRECATED_SSH_KEYS: &str = "sshKeys";

/// Add `principal`'s public key to `metadata`.
///
/// The key goes into `ssh-keys`, unless only the deprecated `sshKeys` field
/// is present, in which case that one is updated. Existing keys are kept
/// after the new entry, one per line.
pub fn merge_public_key(
    mut metadata: Map<String, Value>,
    principal: &str,
    public_key: &str,
) -> Map<String, Value> {
    let field = if !metadata.contains_key(SSH_KEYS) && metadata.contains_key(DEPRECATED_SSH_KEYS) {
        DEPRECATED_SSH_KEYS
    } else {
        SSH_KEYS
    };

    let entry = format!("{}:{}", principal, public_key.trim_end());
    let merged = match metadata.get(field) {
        Some(Value::String(existing)) if !existing.is_empty() => format!("{entry}\n{existing}"),
        _ => entry,
    };

    metadata.insert(field.to_string(), Value::String(merged));
    metadata
}
