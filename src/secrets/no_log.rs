//! No-log enforcement for credential material.
//!
//! Secrets handled during synthesis (provider key material, freshly issued
//! deployment credentials) are wrapped so they never reach logs by accident,
//! and registered so the rendered template can be scanned for them.

use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fmt;

/// A string wrapper that prevents the value from being logged.
///
/// `Display`, `Debug` and `Serialize` all print `[REDACTED]`. Use
/// [`expose`](Self::expose) at the single point where the value is written
/// into its destination.
///
/// # Example
///
/// ```rust
/// use stackforge::secrets::SensitiveString;
///
/// let token = SensitiveString::new("deploy-token-0");
/// assert_eq!(format!("{token}"), "[REDACTED]");
/// assert_eq!(token.expose(), "deploy-token-0");
/// ```
#[derive(Clone)]
pub struct SensitiveString {
    value: String,
}

impl SensitiveString {
    /// Create a new sensitive string.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    /// Expose the underlying value.
    pub fn expose(&self) -> &str {
        &self.value
    }

    /// Consume and return the underlying value.
    pub fn into_inner(self) -> String {
        self.value
    }

    /// Check if the value is empty.
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Short SHA-256 fingerprint, safe to log.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.value.as_bytes());
        digest.iter().take(6).map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Display for SensitiveString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl fmt::Debug for SensitiveString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SensitiveString([REDACTED])")
    }
}

// No Deref to str: callers must go through expose().

impl From<String> for SensitiveString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SensitiveString {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl PartialEq for SensitiveString {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for SensitiveString {}

impl serde::Serialize for SensitiveString {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str("[REDACTED]")
    }
}

impl<'de> serde::Deserialize<'de> for SensitiveString {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Ok(Self::new(value))
    }
}

/// Shortest secret line tracked on its own; shorter lines match too much
/// unrelated text.
const MIN_FRAGMENT_LEN: usize = 16;

/// Registry of values that must not appear in rendered output.
///
/// Each value is tracked raw and in its JSON string-escaped form, since the
/// synthesizer scans serialized JSON. Multi-line values such as PEM keys are
/// also tracked line by line and with all whitespace removed, so a composer
/// that re-indents or re-wraps them does not hide them from the scan.
#[derive(Default)]
pub struct NoLogRegistry {
    values: HashSet<String>,
    compact: HashSet<String>,
}

impl NoLogRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a set of secrets.
    pub fn from_secrets<'a>(secrets: impl IntoIterator<Item = &'a SensitiveString>) -> Self {
        let mut registry = Self::new();
        for secret in secrets {
            registry.register(secret.expose());
        }
        registry
    }

    /// Register a sensitive value. Empty values are ignored.
    pub fn register(&mut self, value: &str) {
        if value.is_empty() {
            return;
        }

        self.values.insert(value.to_string());
        if let Some(escaped) = json_escaped(value) {
            self.values.insert(escaped);
        }

        if value.contains('\n') {
            for line in value.lines().map(str::trim) {
                // PEM armor is public and identical across keys.
                if line.len() >= MIN_FRAGMENT_LEN && !line.starts_with("-----") {
                    self.values.insert(line.to_string());
                }
            }

            let compact = compact(value);
            if compact.len() >= MIN_FRAGMENT_LEN {
                self.compact.insert(compact);
            }
        }
    }

    /// Check if a text contains any registered value.
    pub fn contains_sensitive(&self, text: &str) -> bool {
        if self.values.iter().any(|v| text.contains(v.as_str())) {
            return true;
        }
        if self.compact.is_empty() {
            return false;
        }

        let flattened = compact(text);
        self.compact.iter().any(|v| flattened.contains(v.as_str()))
    }

    /// Replace every registered value in `text` with `[REDACTED]`.
    pub fn redact(&self, text: &str) -> String {
        // Longest first so an escaped form is not half-replaced by its raw prefix.
        let mut ordered: Vec<&String> = self.values.iter().collect();
        ordered.sort_by_key(|v| std::cmp::Reverse(v.len()));

        let mut result = text.to_string();
        for value in ordered {
            if result.contains(value.as_str()) {
                result = result.replace(value.as_str(), "[REDACTED]");
            }
        }
        result
    }

    /// Number of tracked forms.
    pub fn len(&self) -> usize {
        self.values.len() + self.compact.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.compact.is_empty()
    }
}

impl fmt::Debug for NoLogRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NoLogRegistry")
            .field("registered_values", &self.len())
            .finish()
    }
}

/// JSON string body of `value` when it differs from the raw value.
fn json_escaped(value: &str) -> Option<String> {
    let quoted = serde_json::to_string(value).ok()?;
    let body = quoted.get(1..quoted.len() - 1)?;
    (body != value).then(|| body.to_string())
}

/// `text` without whitespace or JSON whitespace escapes.
fn compact(text: &str) -> String {
    text.replace("\\n", "")
        .replace("\\r", "")
        .replace("\\t", "")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect()
}
