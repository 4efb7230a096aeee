//! In-memory provisioning template.
//!
//! A [`Template`] wraps a Terraform JSON document. Reads go straight to the
//! document; writes are staged and only become part of the document when
//! [`Template::flush`] commits them, so a failed synthesis never leaves a
//! half-mutated document behind.
//!
//! ```text
//! decode_resources ──> (caller mutates typed copies)
//!                            │
//!        set_resources / declare_variable   (staged)
//!                            │
//!                          flush            (committed)
//!                            │
//!             shadow_variables ──> to_json
//! ```

pub mod interpolate;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

pub use interpolate::{escape_non_references, interpolate_field};

/// Top-level block holding resource declarations.
pub const RESOURCE_BLOCK: &str = "resource";
/// Top-level block holding variable declarations.
pub const VARIABLE_BLOCK: &str = "variable";

/// Characters allowed in a variable name.
static VARIABLE_NAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_-]*$").expect("Invalid variable name regex"));

/// A finished, serialized template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedTemplate {
    /// Storage key, assigned by the caller (bootstrap templates are keyed by
    /// account, group and identifier)
    pub key: Option<String>,
    /// Serialized document
    pub content: String,
}

impl RenderedTemplate {
    /// Create an unkeyed rendered template.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            key: None,
            content: content.into(),
        }
    }

    /// Set the storage key.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }
}

/// Mutable Terraform JSON document with staged writes.
#[derive(Debug, Clone, Default)]
pub struct Template {
    document: Map<String, Value>,
    staged_resources: IndexMap<String, Map<String, Value>>,
    staged_variables: IndexMap<String, Value>,
}

impl Template {
    /// Create an empty template.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a template from its JSON wire form.
    pub fn from_json(content: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(content)
            .map_err(|e| Error::InvalidTemplate(format!("not valid JSON: {e}")))?;
        Self::from_value(value)
    }

    /// Build a template from an already parsed document.
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(document) = value else {
            return Err(Error::InvalidTemplate(
                "document root must be an object".to_string(),
            ));
        };

        for block in [RESOURCE_BLOCK, VARIABLE_BLOCK] {
            if let Some(v) = document.get(block) {
                if !v.is_object() {
                    return Err(Error::InvalidTemplate(format!(
                        "'{block}' block must be an object"
                    )));
                }
            }
        }

        Ok(Self {
            document,
            ..Self::default()
        })
    }

    /// Get a top-level block of the committed document.
    pub fn block(&self, name: &str) -> Option<&Value> {
        self.document.get(name)
    }

    /// Get a committed variable declaration.
    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.document.get(VARIABLE_BLOCK)?.get(name)
    }

    /// Decode every resource of `resource_type` into its typed view.
    ///
    /// Returns an empty map when the type is absent.
    pub fn decode_resources<T>(&self, resource_type: &str) -> Result<IndexMap<String, T>>
    where
        T: DeserializeOwned,
    {
        let Some(resources) = self
            .document
            .get(RESOURCE_BLOCK)
            .and_then(|r| r.get(resource_type))
        else {
            return Ok(IndexMap::new());
        };

        serde_json::from_value(resources.clone()).map_err(|source| Error::Decode {
            block: format!("{RESOURCE_BLOCK}.{resource_type}"),
            source,
        })
    }

    /// Stage a replacement for every resource of `resource_type`.
    pub fn set_resources<T>(
        &mut self,
        resource_type: &str,
        resources: &IndexMap<String, T>,
    ) -> Result<()>
    where
        T: Serialize,
    {
        let mut encoded = Map::new();
        for (name, resource) in resources {
            encoded.insert(name.clone(), serde_json::to_value(resource)?);
        }
        self.staged_resources
            .insert(resource_type.to_string(), encoded);
        Ok(())
    }

    /// Stage a variable declaration with the given default, replacing any
    /// existing declaration of the same name.
    pub fn declare_variable(&mut self, name: &str, default: Value) -> Result<()> {
        if !VARIABLE_NAME_REGEX.is_match(name) {
            return Err(Error::InvalidTemplate(format!(
                "invalid variable name '{name}'"
            )));
        }

        let mut declaration = Map::new();
        declaration.insert("default".to_string(), default);
        self.staged_variables
            .insert(name.to_string(), Value::Object(declaration));
        Ok(())
    }

    /// Returns true when staged writes are waiting for [`flush`](Self::flush).
    pub fn is_dirty(&self) -> bool {
        !self.staged_resources.is_empty() || !self.staged_variables.is_empty()
    }

    /// Commit all staged writes into the document.
    pub fn flush(&mut self) -> Result<()> {
        if !self.is_dirty() {
            return Ok(());
        }

        let resources = object_block(&mut self.document, RESOURCE_BLOCK)?;
        for (resource_type, encoded) in self.staged_resources.drain(..) {
            resources.insert(resource_type, Value::Object(encoded));
        }

        let variables = object_block(&mut self.document, VARIABLE_BLOCK)?;
        for (name, declaration) in self.staged_variables.drain(..) {
            variables.insert(name, declaration);
        }

        tracing::trace!("flushed staged template changes");
        Ok(())
    }

    /// Shadow forbidden variables and verify nothing references them.
    ///
    /// A declaration of a forbidden variable has its default replaced by
    /// `holder`. Any `var.<name>` reference outside the variable block fails
    /// the call with [`Error::ShadowViolation`]; references are reported, not
    /// removed.
    pub fn shadow_variables(&mut self, holder: &str, names: &[&str]) -> Result<()> {
        if self.is_dirty() {
            return Err(Error::UnflushedChanges);
        }

        for name in names {
            if let Some(Value::Object(declaration)) = self
                .document
                .get_mut(VARIABLE_BLOCK)
                .and_then(|v| v.get_mut(*name))
            {
                declaration.insert("default".to_string(), Value::String(holder.to_string()));
            }

            let pattern = Regex::new(&format!(r"\bvar\.{}\b", regex::escape(name)))
                .map_err(|e| Error::InvalidTemplate(e.to_string()))?;

            let referenced = self
                .document
                .iter()
                .filter(|(block, _)| block.as_str() != VARIABLE_BLOCK)
                .any(|(_, value)| references(value, &pattern));

            if referenced {
                return Err(Error::ShadowViolation {
                    variable: (*name).to_string(),
                });
            }
        }

        Ok(())
    }

    /// Serialize the committed document as pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        if self.is_dirty() {
            return Err(Error::UnflushedChanges);
        }
        Ok(serde_json::to_string_pretty(&self.document)?)
    }

    /// Serialize into an unkeyed [`RenderedTemplate`].
    pub fn render(&self) -> Result<RenderedTemplate> {
        Ok(RenderedTemplate::new(self.to_json()?))
    }
}

/// Get or create an object-valued top-level block.
fn object_block<'a>(
    document: &'a mut Map<String, Value>,
    name: &str,
) -> Result<&'a mut Map<String, Value>> {
    document
        .entry(name.to_string())
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .ok_or_else(|| Error::InvalidTemplate(format!("'{name}' block must be an object")))
}

/// Walk a value looking for `pattern` in any string or key.
fn references(value: &Value, pattern: &Regex) -> bool {
    match value {
        Value::String(s) => pattern.is_match(s),
        Value::Array(items) => items.iter().any(|v| references(v, pattern)),
        Value::Object(map) => map
            .iter()
            .any(|(k, v)| pattern.is_match(k) || references(v, pattern)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Template {
        Template::from_value(json!({
            "provider": { "google": { "project": "demo" } },
            "resource": {
                "google_compute_instance": {
                    "web": { "name": "web", "machine_type": "n1-standard-2" }
                },
                "google_compute_firewall": {
                    "allow": { "name": "allow" }
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_rejects_non_object_root() {
        let err = Template::from_json("[1, 2]").unwrap_err();
        assert!(matches!(err, Error::InvalidTemplate(_)));

        let err = Template::from_value(json!({ "resource": [] })).unwrap_err();
        assert!(err.to_string().contains("'resource' block"));
    }

    #[test]
    fn test_decode_missing_type_is_empty() {
        let t = sample();
        let decoded: IndexMap<String, Value> = t.decode_resources("aws_instance").unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn test_staged_writes_are_invisible_until_flush() {
        let mut t = sample();
        let mut resources: IndexMap<String, Value> =
            t.decode_resources("google_compute_instance").unwrap();
        resources["web"]["zone"] = json!("us-central1-a");

        t.set_resources("google_compute_instance", &resources).unwrap();
        t.declare_variable("deploy_keys_web", json!({ "0": "k" })).unwrap();
        assert!(t.is_dirty());
        assert!(t.variable("deploy_keys_web").is_none());
        assert!(matches!(t.to_json(), Err(Error::UnflushedChanges)));

        t.flush().unwrap();
        assert!(!t.is_dirty());
        assert_eq!(
            t.variable("deploy_keys_web").unwrap(),
            &json!({ "default": { "0": "k" } })
        );
        let out: Value = serde_json::from_str(&t.to_json().unwrap()).unwrap();
        assert_eq!(
            out["resource"]["google_compute_instance"]["web"]["zone"],
            "us-central1-a"
        );
        // untouched resource types survive
        assert_eq!(out["resource"]["google_compute_firewall"]["allow"]["name"], "allow");
    }

    #[test]
    fn test_declare_variable_rejects_bad_names() {
        let mut t = Template::new();
        assert!(t.declare_variable("bad name", json!(1)).is_err());
        assert!(t.declare_variable("ok_name-1", json!(1)).is_ok());
    }

    #[test]
    fn test_shadow_variables_detects_reference() {
        let mut t = Template::from_value(json!({
            "provider": { "google": { "credentials": "${var.google_credentials}" } }
        }))
        .unwrap();

        let err = t
            .shadow_variables("FORBIDDEN", &["google_credentials"])
            .unwrap_err();
        assert!(matches!(err, Error::ShadowViolation { ref variable } if variable == "google_credentials"));
    }

    #[test]
    fn test_shadow_variables_shadows_declaration() {
        let mut t = Template::from_value(json!({
            "variable": { "google_credentials": { "default": "{\"private_key\": \"x\"}" } },
            "resource": { "null_resource": { "a": { "triggers": { "v": "${var.google_credentials_path}" } } } }
        }))
        .unwrap();

        t.shadow_variables("FORBIDDEN", &["google_credentials"]).unwrap();
        assert_eq!(
            t.variable("google_credentials").unwrap()["default"],
            "FORBIDDEN"
        );
    }

    #[test]
    fn test_shadow_requires_flush() {
        let mut t = Template::new();
        t.declare_variable("x", json!(1)).unwrap();
        assert!(matches!(
            t.shadow_variables("FORBIDDEN", &["google_credentials"]),
            Err(Error::UnflushedChanges)
        ));
    }

    #[test]
    fn test_rendered_template_key() {
        let rendered = RenderedTemplate::new("{}").with_key("p-g-i");
        assert_eq!(rendered.key.as_deref(), Some("p-g-i"));
    }
}
