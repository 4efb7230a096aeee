//! Typed view of one compute instance declaration.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::config::ProviderDefaults;
use crate::error::{Error, Result};

/// A named `google_compute_instance` block.
///
/// Attributes the synthesizer reads or defaults have their own fields;
/// everything else is carried in `extra` so nothing is lost on write-back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstanceDeclaration {
    /// Instance name; may contain `${count.index}`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<Value>,

    /// Replica count
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<Value>,

    /// Machine type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_type: Option<Value>,

    /// Zone or zone expression
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<Value>,

    /// Boot disk
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk: Option<Value>,

    /// Network interface
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_interface: Option<Value>,

    /// Instance metadata (`user-data`, `ssh-keys`, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,

    /// Every other attribute, passed through untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn is_unset(value: &Option<Value>) -> bool {
    match value {
        None => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}

impl InstanceDeclaration {
    /// Fill in provider defaults for attributes the caller left out.
    ///
    /// An empty string counts as unset; any other value, string or not, is
    /// kept as declared. The boot disk is only defaulted when
    /// no `disk` attribute exists at all. Calling this twice changes nothing.
    pub fn apply_defaults(&mut self, defaults: &ProviderDefaults) {
        if is_unset(&self.machine_type) {
            self.machine_type = Some(Value::String(defaults.machine_type.clone()));
        }

        if is_unset(&self.zone) {
            self.zone = Some(Value::String(defaults.zone.clone()));
        }

        if self.disk.is_none() {
            self.disk = Some(json!({ "image": defaults.image }));
        }

        if self.network_interface.is_none() {
            self.network_interface = Some(json!({
                "network": defaults.network,
                "access_config": {}
            }));
        }
    }

    /// The declared name, which must be a non-empty string.
    pub fn validated_name(&self, resource: &str) -> Result<&str> {
        match &self.name {
            Some(Value::String(name)) if !name.is_empty() => Ok(name),
            Some(Value::String(_)) => Err(Error::invalid_name(resource, "empty")),
            Some(_) => Err(Error::invalid_name(resource, "not a string")),
            None => Err(Error::invalid_name(resource, "missing")),
        }
    }

    /// Number of replicas: the `count` attribute when it is an integer
    /// greater than one, otherwise one.
    ///
    /// A string holding a decimal integer is read as that integer. Any other
    /// `count` is logged and treated as a single replica.
    pub fn replica_count(&self) -> usize {
        let Some(value) = &self.count else {
            return 1;
        };

        let parsed = match value {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse::<u64>().ok(),
            _ => None,
        };
        let Some(n) = parsed.and_then(|n| usize::try_from(n).ok()) else {
            tracing::warn!(count = %value, "count is not a non-negative integer; using one replica");
            return 1;
        };

        n.max(1)
    }
}
