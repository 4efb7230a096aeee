//! Interpolation marking for string attributes.
//!
//! The provisioning backend evaluates every `${...}` sequence in a string
//! attribute. Boot scripts routinely contain shell expansions such as
//! `${HOME}` that must survive untouched, so before a field is handed to the
//! backend every sequence that is not a template reference is escaped to
//! `$${...}`. References (`${var.x}`, `${count.index}`, `${lookup(...)}`,
//! `${google_compute_instance.web.id}`) are left for the backend to resolve.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::{Map, Value};

/// Matches `${...}` with an optional leading `$` that marks an existing escape.
static INTERPOLATION_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\$?)\$\{([^}]*)\}").expect("Invalid interpolation regex"));

/// A reference is a lowercase identifier followed by `.` (attribute access)
/// or `(` (function call).
static REFERENCE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*[a-z_][a-z0-9_-]*\s*[.(]").expect("Invalid reference regex")
});

/// Returns true when the body of a `${...}` sequence is a template reference.
pub fn is_reference(body: &str) -> bool {
    REFERENCE_REGEX.is_match(body)
}

/// Escape every non-reference `${...}` in `input`.
///
/// Already escaped sequences (`$${...}`) are kept as they are, so the
/// function is idempotent.
pub fn escape_non_references(input: &str) -> String {
    INTERPOLATION_REGEX
        .replace_all(input, |caps: &Captures<'_>| {
            let whole = &caps[0];
            let escaped = !caps[1].is_empty();
            if escaped || is_reference(&caps[2]) {
                whole.to_string()
            } else {
                format!("$${{{}}}", &caps[2])
            }
        })
        .into_owned()
}

/// Mark `attrs[field]` for backend interpolation.
///
/// Non-string or missing fields are left alone.
pub fn interpolate_field(attrs: &mut Map<String, Value>, field: &str) {
    if let Some(Value::String(s)) = attrs.get_mut(field) {
        let escaped = escape_non_references(s);
        if escaped != *s {
            tracing::debug!(field, "escaped shell interpolation in field");
            *s = escaped;
        }
    }
}
