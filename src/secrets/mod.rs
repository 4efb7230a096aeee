//! Handling of secret material.
//!
//! - [`SensitiveString`]: a string that redacts itself in logs and serialized output
//! - [`NoLogRegistry`]: the set of values that must never appear in a rendered template

mod no_log;

pub use no_log::{NoLogRegistry, SensitiveString};
