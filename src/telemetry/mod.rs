//! Logging for Stackforge.
//!
//! All components log through `tracing`. Secrets never appear in events;
//! issued credentials are identified by their fingerprint.

pub mod logging;

pub use logging::{LogFormat, LogLevel, LoggingBuilder};
