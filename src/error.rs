//! Error types for Stackforge.
//!
//! Every failure aborts the current call. Variants carry the context a caller
//! needs to present an actionable message: the resource name, the replica
//! index, or the variable name involved.

use std::fmt;
use thiserror::Error;

/// Result type alias for Stackforge operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for Stackforge.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Validation Errors
    // ========================================================================
    /// The template declares no compute instances.
    #[error("there are no '{resource_type}' resources defined")]
    NoInstancesDefined {
        /// Resource type that was looked up
        resource_type: String,
    },

    /// An instance is missing its name or the name is not a non-empty string.
    #[error("'{resource}' instance name is {reason}")]
    InvalidInstanceName {
        /// Resource name
        resource: String,
        /// Why the name was rejected
        reason: String,
    },

    /// The template document is structurally invalid.
    #[error("invalid template: {0}")]
    InvalidTemplate(String),

    /// A template block could not be decoded into its typed view.
    #[error("failed to decode '{block}' block: {source}")]
    Decode {
        /// Dotted block path, e.g. `resource.google_compute_instance`
        block: String,
        /// Underlying decode error
        #[source]
        source: serde_json::Error,
    },

    // ========================================================================
    // Credential Errors
    // ========================================================================
    /// Local credential validation failed.
    #[error("invalid credential for account '{account}': {message}")]
    Credential {
        /// Account or project identifier
        account: String,
        /// Error message
        message: String,
    },

    /// Opening or using an authenticated provider session failed.
    #[error("provider session for account '{account}' failed: {message}")]
    Session {
        /// Account or project identifier
        account: String,
        /// Error message
        message: String,
    },

    // ========================================================================
    // Synthesis Errors
    // ========================================================================
    /// Minting a deployment credential failed for one replica.
    #[error("failed to issue deployment credential '{label}' (replica {replica} of '{resource}'): {message}")]
    Issuance {
        /// Resource name
        resource: String,
        /// Replica index
        replica: usize,
        /// Replica label passed to the issuer
        label: String,
        /// Error message
        message: String,
    },

    /// Rendering boot-time user-data failed.
    #[error("failed to compose user-data for '{resource}': {message}")]
    Compose {
        /// Resource name
        resource: String,
        /// Error message
        message: String,
    },

    // ========================================================================
    // Security Errors
    // ========================================================================
    /// A forbidden variable is still referenced after rendering.
    #[error("variable '{variable}' is forbidden and must not be referenced in the template")]
    ShadowViolation {
        /// Forbidden variable name
        variable: String,
    },

    /// Credential secret material was found in the rendered output.
    #[error("rendered template contains credential secret material")]
    SecretExposed,

    // ========================================================================
    // Serialization Errors
    // ========================================================================
    /// Final encoding failed.
    #[error("failed to serialize template: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Serialization was requested while staged changes were pending.
    #[error("template has staged changes that were not flushed")]
    UnflushedChanges,

    // ========================================================================
    // Asset and Template Engine Errors
    // ========================================================================
    /// No embedded asset with this name exists.
    #[error("embedded asset not found: {0}")]
    AssetNotFound(String),

    /// Template syntax error.
    #[error("template syntax error in '{template}': {message}")]
    TemplateSyntax {
        /// Template name
        template: String,
        /// Error message
        message: String,
    },

    /// Template rendering error.
    #[error("template rendering failed for '{template}': {message}")]
    TemplateRender {
        /// Template name
        template: String,
        /// Error message
        message: String,
    },

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Coarse error classification for callers that branch on the kind of failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Missing or invalid block, name or document
    Validation,
    /// Credential verification or session failure
    Credential,
    /// Deployment credential minting failure
    Issuance,
    /// User-data rendering failure
    Compose,
    /// Forbidden variable or secret survived rendering
    ShadowViolation,
    /// Final encode failure
    Serialization,
    /// Embedded asset or template engine failure
    Template,
    /// Configuration failure
    Config,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Credential => "credential",
            ErrorKind::Issuance => "issuance",
            ErrorKind::Compose => "compose",
            ErrorKind::ShadowViolation => "shadow_violation",
            ErrorKind::Serialization => "serialization",
            ErrorKind::Template => "template",
            ErrorKind::Config => "config",
        };
        write!(f, "{name}")
    }
}

impl Error {
    /// Creates a new invalid instance name error.
    pub fn invalid_name(resource: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInstanceName {
            resource: resource.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new credential validation error.
    pub fn credential(account: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Credential {
            account: account.into(),
            message: message.into(),
        }
    }

    /// Creates a new provider session error.
    pub fn session(account: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Session {
            account: account.into(),
            message: message.into(),
        }
    }

    /// Creates a new compose error.
    pub fn compose(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Compose {
            resource: resource.into(),
            message: message.into(),
        }
    }

    /// Creates a new template render error.
    pub fn template_render(template: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TemplateRender {
            template: template.into(),
            message: message.into(),
        }
    }

    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NoInstancesDefined { .. }
            | Error::InvalidInstanceName { .. }
            | Error::InvalidTemplate(_)
            | Error::Decode { .. } => ErrorKind::Validation,
            Error::Credential { .. } | Error::Session { .. } => ErrorKind::Credential,
            Error::Issuance { .. } => ErrorKind::Issuance,
            Error::Compose { .. } => ErrorKind::Compose,
            Error::ShadowViolation { .. } | Error::SecretExposed => ErrorKind::ShadowViolation,
            Error::Serialization(_) | Error::UnflushedChanges => ErrorKind::Serialization,
            Error::AssetNotFound(_) | Error::TemplateSyntax { .. } | Error::TemplateRender { .. } => {
                ErrorKind::Template
            }
            Error::Config(_) => ErrorKind::Config,
        }
    }
}
