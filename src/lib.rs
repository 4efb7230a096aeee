//! # Stackforge - Stack Synthesis for Cloud Provisioning
//!
//! Stackforge turns user-authored Terraform JSON templates into stacks that can
//! be applied unattended. It checks the cloud credential the stack will run
//! with, renders the per-account bootstrap template, and rewrites compute
//! instance declarations so every machine boots with its own deployment
//! credential and the requesting user's SSH key.
//!
//! ## Core Concepts
//!
//! - **Credentials**: stored provider credentials, verified locally and then
//!   against the provider
//! - **Bootstrap templates**: shared per-account infrastructure, embedded in
//!   the crate
//! - **Templates**: Terraform JSON documents with staged writes
//! - **Synthesis**: defaults, replica expansion, boot configuration and
//!   credential issuance for compute instances
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────┐      ┌──────────────────────┐
//! │  credential::verify  │      │  BootstrapRenderer   │
//! │ (validate + lookup)  │      │ (embedded minijinja) │
//! └──────────┬───────────┘      └──────────────────────┘
//!            │ secret values
//!            ▼
//! ┌─────────────────────────────────────────────────────┐
//! │                  StackSynthesizer                    │
//! │  decode ─> defaults ─> compose ─> issue ─> flush     │
//! │              ─> shadow check ─> leak check           │
//! └───────┬─────────────────────────────────┬───────────┘
//!         ▼                                 ▼
//! ┌──────────────────┐            ┌──────────────────────┐
//! │ UserDataComposer │            │   CredentialIssuer   │
//! └──────────────────┘            └──────────────────────┘
//! ```
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use stackforge::prelude::*;
//!
//! async fn run(issuer: Arc<dyn CredentialIssuer>, credential: GoogleCredential) -> Result<()> {
//!     let synthesizer = StackSynthesizer::new(issuer, Arc::new(CloudConfigComposer::new()));
//!
//!     let template = Template::from_json(r#"{
//!         "resource": { "google_compute_instance": { "web": { "name": "web", "count": 3 } } }
//!     }"#)?;
//!     let request = SynthesisRequest::new("alice", "ssh-ed25519 AAAA...")
//!         .with_credential(&credential);
//!
//!     let stack = synthesizer.synthesize(template, &request).await?;
//!     println!("{}", stack.content);
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.

    pub use crate::bootstrap::{bootstrap_templates, BootstrapConfig, BootstrapRenderer};
    pub use crate::config::StackConfig;
    pub use crate::credential::{
        verify, AccountInfo, ComputeSession, GoogleCredential, ProviderCredential, SessionFactory,
    };
    pub use crate::error::{Error, ErrorKind, Result};
    pub use crate::issuer::CredentialIssuer;
    pub use crate::secrets::SensitiveString;
    pub use crate::stack::{StackSynthesizer, SynthesisRequest};
    pub use crate::template::{RenderedTemplate, Template};
    pub use crate::userdata::{CloudConfigComposer, CloudInitConfig, UserDataComposer};
}

// ============================================================================
// Core Modules
// ============================================================================

/// Error types and result aliases.
pub mod error;

/// Configuration loading and provider defaults.
pub mod config;

/// Redacting wrappers for secret values.
pub mod secrets;

/// Logging setup.
pub mod telemetry;

// ============================================================================
// Templates
// ============================================================================

/// Terraform JSON documents with staged writes.
pub mod template;

/// Embedded per-account bootstrap templates.
pub mod bootstrap;

/// Compute instance rewriting.
///
/// The [`StackSynthesizer`](stack::StackSynthesizer) applies provider
/// defaults, expands replicas, installs boot configuration and issues one
/// deployment credential per replica.
pub mod stack;

// ============================================================================
// Collaborators
// ============================================================================

/// Provider credential verification.
pub mod credential;

/// Deployment credential issuance.
pub mod issuer;

/// Boot-time configuration rendering.
pub mod userdata;
