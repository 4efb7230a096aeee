//! Deployment credential issuance.
//!
//! Each provisioned machine receives its own short-lived credential so it can
//! authenticate back to the orchestrator. Minting happens in an external
//! service; this module only defines the seam.

use async_trait::async_trait;

use crate::error::Result;
use crate::secrets::SensitiveString;

/// Mints one deployment credential per replica label.
#[async_trait]
pub trait CredentialIssuer: Send + Sync {
    /// Issue a credential for the replica `label` (`web` or `web.2`), owned
    /// by `principal`.
    async fn issue(&self, label: &str, principal: &str) -> Result<SensitiveString>;
}
