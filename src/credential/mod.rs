//! Credential verification.
//!
//! Verification is two-phased. [`ProviderCredential::validate`] checks the
//! credential structurally without touching the network; only when that
//! passes is a [`ComputeSession`] opened and a read-only account lookup made.
//!
//! ```text
//! validate() ──ok──> SessionFactory::open_session ──> ComputeSession::lookup_account
//!     │                         │                                │
//!     └── Error::Credential     └────── errors returned verbatim ┘
//! ```
//!
//! Nothing here retries; retry policy belongs to the caller.

pub mod google;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::secrets::SensitiveString;

pub use google::{GoogleCredential, ServiceAccountKey};

/// A stored cloud credential.
pub trait ProviderCredential: Send + Sync {
    /// Account or project identifier the credential is bound to.
    fn account_id(&self) -> &str;

    /// Structural validation with no network access.
    fn validate(&self) -> Result<()>;

    /// Secret fields that must never appear in rendered output.
    fn secret_values(&self) -> Vec<SensitiveString>;
}

/// Account details returned by the identity lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    /// Account or project identifier
    pub id: String,
    /// Human readable name, when the provider has one
    pub name: Option<String>,
}

/// An authenticated provider session.
#[async_trait]
pub trait ComputeSession: Send + Sync {
    /// Read-only lookup of the account the session is authenticated against.
    async fn lookup_account(&self, account_id: &str) -> Result<AccountInfo>;
}

/// Opens authenticated sessions for credentials of type `C`.
#[async_trait]
pub trait SessionFactory<C: ProviderCredential>: Send + Sync {
    /// Open a session authenticated with `credential`.
    async fn open_session(&self, credential: &C) -> Result<Box<dyn ComputeSession>>;
}

/// Verify that `credential` is well formed and authorized for its account.
///
/// Session and lookup errors are returned exactly as the collaborator
/// produced them.
#[tracing::instrument(skip_all, fields(account = %credential.account_id()))]
pub async fn verify<C, F>(credential: &C, sessions: &F) -> Result<AccountInfo>
where
    C: ProviderCredential,
    F: SessionFactory<C> + ?Sized,
{
    credential.validate()?;
    tracing::debug!("credential passed local validation");

    let session = sessions.open_session(credential).await?;
    let info = session.lookup_account(credential.account_id()).await?;

    tracing::info!(account = %info.id, "credential verified");
    Ok(info)
}
