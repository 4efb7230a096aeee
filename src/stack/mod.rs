//! Stack synthesis.
//!
//! [`StackSynthesizer::synthesize`] takes a user template and turns it into
//! one that can be applied as-is:
//!
//! 1. compute instances get provider defaults and, when replicated, a unique
//!    name per replica;
//! 2. each instance receives boot-time configuration from the
//!    [`UserDataComposer`] and the principal's SSH key;
//! 3. every replica gets its own deployment credential from the
//!    [`CredentialIssuer`], published as a `count.index` lookup map;
//! 4. the result is checked for forbidden variable references and for
//!    leaked provider secrets before it is serialized.
//!
//! Any failure aborts the whole call. The template is taken by value and
//! writes are staged until every resource succeeded, so there is never a
//! partially synthesized artifact.

pub mod instance;
pub mod replica;
pub mod ssh;

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::Instrument;

use crate::config::StackConfig;
use crate::credential::ProviderCredential;
use crate::error::{Error, Result};
use crate::issuer::CredentialIssuer;
use crate::secrets::{NoLogRegistry, SensitiveString};
use crate::template::{interpolate_field, RenderedTemplate, Template};
use crate::userdata::{CloudInitConfig, UserDataComposer};

pub use instance::InstanceDeclaration;
pub use replica::{ReplicaPlan, COUNT_INDEX};
pub use ssh::merge_public_key;

/// Metadata field carrying boot-time configuration.
pub const USER_DATA_FIELD: &str = "user-data";

/// Who a stack is synthesized for.
#[derive(Clone)]
pub struct SynthesisRequest {
    /// Requesting user; becomes the machine account and hostname
    pub principal: String,
    /// The principal's SSH public key
    pub public_key: String,
    secrets: Vec<SensitiveString>,
}

impl std::fmt::Debug for SynthesisRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynthesisRequest")
            .field("principal", &self.principal)
            .field("public_key", &self.public_key)
            .field("secrets", &self.secrets.len())
            .finish()
    }
}

impl SynthesisRequest {
    /// Create a request with no registered secrets.
    pub fn new(principal: impl Into<String>, public_key: impl Into<String>) -> Self {
        Self {
            principal: principal.into(),
            public_key: public_key.into(),
            secrets: Vec::new(),
        }
    }

    /// Register the secret fields of the provider credential the stack will
    /// be applied with.
    pub fn with_credential(mut self, credential: &dyn ProviderCredential) -> Self {
        self.secrets.extend(credential.secret_values());
        self
    }

    /// Register one more value that must not appear in the output.
    pub fn with_secret(mut self, secret: impl Into<SensitiveString>) -> Self {
        self.secrets.push(secret.into());
        self
    }

    fn registry(&self) -> NoLogRegistry {
        NoLogRegistry::from_secrets(&self.secrets)
    }
}

/// Turns user templates into applyable stacks.
pub struct StackSynthesizer {
    config: StackConfig,
    issuer: Arc<dyn CredentialIssuer>,
    composer: Arc<dyn UserDataComposer>,
}

impl std::fmt::Debug for StackSynthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StackSynthesizer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl StackSynthesizer {
    /// Create a synthesizer with the default configuration.
    pub fn new(issuer: Arc<dyn CredentialIssuer>, composer: Arc<dyn UserDataComposer>) -> Self {
        Self::with_config(StackConfig::default(), issuer, composer)
    }

    /// Create a synthesizer with an explicit configuration.
    pub fn with_config(
        config: StackConfig,
        issuer: Arc<dyn CredentialIssuer>,
        composer: Arc<dyn UserDataComposer>,
    ) -> Self {
        Self {
            config,
            issuer,
            composer,
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &StackConfig {
        &self.config
    }

    /// Synthesize `template` for the requesting principal.
    #[tracing::instrument(skip_all, fields(principal = %request.principal))]
    pub async fn synthesize(
        &self,
        mut template: Template,
        request: &SynthesisRequest,
    ) -> Result<RenderedTemplate> {
        let provider = &self.config.provider;
        let resource_type = provider.instance_resource.as_str();

        let mut instances: IndexMap<String, InstanceDeclaration> =
            template.decode_resources(resource_type)?;
        if instances.is_empty() {
            return Err(Error::NoInstancesDefined {
                resource_type: resource_type.to_string(),
            });
        }
        tracing::debug!(resources = instances.len(), "decoded instance declarations");
        let registry = request.registry();

        // Everything that can be checked locally is checked before any
        // collaborator is called.
        let mut plans = Vec::with_capacity(instances.len());
        for (resource, instance) in instances.iter_mut() {
            instance.apply_defaults(provider);

            let plan = ReplicaPlan::new(resource.as_str(), instance.replica_count());
            let declared = instance.validated_name(resource)?;
            if let Some(name) = plan.unique_name(declared) {
                instance.name = Some(Value::String(name));
            }
            plans.push(plan);
        }

        let mut deploy_keys = Vec::with_capacity(plans.len());
        for ((resource, instance), plan) in instances.iter_mut().zip(&plans) {
            let span = tracing::debug_span!("resource", %resource, replicas = plan.count());
            let keys = async {
                self.compose_metadata(resource, instance, request, &registry)
                    .await?;
                self.issue_credentials(plan, &request.principal, &registry)
                    .await
            }
            .instrument(span)
            .await?;
            deploy_keys.push((self.config.deploy_key_variable(resource), keys));
        }

        template.set_resources(resource_type, &instances)?;
        for (variable, keys) in deploy_keys {
            template.declare_variable(&variable, keys)?;
        }
        template.flush()?;

        let forbidden: Vec<&str> = provider
            .forbidden_variables
            .iter()
            .map(String::as_str)
            .collect();
        template.shadow_variables(&provider.shadow_holder, &forbidden)?;

        let content = template.to_json()?;
        if registry.contains_sensitive(&content) {
            tracing::error!("synthesized template contains provider credential material");
            return Err(Error::SecretExposed);
        }

        tracing::info!(resources = instances.len(), "stack synthesized");
        Ok(RenderedTemplate::new(content))
    }

    /// Install boot configuration and the principal's SSH key.
    ///
    /// Composer errors may quote the boot script, so their messages are
    /// redacted before they are wrapped.
    async fn compose_metadata(
        &self,
        resource: &str,
        instance: &mut InstanceDeclaration,
        request: &SynthesisRequest,
        registry: &NoLogRegistry,
    ) -> Result<()> {
        let mut metadata = instance.metadata.take().unwrap_or_default();
        interpolate_field(&mut metadata, USER_DATA_FIELD);

        let user_data = match metadata.get(USER_DATA_FIELD) {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            _ => None,
        };

        let cloud_init = CloudInitConfig {
            username: request.principal.clone(),
            groups: self.config.cloud_init.groups.clone(),
            hostname: request.principal.clone(),
            deploy_key: format!(
                "${{lookup(var.{}, count.index)}}",
                self.config.deploy_key_variable(resource)
            ),
            user_data,
        };

        let bytes = self
            .composer
            .compose(&cloud_init)
            .await
            .map_err(|e| Error::compose(resource, registry.redact(&e.to_string())))?;
        let rendered = String::from_utf8(bytes)
            .map_err(|e| Error::compose(resource, format!("user-data is not UTF-8: {e}")))?;

        metadata.insert(USER_DATA_FIELD.to_string(), Value::String(rendered));
        instance.metadata = Some(merge_public_key(
            metadata,
            &request.principal,
            &request.public_key,
        ));
        Ok(())
    }

    /// Issue one credential per replica, keyed by replica index.
    async fn issue_credentials(
        &self,
        plan: &ReplicaPlan,
        principal: &str,
        registry: &NoLogRegistry,
    ) -> Result<Value> {
        let mut keys = Map::new();

        for (replica, label) in plan.labels().into_iter().enumerate() {
            let credential = self.issuer.issue(&label, principal).await.map_err(|e| {
                Error::Issuance {
                    resource: plan.resource().to_string(),
                    replica,
                    label: label.clone(),
                    message: registry.redact(&e.to_string()),
                }
            })?;

            tracing::debug!(%label, fingerprint = %credential.fingerprint(), "issued deployment credential");
            keys.insert(replica.to_string(), Value::String(credential.into_inner()));
        }

        Ok(Value::Object(keys))
    }
}
