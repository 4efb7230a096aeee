//! Bootstrap templates.
//!
//! Before any user stack can be applied, each account needs a small amount of
//! shared infrastructure: a firewall rule that lets the deployment agent reach
//! provisioned machines. The template for it ships embedded in the crate and
//! is rendered with minijinja.

pub mod assets;

use minijinja::{AutoEscape, Environment, UndefinedBehavior};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::credential::GoogleCredential;
use crate::error::{Error, Result};
use crate::template::{RenderedTemplate, Template};

pub use assets::{asset, Asset, GOOGLE_BOOTSTRAP};

/// Port the deployment agent listens on.
pub const AGENT_PORT: &str = "56789";

const DEFAULT_REGION: &str = "us-central1";

/// Compute resource names: lowercase, at most 63 characters.
static RESOURCE_NAME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z]([-a-z0-9]{0,61}[a-z0-9])?$").expect("Invalid resource name regex")
});

/// Values substituted into the bootstrap template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BootstrapConfig {
    /// Project the rule is created in
    pub project: String,
    /// Provider region
    pub region: String,
    /// Network the firewall rule applies to
    pub network: String,
    /// Firewall resource and rule name
    pub firewall_name: String,
    /// TCP ports opened to the deployment agent
    pub allowed_ports: Vec<String>,
    /// CIDR ranges allowed in
    pub source_ranges: Vec<String>,
    /// Instance tags the rule targets
    pub target_tags: Vec<String>,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            project: String::new(),
            region: DEFAULT_REGION.to_string(),
            network: "default".to_string(),
            firewall_name: "stackforge-allow-deploy".to_string(),
            allowed_ports: vec!["22".to_string(), AGENT_PORT.to_string()],
            source_ranges: vec!["0.0.0.0/0".to_string()],
            target_tags: vec!["stackforge".to_string()],
        }
    }
}

impl BootstrapConfig {
    /// Configuration for the project and region of `credential`.
    pub fn for_credential(credential: &GoogleCredential) -> Self {
        Self {
            project: credential.project.clone(),
            region: credential
                .region
                .clone()
                .unwrap_or_else(|| DEFAULT_REGION.to_string()),
            ..Self::default()
        }
    }

    /// Check values that are spliced into the template unquoted.
    ///
    /// `firewall_name` becomes a resource key and part of a `${...}`
    /// reference, so it must be a valid compute resource name.
    pub fn validate(&self) -> Result<()> {
        if !RESOURCE_NAME_REGEX.is_match(&self.firewall_name) {
            return Err(Error::InvalidTemplate(format!(
                "firewall name {:?} is not a valid resource name",
                self.firewall_name
            )));
        }
        Ok(())
    }
}

/// Renders an embedded bootstrap template.
pub struct BootstrapRenderer {
    env: Environment<'static>,
    name: &'static str,
}

impl std::fmt::Debug for BootstrapRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapRenderer")
            .field("name", &self.name)
            .finish()
    }
}

impl BootstrapRenderer {
    /// Renderer for the Google Cloud bootstrap template.
    pub fn new() -> Result<Self> {
        let asset = asset(GOOGLE_BOOTSTRAP)?;
        Self::from_source(asset.name, asset.contents)
    }

    /// Renderer for an arbitrary template source.
    ///
    /// Undefined variables are errors, and nothing is auto-escaped: the
    /// template is expected to quote values itself with `tojson`.
    pub fn from_source(name: &'static str, source: &'static str) -> Result<Self> {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_auto_escape_callback(|_| AutoEscape::None);
        env.add_template(name, source)
            .map_err(|e| Error::TemplateSyntax {
                template: name.to_string(),
                message: e.to_string(),
            })?;

        Ok(Self { env, name })
    }

    /// Render the template and check the result is a well formed document.
    #[tracing::instrument(skip_all, fields(template = self.name, project = %config.project))]
    pub fn render(&self, config: &BootstrapConfig) -> Result<RenderedTemplate> {
        config.validate()?;

        let template = self
            .env
            .get_template(self.name)
            .map_err(|e| Error::template_render(self.name, e.to_string()))?;

        let content = template
            .render(config)
            .map_err(|e| Error::template_render(self.name, e.to_string()))?;

        let document = Template::from_json(&content)
            .map_err(|e| Error::template_render(self.name, e.to_string()))?;

        tracing::debug!("bootstrap template rendered");
        document.render()
    }
}

/// Render the bootstrap templates for `credential`, keyed
/// `<project>-<group>-<identifier>`.
pub fn bootstrap_templates(
    credential: &GoogleCredential,
    group: &str,
    identifier: &str,
) -> Result<Vec<RenderedTemplate>> {
    let renderer = BootstrapRenderer::new()?;
    let rendered = renderer.render(&BootstrapConfig::for_credential(credential))?;
    let key = format!("{}-{}-{}", credential.project, group, identifier);

    Ok(vec![rendered.with_key(key)])
}
