//! Boot-time configuration (cloud-init user-data).
//!
//! The synthesizer describes what a machine needs at first boot with a
//! [`CloudInitConfig`] and hands it to a [`UserDataComposer`]. The default
//! composer, [`CloudConfigComposer`], emits a `#cloud-config` document.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Where the deployment credential is written on the machine.
pub const DEPLOY_KEY_PATH: &str = "/etc/stackforge/deploy.key";

/// Where a caller-supplied boot script is written before it runs.
pub const USER_SCRIPT_PATH: &str = "/var/lib/stackforge/user-data.sh";

static USERNAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z_][a-z0-9_-]{0,31}$").expect("Invalid username regex"));

/// Boot configuration shared by every replica of one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudInitConfig {
    /// Account created on the machine
    pub username: String,
    /// Supplementary groups of that account
    pub groups: Vec<String>,
    /// Machine hostname
    pub hostname: String,
    /// Expression resolving to this replica's deployment credential
    pub deploy_key: String,
    /// Caller-supplied boot script
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_data: Option<String>,
}

/// Turns a [`CloudInitConfig`] into serialized user-data.
#[async_trait]
pub trait UserDataComposer: Send + Sync {
    /// Render the user-data bytes.
    async fn compose(&self, config: &CloudInitConfig) -> Result<Vec<u8>>;
}

#[derive(Serialize)]
struct CloudConfig<'a> {
    hostname: &'a str,
    users: Vec<CloudUser<'a>>,
    write_files: Vec<WriteFile<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    runcmd: Vec<&'a str>,
}

#[derive(Serialize)]
struct CloudUser<'a> {
    name: &'a str,
    groups: &'a [String],
    shell: &'a str,
    sudo: &'a str,
}

#[derive(Serialize)]
struct WriteFile<'a> {
    path: &'a str,
    permissions: &'a str,
    content: &'a str,
}

/// Default composer producing a `#cloud-config` YAML document.
#[derive(Debug, Clone, Default)]
pub struct CloudConfigComposer;

impl CloudConfigComposer {
    /// Create a new composer.
    pub fn new() -> Self {
        Self
    }

    /// Render synchronously.
    pub fn render(&self, config: &CloudInitConfig) -> Result<String> {
        if !USERNAME_REGEX.is_match(&config.username) {
            return Err(Error::template_render(
                "cloud-config",
                format!("invalid username '{}'", config.username),
            ));
        }

        let mut write_files = vec![WriteFile {
            path: DEPLOY_KEY_PATH,
            permissions: "0600",
            content: &config.deploy_key,
        }];
        let mut runcmd = Vec::new();

        if let Some(script) = config.user_data.as_deref().filter(|s| !s.is_empty()) {
            write_files.push(WriteFile {
                path: USER_SCRIPT_PATH,
                permissions: "0755",
                content: script,
            });
            runcmd.push(USER_SCRIPT_PATH);
        }

        let document = CloudConfig {
            hostname: &config.hostname,
            users: vec![CloudUser {
                name: &config.username,
                groups: &config.groups,
                shell: "/bin/bash",
                sudo: "ALL=(ALL) NOPASSWD:ALL",
            }],
            write_files,
            runcmd,
        };

        let body = serde_yaml::to_string(&document)
            .map_err(|e| Error::template_render("cloud-config", e.to_string()))?;

        Ok(format!("#cloud-config\n{body}"))
    }
}

#[async_trait]
impl UserDataComposer for CloudConfigComposer {
    async fn compose(&self, config: &CloudInitConfig) -> Result<Vec<u8>> {
        self.render(config).map(String::into_bytes)
    }
}
