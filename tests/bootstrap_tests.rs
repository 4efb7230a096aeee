//! Integration tests for bootstrap template rendering.

mod common;

use pretty_assertions::assert_eq;
use serde_json::json;

use common::*;
use stackforge::bootstrap::{bootstrap_templates, BootstrapConfig, BootstrapRenderer};
use stackforge::credential::GoogleCredential;
use stackforge::error::{Error, ErrorKind};
use stackforge::template::Template;

#[test]
fn test_bootstrap_templates_are_keyed() {
    let templates = bootstrap_templates(&google_credential(), "team-a", "b7e1").unwrap();

    assert_eq!(templates.len(), 1);
    assert_eq!(templates[0].key.as_deref(), Some("demo-project-team-a-b7e1"));
}

#[test]
fn test_bootstrap_output_is_a_template() {
    let templates = bootstrap_templates(&google_credential(), "team-a", "b7e1").unwrap();
    let doc = parse(&templates[0].content);

    assert_eq!(
        doc["provider"]["google"],
        json!({ "project": "demo-project", "region": "europe-west1" })
    );
    assert!(doc["resource"]["google_compute_firewall"]["stackforge-allow-deploy"].is_object());

    let template = Template::from_json(&templates[0].content).unwrap();
    assert!(template.block("output").is_some());
}

#[test]
fn test_bootstrap_without_region_uses_default() {
    let credential = GoogleCredential::new("demo-project", service_account_json());
    let templates = bootstrap_templates(&credential, "g", "i").unwrap();

    assert_eq!(parse(&templates[0].content)["provider"]["google"]["region"], "us-central1");
}

#[test]
fn test_custom_firewall_settings() {
    let config = BootstrapConfig {
        project: "demo-project".to_string(),
        network: "private".to_string(),
        firewall_name: "allow-agent".to_string(),
        allowed_ports: vec!["56789".to_string()],
        source_ranges: vec!["10.0.0.0/8".to_string(), "192.168.0.0/16".to_string()],
        ..BootstrapConfig::default()
    };
    let rendered = BootstrapRenderer::new().unwrap().render(&config).unwrap();
    let doc = parse(&rendered.content);
    let rule = &doc["resource"]["google_compute_firewall"]["allow-agent"];

    assert_eq!(rule["network"], "private");
    assert_eq!(rule["allow"], json!([{ "protocol": "tcp", "ports": ["56789"] }]));
    assert_eq!(rule["source_ranges"], json!(["10.0.0.0/8", "192.168.0.0/16"]));
    assert_eq!(
        doc["output"]["firewall_name"]["value"],
        "${google_compute_firewall.allow-agent.name}"
    );
}

#[test]
fn test_bootstrap_does_not_contain_credentials() {
    let templates = bootstrap_templates(&google_credential(), "team-a", "b7e1").unwrap();
    assert!(!templates[0].content.contains("PRIVATE KEY"));
    assert!(!templates[0].content.contains("google_credentials"));
}

#[test]
fn test_quoted_firewall_name_rejected() {
    let config = BootstrapConfig {
        project: "demo-project".to_string(),
        firewall_name: "x\" } }, \"injected\": { \"y".to_string(),
        ..BootstrapConfig::default()
    };
    let err = BootstrapRenderer::new().unwrap().render(&config).unwrap_err();

    assert!(matches!(err, Error::InvalidTemplate(_)));
    assert_eq!(err.kind(), ErrorKind::Validation);
}
