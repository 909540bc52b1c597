//! Config Schema Boundary Tests
//!
//! Validates: persisted key names, enum spellings, invalid input rejection,
//! and the distinction between absent and explicitly empty node policy.

use openclaw::config::{
    AuthProfileMode, Config, GatewayAuthMode, GatewayBindMode, ModelApi, StatePaths,
    TailscaleMode,
};

// ─────────────────────────────────────────────────────────────────────────────
// Invalid value fail-fast
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn config_wrong_type_for_port_fails() {
    let toml_str = r#"
[gateway]
port = "not_a_number"
"#;
    let result: Result<Config, _> = toml::from_str(toml_str);
    assert!(result.is_err(), "string for u16 port should fail to parse");
}

#[test]
fn config_overflow_port_fails() {
    let toml_str = r#"
[gateway]
port = 99999
"#;
    let result: Result<Config, _> = toml::from_str(toml_str);
    assert!(result.is_err(), "port above u16 range should fail");
}

#[test]
fn config_unknown_bind_mode_fails() {
    let toml_str = r#"
[gateway]
bind = "everywhere"
"#;
    let result: Result<Config, _> = toml::from_str(toml_str);
    assert!(result.is_err(), "bind is a closed set");
}

// ─────────────────────────────────────────────────────────────────────────────
// Field spelling
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn gateway_section_parses_all_fields() {
    let toml_str = r#"
[gateway]
port = 19001
bind = "custom"
custom_bind_host = "10.0.0.5"

[gateway.auth]
mode = "password"
password = "plain"

[gateway.tailscale]
mode = "serve"
reset_on_exit = true

[gateway.nodes]
deny_commands = []
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    let gateway = config.gateway.unwrap();
    assert_eq!(gateway.port, Some(19001));
    assert_eq!(gateway.bind, Some(GatewayBindMode::Custom));
    assert_eq!(gateway.custom_bind_host.as_deref(), Some("10.0.0.5"));
    assert_eq!(gateway.auth.unwrap().mode, Some(GatewayAuthMode::Password));
    let tailscale = gateway.tailscale.unwrap();
    assert_eq!(tailscale.mode, Some(TailscaleMode::Serve));
    assert_eq!(tailscale.reset_on_exit, Some(true));
    assert_eq!(gateway.nodes.unwrap().deny_commands, Some(Vec::new()));
}

#[test]
fn provider_api_uses_kebab_case() {
    let toml_str = r#"
[models.providers.xai]
base_url = "https://api.x.ai/v1"
api = "openai-completions"
models = [{ id = "grok-4" }]
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    let provider = &config.models.unwrap().providers.unwrap()["xai"];
    assert_eq!(provider.api, Some(ModelApi::OpenaiCompletions));
    assert_eq!(provider.models[0].id, "grok-4");
}

#[test]
fn oauth_profile_refs_still_parse() {
    let toml_str = r#"
[auth.profiles."openai-codex:default"]
provider = "openai-codex"
mode = "oauth"
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    let profiles = config.auth.unwrap().profiles.unwrap();
    assert_eq!(profiles["openai-codex:default"].mode, AuthProfileMode::Oauth);
}

#[test]
fn secrets_encrypt_defaults_to_true() {
    let config: Config = toml::from_str("").unwrap();
    assert!(config.secrets.encrypt);
}

// ─────────────────────────────────────────────────────────────────────────────
// JSON Schema export
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn json_schema_describes_gateway() {
    let schema = schemars::schema_for!(Config);
    let json = serde_json::to_value(&schema).unwrap();
    let text = json.to_string();
    assert!(text.contains("custom_bind_host"));
    assert!(text.contains("deny_commands"));
    assert!(text.contains("tailnet"));
}

// ─────────────────────────────────────────────────────────────────────────────
// State paths
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn profile_state_dir_and_default_workspace() {
    let env = |key: &str| match key {
        "HOME" => Some("/home/op".to_string()),
        "OPENCLAW_PROFILE" => Some("work".to_string()),
        _ => None,
    };
    let paths = StatePaths::resolve_with(env, std::path::Path::new("/tmp")).unwrap();
    assert_eq!(paths.state_dir, std::path::PathBuf::from("/home/op/.openclaw-work"));
    assert_eq!(
        paths.config_path,
        std::path::PathBuf::from("/home/op/.openclaw-work/config.toml")
    );
    assert_eq!(
        paths.default_workspace_dir(),
        std::path::PathBuf::from("/home/op/.openclaw/workspace")
    );
}
