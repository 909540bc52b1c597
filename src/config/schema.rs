use crate::config::paths::StatePaths;
use crate::security::SecretStore;
use anyhow::{bail, Context, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
#[cfg(unix)]
use tokio::fs::File;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

// ── Top-level config ──────────────────────────────────────────────

/// Top-level OpenClaw configuration, loaded from `config.toml`.
///
/// Every section is optional: an absent node means "never configured" and is
/// distinct from an explicitly empty one. Sections this crate does not model
/// are carried through `extra` untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Config {
    /// Path to config.toml - computed from the environment, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,
    /// State directory holding secrets and auth profiles - not serialized
    #[serde(skip)]
    pub state_dir: PathBuf,

    /// Bookkeeping written by onboarding (`[meta]`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<MetaConfig>,

    /// Agent defaults: workspace and model selection (`[agents]`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agents: Option<AgentsConfig>,

    /// Auth profile references and per-provider order (`[auth]`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthConfig>,

    /// Model provider connection settings (`[models]`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub models: Option<ModelsConfig>,

    /// Gateway network exposure (`[gateway]`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<GatewayConfig>,

    /// Secret encryption settings (`[secrets]`).
    #[serde(default)]
    pub secrets: SecretsConfig,

    /// Sections owned by other subsystems (hooks, skills, channels, ...).
    #[serde(flatten)]
    #[schemars(skip)]
    pub extra: toml::Table,
}

// ── Meta ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MetaConfig {
    /// RFC3339 timestamp of the last completed onboarding run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_onboarded_at: Option<String>,
    /// Crate version that performed the last onboarding run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_onboarded_version: Option<String>,
}

// ── Agents ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AgentsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defaults: Option<AgentDefaultsConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AgentDefaultsConfig {
    /// Agent workspace directory (absolute).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,
    /// Primary model selection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<AgentModelConfig>,
    /// Known model refs (`provider/model`) with optional aliases.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub models: Option<BTreeMap<String, AgentModelEntry>>,
    #[serde(flatten)]
    #[schemars(skip)]
    pub extra: toml::Table,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AgentModelConfig {
    /// Model ref used by default (e.g. `"openai/gpt-5.1-codex"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallbacks: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AgentModelEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

// ── Auth profile references ──────────────────────────────────────

/// References to credentials held in the auth profile store. Secrets never
/// live here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AuthConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profiles: Option<BTreeMap<String, AuthProfileRef>>,
    /// Per-provider profile preference order. Only maintained once present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<BTreeMap<String, Vec<String>>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AuthProfileRef {
    pub provider: String,
    pub mode: AuthProfileMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuthProfileMode {
    ApiKey,
    Token,
    /// Written by interactive sign-in flows; read back so their profiles survive a rewrite.
    Oauth,
}

// ── Model providers ──────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ModelsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub providers: Option<BTreeMap<String, ModelProviderConfig>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ModelProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api: Option<ModelApi>,
    #[serde(default)]
    pub models: Vec<ModelDefinition>,
}

/// Wire protocol spoken by a provider endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum ModelApi {
    OpenaiCompletions,
    AnthropicMessages,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ModelDefinition {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

// ── Gateway exposure ─────────────────────────────────────────────

/// Gateway server configuration (`[gateway]` section).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GatewayConfig {
    /// Listen port (default: 18789)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Interface selection (default: loopback)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind: Option<GatewayBindMode>,
    /// Address used when `bind = "custom"`. Operator-managed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_bind_host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<GatewayAuthConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tailscale: Option<GatewayTailscaleConfig>,
    /// Node command policy. An explicitly empty list is a policy too.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodes: Option<GatewayNodesConfig>,
    #[serde(flatten)]
    #[schemars(skip)]
    pub extra: toml::Table,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct GatewayAuthConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<GatewayAuthMode>,
    /// Bearer token (stored encrypted when secrets.encrypt = true)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Shared password (stored encrypted when secrets.encrypt = true)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct GatewayTailscaleConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<TailscaleMode>,
    /// Tear down serve/funnel state when the gateway exits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_on_exit: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct GatewayNodesConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser: Option<NodeBrowserConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_commands: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deny_commands: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct NodeBrowserConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<NodeBrowserMode>,
    /// Node id that hosts the browser when mode is manual.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum NodeBrowserMode {
    Auto,
    Manual,
    Off,
}

/// Which interface(s) the gateway listens on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum GatewayBindMode {
    Loopback,
    Lan,
    Auto,
    Custom,
    Tailnet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum GatewayAuthMode {
    Token,
    Password,
}

/// How the gateway is published through the tailnet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum TailscaleMode {
    Off,
    Serve,
    Funnel,
}

macro_rules! closed_str_enum {
    ($ty:ident, $kind:literal, { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            pub const VARIANTS: &'static [&'static str] = &[$($name),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $name),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = anyhow::Error;

            fn from_str(s: &str) -> Result<Self> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($name => Ok(Self::$variant),)+
                    other => bail!(
                        "Unknown {}: '{}'. Supported: {}",
                        $kind,
                        other,
                        Self::VARIANTS.join(", ")
                    ),
                }
            }
        }
    };
}

closed_str_enum!(GatewayBindMode, "gateway bind mode", {
    Loopback => "loopback",
    Lan => "lan",
    Auto => "auto",
    Custom => "custom",
    Tailnet => "tailnet",
});

closed_str_enum!(GatewayAuthMode, "gateway auth mode", {
    Token => "token",
    Password => "password",
});

closed_str_enum!(TailscaleMode, "tailscale mode", {
    Off => "off",
    Serve => "serve",
    Funnel => "funnel",
});

// ── Secrets (encrypted credential store) ────────────────────────

/// Secrets encryption configuration (`[secrets]` section).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SecretsConfig {
    /// Encrypt gateway secrets in config.toml and auth-profiles.json
    #[serde(default = "default_true")]
    pub encrypt: bool,
}

fn default_true() -> bool {
    true
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self { encrypt: true }
    }
}

// ── Config impl ──────────────────────────────────────────────────

impl Config {
    /// Empty configuration bound to the given locations.
    pub fn empty_at(paths: &StatePaths) -> Self {
        Self {
            config_path: paths.config_path.clone(),
            state_dir: paths.state_dir.clone(),
            ..Self::default()
        }
    }

    /// Load `config.toml`, or an empty configuration when none exists yet.
    /// Nothing is written here; onboarding saves once at the end of a run.
    pub async fn load(paths: &StatePaths) -> Result<Self> {
        let config_path = &paths.config_path;
        if !config_path.exists() {
            tracing::debug!(path = %config_path.display(), "No config file yet, starting empty");
            return Ok(Self::empty_at(paths));
        }

        // Warn if config file is world-readable (may contain gateway secrets)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Ok(meta) = fs::metadata(config_path).await {
                if meta.permissions().mode() & 0o004 != 0 {
                    tracing::warn!(
                        "Config file {:?} is world-readable (mode {:o}). \
                         Consider restricting with: chmod 600 {:?}",
                        config_path,
                        meta.permissions().mode() & 0o777,
                        config_path,
                    );
                }
            }
        }

        let contents = fs::read_to_string(config_path)
            .await
            .with_context(|| format!("Failed to read config file {}", config_path.display()))?;
        let mut config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", config_path.display()))?;
        config.config_path = config_path.clone();
        config.state_dir = paths.state_dir.clone();

        let store = SecretStore::new(&paths.state_dir, config.secrets.encrypt);
        if let Some(auth) = config.gateway.as_mut().and_then(|g| g.auth.as_mut()) {
            decrypt_optional_secret(&store, &mut auth.token, "config.gateway.auth.token")?;
            decrypt_optional_secret(&store, &mut auth.password, "config.gateway.auth.password")?;
        }

        tracing::info!(path = %config.config_path.display(), "Config loaded");
        Ok(config)
    }

    /// Atomically replace `config.toml` with this configuration.
    pub async fn save(&self) -> Result<()> {
        let mut config_to_save = self.clone();
        let store = SecretStore::new(&self.state_dir, self.secrets.encrypt);
        if let Some(auth) = config_to_save
            .gateway
            .as_mut()
            .and_then(|g| g.auth.as_mut())
        {
            encrypt_optional_secret(&store, &mut auth.token, "config.gateway.auth.token")?;
            encrypt_optional_secret(&store, &mut auth.password, "config.gateway.auth.password")?;
        }

        let toml_str =
            toml::to_string_pretty(&config_to_save).context("Failed to serialize config")?;

        let parent_dir = self
            .config_path
            .parent()
            .context("Config path must have a parent directory")?;

        fs::create_dir_all(parent_dir).await.with_context(|| {
            format!(
                "Failed to create config directory: {}",
                parent_dir.display()
            )
        })?;

        let file_name = self
            .config_path
            .file_name()
            .and_then(|v| v.to_str())
            .unwrap_or("config.toml");
        let temp_path = parent_dir.join(format!(".{file_name}.tmp-{}", uuid::Uuid::new_v4()));
        let backup_path = parent_dir.join(format!("{file_name}.bak"));

        let mut temp_file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&temp_path)
            .await
            .with_context(|| {
                format!(
                    "Failed to create temporary config file: {}",
                    temp_path.display()
                )
            })?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            temp_file
                .set_permissions(std::fs::Permissions::from_mode(0o600))
                .await
                .context("Failed to restrict temporary config file permissions")?;
        }
        temp_file
            .write_all(toml_str.as_bytes())
            .await
            .context("Failed to write temporary config contents")?;
        temp_file
            .sync_all()
            .await
            .context("Failed to fsync temporary config file")?;
        drop(temp_file);

        let had_existing_config = self.config_path.exists();
        if had_existing_config {
            fs::copy(&self.config_path, &backup_path)
                .await
                .with_context(|| {
                    format!(
                        "Failed to create config backup before atomic replace: {}",
                        backup_path.display()
                    )
                })?;
        }

        if let Err(e) = fs::rename(&temp_path, &self.config_path).await {
            let _ = fs::remove_file(&temp_path).await;
            if had_existing_config && backup_path.exists() {
                fs::copy(&backup_path, &self.config_path)
                    .await
                    .context("Failed to restore config backup")?;
            }
            bail!("Failed to atomically replace config file: {e}");
        }

        sync_directory(parent_dir).await?;

        if had_existing_config {
            let _ = fs::remove_file(&backup_path).await;
        }

        tracing::info!(path = %self.config_path.display(), "Config saved");
        Ok(())
    }

    pub fn agent_defaults(&self) -> Option<&AgentDefaultsConfig> {
        self.agents.as_ref().and_then(|a| a.defaults.as_ref())
    }

    /// Mutable access to `agents.defaults`, creating empty nodes on the way.
    pub fn agent_defaults_mut(&mut self) -> &mut AgentDefaultsConfig {
        self.agents
            .get_or_insert_with(AgentsConfig::default)
            .defaults
            .get_or_insert_with(AgentDefaultsConfig::default)
    }

    pub fn primary_model(&self) -> Option<&str> {
        self.agent_defaults()
            .and_then(|d| d.model.as_ref())
            .and_then(|m| m.primary.as_deref())
    }
}

fn decrypt_optional_secret(
    store: &SecretStore,
    value: &mut Option<String>,
    field_name: &str,
) -> Result<()> {
    if let Some(raw) = value.as_deref() {
        if SecretStore::is_encrypted(raw) {
            *value = Some(
                store
                    .decrypt(raw)
                    .with_context(|| format!("Failed to decrypt {field_name}"))?,
            );
        }
    }
    Ok(())
}

fn encrypt_optional_secret(
    store: &SecretStore,
    value: &mut Option<String>,
    field_name: &str,
) -> Result<()> {
    if let Some(raw) = value.clone() {
        if !SecretStore::is_encrypted(&raw) {
            *value = Some(
                store
                    .encrypt(&raw)
                    .with_context(|| format!("Failed to encrypt {field_name}"))?,
            );
        }
    }
    Ok(())
}

async fn sync_directory(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        let dir = File::open(path)
            .await
            .with_context(|| format!("Failed to open directory for fsync: {}", path.display()))?;
        dir.sync_all()
            .await
            .with_context(|| format!("Failed to fsync directory metadata: {}", path.display()))?;
        return Ok(());
    }

    #[cfg(not(unix))]
    {
        let _ = path;
        Ok(())
    }
}
