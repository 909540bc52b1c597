use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::str::FromStr;

const SERVICE_LABEL: &str = "ai.openclaw.gateway";
const SYSTEMD_UNIT_NAME: &str = "openclaw-gateway.service";

/// Service managers the gateway can be installed under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServiceManager {
    /// launchd on macOS, systemd elsewhere
    #[default]
    Auto,
    /// systemd (via systemctl --user)
    Systemd,
    /// launchd user agent
    Launchd,
}

impl ServiceManager {
    pub const VARIANTS: &'static [&'static str] = &["auto", "systemd", "launchd"];

    /// Resolve auto-detection to a concrete service manager
    pub fn resolve(self) -> Self {
        match self {
            Self::Auto if cfg!(target_os = "macos") => Self::Launchd,
            Self::Auto => Self::Systemd,
            concrete => concrete,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Systemd => "systemd",
            Self::Launchd => "launchd",
        }
    }
}

impl FromStr for ServiceManager {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "systemd" => Ok(Self::Systemd),
            "launchd" => Ok(Self::Launchd),
            other => bail!(
                "Unknown service manager: '{}'. Supported: auto, systemd, launchd",
                other
            ),
        }
    }
}

/// Everything a service manager needs to run the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayInstallPlan {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub working_directory: PathBuf,
    pub environment: BTreeMap<String, String>,
}

/// Installs the gateway as a long-running user service.
#[async_trait]
pub trait ServiceInstaller: Send + Sync {
    async fn install(&self, manager: ServiceManager, plan: &GatewayInstallPlan) -> Result<()>;
}

/// Writes real unit/plist files under the operator's home directory.
#[derive(Debug, Clone)]
pub struct SystemServiceInstaller {
    home_dir: PathBuf,
}

impl SystemServiceInstaller {
    pub fn new(home_dir: PathBuf) -> Self {
        Self { home_dir }
    }
}

#[async_trait]
impl ServiceInstaller for SystemServiceInstaller {
    async fn install(&self, manager: ServiceManager, plan: &GatewayInstallPlan) -> Result<()> {
        let home_dir = self.home_dir.clone();
        let plan = plan.clone();
        tokio::task::spawn_blocking(move || match manager.resolve() {
            ServiceManager::Launchd => install_launchd(&home_dir, &plan),
            _ => install_systemd(&home_dir, &plan),
        })
        .await
        .context("Service install task panicked")?
    }
}

fn install_launchd(home_dir: &Path, plan: &GatewayInstallPlan) -> Result<()> {
    let file = launchd_service_file(home_dir);
    if let Some(parent) = file.parent() {
        fs::create_dir_all(parent)?;
    }
    let logs_dir = plan.working_directory.join("logs");
    fs::create_dir_all(&logs_dir)
        .with_context(|| format!("Failed to create {}", logs_dir.display()))?;

    fs::write(&file, render_launchd_plist(plan))
        .with_context(|| format!("Failed to write {}", file.display()))?;
    tracing::info!(path = %file.display(), "Installed launchd agent");
    Ok(())
}

fn install_systemd(home_dir: &Path, plan: &GatewayInstallPlan) -> Result<()> {
    let file = systemd_service_file(home_dir);
    if let Some(parent) = file.parent() {
        fs::create_dir_all(parent)?;
    }

    fs::write(&file, render_systemd_unit(plan))
        .with_context(|| format!("Failed to write {}", file.display()))?;
    run_checked(Command::new("systemctl").args(["--user", "daemon-reload"]))?;
    run_checked(Command::new("systemctl").args(["--user", "enable", SYSTEMD_UNIT_NAME]))?;
    tracing::info!(path = %file.display(), "Installed systemd user service");
    Ok(())
}

pub fn render_launchd_plist(plan: &GatewayInstallPlan) -> String {
    let mut arguments = format!(
        "    <string>{}</string>\n",
        xml_escape(&plan.program.display().to_string())
    );
    for arg in &plan.args {
        arguments.push_str(&format!("    <string>{}</string>\n", xml_escape(arg)));
    }

    let mut environment = String::new();
    for (key, value) in &plan.environment {
        environment.push_str(&format!(
            "    <key>{}</key>\n    <string>{}</string>\n",
            xml_escape(key),
            xml_escape(value)
        ));
    }

    let logs_dir = plan.working_directory.join("logs");
    let stdout = logs_dir.join("gateway.stdout.log");
    let stderr = logs_dir.join("gateway.stderr.log");

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
  <key>Label</key>
  <string>{label}</string>
  <key>ProgramArguments</key>
  <array>
{arguments}  </array>
  <key>WorkingDirectory</key>
  <string>{workdir}</string>
  <key>EnvironmentVariables</key>
  <dict>
{environment}  </dict>
  <key>RunAtLoad</key>
  <true/>
  <key>KeepAlive</key>
  <true/>
  <key>StandardOutPath</key>
  <string>{stdout}</string>
  <key>StandardErrorPath</key>
  <string>{stderr}</string>
</dict>
</plist>
"#,
        label = SERVICE_LABEL,
        workdir = xml_escape(&plan.working_directory.display().to_string()),
        stdout = xml_escape(&stdout.display().to_string()),
        stderr = xml_escape(&stderr.display().to_string())
    )
}

pub fn render_systemd_unit(plan: &GatewayInstallPlan) -> String {
    let mut exec = systemd_quote(&plan.program.display().to_string());
    for arg in &plan.args {
        exec.push(' ');
        exec.push_str(&systemd_quote(arg));
    }

    let mut environment = String::new();
    for (key, value) in &plan.environment {
        environment.push_str(&format!(
            "Environment={}\n",
            systemd_quote(&format!("{key}={value}"))
        ));
    }

    format!(
        "[Unit]\nDescription=OpenClaw gateway\nAfter=network.target\n\n[Service]\nType=simple\nWorkingDirectory={}\n{environment}ExecStart={exec}\nRestart=always\nRestartSec=3\n\n[Install]\nWantedBy=default.target\n",
        plan.working_directory.display()
    )
}

/// Command that starts the freshly installed service.
pub fn start_hint(manager: ServiceManager, home_dir: &Path) -> String {
    match manager.resolve() {
        ServiceManager::Launchd => format!(
            "launchctl load -w {}",
            launchd_service_file(home_dir).display()
        ),
        _ => format!("systemctl --user start {SYSTEMD_UNIT_NAME}"),
    }
}

pub fn launchd_service_file(home_dir: &Path) -> PathBuf {
    home_dir
        .join("Library")
        .join("LaunchAgents")
        .join(format!("{SERVICE_LABEL}.plist"))
}

pub fn systemd_service_file(home_dir: &Path) -> PathBuf {
    home_dir
        .join(".config")
        .join("systemd")
        .join("user")
        .join(SYSTEMD_UNIT_NAME)
}

fn run_checked(command: &mut Command) -> Result<()> {
    let output = command.output().context("Failed to spawn command")?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("Command failed: {}", stderr.trim());
    }
    Ok(())
}

fn xml_escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Quote a word for a unit file when it carries whitespace or quotes.
fn systemd_quote(raw: &str) -> String {
    if raw
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '"' | '\\' | '\''))
    {
        format!("\"{}\"", raw.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        raw.to_string()
    }
}
