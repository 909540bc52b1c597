use crate::config::schema::{GatewayAuthMode, GatewayBindMode, TailscaleMode};
use serde::Serialize;
use std::fmt;

/// Machine-readable result of a completed run. The text view renders the
/// same fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardSummary {
    pub mode: &'static str,
    pub workspace: String,
    /// Omitted when the run skipped auth.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_choice: Option<String>,
    pub gateway: GatewaySummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daemon: Option<DaemonSummary>,
    pub skills: StepStatus,
    pub health: StepStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewaySummary {
    pub port: u16,
    pub bind: GatewayBindMode,
    pub auth: GatewayAuthMode,
    /// Omitted when tailnet publication is off.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tailscale: Option<TailscaleMode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DaemonSummary {
    pub installed: bool,
    pub runtime: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Enabled,
    Checked,
    Skipped,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Enabled => "enabled",
            Self::Checked => "checked",
            Self::Skipped => "skipped",
        })
    }
}

pub const LOCAL_MODE: &str = "local";

impl OnboardSummary {
    pub fn render_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// One `Label: value` line per field, in JSON field order.
    pub fn render_text(&self) -> Vec<String> {
        let mut lines = vec![
            format!("Mode: {}", self.mode),
            format!("Workspace: {}", self.workspace),
        ];
        if let Some(choice) = &self.auth_choice {
            lines.push(format!("Auth: {choice}"));
        }
        lines.push(format!(
            "Gateway: {}:{} (auth={})",
            self.gateway.bind, self.gateway.port, self.gateway.auth
        ));
        if let Some(tailscale) = self.gateway.tailscale {
            lines.push(format!("Tailscale: {tailscale}"));
        }
        if let Some(daemon) = self.daemon.as_ref().filter(|d| d.installed) {
            lines.push(format!("Daemon: installed ({})", daemon.runtime));
        }
        lines.push(format!("Skills: {}", self.skills));
        lines.push(format!("Health: {}", self.health));
        lines
    }
}
