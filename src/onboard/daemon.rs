use crate::config::paths::STATE_DIR_ENV;
use crate::onboard::error::OnboardError;
use crate::onboard::output::DaemonSummary;
use crate::service::{GatewayInstallPlan, ServiceInstaller, ServiceManager};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const GATEWAY_BIN_ENV: &str = "OPENCLAW_GATEWAY_BIN";
pub const GATEWAY_PORT_ENV: &str = "OPENCLAW_GATEWAY_PORT";
pub const GATEWAY_TOKEN_ENV: &str = "OPENCLAW_GATEWAY_TOKEN";
const GATEWAY_BIN_NAME: &str = "openclaw-gateway";

/// Parse `--daemon-runtime`; absent means `auto`.
pub fn parse_service_manager(raw: Option<&str>) -> Result<ServiceManager, OnboardError> {
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(ServiceManager::Auto),
        Some(value) => value
            .parse()
            .map_err(|_| OnboardError::InvalidEnumValue {
                flag: "--daemon-runtime",
                value: value.to_string(),
                allowed: ServiceManager::VARIANTS,
            }),
    }
}

/// The gateway binary: an explicit override, else `openclaw-gateway` on `PATH`.
pub fn resolve_gateway_program(override_path: Option<&Path>) -> Result<PathBuf, OnboardError> {
    if let Some(path) = override_path.filter(|p| !p.as_os_str().is_empty()) {
        return Ok(path.to_path_buf());
    }
    which::which(GATEWAY_BIN_NAME).map_err(|_| {
        OnboardError::InstallFailure(format!(
            "{GATEWAY_BIN_NAME} not found on PATH; set {GATEWAY_BIN_ENV}"
        ))
    })
}

pub fn build_install_plan(
    program: PathBuf,
    port: u16,
    token: Option<&str>,
    state_dir: &Path,
) -> GatewayInstallPlan {
    let mut environment = BTreeMap::new();
    environment.insert(GATEWAY_PORT_ENV.to_string(), port.to_string());
    if let Some(token) = token {
        environment.insert(GATEWAY_TOKEN_ENV.to_string(), token.to_string());
    }
    environment.insert(STATE_DIR_ENV.to_string(), state_dir.display().to_string());

    GatewayInstallPlan {
        program,
        args: vec!["--port".to_string(), port.to_string()],
        working_directory: state_dir.to_path_buf(),
        environment,
    }
}

/// Hand the plan to the installer. Failures are terminal and not retried.
pub async fn install_gateway_daemon(
    installer: &dyn ServiceInstaller,
    manager: ServiceManager,
    plan: &GatewayInstallPlan,
) -> Result<DaemonSummary, OnboardError> {
    let resolved = manager.resolve();
    installer
        .install(resolved, plan)
        .await
        .map_err(|e| OnboardError::InstallFailure(format!("{e:#}")))?;

    tracing::info!(runtime = resolved.as_str(), "Gateway daemon installed");
    Ok(DaemonSummary {
        installed: true,
        runtime: resolved.as_str().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FailingInstaller;

    #[async_trait]
    impl ServiceInstaller for FailingInstaller {
        async fn install(
            &self,
            _manager: ServiceManager,
            _plan: &GatewayInstallPlan,
        ) -> anyhow::Result<()> {
            anyhow::bail!("Command failed: systemctl exited 1")
        }
    }

    struct OkInstaller;

    #[async_trait]
    impl ServiceInstaller for OkInstaller {
        async fn install(
            &self,
            manager: ServiceManager,
            _plan: &GatewayInstallPlan,
        ) -> anyhow::Result<()> {
            assert_ne!(manager, ServiceManager::Auto);
            Ok(())
        }
    }

    #[test]
    fn runtime_flag_parsing() {
        assert_eq!(parse_service_manager(None).unwrap(), ServiceManager::Auto);
        assert_eq!(
            parse_service_manager(Some("launchd")).unwrap(),
            ServiceManager::Launchd
        );
        assert_eq!(
            parse_service_manager(Some("node")).unwrap_err().to_string(),
            "Invalid --daemon-runtime \"node\" (use: auto, systemd, launchd)"
        );
    }

    #[test]
    fn plan_includes_token_only_when_given() {
        let state = Path::new("/home/op/.openclaw");
        let with_token = build_install_plan("/bin/gw".into(), 18789, Some("tok"), state);
        assert_eq!(with_token.args, vec!["--port", "18789"]);
        assert_eq!(with_token.environment[GATEWAY_TOKEN_ENV], "tok");
        assert_eq!(with_token.environment[GATEWAY_PORT_ENV], "18789");
        assert_eq!(with_token.environment[STATE_DIR_ENV], "/home/op/.openclaw");
        assert_eq!(with_token.working_directory, state);

        let without = build_install_plan("/bin/gw".into(), 18789, None, state);
        assert!(!without.environment.contains_key(GATEWAY_TOKEN_ENV));
    }

    #[test]
    fn explicit_program_override_wins() {
        assert_eq!(
            resolve_gateway_program(Some(Path::new("/opt/gw"))).unwrap(),
            PathBuf::from("/opt/gw")
        );
    }

    #[tokio::test]
    async fn installer_failure_maps_to_install_failure() {
        let plan = build_install_plan("/bin/gw".into(), 1, None, Path::new("/tmp"));
        let err = install_gateway_daemon(&FailingInstaller, ServiceManager::Systemd, &plan)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            OnboardError::InstallFailure("Command failed: systemctl exited 1".into())
        );
    }

    #[tokio::test]
    async fn successful_install_reports_resolved_runtime() {
        let plan = build_install_plan("/bin/gw".into(), 1, None, Path::new("/tmp"));
        let summary = install_gateway_daemon(&OkInstaller, ServiceManager::Auto, &plan)
            .await
            .unwrap();
        assert!(summary.installed);
        assert!(summary.runtime == "systemd" || summary.runtime == "launchd");
    }
}
