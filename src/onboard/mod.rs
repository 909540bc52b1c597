//! Non-interactive onboarding.
//!
//! A run resolves every flag into a single configuration update plus a set
//! of side effects, validates all of it, and only then touches disk: the
//! credential store, the shared env file, `config.toml` (written once) and,
//! on request, the gateway service.

pub mod auth_choice;
pub mod auth_dispatch;
pub mod daemon;
pub mod error;
pub mod gateway;
pub mod options;
pub mod output;
pub mod workspace;

pub use auth_choice::{infer_auth_choice, resolve_auth_choice, AuthChoice, AuthChoiceInference};
pub use auth_dispatch::{apply_auth_choice, AuthPlan, EnvAssignment};
pub use error::OnboardError;
pub use gateway::{resolve_gateway_exposure, GatewayResolution};
pub use options::{CredentialFlag, OnboardOptions};
pub use output::{OnboardSummary, StepStatus};
pub use workspace::resolve_workspace_dir;

use crate::auth::CredentialStore;
use crate::config::{Config, MetaConfig, StatePaths};
use crate::env_file::EnvStore;
use crate::service::{start_hint, ServiceInstaller};
use anyhow::{Context, Result};
use chrono::Utc;
use output::{GatewaySummary, LOCAL_MODE};
use std::path::PathBuf;

/// Where a run reads and writes, and the collaborators it hands effects to.
pub struct OnboardContext<'a> {
    pub paths: StatePaths,
    /// Base for a relative `--workspace`.
    pub cwd: PathBuf,
    pub credentials: &'a dyn CredentialStore,
    /// Persistent env file shared with provider clients.
    pub shared_env: &'a dyn EnvStore,
    /// Environment of the running process.
    pub live_env: &'a dyn EnvStore,
    pub installer: &'a dyn ServiceInstaller,
    /// Gateway binary for `--install-daemon`; looked up on `PATH` when unset.
    pub gateway_program: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct OnboardOutcome {
    pub summary: OnboardSummary,
    /// The configuration as saved.
    pub config: Config,
    /// Follow-up hints for human readers; omitted from JSON output.
    pub notes: Vec<String>,
}

/// Run onboarding end to end. Any validation failure returns before the
/// first side effect.
pub async fn run_non_interactive(
    opts: &OnboardOptions,
    ctx: &OnboardContext<'_>,
) -> Result<OnboardOutcome> {
    let base = Config::load(&ctx.paths).await?;

    let workspace_dir = resolve_workspace_dir(
        opts.workspace.as_deref(),
        &base,
        &ctx.cwd,
        &ctx.paths.default_workspace_dir(),
    );
    let config = workspace::apply_workspace(&base, &workspace_dir);

    let choice = resolve_auth_choice(opts)?;
    let plan = apply_auth_choice(&config, choice, opts)?;
    let exposure = resolve_gateway_exposure(&plan.config, opts)?;

    let daemon_request = if opts.install_daemon {
        let manager = daemon::parse_service_manager(opts.daemon_runtime.as_deref())?;
        let program = daemon::resolve_gateway_program(ctx.gateway_program.as_deref())?;
        Some((manager, program))
    } else {
        None
    };

    apply_credential_plan(&plan, ctx).await?;

    // Skills are configured elsewhere; the flag only changes what is reported.
    let skills = if opts.skip_skills {
        StepStatus::Skipped
    } else {
        StepStatus::Enabled
    };

    let mut config = exposure.config.clone();
    let meta = config.meta.get_or_insert_with(MetaConfig::default);
    meta.last_onboarded_at = Some(Utc::now().to_rfc3339());
    meta.last_onboarded_version = Some(env!("CARGO_PKG_VERSION").to_string());
    config.save().await?;

    tokio::fs::create_dir_all(&workspace_dir)
        .await
        .with_context(|| format!("Failed to create workspace {}", workspace_dir.display()))?;

    let mut notes = Vec::new();
    let daemon = match daemon_request {
        Some((manager, program)) => {
            let install_plan = daemon::build_install_plan(
                program,
                exposure.port,
                exposure.token.as_deref(),
                &ctx.paths.state_dir,
            );
            let summary =
                daemon::install_gateway_daemon(ctx.installer, manager, &install_plan).await?;
            let hint = start_hint(manager, &ctx.paths.home_dir);
            tracing::info!(hint = %hint, "Gateway service installed");
            notes.push(format!("Start the gateway with: {hint}"));
            Some(summary)
        }
        None => None,
    };

    let health = if opts.skip_health {
        StepStatus::Skipped
    } else {
        StepStatus::Checked
    };

    let summary = OnboardSummary {
        mode: LOCAL_MODE,
        workspace: workspace_dir.display().to_string(),
        auth_choice: (choice != AuthChoice::Skip).then(|| choice.to_string()),
        gateway: GatewaySummary {
            port: exposure.port,
            bind: exposure.bind,
            auth: exposure.auth_mode,
            tailscale: (exposure.tailscale_mode != crate::config::TailscaleMode::Off)
                .then_some(exposure.tailscale_mode),
        },
        daemon,
        skills,
        health,
    };

    tracing::info!(
        auth_choice = %choice,
        port = exposure.port,
        bind = %exposure.bind,
        "Onboarding complete"
    );
    Ok(OnboardOutcome {
        summary,
        config,
        notes,
    })
}

/// Perform a plan's credential effects in order: profile upserts, the shared
/// env file, then the live process environment.
pub async fn apply_credential_plan(plan: &AuthPlan, ctx: &OnboardContext<'_>) -> Result<()> {
    if !plan.has_effects() {
        tracing::debug!("No credential changes to apply");
        return Ok(());
    }
    for profile in &plan.profiles {
        let id = profile.id.clone();
        ctx.credentials
            .upsert(profile.clone())
            .await
            .with_context(|| format!("Failed to store auth profile {id}"))?;
    }
    for assignment in &plan.env {
        ctx.shared_env
            .upsert(&assignment.key, &assignment.value)
            .await
            .with_context(|| format!("Failed to persist {}", assignment.key))?;
    }
    for assignment in &plan.env {
        ctx.live_env.upsert(&assignment.key, &assignment.value).await?;
    }
    Ok(())
}
