#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::assigning_clones,
    clippy::bool_to_int_with_if,
    clippy::case_sensitive_file_extension_comparisons,
    clippy::cast_possible_wrap,
    clippy::doc_markdown,
    clippy::field_reassign_with_default,
    clippy::float_cmp,
    clippy::implicit_clone,
    clippy::items_after_statements,
    clippy::map_unwrap_or,
    clippy::manual_let_else,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::needless_pass_by_value,
    clippy::needless_raw_string_hashes,
    clippy::redundant_closure_for_method_calls,
    clippy::similar_names,
    clippy::single_match_else,
    clippy::struct_field_names,
    clippy::too_many_lines,
    clippy::uninlined_format_args,
    clippy::unused_self,
    clippy::cast_precision_loss,
    clippy::unnecessary_cast,
    clippy::unnecessary_lazy_evaluations,
    clippy::unnecessary_literal_bound,
    clippy::unnecessary_map_or,
    clippy::unnecessary_wraps,
    dead_code
)]

use anyhow::{bail, Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use console::style;
use openclaw::auth::{status_lines, AuthProfilesStore};
use openclaw::config::paths::resolve_against;
use openclaw::config::{Config, StatePaths};
use openclaw::env_file::{ProcessEnv, SharedEnvFile};
use openclaw::onboard::daemon::GATEWAY_BIN_ENV;
use openclaw::onboard::{run_non_interactive, OnboardContext, OnboardOptions};
use openclaw::service::SystemServiceInstaller;
use std::io::Write;
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CompletionShell {
    #[value(name = "bash")]
    Bash,
    #[value(name = "fish")]
    Fish,
    #[value(name = "zsh")]
    Zsh,
    #[value(name = "powershell")]
    PowerShell,
    #[value(name = "elvish")]
    Elvish,
}

/// `OpenClaw` - local agent gateway setup.
#[derive(Parser, Debug)]
#[command(name = "openclaw")]
#[command(version)]
#[command(about = "Configure credentials and the local gateway for OpenClaw agents.", long_about = None)]
struct Cli {
    /// State directory (default: ~/.openclaw, or $OPENCLAW_STATE_DIR)
    #[arg(long, global = true)]
    config_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Configure a provider credential, the workspace and the gateway
    Onboard {
        #[command(flatten)]
        options: OnboardOptions,
    },

    /// Inspect stored provider credentials
    Auth {
        #[command(subcommand)]
        auth_command: AuthCommands,
    },

    /// Inspect the configuration format
    Config {
        #[command(subcommand)]
        config_command: ConfigCommands,
    },

    /// Generate shell completion script to stdout
    #[command(long_about = "\
Generate shell completion scripts for `openclaw`.

The script is printed to stdout so it can be sourced directly:

Examples:
  source <(openclaw completions bash)
  openclaw completions zsh > ~/.zfunc/_openclaw
  openclaw completions fish > ~/.config/fish/completions/openclaw.fish")]
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

#[derive(Subcommand, Debug)]
enum AuthCommands {
    /// List auth profiles and the active one per provider
    Status,
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Dump the full configuration JSON Schema to stdout
    Schema,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Completions must remain stdout-only and should not load config or initialize logging.
    if let Commands::Completions { shell } = &cli.command {
        let mut stdout = std::io::stdout().lock();
        write_shell_completion(*shell, &mut stdout)?;
        return Ok(());
    }

    // Logs go to stderr so `onboard --json` output stays parseable. RUST_LOG overrides.
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let cwd = std::env::current_dir().context("Failed to resolve current directory")?;
    let paths = resolve_paths(cli.config_dir.as_deref(), &cwd)?;

    match cli.command {
        Commands::Completions { .. } => unreachable!(),

        Commands::Onboard { options } => handle_onboard(&options, paths, cwd).await,

        Commands::Auth { auth_command } => match auth_command {
            AuthCommands::Status => {
                let config = Config::load(&paths).await?;
                let store = AuthProfilesStore::new(&paths.state_dir, config.secrets.encrypt);
                let data = store.load().await?;
                println!("Auth profiles ({}):", store.path().display());
                for line in status_lines(&data) {
                    println!("  {line}");
                }
                Ok(())
            }
        },

        Commands::Config { config_command } => match config_command {
            ConfigCommands::Schema => {
                let schema = schemars::schema_for!(Config);
                println!("{}", serde_json::to_string_pretty(&schema)?);
                Ok(())
            }
        },
    }
}

fn resolve_paths(config_dir: Option<&str>, cwd: &std::path::Path) -> Result<StatePaths> {
    if config_dir.is_some_and(|dir| dir.trim().is_empty()) {
        bail!("--config-dir cannot be empty");
    }
    let resolved = StatePaths::resolve()?;
    Ok(match config_dir {
        Some(dir) => StatePaths::with_state_dir(
            resolved.home_dir,
            resolve_against(std::path::Path::new(dir.trim()), cwd),
        ),
        None => resolved,
    })
}

async fn handle_onboard(options: &OnboardOptions, paths: StatePaths, cwd: PathBuf) -> Result<()> {
    if !options.non_interactive {
        bail!("Interactive onboarding is not available in this build; re-run with --non-interactive");
    }

    let encrypt = Config::load(&paths).await?.secrets.encrypt;
    let credentials = AuthProfilesStore::new(&paths.state_dir, encrypt);
    let shared_env = SharedEnvFile::new(&paths.state_dir);
    let installer = SystemServiceInstaller::new(paths.home_dir.clone());
    let gateway_program = std::env::var_os(GATEWAY_BIN_ENV).map(PathBuf::from);

    let ctx = OnboardContext {
        paths,
        cwd,
        credentials: &credentials,
        shared_env: &shared_env,
        live_env: &ProcessEnv,
        installer: &installer,
        gateway_program,
    };
    let outcome = run_non_interactive(options, &ctx).await?;

    if options.json {
        println!("{}", outcome.summary.render_json()?);
        return Ok(());
    }

    for line in outcome.summary.render_text() {
        println!("  {} {}", style("✓").green().bold(), line);
    }
    for note in &outcome.notes {
        println!("  {}", style(note).dim());
    }
    Ok(())
}

fn write_shell_completion<W: Write>(shell: CompletionShell, writer: &mut W) -> Result<()> {
    use clap_complete::generate;
    use clap_complete::shells;

    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();

    match shell {
        CompletionShell::Bash => generate(shells::Bash, &mut cmd, bin_name.clone(), writer),
        CompletionShell::Fish => generate(shells::Fish, &mut cmd, bin_name.clone(), writer),
        CompletionShell::Zsh => generate(shells::Zsh, &mut cmd, bin_name.clone(), writer),
        CompletionShell::PowerShell => {
            generate(shells::PowerShell, &mut cmd, bin_name.clone(), writer);
        }
        CompletionShell::Elvish => generate(shells::Elvish, &mut cmd, bin_name, writer),
    }

    writer.flush()?;
    Ok(())
}
