use anyhow::{Context, Result};
use directories::UserDirs;
use std::path::{Component, Path, PathBuf};

pub const STATE_DIR_ENV: &str = "OPENCLAW_STATE_DIR";
pub const PROFILE_ENV: &str = "OPENCLAW_PROFILE";
pub const CONFIG_PATH_ENV: &str = "OPENCLAW_CONFIG_PATH";

const STATE_DIR_NAME: &str = ".openclaw";
const CONFIG_FILENAME: &str = "config.toml";
const WORKSPACE_DIR_NAME: &str = "workspace";

/// Filesystem locations for one OpenClaw installation.
///
/// Resolution order for the state directory:
/// `OPENCLAW_STATE_DIR` → `~/.openclaw-<OPENCLAW_PROFILE>` → `~/.openclaw`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatePaths {
    pub home_dir: PathBuf,
    pub state_dir: PathBuf,
    pub config_path: PathBuf,
}

impl StatePaths {
    /// Resolve from the live process environment.
    pub fn resolve() -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to resolve current directory")?;
        Self::resolve_with(|key| std::env::var(key).ok(), &cwd)
    }

    /// Resolve from an arbitrary environment lookup. Relative overrides are
    /// anchored at `cwd`.
    pub fn resolve_with<F>(lookup: F, cwd: &Path) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let home_dir = resolve_home_dir(&lookup)?;
        let state_dir = match non_empty(lookup(STATE_DIR_ENV)) {
            Some(raw) => expand_path(&raw, &home_dir, cwd),
            None => home_dir.join(state_dir_name(non_empty(lookup(PROFILE_ENV)).as_deref())),
        };
        let config_path = match non_empty(lookup(CONFIG_PATH_ENV)) {
            Some(raw) => expand_path(&raw, &home_dir, cwd),
            None => state_dir.join(CONFIG_FILENAME),
        };

        Ok(Self {
            home_dir,
            state_dir,
            config_path,
        })
    }

    /// Pin the state directory (the `--config-dir` flag). The config file
    /// moves with it.
    pub fn with_state_dir(home_dir: PathBuf, state_dir: PathBuf) -> Self {
        let config_path = state_dir.join(CONFIG_FILENAME);
        Self {
            home_dir,
            state_dir,
            config_path,
        }
    }

    /// Workspace used when neither the flag nor the persisted config names one.
    pub fn default_workspace_dir(&self) -> PathBuf {
        self.home_dir.join(STATE_DIR_NAME).join(WORKSPACE_DIR_NAME)
    }
}

fn resolve_home_dir<F>(lookup: &F) -> Result<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(home) = non_empty(lookup("HOME")) {
        return Ok(PathBuf::from(home));
    }
    UserDirs::new()
        .map(|u| u.home_dir().to_path_buf())
        .context("Could not find home directory")
}

/// `default` (any case) maps back to the unsuffixed directory.
fn state_dir_name(profile: Option<&str>) -> String {
    match profile {
        Some(profile) if !profile.eq_ignore_ascii_case("default") => {
            format!("{STATE_DIR_NAME}-{profile}")
        }
        _ => STATE_DIR_NAME.to_string(),
    }
}

fn expand_path(raw: &str, home_dir: &Path, cwd: &Path) -> PathBuf {
    let home = home_dir.to_string_lossy().into_owned();
    let expanded = shellexpand::tilde_with_context(raw, || Some(home.clone()));
    resolve_against(Path::new(expanded.as_ref()), cwd)
}

/// Absolute paths pass through; relative ones are joined onto `base`.
/// `.` and `..` are folded lexically, without touching the filesystem.
pub fn resolve_against(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        normalize_lexically(path)
    } else {
        normalize_lexically(&base.join(path))
    }
}

fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if out.file_name().is_some() {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_to_dot_openclaw_under_home() {
        let paths = StatePaths::resolve_with(env(&[("HOME", "/home/ada")]), Path::new("/")).unwrap();
        assert_eq!(paths.state_dir, PathBuf::from("/home/ada/.openclaw"));
        assert_eq!(
            paths.config_path,
            PathBuf::from("/home/ada/.openclaw/config.toml")
        );
    }

    #[test]
    fn profile_suffixes_state_dir() {
        let paths = StatePaths::resolve_with(
            env(&[("HOME", "/home/ada"), (PROFILE_ENV, "rescue")]),
            Path::new("/"),
        )
        .unwrap();
        assert_eq!(paths.state_dir, PathBuf::from("/home/ada/.openclaw-rescue"));
    }

    #[test]
    fn default_profile_maps_to_base_dir() {
        let paths = StatePaths::resolve_with(
            env(&[("HOME", "/home/ada"), (PROFILE_ENV, "Default")]),
            Path::new("/"),
        )
        .unwrap();
        assert_eq!(paths.state_dir, PathBuf::from("/home/ada/.openclaw"));
    }

    #[test]
    fn state_dir_override_expands_tilde() {
        let paths = StatePaths::resolve_with(
            env(&[("HOME", "/home/ada"), (STATE_DIR_ENV, "~/custom-state")]),
            Path::new("/"),
        )
        .unwrap();
        assert_eq!(paths.state_dir, PathBuf::from("/home/ada/custom-state"));
    }

    #[test]
    fn relative_state_dir_resolves_against_cwd() {
        let paths = StatePaths::resolve_with(
            env(&[("HOME", "/home/ada"), (STATE_DIR_ENV, "state")]),
            Path::new("/srv/run"),
        )
        .unwrap();
        assert_eq!(paths.state_dir, PathBuf::from("/srv/run/state"));
    }

    #[test]
    fn config_path_override_wins_over_state_dir() {
        let paths = StatePaths::resolve_with(
            env(&[
                ("HOME", "/home/ada"),
                (CONFIG_PATH_ENV, "/etc/openclaw/config.toml"),
            ]),
            Path::new("/"),
        )
        .unwrap();
        assert_eq!(paths.state_dir, PathBuf::from("/home/ada/.openclaw"));
        assert_eq!(
            paths.config_path,
            PathBuf::from("/etc/openclaw/config.toml")
        );
    }

    #[test]
    fn resolve_against_folds_dot_segments() {
        assert_eq!(
            resolve_against(Path::new("../ws"), Path::new("/home/op/project")),
            PathBuf::from("/home/op/ws")
        );
        assert_eq!(
            resolve_against(Path::new("./a/./b/.."), Path::new("/srv")),
            PathBuf::from("/srv/a")
        );
        assert_eq!(
            resolve_against(Path::new("/../../etc"), Path::new("/srv")),
            PathBuf::from("/etc")
        );
        assert_eq!(
            resolve_against(Path::new("../../x"), Path::new("rel")),
            PathBuf::from("../x")
        );
    }

    #[test]
    fn default_workspace_lives_under_home() {
        let paths = StatePaths::with_state_dir("/home/ada".into(), "/tmp/state".into());
        assert_eq!(
            paths.default_workspace_dir(),
            PathBuf::from("/home/ada/.openclaw/workspace")
        );
        assert_eq!(paths.config_path, PathBuf::from("/tmp/state/config.toml"));
    }
}
