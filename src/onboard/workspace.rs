use crate::config::paths::resolve_against;
use crate::config::schema::Config;
use std::path::{Path, PathBuf};

/// Pick the agent workspace: the `--workspace` flag (resolved against `cwd`),
/// then the persisted `agents.defaults.workspace`, then `default_dir`.
pub fn resolve_workspace_dir(
    flag: Option<&Path>,
    config: &Config,
    cwd: &Path,
    default_dir: &Path,
) -> PathBuf {
    if let Some(dir) = flag.filter(|p| !p.as_os_str().is_empty()) {
        return resolve_against(dir, cwd);
    }
    config
        .agent_defaults()
        .and_then(|d| d.workspace.as_deref())
        .map(str::trim)
        .filter(|w| !w.is_empty())
        .map_or_else(|| default_dir.to_path_buf(), PathBuf::from)
}

/// Record `dir` as `agents.defaults.workspace`.
pub fn apply_workspace(config: &Config, dir: &Path) -> Config {
    let mut next = config.clone();
    next.agent_defaults_mut().workspace = Some(dir.display().to_string());
    next
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_persisted(workspace: &str) -> Config {
        let mut config = Config::default();
        config.agent_defaults_mut().workspace = Some(workspace.into());
        config
    }

    #[test]
    fn relative_flag_resolves_against_cwd() {
        let dir = resolve_workspace_dir(
            Some(Path::new("agents/main")),
            &with_persisted("/persisted"),
            Path::new("/home/op/project"),
            Path::new("/home/op/.openclaw/workspace"),
        );
        assert_eq!(dir, PathBuf::from("/home/op/project/agents/main"));
    }

    #[test]
    fn parent_segments_in_flag_are_collapsed() {
        let dir = resolve_workspace_dir(
            Some(Path::new("../ws")),
            &Config::default(),
            Path::new("/home/op/project"),
            Path::new("/default"),
        );
        assert_eq!(dir, PathBuf::from("/home/op/ws"));
    }

    #[test]
    fn absolute_flag_is_kept() {
        let dir = resolve_workspace_dir(
            Some(Path::new("/srv/ws")),
            &Config::default(),
            Path::new("/tmp"),
            Path::new("/default"),
        );
        assert_eq!(dir, PathBuf::from("/srv/ws"));
    }

    #[test]
    fn persisted_value_beats_default() {
        let dir = resolve_workspace_dir(
            None,
            &with_persisted("/persisted"),
            Path::new("/tmp"),
            Path::new("/default"),
        );
        assert_eq!(dir, PathBuf::from("/persisted"));
    }

    #[test]
    fn default_when_nothing_set() {
        let dir = resolve_workspace_dir(
            Some(Path::new("")),
            &with_persisted("  "),
            Path::new("/tmp"),
            Path::new("/default"),
        );
        assert_eq!(dir, PathBuf::from("/default"));
    }

    #[test]
    fn apply_sets_agent_default() {
        let next = apply_workspace(&Config::default(), Path::new("/srv/ws"));
        assert_eq!(
            next.agent_defaults().and_then(|d| d.workspace.as_deref()),
            Some("/srv/ws")
        );
    }
}
