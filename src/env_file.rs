//! Shared `.env` file read by provider clients that take credentials from the
//! process environment.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::fs;

const ENV_FILENAME: &str = ".env";

#[async_trait]
pub trait EnvStore: Send + Sync {
    /// Set `key` to `value`, replacing any previous assignment.
    async fn upsert(&self, key: &str, value: &str) -> Result<()>;
}

/// `<state_dir>/.env`, one `KEY=value` per line. Comments and unrelated keys
/// are preserved in place.
#[derive(Debug, Clone)]
pub struct SharedEnvFile {
    path: PathBuf,
}

impl SharedEnvFile {
    pub fn new(state_dir: &Path) -> Self {
        Self {
            path: state_dir.join(ENV_FILENAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl EnvStore for SharedEnvFile {
    async fn upsert(&self, key: &str, value: &str) -> Result<()> {
        let existing = if self.path.exists() {
            fs::read_to_string(&self.path)
                .await
                .with_context(|| format!("Failed to read env file {}", self.path.display()))?
        } else {
            String::new()
        };

        let updated = upsert_line(&existing, key, value);
        if updated == existing {
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let tmp_path = self
            .path
            .with_file_name(format!("{ENV_FILENAME}.tmp-{}", uuid::Uuid::new_v4()));
        fs::write(&tmp_path, &updated)
            .await
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600))
                .await
                .context("Failed to restrict env file permissions")?;
        }
        if let Err(e) = fs::rename(&tmp_path, &self.path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(e)
                .with_context(|| format!("Failed to replace env file {}", self.path.display()));
        }

        tracing::info!(path = %self.path.display(), key, "Shared env var updated");
        Ok(())
    }
}

/// In-memory env store for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryEnvStore {
    vars: Mutex<BTreeMap<String, String>>,
}

impl MemoryEnvStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.vars
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl EnvStore for MemoryEnvStore {
    async fn upsert(&self, key: &str, value: &str) -> Result<()> {
        self.vars
            .lock()
            .map_err(|_| anyhow::anyhow!("Env store lock poisoned"))?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// The running process's environment, so later steps in the same run see
/// freshly supplied keys.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnv;

#[async_trait]
impl EnvStore for ProcessEnv {
    async fn upsert(&self, key: &str, value: &str) -> Result<()> {
        std::env::set_var(key, value);
        Ok(())
    }
}

fn upsert_line(contents: &str, key: &str, value: &str) -> String {
    let assignment = format!("{key}={}", quote_value(value));
    let mut replaced = false;
    let mut lines: Vec<String> = Vec::new();

    for line in contents.lines() {
        if assigned_key(line) == Some(key) {
            if !replaced {
                lines.push(assignment.clone());
                replaced = true;
            }
            continue;
        }
        lines.push(line.to_string());
    }
    if !replaced {
        lines.push(assignment);
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn assigned_key(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    if trimmed.starts_with('#') {
        return None;
    }
    let trimmed = trimmed
        .strip_prefix("export ")
        .map_or(trimmed, str::trim_start);
    trimmed.split_once('=').map(|(k, _)| k.trim())
}

fn quote_value(value: &str) -> String {
    let needs_quotes = value
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '#' | '"' | '\'' | '\\' | '$'));
    if !needs_quotes {
        return value.to_string();
    }
    let escaped = value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('$', "\\$");
    format!("\"{escaped}\"")
}
