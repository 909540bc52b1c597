use crate::security::SecretStore;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::time::sleep;

const CURRENT_SCHEMA_VERSION: u32 = 1;
const PROFILES_FILENAME: &str = "auth-profiles.json";
const LOCK_FILENAME: &str = "auth-profiles.lock";
const LOCK_WAIT_MS: u64 = 50;
const LOCK_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthProfileKind {
    ApiKey,
    Token,
}

impl AuthProfileKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ApiKey => "api_key",
            Self::Token => "token",
        }
    }
}

/// One stored credential. `secret` holds the API key or token in plaintext
/// while in memory; it is sealed on disk.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthProfile {
    pub id: String,
    pub provider: String,
    pub kind: AuthProfileKind,
    pub secret: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub metadata: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl std::fmt::Debug for AuthProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthProfile")
            .field("id", &self.id)
            .field("provider", &self.provider)
            .field("kind", &self.kind)
            .field("expires_at", &self.expires_at)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

impl AuthProfile {
    pub fn new_api_key(id: &str, provider: &str, key: String) -> Self {
        Self::new(id, provider, AuthProfileKind::ApiKey, key, None)
    }

    pub fn new_token(
        id: &str,
        provider: &str,
        token: String,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self::new(id, provider, AuthProfileKind::Token, token, expires_at)
    }

    fn new(
        id: &str,
        provider: &str,
        kind: AuthProfileKind,
        secret: String,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.trim().to_string(),
            provider: provider.trim().to_string(),
            kind,
            secret,
            expires_at,
            metadata: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Same credential material, ignoring bookkeeping timestamps.
    pub fn same_credential(&self, other: &Self) -> bool {
        self.id == other.id
            && self.provider == other.provider
            && self.kind == other.kind
            && self.secret == other.secret
            && self.expires_at == other.expires_at
            && self.metadata == other.metadata
    }
}

#[derive(Debug, Clone)]
pub struct AuthProfilesData {
    pub schema_version: u32,
    pub updated_at: DateTime<Utc>,
    pub active_profiles: BTreeMap<String, String>,
    pub profiles: BTreeMap<String, AuthProfile>,
}

impl Default for AuthProfilesData {
    fn default() -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            updated_at: Utc::now(),
            active_profiles: BTreeMap::new(),
            profiles: BTreeMap::new(),
        }
    }
}

/// Where onboarding hands credentials. Upserts are keyed by profile id and
/// must be idempotent.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn upsert(&self, profile: AuthProfile) -> Result<()>;
}

/// File-backed store at `<state_dir>/auth-profiles.json`, guarded by a lock
/// file so concurrent CLI invocations serialize their writes.
#[derive(Debug, Clone)]
pub struct AuthProfilesStore {
    path: PathBuf,
    lock_path: PathBuf,
    secret_store: SecretStore,
}

impl AuthProfilesStore {
    pub fn new(state_dir: &Path, encrypt_secrets: bool) -> Self {
        Self {
            path: state_dir.join(PROFILES_FILENAME),
            lock_path: state_dir.join(LOCK_FILENAME),
            secret_store: SecretStore::new(state_dir, encrypt_secrets),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> Result<AuthProfilesData> {
        let _lock = self.acquire_lock().await?;
        self.load_locked().await
    }

    /// Insert or replace by id. `created_at` of an existing entry is kept;
    /// an unchanged credential is not rewritten.
    pub async fn upsert_profile(&self, mut profile: AuthProfile, set_active: bool) -> Result<()> {
        let _lock = self.acquire_lock().await?;
        let mut data = self.load_locked().await?;

        let already_active = data
            .active_profiles
            .get(&profile.provider)
            .is_some_and(|active| active == &profile.id);
        if let Some(existing) = data.profiles.get(&profile.id) {
            if existing.same_credential(&profile) && (already_active || !set_active) {
                tracing::debug!(profile = %profile.id, "Auth profile unchanged");
                return Ok(());
            }
            profile.created_at = existing.created_at;
        }

        let now = Utc::now();
        profile.updated_at = now;
        if set_active {
            data.active_profiles
                .insert(profile.provider.clone(), profile.id.clone());
        }

        tracing::info!(profile = %profile.id, provider = %profile.provider, kind = profile.kind.as_str(), "Auth profile stored");
        data.profiles.insert(profile.id.clone(), profile);
        data.updated_at = now;

        self.save_locked(&data).await
    }

    async fn load_locked(&self) -> Result<AuthProfilesData> {
        let persisted = self.read_persisted_locked().await?;

        let mut profiles = BTreeMap::new();
        for (id, p) in &persisted.profiles {
            let kind = parse_profile_kind(&p.kind)?;
            let secret = self
                .secret_store
                .decrypt(&p.secret)
                .with_context(|| format!("Failed to decrypt auth profile {id}"))?;

            profiles.insert(
                id.clone(),
                AuthProfile {
                    id: id.clone(),
                    provider: p.provider.clone(),
                    kind,
                    secret,
                    expires_at: parse_optional_datetime(p.expires_at.as_deref())?,
                    metadata: p.metadata.clone(),
                    created_at: parse_datetime_with_fallback(&p.created_at),
                    updated_at: parse_datetime_with_fallback(&p.updated_at),
                },
            );
        }

        Ok(AuthProfilesData {
            schema_version: persisted.schema_version,
            updated_at: parse_datetime_with_fallback(&persisted.updated_at),
            active_profiles: persisted.active_profiles,
            profiles,
        })
    }

    async fn save_locked(&self, data: &AuthProfilesData) -> Result<()> {
        let mut persisted = PersistedAuthProfiles {
            schema_version: CURRENT_SCHEMA_VERSION,
            updated_at: data.updated_at.to_rfc3339(),
            active_profiles: data.active_profiles.clone(),
            profiles: BTreeMap::new(),
        };

        for (id, profile) in &data.profiles {
            persisted.profiles.insert(
                id.clone(),
                PersistedAuthProfile {
                    provider: profile.provider.clone(),
                    kind: profile.kind.as_str().to_string(),
                    secret: self.secret_store.encrypt(&profile.secret)?,
                    expires_at: profile.expires_at.as_ref().map(DateTime::to_rfc3339),
                    metadata: profile.metadata.clone(),
                    created_at: profile.created_at.to_rfc3339(),
                    updated_at: profile.updated_at.to_rfc3339(),
                },
            );
        }

        self.write_persisted_locked(&persisted).await
    }

    async fn read_persisted_locked(&self) -> Result<PersistedAuthProfiles> {
        if !self.path.exists() {
            return Ok(PersistedAuthProfiles::default());
        }

        let bytes = fs::read(&self.path).await.with_context(|| {
            format!(
                "Failed to read auth profile store at {}",
                self.path.display()
            )
        })?;

        if bytes.is_empty() {
            return Ok(PersistedAuthProfiles::default());
        }

        let mut persisted: PersistedAuthProfiles =
            serde_json::from_slice(&bytes).with_context(|| {
                format!(
                    "Failed to parse auth profile store at {}",
                    self.path.display()
                )
            })?;

        if persisted.schema_version == 0 {
            persisted.schema_version = CURRENT_SCHEMA_VERSION;
        }

        if persisted.schema_version > CURRENT_SCHEMA_VERSION {
            anyhow::bail!(
                "Unsupported auth profile schema version {} (max supported: {})",
                persisted.schema_version,
                CURRENT_SCHEMA_VERSION
            );
        }

        Ok(persisted)
    }

    async fn write_persisted_locked(&self, persisted: &PersistedAuthProfiles) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await.with_context(|| {
                format!(
                    "Failed to create auth profile directory at {}",
                    parent.display()
                )
            })?;
        }

        let json =
            serde_json::to_vec_pretty(persisted).context("Failed to serialize auth profiles")?;
        let tmp_path = self
            .path
            .with_file_name(format!("{PROFILES_FILENAME}.tmp-{}", uuid::Uuid::new_v4()));

        let mut tmp_file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&tmp_path)
            .await
            .with_context(|| {
                format!(
                    "Failed to create temporary auth profile file at {}",
                    tmp_path.display()
                )
            })?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tmp_file
                .set_permissions(std::fs::Permissions::from_mode(0o600))
                .await
                .context("Failed to restrict auth profile file permissions")?;
        }
        tmp_file
            .write_all(&json)
            .await
            .context("Failed to write temporary auth profile file")?;
        tmp_file
            .sync_all()
            .await
            .context("Failed to fsync temporary auth profile file")?;
        drop(tmp_file);

        if let Err(e) = fs::rename(&tmp_path, &self.path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(e).with_context(|| {
                format!(
                    "Failed to replace auth profile store at {}",
                    self.path.display()
                )
            });
        }

        Ok(())
    }

    async fn acquire_lock(&self) -> Result<AuthProfileLockGuard> {
        if let Some(parent) = self.lock_path.parent() {
            fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create lock directory at {}", parent.display())
            })?;
        }

        let mut waited = 0_u64;
        loop {
            match OpenOptions::new()
                .create_new(true)
                .write(true)
                .open(&self.lock_path)
                .await
            {
                Ok(mut file) => {
                    let mut buffer = Vec::new();
                    writeln!(&mut buffer, "pid={}", std::process::id())?;
                    if let Err(e) = file.write_all(&buffer).await {
                        if let Err(remove_err) = fs::remove_file(&self.lock_path).await {
                            tracing::error!("Failed to remove auth profile lock file: {remove_err:?}");
                        }
                        return Err(e).with_context(|| {
                            format!(
                                "Failed to write auth profile lock at {}",
                                self.lock_path.display()
                            )
                        });
                    }
                    return Ok(AuthProfileLockGuard {
                        lock_path: self.lock_path.clone(),
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if waited >= LOCK_TIMEOUT_MS {
                        anyhow::bail!(
                            "Timed out waiting for auth profile lock at {}",
                            self.lock_path.display()
                        );
                    }
                    sleep(Duration::from_millis(LOCK_WAIT_MS)).await;
                    waited = waited.saturating_add(LOCK_WAIT_MS);
                }
                Err(e) => {
                    return Err(e).with_context(|| {
                        format!(
                            "Failed to create auth profile lock at {}",
                            self.lock_path.display()
                        )
                    });
                }
            }
        }
    }
}

#[async_trait]
impl CredentialStore for AuthProfilesStore {
    async fn upsert(&self, profile: AuthProfile) -> Result<()> {
        self.upsert_profile(profile, true).await
    }
}

/// Process-local store, for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    profiles: Mutex<BTreeMap<String, AuthProfile>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> BTreeMap<String, AuthProfile> {
        self.profiles
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn upsert(&self, mut profile: AuthProfile) -> Result<()> {
        let mut profiles = self
            .profiles
            .lock()
            .map_err(|_| anyhow::anyhow!("Credential store lock poisoned"))?;
        if let Some(existing) = profiles.get(&profile.id) {
            profile.created_at = existing.created_at;
        }
        profiles.insert(profile.id.clone(), profile);
        Ok(())
    }
}

struct AuthProfileLockGuard {
    lock_path: PathBuf,
}

impl Drop for AuthProfileLockGuard {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.lock_path);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedAuthProfiles {
    #[serde(default = "default_schema_version")]
    schema_version: u32,
    #[serde(default = "default_now_rfc3339")]
    updated_at: String,
    #[serde(default)]
    active_profiles: BTreeMap<String, String>,
    #[serde(default)]
    profiles: BTreeMap<String, PersistedAuthProfile>,
}

impl Default for PersistedAuthProfiles {
    fn default() -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            updated_at: default_now_rfc3339(),
            active_profiles: BTreeMap::new(),
            profiles: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedAuthProfile {
    provider: String,
    kind: String,
    secret: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    metadata: BTreeMap<String, String>,
    #[serde(default = "default_now_rfc3339")]
    created_at: String,
    #[serde(default = "default_now_rfc3339")]
    updated_at: String,
}

fn default_schema_version() -> u32 {
    CURRENT_SCHEMA_VERSION
}

fn default_now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

fn parse_profile_kind(value: &str) -> Result<AuthProfileKind> {
    match value {
        "api_key" => Ok(AuthProfileKind::ApiKey),
        "token" => Ok(AuthProfileKind::Token),
        other => anyhow::bail!("Unsupported auth profile kind: {other}"),
    }
}

fn parse_optional_datetime(value: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    value.map(parse_datetime).transpose()
}

fn parse_datetime(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("Invalid RFC3339 timestamp: {value}"))
}

fn parse_datetime_with_fallback(value: &str) -> DateTime<Utc> {
    parse_datetime(value).unwrap_or_else(|_| Utc::now())
}

/// `<provider>:<name>`, both trimmed.
pub fn profile_id(provider: &str, profile_name: &str) -> String {
    format!("{}:{}", provider.trim(), profile_name.trim())
}
