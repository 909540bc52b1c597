// Encrypted secret store for gateway secrets and provider credentials.
//
// Values are sealed with ChaCha20-Poly1305 under a random key kept in
// `<state_dir>/.secret_key` (mode 0600). Persisted files carry only
// `enc2:<hex(nonce ‖ ciphertext ‖ tag)>`, never plaintext.
//
// `secrets.encrypt = false` in config.toml stores plaintext instead.

use anyhow::{Context, Result};
use chacha20poly1305::aead::{Aead, KeyInit, OsRng};
use chacha20poly1305::{AeadCore, ChaCha20Poly1305, Key, Nonce};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

const KEY_FILENAME: &str = ".secret_key";
const ENCRYPTED_PREFIX: &str = "enc2:";

/// Length of the random encryption key in bytes (256-bit, matches `ChaCha20`).
const KEY_LEN: usize = 32;

/// ChaCha20-Poly1305 nonce length in bytes.
const NONCE_LEN: usize = 12;

#[derive(Debug, Clone)]
pub struct SecretStore {
    key_path: PathBuf,
    enabled: bool,
}

impl SecretStore {
    pub fn new(state_dir: &Path, enabled: bool) -> Self {
        Self {
            key_path: state_dir.join(KEY_FILENAME),
            enabled,
        }
    }

    /// Seal a plaintext secret. Empty input and a disabled store pass through.
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        if !self.enabled || plaintext.is_empty() {
            return Ok(plaintext.to_string());
        }

        let key_bytes = self.load_or_create_key()?;
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&key_bytes));

        let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| anyhow::anyhow!("Encryption failed: {e}"))?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);

        Ok(format!("{ENCRYPTED_PREFIX}{}", hex::encode(blob)))
    }

    /// Open a sealed value. Values without the `enc2:` prefix are plaintext
    /// and returned as-is.
    pub fn decrypt(&self, value: &str) -> Result<String> {
        let Some(hex_str) = value.strip_prefix(ENCRYPTED_PREFIX) else {
            return Ok(value.to_string());
        };

        let blob = hex::decode(hex_str).context("Failed to decode encrypted secret (corrupt hex)")?;
        anyhow::ensure!(
            blob.len() > NONCE_LEN,
            "Encrypted value too short (missing nonce)"
        );

        let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LEN);
        let key_bytes = self.load_or_create_key()?;
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&key_bytes));

        let plaintext_bytes = cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| anyhow::anyhow!("Decryption failed: wrong key or tampered data"))?;

        String::from_utf8(plaintext_bytes).context("Decrypted secret is not valid UTF-8")
    }

    pub fn is_encrypted(value: &str) -> bool {
        value.starts_with(ENCRYPTED_PREFIX)
    }

    fn load_or_create_key(&self) -> Result<Vec<u8>> {
        if self.key_path.exists() {
            return read_key(&self.key_path);
        }

        if let Some(parent) = self.key_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create secret key directory {}", parent.display())
            })?;
        }

        let key = ChaCha20Poly1305::generate_key(&mut OsRng).to_vec();
        match fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&self.key_path)
        {
            Ok(mut key_file) => {
                // Restrict before the key bytes land on disk.
                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    key_file
                        .set_permissions(fs::Permissions::from_mode(0o600))
                        .context("Failed to set key file permissions")?;
                }

                key_file
                    .write_all(hex::encode(&key).as_bytes())
                    .context("Failed to write secret key file")?;
                key_file
                    .sync_all()
                    .context("Failed to fsync secret key file")?;
                tracing::debug!(path = %self.key_path.display(), "Created secret key");
                Ok(key)
            }
            // Concurrent creator won the race; use its key.
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                read_key(&self.key_path)
            }
            Err(err) => Err(err).context("Failed to create secret key file"),
        }
    }
}

fn read_key(path: &Path) -> Result<Vec<u8>> {
    let hex_key = fs::read_to_string(path).context("Failed to read secret key file")?;
    let key = hex::decode(hex_key.trim()).context("Secret key file is corrupt")?;
    anyhow::ensure!(key.len() == KEY_LEN, "Secret key file has wrong length");
    Ok(key)
}
