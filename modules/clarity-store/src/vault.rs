use std::sync::Arc;

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use anyhow::{anyhow, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::Serialize;

use crate::keys::KeyCache;

/// Stored payload format: `enc:v1:<base64(iv | ciphertext | tag)>`.
pub const ENCRYPTED_PREFIX: &str = "enc:v1:";
pub const ALGORITHM: &str = "AES-256-GCM";

const IV_BYTES: usize = 12;
const TAG_BYTES: usize = 16;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyRef {
    pub workspace_id: String,
    pub key_bytes: usize,
    pub alg: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Opened {
    pub plaintext: String,
    pub was_encrypted: bool,
}

/// Workspace-scoped AES-256-GCM encryption over a [`KeyCache`].
#[derive(Clone)]
pub struct Vault {
    keys: Arc<KeyCache>,
}

impl Vault {
    pub fn new(keys: Arc<KeyCache>) -> Self {
        Self { keys }
    }

    /// Ensure the workspace key exists and describe it.
    pub async fn init_workspace_key(&self, workspace_id: &str) -> Result<KeyRef> {
        let key = self.keys.get_or_init(workspace_id).await?;
        Ok(KeyRef {
            workspace_id: workspace_id.to_string(),
            key_bytes: key.len(),
            alg: ALGORITHM,
        })
    }

    pub async fn encrypt(&self, workspace_id: &str, plaintext: &str) -> Result<String> {
        let key = self.keys.get_or_init(workspace_id).await?;
        let cipher = Aes256Gcm::new_from_slice(&key).map_err(|_| anyhow!("invalid key length"))?;

        let mut iv = [0u8; IV_BYTES];
        OsRng.fill_bytes(&mut iv);
        let sealed = cipher
            .encrypt(Nonce::from_slice(&iv), plaintext.as_bytes())
            .map_err(|_| anyhow!("encryption failed"))?;

        let mut payload = Vec::with_capacity(IV_BYTES + sealed.len());
        payload.extend_from_slice(&iv);
        payload.extend_from_slice(&sealed);
        Ok(format!("{ENCRYPTED_PREFIX}{}", BASE64.encode(payload)))
    }

    /// Decrypt stored content. Content that is not prefixed, not valid
    /// base64, or too short to hold iv and tag is returned unchanged.
    pub async fn decrypt(&self, workspace_id: &str, stored: &str) -> Result<Opened> {
        let passthrough = || Opened {
            plaintext: stored.to_string(),
            was_encrypted: false,
        };

        let Some(encoded) = stored.strip_prefix(ENCRYPTED_PREFIX) else {
            return Ok(passthrough());
        };
        let Ok(payload) = BASE64.decode(encoded.as_bytes()) else {
            return Ok(passthrough());
        };
        if payload.len() < IV_BYTES + TAG_BYTES + 1 {
            return Ok(passthrough());
        }

        let key = self.keys.get_or_init(workspace_id).await?;
        let cipher = Aes256Gcm::new_from_slice(&key).map_err(|_| anyhow!("invalid key length"))?;
        let (iv, sealed) = payload.split_at(IV_BYTES);
        let plain = cipher
            .decrypt(Nonce::from_slice(iv), sealed)
            .map_err(|_| anyhow!("decryption failed for workspace {workspace_id}"))?;

        Ok(Opened {
            plaintext: String::from_utf8(plain)?,
            was_encrypted: true,
        })
    }
}
