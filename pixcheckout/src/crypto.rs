//! Secret handling: at-rest encryption of stored credentials and random token generation.

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit},
};
use base64::{Engine as _, engine::general_purpose};
use rand::{Rng, thread_rng};
use sha2::{Digest, Sha256};

/// Marks values produced by [`SecretCipher::encrypt`].
const ENCRYPTED_PREFIX: &str = "enc:v1:";

/// Generates a URL-safe random token with 256 bits of entropy, e.g. for payment links.
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    thread_rng().fill(&mut bytes);
    general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// AES-256-GCM cipher keyed from the application secret.
///
/// The 256-bit key is the SHA-256 digest of the configured `secret_key`. Ciphertexts are
/// `enc:v1:` followed by base64 of nonce (12 bytes) + ciphertext.
#[derive(Clone)]
pub struct SecretCipher {
    key: [u8; 32],
}

impl std::fmt::Debug for SecretCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretCipher").finish_non_exhaustive()
    }
}

impl SecretCipher {
    pub fn new(secret_key: &str) -> Self {
        let key: [u8; 32] = Sha256::digest(secret_key.as_bytes()).into();
        Self { key }
    }

    fn cipher(&self) -> anyhow::Result<Aes256Gcm> {
        Aes256Gcm::new_from_slice(&self.key).map_err(|e| anyhow::anyhow!("Failed to create cipher: {}", e))
    }

    pub fn is_encrypted(value: &str) -> bool {
        value.starts_with(ENCRYPTED_PREFIX)
    }

    pub fn encrypt(&self, plaintext: &str) -> anyhow::Result<String> {
        let cipher = self.cipher()?;

        let mut nonce_bytes = [0u8; 12];
        thread_rng().fill(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| anyhow::anyhow!("Encryption failed: {}", e))?;

        let mut combined = nonce_bytes.to_vec();
        combined.extend_from_slice(&ciphertext);

        Ok(format!("{ENCRYPTED_PREFIX}{}", general_purpose::STANDARD.encode(combined)))
    }

    /// Decrypt a value produced by [`encrypt`](Self::encrypt). Values without the prefix are
    /// returned unchanged so settings written before encryption was enabled keep working.
    pub fn decrypt(&self, value: &str) -> anyhow::Result<String> {
        let Some(encoded) = value.strip_prefix(ENCRYPTED_PREFIX) else {
            return Ok(value.to_string());
        };

        let data = general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| anyhow::anyhow!("Failed to decode encrypted data: {}", e))?;
        if data.len() < 12 {
            return Err(anyhow::anyhow!("Encrypted data too short"));
        }

        let (nonce_bytes, ciphertext) = data.split_at(12);
        let plaintext = self
            .cipher()?
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|e| anyhow::anyhow!("Decryption failed: {}", e))?;

        String::from_utf8(plaintext).map_err(|e| anyhow::anyhow!("Decrypted value is not UTF-8: {}", e))
    }
}

/// Mask a secret for display, keeping the last four characters.
pub fn mask_secret(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 4 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{tail}")
}
