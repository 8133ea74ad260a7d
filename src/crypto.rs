use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Key, Nonce};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use crypto_box::PublicKey;
use hkdf::Hkdf;
use sha2::Sha256;

const HKDF_SALT: &[u8] = b"nodesite-v1";
const HKDF_INFO: &[u8] = b"tenant-token-aes256gcm";
const NONCE_LEN: usize = 12;

/// Encrypts tenant access tokens at rest. The AES key is derived once from
/// the service secret.
#[derive(Clone)]
pub struct TokenCipher {
    cipher: Aes256Gcm,
}

impl TokenCipher {
    pub fn new(secret: &str) -> Self {
        let hk = Hkdf::<Sha256>::new(Some(HKDF_SALT), secret.as_bytes());
        let mut okm = [0u8; 32];
        hk.expand(HKDF_INFO, &mut okm)
            .expect("32 bytes is a valid HKDF-SHA256 output length");
        Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&okm)),
        }
    }

    /// Nonce followed by ciphertext.
    pub fn seal(&self, token: &str) -> Result<Vec<u8>, String> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, token.as_bytes())
            .map_err(|e| format!("Encryption failed: {e}"))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    pub fn open(&self, sealed: &[u8]) -> Result<String, String> {
        if sealed.len() < NONCE_LEN {
            return Err("Stored token too short".to_string());
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
        let token = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|e| format!("Decryption failed: {e}"))?;

        String::from_utf8(token).map_err(|e| format!("Invalid UTF-8: {e}"))
    }
}

/// Seal a repository secret for the hosting provider: libsodium sealed box
/// (X25519 + XSalsa20-Poly1305) against the repository's base64 public key.
/// Returns the base64 ciphertext the secrets API expects.
pub fn seal_secret(plaintext: &str, public_key_b64: &str) -> Result<String, String> {
    let key_bytes = STANDARD
        .decode(public_key_b64)
        .map_err(|e| format!("Invalid public key encoding: {e}"))?;
    let key_bytes: [u8; 32] = key_bytes
        .try_into()
        .map_err(|_| "Public key must be 32 bytes".to_string())?;

    let sealed = PublicKey::from(key_bytes)
        .seal(&mut OsRng, plaintext.as_bytes())
        .map_err(|e| format!("Sealing failed: {e}"))?;

    Ok(STANDARD.encode(sealed))
}
