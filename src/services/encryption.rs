//! Reversible encryption for at-rest secrets (legacy connection strings,
//! third-party client secrets).
//!
//! Ciphertexts are version-tagged so decryption never has to guess which
//! cipher produced them. `enc2:` is the primary AES-256-GCM path; `enc1:` is
//! the AES-256-CBC fallback kept for material written before the GCM path
//! existed. Untagged input is treated as fallback-format.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};

use crate::config::EncryptionConfig;
use crate::services::ServiceError;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

const GCM_PREFIX: &str = "enc2:";
const CBC_PREFIX: &str = "enc1:";
const GCM_NONCE_LEN: usize = 12;
const CBC_IV_LEN: usize = 16;
const KEY_LEN: usize = 32;

#[derive(Clone)]
pub struct EncryptionService {
    /// SHA-256 of the master key; used by the GCM path.
    gcm_key: [u8; KEY_LEN],
    /// Master key padded/truncated to 32 bytes; used by the CBC fallback.
    cbc_key: [u8; KEY_LEN],
}

impl EncryptionService {
    pub fn new(config: &EncryptionConfig) -> Self {
        let mut gcm_key = [0u8; KEY_LEN];
        gcm_key.copy_from_slice(&Sha256::digest(config.master_key.as_bytes()));

        let mut cbc_key = [0u8; KEY_LEN];
        let raw = config.master_key.as_bytes();
        let take = raw.len().min(KEY_LEN);
        cbc_key[..take].copy_from_slice(&raw[..take]);

        Self { gcm_key, cbc_key }
    }

    /// Encrypt a plaintext; no-op on empty input.
    pub fn encrypt(&self, plain: &str) -> Result<String, ServiceError> {
        if plain.is_empty() {
            return Ok(String::new());
        }

        let cipher = Aes256Gcm::new_from_slice(&self.gcm_key)
            .map_err(|e| internal(format!("cipher init: {e}")))?;

        let mut nonce = [0u8; GCM_NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plain.as_bytes())
            .map_err(|_| internal("encryption failed".to_string()))?;

        let mut blob = Vec::with_capacity(GCM_NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);

        Ok(format!("{GCM_PREFIX}{}", BASE64.encode(blob)))
    }

    /// Decrypt a ciphertext; no-op on empty input. The version tag decides
    /// the cipher, so callers never need to know which path wrote the value.
    pub fn decrypt(&self, ciphertext: &str) -> Result<String, ServiceError> {
        if ciphertext.is_empty() {
            return Ok(String::new());
        }

        if let Some(rest) = ciphertext.strip_prefix(GCM_PREFIX) {
            self.decrypt_gcm(rest)
        } else if let Some(rest) = ciphertext.strip_prefix(CBC_PREFIX) {
            self.decrypt_cbc(rest)
        } else {
            // Material written before version tags were introduced.
            self.decrypt_cbc(ciphertext)
        }
    }

    fn decrypt_gcm(&self, encoded: &str) -> Result<String, ServiceError> {
        let blob = BASE64
            .decode(encoded)
            .map_err(|e| internal(format!("ciphertext base64: {e}")))?;
        if blob.len() <= GCM_NONCE_LEN {
            return Err(internal("ciphertext too short".to_string()));
        }

        let cipher = Aes256Gcm::new_from_slice(&self.gcm_key)
            .map_err(|e| internal(format!("cipher init: {e}")))?;

        let (nonce, ciphertext) = blob.split_at(GCM_NONCE_LEN);
        let plain = cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| internal("decryption failed".to_string()))?;

        String::from_utf8(plain).map_err(|e| internal(format!("plaintext utf-8: {e}")))
    }

    /// Fallback path: AES-256-CBC with the IV prepended to the ciphertext.
    /// Production writes are always GCM; this exists to fabricate
    /// legacy-format material for the decrypt tests.
    #[cfg(test)]
    fn encrypt_cbc(&self, plain: &str) -> Result<String, ServiceError> {
        let mut iv = [0u8; CBC_IV_LEN];
        OsRng.fill_bytes(&mut iv);

        let encryptor = Aes256CbcEnc::new_from_slices(&self.cbc_key, &iv)
            .map_err(|e| internal(format!("cipher init: {e}")))?;
        let ciphertext = encryptor.encrypt_padded_vec_mut::<Pkcs7>(plain.as_bytes());

        let mut blob = Vec::with_capacity(CBC_IV_LEN + ciphertext.len());
        blob.extend_from_slice(&iv);
        blob.extend_from_slice(&ciphertext);

        Ok(format!("{CBC_PREFIX}{}", BASE64.encode(blob)))
    }

    fn decrypt_cbc(&self, encoded: &str) -> Result<String, ServiceError> {
        let blob = BASE64
            .decode(encoded)
            .map_err(|e| internal(format!("ciphertext base64: {e}")))?;
        if blob.len() <= CBC_IV_LEN {
            return Err(internal("ciphertext too short".to_string()));
        }

        let (iv, ciphertext) = blob.split_at(CBC_IV_LEN);
        let decryptor = Aes256CbcDec::new_from_slices(&self.cbc_key, iv)
            .map_err(|e| internal(format!("cipher init: {e}")))?;
        let plain = decryptor
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|_| internal("decryption failed".to_string()))?;

        String::from_utf8(plain).map_err(|e| internal(format!("plaintext utf-8: {e}")))
    }
}

fn internal(msg: String) -> ServiceError {
    ServiceError::Internal(anyhow::anyhow!(msg))
}
