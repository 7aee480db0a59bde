//! Credential verification across the supported hash formats.
//!
//! Used by native login (bcrypt) and by the legacy bridge (everything else).
//! Verification never fails loudly: malformed stored hashes, bad base64, or a
//! wrong part count are all verification failures, not errors surfaced to the
//! caller.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use md5::Md5;
use pbkdf2::pbkdf2_hmac;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};
use subtle::ConstantTimeEq;

use crate::models::HashAlgorithm;

/// PBKDF2 iteration count fixed by the ASP.NET Identity v3 format.
const ASPNET_IDENTITY_ITERATIONS: u32 = 10_000;
/// 1-byte version + 16-byte salt + 32-byte subkey.
const ASPNET_IDENTITY_BLOB_LEN: usize = 49;
const ASPNET_IDENTITY_VERSION: u8 = 0x01;

/// Verify a plaintext secret against a stored hash.
pub fn verify(plaintext: &str, stored_hash: &str, algorithm: HashAlgorithm) -> bool {
    if stored_hash.is_empty() {
        return false;
    }
    match algorithm {
        HashAlgorithm::Md5 => verify_digest::<Md5>(plaintext, stored_hash),
        HashAlgorithm::Sha1 => verify_digest::<Sha1>(plaintext, stored_hash),
        HashAlgorithm::Sha256 => verify_digest::<Sha256>(plaintext, stored_hash),
        HashAlgorithm::Sha512 => verify_digest::<Sha512>(plaintext, stored_hash),
        HashAlgorithm::Bcrypt => bcrypt::verify(plaintext, stored_hash).unwrap_or(false),
        HashAlgorithm::Pbkdf2Sha256 => verify_pbkdf2(plaintext, stored_hash),
        HashAlgorithm::AspNetIdentity => verify_aspnet_identity(plaintext, stored_hash),
    }
}

/// Plain digest formats: lowercase hex, compared case-insensitively.
fn verify_digest<D: Digest>(plaintext: &str, stored_hash: &str) -> bool {
    let computed = hex::encode(D::new().chain_update(plaintext.as_bytes()).finalize());
    computed.eq_ignore_ascii_case(stored_hash)
}

/// Stored format: `iterations:base64(salt):base64(hash)`, HMAC-SHA256 PRF,
/// derived-key length taken from the stored hash.
fn verify_pbkdf2(plaintext: &str, stored_hash: &str) -> bool {
    let mut parts = stored_hash.splitn(3, ':');
    let (Some(iter_part), Some(salt_part), Some(hash_part)) =
        (parts.next(), parts.next(), parts.next())
    else {
        return false;
    };

    let Ok(iterations) = iter_part.parse::<u32>() else {
        return false;
    };
    if iterations == 0 {
        return false;
    }
    let Ok(salt) = BASE64.decode(salt_part) else {
        return false;
    };
    let Ok(expected) = BASE64.decode(hash_part) else {
        return false;
    };
    if expected.is_empty() {
        return false;
    }

    let mut derived = vec![0u8; expected.len()];
    pbkdf2_hmac::<Sha256>(plaintext.as_bytes(), &salt, iterations, &mut derived);

    derived.ct_eq(&expected).into()
}

/// ASP.NET Identity v3: base64 of a 49-byte blob, version byte 0x01, 16-byte
/// salt, 32-byte subkey, PBKDF2-HMAC-SHA256 at a fixed 10,000 iterations.
fn verify_aspnet_identity(plaintext: &str, stored_hash: &str) -> bool {
    let Ok(blob) = BASE64.decode(stored_hash) else {
        return false;
    };
    if blob.len() != ASPNET_IDENTITY_BLOB_LEN || blob[0] != ASPNET_IDENTITY_VERSION {
        return false;
    }

    let salt = &blob[1..17];
    let expected = &blob[17..49];

    let mut derived = [0u8; 32];
    pbkdf2_hmac::<Sha256>(
        plaintext.as_bytes(),
        salt,
        ASPNET_IDENTITY_ITERATIONS,
        &mut derived,
    );

    derived.ct_eq(expected).into()
}
