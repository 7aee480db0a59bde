//! bcrypt hashing for locally stored passwords.
//!
//! Legacy hash formats are read-only; anything this core writes is bcrypt.

use bcrypt::DEFAULT_COST;

use crate::services::ServiceError;

/// Hash a plaintext password at the default work factor.
pub fn hash_password(plain: &str) -> Result<String, ServiceError> {
    bcrypt::hash(plain, DEFAULT_COST)
        .map_err(|e| ServiceError::Internal(anyhow::anyhow!("password hashing: {e}")))
}

/// Verify a plaintext against a stored bcrypt hash. Malformed stored hashes
/// read as a mismatch.
pub fn verify_password(plain: &str, stored_hash: &str) -> bool {
    bcrypt::verify(plain, stored_hash).unwrap_or(false)
}
