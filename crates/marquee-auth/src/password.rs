//! Password credentials (argon2id, PHC string format).

use crate::error::CredentialError;
use argon2::password_hash::{self, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng};
use argon2::Argon2;
use marquee_core::model::PasswordHash;

/// Hash a plaintext password with a fresh random salt.
pub fn hash_password(plaintext: &str) -> Result<PasswordHash, CredentialError> {
    let salt = SaltString::generate(&mut OsRng);
    let phc = Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map_err(|e| CredentialError::Backend(e.to_string()))?
        .to_string();
    Ok(PasswordHash::new(phc))
}

/// Check a plaintext against a stored hash.
///
/// Returns `Ok(false)` only for a genuine mismatch. A hash that cannot be
/// parsed or a backend failure is an `Err` so callers can report a fault
/// instead of "wrong password".
pub fn verify_password(plaintext: &str, hash: &PasswordHash) -> Result<bool, CredentialError> {
    let parsed = password_hash::PasswordHash::new(hash.as_str())
        .map_err(|e| CredentialError::MalformedHash(e.to_string()))?;

    match Argon2::default().verify_password(plaintext.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(e) => Err(CredentialError::Backend(e.to_string())),
    }
}

/// [`hash_password`] on the blocking pool, off the async workers.
pub async fn hash_password_async(plaintext: String) -> Result<PasswordHash, CredentialError> {
    tokio::task::spawn_blocking(move || hash_password(&plaintext))
        .await
        .map_err(|e| CredentialError::Backend(format!("hashing task failed: {e}")))?
}

/// [`verify_password`] on the blocking pool, off the async workers.
pub async fn verify_password_async(
    plaintext: String,
    hash: PasswordHash,
) -> Result<bool, CredentialError> {
    tokio::task::spawn_blocking(move || verify_password(&plaintext, &hash))
        .await
        .map_err(|e| CredentialError::Backend(format!("verification task failed: {e}")))?
}
