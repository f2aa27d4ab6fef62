/// Password Verification
///
/// Credentials are owned by the identity provider; this module only checks a
/// presented password against a stored bcrypt hash.

use bcrypt::{hash, verify, DEFAULT_COST};

use crate::error::AppError;

/// Verify a password against its hash
///
/// # Errors
/// Returns error if the stored hash is not a valid bcrypt hash
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    Ok(verify(password, hash)?)
}

/// Hash a password with bcrypt at `cost` (`DEFAULT_COST` when `None`).
///
/// Used to seed identity adapters; the service itself never stores passwords.
pub fn hash_password(password: &str, cost: Option<u32>) -> Result<String, AppError> {
    Ok(hash(password, cost.unwrap_or(DEFAULT_COST))?)
}
