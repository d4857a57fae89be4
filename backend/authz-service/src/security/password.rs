/// Password hashing and verification using Argon2id
use argon2::{
    password_hash::{PasswordHasher, SaltString},
    Argon2, PasswordHash, PasswordVerifier,
};

use crate::error::{AuthzError, Result};

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Hash a password using Argon2id with a random salt.
pub fn hash_password(password: &str) -> Result<String> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthzError::Validation(format!(
            "password: must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }

    let salt = SaltString::generate(rand::thread_rng());
    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|_| AuthzError::Internal("Failed to hash password".to_string()))?
        .to_string();

    Ok(password_hash)
}

/// Verify a password against a stored PHC hash string.
///
/// Returns `false` for a mismatch; a corrupt stored hash is an internal error.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|_| AuthzError::Internal("Invalid password hash format".to_string()))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("SecurePass123!").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("SecurePass123!", &hash).unwrap());
    }

    #[test]
    fn test_wrong_password() {
        let hash = hash_password("SecurePass123!").unwrap();
        assert!(!verify_password("WrongPass123!", &hash).unwrap());
    }

    #[test]
    fn test_short_password_rejected() {
        assert!(matches!(
            hash_password("short"),
            Err(AuthzError::Validation(_))
        ));
    }

    #[test]
    fn test_corrupt_hash_is_internal_error() {
        assert!(matches!(
            verify_password("whatever1", "not-a-phc-string"),
            Err(AuthzError::Internal(_))
        ));
    }
}
