/// Password Hashing and Verification
///
/// One-way bcrypt hash/verify. Length and confirmation rules live in the
/// field validator, not here.

use bcrypt::{hash, verify, DEFAULT_COST};

use crate::error::AppError;

/// Hash a password with bcrypt
pub fn hash_password(password: &str) -> Result<String, AppError> {
    hash(password, DEFAULT_COST)
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

/// Verify a password against its stored hash
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    verify(password, hash)
        .map_err(|e| AppError::Internal(format!("Password verification failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_password() {
        let password = "password123";
        let hash = hash_password(password).expect("Failed to hash password");

        assert_ne!(password, hash);
        assert!(hash.starts_with("$2"));
    }

    #[test]
    fn test_verify_password() {
        let password = "password123";
        let hash = hash_password(password).expect("Failed to hash password");

        let is_valid = verify_password(password, &hash).expect("Failed to verify password");
        assert!(is_valid);
    }

    #[test]
    fn test_verify_wrong_password() {
        let password = "password123";
        let hash = hash_password(password).expect("Failed to hash password");

        let is_valid = verify_password("drowssap321", &hash).expect("Failed to verify password");
        assert!(!is_valid);
    }
}
