/// Password hashing module using Argon2id
///
/// Passwords are hashed into PHC strings, which embed the algorithm, the cost
/// parameters, and the salt. Verification reads the parameters back out of the
/// stored hash, so changing [`PasswordParams`] later does not break existing
/// accounts.
///
/// # Security
///
/// - **Algorithm**: Argon2id
/// - **Memory**: 64 MB (65536 KB)
/// - **Iterations**: 3 passes
/// - **Parallelism**: 4 lanes
/// - **Output**: 32-byte hash
///
/// Both operations are CPU-bound; async callers run them on the blocking pool.
///
/// # Example
///
/// ```
/// use teamtask_shared::auth::password::{hash_password, verify_password, PasswordParams};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let params = PasswordParams::default();
/// let hash = hash_password("super_secret_password_123", &params)?;
///
/// assert!(verify_password("super_secret_password_123", &hash)?);
/// assert!(!verify_password("wrong_password", &hash)?);
/// # Ok(())
/// # }
/// ```

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, ParamsBuilder, Version,
};

/// Minimum accepted password length
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Error type for password hashing operations
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    /// Failed to hash password
    #[error("Failed to hash password: {0}")]
    HashError(String),

    /// Failed to verify password
    #[error("Failed to verify password: {0}")]
    VerifyError(String),

    /// Invalid password hash format
    #[error("Invalid password hash format: {0}")]
    InvalidHash(String),
}

/// Argon2id cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordParams {
    /// Memory cost in KiB
    pub m_cost: u32,

    /// Number of passes
    pub t_cost: u32,

    /// Parallel lanes
    pub p_cost: u32,
}

impl Default for PasswordParams {
    fn default() -> Self {
        Self {
            m_cost: 65536,
            t_cost: 3,
            p_cost: 4,
        }
    }
}

impl PasswordParams {
    /// Minimal parameters for test suites
    ///
    /// Never use these for stored credentials.
    pub fn insecure_fast() -> Self {
        Self {
            m_cost: 8,
            t_cost: 1,
            p_cost: 1,
        }
    }
}

/// Hashes a password using Argon2id
///
/// # Returns
///
/// PHC string format hash:
/// ```text
/// $argon2id$v=19$m=65536,t=3,p=4$c2FsdHNhbHRzYWx0$hash...
/// ```
///
/// # Errors
///
/// Returns `PasswordError::HashError` if the parameters are invalid or
/// hashing fails
pub fn hash_password(password: &str, params: &PasswordParams) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    let params = ParamsBuilder::new()
        .m_cost(params.m_cost)
        .t_cost(params.t_cost)
        .p_cost(params.p_cost)
        .output_len(32)
        .build()
        .map_err(|e| PasswordError::HashError(format!("Invalid parameters: {}", e)))?;

    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, params);

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::HashError(format!("Hash generation failed: {}", e)))?;

    Ok(password_hash.to_string())
}

/// Verifies a password against a PHC hash
///
/// Comparison is constant-time.
///
/// # Returns
///
/// `Ok(true)` if password matches, `Ok(false)` if it doesn't
///
/// # Errors
///
/// - `PasswordError::InvalidHash` if the stored hash cannot be parsed
/// - `PasswordError::VerifyError` for failures other than a mismatch
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|e| PasswordError::InvalidHash(e.to_string()))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::VerifyError(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_password_format() {
        let hash = hash_password("test_password_123", &PasswordParams::default()).unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(hash.contains("m=65536"));
        assert!(hash.contains("t=3"));
        assert!(hash.contains("p=4"));
    }

    #[test]
    fn test_verify_correct_and_wrong_password() {
        let params = PasswordParams::insecure_fast();
        let hash = hash_password("correct horse", &params).unwrap();

        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("battery staple", &hash).unwrap());
    }

    #[test]
    fn test_same_password_different_salts() {
        let params = PasswordParams::insecure_fast();
        let a = hash_password("same_password", &params).unwrap();
        let b = hash_password("same_password", &params).unwrap();

        assert_ne!(a, b);
        assert!(verify_password("same_password", &a).unwrap());
        assert!(verify_password("same_password", &b).unwrap());
    }

    #[test]
    fn test_invalid_hash_format() {
        let result = verify_password("password", "not-a-phc-string");
        assert!(matches!(result, Err(PasswordError::InvalidHash(_))));
    }

    #[test]
    fn test_password_is_not_trimmed() {
        let params = PasswordParams::insecure_fast();
        let hash = hash_password(" padded password ", &params).unwrap();

        assert!(!verify_password("padded password", &hash).unwrap());
    }
}
