//! Argon2id password hashing.

use argon2::Argon2;
use argon2::password_hash::{
    self, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString, rand_core::OsRng,
};

use keyshare_core::error::AppError;

/// Hashes and verifies user passwords with Argon2id and a random salt.
#[derive(Debug, Clone, Default)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
}

impl PasswordHasher {
    /// Create a hasher with default Argon2id parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Hash a plaintext password into a PHC string.
    ///
    /// Length rules are enforced on the request before it gets here.
    pub fn hash(&self, password: &str) -> Result<String, AppError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AppError::internal(format!("Password hashing failed: {e}")))
    }

    /// Check a plaintext password against a stored hash.
    ///
    /// A mismatch is `Ok(false)`; a malformed stored hash is an error.
    pub fn verify(&self, password: &str, stored: &str) -> Result<bool, AppError> {
        let parsed = PasswordHash::new(stored)
            .map_err(|e| AppError::internal(format!("Stored password hash is malformed: {e}")))?;

        match self.argon2.verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => Err(AppError::internal(format!("Password verification failed: {e}"))),
        }
    }
}
