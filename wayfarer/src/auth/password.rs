use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};

use crate::{config::AuthSettings, errors::AppError};

/// Argon2id hashing with the cost parameters from `[auth]`.
#[derive(Debug, Clone)]
pub struct Passwords {
    params: Params,
}

impl Passwords {
    pub fn new(memory_kib: u32, iterations: u32, parallelism: u32) -> Result<Self, AppError> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| AppError::Unexpected(format!("invalid argon2 parameters: {e}")))?;
        Ok(Self { params })
    }

    pub fn from_settings(settings: &AuthSettings) -> Result<Self, AppError> {
        Self::new(
            settings.argon2_memory_kib,
            settings.argon2_iterations,
            settings.argon2_parallelism,
        )
    }

    fn hasher(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// PHC-format hash with a fresh random salt.
    pub fn hash(&self, password: &str) -> Result<String, AppError> {
        let salt = SaltString::encode_b64(uuid::Uuid::new_v4().as_bytes())
            .map_err(|e| AppError::Unexpected(format!("invalid salt: {e}")))?;
        let hash = self
            .hasher()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Unexpected(format!("password hashing failed: {e}")))?;
        Ok(hash.to_string())
    }

    /// `false` for a wrong password; errors only when the stored hash is unreadable.
    pub fn verify(&self, password: &str, stored: &str) -> Result<bool, AppError> {
        let parsed = PasswordHash::new(stored)
            .map_err(|e| AppError::Unexpected(format!("invalid password hash: {e}")))?;
        match self.hasher().verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(AppError::Unexpected(format!("password verification failed: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cheap() -> Passwords {
        Passwords::new(1024, 1, 1).unwrap()
    }

    #[test]
    fn hash_then_verify() {
        let passwords = cheap();
        let hash = passwords.hash("hunter22").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(passwords.verify("hunter22", &hash).unwrap());
        assert!(!passwords.verify("hunter23", &hash).unwrap());
    }

    #[test]
    fn salts_differ_between_hashes() {
        let passwords = cheap();
        assert_ne!(passwords.hash("same").unwrap(), passwords.hash("same").unwrap());
    }

    #[test]
    fn garbage_hash_is_an_error() {
        assert!(cheap().verify("pw", "not-a-phc-string").is_err());
    }
}
