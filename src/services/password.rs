//! Password hashing with Argon2id
//!
//! Hashing and verification run under `spawn_blocking`; Argon2 work on
//! the async executor would stall unrelated request handling.

use argon2::{
    Argon2,
    password_hash::{
        Error as PasswordHashError, PasswordHash, PasswordHasher as _, PasswordVerifier,
        SaltString, rand_core::OsRng,
    },
};

#[derive(Debug)]
pub enum HashError {
    HashFailed,
    VerifyFailed,
    TaskFailed,
}

impl std::fmt::Display for HashError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HashError::HashFailed => write!(f, "Password hashing failed"),
            HashError::VerifyFailed => write!(f, "Password verification failed"),
            HashError::TaskFailed => write!(f, "Hashing task failed"),
        }
    }
}

/// Hash a password with a fresh random salt
pub async fn hash_password(password: &str) -> Result<String, HashError> {
    let password = password.to_string();

    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|_| HashError::HashFailed)
    })
    .await
    .map_err(|_| HashError::TaskFailed)?
}

/// Verify a password against a stored hash. Ok(false) means "wrong
/// password"; Err means the stored hash itself is unusable.
pub async fn verify_password(password: &str, hash: &str) -> Result<bool, HashError> {
    let password = password.to_string();
    let hash = hash.to_string();

    tokio::task::spawn_blocking(move || {
        let parsed_hash = PasswordHash::new(&hash).map_err(|_| HashError::VerifyFailed)?;

        match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
            Ok(_) => Ok(true),
            Err(PasswordHashError::Password) => Ok(false),
            Err(_) => Err(HashError::VerifyFailed),
        }
    })
    .await
    .map_err(|_| HashError::TaskFailed)?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hash_and_verify() {
        let hashed = hash_password("SecurePassword123").await.unwrap();

        assert!(verify_password("SecurePassword123", &hashed).await.unwrap());
        assert!(!verify_password("WrongPassword", &hashed).await.unwrap());
        assert!(verify_password("SecurePassword123", "not-a-hash")
            .await
            .is_err());
    }
}
