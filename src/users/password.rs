use argon2::{
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;

#[derive(Debug, thiserror::Error)]
pub enum HashError {
    #[error("argon2: {0}")]
    Argon2(password_hash::Error),

    #[error("hashing task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl From<password_hash::Error> for HashError {
    fn from(err: password_hash::Error) -> Self {
        HashError::Argon2(err)
    }
}

/// One-way salted credential hashing. Output is an argon2 PHC string; a fresh
/// salt is drawn per call, so equal inputs never produce equal hashes.
#[derive(Debug, Clone, Default)]
pub struct CredentialHasher {
    argon2: Argon2<'static>,
}

impl CredentialHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hash(&self, secret: &str) -> Result<String, HashError> {
        let salt = SaltString::generate(&mut OsRng);
        Ok(self
            .argon2
            .hash_password(secret.as_bytes(), &salt)?
            .to_string())
    }

    /// Runs [`CredentialHasher::hash`] on the blocking pool; argon2 is too slow for a request task.
    pub async fn hash_blocking(&self, secret: String) -> Result<String, HashError> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&secret)).await?
    }

    /// Constant-time comparison against a stored PHC string.
    pub fn verify(&self, secret: &str, stored: &str) -> Result<bool, HashError> {
        let parsed = PasswordHash::new(stored)?;
        match self.argon2.verify_password(secret.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
