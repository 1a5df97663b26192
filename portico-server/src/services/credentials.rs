use crate::error::{AppResult, DomainError};
use argon2::Argon2;
use password_hash::rand_core::OsRng;
use password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};

/// One-way password hashing. Implementations must never be able to recover the raw secret.
pub trait CredentialVerifier: Send + Sync {
    fn hash(&self, raw: &str) -> AppResult<String>;
    /// False on mismatch and on hashes that cannot be parsed.
    fn verify(&self, raw: &str, hash: &str) -> bool;
}

pub struct Argon2Verifier {
    argon: Argon2<'static>,
}

impl Argon2Verifier {
    pub fn new() -> Self {
        Self { argon: Argon2::default() }
    }
}

impl Default for Argon2Verifier {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialVerifier for Argon2Verifier {
    fn hash(&self, raw: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon
            .hash_password(raw.as_bytes(), &salt)
            .map_err(DomainError::Password)?
            .to_string();
        Ok(hash)
    }

    fn verify(&self, raw: &str, hash: &str) -> bool {
        let parsed = match PasswordHash::new(hash) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(error = %e, "stored password hash does not parse");
                return false;
            }
        };
        self.argon.verify_password(raw.as_bytes(), &parsed).is_ok()
    }
}
