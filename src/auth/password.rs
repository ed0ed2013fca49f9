//! Password credential: Argon2id hashing and constant-time verification.
//!
//! Hashing is CPU-bound; callers on the async runtime go through
//! `tokio::task::spawn_blocking` (see `services::account_service_impl`).

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{
        self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng,
    },
};
use thiserror::Error;

use crate::config::SecurityConfig;
use crate::validation::Validator;

pub const MIN_PASSWORD_BYTES: usize = 8;
pub const MAX_PASSWORD_BYTES: usize = 72;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("failed to hash password: {0}")]
    Hashing(String),

    #[error("stored password hash is malformed: {0}")]
    MalformedHash(String),

    #[error("password verification failed: {0}")]
    Verification(String),

    #[error("user has no password hash")]
    MissingHash,
}

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashParams {
    pub memory_cost_kib: u32,
    pub time_cost: u32,
    pub parallelism: u32,
}

impl From<&SecurityConfig> for HashParams {
    fn from(cfg: &SecurityConfig) -> Self {
        Self {
            memory_cost_kib: cfg.argon2_memory_cost_kib,
            time_cost: cfg.argon2_time_cost,
            parallelism: cfg.argon2_parallelism,
        }
    }
}

impl HashParams {
    fn hasher(self) -> Result<Argon2<'static>, CredentialError> {
        let params = Params::new(self.memory_cost_kib, self.time_cost, self.parallelism, None)
            .map_err(|e| CredentialError::Hashing(format!("invalid Argon2 params: {e}")))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

/// Hash plus, while a request is being handled, the plaintext it came from.
///
/// The plaintext is never persisted; it only exists so the same request can
/// validate it after calling [`Password::set`].
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Password {
    plaintext: Option<String>,
    hash: Option<String>,
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Password")
            .field("plaintext", &self.plaintext.as_ref().map(|_| "<redacted>"))
            .field("hash", &self.hash.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Password {
    #[must_use]
    pub const fn from_hash(hash: String) -> Self {
        Self {
            plaintext: None,
            hash: Some(hash),
        }
    }

    pub fn set(&mut self, plaintext: &str, params: HashParams) -> Result<(), CredentialError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = params
            .hasher()?
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|e| CredentialError::Hashing(e.to_string()))?;

        self.plaintext = Some(plaintext.to_string());
        self.hash = Some(hash.to_string());
        Ok(())
    }

    /// `Ok(false)` only for a genuine mismatch. Anything else wrong with the
    /// stored hash is an error so it can surface as a server fault.
    pub fn matches(&self, plaintext: &str) -> Result<bool, CredentialError> {
        let stored = self.hash.as_deref().ok_or(CredentialError::MissingHash)?;
        let parsed =
            PasswordHash::new(stored).map_err(|e| CredentialError::MalformedHash(e.to_string()))?;

        // Parameters come from the PHC string, not from the current config.
        match Argon2::default().verify_password(plaintext.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => Err(CredentialError::Verification(e.to_string())),
        }
    }

    #[must_use]
    pub fn plaintext(&self) -> Option<&str> {
        self.plaintext.as_deref()
    }

    #[must_use]
    pub fn hash(&self) -> Option<&str> {
        self.hash.as_deref()
    }
}

pub fn validate_email(v: &mut Validator, email: &str) {
    v.check(!email.is_empty(), "email", "must be provided");
    v.check(
        crate::validation::is_email(email),
        "email",
        "must be a valid email address",
    );
}

pub fn validate_password_plaintext(v: &mut Validator, password: &str) {
    v.check(!password.is_empty(), "password", "must be provided");
    v.check(
        password.len() >= MIN_PASSWORD_BYTES,
        "password",
        "must be at least 8 bytes long",
    );
    v.check(
        password.len() <= MAX_PASSWORD_BYTES,
        "password",
        "must not be more than 72 bytes long",
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    // Cheap parameters keep the unit tests fast.
    const TEST_PARAMS: HashParams = HashParams {
        memory_cost_kib: 1024,
        time_cost: 1,
        parallelism: 1,
    };

    #[test]
    fn test_set_then_matches() {
        let longest = "x".repeat(MAX_PASSWORD_BYTES);
        for plaintext in ["pa55word", "correct horse battery staple", longest.as_str()] {
            let mut password = Password::default();
            password.set(plaintext, TEST_PARAMS).unwrap();

            assert_eq!(password.plaintext(), Some(plaintext));
            assert!(password.hash().unwrap().starts_with("$argon2id$"));
            assert!(password.matches(plaintext).unwrap());
            assert!(!password.matches("not-the-password").unwrap());
        }
    }

    #[test]
    fn test_from_hash_has_no_plaintext() {
        let mut source = Password::default();
        source.set("pa55word", TEST_PARAMS).unwrap();

        let stored = Password::from_hash(source.hash().unwrap().to_string());
        assert!(stored.plaintext().is_none());
        assert!(stored.matches("pa55word").unwrap());
    }

    #[test]
    fn test_malformed_hash_is_an_error_not_a_mismatch() {
        let password = Password::from_hash("definitely-not-phc".to_string());
        assert!(matches!(
            password.matches("pa55word"),
            Err(CredentialError::MalformedHash(_))
        ));
    }

    #[test]
    fn test_missing_hash_is_an_error() {
        let password = Password::default();
        assert!(matches!(
            password.matches("pa55word"),
            Err(CredentialError::MissingHash)
        ));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let mut password = Password::default();
        password.set("pa55word", TEST_PARAMS).unwrap();
        let debug = format!("{password:?}");
        assert!(!debug.contains("pa55word"));
        assert!(!debug.contains("argon2id"));
    }

    #[test]
    fn test_password_length_rules() {
        let mut v = Validator::new();
        validate_password_plaintext(&mut v, "short");
        assert_eq!(v.errors()["password"], "must be at least 8 bytes long");

        let mut v = Validator::new();
        validate_password_plaintext(&mut v, &"y".repeat(73));
        assert_eq!(v.errors()["password"], "must not be more than 72 bytes long");

        let mut v = Validator::new();
        validate_password_plaintext(&mut v, "pa55word");
        assert!(v.valid());
    }

    #[test]
    fn test_email_rules() {
        let mut v = Validator::new();
        validate_email(&mut v, "");
        assert_eq!(v.errors()["email"], "must be provided");

        let mut v = Validator::new();
        validate_email(&mut v, "not-an-email");
        assert_eq!(v.errors()["email"], "must be a valid email address");
    }
}
