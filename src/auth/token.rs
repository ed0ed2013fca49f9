//! Opaque bearer tokens.
//!
//! A token is 16 bytes from the OS CSPRNG, handed to the client as unpadded
//! base-32 (always 26 characters). Only the SHA-256 of that plaintext is
//! stored, so the database never holds a usable credential.

use chrono::{DateTime, SecondsFormat, Utc};
use data_encoding::BASE32_NOPAD;
use rand::TryRngCore;
use rand::rngs::OsRng;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::validation::Validator;

const TOKEN_RANDOM_BYTES: usize = 16;

/// Encoded length of [`TOKEN_RANDOM_BYTES`] in unpadded base-32.
pub const TOKEN_PLAINTEXT_LEN: usize = 26;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("secure random source failed: {0}")]
    Entropy(String),

    #[error("unknown token scope: {0}")]
    UnknownScope(String),

    #[error("token lifetime {0} is out of range")]
    Lifetime(chrono::Duration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TokenScope {
    Activation,
    Authentication,
    PasswordReset,
}

impl TokenScope {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Activation => "activation",
            Self::Authentication => "authentication",
            Self::PasswordReset => "password-reset",
        }
    }
}

impl fmt::Display for TokenScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenScope {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "activation" => Ok(Self::Activation),
            "authentication" => Ok(Self::Authentication),
            "password-reset" => Ok(Self::PasswordReset),
            other => Err(TokenError::UnknownScope(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    #[serde(rename = "token")]
    pub plaintext: String,
    #[serde(skip)]
    pub hash: String,
    #[serde(skip)]
    pub user_id: i32,
    pub expiry: DateTime<Utc>,
    #[serde(skip)]
    pub scope: TokenScope,
}

impl Token {
    /// Draws a fresh token for `user_id` that expires `ttl` from now.
    pub fn generate(
        user_id: i32,
        ttl: chrono::Duration,
        scope: TokenScope,
    ) -> Result<Self, TokenError> {
        let mut random_bytes = [0u8; TOKEN_RANDOM_BYTES];
        OsRng
            .try_fill_bytes(&mut random_bytes)
            .map_err(|e| TokenError::Entropy(e.to_string()))?;

        let expiry = Utc::now()
            .checked_add_signed(ttl)
            .ok_or(TokenError::Lifetime(ttl))?;

        let plaintext = BASE32_NOPAD.encode(&random_bytes);
        let hash = hash_plaintext(&plaintext);

        Ok(Self {
            plaintext,
            hash,
            user_id,
            expiry,
            scope,
        })
    }

    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry <= now
    }
}

/// Hex-encoded SHA-256 of the plaintext; the lookup key in storage.
#[must_use]
pub fn hash_plaintext(plaintext: &str) -> String {
    hex::encode(Sha256::digest(plaintext.as_bytes()))
}

/// Fixed-width UTC timestamp so stored expiries compare correctly as text.
#[must_use]
pub fn storage_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn validate_plaintext(v: &mut Validator, plaintext: &str) {
    v.check(!plaintext.is_empty(), "token", "must be provided");
    v.check(
        plaintext.len() == TOKEN_PLAINTEXT_LEN,
        "token",
        "must be 26 bytes long",
    );
}
