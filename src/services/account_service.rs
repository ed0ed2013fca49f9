//! Domain service for user accounts and the tokens issued to them.
//!
//! Covers registration, activation, bearer-token issuance and lookup,
//! password resets and permission grants.

use thiserror::Error;

use crate::auth::password::CredentialError;
use crate::auth::token::{Token, TokenError};
use crate::db::StoreError;
use crate::models::InvariantViolation;
use crate::models::permission::Permissions;
use crate::models::user::User;
use crate::validation::FieldErrors;

/// Errors specific to account operations.
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Validation failed: {0:?}")]
    Validation(FieldErrors),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid or missing authentication token")]
    InvalidAuthenticationToken,

    #[error("User account is not activated")]
    InactiveAccount,

    #[error("User not found")]
    UserNotFound,

    #[error("Edit conflict")]
    EditConflict,

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Store(StoreError),

    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
}

impl AccountError {
    pub fn field(key: &str, message: &str) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(key.to_string(), message.to_string());
        Self::Validation(errors)
    }
}

impl From<StoreError> for AccountError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::EditConflict => Self::EditConflict,
            StoreError::DuplicateEmail => {
                Self::field("email", "a user with this email address already exists")
            }
            StoreError::Invariant(violation) => Self::Invariant(violation),
            other => Self::Store(other),
        }
    }
}

impl From<FieldErrors> for AccountError {
    fn from(errors: FieldErrors) -> Self {
        Self::Validation(errors)
    }
}

/// Domain service trait for accounts.
#[async_trait::async_trait]
pub trait AccountService: Send + Sync {
    /// Creates an inactive user holding `movies:read` and mails an
    /// activation token to it.
    ///
    /// # Errors
    ///
    /// Returns [`AccountError::Validation`] for bad input or a taken email.
    async fn register(&self, name: &str, email: &str, password: &str)
    -> Result<User, AccountError>;

    /// Consumes an activation token. Every activation token of the user is
    /// deleted afterwards.
    async fn activate(&self, token_plaintext: &str) -> Result<User, AccountError>;

    /// Resolves a bearer token presented on a request.
    ///
    /// # Errors
    ///
    /// Returns [`AccountError::InvalidAuthenticationToken`] whether the
    /// token is malformed, unknown or expired.
    async fn authenticate(&self, token_plaintext: &str) -> Result<User, AccountError>;

    /// Permission codes currently held by the user.
    async fn permissions_for(&self, user_id: i32) -> Result<Permissions, AccountError>;

    /// Exchanges email and password for an authentication token. Only
    /// activated users are served.
    async fn create_authentication_token(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Token, AccountError>;

    /// Issues a fresh activation token, superseding older ones.
    async fn create_activation_token(&self, email: &str) -> Result<(), AccountError>;

    async fn create_password_reset_token(&self, email: &str) -> Result<(), AccountError>;

    /// Sets a new password. All password-reset and authentication tokens
    /// of the user are revoked.
    async fn reset_password(&self, token_plaintext: &str, password: &str)
    -> Result<(), AccountError>;

    /// Grants a known permission code to the user with `email`.
    async fn grant_permission(&self, email: &str, code: &str) -> Result<u64, AccountError>;

    /// Deletes every expired token. Returns the number removed.
    async fn purge_expired_tokens(&self) -> Result<u64, AccountError>;
}
