//! `SeaORM` implementation of the `AccountService` trait.

use async_trait::async_trait;
use chrono::Utc;
use std::time::Duration;
use tokio::task;
use tracing::{debug, info};

use crate::auth::password::{
    CredentialError, HashParams, Password, validate_email, validate_password_plaintext,
};
use crate::auth::token::{Token, TokenScope, hash_plaintext, validate_plaintext};
use crate::config::SecurityConfig;
use crate::db::{Store, StoreError};
use crate::mailer::{Email, SharedMailer, deliver};
use crate::models::permission::{MOVIES_READ, Permissions, is_known_permission};
use crate::models::user::{User, normalize_email, validate_registration, validate_user};
use crate::services::account_service::{AccountError, AccountService};
use crate::validation::Validator;

pub struct SeaOrmAccountService {
    store: Store,
    mailer: SharedMailer,
    security: SecurityConfig,
    mail_timeout: Duration,
}

impl SeaOrmAccountService {
    #[must_use]
    pub const fn new(
        store: Store,
        mailer: SharedMailer,
        security: SecurityConfig,
        mail_timeout: Duration,
    ) -> Self {
        Self {
            store,
            mailer,
            security,
            mail_timeout,
        }
    }

    fn deadline(&self) -> Duration {
        self.security.store_timeout()
    }

    /// Argon2 is CPU-bound, so it runs on the blocking pool under the
    /// store deadline.
    async fn hash_password(&self, plaintext: &str) -> Result<Password, AccountError> {
        let plaintext = plaintext.to_string();
        let params = HashParams::from(&self.security);

        let job = task::spawn_blocking(move || {
            let mut password = Password::default();
            password.set(&plaintext, params)?;
            Ok::<_, CredentialError>(password)
        });

        match tokio::time::timeout(self.deadline(), job).await {
            Ok(joined) => joined
                .map_err(|e| CredentialError::Hashing(format!("hashing task failed: {e}")))?
                .map_err(AccountError::from),
            Err(_) => Err(StoreError::Timeout {
                operation: "hash_password",
                after: self.deadline(),
            }
            .into()),
        }
    }

    async fn password_matches(&self, user: &User, plaintext: &str) -> Result<bool, AccountError> {
        let password = user.password.clone();
        let plaintext = plaintext.to_string();

        let job = task::spawn_blocking(move || password.matches(&plaintext));

        match tokio::time::timeout(self.deadline(), job).await {
            Ok(joined) => joined
                .map_err(|e| CredentialError::Verification(format!("verify task failed: {e}")))?
                .map_err(AccountError::from),
            Err(_) => Err(StoreError::Timeout {
                operation: "verify_password",
                after: self.deadline(),
            }
            .into()),
        }
    }

    async fn issue_token(
        &self,
        user_id: i32,
        ttl: chrono::Duration,
        scope: TokenScope,
    ) -> Result<Token, AccountError> {
        let token = Token::generate(user_id, ttl, scope)?;
        self.store.insert_token(&token).await?;
        metrics::counter!("tokens_issued_total", "scope" => scope.as_str()).increment(1);
        Ok(token)
    }

    /// User behind a live token of `scope`. A miss is logged as either an
    /// expired or an unknown token; callers see the same outcome for both.
    async fn user_for_token(
        &self,
        scope: TokenScope,
        plaintext: &str,
    ) -> Result<Option<User>, AccountError> {
        let hash = hash_plaintext(plaintext);
        let user = self
            .store
            .get_user_for_token(scope, &hash, Utc::now())
            .await?;

        if user.is_none() {
            let stored = self.store.count_tokens_with_hash(scope, &hash).await?;
            if stored > 0 {
                debug!(scope = %scope, "Expired token presented");
            } else {
                debug!(scope = %scope, "Unknown token presented");
            }
        }

        Ok(user)
    }

    async fn require_user_by_email(&self, email: &str) -> Result<User, AccountError> {
        let mut v = Validator::new();
        validate_email(&mut v, email);
        v.finish()?;

        self.store
            .get_user_by_email(email)
            .await?
            .ok_or_else(|| AccountError::field("email", "no matching email address found"))
    }

    async fn send(&self, recipient: &str, email: Email) {
        deliver(self.mailer.as_ref(), self.mail_timeout, recipient, &email).await;
    }
}

#[async_trait]
impl AccountService for SeaOrmAccountService {
    async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<User, AccountError> {
        let mut user = User::new(name, email);

        let mut v = Validator::new();
        validate_registration(&mut v, &user, password);
        v.finish()?;

        user.password = self.hash_password(password).await?;

        let mut v = Validator::new();
        validate_user(&mut v, &user)?;
        v.finish()?;

        let user = self.store.insert_user(&user).await?;
        self.store
            .add_permissions_for_user(user.id, &[MOVIES_READ])
            .await?;

        let token = self
            .issue_token(user.id, self.security.activation_ttl(), TokenScope::Activation)
            .await?;

        info!(user_id = user.id, "User registered");

        self.send(
            &user.email,
            Email::Welcome {
                user_id: user.id,
                activation_token: token.plaintext,
                expires_in: self.security.activation_ttl(),
            },
        )
        .await;

        Ok(user)
    }

    async fn activate(&self, token_plaintext: &str) -> Result<User, AccountError> {
        let mut v = Validator::new();
        validate_plaintext(&mut v, token_plaintext);
        v.finish()?;

        let mut user = self
            .user_for_token(TokenScope::Activation, token_plaintext)
            .await?
            .ok_or_else(|| AccountError::field("token", "invalid or expired activation token"))?;

        user.activated = true;
        let user = self.store.update_user(&user).await?;

        self.store
            .delete_tokens_for_user(TokenScope::Activation, user.id)
            .await?;

        info!(user_id = user.id, "User activated");
        Ok(user)
    }

    async fn authenticate(&self, token_plaintext: &str) -> Result<User, AccountError> {
        let mut v = Validator::new();
        validate_plaintext(&mut v, token_plaintext);
        if !v.valid() {
            return Err(AccountError::InvalidAuthenticationToken);
        }

        self.user_for_token(TokenScope::Authentication, token_plaintext)
            .await?
            .ok_or(AccountError::InvalidAuthenticationToken)
    }

    async fn permissions_for(&self, user_id: i32) -> Result<Permissions, AccountError> {
        Ok(self.store.get_permissions_for_user(user_id).await?)
    }

    async fn create_authentication_token(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Token, AccountError> {
        let email = normalize_email(email);

        let mut v = Validator::new();
        validate_email(&mut v, &email);
        validate_password_plaintext(&mut v, password);
        v.finish()?;

        let Some(user) = self.store.get_user_by_email(&email).await? else {
            return Err(AccountError::InvalidCredentials);
        };

        if !self.password_matches(&user, password).await? {
            return Err(AccountError::InvalidCredentials);
        }

        if !user.activated {
            return Err(AccountError::InactiveAccount);
        }

        self.issue_token(
            user.id,
            self.security.authentication_ttl(),
            TokenScope::Authentication,
        )
        .await
    }

    async fn create_activation_token(&self, email: &str) -> Result<(), AccountError> {
        let user = self.require_user_by_email(&normalize_email(email)).await?;

        if user.activated {
            return Err(AccountError::field("email", "user has already been activated"));
        }

        self.store
            .delete_tokens_for_user(TokenScope::Activation, user.id)
            .await?;

        let token = self
            .issue_token(user.id, self.security.activation_ttl(), TokenScope::Activation)
            .await?;

        self.send(
            &user.email,
            Email::ActivationToken {
                activation_token: token.plaintext,
                expires_in: self.security.activation_ttl(),
            },
        )
        .await;

        Ok(())
    }

    async fn create_password_reset_token(&self, email: &str) -> Result<(), AccountError> {
        let user = self.require_user_by_email(&normalize_email(email)).await?;

        if !user.activated {
            return Err(AccountError::field("email", "user account must be activated"));
        }

        let token = self
            .issue_token(
                user.id,
                self.security.password_reset_ttl(),
                TokenScope::PasswordReset,
            )
            .await?;

        self.send(
            &user.email,
            Email::PasswordReset {
                password_reset_token: token.plaintext,
                expires_in: self.security.password_reset_ttl(),
            },
        )
        .await;

        Ok(())
    }

    async fn reset_password(
        &self,
        token_plaintext: &str,
        password: &str,
    ) -> Result<(), AccountError> {
        let mut v = Validator::new();
        validate_password_plaintext(&mut v, password);
        validate_plaintext(&mut v, token_plaintext);
        v.finish()?;

        let mut user = self
            .user_for_token(TokenScope::PasswordReset, token_plaintext)
            .await?
            .ok_or_else(|| {
                AccountError::field("token", "invalid or expired password reset token")
            })?;

        user.password = self.hash_password(password).await?;
        let user = self.store.update_user(&user).await?;

        for scope in [TokenScope::PasswordReset, TokenScope::Authentication] {
            self.store.delete_tokens_for_user(scope, user.id).await?;
        }

        info!(user_id = user.id, "Password reset");
        Ok(())
    }

    async fn grant_permission(&self, email: &str, code: &str) -> Result<u64, AccountError> {
        if !is_known_permission(code) {
            return Err(AccountError::field("permission", "unknown permission code"));
        }

        let user = self
            .store
            .get_user_by_email(&normalize_email(email))
            .await?
            .ok_or(AccountError::UserNotFound)?;

        let added = self.store.add_permissions_for_user(user.id, &[code]).await?;
        info!(user_id = user.id, permission = code, added, "Permission granted");
        Ok(added)
    }

    async fn purge_expired_tokens(&self) -> Result<u64, AccountError> {
        let removed = self.store.purge_expired_tokens(Utc::now()).await?;
        info!(removed, "Expired tokens purged");
        Ok(removed)
    }
}
