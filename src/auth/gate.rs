//! Admission checks applied before a handler runs.
//!
//! Both checks are plain functions over an [`Identity`] so they can be used
//! outside of the HTTP layer; `api::auth` turns them into middleware.

use thiserror::Error;

use super::identity::Identity;
use crate::models::permission::Permissions;
use crate::models::user::User;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GateError {
    #[error("authentication required")]
    AuthenticationRequired,

    #[error("user account is not activated")]
    InactiveAccount,

    #[error("missing permission: {0}")]
    NotPermitted(String),
}

/// Anonymous callers fail with 401, inactive users with 403.
pub fn require_activated(identity: &Identity) -> Result<&User, GateError> {
    match identity {
        Identity::Anonymous => Err(GateError::AuthenticationRequired),
        Identity::User(user) if !user.activated => Err(GateError::InactiveAccount),
        Identity::User(user) => Ok(user),
    }
}

/// Every code in `required` must be held.
pub fn require_permissions(held: &Permissions, required: &[&str]) -> Result<(), GateError> {
    match required.iter().find(|code| !held.include(code)) {
        Some(missing) => Err(GateError::NotPermitted((*missing).to_string())),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::permission::{MOVIES_READ, MOVIES_WRITE};

    fn user(activated: bool) -> User {
        let mut user = User::new("Alice", "alice@example.com");
        user.id = 1;
        user.activated = activated;
        user
    }

    #[test]
    fn test_anonymous_needs_authentication() {
        assert_eq!(
            require_activated(&Identity::Anonymous),
            Err(GateError::AuthenticationRequired)
        );
    }

    #[test]
    fn test_inactive_user_is_forbidden() {
        assert_eq!(
            require_activated(&Identity::User(user(false))),
            Err(GateError::InactiveAccount)
        );
    }

    #[test]
    fn test_activated_user_passes() {
        let identity = Identity::User(user(true));
        assert_eq!(require_activated(&identity).map(|u| u.id), Ok(1));
    }

    #[test]
    fn test_all_codes_required() {
        let held: Permissions = [MOVIES_READ].into_iter().collect();
        assert!(require_permissions(&held, &[MOVIES_READ]).is_ok());
        assert!(require_permissions(&held, &[]).is_ok());
        assert_eq!(
            require_permissions(&held, &[MOVIES_READ, MOVIES_WRITE]),
            Err(GateError::NotPermitted(MOVIES_WRITE.to_string()))
        );
        assert!(require_permissions(&Permissions::default(), &[MOVIES_READ]).is_err());
    }
}
