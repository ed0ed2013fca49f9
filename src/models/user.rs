use serde::Serialize;

use super::InvariantViolation;
use crate::auth::password::{Password, validate_email, validate_password_plaintext};
use crate::entities::users;
use crate::validation::Validator;

pub const MAX_NAME_BYTES: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: i32,
    pub created_at: String,
    pub name: String,
    pub email: String,
    #[serde(skip)]
    pub password: Password,
    pub activated: bool,
    #[serde(skip)]
    pub version: i32,
}

impl From<users::Model> for User {
    fn from(model: users::Model) -> Self {
        Self {
            id: model.id,
            created_at: model.created_at,
            name: model.name,
            email: model.email,
            password: Password::from_hash(model.password_hash),
            activated: model.activated,
            version: model.version,
        }
    }
}

impl User {
    /// A not-yet-persisted, not-yet-activated user. The password still has
    /// to be set before the user can be validated.
    #[must_use]
    pub fn new(name: &str, email: &str) -> Self {
        Self {
            id: 0,
            created_at: String::new(),
            name: name.trim().to_string(),
            email: normalize_email(email),
            password: Password::default(),
            activated: false,
            version: 1,
        }
    }
}

/// Emails are unique regardless of case.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_name(v: &mut Validator, name: &str) {
    v.check(!name.is_empty(), "name", "must be provided");
    v.check(
        name.len() <= MAX_NAME_BYTES,
        "name",
        "must not be more than 500 bytes long",
    );
}

/// Checks on a sign-up request that need no password hash, so a request
/// that is going to be rejected never pays for Argon2.
pub fn validate_registration(v: &mut Validator, user: &User, password: &str) {
    validate_name(v, &user.name);
    validate_email(v, &user.email);
    validate_password_plaintext(v, password);
}

/// Collects client-facing problems in `v`. A user without a password hash
/// is a defect in the caller and is reported separately.
pub fn validate_user(v: &mut Validator, user: &User) -> Result<(), InvariantViolation> {
    validate_name(v, &user.name);
    validate_email(v, &user.email);

    if let Some(plaintext) = user.password.plaintext() {
        validate_password_plaintext(v, plaintext);
    }

    if user.password.hash().is_none() {
        return Err(InvariantViolation::new("missing password hash for user"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::HashParams;

    const TEST_PARAMS: HashParams = HashParams {
        memory_cost_kib: 1024,
        time_cost: 1,
        parallelism: 1,
    };

    #[test]
    fn test_new_user_defaults() {
        let user = User::new("  Alice Smith ", " Alice@Example.COM ");
        assert_eq!(user.name, "Alice Smith");
        assert_eq!(user.email, "alice@example.com");
        assert!(!user.activated);
        assert_eq!(user.version, 1);
    }

    #[test]
    fn test_missing_hash_is_invariant_violation() {
        let user = User::new("Alice", "alice@example.com");
        let mut v = Validator::new();
        assert!(validate_user(&mut v, &user).is_err());
        assert!(v.valid());
    }

    #[test]
    fn test_client_errors_are_collected() {
        let mut user = User::new("", "nope");
        user.password.set("short", TEST_PARAMS).unwrap();

        let mut v = Validator::new();
        validate_user(&mut v, &user).unwrap();

        let errors = v.into_errors();
        assert_eq!(errors["name"], "must be provided");
        assert_eq!(errors["email"], "must be a valid email address");
        assert_eq!(errors["password"], "must be at least 8 bytes long");
    }

    #[test]
    fn test_registration_checks_need_no_hash() {
        let user = User::new("", "nope");
        let mut v = Validator::new();
        validate_registration(&mut v, &user, "short");

        let errors = v.into_errors();
        assert_eq!(errors["name"], "must be provided");
        assert_eq!(errors["email"], "must be a valid email address");
        assert_eq!(errors["password"], "must be at least 8 bytes long");

        let user = User::new("Alice", "alice@example.com");
        let mut v = Validator::new();
        validate_registration(&mut v, &user, "pa55word");
        assert!(v.valid());
    }

    #[test]
    fn test_valid_user() {
        let mut user = User::new("Alice", "alice@example.com");
        user.password.set("pa55word", TEST_PARAMS).unwrap();

        let mut v = Validator::new();
        validate_user(&mut v, &user).unwrap();
        assert!(v.valid());
    }

    #[test]
    fn test_serialization_hides_credentials_and_version() {
        let mut user = User::new("Alice", "alice@example.com");
        user.password.set("pa55word", TEST_PARAMS).unwrap();

        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password").is_none());
        assert!(json.get("version").is_none());
        assert_eq!(json["activated"], false);
    }
}
