use thiserror::Error;

use crate::models::user::User;

/// Who is behind a request once the `Authorization` header has been read.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Identity {
    /// No `Authorization` header. Never activated, holds no permissions.
    #[default]
    Anonymous,
    User(User),
}

impl Identity {
    #[must_use]
    pub const fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous)
    }

    #[must_use]
    pub const fn is_activated(&self) -> bool {
        match self {
            Self::Anonymous => false,
            Self::User(user) => user.activated,
        }
    }

    #[must_use]
    pub const fn user(&self) -> Option<&User> {
        match self {
            Self::Anonymous => None,
            Self::User(user) => Some(user),
        }
    }

    #[must_use]
    pub fn user_id(&self) -> Option<i32> {
        self.user().map(|u| u.id)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BearerError {
    #[error("authorization header is not valid UTF-8")]
    NotUtf8,

    #[error("authorization header must have exactly two parts")]
    WrongShape,

    #[error("unsupported authorization scheme: {0}")]
    UnsupportedScheme(String),
}

/// Extracts the token from `Bearer <token>`. `None` means no header was sent.
pub fn parse_authorization(header: Option<&[u8]>) -> Result<Option<&str>, BearerError> {
    let Some(raw) = header else {
        return Ok(None);
    };
    let value = std::str::from_utf8(raw).map_err(|_| BearerError::NotUtf8)?;

    let parts: Vec<&str> = value.split(' ').collect();
    let [scheme, token] = parts.as_slice() else {
        return Err(BearerError::WrongShape);
    };
    if *scheme != "Bearer" {
        return Err(BearerError::UnsupportedScheme((*scheme).to_string()));
    }

    Ok(Some(token))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_header_is_anonymous() {
        assert_eq!(parse_authorization(None), Ok(None));
        assert!(!Identity::Anonymous.is_activated());
        assert!(Identity::default().is_anonymous());
    }

    #[test]
    fn test_bearer_token_is_extracted() {
        let header: &[u8] = b"Bearer Y3QMGX3PJ3WLRL2YRTQGQ6KRHU";
        assert_eq!(
            parse_authorization(Some(header)),
            Ok(Some("Y3QMGX3PJ3WLRL2YRTQGQ6KRHU"))
        );
    }

    #[test]
    fn test_malformed_headers() {
        assert_eq!(
            parse_authorization(Some(&b"Token xyz"[..])),
            Err(BearerError::UnsupportedScheme("Token".to_string()))
        );
        assert_eq!(
            parse_authorization(Some(&b"bearer xyz"[..])),
            Err(BearerError::UnsupportedScheme("bearer".to_string()))
        );
        for raw in [&b"Bearer"[..], &b"Bearer a b"[..], &b"Bearer  xyz"[..], &b""[..]] {
            assert_eq!(parse_authorization(Some(raw)), Err(BearerError::WrongShape));
        }
        assert_eq!(
            parse_authorization(Some(&[0xff, 0xfe][..])),
            Err(BearerError::NotUtf8)
        );
    }

    #[test]
    fn test_user_identity() {
        let mut user = User::new("Alice", "alice@example.com");
        user.id = 9;
        let identity = Identity::User(user.clone());
        assert!(!identity.is_activated());
        assert_eq!(identity.user_id(), Some(9));

        user.activated = true;
        assert!(Identity::User(user).is_activated());
    }
}
