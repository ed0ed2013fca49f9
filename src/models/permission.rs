use serde::Serialize;
use std::collections::BTreeSet;

pub const MOVIES_READ: &str = "movies:read";
pub const MOVIES_WRITE: &str = "movies:write";

/// Every permission code the migration seeds.
pub const ALL_PERMISSIONS: [&str; 2] = [MOVIES_READ, MOVIES_WRITE];

/// Permission codes held by a single user, loaded fresh for each request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Permissions(BTreeSet<String>);

impl Permissions {
    #[must_use]
    pub fn include(&self, code: &str) -> bool {
        self.0.contains(code)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for Permissions {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

#[must_use]
pub fn is_known_permission(code: &str) -> bool {
    ALL_PERMISSIONS.contains(&code)
}
