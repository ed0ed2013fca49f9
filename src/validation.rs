//! Field-level validation shared by the models and the API layer.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Map of field name to the first failure message recorded for it.
pub type FieldErrors = BTreeMap<String, String>;

static EMAIL_RX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
    )
    .expect("email pattern compiles")
});

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Validator {
    errors: FieldErrors,
}

impl Validator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Records `message` for `key` unless the field already has an error.
    pub fn add_error(&mut self, key: &str, message: &str) {
        self.errors
            .entry(key.to_string())
            .or_insert_with(|| message.to_string());
    }

    pub fn check(&mut self, ok: bool, key: &str, message: &str) {
        if !ok {
            self.add_error(key, message);
        }
    }

    #[must_use]
    pub const fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    #[must_use]
    pub fn into_errors(self) -> FieldErrors {
        self.errors
    }

    /// `Ok(())` when no check failed, otherwise the collected field errors.
    pub fn finish(self) -> Result<(), FieldErrors> {
        if self.valid() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

#[must_use]
pub fn is_email(value: &str) -> bool {
    EMAIL_RX.is_match(value)
}

#[must_use]
pub fn is_permitted_value<T: PartialEq>(value: &T, permitted: &[T]) -> bool {
    permitted.contains(value)
}

#[must_use]
pub fn is_unique<T: Ord>(values: &[T]) -> bool {
    let mut seen = std::collections::BTreeSet::new();
    values.iter().all(|v| seen.insert(v))
}
