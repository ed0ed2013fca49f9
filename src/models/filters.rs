use serde::Serialize;

use super::InvariantViolation;
use crate::validation::{Validator, is_permitted_value};

pub const MAX_PAGE: u64 = 10_000_000;
pub const MAX_PAGE_SIZE: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Paging and ordering requested by a listing endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filters {
    pub page: u64,
    pub page_size: u64,
    pub sort: String,
    pub sort_safelist: &'static [&'static str],
}

impl Filters {
    #[must_use]
    pub const fn new(sort_safelist: &'static [&'static str]) -> Self {
        Self {
            page: 1,
            page_size: 20,
            sort: String::new(),
            sort_safelist,
        }
    }

    /// Column named by `sort`, without the direction prefix.
    ///
    /// Only reachable with an unvalidated sort value, which is a caller bug.
    pub fn sort_column(&self) -> Result<&str, InvariantViolation> {
        let sort = if self.sort.is_empty() { "id" } else { &self.sort };
        if self.sort_safelist.contains(&sort) {
            return Ok(sort.trim_start_matches('-'));
        }
        Err(InvariantViolation::new(format!("unsafe sort parameter: {sort}")))
    }

    #[must_use]
    pub fn sort_direction(&self) -> SortDirection {
        if self.sort.starts_with('-') {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        }
    }

    #[must_use]
    pub const fn limit(&self) -> u64 {
        self.page_size
    }

    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.page.saturating_sub(1) * self.page_size
    }
}

pub fn validate_filters(v: &mut Validator, f: &Filters) {
    v.check(f.page > 0, "page", "must be greater than zero");
    v.check(
        f.page <= MAX_PAGE,
        "page",
        "must be a maximum of 10 million",
    );
    v.check(f.page_size > 0, "page_size", "must be greater than zero");
    v.check(
        f.page_size <= MAX_PAGE_SIZE,
        "page_size",
        "must be a maximum of 100",
    );

    let sort = if f.sort.is_empty() { "id" } else { f.sort.as_str() };
    v.check(
        is_permitted_value(&sort, f.sort_safelist),
        "sort",
        "invalid sort value",
    );
}

/// Pagination summary returned beside a page of results. Empty when there
/// are no records at all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Metadata {
    #[serde(skip_serializing_if = "is_zero")]
    pub current_page: u64,
    #[serde(skip_serializing_if = "is_zero")]
    pub page_size: u64,
    #[serde(skip_serializing_if = "is_zero")]
    pub first_page: u64,
    #[serde(skip_serializing_if = "is_zero")]
    pub last_page: u64,
    #[serde(skip_serializing_if = "is_zero")]
    pub total_records: u64,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_zero(value: &u64) -> bool {
    *value == 0
}

impl Metadata {
    #[must_use]
    pub const fn calculate(total_records: u64, page: u64, page_size: u64) -> Self {
        if total_records == 0 || page_size == 0 {
            return Self {
                current_page: 0,
                page_size: 0,
                first_page: 0,
                last_page: 0,
                total_records: 0,
            };
        }

        Self {
            current_page: page,
            page_size,
            first_page: 1,
            last_page: total_records.div_ceil(page_size),
            total_records,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAFELIST: &[&str] = &["id", "title", "-id", "-title"];

    fn filters(page: u64, page_size: u64, sort: &str) -> Filters {
        Filters {
            page,
            page_size,
            sort: sort.to_string(),
            sort_safelist: SAFELIST,
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        let mut v = Validator::new();
        validate_filters(&mut v, &Filters::new(SAFELIST));
        assert!(v.valid());
    }

    #[test]
    fn test_out_of_range_paging() {
        let mut v = Validator::new();
        validate_filters(&mut v, &filters(0, 101, "id"));
        assert_eq!(v.errors()["page"], "must be greater than zero");
        assert_eq!(v.errors()["page_size"], "must be a maximum of 100");

        let mut v = Validator::new();
        validate_filters(&mut v, &filters(MAX_PAGE + 1, 0, "id"));
        assert_eq!(v.errors()["page"], "must be a maximum of 10 million");
        assert_eq!(v.errors()["page_size"], "must be greater than zero");
    }

    #[test]
    fn test_sort_safelist() {
        let mut v = Validator::new();
        validate_filters(&mut v, &filters(1, 20, "password_hash"));
        assert_eq!(v.errors()["sort"], "invalid sort value");

        let f = filters(1, 20, "-title");
        assert_eq!(f.sort_column().unwrap(), "title");
        assert_eq!(f.sort_direction(), SortDirection::Desc);

        let f = filters(1, 20, "");
        assert_eq!(f.sort_column().unwrap(), "id");
        assert_eq!(f.sort_direction(), SortDirection::Asc);
    }

    #[test]
    fn test_unsafe_sort_column_is_invariant_violation() {
        let f = filters(1, 20, "1; DROP TABLE movies");
        assert!(f.sort_column().is_err());
    }

    #[test]
    fn test_limit_offset() {
        let f = filters(3, 25, "id");
        assert_eq!(f.limit(), 25);
        assert_eq!(f.offset(), 50);
    }

    #[test]
    fn test_metadata() {
        assert_eq!(Metadata::calculate(0, 1, 20), Metadata::default());

        let meta = Metadata::calculate(41, 2, 20);
        assert_eq!(meta.first_page, 1);
        assert_eq!(meta.last_page, 3);
        assert_eq!(meta.current_page, 2);
        assert_eq!(meta.total_records, 41);

        let json = serde_json::to_value(Metadata::default()).unwrap();
        assert_eq!(json, serde_json::json!({}));
    }
}
