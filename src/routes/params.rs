//! Query parameter helpers shared by the list endpoints.
//!
//! The types follow Rocket's `FromForm` conventions and derive `JsonSchema`
//! so the generated OpenAPI document lists the parameters and their defaults.

use rocket::form::{self, FromFormField, ValueField};
use rocket_okapi::okapi::schemars::{self, JsonSchema};
use serde::{Deserialize, Serialize};

const fn default_page() -> i64 {
    1
}

const fn default_page_size() -> i64 {
    50
}

const MAX_PAGE_SIZE: i64 = 100;

fn default_sort_order() -> SortOrder {
    SortOrder::Desc
}

/// Sort direction applied to publication dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Oldest first.
    Asc,
    /// Newest first.
    #[default]
    Desc,
}

impl SortOrder {
    /// Render the sort order as a SQL keyword.
    pub fn sql_keyword(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

impl<'r> FromFormField<'r> for SortOrder {
    fn from_value(field: ValueField<'r>) -> form::Result<'r, Self> {
        match field.value.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(form::Error::validation(format!(
                "invalid sort order '{other}'; expected 'asc' or 'desc'"
            ))
            .into()),
        }
    }
}

/// Pagination and ordering for review and comment listings.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, rocket::form::FromForm)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    /// One-based page index (defaults to the first page).
    #[field(default = 1)]
    #[serde(default = "default_page")]
    pub page: i64,
    /// Number of items per page (clamped between 1 and 100, default 50).
    #[field(default = 50)]
    #[serde(default = "default_page_size")]
    pub size: i64,
    /// Publication date ordering (defaults to newest first).
    #[field(default = SortOrder::Desc)]
    #[serde(default = "default_sort_order")]
    pub order: SortOrder,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            page: default_page(),
            size: default_page_size(),
            order: default_sort_order(),
        }
    }
}

impl ListParams {
    /// Normalized 1-based page index.
    pub fn page(&self) -> i64 {
        self.page.max(1)
    }

    /// Normalized page size capped at [`MAX_PAGE_SIZE`].
    pub fn size(&self) -> i64 {
        self.size.clamp(1, MAX_PAGE_SIZE)
    }

    /// Row offset of the first item on the requested page, saturating for
    /// page numbers past the end of any table.
    pub fn offset(&self) -> i64 {
        (self.page() - 1).saturating_mul(self.size())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_and_size_are_normalized() {
        let params = ListParams {
            page: 0,
            size: 500,
            order: SortOrder::Asc,
        };
        assert_eq!(params.page(), 1);
        assert_eq!(params.size(), MAX_PAGE_SIZE);
        assert_eq!(params.offset(), 0);

        let params = ListParams {
            page: 3,
            size: 20,
            ..ListParams::default()
        };
        assert_eq!(params.offset(), 40);
        assert_eq!(params.order.sql_keyword(), "DESC");
    }

    #[test]
    fn huge_page_number_does_not_overflow_offset() {
        let params = ListParams {
            page: i64::MAX,
            size: 50,
            ..ListParams::default()
        };
        assert_eq!(params.offset(), i64::MAX);
    }
}
