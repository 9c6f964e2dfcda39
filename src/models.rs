use chrono::{DateTime, Utc};
use rocket_db_pools::sqlx::FromRow;
use rocket_okapi::okapi::schemars::{self, JsonSchema};
use serde::{Deserialize, Serialize};

// ===== Accounts =====

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: String,
    pub bio: String,
    pub first_name: String,
    pub last_name: String,
}

// ===== Catalog =====

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, FromRow)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, FromRow)]
pub struct Genre {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, FromRow)]
pub struct Title {
    pub id: i64,
    pub name: String,
    pub year: i16,
    pub description: Option<String>,
    #[serde(rename = "category")]
    pub category_id: Option<i64>,
}

/// Many-to-many link between a title and one of its genres.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, FromRow)]
pub struct GenreTitle {
    pub id: i64,
    #[serde(rename = "title")]
    pub title_id: i64,
    #[serde(rename = "genre")]
    pub genre_id: i64,
}

// ===== Reviews =====

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, FromRow)]
pub struct Review {
    pub id: i64,
    #[serde(rename = "title")]
    pub title_id: i64,
    #[serde(rename = "author")]
    pub author_id: i64,
    pub text: String,
    pub score: i16,
    pub pub_date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, FromRow)]
pub struct Comment {
    pub id: i64,
    #[serde(rename = "review")]
    pub review_id: i64,
    #[serde(rename = "author")]
    pub author_id: i64,
    pub text: String,
    pub pub_date: DateTime<Utc>,
}

// ===== Response Envelopes =====

/// Page metadata attached to every paginated list response.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub page: i64,
    pub size: i64,
    pub total_elements: i64,
    pub total_pages: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub page: PageMeta,
}

impl<T> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, page: i64, size: i64, total_elements: i64) -> Self {
        let total_pages = if total_elements == 0 {
            0
        } else {
            (total_elements + size - 1) / size
        };

        Self {
            data,
            page: PageMeta {
                page,
                size,
                total_elements,
                total_pages,
            },
        }
    }
}
