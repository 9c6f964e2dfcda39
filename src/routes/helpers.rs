//! Shared helper functions for Rocket route handlers.

use crate::db::YamdbDb;
use crate::error::ApiError;
use rocket_db_pools::{Connection, sqlx};

/// Confirm a title exists.
///
/// Returns [`ApiError::NotFound`] when it does not.
pub async fn ensure_title_exists(title_id: i64, db: &mut Connection<YamdbDb>) -> Result<(), ApiError> {
    let found: Option<i64> = sqlx::query_scalar("SELECT id FROM titles WHERE id = $1")
        .bind(title_id)
        .fetch_optional(&mut ***db)
        .await?;

    found
        .map(|_| ())
        .ok_or_else(|| ApiError::NotFound(format!("Title {title_id} not found")))
}

/// Confirm a review exists and belongs to the given title.
pub async fn ensure_review_in_title(
    title_id: i64,
    review_id: i64,
    db: &mut Connection<YamdbDb>,
) -> Result<(), ApiError> {
    ensure_title_exists(title_id, db).await?;

    let found: Option<i64> =
        sqlx::query_scalar("SELECT id FROM reviews WHERE id = $1 AND title_id = $2")
            .bind(review_id)
            .bind(title_id)
            .fetch_optional(&mut ***db)
            .await?;

    found
        .map(|_| ())
        .ok_or_else(|| ApiError::NotFound(format!("Review {review_id} not found for title {title_id}")))
}
