//! Review endpoints nested under titles.

use crate::db::YamdbDb;
use crate::error::ApiError;
use crate::models::{PaginatedResponse, Review};
use crate::routes::{helpers::ensure_title_exists, params::ListParams};
use rocket::{get, serde::json::Json};
use rocket_db_pools::{Connection, sqlx};
use rocket_okapi::openapi;

/// List the reviews of a title, newest first by default.
#[openapi(tag = "Reviews")]
#[get("/titles/<title_id>/reviews?<params..>")]
pub async fn list_reviews(
    title_id: i64,
    mut db: Connection<YamdbDb>,
    params: Option<ListParams>,
) -> Result<Json<PaginatedResponse<Review>>, ApiError> {
    let params = params.unwrap_or_default();
    ensure_title_exists(title_id, &mut db).await?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reviews WHERE title_id = $1")
        .bind(title_id)
        .fetch_one(&mut **db)
        .await?;

    let reviews = sqlx::query_as::<_, Review>(&format!(
        r#"SELECT id, title_id, author_id, text, score, pub_date
           FROM reviews
           WHERE title_id = $1
           ORDER BY pub_date {}, id {}
           LIMIT $2 OFFSET $3"#,
        params.order.sql_keyword(),
        params.order.sql_keyword()
    ))
    .bind(title_id)
    .bind(params.size())
    .bind(params.offset())
    .fetch_all(&mut **db)
    .await?;

    Ok(Json(PaginatedResponse::new(
        reviews,
        params.page(),
        params.size(),
        total,
    )))
}

/// Retrieve one review of a title.
#[openapi(tag = "Reviews")]
#[get("/titles/<title_id>/reviews/<review_id>")]
pub async fn get_review(
    title_id: i64,
    review_id: i64,
    mut db: Connection<YamdbDb>,
) -> Result<Json<Review>, ApiError> {
    ensure_title_exists(title_id, &mut db).await?;

    let review = sqlx::query_as::<_, Review>(
        r#"SELECT id, title_id, author_id, text, score, pub_date
           FROM reviews
           WHERE id = $1 AND title_id = $2"#,
    )
    .bind(review_id)
    .bind(title_id)
    .fetch_optional(&mut **db)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("Review {review_id} not found for title {title_id}")))?;

    Ok(Json(review))
}
