//! Comment endpoints nested under a title's reviews.

use crate::db::YamdbDb;
use crate::error::ApiError;
use crate::models::{Comment, PaginatedResponse};
use crate::routes::{helpers::ensure_review_in_title, params::ListParams};
use rocket::{get, serde::json::Json};
use rocket_db_pools::{Connection, sqlx};
use rocket_okapi::openapi;

/// List the comments on a review.
#[openapi(tag = "Comments")]
#[get("/titles/<title_id>/reviews/<review_id>/comments?<params..>")]
pub async fn list_comments(
    title_id: i64,
    review_id: i64,
    mut db: Connection<YamdbDb>,
    params: Option<ListParams>,
) -> Result<Json<PaginatedResponse<Comment>>, ApiError> {
    let params = params.unwrap_or_default();
    ensure_review_in_title(title_id, review_id, &mut db).await?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE review_id = $1")
        .bind(review_id)
        .fetch_one(&mut **db)
        .await?;

    let comments = sqlx::query_as::<_, Comment>(&format!(
        r#"SELECT id, review_id, author_id, text, pub_date
           FROM comments
           WHERE review_id = $1
           ORDER BY pub_date {}, id {}
           LIMIT $2 OFFSET $3"#,
        params.order.sql_keyword(),
        params.order.sql_keyword()
    ))
    .bind(review_id)
    .bind(params.size())
    .bind(params.offset())
    .fetch_all(&mut **db)
    .await?;

    Ok(Json(PaginatedResponse::new(
        comments,
        params.page(),
        params.size(),
        total,
    )))
}

/// Retrieve one comment on a review.
#[openapi(tag = "Comments")]
#[get("/titles/<title_id>/reviews/<review_id>/comments/<comment_id>")]
pub async fn get_comment(
    title_id: i64,
    review_id: i64,
    comment_id: i64,
    mut db: Connection<YamdbDb>,
) -> Result<Json<Comment>, ApiError> {
    ensure_review_in_title(title_id, review_id, &mut db).await?;

    let comment = sqlx::query_as::<_, Comment>(
        r#"SELECT id, review_id, author_id, text, pub_date
           FROM comments
           WHERE id = $1 AND review_id = $2"#,
    )
    .bind(comment_id)
    .bind(review_id)
    .fetch_optional(&mut **db)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("Comment {comment_id} not found for review {review_id}")))?;

    Ok(Json(comment))
}
