//! PostgreSQL-backed entity store.
//!
//! Each batch is written with a single `INSERT ... SELECT FROM UNNEST(...)`
//! statement inside its own transaction, so a constraint violation anywhere in
//! the batch leaves the table untouched. After a successful insert the table's
//! identity sequence is moved past the loaded ids.

use super::error::StoreError;
use super::resolve::Entity;
use super::schema::EntityKind;
use super::store::EntityStore;
use chrono::{DateTime, Utc};
use rocket_db_pools::sqlx::{self, PgConnection, PgPool};
use std::collections::HashSet;

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[rocket::async_trait]
impl EntityStore for PgStore {
    async fn existing_ids(&self, kind: EntityKind) -> Result<HashSet<i64>, StoreError> {
        let ids: Vec<i64> = sqlx::query_scalar(&format!("SELECT id FROM {}", kind.table()))
            .fetch_all(&self.pool)
            .await?;

        log::trace!("{} existing ids in {}", ids.len(), kind.table());
        Ok(ids.into_iter().collect())
    }

    async fn insert_batch(&self, kind: EntityKind, entities: &[Entity]) -> Result<u64, StoreError> {
        if entities.is_empty() {
            return Ok(0);
        }

        if let Some(stray) = entities.iter().find(|entity| entity.kind() != kind) {
            return Err(StoreError::IntegrityViolation(format!(
                "{} entity in a {} batch",
                stray.kind(),
                kind
            )));
        }

        let mut tx = self.pool.begin().await?;

        let inserted = match kind {
            EntityKind::User => insert_users(&mut tx, entities).await?,
            EntityKind::Category | EntityKind::Genre => {
                insert_named_slugs(&mut tx, kind, entities).await?
            }
            EntityKind::Title => insert_titles(&mut tx, entities).await?,
            EntityKind::GenreTitle => insert_genre_titles(&mut tx, entities).await?,
            EntityKind::Review => insert_reviews(&mut tx, entities).await?,
            EntityKind::Comment => insert_comments(&mut tx, entities).await?,
        };

        reset_identity(&mut tx, kind).await?;
        tx.commit().await?;

        log::debug!("bulk inserted {} rows into {}", inserted, kind.table());
        Ok(inserted)
    }
}

async fn insert_users(conn: &mut PgConnection, entities: &[Entity]) -> Result<u64, sqlx::Error> {
    let mut ids = Vec::with_capacity(entities.len());
    let mut usernames = Vec::with_capacity(entities.len());
    let mut emails = Vec::with_capacity(entities.len());
    let mut roles = Vec::with_capacity(entities.len());
    let mut bios = Vec::with_capacity(entities.len());
    let mut first_names = Vec::with_capacity(entities.len());
    let mut last_names = Vec::with_capacity(entities.len());

    for entity in entities {
        if let Entity::User(user) = entity {
            ids.push(user.id);
            usernames.push(user.username.as_str());
            emails.push(user.email.as_str());
            roles.push(user.role.as_str());
            bios.push(user.bio.as_str());
            first_names.push(user.first_name.as_str());
            last_names.push(user.last_name.as_str());
        }
    }

    let result = sqlx::query(
        r#"INSERT INTO users (id, username, email, role, bio, first_name, last_name)
           SELECT * FROM UNNEST(
               $1::bigint[], $2::text[], $3::text[], $4::text[],
               $5::text[], $6::text[], $7::text[]
           )"#,
    )
    .bind(&ids)
    .bind(&usernames)
    .bind(&emails)
    .bind(&roles)
    .bind(&bios)
    .bind(&first_names)
    .bind(&last_names)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

/// Categories and genres share the `(id, name, slug)` layout.
async fn insert_named_slugs(
    conn: &mut PgConnection,
    kind: EntityKind,
    entities: &[Entity],
) -> Result<u64, sqlx::Error> {
    let mut ids = Vec::with_capacity(entities.len());
    let mut names = Vec::with_capacity(entities.len());
    let mut slugs = Vec::with_capacity(entities.len());

    for entity in entities {
        let (id, name, slug) = match entity {
            Entity::Category(category) => (category.id, &category.name, &category.slug),
            Entity::Genre(genre) => (genre.id, &genre.name, &genre.slug),
            _ => continue,
        };
        ids.push(id);
        names.push(name.as_str());
        slugs.push(slug.as_str());
    }

    let result = sqlx::query(&format!(
        r#"INSERT INTO {} (id, name, slug)
           SELECT * FROM UNNEST($1::bigint[], $2::text[], $3::text[])"#,
        kind.table()
    ))
    .bind(&ids)
    .bind(&names)
    .bind(&slugs)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

async fn insert_titles(conn: &mut PgConnection, entities: &[Entity]) -> Result<u64, sqlx::Error> {
    let mut ids = Vec::with_capacity(entities.len());
    let mut names = Vec::with_capacity(entities.len());
    let mut years: Vec<i16> = Vec::with_capacity(entities.len());
    let mut descriptions: Vec<Option<&str>> = Vec::with_capacity(entities.len());
    let mut category_ids: Vec<Option<i64>> = Vec::with_capacity(entities.len());

    for entity in entities {
        if let Entity::Title(title) = entity {
            ids.push(title.id);
            names.push(title.name.as_str());
            years.push(title.year);
            descriptions.push(title.description.as_deref());
            category_ids.push(title.category_id);
        }
    }

    let result = sqlx::query(
        r#"INSERT INTO titles (id, name, year, description, category_id)
           SELECT * FROM UNNEST(
               $1::bigint[], $2::text[], $3::smallint[], $4::text[], $5::bigint[]
           )"#,
    )
    .bind(&ids)
    .bind(&names)
    .bind(&years)
    .bind(&descriptions)
    .bind(&category_ids)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

async fn insert_genre_titles(
    conn: &mut PgConnection,
    entities: &[Entity],
) -> Result<u64, sqlx::Error> {
    let mut ids = Vec::with_capacity(entities.len());
    let mut title_ids = Vec::with_capacity(entities.len());
    let mut genre_ids = Vec::with_capacity(entities.len());

    for entity in entities {
        if let Entity::GenreTitle(link) = entity {
            ids.push(link.id);
            title_ids.push(link.title_id);
            genre_ids.push(link.genre_id);
        }
    }

    let result = sqlx::query(
        r#"INSERT INTO genre_title (id, title_id, genre_id)
           SELECT * FROM UNNEST($1::bigint[], $2::bigint[], $3::bigint[])"#,
    )
    .bind(&ids)
    .bind(&title_ids)
    .bind(&genre_ids)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

async fn insert_reviews(conn: &mut PgConnection, entities: &[Entity]) -> Result<u64, sqlx::Error> {
    let mut ids = Vec::with_capacity(entities.len());
    let mut title_ids = Vec::with_capacity(entities.len());
    let mut author_ids = Vec::with_capacity(entities.len());
    let mut texts = Vec::with_capacity(entities.len());
    let mut scores: Vec<i16> = Vec::with_capacity(entities.len());
    let mut dates: Vec<DateTime<Utc>> = Vec::with_capacity(entities.len());

    for entity in entities {
        if let Entity::Review(review) = entity {
            ids.push(review.id);
            title_ids.push(review.title_id);
            author_ids.push(review.author_id);
            texts.push(review.text.as_str());
            scores.push(review.score);
            dates.push(review.pub_date);
        }
    }

    let result = sqlx::query(
        r#"INSERT INTO reviews (id, title_id, author_id, text, score, pub_date)
           SELECT * FROM UNNEST(
               $1::bigint[], $2::bigint[], $3::bigint[],
               $4::text[], $5::smallint[], $6::timestamptz[]
           )"#,
    )
    .bind(&ids)
    .bind(&title_ids)
    .bind(&author_ids)
    .bind(&texts)
    .bind(&scores)
    .bind(&dates)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

async fn insert_comments(conn: &mut PgConnection, entities: &[Entity]) -> Result<u64, sqlx::Error> {
    let mut ids = Vec::with_capacity(entities.len());
    let mut review_ids = Vec::with_capacity(entities.len());
    let mut author_ids = Vec::with_capacity(entities.len());
    let mut texts = Vec::with_capacity(entities.len());
    let mut dates: Vec<DateTime<Utc>> = Vec::with_capacity(entities.len());

    for entity in entities {
        if let Entity::Comment(comment) = entity {
            ids.push(comment.id);
            review_ids.push(comment.review_id);
            author_ids.push(comment.author_id);
            texts.push(comment.text.as_str());
            dates.push(comment.pub_date);
        }
    }

    let result = sqlx::query(
        r#"INSERT INTO comments (id, review_id, author_id, text, pub_date)
           SELECT * FROM UNNEST(
               $1::bigint[], $2::bigint[], $3::bigint[], $4::text[], $5::timestamptz[]
           )"#,
    )
    .bind(&ids)
    .bind(&review_ids)
    .bind(&author_ids)
    .bind(&texts)
    .bind(&dates)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

/// Point the identity sequence at `MAX(id)` so generated ids don't collide with loaded ones.
async fn reset_identity(conn: &mut PgConnection, kind: EntityKind) -> Result<(), sqlx::Error> {
    let table = kind.table();
    sqlx::query(&format!(
        "SELECT setval(pg_get_serial_sequence('{table}', 'id'), COALESCE(MAX(id), 1), MAX(id) IS NOT NULL) FROM {table}"
    ))
    .execute(&mut *conn)
    .await?;

    Ok(())
}
