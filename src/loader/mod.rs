//! CSV bulk loader.
//!
//! Imports one CSV file of a single entity type into its table:
//!
//! 1. **Registry** (`schema`) - resolves the model name to a static schema
//! 2. **Source** (`source`) - opens the file, validates the header, decodes rows
//! 3. **Resolution** (`resolve`) - turns each row into an entity or a skip reason
//! 4. **Store** (`store`, `postgres`) - writes the accepted rows in one batch
//!
//! Rows whose id is already stored, whose foreign keys point at missing
//! entities, or whose values fail validation are skipped with a notice. An
//! integrity violation on the batch is logged as a warning and does not fail
//! the run. Referenced entity types must be loaded first; see
//! [`EntityKind::LOAD_ORDER`].
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use yamdb_api::loader::{load_data, PgStore};
//!
//! let store = PgStore::new(pool);
//! let report = load_data(&store, "Review", Path::new("static/data/review.csv")).await?;
//! println!("inserted {} reviews", report.inserted);
//! ```

pub mod error;
pub mod postgres;
pub mod report;
pub mod resolve;
pub mod schema;
pub mod source;
pub mod store;

pub use error::{LoadError, StoreError};
pub use postgres::PgStore;
pub use report::LoadReport;
pub use resolve::{Entity, KnownKeys, SkipReason, resolve_row};
pub use schema::{EntityKind, EntitySchema};
pub use store::{EntityStore, MemoryStore};

use std::path::Path;

/// Load every resolvable row of `path` into the store for `model_name`.
///
/// Fails before touching the file when the model is unknown, and before
/// touching the store when the file can't be read or decoded.
pub async fn load_data<S>(store: &S, model_name: &str, path: &Path) -> Result<LoadReport, LoadError>
where
    S: EntityStore + ?Sized,
{
    let schema = schema::lookup(model_name)?;
    let rows = source::read_rows(path, schema)?;

    let result = load_rows(store, schema, rows).await;
    log::info!("data from file {} processed", path.display());
    result
}

async fn load_rows<S>(
    store: &S,
    schema: &'static EntitySchema,
    rows: Vec<source::CsvRow>,
) -> Result<LoadReport, LoadError>
where
    S: EntityStore + ?Sized,
{
    let known = snapshot_keys(store, schema).await?;
    let mut report = LoadReport::new(schema.kind);
    report.rows = rows.len();

    let mut pending = Vec::with_capacity(rows.len());
    for row in &rows {
        match resolve_row(schema, row, &known) {
            Ok(entity) => pending.push(entity),
            Err(reason) => {
                log::info!("line {}: {}", row.line(), reason);
                report.record_skip(&reason);
            }
        }
    }
    report.pending = pending.len();

    match store.insert_batch(schema.kind, &pending).await {
        Ok(inserted) => {
            report.inserted = inserted;
            log::info!(
                "{}: {} inserted, {} skipped",
                schema.kind,
                inserted,
                report.skipped()
            );
        }
        Err(StoreError::IntegrityViolation(detail)) => {
            log::warn!("errors occurred while writing to the database, check the database: {detail}");
            report.batch_warning = Some(detail);
        }
        Err(err) => return Err(err.into()),
    }

    Ok(report)
}

/// Capture the ids stored for the target kind and every kind it references.
async fn snapshot_keys<S>(store: &S, schema: &EntitySchema) -> Result<KnownKeys, StoreError>
where
    S: EntityStore + ?Sized,
{
    let mut known = KnownKeys::new();
    known.insert_all(schema.kind, store.existing_ids(schema.kind).await?);

    for kind in schema.referenced_kinds() {
        known.insert_all(kind, store.existing_ids(kind).await?);
    }

    Ok(known)
}
