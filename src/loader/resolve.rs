//! Row resolution: turns a raw CSV row into an entity or a skip reason.
//!
//! Resolution is pure. It reads the row, consults a snapshot of the primary
//! keys already stored, and either builds a complete entity or reports why the
//! row was dropped. Rows are never mutated and partial entities never escape.

use super::schema::{EntityKind, EntitySchema, ForeignKey};
use super::source::CsvRow;
use crate::models::{Category, Comment, Genre, GenreTitle, Review, Title, User};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::fmt;

pub const USER_ROLES: [&str; 3] = ["user", "moderator", "admin"];

/// A fully constructed record ready for insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entity {
    User(User),
    Category(Category),
    Genre(Genre),
    Title(Title),
    GenreTitle(GenreTitle),
    Review(Review),
    Comment(Comment),
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::User(_) => EntityKind::User,
            Entity::Category(_) => EntityKind::Category,
            Entity::Genre(_) => EntityKind::Genre,
            Entity::Title(_) => EntityKind::Title,
            Entity::GenreTitle(_) => EntityKind::GenreTitle,
            Entity::Review(_) => EntityKind::Review,
            Entity::Comment(_) => EntityKind::Comment,
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            Entity::User(user) => user.id,
            Entity::Category(category) => category.id,
            Entity::Genre(genre) => genre.id,
            Entity::Title(title) => title.id,
            Entity::GenreTitle(link) => link.id,
            Entity::Review(review) => review.id,
            Entity::Comment(comment) => comment.id,
        }
    }

    /// Primary keys this entity points at, by referenced kind.
    pub fn references(&self) -> Vec<(EntityKind, i64)> {
        match self {
            Entity::User(_) | Entity::Category(_) | Entity::Genre(_) => Vec::new(),
            Entity::Title(title) => title
                .category_id
                .map(|id| vec![(EntityKind::Category, id)])
                .unwrap_or_default(),
            Entity::GenreTitle(link) => vec![
                (EntityKind::Title, link.title_id),
                (EntityKind::Genre, link.genre_id),
            ],
            Entity::Review(review) => vec![
                (EntityKind::Title, review.title_id),
                (EntityKind::User, review.author_id),
            ],
            Entity::Comment(comment) => vec![
                (EntityKind::Review, comment.review_id),
                (EntityKind::User, comment.author_id),
            ],
        }
    }
}

/// Snapshot of the primary keys present in each store, taken before resolution.
#[derive(Debug, Clone, Default)]
pub struct KnownKeys {
    ids: HashMap<EntityKind, HashSet<i64>>,
}

impl KnownKeys {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_all(&mut self, kind: EntityKind, ids: impl IntoIterator<Item = i64>) {
        self.ids.entry(kind).or_default().extend(ids);
    }

    pub fn contains(&self, kind: EntityKind, id: i64) -> bool {
        self.ids.get(&kind).is_some_and(|ids| ids.contains(&id))
    }
}

/// Why a row was left out of the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyExists {
        id: i64,
    },
    MissingReference {
        field: &'static str,
        references: EntityKind,
        value: String,
        row: String,
    },
    InvalidValue {
        column: &'static str,
        message: String,
        row: String,
    },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::AlreadyExists { id } => {
                write!(f, "object with id = {id} already exists")
            }
            SkipReason::MissingReference {
                field,
                references,
                value,
                row,
            } => write!(
                f,
                "{references} matching query does not exist (id = {value}, field '{field}'); \
                 referenced object not found, check related tables; row not added: {row}"
            ),
            SkipReason::InvalidValue {
                column,
                message,
                row,
            } => write!(f, "invalid value in column '{column}': {message}; row not added: {row}"),
        }
    }
}

/// Foreign keys bound to local fields after lookup. A `None` binding is a
/// nullable reference left empty in the file.
#[derive(Debug, Default)]
struct ResolvedRefs {
    by_field: Vec<(&'static str, Option<i64>)>,
}

impl ResolvedRefs {
    fn get(&self, field: &'static str) -> Option<i64> {
        self.by_field
            .iter()
            .find(|(name, _)| *name == field)
            .and_then(|(_, id)| *id)
    }

    fn required(&self, field: &'static str, fields: &Fields<'_>) -> Result<i64, SkipReason> {
        self.get(field)
            .ok_or_else(|| fields.invalid(field, "reference was not resolved"))
    }
}

/// Resolve `row` against `schema`, consulting `known` for existing and referenced keys.
pub fn resolve_row(schema: &EntitySchema, row: &CsvRow, known: &KnownKeys) -> Result<Entity, SkipReason> {
    let fields = Fields { row };
    let id = fields.integer("id")?;

    if known.contains(schema.kind, id) {
        return Err(SkipReason::AlreadyExists { id });
    }

    let mut refs = ResolvedRefs::default();
    for fk in schema.foreign_keys {
        let target = resolve_reference(fk, row, known)?;
        refs.by_field.push((fk.field, target));
    }

    build_entity(schema.kind, id, &fields, &refs)
}

fn resolve_reference(fk: &ForeignKey, row: &CsvRow, known: &KnownKeys) -> Result<Option<i64>, SkipReason> {
    let raw = row.get(fk.column).unwrap_or_default();
    let missing = || SkipReason::MissingReference {
        field: fk.field,
        references: fk.references,
        value: raw.to_string(),
        row: row.to_string(),
    };

    if raw.trim().is_empty() {
        return if fk.nullable { Ok(None) } else { Err(missing()) };
    }

    let target: i64 = raw.trim().parse().map_err(|_| missing())?;
    if known.contains(fk.references, target) {
        Ok(Some(target))
    } else {
        Err(missing())
    }
}

fn build_entity(kind: EntityKind, id: i64, fields: &Fields<'_>, refs: &ResolvedRefs) -> Result<Entity, SkipReason> {
    let entity = match kind {
        EntityKind::User => Entity::User(User {
            id,
            username: fields.text("username")?,
            email: fields.email("email")?,
            role: fields.role("role")?,
            bio: fields.text_or_default("bio"),
            first_name: fields.text_or_default("first_name"),
            last_name: fields.text_or_default("last_name"),
        }),
        EntityKind::Category => Entity::Category(Category {
            id,
            name: fields.text("name")?,
            slug: fields.text("slug")?,
        }),
        EntityKind::Genre => Entity::Genre(Genre {
            id,
            name: fields.text("name")?,
            slug: fields.text("slug")?,
        }),
        EntityKind::Title => Entity::Title(Title {
            id,
            name: fields.text("name")?,
            year: fields.small_integer("year", 0..=i16::MAX)?,
            description: fields.row.get("description").map(str::to_string),
            category_id: refs.get("category"),
        }),
        EntityKind::GenreTitle => Entity::GenreTitle(GenreTitle {
            id,
            title_id: refs.required("title", fields)?,
            genre_id: refs.required("genre", fields)?,
        }),
        EntityKind::Review => Entity::Review(Review {
            id,
            title_id: refs.required("title", fields)?,
            author_id: refs.required("author", fields)?,
            text: fields.text("text")?,
            score: fields.small_integer("score", 1..=10)?,
            pub_date: fields.timestamp("pub_date")?,
        }),
        EntityKind::Comment => Entity::Comment(Comment {
            id,
            review_id: refs.required("review", fields)?,
            author_id: refs.required("author", fields)?,
            text: fields.text("text")?,
            pub_date: fields.timestamp("pub_date")?,
        }),
    };

    Ok(entity)
}

/// Typed accessors over a row; each failure names the column.
struct Fields<'a> {
    row: &'a CsvRow,
}

impl Fields<'_> {
    fn invalid(&self, column: &'static str, message: impl Into<String>) -> SkipReason {
        SkipReason::InvalidValue {
            column,
            message: message.into(),
            row: self.row.to_string(),
        }
    }

    /// Value kept verbatim; an empty string is a valid value.
    fn text(&self, column: &'static str) -> Result<String, SkipReason> {
        self.row
            .get(column)
            .map(str::to_string)
            .ok_or_else(|| self.invalid(column, "column is missing"))
    }

    fn text_or_default(&self, column: &'static str) -> String {
        self.row.get(column).map(str::to_string).unwrap_or_default()
    }

    /// Non-blank value for columns that must be parsed.
    fn scalar(&self, column: &'static str) -> Result<&str, SkipReason> {
        self.row
            .non_blank(column)
            .map(str::trim)
            .ok_or_else(|| self.invalid(column, "value is required"))
    }

    fn integer(&self, column: &'static str) -> Result<i64, SkipReason> {
        let raw = self.scalar(column)?;
        raw.parse()
            .map_err(|_| self.invalid(column, format!("'{raw}' is not an integer")))
    }

    fn small_integer(
        &self,
        column: &'static str,
        range: std::ops::RangeInclusive<i16>,
    ) -> Result<i16, SkipReason> {
        let raw = self.scalar(column)?;
        let value: i16 = raw
            .parse()
            .map_err(|_| self.invalid(column, format!("'{raw}' is not a small integer")))?;

        if range.contains(&value) {
            Ok(value)
        } else {
            Err(self.invalid(
                column,
                format!("{value} is outside {}..={}", range.start(), range.end()),
            ))
        }
    }

    fn timestamp(&self, column: &'static str) -> Result<DateTime<Utc>, SkipReason> {
        let raw = self.scalar(column)?;
        DateTime::parse_from_rfc3339(raw)
            .map(|date| date.with_timezone(&Utc))
            .map_err(|err| self.invalid(column, format!("'{raw}' is not an RFC 3339 timestamp: {err}")))
    }

    fn email(&self, column: &'static str) -> Result<String, SkipReason> {
        let raw = self.text(column)?;
        if raw.contains('@') {
            Ok(raw)
        } else {
            Err(self.invalid(column, format!("'{raw}' is not an email address")))
        }
    }

    fn role(&self, column: &'static str) -> Result<String, SkipReason> {
        match self.row.non_blank(column) {
            None => Ok(USER_ROLES[0].to_string()),
            Some(raw) => {
                let role = raw.trim().to_ascii_lowercase();
                if USER_ROLES.contains(&role.as_str()) {
                    Ok(role)
                } else {
                    Err(self.invalid(column, format!("unsupported role '{raw}'")))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> CsvRow {
        CsvRow::new(
            2,
            pairs
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
        )
    }

    fn known(entries: &[(EntityKind, &[i64])]) -> KnownKeys {
        let mut keys = KnownKeys::new();
        for (kind, ids) in entries {
            keys.insert_all(*kind, ids.iter().copied());
        }
        keys
    }

    #[test]
    fn builds_title_with_resolved_category() {
        let keys = known(&[(EntityKind::Category, &[1])]);
        let entity = resolve_row(
            EntityKind::Title.schema(),
            &row(&[("id", "1"), ("name", "Book A"), ("year", "1999"), ("category", "1")]),
            &keys,
        )
        .expect("row resolves");

        assert_eq!(
            entity,
            Entity::Title(Title {
                id: 1,
                name: "Book A".to_string(),
                year: 1999,
                description: None,
                category_id: Some(1),
            })
        );
        assert_eq!(entity.references(), vec![(EntityKind::Category, 1)]);
    }

    #[test]
    fn unresolved_reference_skips_whole_row() {
        let keys = known(&[(EntityKind::Category, &[1])]);
        let skip = resolve_row(
            EntityKind::Title.schema(),
            &row(&[("id", "2"), ("name", "Book B"), ("year", "2001"), ("category", "99")]),
            &keys,
        )
        .unwrap_err();

        match skip {
            SkipReason::MissingReference {
                field,
                references,
                value,
                row,
            } => {
                assert_eq!(field, "category");
                assert_eq!(references, EntityKind::Category);
                assert_eq!(value, "99");
                assert!(row.contains("'name': 'Book B'"));
            }
            other => panic!("unexpected skip: {other:?}"),
        }
    }

    #[test]
    fn existing_id_is_checked_before_references() {
        let keys = known(&[(EntityKind::Review, &[5])]);
        let skip = resolve_row(
            EntityKind::Review.schema(),
            &row(&[
                ("id", "5"),
                ("title_id", "404"),
                ("text", "x"),
                ("author", "404"),
                ("score", "5"),
                ("pub_date", "2019-09-24T21:08:21.567Z"),
            ]),
            &keys,
        )
        .unwrap_err();

        assert_eq!(skip, SkipReason::AlreadyExists { id: 5 });
        assert_eq!(skip.to_string(), "object with id = 5 already exists");
    }

    #[test]
    fn review_score_must_be_between_one_and_ten() {
        let keys = known(&[(EntityKind::Title, &[1]), (EntityKind::User, &[100])]);
        let skip = resolve_row(
            EntityKind::Review.schema(),
            &row(&[
                ("id", "1"),
                ("title_id", "1"),
                ("text", "Too good"),
                ("author", "100"),
                ("score", "11"),
                ("pub_date", "2019-09-24T21:08:21.567Z"),
            ]),
            &keys,
        )
        .unwrap_err();

        assert!(matches!(skip, SkipReason::InvalidValue { column: "score", .. }));
    }

    #[test]
    fn comment_binds_review_and_author() {
        let keys = known(&[(EntityKind::Review, &[3]), (EntityKind::User, &[100])]);
        let entity = resolve_row(
            EntityKind::Comment.schema(),
            &row(&[
                ("id", "9"),
                ("review_id", "3"),
                ("text", "Agreed"),
                ("author", "100"),
                ("pub_date", "2019-09-24T21:08:21.567+03:00"),
            ]),
            &keys,
        )
        .expect("row resolves");

        let Entity::Comment(comment) = entity else {
            panic!("expected a comment");
        };
        assert_eq!(comment.review_id, 3);
        assert_eq!(comment.author_id, 100);
        assert_eq!(comment.pub_date.to_rfc3339(), "2019-09-24T18:08:21.567+00:00");
    }

    #[test]
    fn user_defaults_role_and_rejects_unknown_roles() {
        let keys = KnownKeys::new();
        let entity = resolve_row(
            EntityKind::User.schema(),
            &row(&[("id", "100"), ("username", "bingobongo"), ("email", "bingo@yamdb.fake")]),
            &keys,
        )
        .expect("row resolves");
        let Entity::User(user) = entity else {
            panic!("expected a user");
        };
        assert_eq!(user.role, "user");
        assert_eq!(user.bio, "");

        let skip = resolve_row(
            EntityKind::User.schema(),
            &row(&[
                ("id", "101"),
                ("username", "root"),
                ("email", "root@yamdb.fake"),
                ("role", "superuser"),
            ]),
            &keys,
        )
        .unwrap_err();
        assert!(matches!(skip, SkipReason::InvalidValue { column: "role", .. }));
    }

    #[test]
    fn non_numeric_id_is_invalid() {
        let skip = resolve_row(
            EntityKind::Genre.schema(),
            &row(&[("id", "abc"), ("name", "Drama"), ("slug", "drama")]),
            &KnownKeys::new(),
        )
        .unwrap_err();
        assert!(matches!(skip, SkipReason::InvalidValue { column: "id", .. }));
    }

    #[test]
    fn empty_category_leaves_title_uncategorized() {
        let entity = resolve_row(
            EntityKind::Title.schema(),
            &row(&[
                ("id", "4"),
                ("name", "  Solaris "),
                ("year", "1961"),
                ("category", ""),
                ("description", ""),
            ]),
            &KnownKeys::new(),
        )
        .expect("row resolves");

        let Entity::Title(title) = entity else {
            panic!("expected a title");
        };
        assert_eq!(title.category_id, None);
        assert_eq!(title.name, "  Solaris ");
        assert_eq!(title.description.as_deref(), Some(""));
        assert!(Entity::Title(title).references().is_empty());
    }

    #[test]
    fn empty_required_reference_is_missing() {
        let keys = known(&[(EntityKind::Genre, &[1])]);
        let skip = resolve_row(
            EntityKind::GenreTitle.schema(),
            &row(&[("id", "1"), ("title_id", ""), ("genre_id", "1")]),
            &keys,
        )
        .unwrap_err();

        assert!(matches!(skip, SkipReason::MissingReference { field: "title", .. }));
    }

    #[test]
    fn empty_review_text_is_kept() {
        let keys = known(&[(EntityKind::Title, &[1]), (EntityKind::User, &[100])]);
        let entity = resolve_row(
            EntityKind::Review.schema(),
            &row(&[
                ("id", "1"),
                ("title_id", " 1 "),
                ("text", ""),
                ("author", "100"),
                ("score", "7"),
                ("pub_date", "2019-09-24T21:08:21.567Z"),
            ]),
            &keys,
        )
        .expect("row resolves");

        let Entity::Review(review) = entity else {
            panic!("expected a review");
        };
        assert_eq!(review.text, "");
        assert_eq!(review.title_id, 1);
    }

    #[test]
    fn unbound_reference_never_builds_an_entity() {
        let comment_row = row(&[
            ("id", "1"),
            ("review_id", "3"),
            ("text", "Agreed"),
            ("author", "100"),
            ("pub_date", "2019-09-24T21:08:21.567Z"),
        ]);
        let fields = Fields { row: &comment_row };

        let skip = build_entity(EntityKind::Comment, 1, &fields, &ResolvedRefs::default()).unwrap_err();

        assert!(matches!(skip, SkipReason::InvalidValue { column: "review", .. }));
    }
}
