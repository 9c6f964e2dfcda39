//! Static registry of loadable entity types.
//!
//! Each entity type has a compiled [`EntitySchema`] describing which CSV
//! columns it accepts and which columns hold foreign keys that must be
//! resolved against another entity type's primary keys.

use super::error::LoadError;
use std::fmt;

/// Every entity type the loader knows how to import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    User,
    Category,
    Genre,
    Title,
    GenreTitle,
    Review,
    Comment,
}

impl EntityKind {
    /// All kinds in a load order that satisfies every foreign key.
    pub const LOAD_ORDER: [EntityKind; 7] = [
        EntityKind::User,
        EntityKind::Category,
        EntityKind::Genre,
        EntityKind::Title,
        EntityKind::Review,
        EntityKind::Comment,
        EntityKind::GenreTitle,
    ];

    /// Resolve a model name, ignoring ASCII case.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::LOAD_ORDER
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(name.trim()))
    }

    pub fn name(self) -> &'static str {
        match self {
            EntityKind::User => "User",
            EntityKind::Category => "Category",
            EntityKind::Genre => "Genre",
            EntityKind::Title => "Title",
            EntityKind::GenreTitle => "GenreTitle",
            EntityKind::Review => "Review",
            EntityKind::Comment => "Comment",
        }
    }

    pub fn table(self) -> &'static str {
        match self {
            EntityKind::User => "users",
            EntityKind::Category => "categories",
            EntityKind::Genre => "genres",
            EntityKind::Title => "titles",
            EntityKind::GenreTitle => "genre_title",
            EntityKind::Review => "reviews",
            EntityKind::Comment => "comments",
        }
    }

    pub fn schema(self) -> &'static EntitySchema {
        match self {
            EntityKind::User => &USER,
            EntityKind::Category => &CATEGORY,
            EntityKind::Genre => &GENRE,
            EntityKind::Title => &TITLE,
            EntityKind::GenreTitle => &GENRE_TITLE,
            EntityKind::Review => &REVIEW,
            EntityKind::Comment => &COMMENT,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A scalar CSV column copied into the entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub required: bool,
}

/// A CSV column holding the primary key of an entity of another type.
///
/// `column` is the header name in the file; `field` is the local field the
/// resolved key is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForeignKey {
    pub field: &'static str,
    pub column: &'static str,
    pub references: EntityKind,
    /// An empty value leaves the field unset instead of skipping the row.
    pub nullable: bool,
}

#[derive(Debug)]
pub struct EntitySchema {
    pub kind: EntityKind,
    pub columns: &'static [Column],
    pub foreign_keys: &'static [ForeignKey],
}

impl EntitySchema {
    /// Whether `name` is a column this schema accepts, scalar or foreign key.
    pub fn accepts(&self, name: &str) -> bool {
        self.columns.iter().any(|column| column.name == name)
            || self.foreign_keys.iter().any(|fk| fk.column == name)
    }

    /// Columns that must be present in a file header.
    pub fn required_columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns
            .iter()
            .filter(|column| column.required)
            .map(|column| column.name)
            .chain(self.foreign_keys.iter().map(|fk| fk.column))
    }

    /// Distinct entity kinds referenced by this schema's foreign keys.
    pub fn referenced_kinds(&self) -> Vec<EntityKind> {
        let mut kinds: Vec<EntityKind> = self.foreign_keys.iter().map(|fk| fk.references).collect();
        kinds.sort();
        kinds.dedup();
        kinds
    }
}

/// Look up the schema registered under `name`.
pub fn lookup(name: &str) -> Result<&'static EntitySchema, LoadError> {
    EntityKind::from_name(name)
        .map(EntityKind::schema)
        .ok_or_else(|| LoadError::UnknownEntityType(name.to_string()))
}

const fn required(name: &'static str) -> Column {
    Column {
        name,
        required: true,
    }
}

const fn optional(name: &'static str) -> Column {
    Column {
        name,
        required: false,
    }
}

const ID: Column = required("id");

static USER: EntitySchema = EntitySchema {
    kind: EntityKind::User,
    columns: &[
        ID,
        required("username"),
        required("email"),
        optional("role"),
        optional("bio"),
        optional("first_name"),
        optional("last_name"),
    ],
    foreign_keys: &[],
};

static CATEGORY: EntitySchema = EntitySchema {
    kind: EntityKind::Category,
    columns: &[ID, required("name"), required("slug")],
    foreign_keys: &[],
};

static GENRE: EntitySchema = EntitySchema {
    kind: EntityKind::Genre,
    columns: &[ID, required("name"), required("slug")],
    foreign_keys: &[],
};

static TITLE: EntitySchema = EntitySchema {
    kind: EntityKind::Title,
    columns: &[ID, required("name"), required("year"), optional("description")],
    foreign_keys: &[ForeignKey {
        field: "category",
        column: "category",
        references: EntityKind::Category,
        nullable: true,
    }],
};

static GENRE_TITLE: EntitySchema = EntitySchema {
    kind: EntityKind::GenreTitle,
    columns: &[ID],
    foreign_keys: &[
        ForeignKey {
            field: "title",
            column: "title_id",
            references: EntityKind::Title,
            nullable: false,
        },
        ForeignKey {
            field: "genre",
            column: "genre_id",
            references: EntityKind::Genre,
            nullable: false,
        },
    ],
};

static REVIEW: EntitySchema = EntitySchema {
    kind: EntityKind::Review,
    columns: &[ID, required("text"), required("score"), required("pub_date")],
    foreign_keys: &[
        ForeignKey {
            field: "title",
            column: "title_id",
            references: EntityKind::Title,
            nullable: false,
        },
        ForeignKey {
            field: "author",
            column: "author",
            references: EntityKind::User,
            nullable: false,
        },
    ],
};

static COMMENT: EntitySchema = EntitySchema {
    kind: EntityKind::Comment,
    columns: &[ID, required("text"), required("pub_date")],
    foreign_keys: &[
        ForeignKey {
            field: "review",
            column: "review_id",
            references: EntityKind::Review,
            nullable: false,
        },
        ForeignKey {
            field: "author",
            column: "author",
            references: EntityKind::User,
            nullable: false,
        },
    ],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_resolve_case_insensitively() {
        assert_eq!(EntityKind::from_name("Review"), Some(EntityKind::Review));
        assert_eq!(EntityKind::from_name("genretitle"), Some(EntityKind::GenreTitle));
        assert_eq!(EntityKind::from_name("Foo"), None);
    }

    #[test]
    fn lookup_reports_unknown_models() {
        let err = lookup("Foo").unwrap_err();
        assert!(matches!(err, LoadError::UnknownEntityType(name) if name == "Foo"));
    }

    #[test]
    fn every_kind_maps_to_its_own_schema() {
        for kind in EntityKind::LOAD_ORDER {
            assert_eq!(kind.schema().kind, kind);
        }
    }

    #[test]
    fn load_order_puts_referenced_kinds_first() {
        for (position, kind) in EntityKind::LOAD_ORDER.iter().enumerate() {
            for referenced in kind.schema().referenced_kinds() {
                let referenced_position = EntityKind::LOAD_ORDER
                    .iter()
                    .position(|candidate| *candidate == referenced)
                    .expect("referenced kind is registered");
                assert!(
                    referenced_position < position,
                    "{referenced} must load before {kind}"
                );
            }
        }
    }

    #[test]
    fn foreign_key_columns_are_required_and_accepted() {
        let schema = EntityKind::Review.schema();
        let required: Vec<_> = schema.required_columns().collect();
        assert!(required.contains(&"title_id"));
        assert!(required.contains(&"author"));
        assert!(schema.accepts("title_id"));
        assert!(!schema.accepts("title"));
        assert_eq!(
            schema.referenced_kinds(),
            vec![EntityKind::User, EntityKind::Title]
        );
    }
}
