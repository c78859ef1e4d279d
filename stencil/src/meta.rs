//! Static schema registration.
//!
//! Schemas submitted with [`register_schema!`](crate::register_schema) are
//! collected at link time, so indexes (and, with the `schema` feature,
//! `$jsonSchema` validators) can be enforced for every schema in the program.

use crate::{Result, Schema};
use mongodb::{Database, bson::Document};
use std::sync::Arc;
use tracing::debug;

#[doc(hidden)]
pub use inventory;

pub struct SchemaRegistration {
    build: fn() -> Result<Arc<Schema>>,
}

inventory::collect!(SchemaRegistration);

impl SchemaRegistration {
    #[doc(hidden)]
    pub const fn new(build: fn() -> Result<Arc<Schema>>) -> Self {
        Self { build }
    }

    pub fn build(&self) -> Result<Arc<Schema>> {
        (self.build)()
    }
}

/// Registers a `fn() -> Result<Arc<Schema>>` constructor.
#[macro_export]
macro_rules! register_schema {
    ($build:path) => {
        $crate::meta::inventory::submit! {
            $crate::meta::SchemaRegistration::new($build)
        }
    };
}

pub fn registrations() -> impl Iterator<Item = &'static SchemaRegistration> {
    inventory::iter::<SchemaRegistration>.into_iter()
}

/// Creates the declared indexes of every registered schema bound to a collection.
pub async fn enforce_indexes(db: &Database) -> Result<()> {
    for registration in registrations() {
        let schema = registration.build()?;

        let Some(name) = schema.collection() else {
            continue;
        };

        if schema.indexes().is_empty() {
            continue;
        }

        debug!(schema = schema.name(), collection = name, "enforcing indexes");

        db.collection::<Document>(name)
            .create_indexes(schema.indexes().iter().map(|index| index.to_model()))
            .await?;
    }

    Ok(())
}

#[cfg(feature = "schema")]
mod validator {
    use crate::{Field, ForeignKind, Result, Schema, kinds::Kind};
    use mongodb::bson::{self, Document, doc};
    use schemars::schema::{
        ArrayValidation, ObjectValidation, Schema as JsonSchema, SchemaObject, SingleOrVec,
    };

    fn bson_type(kinds: Vec<ForeignKind>) -> SchemaObject {
        let mut extensions = schemars::Map::new();
        let aliases: Vec<&str> = kinds.iter().map(|kind| kind.alias()).collect();

        match aliases.as_slice() {
            [alias] => extensions.insert("bsonType".into(), (*alias).into()),
            _ => extensions.insert("bsonType".into(), aliases.into()),
        };

        SchemaObject {
            extensions,
            ..Default::default()
        }
    }

    fn field_schema(field: &Field) -> SchemaObject {
        let mut kinds: Vec<ForeignKind> = field.foreign_kind().into_iter().collect();

        match field.kind() {
            // widened to a long once out of `int` range
            Kind::Integer => kinds.push(ForeignKind::Long),
            // stored as a `{ $ref, $id }` document
            Kind::Reference(reference) if reference.concrete && reference.cache.is_empty() => {
                kinds = vec![ForeignKind::Object];
            }
            _ => {}
        }

        if kinds.is_empty() {
            return SchemaObject::default();
        }

        if field.is_nullable() {
            kinds.push(ForeignKind::Null);
        }

        let mut object = bson_type(kinds);

        match field.kind() {
            Kind::Array(element) | Kind::Mapping(element, _) => {
                object.array = Some(Box::new(ArrayValidation {
                    items: Some(SingleOrVec::Single(Box::new(field_schema(element).into()))),
                    ..Default::default()
                }));
            }
            Kind::Embed(kinds) => {
                if let [kind] = kinds.as_slice() {
                    object.object = schema_object(kind).object;
                }
            }
            _ => {}
        }

        object
    }

    pub fn schema_object(schema: &Schema) -> SchemaObject {
        let mut validation = ObjectValidation::default();

        for field in schema.fields() {
            validation
                .properties
                .insert(field.name().to_owned(), JsonSchema::Object(field_schema(field)));

            if field.is_required() {
                validation.required.insert(field.name().to_owned());
            }
        }

        let mut object = bson_type(vec![ForeignKind::Object]);
        object.object = Some(Box::new(validation));
        object
    }

    /// `{ $jsonSchema: ... }` validator document for `schema`.
    pub fn validator(schema: &Schema) -> Result<Document> {
        let json_schema = bson::to_document(&schema_object(schema))?;
        Ok(doc! { "$jsonSchema": json_schema })
    }
}

#[cfg(feature = "schema")]
pub use validator::{schema_object, validator};
