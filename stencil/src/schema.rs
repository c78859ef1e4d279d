use crate::{Error, Field, Result, query::Q};
use dashmap::DashMap;
use mongodb::{
    IndexModel,
    bson::{Document as BsonDocument, doc},
    options::IndexOptions,
};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashSet,
    fmt::Debug,
    sync::{Arc, Weak},
};
use tracing::debug;

/// A named, ordered set of fields describing one document shape.
///
/// Schemas are built once through [`SchemaBuilder`] and shared behind an
/// [`Arc`]; every field holds a weak pointer back to the schema that owns it.
pub struct Schema {
    name: String,
    collection: Option<String>,
    fields: Vec<Arc<Field>>,
    indexes: Vec<Index>,
    projection: Option<Vec<String>>,
}

impl Debug for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Schema")
            .field("name", &self.name)
            .field("collection", &self.collection)
            .field(
                "fields",
                &self.fields.iter().map(|field| field.attribute()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

impl Schema {
    pub fn builder(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            name: name.into(),
            collection: None,
            fields: Vec::new(),
            indexes: Vec::new(),
            projection: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn collection(&self) -> Option<&str> {
        self.collection.as_deref()
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[Arc<Field>] {
        &self.fields
    }

    /// Looks a field up by attribute name, falling back to its foreign name.
    pub fn field(&self, attribute: &str) -> Option<&Arc<Field>> {
        self.fields
            .iter()
            .find(|field| field.attribute() == attribute)
            .or_else(|| self.fields.iter().find(|field| field.name() == attribute))
    }

    pub fn try_field(&self, attribute: &str) -> Result<&Arc<Field>> {
        self.field(attribute).ok_or_else(|| Error::UnknownField {
            schema: self.name.clone(),
            field: attribute.to_owned(),
        })
    }

    pub fn indexes(&self) -> &[Index] {
        &self.indexes
    }

    /// Same schema, or a schema registered under the same name.
    pub fn is(&self, other: &Schema) -> bool {
        std::ptr::eq(self, other) || self.name == other.name
    }

    /// Query node bound to the field `attribute`.
    pub fn q(self: &Arc<Self>, attribute: &str) -> Result<Q> {
        Q::new(self, attribute)
    }

    /// Foreign names selected when a projection names no explicit inclusions.
    pub fn default_projection(&self) -> Vec<String> {
        match &self.projection {
            Some(names) => names.clone(),
            None => self
                .fields
                .iter()
                .filter(|field| field.is_projected(None))
                .map(|field| field.name().to_owned())
                .collect(),
        }
    }
}

pub struct SchemaBuilder {
    name: String,
    collection: Option<String>,
    fields: Vec<Field>,
    indexes: Vec<Index>,
    projection: Option<Vec<String>>,
}

impl SchemaBuilder {
    pub fn collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    /// Adds a field. A field with an attribute already declared replaces it in place.
    pub fn field(mut self, field: Field) -> Self {
        match self
            .fields
            .iter_mut()
            .find(|existing| existing.attribute() == field.attribute())
        {
            Some(existing) => *existing = field,
            None => self.fields.push(field),
        }
        self
    }

    pub fn fields(self, fields: impl IntoIterator<Item = Field>) -> Self {
        fields.into_iter().fold(self, Self::field)
    }

    /// Inherits the fields, indexes and collection of `parent`.
    pub fn extend(mut self, parent: &Schema) -> Self {
        if self.collection.is_none() {
            self.collection.clone_from(&parent.collection);
        }
        self.indexes.extend(parent.indexes.iter().cloned());

        let own = std::mem::take(&mut self.fields);
        self.fields = parent.fields.iter().map(|field| Field::clone(field)).collect();
        self.fields(own)
    }

    pub fn index(mut self, index: Index) -> Self {
        self.indexes.push(index);
        self
    }

    /// Explicit default projection, as attribute names.
    pub fn projection<S: Into<String>>(mut self, attributes: impl IntoIterator<Item = S>) -> Self {
        self.projection = Some(attributes.into_iter().map(Into::into).collect());
        self
    }

    pub fn build(self) -> Result<Arc<Schema>> {
        let Self {
            name,
            collection,
            mut fields,
            mut indexes,
            projection,
        } = self;

        let mut names = HashSet::new();

        for field in &fields {
            field.check()?;

            if !names.insert(field.name()) {
                return Err(Error::Schema(format!(
                    "`{name}` stores two fields under `{}`",
                    field.name()
                )));
            }

            if let Some(sibling) = field
                .exclusive_with()
                .iter()
                .find(|sibling| !fields.iter().any(|f| f.attribute() == sibling.as_str()))
            {
                return Err(Error::Schema(format!(
                    "`{}` is exclusive with `{sibling}`, which `{name}` does not declare",
                    field.attribute()
                )));
            }
        }

        let resolve = |attribute: &str| -> Result<String> {
            let (head, rest) = match attribute.split_once('.') {
                Some((head, rest)) => (head, Some(rest)),
                None => (attribute, None),
            };
            let field = fields
                .iter()
                .find(|field| field.attribute() == head || field.name() == head)
                .ok_or_else(|| Error::UnknownField {
                    schema: name.clone(),
                    field: attribute.to_owned(),
                })?;

            Ok(match rest {
                Some(rest) => format!("{}.{rest}", field.name()),
                None => field.name().to_owned(),
            })
        };

        for index in &mut indexes {
            for (key, _) in &mut index.keys {
                *key = resolve(key)?;
            }
        }

        let projection = projection
            .map(|attributes| attributes.iter().map(|a| resolve(a)).collect::<Result<Vec<_>>>())
            .transpose()?;

        let schema = Arc::new_cyclic(|owner: &Weak<Schema>| {
            for field in &mut fields {
                field.attach(owner);
            }

            Schema {
                name,
                collection,
                fields: fields.into_iter().map(Arc::new).collect(),
                indexes,
                projection,
            }
        });

        debug!(schema = schema.name(), fields = schema.fields.len(), "built schema");

        Ok(schema)
    }
}

/// Declared index: ordered `(path, direction)` keys plus options.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    pub name: Option<String>,
    pub keys: Vec<(String, i32)>,
    #[serde(default)]
    pub unique: bool,
}

impl Index {
    pub fn new<S: Into<String>>(keys: impl IntoIterator<Item = (S, i32)>) -> Self {
        Self {
            name: None,
            keys: keys.into_iter().map(|(k, d)| (k.into(), d)).collect(),
            unique: false,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn keys_document(&self) -> BsonDocument {
        let mut keys = doc! {};
        for (key, direction) in &self.keys {
            keys.insert(key.clone(), *direction);
        }
        keys
    }

    pub fn to_model(&self) -> IndexModel {
        let mut options = IndexOptions::default();
        options.name.clone_from(&self.name);
        if self.unique {
            options.unique = Some(true);
        }

        IndexModel::builder()
            .keys(self.keys_document())
            .options(options)
            .build()
    }
}

/// Name to schema lookup table used to resolve discriminators at runtime.
#[derive(Debug, Default)]
pub struct Registry {
    schemas: DashMap<String, Arc<Schema>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `schema`, returning any schema previously known under its name.
    pub fn register(&self, schema: Arc<Schema>) -> Option<Arc<Schema>> {
        debug!(schema = schema.name(), "registering schema");
        self.schemas.insert(schema.name().to_owned(), schema)
    }

    pub fn get(&self, name: &str) -> Option<Arc<Schema>> {
        self.schemas.get(name).map(|entry| entry.value().clone())
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<Schema>> {
        self.get(name)
            .ok_or_else(|| Error::Schema(format!("no schema is registered as `{name}`")))
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.schemas.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Registry holding every schema submitted through [`crate::register_schema!`].
    #[cfg(feature = "meta")]
    pub fn from_inventory() -> Result<Self> {
        let registry = Self::new();
        for registration in crate::meta::registrations() {
            registry.register(registration.build()?);
        }
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person() -> Arc<Schema> {
        Schema::builder("Person")
            .collection("people")
            .field(Field::identifier())
            .field(Field::string("name"))
            .field(Field::number("age").projected(false))
            .index(Index::new([("name", 1), ("id", -1)]).unique())
            .build()
            .unwrap()
    }

    #[test]
    fn fields_point_back_at_their_schema() {
        let schema = person();
        let owner = schema.field("name").unwrap().owner().unwrap();
        assert!(Arc::ptr_eq(&owner, &schema));
    }

    #[test]
    fn lookup_by_attribute_or_foreign_name() {
        let schema = person();
        assert_eq!(schema.field("id").unwrap().name(), "_id");
        assert_eq!(schema.field("_id").unwrap().attribute(), "id");
        assert!(matches!(schema.try_field("nope"), Err(Error::UnknownField { .. })));
    }

    #[test]
    fn index_keys_use_foreign_names() {
        let schema = person();
        assert_eq!(schema.indexes()[0].keys_document(), doc! { "name": 1, "_id": -1 });
    }

    #[test]
    fn default_projection_honours_predicates() {
        assert_eq!(person().default_projection(), ["_id", "name"]);
    }

    #[test]
    fn extend_overrides_in_place() {
        let parent = person();
        let child = Schema::builder("Employee")
            .extend(&parent)
            .field(Field::integer("age"))
            .field(Field::string("title"))
            .build()
            .unwrap();

        let attributes: Vec<_> = child.fields().iter().map(|f| f.attribute()).collect();
        assert_eq!(attributes, ["id", "name", "age", "title"]);
        assert_eq!(child.collection(), Some("people"));
        assert!(Arc::ptr_eq(&child.field("age").unwrap().owner().unwrap(), &child));
    }

    #[test]
    fn exclusive_sibling_must_exist() {
        let result = Schema::builder("Broken")
            .field(Field::string("a").exclusive(["b"]))
            .build();
        assert!(matches!(result, Err(Error::Schema(_))));
    }

    #[test]
    fn registry_resolves_names() {
        let registry = Registry::new();
        assert!(registry.register(person()).is_none());
        assert!(registry.register(person()).is_some());
        assert_eq!(registry.names(), ["Person"]);
        assert!(matches!(registry.resolve("Ghost"), Err(Error::Schema(_))));
    }
}
