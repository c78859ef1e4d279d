use crate::{Error, Result, Schema, value::{Map, Value}};
use mongodb::bson::{Bson, Document as BsonDocument};
use std::{collections::HashMap, fmt::Debug, sync::Arc};

/// One instance of a [`Schema`].
///
/// Values are stored in their foreign form, keyed by foreign name. Reads and
/// writes go through the owning [`Field`](crate::Field), which casts in both
/// directions. Keys the schema does not declare are kept and passed through.
#[derive(Clone)]
pub struct Document {
    schema: Arc<Schema>,
    pub(crate) data: BsonDocument,
    pub(crate) cache: HashMap<String, Value>,
}

impl Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("schema", &self.schema.name())
            .field("data", &self.data)
            .finish()
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.schema.is(&other.schema) && self.to_foreign() == other.to_foreign()
    }
}

impl Document {
    /// Empty instance with assigned defaults materialised.
    pub fn new(schema: &Arc<Schema>) -> Result<Self> {
        let mut document = Self::from_foreign(schema, BsonDocument::new());
        document.assign_defaults()?;
        Ok(document)
    }

    /// Positional construction, one value per field in declaration order.
    pub fn from_args<V: Into<Value>>(
        schema: &Arc<Schema>,
        args: impl IntoIterator<Item = V>,
    ) -> Result<Self> {
        let mut document = Self::from_foreign(schema, BsonDocument::new());
        let mut fields = schema.fields().iter();

        for arg in args {
            let field = fields.next().ok_or_else(|| {
                Error::type_error(format!(
                    "`{}` takes at most {} positional values",
                    schema.name(),
                    schema.fields().len()
                ))
            })?;
            field.set(&mut document, arg)?;
        }

        document.assign_defaults()?;
        Ok(document)
    }

    /// Keyword construction. Every key must name a declared field.
    pub fn from_pairs<K: AsRef<str>, V: Into<Value>>(
        schema: &Arc<Schema>,
        pairs: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Self> {
        let mut document = Self::from_foreign(schema, BsonDocument::new());

        for (key, value) in pairs {
            schema.try_field(key.as_ref())?.set(&mut document, value)?;
        }

        document.assign_defaults()?;
        Ok(document)
    }

    /// Construction from a native mapping. Undeclared keys are kept as extras.
    pub fn from_map(schema: &Arc<Schema>, map: Map) -> Result<Self> {
        let mut document = Self::from_foreign(schema, BsonDocument::new());

        for (key, value) in map {
            match schema.field(&key) {
                Some(field) => field.set(&mut document, value)?,
                None => {
                    document.data.insert(key, value.into_bson()?);
                }
            }
        }

        document.assign_defaults()?;
        Ok(document)
    }

    /// Query operand from a native mapping: cast like [`Document::from_map`]
    /// but without `assign` defaults or the exclusive check.
    pub(crate) fn from_operand(schema: &Arc<Schema>, map: Map) -> Result<Self> {
        let mut document = Self::from_foreign(schema, BsonDocument::new());

        for (key, value) in map {
            match schema.field(&key) {
                Some(field) => {
                    if !value.is_null() {
                        field.validate(&value)?;
                    }
                    document.data.insert(field.name(), field.to_operand(value)?);
                }
                None => {
                    document.data.insert(key, value.into_bson()?);
                }
            }
        }

        Ok(document)
    }

    /// Wraps already-foreign data as loaded from storage. Nothing is cast.
    pub fn from_foreign(schema: &Arc<Schema>, data: BsonDocument) -> Self {
        Self {
            schema: schema.clone(),
            data,
            cache: HashMap::new(),
        }
    }

    fn assign_defaults(&mut self) -> Result<()> {
        let schema = self.schema.clone();

        for field in schema.fields().iter().filter(|field| field.assigns()) {
            if !self.data.contains_key(field.name()) {
                field.get(self)?;
            }
        }

        Ok(())
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Native value of `attribute`. Undeclared keys are converted untyped.
    pub fn get(&mut self, attribute: &str) -> Result<Value> {
        let schema = self.schema.clone();

        match schema.field(attribute) {
            Some(field) => field.get(self),
            None => match self.data.get(attribute) {
                Some(value) => Ok(value.clone().into()),
                None => Err(Error::UnknownField {
                    schema: schema.name().to_owned(),
                    field: attribute.to_owned(),
                }),
            },
        }
    }

    pub fn set(&mut self, attribute: &str, value: impl Into<Value>) -> Result<()> {
        let schema = self.schema.clone();
        schema.try_field(attribute)?.set(self, value)
    }

    pub fn remove(&mut self, attribute: &str) -> Result<()> {
        let schema = self.schema.clone();
        schema.try_field(attribute)?.delete(self);
        Ok(())
    }

    pub fn contains(&self, attribute: &str) -> bool {
        let name = self.schema.field(attribute).map_or(attribute, |field| field.name());
        self.data.contains_key(name)
    }

    pub fn get_foreign(&self, name: &str) -> Option<&Bson> {
        self.data.get(name)
    }

    pub fn id(&self) -> Option<&Bson> {
        self.data.get("_id").filter(|id| **id != Bson::Null)
    }

    /// Stored pairs: declared fields in declaration order, then extras in
    /// insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Bson)> {
        let fields = self.schema.fields();
        let declared = fields
            .iter()
            .filter_map(|field| self.data.get(field.name()).map(|value| (field.name(), value)));
        let extras = self
            .data
            .iter()
            .filter(|(key, _)| !fields.iter().any(|field| field.name() == key.as_str()))
            .map(|(key, value)| (key.as_str(), value));

        declared.chain(extras)
    }

    pub fn to_foreign(&self) -> BsonDocument {
        self.iter()
            .map(|(key, value)| (key.to_owned(), value.clone()))
            .collect()
    }

    pub fn into_foreign(self) -> BsonDocument {
        self.to_foreign()
    }

    /// Checks that every required field holds a value or can produce one.
    pub fn validate(&self) -> Result<()> {
        for field in self.schema.fields().iter().filter(|field| field.is_required()) {
            let missing = match self.data.get(field.name()) {
                None => field.default_value().is_none(),
                Some(Bson::Null) => true,
                Some(_) => false,
            };

            if missing {
                return Err(Error::Unset {
                    schema: self.schema.name().to_owned(),
                    field: field.attribute().to_owned(),
                });
            }
        }

        Ok(())
    }
}
