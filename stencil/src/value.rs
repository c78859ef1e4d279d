//! Native, in-memory values.
//!
//! A [`Value`] is what a [`Field`](crate::Field) hands back on read and what it
//! accepts on write. Foreign (wire) values are plain [`Bson`].

use crate::{Document, Error, Result, decimal};
use chrono::{DateTime, TimeDelta, Utc};
use mongodb::bson::{self, Bson, Document as BsonDocument, oid::ObjectId, spec::BinarySubtype};
use rust_decimal::Decimal;
use std::{ops::Deref, sync::Arc};

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    Decimal(Decimal),
    DateTime(DateTime<Utc>),
    Duration(TimeDelta),
    Binary(Vec<u8>),
    ObjectId(ObjectId),
    DbRef(DbRef),
    Array(Array),
    Map(Map),
    Document(Box<Document>),
    /// Foreign value with no native counterpart (regex, timestamp, code).
    Bson(Bson),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    /// Loose truthiness: empty, zero and null values are false.
    pub fn truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(value) => *value,
            Self::Int(value) => *value != 0,
            Self::Double(value) => *value != 0.0,
            Self::String(value) => !value.is_empty(),
            Self::Decimal(value) => !value.is_zero(),
            Self::Duration(value) => !value.is_zero(),
            Self::Binary(value) => !value.is_empty(),
            Self::Array(value) => !value.is_empty(),
            Self::Map(value) => !value.is_empty(),
            Self::DateTime(_)
            | Self::ObjectId(_)
            | Self::DbRef(_)
            | Self::Document(_)
            | Self::Bson(_) => true,
        }
    }

    /// Short description of the value's category, used in error messages.
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Int(_) => "integer",
            Self::Double(_) => "double",
            Self::String(_) => "string",
            Self::Decimal(_) => "decimal",
            Self::DateTime(_) => "datetime",
            Self::Duration(_) => "duration",
            Self::Binary(_) => "binary",
            Self::ObjectId(_) => "object id",
            Self::DbRef(_) => "document reference",
            Self::Array(_) => "array",
            Self::Map(_) => "mapping",
            Self::Document(_) => "document",
            Self::Bson(_) => "foreign value",
        }
    }

    /// Untyped conversion to the wire form, used where no field drives the cast.
    pub fn into_bson(self) -> Result<Bson> {
        let bson = match self {
            Self::Null => Bson::Null,
            Self::Bool(value) => Bson::Boolean(value),
            Self::Int(value) => int_to_bson(value),
            Self::Double(value) => Bson::Double(value),
            Self::String(value) => Bson::String(value),
            Self::Decimal(value) => Bson::Decimal128(decimal::encode(value)),
            Self::DateTime(value) => {
                Bson::DateTime(bson::DateTime::from_millis(value.timestamp_millis()))
            }
            Self::Duration(value) => {
                return Err(Error::type_error(format!(
                    "a duration ({value}) has no foreign representation"
                )));
            }
            Self::Binary(bytes) => Bson::Binary(bson::Binary {
                subtype: BinarySubtype::Generic,
                bytes,
            }),
            Self::ObjectId(value) => Bson::ObjectId(value),
            Self::DbRef(value) => Bson::Document(value.to_document()),
            Self::Array(values) => Bson::Array(
                values
                    .iter()
                    .cloned()
                    .map(Value::into_bson)
                    .collect::<Result<_>>()?,
            ),
            Self::Map(map) => Bson::Document(map.into_document()?),
            Self::Document(document) => Bson::Document(document.to_foreign()),
            Self::Bson(value) => value,
        };

        Ok(bson)
    }
}

pub(crate) fn int_to_bson(value: i64) -> Bson {
    match i32::try_from(value) {
        Ok(value) => Bson::Int32(value),
        Err(_) => Bson::Int64(value),
    }
}

impl From<Bson> for Value {
    fn from(value: Bson) -> Self {
        match value {
            Bson::Null | Bson::Undefined => Self::Null,
            Bson::Boolean(value) => Self::Bool(value),
            Bson::Int32(value) => Self::Int(value.into()),
            Bson::Int64(value) => Self::Int(value),
            Bson::Double(value) => Self::Double(value),
            Bson::String(value) => Self::String(value),
            Bson::ObjectId(value) => Self::ObjectId(value),
            Bson::DateTime(value) => DateTime::from_timestamp_millis(value.timestamp_millis())
                .map_or(Self::Bson(Bson::DateTime(value)), Self::DateTime),
            Bson::Binary(value) => Self::Binary(value.bytes),
            Bson::Decimal128(value) => {
                decimal::decode(value).map_or(Self::Bson(Bson::Decimal128(value)), Self::Decimal)
            }
            Bson::Array(values) => Self::Array(values.into_iter().map(Value::from).collect()),
            Bson::Document(document) => match DbRef::from_document(&document) {
                Some(reference) => Self::DbRef(reference),
                None => Self::Map(
                    document
                        .into_iter()
                        .map(|(k, v)| (k, Value::from(v)))
                        .collect(),
                ),
            },
            other => Self::Bson(other),
        }
    }
}

macro_rules! value_from {
    ($( $ty:ty => $variant:ident ),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Self::$variant(value.into())
                }
            }
        )*
    };
}

value_from! {
    bool => Bool,
    i32 => Int,
    i64 => Int,
    u32 => Int,
    f64 => Double,
    &str => String,
    String => String,
    Decimal => Decimal,
    DateTime<Utc> => DateTime,
    TimeDelta => Duration,
    ObjectId => ObjectId,
    DbRef => DbRef,
    Array => Array,
    Map => Map,
}

impl From<Document> for Value {
    fn from(value: Document) -> Self {
        Self::Document(Box::new(value))
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Self::Array(value.into())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Shared list produced by native casting.
///
/// Cloning shares the underlying storage, so a cached array handed out twice
/// is the same container ([`Array::ptr_eq`]).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Array(Arc<Vec<Value>>);

impl Array {
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn to_vec(&self) -> Vec<Value> {
        self.0.as_ref().clone()
    }
}

impl Deref for Array {
    type Target = [Value];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<Value>> for Array {
    fn from(value: Vec<Value>) -> Self {
        Self(Arc::new(value))
    }
}

impl FromIterator<Value> for Array {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self(Arc::new(iter.into_iter().collect()))
    }
}

/// Insertion-ordered string-keyed mapping of native values.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Map(Vec<(String, Value)>);

impl Map {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Replaces the value in place when the key exists, appends otherwise.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();

        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.0.push((key, value));
                None
            }
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let index = self.0.iter().position(|(k, _)| k == key)?;
        Some(self.0.remove(index).1)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.0.iter().map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_document(self) -> Result<BsonDocument> {
        self.0
            .into_iter()
            .map(|(k, v)| Ok((k, v.into_bson()?)))
            .collect()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Map {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl IntoIterator for Map {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Collection-qualified pointer to another document.
///
/// Stored on the wire as `{ "$ref": collection, "$id": id }`.
#[derive(Clone, Debug, PartialEq)]
pub struct DbRef {
    pub collection: String,
    pub id: Bson,
}

impl DbRef {
    pub fn new(collection: impl Into<String>, id: impl Into<Bson>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }

    pub fn to_document(&self) -> BsonDocument {
        let mut document = BsonDocument::new();
        document.insert("$ref", self.collection.clone());
        document.insert("$id", self.id.clone());
        document
    }

    pub fn from_document(document: &BsonDocument) -> Option<Self> {
        let collection = document.get_str("$ref").ok()?;
        let id = document.get("$id")?;

        Some(Self::new(collection, id.clone()))
    }
}
