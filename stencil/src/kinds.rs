//! Per-kind casting between native [`Value`]s and foreign [`Bson`].
//!
//! Scalar kinds are implemented here; the composite kinds (array, embed,
//! reference, mapping) live in [`crate::composite`].

use crate::{
    Error, Field, ForeignKind, ObjectIdGenerator, Result, Schema, composite, decimal,
    value::{Value, int_to_bson},
};
use chrono::{DateTime, Utc};
use mongodb::bson::{self, Bson, oid::ObjectId, spec::BinarySubtype};
use rust_decimal::{
    Decimal,
    prelude::{FromPrimitive, ToPrimitive},
};
use std::{str::FromStr, sync::Arc};

#[derive(Clone, Debug)]
pub enum Kind {
    /// No casting; values pass through their untyped conversion.
    Any,
    String(Text),
    Number,
    Integer,
    Long,
    Double,
    Boolean,
    Date,
    Binary,
    ObjectId(Option<Arc<ObjectIdGenerator>>),
    /// Optional number of fractional digits every value is rounded to.
    Decimal(Option<u32>),
    Array(Box<Field>),
    Embed(Vec<Arc<Schema>>),
    Reference(Reference),
    Mapping(Box<Field>, String),
}

/// Whitespace and case normalisation for string fields.
#[derive(Clone, Debug, Default)]
pub struct Text {
    pub strip: Option<Strip>,
    pub case: Option<Case>,
}

#[derive(Clone, Debug)]
pub enum Strip {
    Whitespace,
    Chars(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Case {
    Upper,
    Lower,
    Title,
}

#[derive(Clone, Debug, Default)]
pub struct Reference {
    pub kinds: Vec<Arc<Schema>>,
    /// Store `{ $ref, $id }` pointers instead of bare identifiers.
    pub concrete: bool,
    /// Dotted paths copied from the referenced document next to its `_id`.
    pub cache: Vec<String>,
}

const SCALAR_DISALLOWED: &[&str] = &["#array", "#document"];

impl Kind {
    pub fn foreign_kind(&self) -> Option<ForeignKind> {
        let kind = match self {
            Self::Any => return None,
            Self::String(_) => ForeignKind::String,
            Self::Number => ForeignKind::Number,
            Self::Integer => ForeignKind::Int,
            Self::Long => ForeignKind::Long,
            Self::Double => ForeignKind::Double,
            Self::Boolean => ForeignKind::Boolean,
            Self::Date => ForeignKind::Date,
            Self::Binary => ForeignKind::Binary,
            Self::ObjectId(_) => ForeignKind::ObjectId,
            Self::Decimal(_) => ForeignKind::Decimal,
            Self::Array(_) | Self::Mapping(..) => ForeignKind::Array,
            Self::Embed(_) => ForeignKind::Object,
            Self::Reference(reference) => {
                if !reference.cache.is_empty() {
                    ForeignKind::Object
                } else if reference.concrete {
                    ForeignKind::DbPointer
                } else {
                    ForeignKind::ObjectId
                }
            }
        };

        Some(kind)
    }

    /// Operators and operator tags the query builder refuses by default.
    pub(crate) fn default_disallowed(&self) -> &'static [&'static str] {
        match self {
            Self::Any | Self::Array(_) | Self::Mapping(..) => &[],
            Self::Embed(_) => &["#array", "#rel"],
            Self::Reference(_) => &["#array", "#rel", "#document"],
            _ => SCALAR_DISALLOWED,
        }
    }

    /// Whether the native form of a stored value is kept so repeated reads
    /// hand out the same container.
    pub(crate) fn caches_native(&self) -> bool {
        matches!(self, Self::Array(_) | Self::Mapping(..))
    }

    /// Field whose values make up a collection kind.
    pub fn element(&self) -> Option<&Field> {
        match self {
            Self::Array(element) | Self::Mapping(element, _) => Some(element),
            _ => None,
        }
    }

    /// Schemas a nested path can descend into.
    pub fn schemas(&self) -> &[Arc<Schema>] {
        match self {
            Self::Embed(kinds) => kinds,
            Self::Reference(reference) => &reference.kinds,
            _ => &[],
        }
    }

    pub(crate) fn to_foreign(&self, field: &Field, value: Value) -> Result<Bson> {
        match self {
            Self::Any => value.into_bson(),
            Self::String(text) => Ok(Bson::String(text.apply(stringify(value)?))),
            Self::Number => number(value),
            Self::Integer => integer(value).map(int_to_bson),
            Self::Long => integer(value).map(Bson::Int64),
            Self::Double => double(value).map(Bson::Double),
            Self::Boolean => Ok(Bson::Boolean(boolean(&value))),
            Self::Date => date(value).map(|dt| Bson::DateTime(bson::DateTime::from_millis(dt))),
            Self::Binary => binary(value).map(|bytes| {
                Bson::Binary(bson::Binary {
                    subtype: BinarySubtype::Generic,
                    bytes,
                })
            }),
            Self::ObjectId(generator) => {
                object_id(field, generator.as_deref(), value).map(Bson::ObjectId)
            }
            Self::Decimal(places) => {
                decimal_value(value, *places).map(|d| Bson::Decimal128(decimal::encode(d)))
            }
            Self::Array(element) => composite::array_to_foreign(element, value),
            Self::Embed(kinds) => composite::embed_to_foreign(field, kinds, value),
            Self::Reference(reference) => composite::reference_to_foreign(field, reference, value),
            Self::Mapping(element, _) => composite::mapping_to_foreign(element, value),
        }
    }

    pub(crate) fn to_native(&self, field: &Field, value: &Bson) -> Result<Value> {
        match self {
            Self::Any => Ok(value.clone().into()),
            Self::String(_) => match value {
                Bson::String(text) => Ok(Value::String(text.clone())),
                other => stringify(other.clone().into()).map(Value::String),
            },
            Self::Number => match value {
                Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_) => {
                    Ok(value.clone().into())
                }
                other => Err(mismatch("number", other)),
            },
            Self::Integer | Self::Long => integer(value.clone().into()).map(Value::Int),
            Self::Double => double(value.clone().into()).map(Value::Double),
            Self::Boolean => Ok(Value::Bool(boolean(&value.clone().into()))),
            Self::Date => match value {
                Bson::DateTime(dt) => from_millis(dt.timestamp_millis()).map(Value::DateTime),
                Bson::ObjectId(oid) => {
                    from_millis(oid.timestamp().timestamp_millis()).map(Value::DateTime)
                }
                other => Err(mismatch("date", other)),
            },
            Self::Binary => binary(value.clone().into()).map(Value::Binary),
            Self::ObjectId(_) => match value {
                Bson::ObjectId(oid) => Ok(Value::ObjectId(*oid)),
                Bson::String(hex) => parse_hex(hex).map(Value::ObjectId),
                other => Err(mismatch("object id", other)),
            },
            Self::Decimal(places) => {
                decimal_value(value.clone().into(), *places).map(Value::Decimal)
            }
            Self::Array(element) => composite::array_to_native(element, value),
            Self::Embed(kinds) => composite::embed_to_native(field, kinds, value),
            Self::Reference(reference) => composite::reference_to_native(reference, value),
            Self::Mapping(element, key) => composite::mapping_to_native(element, key, value),
        }
    }
}

impl Text {
    pub(crate) fn apply(&self, value: String) -> String {
        let value = match &self.strip {
            None => value,
            Some(Strip::Whitespace) => value.trim().to_owned(),
            Some(Strip::Chars(chars)) => value.trim_matches(|c| chars.contains(c)).to_owned(),
        };

        match self.case {
            None => value,
            Some(Case::Upper) => value.to_uppercase(),
            Some(Case::Lower) => value.to_lowercase(),
            Some(Case::Title) => title_case(&value),
        }
    }
}

fn title_case(value: &str) -> String {
    let mut output = String::with_capacity(value.len());
    let mut boundary = true;

    for c in value.chars() {
        if c.is_alphabetic() {
            if boundary {
                output.extend(c.to_uppercase());
            } else {
                output.extend(c.to_lowercase());
            }
            boundary = false;
        } else {
            output.push(c);
            boundary = true;
        }
    }

    output
}

pub(crate) fn mismatch(expected: &str, value: &Bson) -> Error {
    Error::type_error(format!(
        "expected {expected}, found foreign {}",
        ForeignKind::of(value).map_or("value", ForeignKind::alias)
    ))
}

fn unsupported(expected: &str, value: &Value) -> Error {
    Error::type_error(format!("cannot cast {} to {expected}", value.describe()))
}

fn from_millis(millis: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| Error::value_error(format!("timestamp {millis} is out of range")))
}

fn stringify(value: Value) -> Result<String> {
    let text = match value {
        Value::String(text) => text,
        Value::Int(value) => value.to_string(),
        Value::Double(value) => value.to_string(),
        Value::Bool(value) => value.to_string(),
        Value::Decimal(value) => value.to_string(),
        Value::ObjectId(value) => value.to_hex(),
        Value::DateTime(value) => value.to_rfc3339(),
        Value::Binary(bytes) => {
            String::from_utf8(bytes).map_err(|e| Error::value_error(e.to_string()))?
        }
        other => return Err(unsupported("string", &other)),
    };

    Ok(text)
}

fn number(value: Value) -> Result<Bson> {
    match value {
        Value::Int(value) => Ok(int_to_bson(value)),
        Value::Double(value) => Ok(Bson::Double(value)),
        Value::Bool(value) => Ok(Bson::Int32(value.into())),
        Value::Decimal(value) => value
            .to_f64()
            .map(Bson::Double)
            .ok_or_else(|| Error::value_error(format!("decimal {value} does not fit a double"))),
        Value::String(text) => {
            let text = text.trim();
            if !text.is_empty() && text.chars().all(|c| c.is_ascii_digit()) {
                text.parse::<i64>()
                    .map(int_to_bson)
                    .map_err(|e| Error::value_error(format!("`{text}`: {e}")))
            } else {
                text.parse::<f64>()
                    .map(Bson::Double)
                    .map_err(|_| Error::value_error(format!("`{text}` is not numeric")))
            }
        }
        other => Err(unsupported("number", &other)),
    }
}

fn integer(value: Value) -> Result<i64> {
    match value {
        Value::Int(value) => Ok(value),
        Value::Bool(value) => Ok(value.into()),
        #[allow(clippy::cast_possible_truncation)]
        Value::Double(value) if value.is_finite() => Ok(value.trunc() as i64),
        Value::Double(value) => Err(Error::value_error(format!("{value} is not an integer"))),
        Value::Decimal(value) => value
            .trunc()
            .to_i64()
            .ok_or_else(|| Error::value_error(format!("{value} does not fit an integer"))),
        Value::String(text) => text
            .trim()
            .parse()
            .map_err(|_| Error::value_error(format!("`{text}` is not an integer"))),
        other => Err(unsupported("integer", &other)),
    }
}

fn double(value: Value) -> Result<f64> {
    match value {
        #[allow(clippy::cast_precision_loss)]
        Value::Int(value) => Ok(value as f64),
        Value::Double(value) => Ok(value),
        Value::Bool(value) => Ok(f64::from(u8::from(value))),
        Value::Decimal(value) => value
            .to_f64()
            .ok_or_else(|| Error::value_error(format!("decimal {value} does not fit a double"))),
        Value::String(text) => text
            .trim()
            .parse()
            .map_err(|_| Error::value_error(format!("`{text}` is not numeric"))),
        other => Err(unsupported("double", &other)),
    }
}

const TRUTHY: &[&str] = &["true", "t", "yes", "y", "on", "1"];
const FALSY: &[&str] = &["false", "f", "no", "n", "off", "0"];

/// Token-based boolean coercion. Unrecognised values fall back to
/// [`Value::truthy`], so an arbitrary non-empty string is `true`.
pub fn boolean(value: &Value) -> bool {
    if let Value::String(text) = value {
        let token = text.trim().to_lowercase();
        if TRUTHY.contains(&token.as_str()) {
            return true;
        }
        if FALSY.contains(&token.as_str()) {
            return false;
        }
    }

    value.truthy()
}

fn date(value: Value) -> Result<i64> {
    match value {
        Value::DateTime(value) => Ok(value.timestamp_millis()),
        Value::ObjectId(value) => Ok(value.timestamp().timestamp_millis()),
        other => Err(unsupported("date", &other)),
    }
}

fn binary(value: Value) -> Result<Vec<u8>> {
    match value {
        Value::Binary(bytes) => Ok(bytes),
        Value::String(text) => Ok(text.into_bytes()),
        other => Err(unsupported("binary", &other)),
    }
}

fn parse_hex(hex: &str) -> Result<ObjectId> {
    if hex.len() != 24 {
        return Err(Error::value_error(format!(
            "`{hex}` is not a 24 character hex identifier"
        )));
    }

    ObjectId::parse_str(hex).map_err(|e| Error::value_error(format!("`{hex}`: {e}")))
}

fn object_id(
    field: &Field,
    generator: Option<&ObjectIdGenerator>,
    value: Value,
) -> Result<ObjectId> {
    match value {
        Value::ObjectId(value) => Ok(value),
        Value::String(hex) => parse_hex(&hex),
        Value::Binary(bytes) => <[u8; 12]>::try_from(bytes.as_slice())
            .map(ObjectId::from_bytes)
            .map_err(|_| Error::value_error(format!("expected 12 bytes, found {}", bytes.len()))),
        Value::DbRef(reference) => {
            let collection = field
                .owner()
                .and_then(|owner| owner.collection().map(str::to_owned));

            if let Some(collection) = collection {
                if collection != reference.collection {
                    return Err(Error::value_error(format!(
                        "reference targets `{}`, expected `{collection}`",
                        reference.collection
                    )));
                }
            }

            match reference.id {
                Bson::ObjectId(id) => Ok(id),
                other => Err(mismatch("object id", &other)),
            }
        }
        Value::DateTime(moment) => generate_at(generator, moment),
        Value::Duration(delta) => Utc::now()
            .checked_add_signed(delta)
            .ok_or_else(|| Error::value_error(format!("now plus {delta} is out of range")))
            .and_then(|moment| generate_at(generator, moment)),
        other => Err(unsupported("object id", &other)),
    }
}

fn generate_at(generator: Option<&ObjectIdGenerator>, moment: DateTime<Utc>) -> Result<ObjectId> {
    match generator {
        Some(generator) => generator.generate_at(moment),
        None => ObjectIdGenerator::global().generate_at(moment),
    }
}

fn decimal_value(value: Value, places: Option<u32>) -> Result<Decimal> {
    let value = match value {
        Value::Decimal(value) => value,
        Value::Int(value) => Decimal::from(value),
        Value::Double(value) => Decimal::from_f64(value)
            .ok_or_else(|| Error::value_error(format!("{value} is not a finite decimal")))?,
        Value::String(text) => Decimal::from_str(text.trim())
            .map_err(|e| Error::value_error(format!("`{text}`: {e}")))?,
        Value::Bson(Bson::Decimal128(value)) => decimal::decode(value)?,
        other => return Err(unsupported("decimal", &other)),
    };

    Ok(places.map_or(value, |places| decimal::quantize(value, places)))
}
