use crate::{Error, Result};
use mongodb::bson::{Bson, spec::ElementType};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};

macro_rules! foreign_kinds {
    ($( $variant:ident => $alias:literal ),* $(,)?) => {
        /// BSON type tag describing how a field is represented on the wire.
        ///
        /// The string form is the alias accepted by `$type` queries and by
        /// `bsonType` in `$jsonSchema` validators.
        #[derive(Clone, Copy, Debug, Serialize, Deserialize, Hash, PartialEq, Eq, PartialOrd, Ord)]
        pub enum ForeignKind {
            $(
                #[serde(rename = $alias)]
                $variant
            ),*
        }

        impl ForeignKind {
            pub fn alias(self) -> &'static str {
                match self {
                    $( Self::$variant => $alias ),*
                }
            }
        }

        impl FromStr for ForeignKind {
            type Err = Error;

            fn from_str(value: &str) -> Result<Self> {
                match value {
                    $( $alias => Ok(Self::$variant), )*
                    other => Err(Error::value_error(format!("unknown BSON type alias `{other}`"))),
                }
            }
        }
    };
}

foreign_kinds! {
    Double => "double",
    String => "string",
    Object => "object",
    Array => "array",
    Binary => "binData",
    ObjectId => "objectId",
    Boolean => "bool",
    Date => "date",
    Null => "null",
    Regex => "regex",
    DbPointer => "dbPointer",
    JavaScript => "javascript",
    Int => "int",
    Timestamp => "timestamp",
    Long => "long",
    Decimal => "decimal",
    Number => "number",
}

impl ForeignKind {
    /// Kind of an existing foreign value.
    pub fn of(value: &Bson) -> Option<Self> {
        let kind = match value.element_type() {
            ElementType::Double => Self::Double,
            ElementType::String => Self::String,
            ElementType::EmbeddedDocument => Self::Object,
            ElementType::Array => Self::Array,
            ElementType::Binary => Self::Binary,
            ElementType::ObjectId => Self::ObjectId,
            ElementType::Boolean => Self::Boolean,
            ElementType::DateTime => Self::Date,
            ElementType::Null => Self::Null,
            ElementType::RegularExpression => Self::Regex,
            ElementType::DbPointer => Self::DbPointer,
            ElementType::JavaScriptCode | ElementType::JavaScriptCodeWithScope => Self::JavaScript,
            ElementType::Int32 => Self::Int,
            ElementType::Timestamp => Self::Timestamp,
            ElementType::Int64 => Self::Long,
            ElementType::Decimal128 => Self::Decimal,
            _ => return None,
        };

        Some(kind)
    }
}

impl Display for ForeignKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.alias())
    }
}

impl From<ForeignKind> for Bson {
    fn from(value: ForeignKind) -> Self {
        Bson::String(value.alias().to_owned())
    }
}
