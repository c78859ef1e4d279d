//! Error taxonomy shared by every layer of the crate.

use thiserror::Error;

/// Result type alias used throughout Stencil.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Wrong category of input handed to a caster.
    #[error("type error: {0}")]
    Type(String),

    /// Right category of input, invalid content.
    #[error("value error: {0}")]
    Value(String),

    /// Read of a field that holds no value, has no default and is not nullable.
    #[error("field `{field}` of `{schema}` is unset")]
    Unset { schema: String, field: String },

    /// Write rejected because a mutually exclusive sibling already holds a value.
    #[error("cannot set `{field}` while `{conflict}` is set")]
    Exclusive { field: String, conflict: String },

    /// Attribute-style lookup of a field that does not exist.
    #[error("`{schema}` has no field `{field}`")]
    UnknownField { schema: String, field: String },

    /// Query operator forbidden for the field it was applied to.
    #[error("operator `{operator}` is not implemented for field `{field}`")]
    NotImplemented { operator: String, field: String },

    /// Structurally ambiguous request.
    #[error("ambiguous: {0}")]
    Ambiguous(String),

    /// Invalid schema declaration.
    #[error("invalid schema: {0}")]
    Schema(String),

    #[error(transparent)]
    Storage(#[from] mongodb::error::Error),

    #[error(transparent)]
    Serialization(#[from] mongodb::bson::ser::Error),
}

impl Error {
    pub(crate) fn type_error(message: impl Into<String>) -> Self {
        Self::Type(message.into())
    }

    pub(crate) fn value_error(message: impl Into<String>) -> Self {
        Self::Value(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exclusive_names_both_fields() {
        let err = Error::Exclusive {
            field: "b".into(),
            conflict: "a".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("`b`"));
        assert!(msg.contains("`a`"));
    }

    #[test]
    fn not_implemented_names_operator() {
        let err = Error::NotImplemented {
            operator: "$size".into(),
            field: "name".into(),
        };
        assert_eq!(
            err.to_string(),
            "operator `$size` is not implemented for field `name`"
        );
    }
}
