//! Keyword-driven builders.
//!
//! Keys are double-underscore separated: `address__city__ne`. Path segments
//! resolve attribute names against the schema and descend through nested
//! fields; numeric segments index into arrays and `S` or `$` address the
//! positionally matched element.

use crate::{
    Error, ForeignKind, Result, Schema, kinds,
    query::{Filter, Q, Update},
    value::Value,
};
use mongodb::bson::{Bson, Document, doc};
use std::{str::FromStr, sync::Arc};

const FILTER_OPERATORS: &[&str] = &[
    "eq", "ne", "gt", "gte", "lt", "lte", "in", "nin", "all", "match", "size", "exists", "type",
    "re",
];

/// Update prefixes whose operands are not cast through the target field.
const PASSTHROUGH: &[&str] = &[
    "rename",
    "unset",
    "pull",
    "push",
    "bit_and",
    "bit_or",
    "bit_xor",
    "current_date",
    "add_to_set",
    "pop",
];

fn resolve(schema: &Arc<Schema>, segments: &[&str]) -> Result<Q> {
    let (first, rest) = segments
        .split_first()
        .ok_or_else(|| Error::value_error("empty field path"))?;

    let mut q = Q::new(schema, first)?;

    for segment in rest {
        q = match segment.parse::<usize>() {
            Ok(index) => q.index(index)?,
            Err(_) if matches!(*segment, "S" | "$") => q.positional()?,
            Err(_) => q.get(segment)?,
        };
    }

    Ok(q)
}

fn list(value: Value) -> Vec<Value> {
    match value {
        Value::Array(values) => values.to_vec(),
        Value::Bson(Bson::Array(values)) => values.into_iter().map(Value::from).collect(),
        other => vec![other],
    }
}

fn subdocument(value: Value) -> Result<Document> {
    match value {
        Value::Map(map) => map.into_document(),
        Value::Bson(Bson::Document(document)) => Ok(document),
        Value::Document(document) => Ok(document.to_foreign()),
        other => Err(Error::type_error(format!(
            "expected a mapping, found {}",
            other.describe()
        ))),
    }
}

/// Builds a filter from `(key, operand)` pairs, ANDing the conditions.
///
/// A key may end in an operator (`eq ne gt gte lt lte in nin all match size
/// exists type re`, `eq` when omitted) and may start with `not`, which wraps
/// the condition in `$not`.
pub fn filter<K: AsRef<str>, V: Into<Value>>(
    schema: &Arc<Schema>,
    pairs: impl IntoIterator<Item = (K, V)>,
) -> Result<Filter> {
    pairs.into_iter().try_fold(Filter::default(), |filter, (key, value)| {
        Ok(filter & condition(schema, key.as_ref(), value.into())?)
    })
}

fn condition(schema: &Arc<Schema>, key: &str, value: Value) -> Result<Filter> {
    let mut segments: Vec<&str> = key.split("__").collect();

    let negated = segments.len() > 1 && segments[0] == "not" && schema.field("not").is_none();
    if negated {
        segments.remove(0);
    }

    let operator = if segments.len() > 1
        && segments
            .last()
            .is_some_and(|last| FILTER_OPERATORS.contains(last))
    {
        segments.pop()
    } else {
        None
    };

    let q = resolve(schema, &segments)?;

    let filter = match operator.unwrap_or("eq") {
        "ne" => q.ne(value)?,
        "gt" => q.gt(value)?,
        "gte" => q.gte(value)?,
        "lt" => q.lt(value)?,
        "lte" => q.lte(value)?,
        "in" => q.any(list(value))?,
        "nin" => q.none(list(value))?,
        "all" => q.all(list(value))?,
        "match" => q.elem_match(subdocument(value)?)?,
        "size" => match value {
            Value::Int(length) => q.size(
                u32::try_from(length)
                    .map_err(|e| Error::value_error(format!("size {length}: {e}")))?,
            )?,
            other => {
                return Err(Error::type_error(format!(
                    "size takes an integer, found {}",
                    other.describe()
                )));
            }
        },
        "exists" => {
            let mut fragment = Document::new();
            fragment.insert(q.path()?, doc! { "$exists": i32::from(!kinds::boolean(&value)) });
            Filter::new(fragment)
        }
        "type" => {
            let aliases = list(value)
                .into_iter()
                .filter(|value| !value.is_null())
                .map(|value| match value {
                    Value::String(alias) => ForeignKind::from_str(&alias),
                    other => Err(Error::type_error(format!(
                        "type aliases are strings, found {}",
                        other.describe()
                    ))),
                })
                .collect::<Result<Vec<_>>>()?;
            q.of_type(&aliases)?
        }
        "re" => match value {
            Value::String(pattern) => q.re([pattern])?,
            other => {
                return Err(Error::type_error(format!(
                    "re takes a string, found {}",
                    other.describe()
                )));
            }
        },
        _ => q.eq(value)?,
    };

    if negated {
        Ok(Filter::new(doc! { "$not": filter.into_query() }))
    } else {
        Ok(filter)
    }
}

fn update_operator(prefix: &str) -> Option<&'static str> {
    let operator = match prefix {
        "set" => "$set",
        "unset" => "$unset",
        "inc" | "add" | "dec" | "sub" => "$inc",
        "mul" => "$mul",
        "min" => "$min",
        "max" => "$max",
        "push" => "$push",
        "pull" => "$pull",
        "add_to_set" => "$addToSet",
        "pop" => "$pop",
        "rename" => "$rename",
        "bit_and" | "bit_or" | "bit_xor" => "$bit",
        "current_date" => "$currentDate",
        "set_on_insert" => "$setOnInsert",
        _ => return None,
    };

    Some(operator)
}

fn negate(value: Value) -> Result<Value> {
    match value {
        Value::Int(value) => value
            .checked_neg()
            .map(Value::Int)
            .ok_or_else(|| Error::value_error(format!("cannot negate {value}"))),
        Value::Double(value) => Ok(Value::Double(-value)),
        Value::Decimal(value) => Ok(Value::Decimal(-value)),
        other => Err(Error::type_error(format!("cannot negate {}", other.describe()))),
    }
}

/// Builds an update from `(key, operand)` pairs.
///
/// A key may start with an operation (`set` when omitted, `unset inc add dec
/// sub mul min max push pull add_to_set pop rename bit_and bit_or bit_xor
/// current_date set_on_insert`). Operations on the same operator share one
/// block.
pub fn update<K: AsRef<str>, V: Into<Value>>(
    schema: &Arc<Schema>,
    pairs: impl IntoIterator<Item = (K, V)>,
) -> Result<Update> {
    pairs.into_iter().try_fold(Update::default(), |update, (key, value)| {
        Ok(update & operation(schema, key.as_ref(), value.into())?)
    })
}

fn operation(schema: &Arc<Schema>, key: &str, value: Value) -> Result<Update> {
    let mut segments: Vec<&str> = key.split("__").collect();

    let prefixed = segments.len() > 1
        && update_operator(segments[0]).is_some()
        && schema.field(segments[0]).is_none();
    let prefix = if prefixed { segments.remove(0) } else { "set" };
    let operator = update_operator(prefix).unwrap_or("$set");

    let q = resolve(schema, &segments)?;
    let path = q.path()?.to_owned();

    let operand = if PASSTHROUGH.contains(&prefix) {
        value.into_bson()?
    } else if matches!(prefix, "dec" | "sub") {
        q.cast_stored(negate(value)?)?
    } else {
        q.cast_stored(value)?
    };

    let operand = match prefix.strip_prefix("bit_") {
        Some(bitwise) => {
            let mut operation = Document::new();
            operation.insert(bitwise, operand);
            Bson::Document(operation)
        }
        None => operand,
    };

    Ok(Update::operation(operator, path, operand))
}

/// Builds a projection document.
///
/// Names prefixed with `-` or `!` are excluded, bare or `+` names included.
/// Without explicit inclusions the schema's default projection minus the
/// exclusions is used. `always` is included unconditionally. An empty result
/// projects `_id` alone.
pub fn projection<S: AsRef<str>>(
    schema: &Arc<Schema>,
    fields: impl IntoIterator<Item = S>,
    always: impl IntoIterator<Item = S>,
) -> Result<Document> {
    let path = |name: &str| -> Result<String> {
        let segments: Vec<&str> = name.split("__").flat_map(|part| part.split('.')).collect();
        resolve(schema, &segments)?.path().map(str::to_owned)
    };

    let mut include = Vec::new();
    let mut exclude = Vec::new();

    for name in fields {
        let name = name.as_ref();
        match name.chars().next() {
            Some('-' | '!') => exclude.push(path(&name[1..])?),
            Some('+') => include.push(path(&name[1..])?),
            _ => include.push(path(name)?),
        }
    }

    if include.is_empty() {
        include = schema
            .default_projection()
            .into_iter()
            .filter(|name| !exclude.contains(name))
            .collect();
    }

    for name in always {
        let name = path(name.as_ref())?;
        if !include.contains(&name) {
            include.push(name);
        }
    }

    let mut projection = Document::new();
    for name in include {
        projection.insert(name, true);
    }

    if projection.is_empty() {
        projection.insert("_id", true);
    }

    Ok(projection)
}
