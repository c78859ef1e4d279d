//! Casting for the kinds that delegate to other fields or schemas.

use crate::{
    Document, Error, Field, Result, Schema,
    kinds::{Reference, mismatch},
    value::{Array, DbRef, Map, Value},
};
use mongodb::bson::{Bson, Document as BsonDocument, doc, oid::ObjectId};
use std::sync::Arc;

/// Key recording the concrete schema of a value stored in a multi-kind slot.
pub const DISCRIMINATOR: &str = "_cls";

pub(crate) fn array_to_foreign(element: &Field, value: Value) -> Result<Bson> {
    array_with(element, value, Field::to_foreign)
}

/// Array query operand, each element cast with [`Field::to_operand`].
pub(crate) fn array_operand(element: &Field, value: Value) -> Result<Bson> {
    array_with(element, value, Field::to_operand)
}

fn array_with(
    element: &Field,
    value: Value,
    cast: fn(&Field, Value) -> Result<Bson>,
) -> Result<Bson> {
    let values = match value {
        Value::Array(values) => values.to_vec(),
        Value::Bson(Bson::Array(values)) => values.into_iter().map(Value::from).collect(),
        Value::Map(_) | Value::Document(_) => {
            return Err(Error::type_error("an array is not a mapping"));
        }
        other => {
            return Err(Error::type_error(format!(
                "cannot cast {} to array",
                other.describe()
            )));
        }
    };

    values
        .into_iter()
        .map(|value| cast(element, value))
        .collect::<Result<_>>()
        .map(Bson::Array)
}

pub(crate) fn array_to_native(element: &Field, value: &Bson) -> Result<Value> {
    match value {
        Bson::Array(values) => values
            .iter()
            .map(|value| element.to_native(value))
            .collect::<Result<Array>>()
            .map(Value::Array),
        other => Err(mismatch("array", other)),
    }
}

pub(crate) fn mapping_to_foreign(element: &Field, value: Value) -> Result<Bson> {
    match value {
        Value::Map(map) => array_to_foreign(element, Value::Array(map.values().cloned().collect())),
        other => array_to_foreign(element, other),
    }
}

pub(crate) fn mapping_to_native(element: &Field, key: &str, value: &Bson) -> Result<Value> {
    let Value::Array(entries) = array_to_native(element, value)? else {
        return Err(mismatch("array", value));
    };

    let mut map = Map::new();

    for entry in entries.iter() {
        let entry_key = match entry {
            Value::Document(document) => {
                let name = document.schema().field(key).map_or(key, |field| field.name());
                document.get_foreign(name).cloned().map(Value::from)
            }
            Value::Map(fields) => fields.get(key).cloned(),
            _ => None,
        };

        let entry_key = match entry_key {
            Some(Value::String(text)) => text,
            Some(Value::Int(number)) => number.to_string(),
            Some(Value::ObjectId(id)) => id.to_hex(),
            _ => {
                return Err(Error::value_error(format!(
                    "mapping entry has no usable `{key}` key"
                )));
            }
        };

        map.insert(entry_key, entry.clone());
    }

    Ok(Value::Map(map))
}

fn select(field: &Field, kinds: &[Arc<Schema>], name: Option<&str>) -> Result<Arc<Schema>> {
    match (name, kinds) {
        (Some(name), kinds) => kinds
            .iter()
            .find(|kind| kind.name() == name)
            .cloned()
            .ok_or_else(|| {
                Error::value_error(format!(
                    "`{name}` is not an accepted kind for `{}`",
                    field.name()
                ))
            }),
        (None, [kind]) => Ok(kind.clone()),
        (None, _) => Err(Error::Ambiguous(format!(
            "`{}` accepts several kinds and the value carries no `{DISCRIMINATOR}`",
            field.name()
        ))),
    }
}

fn accepts(kinds: &[Arc<Schema>], schema: &Arc<Schema>) -> bool {
    kinds.is_empty() || kinds.iter().any(|kind| kind.is(schema))
}

fn tagged(name: &str, foreign: BsonDocument) -> BsonDocument {
    let mut document = doc! { DISCRIMINATOR: name };
    document.extend(foreign);
    document
}

pub(crate) fn embed_to_foreign(field: &Field, kinds: &[Arc<Schema>], value: Value) -> Result<Bson> {
    embed_with(field, kinds, value, Document::from_map)
}

/// Embedded query operand. Maps are cast without materialising defaults.
pub(crate) fn embed_operand(field: &Field, kinds: &[Arc<Schema>], value: Value) -> Result<Bson> {
    embed_with(field, kinds, value, Document::from_operand)
}

fn embed_with(
    field: &Field,
    kinds: &[Arc<Schema>],
    value: Value,
    build: fn(&Arc<Schema>, Map) -> Result<Document>,
) -> Result<Bson> {
    let document = match value {
        Value::Document(document) => {
            if !accepts(kinds, document.schema()) {
                return Err(Error::type_error(format!(
                    "`{}` is not an accepted kind for `{}`",
                    document.schema().name(),
                    field.name()
                )));
            }
            *document
        }
        Value::Map(mut map) => {
            let name = match map.remove(DISCRIMINATOR) {
                Some(Value::String(name)) => Some(name),
                _ => None,
            };
            let schema = select(field, kinds, name.as_deref())?;
            build(&schema, map)?
        }
        other => {
            return Err(Error::type_error(format!(
                "cannot embed {} in `{}`",
                other.describe(),
                field.name()
            )));
        }
    };

    let foreign = document.to_foreign();

    if kinds.len() > 1 {
        Ok(Bson::Document(tagged(document.schema().name(), foreign)))
    } else {
        Ok(Bson::Document(foreign))
    }
}

pub(crate) fn embed_to_native(field: &Field, kinds: &[Arc<Schema>], value: &Bson) -> Result<Value> {
    let Bson::Document(foreign) = value else {
        return Err(mismatch("embedded document", value));
    };

    let mut foreign = foreign.clone();
    let name = match foreign.remove(DISCRIMINATOR) {
        Some(Bson::String(name)) => Some(name),
        _ => None,
    };
    let schema = select(field, kinds, name.as_deref())?;

    Ok(Document::from_foreign(&schema, foreign).into())
}

pub(crate) fn reference_to_foreign(
    field: &Field,
    reference: &Reference,
    value: Value,
) -> Result<Bson> {
    match value {
        Value::Document(document) => {
            if !accepts(&reference.kinds, document.schema()) {
                return Err(Error::type_error(format!(
                    "`{}` is not an accepted kind for `{}`",
                    document.schema().name(),
                    field.name()
                )));
            }

            let id = match document.get_foreign("_id") {
                Some(Bson::Null) | None => {
                    return Err(Error::value_error(format!(
                        "cannot reference a `{}` instance that has no stored identifier",
                        document.schema().name()
                    )));
                }
                Some(id) => id.clone(),
            };

            if !reference.cache.is_empty() {
                return Ok(Bson::Document(cached(&document.to_foreign(), id, &reference.cache)));
            }

            if reference.concrete {
                let collection = document.schema().collection().ok_or_else(|| {
                    Error::value_error(format!(
                        "`{}` has no collection to point at",
                        document.schema().name()
                    ))
                })?;
                return Ok(Bson::Document(DbRef::new(collection, id).to_document()));
            }

            Ok(id)
        }
        Value::ObjectId(id) => pointer(field, reference, Bson::ObjectId(id)),
        Value::String(hex) if hex.len() == 24 => {
            let id = ObjectId::parse_str(&hex)
                .map_err(|e| Error::value_error(format!("`{hex}`: {e}")))?;
            pointer(field, reference, Bson::ObjectId(id))
        }
        Value::DbRef(target) => {
            if reference.concrete {
                Ok(Bson::Document(target.to_document()))
            } else {
                pointer(field, reference, target.id)
            }
        }
        Value::Map(map) if !reference.cache.is_empty() && map.contains_key("_id") => {
            map.into_document().map(Bson::Document)
        }
        other => Err(Error::type_error(format!(
            "cannot reference {} from `{}`",
            other.describe(),
            field.name()
        ))),
    }
}

/// Wraps a bare identifier in the shape the reference stores.
fn pointer(field: &Field, reference: &Reference, id: Bson) -> Result<Bson> {
    if !reference.cache.is_empty() {
        return Ok(Bson::Document(doc! { "_id": id }));
    }

    if reference.concrete {
        let collection = match reference.kinds.as_slice() {
            [kind] => kind.collection(),
            _ => None,
        }
        .ok_or_else(|| {
            Error::Ambiguous(format!(
                "cannot qualify a bare identifier for `{}` without a single target collection",
                field.name()
            ))
        })?;
        return Ok(Bson::Document(DbRef::new(collection, id).to_document()));
    }

    Ok(id)
}

fn cached(source: &BsonDocument, id: Bson, paths: &[String]) -> BsonDocument {
    let mut output = doc! { "_id": id };

    for path in paths {
        if let Some(value) = lookup(source, path) {
            insert_path(&mut output, path, value.clone());
        }
    }

    output
}

/// Dotted-path lookup through nested documents. Anything else on the way is a miss.
pub(crate) fn lookup<'a>(source: &'a BsonDocument, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = source.get(segments.next()?)?;

    for segment in segments {
        match current {
            Bson::Document(document) => current = document.get(segment)?,
            _ => return None,
        }
    }

    Some(current)
}

fn insert_path(target: &mut BsonDocument, path: &str, value: Bson) {
    match path.split_once('.') {
        None => {
            target.insert(path, value);
        }
        Some((head, rest)) => {
            if !matches!(target.get(head), Some(Bson::Document(_))) {
                target.insert(head, BsonDocument::new());
            }
            if let Some(Bson::Document(child)) = target.get_mut(head) {
                insert_path(child, rest, value);
            }
        }
    }
}

pub(crate) fn reference_to_native(reference: &Reference, value: &Bson) -> Result<Value> {
    match value {
        Bson::ObjectId(id) => Ok(Value::ObjectId(*id)),
        Bson::Document(foreign) => {
            if let Some(target) = DbRef::from_document(foreign) {
                return Ok(Value::DbRef(target));
            }

            match reference.kinds.as_slice() {
                [kind] => Ok(Document::from_foreign(kind, foreign.clone()).into()),
                _ => Ok(value.clone().into()),
            }
        }
        other => Ok(other.clone().into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_follows_documents_only() {
        let source = doc! { "a": { "b": 1 }, "list": [ { "b": 2 } ] };
        assert_eq!(lookup(&source, "a.b"), Some(&Bson::Int32(1)));
        assert_eq!(lookup(&source, "list.b"), None);
        assert_eq!(lookup(&source, "missing.b"), None);
    }

    #[test]
    fn insert_path_builds_nested_documents() {
        let mut target = doc! { "_id": 1 };
        insert_path(&mut target, "address.city", Bson::from("Montréal"));
        insert_path(&mut target, "address.country", Bson::from("CA"));
        assert_eq!(
            target,
            doc! { "_id": 1, "address": { "city": "Montréal", "country": "CA" } }
        );
    }

    #[test]
    fn tag_comes_first() {
        assert_eq!(
            tagged("Card", doc! { "number": 1 }).keys().collect::<Vec<_>>(),
            [DISCRIMINATOR, "number"]
        );
    }
}
