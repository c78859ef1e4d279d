use crate::value::DbRef;
use mongodb::bson::{Bson, Document, doc};
use std::ops::{BitAnd, BitOr, BitXor};

/// Query fragment: dotted paths or logical operators mapped to values or
/// operator documents.
///
/// Fragments are plain values. `&` merges them, `|` collects them under
/// `$or` and `^` matches exactly one side.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Filter(Document);

/// Operator form of a constraint, escalating a bare value to `$eq`.
///
/// `{$ref, $id}` literals are values, not operator blocks.
fn promote(value: Bson) -> Document {
    match value {
        Bson::Document(document) if is_operator_block(&document) => document,
        value => doc! { "$eq": value },
    }
}

fn is_operator_block(document: &Document) -> bool {
    !document.is_empty()
        && document.keys().all(|key| key.starts_with('$'))
        && DbRef::from_document(document).is_none()
}

impl Filter {
    pub fn new(document: Document) -> Self {
        Self(document)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_query(&self) -> &Document {
        &self.0
    }

    pub fn into_query(self) -> Document {
        self.0
    }

    /// Both sides must match.
    ///
    /// Keys only one side constrains are copied. A key both sides constrain
    /// has its operators merged, with the right side winning on the same
    /// operator, so two literals on one path keep only the second.
    pub fn and(self, other: Self) -> Self {
        let mut merged = self.0;

        for (key, value) in other.0 {
            if !merged.contains_key(&key) {
                merged.insert(key, value);
                continue;
            }

            match key.as_str() {
                "$and" => {
                    if let Some(existing) = merged.get_mut(&key) {
                        let mut combined = clauses(existing.clone());
                        combined.extend(clauses(value));
                        *existing = Bson::Array(combined);
                    }
                }
                "$or" | "$nor" | "$not" => {
                    if let Some(existing) = merged.remove(&key) {
                        let mut combined = merged.remove("$and").map(clauses).unwrap_or_default();
                        combined.push(Bson::Document(doc! { key.clone(): existing }));
                        combined.push(Bson::Document(doc! { key: value }));
                        merged.insert("$and", combined);
                    }
                }
                _ => {
                    if let Some(existing) = merged.get_mut(&key) {
                        let mut operators = promote(existing.clone());
                        operators.extend(promote(value));
                        *existing = Bson::Document(operators);
                    }
                }
            }
        }

        Self(merged)
    }

    /// Either side may match. An existing bare `$or` on the left is extended.
    pub fn or(self, other: Self) -> Self {
        let mut left = self.0;

        if left.len() == 1 {
            if let Ok(clauses) = left.get_array_mut("$or") {
                clauses.push(Bson::Document(other.0));
                return Self(left);
            }
        }

        Self(doc! { "$or": [left, other.0] })
    }

    /// Exactly one side matches.
    pub fn xor(self, other: Self) -> Self {
        let (left, right) = (self.0, other.0);

        Self(doc! {
            "$or": [
                { "$and": [left.clone(), { "$nor": [right.clone()] }] },
                { "$and": [{ "$nor": [left] }, right] },
            ]
        })
    }

    /// Neither clause matches.
    pub fn nor(self) -> Self {
        Self(doc! { "$nor": [self.0] })
    }
}

fn clauses(value: Bson) -> Vec<Bson> {
    match value {
        Bson::Array(clauses) => clauses,
        other => vec![other],
    }
}

impl From<Document> for Filter {
    fn from(value: Document) -> Self {
        Self(value)
    }
}

impl From<Filter> for Document {
    fn from(value: Filter) -> Self {
        value.0
    }
}

impl BitAnd for Filter {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self::Output {
        self.and(rhs)
    }
}

impl BitOr for Filter {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.or(rhs)
    }
}

impl BitXor for Filter {
    type Output = Self;

    fn bitxor(self, rhs: Self) -> Self::Output {
        self.xor(rhs)
    }
}

/// Update fragment: one top-level `$operator` block per operator, each
/// mapping dotted paths to operands.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Update(Document);

impl Update {
    pub fn new(document: Document) -> Self {
        Self(document)
    }

    /// Single `operator` applied to `path`.
    pub fn operation(operator: &str, path: impl Into<String>, operand: Bson) -> Self {
        let mut block = Document::new();
        block.insert(path.into(), operand);
        Self(doc! { operator: block })
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_update(&self) -> &Document {
        &self.0
    }

    pub fn into_update(self) -> Document {
        self.0
    }

    /// Merges operator blocks. The right side wins on a repeated path, except
    /// under `$bit` where the bitwise operations on one path are combined.
    pub fn and(self, other: Self) -> Self {
        let mut merged = self.0;

        for (operator, block) in other.0 {
            match block {
                Bson::Document(block) if merged.get_document(&operator).is_ok() => {
                    if let Ok(existing) = merged.get_document_mut(&operator) {
                        if operator == "$bit" {
                            merge_bitwise(existing, block);
                        } else {
                            existing.extend(block);
                        }
                    }
                }
                block => {
                    merged.insert(operator, block);
                }
            }
        }

        Self(merged)
    }
}

fn merge_bitwise(existing: &mut Document, block: Document) {
    for (path, operations) in block {
        match (existing.get_document_mut(&path), operations) {
            (Ok(current), Bson::Document(operations)) => current.extend(operations),
            (_, operations) => {
                existing.insert(path, operations);
            }
        }
    }
}

impl From<Document> for Update {
    fn from(value: Document) -> Self {
        Self(value)
    }
}

impl From<Update> for Document {
    fn from(value: Update) -> Self {
        value.0
    }
}

impl BitAnd for Update {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self::Output {
        self.and(rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn and_copies_disjoint_keys() {
        let filter = Filter::from(doc! { "a": 1 }) & Filter::from(doc! { "b": 2 });
        assert_eq!(filter.as_query(), &doc! { "a": 1, "b": 2 });
    }

    #[test]
    fn and_merges_operators_on_one_path() {
        let filter = Filter::from(doc! { "roll": { "$gte": 27 } })
            & Filter::from(doc! { "roll": { "$lte": 42 } });
        assert_eq!(filter.as_query(), &doc! { "roll": { "$gte": 27, "$lte": 42 } });
    }

    #[test]
    fn and_escalates_literal_next_to_operator() {
        let filter = Filter::from(doc! { "a": 1 }) & Filter::from(doc! { "a": { "$ne": 2 } });
        assert_eq!(filter.as_query(), &doc! { "a": { "$eq": 1, "$ne": 2 } });
    }

    #[test]
    fn and_keeps_last_literal() {
        let filter = Filter::from(doc! { "a": 1 }) & Filter::from(doc! { "a": 2 });
        assert_eq!(filter.as_query(), &doc! { "a": { "$eq": 2 } });
    }

    #[test]
    fn and_moves_clashing_disjunctions_under_and() {
        let filter = Filter::from(doc! { "$or": [{ "a": 1 }, { "b": 1 }] })
            & Filter::from(doc! { "$or": [{ "c": 1 }, { "d": 1 }] });
        assert_eq!(
            filter.as_query(),
            &doc! { "$and": [
                { "$or": [{ "a": 1 }, { "b": 1 }] },
                { "$or": [{ "c": 1 }, { "d": 1 }] },
            ] }
        );
    }

    #[test]
    fn and_moves_clashing_negations_under_and() {
        let filter = Filter::from(doc! { "$not": { "age": { "$gt": 30 } } })
            & Filter::from(doc! { "$not": { "name": "x" } });
        assert_eq!(
            filter.as_query(),
            &doc! { "$and": [
                { "$not": { "age": { "$gt": 30 } } },
                { "$not": { "name": "x" } },
            ] }
        );
    }

    #[test]
    fn and_treats_db_refs_as_literals() {
        let reference = doc! { "$ref": "people", "$id": 7 };
        let filter = Filter::from(doc! { "owner": reference.clone() })
            & Filter::from(doc! { "owner": { "$exists": true } });
        assert_eq!(
            filter.as_query(),
            &doc! { "owner": { "$eq": reference, "$exists": true } }
        );
    }

    #[test]
    fn and_treats_mixed_keys_as_literals() {
        let filter = Filter::from(doc! { "meta": { "$tag": 1, "plain": 2 } })
            & Filter::from(doc! { "meta": { "$ne": null } });
        assert_eq!(
            filter.as_query(),
            &doc! { "meta": { "$eq": { "$tag": 1, "plain": 2 }, "$ne": null } }
        );
    }

    #[test]
    fn or_flattens() {
        let filter = (Filter::from(doc! { "a": 1 }) | Filter::from(doc! { "b": 2 }))
            | Filter::from(doc! { "c": 3 });
        assert_eq!(filter.as_query(), &doc! { "$or": [{ "a": 1 }, { "b": 2 }, { "c": 3 }] });
    }

    #[test]
    fn or_does_not_extend_a_constrained_disjunction() {
        let left = Filter::from(doc! { "$or": [{ "a": 1 }], "z": 0 });
        let filter = left | Filter::from(doc! { "b": 2 });
        assert_eq!(
            filter.as_query(),
            &doc! { "$or": [{ "$or": [{ "a": 1 }], "z": 0 }, { "b": 2 }] }
        );
    }

    #[test]
    fn updates_merge_per_operator() {
        let update = Update::operation("$set", "a", 1.into())
            & Update::operation("$inc", "b", 1.into())
            & Update::operation("$set", "c", 2.into());
        assert_eq!(update.as_update(), &doc! { "$set": { "a": 1, "c": 2 }, "$inc": { "b": 1 } });
    }

    #[test]
    fn bitwise_operations_on_one_path_combine() {
        let update = Update::operation("$bit", "flags", doc! { "and": 6 }.into())
            & Update::operation("$bit", "flags", doc! { "or": 1 }.into())
            & Update::operation("$set", "a", doc! { "x": 1 }.into())
            & Update::operation("$set", "a", doc! { "y": 2 }.into());
        assert_eq!(
            update.as_update(),
            &doc! { "$bit": { "flags": { "and": 6, "or": 1 } }, "$set": { "a": { "y": 2 } } }
        );
    }
}
