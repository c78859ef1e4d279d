mod common;

use mongodb::bson::{Bson, doc};
use stencil::{Error, Value, filter, project, query, update};

#[test]
fn negated_relational() {
    let person = common::person();
    let filter = filter!(person, not__age__gt: 30).unwrap();
    assert_eq!(filter.as_query(), &doc! { "$not": { "age": { "$gt": 30 } } });
}

#[test]
fn negations_on_different_fields_are_both_kept() {
    let person = common::person();
    let filter = filter!(person, not__age__gt: 30, not__name: "x").unwrap();
    assert_eq!(
        filter.as_query(),
        &doc! { "$and": [
            { "$not": { "age": { "$gt": 30 } } },
            { "$not": { "name": "x" } },
        ] }
    );
}

#[test]
fn nested_existence() {
    let person = common::person();

    let filter = filter!(person, attribute__name__exists: false).unwrap();
    assert_eq!(filter.as_query(), &doc! { "attribute.name": { "$exists": 1 } });

    let filter = filter!(person, attribute__name__exists: true).unwrap();
    assert_eq!(filter.as_query(), &doc! { "attribute.name": { "$exists": 0 } });
}

#[test]
fn keywords_are_anded() {
    let person = common::person();
    let filter = filter!(person, age__gte: 27, age__lte: 42, name: "Kit").unwrap();
    assert_eq!(
        filter.as_query(),
        &doc! { "age": { "$gte": 27, "$lte": 42 }, "name": "Kit" }
    );
}

#[test]
fn function_form_matches_macro() {
    let person = common::person();
    let built =
        query::filter(&person, [("age__lt", Value::from(5)), ("tags__0", Value::from("x"))])
            .unwrap();
    let expanded = filter!(person, age__lt: 5, tags__0: "x").unwrap();

    assert_eq!(built, expanded);
    assert_eq!(built.as_query(), &doc! { "age": { "$lt": 5 }, "tags.0": "x" });
}

#[test]
fn membership_and_type() {
    let person = common::person();

    let filter = filter!(person, tags__in: vec![Value::from("a"), Value::from("b")]).unwrap();
    assert_eq!(filter.as_query(), &doc! { "tags": { "$in": ["a", "b"] } });

    let filter = filter!(person, name__type: "string").unwrap();
    assert_eq!(filter.as_query(), &doc! { "name": { "$type": "string" } });

    assert!(matches!(filter!(person, name__type: "strung"), Err(Error::Value(_) | Error::Type(_))));

    let filter = filter!(person, name__nin: vec![Value::from("a"), Value::from("b")]).unwrap();
    assert_eq!(filter.as_query(), &doc! { "name": { "$nin": ["a", "b"] } });

    let filter = filter!(person, not__tags__nin: vec![Value::from("a")]).unwrap();
    assert_eq!(filter.as_query(), &doc! { "$not": { "tags": { "$nin": ["a"] } } });
}

#[test]
fn element_match_keyword() {
    let person = common::person();
    let inner = Value::from(Bson::Document(doc! { "name": "color" }));
    let filter = filter!(person, attributes__match: inner).unwrap();
    assert_eq!(filter.as_query(), &doc! { "attributes": { "$elemMatch": { "name": "color" } } });

    assert!(matches!(filter!(person, attributes__match: 3), Err(Error::Type(_))));
}

#[test]
fn positional_keyword() {
    let person = common::person();
    let filter = filter!(person, attributes__S__name: "color").unwrap();
    assert_eq!(filter.as_query(), &doc! { "attributes.$.name": "color" });
}

#[test]
fn unknown_keyword_path() {
    let person = common::person();
    assert!(matches!(filter!(person, nickname: "kit"), Err(Error::UnknownField { .. })));
}

#[test]
fn empty_filter() {
    let person = common::person();
    assert!(filter!(person).unwrap().is_empty());
}

#[test]
fn updates_group_by_operator() {
    let person = common::person();
    let update =
        update!(person, name: "Kit", inc__age: 1, push__tags: "new", unset__attribute: 1).unwrap();

    assert_eq!(
        update.as_update(),
        &doc! {
            "$set": { "name": "Kit" },
            "$inc": { "age": 1 },
            "$push": { "tags": "new" },
            "$unset": { "attribute": 1 },
        }
    );
}

#[test]
fn decrement_negates() {
    let person = common::person();
    let update = update!(person, dec__score: 3).unwrap();
    assert_eq!(update.as_update(), &doc! { "$inc": { "score": -3 } });

    assert!(matches!(update!(person, sub__name: "x"), Err(Error::Type(_))));
}

#[test]
fn bitwise_updates_share_a_block() {
    let person = common::person();
    let update = update!(person, bit_and__score: 6).unwrap();
    assert_eq!(update.as_update(), &doc! { "$bit": { "score": { "and": 6 } } });

    let update = update!(person, bit_and__score: 6, bit_or__score: 1, bit_xor__age: 2).unwrap();
    assert_eq!(
        update.as_update(),
        &doc! { "$bit": { "score": { "and": 6, "or": 1 }, "age": { "xor": 2 } } }
    );
}

#[test]
fn set_of_an_embedded_mapping_stores_assigned_defaults() {
    let inner = stencil::Schema::builder("Inner")
        .field(stencil::Field::identifier())
        .field(stencil::Field::string("name"))
        .build()
        .unwrap();
    let outer = stencil::Schema::builder("Outer")
        .field(stencil::Field::embed("inner", [inner]))
        .build()
        .unwrap();

    let operand = Value::from(Bson::Document(doc! { "name": "x" }));
    let update = update!(outer, inner: operand).unwrap();
    let stored = update.as_update().get_document("$set").unwrap().get_document("inner").unwrap();
    assert!(matches!(stored.get("_id"), Some(Bson::ObjectId(_))));
    assert_eq!(stored.get_str("name").unwrap(), "x");
}

#[test]
fn set_casts_through_the_field() {
    let person = common::person();
    let update = update!(person, set__name: "  Kit  ", attribute__value: "red").unwrap();
    assert_eq!(
        update.as_update(),
        &doc! { "$set": { "name": "Kit", "attribute.value": "red" } }
    );
}

#[test]
fn projections() {
    let person = common::person();

    // password is not projected by default
    assert_eq!(
        project!(person).unwrap(),
        doc! {
            "_id": true, "name": true, "age": true, "score": true, "tags": true,
            "labels": true, "attribute": true, "attributes": true, "account": true,
        }
    );

    assert_eq!(project!(person, name, +age).unwrap(), doc! { "name": true, "age": true });

    assert_eq!(
        project!(person, -tags, -labels, -attribute, -attributes, !account).unwrap(),
        doc! { "_id": true, "name": true, "age": true, "score": true }
    );

    assert_eq!(project!(person, attribute.name).unwrap(), doc! { "attribute.name": true });
}

#[test]
fn projection_always_includes() {
    let person = common::person();
    let projection = query::projection(&person, ["name"], ["id"]).unwrap();
    assert_eq!(projection, doc! { "name": true, "_id": true });
}
