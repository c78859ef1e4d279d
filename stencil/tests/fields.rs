mod common;

use chrono::{TimeDelta, TimeZone, Utc};
use mongodb::bson::{Bson, doc, oid::ObjectId};
use proptest::prelude::*;
use stencil::{Document, Error, Field, Schema, Value};

fn round_trip(field: &Field, value: Value) -> Value {
    let foreign = field.to_foreign(value).unwrap();
    field.to_native(&foreign).unwrap()
}

proptest! {
    #[test]
    fn integers_round_trip(value in any::<i64>()) {
        prop_assert_eq!(round_trip(&Field::integer("n"), Value::Int(value)), Value::Int(value));
    }

    #[test]
    fn strings_round_trip(value in ".*") {
        prop_assert_eq!(
            round_trip(&Field::string("s"), Value::String(value.clone())),
            Value::String(value)
        );
    }

    #[test]
    fn doubles_round_trip(value in prop::num::f64::NORMAL) {
        prop_assert_eq!(
            round_trip(&Field::double("d"), Value::Double(value)),
            Value::Double(value)
        );
    }

    #[test]
    fn booleans_round_trip(value in any::<bool>()) {
        prop_assert_eq!(round_trip(&Field::boolean("b"), Value::Bool(value)), Value::Bool(value));
    }

    #[test]
    fn object_id_hex_round_trips(hex in "[0-9a-f]{24}") {
        let native = round_trip(&Field::object_id("o"), Value::String(hex.clone()));
        let Value::ObjectId(oid) = native else {
            panic!("expected an object id, got {native:?}");
        };
        prop_assert_eq!(oid.to_hex(), hex);
    }
}

#[test]
fn integer_scenario() {
    let field = Field::integer("age");
    assert_eq!(field.to_foreign(27.into()).unwrap(), Bson::Int32(27));
    assert_eq!(round_trip(&field, 27.into()), Value::Int(27));
}

#[test]
fn boolean_falls_back_to_truthiness() {
    let field = Field::boolean("flag");
    assert_eq!(field.to_foreign("off".into()).unwrap(), Bson::Boolean(false));
    assert_eq!(field.to_foreign("Yes".into()).unwrap(), Bson::Boolean(true));
    assert_eq!(field.to_foreign("hehehe".into()).unwrap(), Bson::Boolean(true));
}

#[test]
fn array_reads_are_cached() {
    let schema = common::person();
    let mut person = Document::new(&schema).unwrap();
    person
        .set("tags", vec![Value::from("a"), Value::from("b")])
        .unwrap();

    let (Value::Array(first), Value::Array(second)) =
        (person.get("tags").unwrap(), person.get("tags").unwrap())
    else {
        panic!("tags should read as an array");
    };
    assert!(first.ptr_eq(&second));

    person.set("tags", vec![Value::from("c")]).unwrap();
    let Value::Array(third) = person.get("tags").unwrap() else {
        panic!("tags should read as an array");
    };
    assert!(!first.ptr_eq(&third));
    assert_eq!(third.to_vec(), vec![Value::from("c")]);
}

#[test]
fn exclusive_fields_reject_each_other() {
    let schema = common::contact();

    let mut contact = Document::new(&schema).unwrap();
    contact.set("email", "kit@example.com").unwrap();
    assert!(matches!(
        contact.set("phone", "555"),
        Err(Error::Exclusive { field, conflict }) if field == "phone" && conflict == "email"
    ));
    assert!(!contact.contains("phone"));

    let mut contact = Document::new(&schema).unwrap();
    contact.set("phone", "555").unwrap();
    assert!(matches!(contact.set("email", "kit@example.com"), Err(Error::Exclusive { .. })));

    let mut contact = Document::new(&schema).unwrap();
    contact.set("phone", "555").unwrap();
    contact.set("phone", "556").unwrap();
}

#[test]
fn exclusive_siblings_may_both_assign_defaults() {
    let schema = Schema::builder("Slot")
        .field(Field::string("morning").default("free").assign().exclusive(["evening"]))
        .field(Field::string("evening").default("free").assign().exclusive(["morning"]))
        .build()
        .unwrap();

    let mut slot = Document::new(&schema).unwrap();
    assert_eq!(slot.get_foreign("morning"), Some(&Bson::String("free".into())));
    assert_eq!(slot.get_foreign("evening"), Some(&Bson::String("free".into())));

    assert!(matches!(slot.set("morning", "busy"), Err(Error::Exclusive { .. })));
}

#[test]
fn object_ids_from_out_of_range_moments_fail() {
    let field = Field::object_id("o");

    assert!(matches!(field.to_foreign(TimeDelta::MAX.into()), Err(Error::Value(_))));
    assert!(matches!(
        field.to_foreign(Utc.with_ymd_and_hms(1960, 1, 1, 0, 0, 0).unwrap().into()),
        Err(Error::Value(_))
    ));

    let Bson::ObjectId(id) = field.to_foreign(TimeDelta::hours(1).into()).unwrap() else {
        panic!("expected an object id");
    };
    assert!(id.timestamp().timestamp_millis() > Utc::now().timestamp_millis());
}

#[test]
fn unset_field_without_default() {
    let schema = common::person();
    let mut person = Document::new(&schema).unwrap();
    assert!(matches!(
        person.get("name"),
        Err(Error::Unset { field, .. }) if field == "name"
    ));
}

#[test]
fn failed_cast_leaves_storage_untouched() {
    let schema = common::person();
    let mut person = Document::new(&schema).unwrap();
    person.set("age", 30).unwrap();

    assert!(person.set("age", "thirty").is_err());
    assert_eq!(person.get("age").unwrap(), Value::Int(30));
}

#[test]
fn defaults_and_assignment() {
    let schema = Schema::builder("Counter")
        .field(Field::identifier())
        .field(Field::integer("count").default(0))
        .field(Field::string("state").default("new").assign())
        .field(Field::string("note").nullable())
        .build()
        .unwrap();

    let mut counter = Document::new(&schema).unwrap();

    assert!(matches!(counter.id(), Some(Bson::ObjectId(_))));
    assert!(!counter.contains("count"));
    assert_eq!(counter.get("count").unwrap(), Value::Int(0));
    assert_eq!(counter.get_foreign("state"), Some(&Bson::String("new".into())));
    assert_eq!(counter.get("note").unwrap(), Value::Null);
}

#[test]
fn choices_and_validators() {
    let field = Field::string("size").choices(["s", "m", "l"]);
    assert!(field.validate(&"m".into()).is_ok());
    assert!(matches!(field.validate(&"xl".into()), Err(Error::Value(_))));

    let field = Field::integer("even").validate_with(|value| match value {
        Value::Int(n) if n % 2 == 0 => Ok(()),
        _ => Err(Error::Value("odd".into())),
    });
    assert!(field.validate(&4.into()).is_ok());
    assert!(field.validate(&3.into()).is_err());
}

#[test]
fn string_transforms() {
    let schema = common::person();
    let mut person = Document::new(&schema).unwrap();
    person.set("name", "  Kit ").unwrap();
    assert_eq!(person.get_foreign("name"), Some(&Bson::String("Kit".into())));
}

#[test]
fn embedded_documents_cast_through_their_schema() {
    let schema = common::person();
    let attribute = common::attribute();

    let mut inner = Document::new(&attribute).unwrap();
    inner.set("name", "color").unwrap();
    inner.set("value", "red").unwrap();

    let mut person = Document::new(&schema).unwrap();
    person.set("attribute", inner).unwrap();
    assert_eq!(
        person.get_foreign("attribute"),
        Some(&Bson::Document(doc! { "name": "color", "value": "red" }))
    );

    let Value::Document(mut read) = person.get("attribute").unwrap() else {
        panic!("attribute should read as a document");
    };
    assert_eq!(read.get("value").unwrap(), Value::from("red"));
}

#[test]
fn referencing_an_unsaved_document_fails() {
    let schema = common::person();
    let account = Schema::builder("Draft")
        .field(Field::string("email"))
        .build()
        .unwrap();
    let accounts = common::account();

    let mut person = Document::new(&schema).unwrap();

    // not an accepted kind
    let draft = Document::new(&account).unwrap();
    assert!(matches!(person.set("account", draft), Err(Error::Type(_))));

    let mut unsaved = Document::new(&accounts).unwrap();
    unsaved.remove("id").unwrap();
    assert!(matches!(
        person.set("account", unsaved),
        Err(Error::Value(message)) if message.contains("identifier")
    ));

    let saved = Document::new(&accounts).unwrap();
    let id = saved.id().cloned().unwrap();
    person.set("account", saved).unwrap();
    assert_eq!(person.get_foreign("account"), Some(&id));
}

#[test]
fn reference_accepts_bare_identifiers() {
    let schema = common::person();
    let mut person = Document::new(&schema).unwrap();
    let id = ObjectId::new();

    person.set("account", id.to_hex()).unwrap();
    assert_eq!(person.get_foreign("account"), Some(&Bson::ObjectId(id)));
}

#[test]
fn construction_from_pairs_and_args() {
    let schema = common::contact();

    let contact = Document::from_pairs(&schema, [("email", "kit@example.com")]).unwrap();
    assert_eq!(contact.to_foreign(), doc! { "email": "kit@example.com" });

    assert!(matches!(
        Document::from_pairs(&schema, [("fax", "1")]),
        Err(Error::UnknownField { .. })
    ));

    let pair = Schema::builder("Pair")
        .field(Field::string("left"))
        .field(Field::string("right"))
        .build()
        .unwrap();

    let both = Document::from_args(&pair, ["l", "r"]).unwrap();
    assert_eq!(both.to_foreign(), doc! { "left": "l", "right": "r" });

    assert!(matches!(
        Document::from_args(&pair, ["a", "b", "c"]),
        Err(Error::Type(_))
    ));
}

#[test]
fn required_fields_are_validated() {
    let schema = common::account();
    let mut account = Document::new(&schema).unwrap();
    assert!(matches!(account.validate(), Err(Error::Unset { field, .. }) if field == "email"));

    account.set("email", "kit@example.com").unwrap();
    account.validate().unwrap();
}
