#![allow(dead_code)]

use std::sync::Arc;
use stencil::{Field, Index, Schema};

pub fn attribute() -> Arc<Schema> {
    Schema::builder("Attribute")
        .field(Field::string("name"))
        .field(Field::string("value"))
        .build()
        .unwrap()
}

pub fn account() -> Arc<Schema> {
    Schema::builder("Account")
        .collection("accounts")
        .field(Field::identifier())
        .field(Field::string("email").strip().required())
        .build()
        .unwrap()
}

pub fn person() -> Arc<Schema> {
    Schema::builder("Person")
        .collection("people")
        .field(Field::identifier())
        .field(Field::string("name").strip())
        .field(Field::number("age"))
        .field(Field::integer("score").allow(["#rel"]))
        .field(Field::array("tags", Field::string("tag")))
        .field(Field::array("labels", Field::string("label")).disallow(["#array"]))
        .field(Field::embed("attribute", [attribute()]))
        .field(Field::array("attributes", Field::embed("attribute", [attribute()])))
        .field(Field::reference("account", [account()]))
        .field(Field::string("password").projected(false))
        .index(Index::new([("name", 1)]))
        .build()
        .unwrap()
}

/// Schema with two mutually exclusive fields.
pub fn contact() -> Arc<Schema> {
    Schema::builder("Contact")
        .field(Field::string("email").exclusive(["phone"]))
        .field(Field::string("phone").exclusive(["email"]))
        .build()
        .unwrap()
}
