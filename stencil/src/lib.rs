//! Stencil is a declarative document mapper for `MongoDB`.
//!
//! A [`Schema`] is an ordered set of [`Field`]s. Each field knows how to cast
//! values between their native form ([`Value`]) and their stored BSON form,
//! which defaults to apply and which query operators it supports. Schema
//! instances ([`Document`]s) hold stored data and cast lazily on access.
//!
//! Queries are built either field by field through [`Q`], or from
//! double-underscore keywords with the [`filter!`], [`update!`] and
//! [`project!`] macros.
//!
//! ## Example
//!
//! ```
//! use stencil::{Document, Field, Schema, Value, filter, update};
//! use stencil::mongodb::bson::doc;
//!
//! # fn main() -> stencil::Result<()> {
//! // Declare a schema
//! let person = Schema::builder("Person")
//!     .collection("people")
//!     .field(Field::identifier())
//!     .field(Field::string("name").strip().required())
//!     .field(Field::integer("age"))
//!     .field(Field::array("tags", Field::string("tag")))
//!     .build()?;
//!
//! // Work with an instance
//! let mut alice = Document::new(&person)?;
//! alice.set("name", "  Alice ")?;
//! alice.set("age", 27)?;
//! assert_eq!(alice.get("name")?.as_str(), Some("Alice"));
//!
//! // Build a filter field by field
//! let adults = person.q("age")?.gte(18)?;
//! assert_eq!(adults.as_query(), &doc! { "age": { "$gte": 18 } });
//!
//! // Or from keywords
//! let filter = filter!(person, age__gte: 18, tags__in: vec![Value::from("admin")])?;
//! assert_eq!(
//!     filter.as_query(),
//!     &doc! { "age": { "$gte": 18 }, "tags": { "$in": ["admin"] } }
//! );
//!
//! let update = update!(person, inc__age: 1, name: "Bob")?;
//! assert_eq!(
//!     update.as_update(),
//!     &doc! { "$inc": { "age": 1 }, "$set": { "name": "Bob" } }
//! );
//! # Ok(())
//! # }
//! ```
//!
//! See [`guides`] module to learn more!

#![warn(clippy::pedantic)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::missing_errors_doc
)]

extern crate self as stencil;

pub mod collection;
pub mod composite;
pub mod decimal;
mod document;
mod error;
mod field;
pub mod guides;
pub mod kinds;
#[cfg(feature = "meta")]
pub mod meta;
mod oid;
pub mod query;
mod schema;
mod types;
pub mod value;

pub use collection::{Bound, Collection, FindOptions};
pub use document::Document;
pub use error::{Error, Result};
pub use field::{Choices, DefaultValue, Field, Predicate};
pub use oid::ObjectIdGenerator;
pub use query::{Filter, Q, Update};
pub use schema::{Index, Registry, Schema, SchemaBuilder};
pub use stencil_macros::{filter, project, update};
pub use types::ForeignKind;
pub use value::Value;

pub use mongodb;
