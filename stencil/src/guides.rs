/// ## Getting started
///
/// A [`Schema`](crate::Schema) is built once, shared behind an `Arc`, and
/// describes how instances are stored:
///
/// ```
/// use stencil::{Field, Index, Schema};
///
/// let person = Schema::builder("Person")
///     .collection("people")
///     .field(Field::identifier())
///     .field(Field::string("name").required())
///     .field(Field::integer("age").stored_as("a"))
///     .index(Index::new([("name", 1)]).unique())
///     .build()
///     .unwrap();
///
/// assert_eq!(person.field("age").unwrap().name(), "a");
/// ```
///
/// Attributes (`age`) are the names used from Rust. Foreign names (`a`) are
/// the keys stored in the database. Queries, projections and indexes accept
/// attributes and emit foreign names.
///
/// Instances are [`Document`](crate::Document)s. A document wraps the stored
/// BSON and casts on access:
///
/// ```
/// # use stencil::{Document, Field, Schema};
/// # let person = Schema::builder("Person")
/// #     .field(Field::identifier())
/// #     .field(Field::integer("age").stored_as("a"))
/// #     .build()
/// #     .unwrap();
/// let mut doc = Document::new(&person).unwrap();
/// doc.set("age", 42).unwrap();
///
/// assert!(doc.id().is_some());
/// assert_eq!(doc.get_foreign("a"), Some(&42.into()));
/// ```
///
/// ### Method overview
///
/// | Method                    | Description                                               |
/// |---------------------------|-----------------------------------------------------------|
/// | `Document::new`           | Empty instance with `assign` defaults applied.            |
/// | `Document::from_pairs`    | Instance from `(attribute, value)` pairs.                 |
/// | `Document::from_foreign`  | Wraps stored data without casting.                        |
/// | `Document::get`           | Casts the stored value to its native form.                |
/// | `Document::set`           | Validates and casts a native value for storage.           |
/// | `Document::validate`      | Checks that every required field is set.                  |
/// | `Document::to_foreign`    | Stored form, ready to be written.                         |
pub mod getting_started {}

/// ## Fields and kinds
///
/// Every [`Field`](crate::Field) has a [`Kind`](crate::kinds::Kind) that decides
/// how values are cast.
///
/// | Constructor        | Native value               | Stored as                       |
/// |--------------------|----------------------------|---------------------------------|
/// | `Field::any`       | anything                   | anything                        |
/// | `Field::string`    | string                     | `string`                        |
/// | `Field::integer`   | integer                    | `int` or `long`                 |
/// | `Field::double`    | float                      | `double`                        |
/// | `Field::decimal`   | `rust_decimal::Decimal`    | `decimal`                       |
/// | `Field::boolean`   | bool, or any truthy value  | `bool`                          |
/// | `Field::date`      | `DateTime<Utc>`            | `date`                          |
/// | `Field::object_id` | `ObjectId` or hex string   | `objectId`                      |
/// | `Field::array`     | list of the element kind   | `array`                         |
/// | `Field::mapping`   | map of the element kind    | `array` of keyed entries        |
/// | `Field::embed`     | `Document` of a schema     | `object`                        |
/// | `Field::reference` | persisted `Document`       | `objectId`, `{$ref, $id}`, etc. |
///
/// Builder methods refine a field: `stored_as`, `default`, `required`, `nullable`,
/// `choices`, `validate_with`, `exclusive`, plus kind specific options such
/// as `strip` and `case` for strings or `places` for decimals.
///
/// Reading a field that was never set falls back to its default. A field with
/// `assign` stores that default on construction. Without either, a nullable
/// field reads as null and any other field fails with
/// [`Error::Unset`](crate::Error::Unset).
///
/// Arrays and mappings cast their elements through the element field, and the
/// cast result is cached: reading the same array twice yields the same
/// allocation until the field is set again.
///
/// Embedded fields accepting several schemas record the concrete schema under
/// the [`_cls`](crate::composite::DISCRIMINATOR) key.
pub mod fields_and_kinds {}

/// ## Queries
///
/// [`Schema::q`](crate::Schema::q) starts a query on one field:
///
/// ```
/// # use stencil::{Field, Schema};
/// # use stencil::mongodb::bson::doc;
/// # let person = Schema::builder("Person")
/// #     .field(Field::integer("age"))
/// #     .field(Field::string("name"))
/// #     .build()
/// #     .unwrap();
/// let filter = person.q("age").unwrap().range(18, 65).unwrap()
///     & person.q("name").unwrap().eq("Kit").unwrap();
///
/// assert_eq!(
///     filter.as_query(),
///     &doc! { "age": { "$gte": 18, "$lt": 65 }, "name": "Kit" },
/// );
/// ```
///
/// Equivalent `MongoDB` query:
///
/// ```mongodb
/// db.people.find({ age: { $gte: 18, $lt: 65 }, name: "Kit" });
/// ```
///
/// Filters combine with `&`, `|` and `^`. Combining two constraints on the
/// same path under `&` merges their operators. Two plain values on one path
/// keep only the second.
///
/// The [`filter!`](crate::filter) macro accepts double-underscore keywords:
///
/// | Keyword                        | Produces                                      |
/// |--------------------------------|-----------------------------------------------|
/// | `age: 27`                      | `{ age: 27 }`                                 |
/// | `age__gt: 30`                  | `{ age: { $gt: 30 } }`                        |
/// | `not__age__gt: 30`             | `{ $not: { age: { $gt: 30 } } }`              |
/// | `tags__in: vec![...]`          | `{ tags: { $in: [...] } }`                    |
/// | `address__city: "Oslo"`        | `{ "address.city": "Oslo" }`                  |
/// | `tags__0: "first"`             | `{ "tags.0": "first" }`                       |
/// | `name__exists: false`          | `{ name: { $exists: 1 } }`                    |
/// | `name__type: "string"`         | `{ name: { $type: "string" } }`               |
///
/// ### Operator gating
///
/// Fields may declare which operator families they support with
/// [`allow`](crate::Field::allow) and [`disallow`](crate::Field::disallow).
/// Families are written `#rel`, `#eq`, `#array`, `#document`, `#string`,
/// `#geo`; single operators by their `$` name. In debug builds an unsupported
/// operator fails with [`Error::NotImplemented`](crate::Error::NotImplemented).
/// Release builds skip the check.
pub mod queries {}

/// ## Updates and projections
///
/// The [`update!`](crate::update) macro prefixes keys with an operation,
/// `set` when none is given:
///
/// ```
/// # use stencil::{Field, Schema, update};
/// # use stencil::mongodb::bson::doc;
/// # let person = Schema::builder("Person")
/// #     .field(Field::integer("visits"))
/// #     .field(Field::string("name"))
/// #     .build()
/// #     .unwrap();
/// let update = update!(person, inc__visits: 1, dec__visits: 2, name: "Kit").unwrap();
///
/// assert_eq!(
///     update.as_update(),
///     &doc! { "$inc": { "visits": -2 }, "$set": { "name": "Kit" } },
/// );
/// ```
///
/// `dec` and `sub` negate their operand into `$inc`. `bit_and`, `bit_or` and
/// `bit_xor` share one `$bit` block.
///
/// The [`project!`](crate::project) macro builds a projection document.
/// Names prefixed with `-` are excluded from the schema's default projection;
/// bare names are the only ones included:
///
/// ```
/// # use stencil::{Field, Schema, project};
/// # use stencil::mongodb::bson::doc;
/// # let person = Schema::builder("Person")
/// #     .field(Field::identifier())
/// #     .field(Field::string("name"))
/// #     .field(Field::string("password"))
/// #     .build()
/// #     .unwrap();
/// let projection = project!(person, -password).unwrap();
///
/// assert_eq!(projection, doc! { "_id": true, "name": true });
/// ```
pub mod updates_and_projections {}

/// ## Storage
///
/// Stencil never talks to the database on its own. A
/// [`Collection`](crate::Collection) executes the generated documents; it is
/// implemented for `mongodb::Collection<Document>` and can be implemented by
/// test doubles.
///
/// [`Bound`](crate::Bound) pairs a collection with a schema:
///
/// ```ignore
/// let people = Bound::new(&person, db.collection("people"));
///
/// people.insert(&alice).await?;
/// let adults = people.find(filter!(person, age__gte: 18)?, FindOptions::default()).await?;
/// ```
///
/// With the `meta` feature, schemas submitted with
/// [`register_schema!`](crate::register_schema) can have their indexes
/// created at startup with [`enforce_indexes`](crate::meta::enforce_indexes).
/// The `schema` feature additionally derives a `$jsonSchema` validator per
/// schema.
pub mod storage {}

/// This library is named "Stencil" because a schema is cut once and every
/// document is traced from it.
pub mod naming {}
