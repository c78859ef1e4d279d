//! Field descriptors.
//!
//! A [`Field`] is immutable template metadata describing one slot of a
//! [`Schema`]. Values never live on the field; they live in the
//! [`Document`] the field is applied to.

use crate::{
    Document, Error, ForeignKind, ObjectIdGenerator, Result, Schema, composite,
    kinds::{Case, Kind, Reference, Strip, Text},
    value::Value,
};
use mongodb::bson::Bson;
use std::{
    any::Any,
    collections::BTreeSet,
    fmt::Debug,
    sync::{Arc, Weak},
};

type Factory = Arc<dyn Fn() -> Value + Send + Sync>;
type Validator = Arc<dyn Fn(&Value) -> Result<()> + Send + Sync>;
type Check = Arc<dyn Fn(Option<&dyn Any>, &Field) -> bool + Send + Sync>;

#[derive(Clone)]
pub enum DefaultValue {
    Static(Value),
    Factory(Factory),
}

#[derive(Clone)]
pub enum Choices {
    Static(Vec<Value>),
    Dynamic(Arc<dyn Fn() -> Vec<Value> + Send + Sync>),
}

/// Visibility rule: a fixed answer, or a callable consulted with an optional
/// caller-supplied context.
#[derive(Clone)]
pub enum Predicate {
    Fixed(bool),
    Dynamic(Check),
}

impl Predicate {
    pub fn dynamic(
        check: impl Fn(Option<&dyn Any>, &Field) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self::Dynamic(Arc::new(check))
    }

    fn evaluate(&self, context: Option<&dyn Any>, field: &Field) -> bool {
        match self {
            Self::Fixed(value) => *value,
            Self::Dynamic(check) => check(context, field),
        }
    }
}

impl From<bool> for Predicate {
    fn from(value: bool) -> Self {
        Self::Fixed(value)
    }
}

#[derive(Clone)]
pub struct Field {
    attribute: String,
    name: String,
    pub(crate) kind: Kind,
    default: Option<DefaultValue>,
    required: bool,
    nullable: bool,
    assign: bool,
    choices: Option<Choices>,
    validator: Option<Validator>,
    exclusive: BTreeSet<String>,
    read: Predicate,
    write: Predicate,
    sort: Predicate,
    project: Predicate,
    allowed_operators: BTreeSet<String>,
    disallowed_operators: BTreeSet<String>,
    owner: Weak<Schema>,
    invalid: Option<String>,
}

impl Debug for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Field")
            .field("attribute", &self.attribute)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl Field {
    pub fn new(attribute: impl Into<String>, kind: Kind) -> Self {
        let attribute = attribute.into();
        let disallowed_operators = kind
            .default_disallowed()
            .iter()
            .map(|op| (*op).to_owned())
            .collect();

        Self {
            name: attribute.clone(),
            attribute,
            kind,
            default: None,
            required: false,
            nullable: false,
            assign: false,
            choices: None,
            validator: None,
            exclusive: BTreeSet::new(),
            read: true.into(),
            write: true.into(),
            sort: true.into(),
            project: true.into(),
            allowed_operators: BTreeSet::new(),
            disallowed_operators,
            owner: Weak::new(),
            invalid: None,
        }
    }

    pub fn any(attribute: impl Into<String>) -> Self {
        Self::new(attribute, Kind::Any)
    }

    pub fn string(attribute: impl Into<String>) -> Self {
        Self::new(attribute, Kind::String(Text::default()))
    }

    pub fn number(attribute: impl Into<String>) -> Self {
        Self::new(attribute, Kind::Number)
    }

    pub fn integer(attribute: impl Into<String>) -> Self {
        Self::new(attribute, Kind::Integer)
    }

    pub fn long(attribute: impl Into<String>) -> Self {
        Self::new(attribute, Kind::Long)
    }

    pub fn double(attribute: impl Into<String>) -> Self {
        Self::new(attribute, Kind::Double)
    }

    pub fn boolean(attribute: impl Into<String>) -> Self {
        Self::new(attribute, Kind::Boolean)
    }

    pub fn date(attribute: impl Into<String>) -> Self {
        Self::new(attribute, Kind::Date)
    }

    pub fn binary(attribute: impl Into<String>) -> Self {
        Self::new(attribute, Kind::Binary)
    }

    pub fn object_id(attribute: impl Into<String>) -> Self {
        Self::new(attribute, Kind::ObjectId(None))
    }

    pub fn decimal(attribute: impl Into<String>) -> Self {
        Self::new(attribute, Kind::Decimal(None))
    }

    /// List of values, each cast through `element`.
    pub fn array(attribute: impl Into<String>, element: Field) -> Self {
        Self::new(attribute, Kind::Array(Box::new(element)))
    }

    /// Nested document of one of `kinds`. With several kinds the stored value
    /// is tagged with the concrete schema name.
    pub fn embed(
        attribute: impl Into<String>,
        kinds: impl IntoIterator<Item = Arc<Schema>>,
    ) -> Self {
        Self::new(attribute, Kind::Embed(kinds.into_iter().collect()))
    }

    pub fn reference(
        attribute: impl Into<String>,
        kinds: impl IntoIterator<Item = Arc<Schema>>,
    ) -> Self {
        Self::new(
            attribute,
            Kind::Reference(Reference {
                kinds: kinds.into_iter().collect(),
                ..Reference::default()
            }),
        )
    }

    /// Ordered list of sub-documents exposed natively as a map keyed by the
    /// sub-document field `key`.
    pub fn mapping(attribute: impl Into<String>, element: Field, key: impl Into<String>) -> Self {
        Self::new(attribute, Kind::Mapping(Box::new(element), key.into()))
    }

    /// Conventional `_id` field that assigns a fresh identifier on instantiation.
    pub fn identifier() -> Self {
        Self::object_id("id")
            .stored_as("_id")
            .default_with(|| ObjectIdGenerator::global().generate().into())
            .assign()
    }

    /// Foreign name the value is stored under.
    pub fn stored_as(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(DefaultValue::Static(value.into()));
        self
    }

    pub fn default_with(mut self, factory: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        self.default = Some(DefaultValue::Factory(Arc::new(factory)));
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Materialise the default into storage on instantiation and first read.
    pub fn assign(mut self) -> Self {
        self.assign = true;
        self
    }

    pub fn choices(mut self, choices: impl IntoIterator<Item = impl Into<Value>>) -> Self {
        self.choices = Some(Choices::Static(choices.into_iter().map(Into::into).collect()));
        self
    }

    pub fn choices_with(
        mut self,
        choices: impl Fn() -> Vec<Value> + Send + Sync + 'static,
    ) -> Self {
        self.choices = Some(Choices::Dynamic(Arc::new(choices)));
        self
    }

    pub fn validate_with(
        mut self,
        validator: impl Fn(&Value) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Sibling attributes that must be unset for this field to be writable.
    pub fn exclusive<S: Into<String>>(mut self, siblings: impl IntoIterator<Item = S>) -> Self {
        self.exclusive.extend(siblings.into_iter().map(Into::into));
        self
    }

    pub fn readable(mut self, predicate: impl Into<Predicate>) -> Self {
        self.read = predicate.into();
        self
    }

    pub fn writeable(mut self, predicate: impl Into<Predicate>) -> Self {
        self.write = predicate.into();
        self
    }

    pub fn sortable(mut self, predicate: impl Into<Predicate>) -> Self {
        self.sort = predicate.into();
        self
    }

    pub fn projected(mut self, predicate: impl Into<Predicate>) -> Self {
        self.project = predicate.into();
        self
    }

    /// Restrict the query builder to these operators and tags.
    pub fn allow<S: Into<String>>(mut self, operators: impl IntoIterator<Item = S>) -> Self {
        self.allowed_operators.extend(operators.into_iter().map(Into::into));
        self
    }

    pub fn disallow<S: Into<String>>(mut self, operators: impl IntoIterator<Item = S>) -> Self {
        self.disallowed_operators.extend(operators.into_iter().map(Into::into));
        self
    }

    /// Lift operators out of the kind's default disallowed set.
    pub fn permit<S: AsRef<str>>(mut self, operators: impl IntoIterator<Item = S>) -> Self {
        for operator in operators {
            self.disallowed_operators.remove(operator.as_ref());
        }
        self
    }

    pub fn strip(self) -> Self {
        self.with_text("strip", |text| text.strip = Some(Strip::Whitespace))
    }

    pub fn strip_chars(self, chars: impl Into<String>) -> Self {
        let chars = chars.into();
        self.with_text("strip_chars", |text| text.strip = Some(Strip::Chars(chars)))
    }

    pub fn case(self, case: Case) -> Self {
        self.with_text("case", |text| text.case = Some(case))
    }

    fn with_text(mut self, option: &str, apply: impl FnOnce(&mut Text)) -> Self {
        match &mut self.kind {
            Kind::String(text) => apply(text),
            _ => self.reject(option),
        }
        self
    }

    pub fn places(mut self, places: u32) -> Self {
        match &mut self.kind {
            Kind::Decimal(slot) => *slot = Some(places),
            _ => self.reject("places"),
        }
        self
    }

    pub fn generator(mut self, generator: Arc<ObjectIdGenerator>) -> Self {
        match &mut self.kind {
            Kind::ObjectId(slot) => *slot = Some(generator),
            _ => self.reject("generator"),
        }
        self
    }

    /// Store collection-qualified pointers instead of bare identifiers.
    pub fn concrete(mut self) -> Self {
        match &mut self.kind {
            Kind::Reference(reference) => reference.concrete = true,
            _ => self.reject("concrete"),
        }
        self
    }

    /// Copy these dotted paths of the referenced document next to its `_id`.
    pub fn cache<S: Into<String>>(mut self, paths: impl IntoIterator<Item = S>) -> Self {
        match &mut self.kind {
            Kind::Reference(reference) => reference.cache.extend(paths.into_iter().map(Into::into)),
            _ => self.reject("cache"),
        }
        self
    }

    fn reject(&mut self, option: &str) {
        self.invalid.get_or_insert_with(|| {
            format!("`{option}` does not apply to field `{}`", self.attribute)
        });
    }

    /// Declaration-time consistency checks, run when the owning schema is built.
    pub(crate) fn check(&self) -> Result<()> {
        if let Some(invalid) = &self.invalid {
            return Err(Error::Schema(invalid.clone()));
        }

        match &self.kind {
            Kind::Array(element) | Kind::Mapping(element, _) => element.check()?,
            Kind::Embed(kinds) if kinds.is_empty() => {
                return Err(Error::Schema(format!(
                    "embedded field `{}` declares no kinds",
                    self.attribute
                )));
            }
            Kind::Reference(reference) => {
                for path in &reference.cache {
                    if path.split('.').any(|segment| segment.parse::<usize>().is_ok()) {
                        return Err(Error::Schema(format!(
                            "cached path `{path}` of `{}` may not index into arrays",
                            self.attribute
                        )));
                    }
                }
            }
            _ => {}
        }

        Ok(())
    }

    /// Bind this field, and any element fields, to the schema that owns it.
    pub(crate) fn attach(&mut self, owner: &Weak<Schema>) {
        self.owner = owner.clone();

        if let Kind::Array(element) | Kind::Mapping(element, _) = &mut self.kind {
            element.attach(owner);
        }
    }

    /// Copy of this field addressing a single position of its collection.
    pub(crate) fn renamed(&self, name: impl Into<String>) -> Self {
        let mut field = self.clone();
        field.name = name.into();
        field
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Foreign (storage) key.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &Kind {
        &self.kind
    }

    pub fn owner(&self) -> Option<Arc<Schema>> {
        self.owner.upgrade()
    }

    pub fn foreign_kind(&self) -> Option<ForeignKind> {
        self.kind.foreign_kind()
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn exclusive_with(&self) -> &BTreeSet<String> {
        &self.exclusive
    }

    pub fn allowed_operators(&self) -> &BTreeSet<String> {
        &self.allowed_operators
    }

    pub fn disallowed_operators(&self) -> &BTreeSet<String> {
        &self.disallowed_operators
    }

    pub fn default_value(&self) -> Option<Value> {
        match self.default.as_ref()? {
            DefaultValue::Static(value) => Some(value.clone()),
            DefaultValue::Factory(factory) => Some(factory()),
        }
    }

    pub(crate) fn assigns(&self) -> bool {
        self.assign && self.default.is_some()
    }

    pub fn is_readable(&self, context: Option<&dyn Any>) -> bool {
        self.read.evaluate(context, self)
    }

    pub fn is_writeable(&self, context: Option<&dyn Any>) -> bool {
        self.write.evaluate(context, self)
    }

    pub fn is_sortable(&self, context: Option<&dyn Any>) -> bool {
        self.sort.evaluate(context, self)
    }

    pub fn is_projected(&self, context: Option<&dyn Any>) -> bool {
        self.project.evaluate(context, self)
    }

    pub fn validate(&self, value: &Value) -> Result<()> {
        if let Some(choices) = &self.choices {
            let allowed = match choices {
                Choices::Static(values) => values.contains(value),
                Choices::Dynamic(values) => values().contains(value),
            };

            if !allowed {
                return Err(Error::value_error(format!(
                    "{value:?} is not a valid choice for `{}`",
                    self.attribute
                )));
            }
        }

        match &self.validator {
            Some(validator) => validator(value),
            None => Ok(()),
        }
    }

    pub fn to_foreign(&self, value: Value) -> Result<Bson> {
        if value.is_null() {
            return Ok(Bson::Null);
        }

        self.kind.to_foreign(self, value)
    }

    /// Casts a query operand. Unlike [`Field::to_foreign`], embedded documents
    /// given as maps do not gain `assign` defaults.
    pub(crate) fn to_operand(&self, value: Value) -> Result<Bson> {
        if value.is_null() {
            return Ok(Bson::Null);
        }

        match &self.kind {
            Kind::Embed(kinds) => composite::embed_operand(self, kinds, value),
            Kind::Array(element) => composite::array_operand(element, value),
            kind => kind.to_foreign(self, value),
        }
    }

    pub fn to_native(&self, value: &Bson) -> Result<Value> {
        if matches!(value, Bson::Null) {
            return Ok(Value::Null);
        }

        self.kind.to_native(self, value)
    }

    /// Reads the native value of this field from `document`.
    ///
    /// A missing value falls back to the default (stored first when the field
    /// assigns), then to null for nullable fields. Anything else is
    /// [`Error::Unset`].
    pub fn get(&self, document: &mut Document) -> Result<Value> {
        if let Some(cached) = document.cache.get(&self.name) {
            return Ok(cached.clone());
        }

        let stored = match document.data.get(&self.name) {
            Some(stored) => stored.clone(),
            None => match self.default_value() {
                Some(default) if self.assign => {
                    self.store(document, default)?;
                    document.data.get(&self.name).cloned().unwrap_or(Bson::Null)
                }
                Some(default) => return Ok(default),
                None if self.nullable => return Ok(Value::Null),
                None => {
                    return Err(Error::Unset {
                        schema: document.schema().name().to_owned(),
                        field: self.attribute.clone(),
                    });
                }
            },
        };

        let value = self.to_native(&stored)?;

        if self.kind.caches_native() && !value.is_null() {
            document.cache.insert(self.name.clone(), value.clone());
        }

        Ok(value)
    }

    /// Validates, casts and stores `value`. Storage is untouched on failure.
    pub fn set(&self, document: &mut Document, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let schema = document.schema().clone();

        for sibling in &self.exclusive {
            let key = schema.field(sibling).map_or(sibling.as_str(), |field| field.name());

            if matches!(document.data.get(key), Some(stored) if *stored != Bson::Null) {
                return Err(Error::Exclusive {
                    field: self.attribute.clone(),
                    conflict: sibling.clone(),
                });
            }
        }

        self.store(document, value)
    }

    // Materialised defaults skip the exclusive check.
    fn store(&self, document: &mut Document, value: Value) -> Result<()> {
        let foreign = if value.is_null() {
            Bson::Null
        } else {
            self.validate(&value)?;
            self.to_foreign(value)?
        };

        document.cache.remove(&self.name);
        document.data.insert(self.name.clone(), foreign);

        Ok(())
    }

    /// Removes the value from storage entirely.
    pub fn delete(&self, document: &mut Document) {
        document.cache.remove(&self.name);
        document.data.remove(&self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn option_for_the_wrong_kind_fails_the_check() {
        let field = Field::integer("age").strip();
        assert!(matches!(field.check(), Err(Error::Schema(_))));
    }

    #[test]
    fn numeric_cache_path_is_rejected() {
        let field = Field::reference("owner", []).cache(["tags.0"]);
        assert!(matches!(field.check(), Err(Error::Schema(_))));
    }

    #[test]
    fn predicates() {
        let field = Field::string("secret")
            .readable(false)
            .writeable(Predicate::dynamic(|context, _| {
                context
                    .and_then(|c| c.downcast_ref::<&str>())
                    .is_some_and(|role| *role == "admin")
            }));

        assert!(!field.is_readable(None));
        assert!(field.is_sortable(None));
        assert!(field.is_writeable(Some(&"admin")));
        assert!(!field.is_writeable(Some(&"guest")));
        assert!(!field.is_writeable(None));
    }

    #[test]
    fn choices_restrict_values() {
        let field = Field::string("size").choices(["S", "M", "L"]);
        assert!(field.validate(&"M".into()).is_ok());
        assert!(matches!(field.validate(&"XL".into()), Err(Error::Value(_))));
    }

    #[test]
    fn scalar_fields_refuse_array_operators_by_default() {
        let field = Field::string("name");
        assert!(field.disallowed_operators().contains("#array"));
        assert!(Field::array("tags", Field::string("tag")).disallowed_operators().is_empty());
    }
}
