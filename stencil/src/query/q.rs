use crate::{
    Error, Field, ForeignKind, Result, Schema,
    kinds::Kind,
    query::Filter,
    value::{Value, int_to_bson},
};
use mongodb::bson::{Bson, Document, doc};
use std::{
    ops::{BitAnd, BitOr, BitXor, Neg},
    sync::Arc,
};
use tracing::trace;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Combinator {
    And,
    Or,
    Xor,
}

impl Combinator {
    fn reduce(self, left: Filter, right: Filter) -> Filter {
        match self {
            Self::And => left & right,
            Self::Or => left | right,
            Self::Xor => left ^ right,
        }
    }
}

/// Query node bound to one field path, or to a combination of nodes.
///
/// Operations on a simple node produce a [`Filter`] for its path. Operations
/// on a combination run against every member and fold the fragments with the
/// combination's own combinator, so `(a & b).eq(5)` is `a == 5 AND b == 5`.
/// A combination has no single path: dereferencing it is [`Error::Ambiguous`].
#[derive(Clone, Debug)]
pub struct Q(Repr);

#[derive(Clone, Debug)]
enum Repr {
    Simple(Node),
    Combined(Vec<Q>, Combinator),
}

#[derive(Clone, Debug)]
struct Node {
    schema: Arc<Schema>,
    field: Arc<Field>,
    path: String,
}

/// Shape argument of [`Q::within`]. Exactly one shape must be given.
#[derive(Clone, Debug, Default)]
pub struct Within {
    pub geometry: Option<Document>,
    pub center: Option<Bson>,
    pub sphere: Option<Bson>,
    pub radius: Option<f64>,
    pub bounding_box: Option<Bson>,
    pub polygon: Option<Bson>,
    pub crs: Option<Document>,
}

fn geometry(mut geometry: Document, crs: Option<Document>) -> Document {
    if let Some(crs) = crs {
        geometry.insert("crs", crs);
    }

    doc! { "$geometry": geometry }
}

impl Within {
    fn shape(self) -> Result<Document> {
        let given = [
            self.geometry.is_some(),
            self.center.is_some(),
            self.sphere.is_some(),
            self.bounding_box.is_some(),
            self.polygon.is_some(),
        ]
        .into_iter()
        .filter(|given| *given)
        .count();

        if given != 1 {
            return Err(Error::Ambiguous(format!(
                "`within` takes exactly one shape, {given} given"
            )));
        }

        let radius = || {
            self.radius
                .map(Bson::Double)
                .ok_or_else(|| Error::type_error("a circular shape needs a radius"))
        };

        if let Some(shape) = self.geometry {
            return Ok(geometry(shape, self.crs));
        }
        if let Some(center) = self.center.clone() {
            return Ok(doc! { "$center": [center, radius()?] });
        }
        if let Some(center) = self.sphere.clone() {
            return Ok(doc! { "$centerSphere": [center, radius()?] });
        }
        if let Some(corners) = self.bounding_box {
            return Ok(doc! { "$box": corners });
        }

        Ok(doc! { "$polygon": self.polygon.unwrap_or(Bson::Null) })
    }
}

impl Node {
    /// Development-time capability check against the field's operator sets.
    fn gate(&self, operators: &[&str]) -> Result<()> {
        if !cfg!(debug_assertions) {
            return Ok(());
        }

        let allowed = self.field.allowed_operators();
        let disallowed = self.field.disallowed_operators();

        let permitted = allowed.is_empty() || operators.iter().any(|op| allowed.contains(*op));
        let forbidden = operators.iter().find(|op| disallowed.contains(**op));

        if permitted && forbidden.is_none() {
            return Ok(());
        }

        let operator = forbidden.or(operators.first()).copied().unwrap_or_default();
        trace!(field = %self.path, operator, "operator rejected");

        Err(Error::NotImplemented {
            operator: operator.to_owned(),
            field: self.path.clone(),
        })
    }

    /// Casts a filter operand. Scalars compared against a collection field are
    /// cast as one of its elements.
    fn cast(&self, value: Value) -> Result<Bson> {
        self.cast_with(value, Field::to_operand)
    }

    fn cast_with(&self, value: Value, cast: fn(&Field, Value) -> Result<Bson>) -> Result<Bson> {
        if value.is_null() {
            return Ok(Bson::Null);
        }

        let whole = matches!(
            (self.field.kind(), &value),
            (_, Value::Array(_) | Value::Bson(Bson::Array(_))) | (Kind::Mapping(..), Value::Map(_))
        );

        match self.field.kind().element() {
            Some(element) if !whole => cast(element, value),
            _ => cast(self.field.as_ref(), value),
        }
    }

    fn cast_all(&self, values: &[Value]) -> Result<Bson> {
        values
            .iter()
            .map(|value| self.cast(value.clone()))
            .collect::<Result<Vec<_>>>()
            .map(Bson::Array)
    }

    fn fragment(&self, operator: &str, operand: impl Into<Bson>) -> Filter {
        let mut operation = Document::new();
        operation.insert(operator, operand);

        let mut fragment = Document::new();
        fragment.insert(self.path.clone(), operation);
        Filter::new(fragment)
    }

    fn compare(&self, operator: &str, tag: &str, value: Value) -> Result<Filter> {
        self.gate(&[operator, tag])?;
        Ok(self.fragment(operator, self.cast(value)?))
    }
}

/// A lone list argument stands for the values themselves.
fn spread(values: Vec<Value>) -> Vec<Value> {
    match values.as_slice() {
        [Value::Array(inner)] => inner.to_vec(),
        _ => values,
    }
}

impl Q {
    pub fn new(schema: &Arc<Schema>, attribute: &str) -> Result<Self> {
        let field = schema.try_field(attribute)?.clone();
        Ok(Self::simple(schema.clone(), field.name().to_owned(), field))
    }

    fn simple(schema: Arc<Schema>, path: String, field: Arc<Field>) -> Self {
        Self(Repr::Simple(Node { schema, field, path }))
    }

    pub fn combine(self, other: Self, combinator: Combinator) -> Self {
        let mut members = Vec::new();

        for member in [self, other] {
            match member.0 {
                Repr::Combined(inner, c) if c == combinator => members.extend(inner),
                repr => members.push(Self(repr)),
            }
        }

        Self(Repr::Combined(members, combinator))
    }

    pub fn is_combined(&self) -> bool {
        matches!(self.0, Repr::Combined(..))
    }

    fn node(&self, action: &str) -> Result<&Node> {
        match &self.0 {
            Repr::Simple(node) => Ok(node),
            Repr::Combined(..) => Err(Error::Ambiguous(format!(
                "cannot {action} a combination of fields"
            ))),
        }
    }

    fn apply<F: Fn(&Node) -> Result<Filter>>(&self, operation: &F) -> Result<Filter> {
        match &self.0 {
            Repr::Simple(node) => operation(node),
            Repr::Combined(members, combinator) => {
                let mut filters = members.iter().map(|member| member.apply(operation));
                let first = filters
                    .next()
                    .ok_or_else(|| Error::Ambiguous("empty combination".into()))??;

                filters.try_fold(first, |merged, next| Ok(combinator.reduce(merged, next?)))
            }
        }
    }

    pub fn field(&self) -> Result<&Arc<Field>> {
        self.node("resolve the field of").map(|node| &node.field)
    }

    /// Fully qualified dotted path.
    pub fn path(&self) -> Result<&str> {
        self.node("take the path of").map(|node| node.path.as_str())
    }

    /// Casts `value` the way filter operands on this path are cast.
    pub fn cast(&self, value: impl Into<Value>) -> Result<Bson> {
        self.node("cast for")?.cast(value.into())
    }

    /// Casts `value` to its stored form, `assign` defaults included.
    pub(crate) fn cast_stored(&self, value: impl Into<Value>) -> Result<Bson> {
        self.node("cast for")?.cast_with(value.into(), Field::to_foreign)
    }

    /// Equality. Never gated.
    pub fn eq(&self, value: impl Into<Value>) -> Result<Filter> {
        let value = value.into();
        self.apply(&|node| Ok(Filter::new(doc! { node.path.clone(): node.cast(value.clone())? })))
    }

    pub fn ne(&self, value: impl Into<Value>) -> Result<Filter> {
        let value = value.into();
        self.apply(&|node| node.compare("$ne", "#eq", value.clone()))
    }

    pub fn lt(&self, value: impl Into<Value>) -> Result<Filter> {
        let value = value.into();
        self.apply(&|node| node.compare("$lt", "#rel", value.clone()))
    }

    pub fn lte(&self, value: impl Into<Value>) -> Result<Filter> {
        let value = value.into();
        self.apply(&|node| node.compare("$lte", "#rel", value.clone()))
    }

    pub fn gt(&self, value: impl Into<Value>) -> Result<Filter> {
        let value = value.into();
        self.apply(&|node| node.compare("$gt", "#rel", value.clone()))
    }

    pub fn gte(&self, value: impl Into<Value>) -> Result<Filter> {
        let value = value.into();
        self.apply(&|node| node.compare("$gte", "#rel", value.clone()))
    }

    /// Half-open interval `[gte, lt)`.
    pub fn range(&self, gte: impl Into<Value>, lt: impl Into<Value>) -> Result<Filter> {
        let (gte, lt) = (gte.into(), lt.into());
        self.apply(&|node| {
            let lower = node.compare("$gte", "#rel", gte.clone())?;
            let upper = node.compare("$lt", "#rel", lt.clone())?;
            Ok(lower & upper)
        })
    }

    /// Matches any of `values`.
    pub fn any<V: Into<Value>>(&self, values: impl IntoIterator<Item = V>) -> Result<Filter> {
        let values = spread(values.into_iter().map(Into::into).collect());
        self.apply(&|node| {
            node.gate(&["$in", "#eq"])?;
            Ok(node.fragment("$in", node.cast_all(&values)?))
        })
    }

    /// Matches none of `values`.
    pub fn none<V: Into<Value>>(&self, values: impl IntoIterator<Item = V>) -> Result<Filter> {
        let values = spread(values.into_iter().map(Into::into).collect());
        self.apply(&|node| {
            node.gate(&["$nin", "#eq"])?;
            Ok(node.fragment("$nin", node.cast_all(&values)?))
        })
    }

    /// Array containing every one of `values`.
    pub fn all<V: Into<Value>>(&self, values: impl IntoIterator<Item = V>) -> Result<Filter> {
        let values = spread(values.into_iter().map(Into::into).collect());
        self.apply(&|node| {
            node.gate(&["$all", "#array"])?;
            Ok(node.fragment("$all", node.cast_all(&values)?))
        })
    }

    /// Array with an element matching `inner`.
    pub fn elem_match(&self, inner: impl Into<Filter>) -> Result<Filter> {
        let inner = inner.into().into_query();
        self.apply(&|node| {
            node.gate(&["$elemMatch", "#document"])?;
            Ok(node.fragment("$elemMatch", inner.clone()))
        })
    }

    pub fn size(&self, length: u32) -> Result<Filter> {
        self.apply(&|node| {
            node.gate(&["$size", "#array"])?;
            Ok(node.fragment("$size", int_to_bson(length.into())))
        })
    }

    pub fn exists(&self, exists: bool) -> Result<Filter> {
        self.apply(&|node| Ok(node.fragment("$exists", exists)))
    }

    /// Matches the given foreign kinds, or the field's own when none are given.
    pub fn of_type(&self, kinds: &[ForeignKind]) -> Result<Filter> {
        self.apply(&|node| {
            node.gate(&["$type"])?;

            let mut selected: Vec<ForeignKind> = Vec::new();
            if kinds.is_empty() {
                selected.extend(node.field.foreign_kind());
            }
            for kind in kinds {
                if !selected.contains(kind) {
                    selected.push(*kind);
                }
            }

            let operand = match selected.as_slice() {
                [] => {
                    return Err(Error::type_error(format!(
                        "`{}` declares no foreign kind to match",
                        node.path
                    )));
                }
                [kind] => Bson::from(*kind),
                kinds => Bson::Array(kinds.iter().copied().map(Bson::from).collect()),
            };

            Ok(node.fragment("$type", operand))
        })
    }

    /// Regular expression built by concatenating `parts` without escaping.
    pub fn re<S: AsRef<str>>(&self, parts: impl IntoIterator<Item = S>) -> Result<Filter> {
        let pattern: String = parts.into_iter().map(|part| part.as_ref().to_owned()).collect();
        self.apply(&|node| {
            node.gate(&["$regex", "#string"])?;
            Ok(node.fragment("$regex", pattern.clone()))
        })
    }

    pub fn near(
        &self,
        center: impl Into<Bson>,
        sphere: bool,
        min: Option<f64>,
        max: Option<f64>,
    ) -> Result<Filter> {
        let center = center.into();
        let operator = if sphere { "$nearSphere" } else { "$near" };

        self.apply(&|node| {
            node.gate(&[operator, "#geo"])?;

            let mut near = doc! { "$geometry": center.clone() };
            if let Some(min) = min {
                near.insert("$minDistance", min);
            }
            if let Some(max) = max {
                near.insert("$maxDistance", max);
            }

            Ok(node.fragment(operator, near))
        })
    }

    pub fn within(&self, within: Within) -> Result<Filter> {
        let shape = within.shape()?;
        self.apply(&|node| {
            node.gate(&["$geoWithin", "#geo"])?;
            Ok(node.fragment("$geoWithin", shape.clone()))
        })
    }

    pub fn intersects(&self, shape: Document, crs: Option<Document>) -> Result<Filter> {
        let shape = geometry(shape, crs);
        self.apply(&|node| {
            node.gate(&["$geoIntersects", "#geo"])?;
            Ok(node.fragment("$geoIntersects", shape.clone()))
        })
    }

    /// The array element matched by a preceding positional query (`path.$`).
    pub fn positional(&self) -> Result<Self> {
        let node = self.node("address the matched element of")?;
        Ok(Self::simple(
            node.schema.clone(),
            format!("{}.$", node.path),
            node.field.clone(),
        ))
    }

    /// Descends into the nested field `attribute` of an embedded, referenced
    /// or collection-of-documents field.
    pub fn get(&self, attribute: &str) -> Result<Self> {
        let node = self.node("dereference")?;

        let mut field: &Field = &node.field;
        while let Some(element) = field.kind().element() {
            field = element;
        }

        for schema in field.kind().schemas() {
            if let Some(nested) = schema.field(attribute) {
                return Ok(Self::simple(
                    schema.clone(),
                    format!("{}.{}", node.path, nested.name()),
                    nested.clone(),
                ));
            }
        }

        Err(Error::UnknownField {
            schema: node.schema.name().to_owned(),
            field: format!("{}.{attribute}", node.path),
        })
    }

    /// Addresses one position of an array or mapping field.
    pub fn index(&self, index: usize) -> Result<Self> {
        let node = self.node("index")?;
        let element = node.field.kind().element().ok_or_else(|| {
            Error::type_error(format!("`{}` is not an array and cannot be indexed", node.path))
        })?;

        let path = format!("{}.{index}", node.path);
        let field = Arc::new(element.renamed(path.clone()));

        Ok(Self::simple(node.schema.clone(), path, field))
    }
}

impl BitAnd for Q {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self::Output {
        self.combine(rhs, Combinator::And)
    }
}

impl BitOr for Q {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.combine(rhs, Combinator::Or)
    }
}

impl BitXor for Q {
    type Output = Self;

    fn bitxor(self, rhs: Self) -> Self::Output {
        self.combine(rhs, Combinator::Xor)
    }
}

/// `-q` matches documents where the path is absent.
impl Neg for &Q {
    type Output = Result<Filter>;

    fn neg(self) -> Self::Output {
        self.exists(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Arc<Schema> {
        Schema::builder("Place")
            .field(Field::string("name"))
            .field(Field::any("location"))
            .build()
            .unwrap()
    }

    #[test]
    fn within_needs_exactly_one_shape() {
        let location = Q::new(&schema(), "location").unwrap();

        assert!(matches!(location.within(Within::default()), Err(Error::Ambiguous(_))));
        assert!(matches!(
            location.within(Within {
                polygon: Some(Bson::Array(vec![])),
                bounding_box: Some(Bson::Array(vec![])),
                ..Within::default()
            }),
            Err(Error::Ambiguous(_))
        ));
    }

    #[test]
    fn within_circle() {
        let location = Q::new(&schema(), "location").unwrap();
        let filter = location
            .within(Within {
                center: Some(Bson::Array(vec![0.into(), 0.into()])),
                radius: Some(5.0),
                ..Within::default()
            })
            .unwrap();

        assert_eq!(
            filter.as_query(),
            &doc! { "location": { "$geoWithin": { "$center": [[0, 0], 5.0] } } }
        );
    }

    #[test]
    fn geometry_carries_crs() {
        let location = Q::new(&schema(), "location").unwrap();
        let filter = location
            .intersects(
                doc! { "type": "Point", "coordinates": [1, 2] },
                Some(doc! { "type": "name" }),
            )
            .unwrap();

        assert_eq!(
            filter.as_query(),
            &doc! { "location": { "$geoIntersects": { "$geometry": {
                "type": "Point", "coordinates": [1, 2], "crs": { "type": "name" }
            } } } }
        );
    }

    #[test]
    fn near_sphere_with_bounds() {
        let location = Q::new(&schema(), "location").unwrap();
        let filter = location
            .near(doc! { "type": "Point", "coordinates": [1, 2] }, true, None, Some(10.0))
            .unwrap();

        assert_eq!(
            filter.as_query(),
            &doc! { "location": { "$nearSphere": {
                "$geometry": { "type": "Point", "coordinates": [1, 2] },
                "$maxDistance": 10.0,
            } } }
        );
    }

    #[test]
    fn lone_list_is_spread() {
        let values = spread(vec![Value::from(vec![Value::from(1), Value::from(2)])]);
        assert_eq!(values, [Value::from(1), Value::from(2)]);
    }
}
