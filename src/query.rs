//! Compile a [`PredicateSet`] into a boolean query document.
//!
//! The compiled tree has four slots:
//!
//! - `must`: the free-text `simple_query_string` clause, when there is one
//! - `filter`: exact `term` and inclusive `range` constraints (unscored)
//! - `should`: one `term` clause per set-membership value, with
//!   `minimum_should_match` equal to the number of set-membership fields
//! - `must_not`: one `terms` clause per excluded value set
//!
//! Clause order follows the insertion order of the predicate set.

use serde::{Serialize, Serializer, ser::SerializeMap};
use serde_json::{Value, json};

use crate::predicate::{PredicateSet, Range, SortOrder};

/// Metadata field carried by soft-delete-aware documents.
pub const SOFT_DELETED_FIELD: &str = "__soft_deleted";

/// A `{field: value}` object, the body shape of every leaf clause.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldPair<V> {
    pub field: String,
    pub value: V,
}

impl<V: Serialize> Serialize for FieldPair<V> {
    fn serialize<S: Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.field, &self.value)?;
        map.end()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MatchAll {}

/// One leaf clause of the boolean tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Clause {
    SimpleQueryString {
        query: String,
        fields: Vec<String>,
        default_operator: &'static str,
    },
    Term(FieldPair<Value>),
    Terms(FieldPair<Vec<Value>>),
    Range(FieldPair<Range>),
    MatchAll(MatchAll),
}

impl Clause {
    pub fn term(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Clause::Term(FieldPair {
            field: field.into(),
            value: value.into(),
        })
    }

    pub fn terms(field: impl Into<String>, values: Vec<Value>) -> Self {
        Clause::Terms(FieldPair {
            field: field.into(),
            value: values,
        })
    }

    pub fn range(field: impl Into<String>, range: Range) -> Self {
        Clause::Range(FieldPair {
            field: field.into(),
            value: range,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BoolQuery {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub must: Vec<Clause>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub filter: Vec<Clause>,
    /// Present whenever set-membership filters were given, even if every
    /// value list was empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub should: Option<Vec<Clause>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum_should_match: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub must_not: Vec<Clause>,
}

/// The compiled query document: `{"bool": {...}}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CompiledQuery {
    pub bool: BoolQuery,
}

impl CompiledQuery {
    pub fn to_value(&self) -> Value {
        json!({ "bool": &self.bool })
    }
}

/// Compile the predicate set into a boolean query.
pub fn compile(predicates: &PredicateSet) -> CompiledQuery {
    let mut query = BoolQuery::default();

    if !predicates.query.is_empty() {
        query.must.push(Clause::SimpleQueryString {
            query: predicates.query.clone(),
            fields: predicates.fields.clone(),
            default_operator: "and",
        });
    }

    if !predicates.wheres.is_empty() || !predicates.ranges.is_empty() {
        // The soft-delete term always leads; a caller-supplied value
        // replaces the default but keeps the leading slot.
        let soft_deleted = predicates
            .wheres
            .get(SOFT_DELETED_FIELD)
            .cloned()
            .unwrap_or_else(|| Value::from(0));
        query.filter.push(Clause::term(SOFT_DELETED_FIELD, soft_deleted));
        for (field, value) in predicates.wheres.iter() {
            if field != SOFT_DELETED_FIELD {
                query.filter.push(Clause::term(field, value.clone()));
            }
        }
        for (field, range) in predicates.ranges.iter() {
            query.filter.push(Clause::range(field, range.clone()));
        }
    }

    if !predicates.where_in.is_empty() {
        // One match per field, not per value: a conjunction of disjunctions.
        query.minimum_should_match = Some(predicates.where_in.len());
        query.should = Some(
            predicates
                .where_in
                .iter()
                .flat_map(|(field, values)| {
                    values.iter().map(move |v| Clause::term(field, v.clone()))
                })
                .collect(),
        );
    }

    for (field, values) in predicates.where_not_in.iter() {
        query.must_not.push(Clause::terms(field, values.clone()));
    }

    CompiledQuery { bool: query }
}

/// Compile sort orders to single-field sort directives, in caller order.
pub fn compile_sort(orders: &[SortOrder]) -> Vec<Value> {
    orders
        .iter()
        .map(|o| json!({ &o.field: { "order": o.direction.as_str() } }))
        .collect()
}
