use std::{fmt, marker::PhantomData, path::Path, sync::Arc};

use serde::{
    Deserialize,
    Deserializer,
    Serialize,
    Serializer,
    de::{MapAccess, Visitor},
    ser::SerializeMap,
};
use serde_json::{Map, Value};

use crate::{
    error::{Error, Result},
    transport::Transport,
};

/// Sort direction for a single-field sort directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortOrder {
    pub field: String,
    pub direction: Direction,
}

/// Inclusive bounds for a range filter. Either side may be open.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Range {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gte: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lte: Option<Value>,
}

impl Range {
    pub fn between(lower: impl Into<Value>, upper: impl Into<Value>) -> Self {
        Self {
            gte: Some(lower.into()),
            lte: Some(upper.into()),
        }
    }

    pub fn at_least(lower: impl Into<Value>) -> Self {
        Self {
            gte: Some(lower.into()),
            lte: None,
        }
    }

    pub fn at_most(upper: impl Into<Value>) -> Self {
        Self {
            gte: None,
            lte: Some(upper.into()),
        }
    }
}

/// Custom execution override. Receives the transport, the free-text query
/// and the fully assembled request body, and its result is handed back to
/// the caller untouched.
pub type SearchCallback = Arc<
    dyn Fn(&dyn Transport, &str, &Map<String, Value>) -> Result<Value>
        + Send
        + Sync,
>;

/// Insertion-ordered field mapping.
///
/// Re-inserting an existing field replaces its value in place, so the
/// field keeps the position of its first insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMap<V> {
    entries: Vec<(String, V)>,
}

impl<V> Default for FieldMap<V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<V> FieldMap<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: impl Into<String>, value: V) {
        let field = field.into();
        match self.entries.iter_mut().find(|(k, _)| *k == field) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((field, value)),
        }
    }

    pub fn get(&self, field: &str) -> Option<&V> {
        self.entries.iter().find(|(k, _)| k == field).map(|(_, v)| v)
    }

    pub fn contains_key(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

impl<V: Serialize> Serialize for FieldMap<V> {
    fn serialize<S: Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for FieldMap<V> {
    fn deserialize<D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        struct FieldMapVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for FieldMapVisitor<V> {
            type Value = FieldMap<V>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object keyed by field name")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut map = FieldMap::new();
                while let Some((k, v)) = access.next_entry::<String, V>()? {
                    map.insert(k, v);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(FieldMapVisitor(PhantomData))
    }
}

/// A backend-agnostic description of one logical query.
///
/// Built once by the caller and only read by the compiler, executor and
/// reconciler. Deserializes from the JSON accepted by the CLI:
///
/// ```
/// use searchbridge::predicate::PredicateSet;
///
/// let p: PredicateSet = serde_json::from_str(r#"{
///     "index": "posts",
///     "query": "rust",
///     "fields": ["title", "body"],
///     "where": {"status": "published"},
///     "where_in": {"tag": ["db", "search"]},
///     "ranges": {"year": {"gte": 2020}},
///     "orders": [{"field": "year", "direction": "desc"}],
///     "limit": 20
/// }"#).unwrap();
/// assert_eq!(p.wheres.len(), 1);
/// assert_eq!(p.limit, Some(20));
/// ```
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PredicateSet {
    /// Target index (collection) name.
    pub index: String,
    /// Free-text query; empty means no text clause.
    pub query: String,
    /// Fields the free-text query is matched against.
    pub fields: Vec<String>,
    #[serde(rename = "where")]
    pub wheres: FieldMap<Value>,
    pub where_in: FieldMap<Vec<Value>>,
    pub where_not_in: FieldMap<Vec<Value>>,
    pub ranges: FieldMap<Range>,
    pub orders: Vec<SortOrder>,
    pub limit: Option<usize>,
    pub offset: usize,
    pub distinct: Option<String>,
    /// Per-query request options, merged over the executor defaults.
    pub options: Map<String, Value>,
    #[serde(skip)]
    pub callback: Option<SearchCallback>,
}

impl fmt::Debug for PredicateSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredicateSet")
            .field("index", &self.index)
            .field("query", &self.query)
            .field("fields", &self.fields)
            .field("wheres", &self.wheres)
            .field("where_in", &self.where_in)
            .field("where_not_in", &self.where_not_in)
            .field("ranges", &self.ranges)
            .field("orders", &self.orders)
            .field("limit", &self.limit)
            .field("offset", &self.offset)
            .field("distinct", &self.distinct)
            .field("options", &self.options)
            .field("callback", &self.callback.as_ref().map(|_| "<callback>"))
            .finish()
    }
}

impl PredicateSet {
    pub fn new(index: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            query: query.into(),
            ..Self::default()
        }
    }

    /// Load a predicate set from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::NotFound {
                kind: "predicate file",
                name: path.display().to_string(),
            });
        }
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn where_eq(
        mut self,
        field: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.wheres.insert(field, value.into());
        self
    }

    pub fn where_in<I, V>(mut self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.where_in
            .insert(field, values.into_iter().map(Into::into).collect());
        self
    }

    pub fn where_not_in<I, V>(
        mut self,
        field: impl Into<String>,
        values: I,
    ) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.where_not_in
            .insert(field, values.into_iter().map(Into::into).collect());
        self
    }

    /// Inclusive range over exactly two bounds, `[lower, upper]`.
    pub fn where_between(
        self,
        field: impl Into<String>,
        bounds: &[Value],
    ) -> Result<Self> {
        let [lower, upper] = bounds else {
            let rendered: Vec<String> =
                bounds.iter().map(Value::to_string).collect();
            return Err(Error::MalformedInput(format!(
                "between expects exactly two bounds, got [{}]",
                rendered.join(", ")
            )));
        };
        Ok(self.where_range(field, Range::between(lower.clone(), upper.clone())))
    }

    pub fn where_range(mut self, field: impl Into<String>, range: Range) -> Self {
        self.ranges.insert(field, range);
        self
    }

    pub fn order_by(
        mut self,
        field: impl Into<String>,
        direction: Direction,
    ) -> Self {
        self.orders.push(SortOrder {
            field: field.into(),
            direction,
        });
        self
    }

    pub fn take(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn skip(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Switch to aggregation mode: return distinct values of `field`.
    pub fn distinct(mut self, field: impl Into<String>) -> Self {
        self.distinct = Some(field.into());
        self
    }

    pub fn with_options(mut self, options: Map<String, Value>) -> Self {
        self.options = options;
        self
    }

    pub fn with_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&dyn Transport, &str, &Map<String, Value>) -> Result<Value>
            + Send
            + Sync
            + 'static,
    {
        self.callback = Some(Arc::new(callback));
        self
    }

    /// The distinct field, if aggregation mode is active and the field is
    /// not blank.
    pub fn distinct_field(&self) -> Option<&str> {
        self.distinct
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn field_map_keeps_first_position_on_overwrite() {
        let mut map = FieldMap::new();
        map.insert("a", 1);
        map.insert("b", 2);
        map.insert("a", 3);

        let entries: Vec<_> = map.iter().collect();
        assert_eq!(entries, vec![("a", &3), ("b", &2)]);
    }

    #[test]
    fn where_between_requires_two_bounds() {
        let err = PredicateSet::new("posts", "")
            .where_between("year", &[json!(2020)])
            .unwrap_err();
        assert!(matches!(err, Error::MalformedInput(_)));
        assert!(err.to_string().contains("[2020]"));

        let err = PredicateSet::new("posts", "")
            .where_between("year", &[json!(1), json!(2), json!(3)])
            .unwrap_err();
        assert!(matches!(err, Error::MalformedInput(_)));
    }

    #[test]
    fn where_between_sets_inclusive_range() {
        let p = PredicateSet::new("posts", "")
            .where_between("year", &[json!(2020), json!(2024)])
            .unwrap();
        assert_eq!(p.ranges.get("year"), Some(&Range::between(2020, 2024)));
    }

    #[test]
    fn deserialize_preserves_filter_order() {
        let p: PredicateSet = serde_json::from_str(
            r#"{"index": "t", "where": {"zeta": 1, "alpha": 2, "mid": 3}}"#,
        )
        .unwrap();
        let keys: Vec<_> = p.wheres.keys().collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn deserialize_defaults_everything_else() {
        let p: PredicateSet = serde_json::from_str(r#"{"index": "t"}"#).unwrap();
        assert!(p.query.is_empty());
        assert!(p.wheres.is_empty());
        assert_eq!(p.limit, None);
        assert_eq!(p.offset, 0);
        assert!(p.callback.is_none());
    }

    #[test]
    fn blank_distinct_field_is_ignored() {
        let p = PredicateSet::new("t", "").distinct("  ");
        assert_eq!(p.distinct_field(), None);

        let p = PredicateSet::new("t", "").distinct("brand");
        assert_eq!(p.distinct_field(), Some("brand"));
    }

    #[test]
    fn missing_predicate_file_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let err =
            PredicateSet::from_json_file(&tmp.path().join("nope.json"))
                .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }
}
