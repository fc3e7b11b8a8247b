use std::{
    collections::HashSet,
    io::{BufRead, BufReader},
    path::Path,
};

use serde_json::{Map, Value};

use crate::{
    error::{Error, Result},
    predicate::PredicateSet,
};

/// A domain record that can be written to the search index.
pub trait Record {
    /// The unique external identifier, used as the document `_id`.
    fn key(&self) -> String;

    /// The identifier as stored in the indexed document.
    fn key_value(&self) -> Value {
        Value::from(self.key())
    }

    /// Field name the identifier is stored under in the indexed document.
    fn key_name(&self) -> &str {
        "id"
    }

    /// Name of the index the record belongs to.
    fn collection(&self) -> &str;

    /// The searchable document. `None` or an empty map opts the record out
    /// of indexing.
    fn searchable(&self) -> Option<Map<String, Value>>;

    /// Extra metadata merged into the document after the searchable fields.
    fn metadata(&self) -> Map<String, Value> {
        Map::new()
    }

    /// Whether the record tracks soft deletion.
    fn soft_deletes(&self) -> bool {
        false
    }

    /// Whether the record is currently soft-deleted.
    fn is_trashed(&self) -> bool {
        false
    }
}

/// The backing store records are re-fetched from after a search.
///
/// Both operations may return fewer records than requested, in any order.
pub trait RecordSource {
    type Record: Record;

    fn fetch_by_ids(
        &self,
        predicates: &PredicateSet,
        ids: &[String],
    ) -> Result<Vec<Self::Record>>;

    /// Pull-based variant of [`RecordSource::fetch_by_ids`].
    fn stream_by_ids<'a>(
        &'a self,
        predicates: &PredicateSet,
        ids: &[String],
    ) -> Result<Box<dyn Iterator<Item = Self::Record> + 'a>>;
}

/// Render an identifier value the way hit `_id`s and record keys are
/// compared: strings verbatim, anything else as its JSON text.
pub fn key_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A record backed by a plain JSON object.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonRecord {
    collection: String,
    key_name: String,
    fields: Map<String, Value>,
    trashed_field: Option<String>,
}

impl JsonRecord {
    /// Wrap a JSON object. The object must carry a non-null `key_name`
    /// field.
    pub fn new(
        collection: impl Into<String>,
        key_name: impl Into<String>,
        fields: Map<String, Value>,
    ) -> Result<Self> {
        let key_name = key_name.into();
        match fields.get(&key_name) {
            None | Some(Value::Null) => {
                return Err(Error::MalformedInput(format!(
                    "record has no '{key_name}' field"
                )));
            }
            Some(_) => {}
        }
        Ok(Self {
            collection: collection.into(),
            key_name,
            fields,
            trashed_field: None,
        })
    }

    /// Track soft deletion through `field`: the record counts as trashed
    /// when that field is present and not null.
    pub fn soft_deleting(mut self, field: impl Into<String>) -> Self {
        self.trashed_field = Some(field.into());
        self
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.fields
    }
}

impl Record for JsonRecord {
    fn key(&self) -> String {
        self.fields
            .get(&self.key_name)
            .map(key_to_string)
            .unwrap_or_default()
    }

    fn key_value(&self) -> Value {
        self.fields.get(&self.key_name).cloned().unwrap_or(Value::Null)
    }

    fn key_name(&self) -> &str {
        &self.key_name
    }

    fn collection(&self) -> &str {
        &self.collection
    }

    fn searchable(&self) -> Option<Map<String, Value>> {
        let mut doc = self.fields.clone();
        if let Some(field) = &self.trashed_field {
            doc.remove(field);
        }
        Some(doc)
    }

    fn soft_deletes(&self) -> bool {
        self.trashed_field.is_some()
    }

    fn is_trashed(&self) -> bool {
        self.trashed_field
            .as_ref()
            .and_then(|f| self.fields.get(f))
            .is_some_and(|v| !v.is_null())
    }
}

/// Read JSON-lines records (one object per line, blank lines skipped).
pub fn read_json_lines(
    path: &Path,
    collection: &str,
    key_name: &str,
) -> Result<Vec<JsonRecord>> {
    if !path.exists() {
        return Err(Error::NotFound {
            kind: "record file",
            name: path.display().to_string(),
        });
    }

    let reader = BufReader::new(std::fs::File::open(path)?);
    let mut records = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let fields = match serde_json::from_str::<Value>(&line)? {
            Value::Object(map) => map,
            _ => {
                return Err(Error::MalformedInput(format!(
                    "{}:{}: expected a JSON object",
                    path.display(),
                    lineno + 1
                )));
            }
        };
        records.push(JsonRecord::new(collection, key_name, fields)?);
    }
    Ok(records)
}

/// An in-memory record store.
#[derive(Debug, Clone, Default)]
pub struct MemoryRecordSource {
    records: Vec<JsonRecord>,
}

impl MemoryRecordSource {
    pub fn new(records: Vec<JsonRecord>) -> Self {
        Self { records }
    }

    pub fn from_json_lines(
        path: &Path,
        collection: &str,
        key_name: &str,
    ) -> Result<Self> {
        Ok(Self::new(read_json_lines(path, collection, key_name)?))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl RecordSource for MemoryRecordSource {
    type Record = JsonRecord;

    fn fetch_by_ids(
        &self,
        predicates: &PredicateSet,
        ids: &[String],
    ) -> Result<Vec<JsonRecord>> {
        Ok(self.stream_by_ids(predicates, ids)?.collect())
    }

    fn stream_by_ids<'a>(
        &'a self,
        _predicates: &PredicateSet,
        ids: &[String],
    ) -> Result<Box<dyn Iterator<Item = JsonRecord> + 'a>> {
        let wanted: HashSet<String> = ids.iter().cloned().collect();
        Ok(Box::new(
            self.records
                .iter()
                .filter(move |r| wanted.contains(&r.key()))
                .cloned(),
        ))
    }
}
