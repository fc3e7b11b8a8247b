use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use crate::{
    error::Result,
    query::SOFT_DELETED_FIELD,
    record::Record,
    transport::Transport,
};

/// A single bulk write operation.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Index {
        collection: String,
        id: String,
        document: Map<String, Value>,
    },
    Delete {
        collection: String,
        id: String,
    },
}

impl WriteOp {
    fn push_lines(&self, body: &mut Vec<Value>) {
        match self {
            WriteOp::Index {
                collection,
                id,
                document,
            } => {
                body.push(
                    json!({ "index": { "_index": collection, "_id": id } }),
                );
                body.push(Value::Object(document.clone()));
            }
            WriteOp::Delete { collection, id } => {
                body.push(
                    json!({ "delete": { "_index": collection, "_id": id } }),
                );
            }
        }
    }
}

/// Operations destined for one bulk round trip.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    collection: String,
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            ops: Vec::new(),
        }
    }

    pub fn push(&mut self, op: WriteOp) {
        self.ops.push(op);
    }

    /// The index the bulk request is addressed to.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// The bulk body: each index operation contributes a header and a
    /// document, each delete a header alone.
    pub fn to_body(&self) -> Vec<Value> {
        let mut body = Vec::with_capacity(self.ops.len() * 2);
        for op in &self.ops {
            op.push_lines(&mut body);
        }
        body
    }
}

/// Build the document indexed for `record`, or `None` when the record
/// opts out by serializing to nothing.
///
/// The document is the searchable fields, then metadata, then the key
/// under its key name; later entries win on collision.
pub fn document_for<R: Record>(
    record: &R,
    soft_delete: bool,
) -> Option<Map<String, Value>> {
    let searchable = record.searchable().filter(|doc| !doc.is_empty())?;

    let mut metadata = record.metadata();
    if soft_delete && record.soft_deletes() {
        metadata.insert(
            SOFT_DELETED_FIELD.to_string(),
            Value::from(u8::from(record.is_trashed())),
        );
    }

    let mut document = searchable;
    document.extend(metadata);
    document.insert(record.key_name().to_string(), record.key_value());
    Some(document)
}

/// Build an index batch. Records that serialize to nothing are skipped.
pub fn build_index_batch<R: Record>(
    records: &[R],
    soft_delete: bool,
) -> WriteBatch {
    let Some(first) = records.first() else {
        return WriteBatch::default();
    };

    let mut batch = WriteBatch::new(first.collection());
    for record in records {
        if let Some(document) = document_for(record, soft_delete) {
            batch.push(WriteOp::Index {
                collection: record.collection().to_string(),
                id: record.key(),
                document,
            });
        }
    }
    batch
}

/// Build a delete batch from full records.
pub fn build_delete_batch<R: Record>(records: &[R]) -> WriteBatch {
    let Some(first) = records.first() else {
        return WriteBatch::default();
    };

    let mut batch = WriteBatch::new(first.collection());
    for record in records {
        batch.push(WriteOp::Delete {
            collection: record.collection().to_string(),
            id: record.key(),
        });
    }
    batch
}

/// Build a delete batch from bare identifiers.
pub fn build_delete_batch_for_ids(
    collection: &str,
    ids: &[String],
) -> WriteBatch {
    let mut batch = WriteBatch::new(collection);
    for id in ids {
        batch.push(WriteOp::Delete {
            collection: collection.to_string(),
            id: id.clone(),
        });
    }
    batch
}

/// Submit a batch in one bulk call. An empty batch makes no call and
/// returns `None`. Transport failures propagate unchanged.
pub fn submit<T: Transport + ?Sized>(
    transport: &T,
    batch: &WriteBatch,
) -> Result<Option<Value>> {
    if batch.is_empty() {
        debug!("bulk batch is empty, skipping engine call");
        return Ok(None);
    }

    debug!(
        index = batch.collection(),
        operations = batch.len(),
        "submitting bulk batch"
    );
    let response = transport.bulk(batch.collection(), &batch.to_body())?;

    if response.get("errors").and_then(Value::as_bool) == Some(true) {
        warn!(
            index = batch.collection(),
            failed = failed_items(&response),
            "bulk response reported item errors"
        );
    }

    Ok(Some(response))
}

/// Number of items in a bulk response whose result carries an `error`.
pub fn failed_items(response: &Value) -> usize {
    response
        .get("items")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter(|item| {
                    item.as_object()
                        .and_then(|o| o.values().next())
                        .is_some_and(|r| r.get("error").is_some())
                })
                .count()
        })
        .unwrap_or(0)
}
