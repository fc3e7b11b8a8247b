use std::{
    collections::{BTreeMap, HashMap},
    iter::FusedIterator,
};

use serde_json::Value;
use tracing::debug;

use crate::{
    error::Result,
    executor::map_ids,
    predicate::PredicateSet,
    record::{Record, RecordSource},
};

/// Map each hit identifier to its rank. A repeated identifier keeps its
/// first rank.
fn rank_index(ids: &[String]) -> HashMap<String, usize> {
    let mut positions = HashMap::with_capacity(ids.len());
    for (rank, id) in ids.iter().enumerate() {
        positions.entry(id.clone()).or_insert(rank);
    }
    positions
}

/// Re-fetch the records behind `hits` and return them in rank order.
///
/// `hits` is the `hits` sub-structure of a search response. `None`, a
/// missing hit list or an empty one yield an empty vector without calling
/// the source. Otherwise the source is asked once for every identifier;
/// records it returns that are not in the hit list are dropped, and hits it
/// has no record for are skipped. If the source returns several records for
/// one identifier, the first one wins.
pub fn reconcile<S: RecordSource>(
    source: &S,
    predicates: &PredicateSet,
    hits: Option<&Value>,
) -> Result<Vec<S::Record>> {
    let ids = map_ids(hits);
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let positions = rank_index(&ids);
    let fetched = source.fetch_by_ids(predicates, &ids)?;
    let fetched_count = fetched.len();

    let mut ranked = BTreeMap::new();
    for record in fetched {
        if let Some(&rank) = positions.get(&record.key()) {
            ranked.entry(rank).or_insert(record);
        }
    }

    debug!(
        hits = ids.len(),
        fetched = fetched_count,
        kept = ranked.len(),
        "reconciled search hits"
    );
    Ok(ranked.into_values().collect())
}

/// Streaming variant of [`reconcile`]: records are pulled from the source
/// only as far as needed to emit the next one in rank order.
pub fn reconcile_lazy<'a, S: RecordSource>(
    source: &'a S,
    predicates: &PredicateSet,
    hits: Option<&Value>,
) -> Result<RankOrdered<'a, S::Record>> {
    let ids = map_ids(hits);
    if ids.is_empty() {
        return Ok(RankOrdered::new(Box::new(std::iter::empty()), &ids));
    }
    let stream = source.stream_by_ids(predicates, &ids)?;
    Ok(RankOrdered::new(stream, &ids))
}

/// Reorders a record stream by hit rank.
///
/// A record is held back until every better-ranked hit has either been
/// emitted or the stream has ended. Once the stream ends, whatever is still
/// held is emitted in rank order.
pub struct RankOrdered<'a, R> {
    source: Box<dyn Iterator<Item = R> + 'a>,
    positions: HashMap<String, usize>,
    pending: BTreeMap<usize, R>,
    next_rank: usize,
    exhausted: bool,
}

impl<'a, R: Record> RankOrdered<'a, R> {
    fn new(source: Box<dyn Iterator<Item = R> + 'a>, ids: &[String]) -> Self {
        Self {
            source,
            positions: rank_index(ids),
            pending: BTreeMap::new(),
            next_rank: 0,
            exhausted: false,
        }
    }
}

impl<R: Record> Iterator for RankOrdered<'_, R> {
    type Item = R;

    fn next(&mut self) -> Option<R> {
        loop {
            if let Some(record) = self.pending.remove(&self.next_rank) {
                self.next_rank += 1;
                return Some(record);
            }

            if self.exhausted {
                let (rank, record) = self.pending.pop_first()?;
                self.next_rank = rank + 1;
                return Some(record);
            }

            match self.source.next() {
                Some(record) => {
                    let Some(&rank) = self.positions.get(&record.key()) else {
                        continue;
                    };
                    // Already emitted or already held: first one wins.
                    if rank >= self.next_rank {
                        self.pending.entry(rank).or_insert(record);
                    }
                }
                None => self.exhausted = true,
            }
        }
    }
}

impl<R: Record> FusedIterator for RankOrdered<'_, R> {}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use serde_json::{Map, json};

    use super::*;
    use crate::record::{JsonRecord, MemoryRecordSource};

    fn record(id: u64) -> JsonRecord {
        let mut fields = Map::new();
        fields.insert("id".to_string(), json!(id));
        JsonRecord::new("table", "id", fields).unwrap()
    }

    fn hits_for(ids: &[u64]) -> Value {
        let hits: Vec<Value> = ids
            .iter()
            .map(|id| json!({"_id": id.to_string(), "_source": {"id": id}}))
            .collect();
        json!({"total": {"value": ids.len()}, "hits": hits})
    }

    fn keys(records: &[JsonRecord]) -> Vec<String> {
        records.iter().map(Record::key).collect()
    }

    /// Returns its records in stored order, counting fetch calls and how
    /// many records have been pulled from streams.
    struct CountingSource {
        records: Vec<JsonRecord>,
        fetches: Cell<usize>,
        pulled: Cell<usize>,
    }

    impl CountingSource {
        fn new(ids: &[u64]) -> Self {
            Self {
                records: ids.iter().copied().map(record).collect(),
                fetches: Cell::new(0),
                pulled: Cell::new(0),
            }
        }
    }

    impl RecordSource for CountingSource {
        type Record = JsonRecord;

        fn fetch_by_ids(
            &self,
            _predicates: &PredicateSet,
            _ids: &[String],
        ) -> Result<Vec<JsonRecord>> {
            self.fetches.set(self.fetches.get() + 1);
            Ok(self.records.clone())
        }

        fn stream_by_ids<'a>(
            &'a self,
            _predicates: &PredicateSet,
            _ids: &[String],
        ) -> Result<Box<dyn Iterator<Item = JsonRecord> + 'a>> {
            self.fetches.set(self.fetches.get() + 1);
            Ok(Box::new(self.records.iter().map(|r| {
                self.pulled.set(self.pulled.get() + 1);
                r.clone()
            })))
        }
    }

    fn predicates() -> PredicateSet {
        PredicateSet::new("table", "zonda")
    }

    #[test]
    fn records_follow_hit_rank() {
        let source = CountingSource::new(&[3, 1, 4, 2]);
        let hits = hits_for(&[1, 2, 4, 3]);

        let records = reconcile(&source, &predicates(), Some(&hits)).unwrap();
        assert_eq!(keys(&records), vec!["1", "2", "4", "3"]);
        assert_eq!(source.fetches.get(), 1);
    }

    #[test]
    fn records_outside_the_hit_list_are_dropped() {
        let source = CountingSource::new(&[5, 3, 1, 4, 2]);
        let hits = hits_for(&[1, 2, 4, 3]);

        let records = reconcile(&source, &predicates(), Some(&hits)).unwrap();
        assert_eq!(keys(&records), vec!["1", "2", "4", "3"]);
    }

    #[test]
    fn hits_without_records_are_skipped() {
        let source = CountingSource::new(&[3, 1]);
        let hits = hits_for(&[1, 2, 4, 3]);

        let records = reconcile(&source, &predicates(), Some(&hits)).unwrap();
        assert_eq!(keys(&records), vec!["1", "3"]);
    }

    #[test]
    fn degenerate_hits_yield_empty_without_fetching() {
        let source = CountingSource::new(&[1, 2]);
        let p = predicates();

        assert!(reconcile(&source, &p, None).unwrap().is_empty());
        assert!(reconcile(&source, &p, Some(&json!({}))).unwrap().is_empty());
        assert!(
            reconcile(&source, &p, Some(&json!({"hits": []})))
                .unwrap()
                .is_empty()
        );
        assert_eq!(reconcile_lazy(&source, &p, None).unwrap().count(), 0);
        assert_eq!(
            reconcile_lazy(&source, &p, Some(&json!({}))).unwrap().count(),
            0
        );
        assert_eq!(
            reconcile_lazy(&source, &p, Some(&json!({"hits": []})))
                .unwrap()
                .count(),
            0
        );
        assert_eq!(source.fetches.get(), 0);
    }

    #[test]
    fn duplicate_fetched_records_keep_the_first() {
        let mut fields = record(1).into_fields();
        fields.insert("title".to_string(), json!("first"));
        let first = JsonRecord::new("table", "id", fields).unwrap();

        let source = CountingSource {
            records: vec![first, record(1), record(2)],
            fetches: Cell::new(0),
            pulled: Cell::new(0),
        };
        let hits = hits_for(&[2, 1]);

        let eager = reconcile(&source, &predicates(), Some(&hits)).unwrap();
        assert_eq!(keys(&eager), vec!["2", "1"]);
        assert_eq!(eager[1].fields().get("title"), Some(&json!("first")));

        let lazy: Vec<JsonRecord> =
            reconcile_lazy(&source, &predicates(), Some(&hits))
                .unwrap()
                .collect();
        assert_eq!(lazy, eager);
    }

    #[test]
    fn lazy_matches_eager_ordering() {
        let source = CountingSource::new(&[5, 3, 1, 4, 2]);
        let hits = hits_for(&[1, 2, 4, 3]);

        let lazy: Vec<JsonRecord> =
            reconcile_lazy(&source, &predicates(), Some(&hits))
                .unwrap()
                .collect();
        assert_eq!(keys(&lazy), vec!["1", "2", "4", "3"]);
    }

    #[test]
    fn lazy_pulls_only_what_it_needs() {
        let source = CountingSource::new(&[1, 2, 3, 4]);
        let hits = hits_for(&[1, 2, 3, 4]);

        let mut stream =
            reconcile_lazy(&source, &predicates(), Some(&hits)).unwrap();
        assert_eq!(source.pulled.get(), 0);

        assert_eq!(stream.next().map(|r| r.key()), Some("1".to_string()));
        assert_eq!(source.pulled.get(), 1);

        assert_eq!(stream.by_ref().count(), 3);
        assert!(stream.next().is_none());
        assert!(stream.next().is_none());
    }

    #[test]
    fn works_against_the_memory_source() {
        let source =
            MemoryRecordSource::new((1..=5).map(record).collect::<Vec<_>>());
        let hits = hits_for(&[4, 1, 3]);

        let records = reconcile(&source, &predicates(), Some(&hits)).unwrap();
        assert_eq!(keys(&records), vec!["4", "1", "3"]);
    }
}

#[cfg(test)]
mod proptests {
    use proptest::prelude::*;
    use serde_json::{Map, json};

    use super::*;
    use crate::record::{JsonRecord, MemoryRecordSource};

    fn source_of(ids: &[u64]) -> MemoryRecordSource {
        MemoryRecordSource::new(
            ids.iter()
                .map(|id| {
                    let mut fields = Map::new();
                    fields.insert("id".to_string(), json!(id));
                    JsonRecord::new("table", "id", fields).unwrap()
                })
                .collect(),
        )
    }

    proptest! {
        #[test]
        fn output_is_the_hit_order_restricted_to_fetched(
            ranked in proptest::sample::subsequence((0u64..40).collect::<Vec<_>>(), 0..40)
                .prop_shuffle(),
            stored in proptest::sample::subsequence((0u64..40).collect::<Vec<_>>(), 0..40)
                .prop_shuffle(),
        ) {
            let hits = json!({
                "hits": ranked.iter().map(|id| json!({"_id": id})).collect::<Vec<_>>()
            });
            let source = source_of(&stored);
            let p = PredicateSet::new("table", "");

            let expected: Vec<String> = ranked
                .iter()
                .filter(|id| stored.contains(id))
                .map(u64::to_string)
                .collect();

            let eager: Vec<String> = reconcile(&source, &p, Some(&hits))
                .unwrap()
                .iter()
                .map(Record::key)
                .collect();
            let lazy: Vec<String> = reconcile_lazy(&source, &p, Some(&hits))
                .unwrap()
                .map(|r| r.key())
                .collect();

            prop_assert_eq!(&eager, &expected);
            prop_assert_eq!(&lazy, &expected);
        }
    }
}
