use serde_json::{Value, json};
use tracing::debug;

use crate::{
    bulk::{
        build_delete_batch, build_delete_batch_for_ids, build_index_batch,
        submit,
    },
    config::{Config, IndicesConfig},
    distinct::extract_distinct_keys,
    error::Result,
    executor,
    index_admin,
    predicate::PredicateSet,
    query::{Clause, MatchAll},
    reconcile::{self, RankOrdered},
    record::{Record, RecordSource},
    transport::{HttpTransport, Transport},
};

/// The search engine surface: writes, searches, reconciliation and index
/// administration against one transport.
#[derive(Debug, Clone)]
pub struct SearchEngine<T> {
    transport: T,
    soft_delete: bool,
    indices: IndicesConfig,
}

impl SearchEngine<HttpTransport> {
    pub fn from_config(config: &Config) -> Result<Self> {
        let transport = HttpTransport::from_config(&config.client)?;
        debug!(host = transport.base_url(), "engine client ready");
        Ok(Self::new(transport)
            .with_soft_delete(config.soft_delete)
            .with_indices(config.indices.clone()))
    }
}

impl<T: Transport> SearchEngine<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            soft_delete: false,
            indices: IndicesConfig::default(),
        }
    }

    /// Stamp soft-delete metadata on indexed documents of records that
    /// track it.
    pub fn with_soft_delete(mut self, soft_delete: bool) -> Self {
        self.soft_delete = soft_delete;
        self
    }

    pub fn with_indices(mut self, indices: IndicesConfig) -> Self {
        self.indices = indices;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Index or re-index `records` in one bulk call. Returns `None` when
    /// nothing was sent.
    pub fn update<R: Record>(&self, records: &[R]) -> Result<Option<Value>> {
        submit(&self.transport, &build_index_batch(records, self.soft_delete))
    }

    pub fn delete<R: Record>(&self, records: &[R]) -> Result<Option<Value>> {
        submit(&self.transport, &build_delete_batch(records))
    }

    pub fn delete_ids(
        &self,
        collection: &str,
        ids: &[String],
    ) -> Result<Option<Value>> {
        submit(&self.transport, &build_delete_batch_for_ids(collection, ids))
    }

    /// Run a search and return the `hits` sub-structure.
    pub fn search(&self, predicates: &PredicateSet) -> Result<Option<Value>> {
        executor::execute(
            &self.transport,
            predicates,
            executor::search_defaults(predicates),
        )
    }

    /// Run a search for page `page` (1-based) of `per_page` hits.
    pub fn paginate(
        &self,
        predicates: &PredicateSet,
        per_page: usize,
        page: usize,
    ) -> Result<Option<Value>> {
        executor::execute(
            &self.transport,
            predicates,
            executor::paginate_defaults(per_page, page),
        )
    }

    /// Run a search and return the whole engine response.
    pub fn search_raw(&self, predicates: &PredicateSet) -> Result<Value> {
        executor::execute_raw(
            &self.transport,
            predicates,
            executor::search_defaults(predicates),
        )
    }

    /// Distinct values of `field` among the matching documents, most
    /// frequent first.
    pub fn distinct(
        &self,
        predicates: &PredicateSet,
        field: &str,
    ) -> Result<Vec<Value>> {
        let predicates = predicates.clone().distinct(field);
        let response = self.search_raw(&predicates)?;
        Ok(predicates
            .distinct_field()
            .map(|field| extract_distinct_keys(&response, field))
            .unwrap_or_default())
    }

    pub fn count(&self, predicates: &PredicateSet) -> Result<u64> {
        let hits = self.search(predicates)?;
        Ok(executor::total_count(hits.as_ref()))
    }

    pub fn map_ids(&self, hits: Option<&Value>) -> Vec<String> {
        executor::map_ids(hits)
    }

    /// Re-fetch the records behind `hits` from `source`, in rank order.
    pub fn map<S: RecordSource>(
        &self,
        predicates: &PredicateSet,
        hits: Option<&Value>,
        source: &S,
    ) -> Result<Vec<S::Record>> {
        reconcile::reconcile(source, predicates, hits)
    }

    pub fn lazy_map<'a, S: RecordSource>(
        &self,
        predicates: &PredicateSet,
        hits: Option<&Value>,
        source: &'a S,
    ) -> Result<RankOrdered<'a, S::Record>> {
        reconcile::reconcile_lazy(source, predicates, hits)
    }

    pub fn total_count(&self, hits: Option<&Value>) -> u64 {
        executor::total_count(hits)
    }

    /// Delete every document in `collection`.
    pub fn flush(&self, collection: &str) -> Result<Value> {
        let body = json!({ "query": Clause::MatchAll(MatchAll::default()) });
        self.transport.delete_by_query(collection, &body)
    }

    /// Create `name` with the configured default settings, the configured
    /// override for `name`, then `extra`, each merged over the last.
    pub fn create_index(&self, name: &str, extra: &Value) -> Result<Value> {
        index_admin::create_index(
            &self.transport,
            name,
            &self.indices.settings_for(name),
            extra,
        )
    }

    pub fn delete_index(&self, name: &str) -> Result<Value> {
        index_admin::delete_index(&self.transport, name)
    }
}
