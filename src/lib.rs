//! searchbridge - compile backend-agnostic search predicates into OpenSearch
//! queries and turn ranked hits back into domain records.
//!
//! A [`PredicateSet`] (free text, equality, set-membership and range
//! filters, sort order, paging, an optional distinct field) compiles into a
//! `bool` query. [`SearchEngine`] sends it through a [`Transport`], returns
//! the hits, and reconciles them with a [`RecordSource`] so records come
//! back in the engine's rank order. Writes go out as single bulk requests.
//!
//! # Quick start
//!
//! ```no_run
//! use searchbridge::{Config, PredicateSet, SearchEngine};
//! use searchbridge::predicate::Direction;
//!
//! let config = Config::resolve(None).unwrap();
//! let engine = SearchEngine::from_config(&config).unwrap();
//!
//! let predicates = PredicateSet::new("books", "rust programming")
//!     .fields(["title", "summary"])
//!     .where_eq("published", true)
//!     .where_in("language", ["en", "de"])
//!     .order_by("year", Direction::Desc)
//!     .take(20);
//!
//! let hits = engine.search(&predicates).unwrap();
//! for id in engine.map_ids(hits.as_ref()) {
//!     println!("{id}");
//! }
//! println!("{} total", engine.total_count(hits.as_ref()));
//! ```

pub mod bulk;
pub mod cli;
pub mod config;
pub mod distinct;
pub mod engine;
pub mod error;
pub mod executor;
pub mod index_admin;
pub mod predicate;
pub mod query;
pub mod reconcile;
pub mod record;
pub mod transport;

pub use config::Config;
pub use engine::SearchEngine;
pub use error::{Error, Result};
pub use predicate::PredicateSet;
pub use record::{JsonRecord, MemoryRecordSource, Record, RecordSource};
pub use transport::{HttpTransport, Transport};
