//! In-memory document collections served as a paged backend session.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use parking_lot::{Mutex, RwLock};
use serde_json::Value as Json;
use tracing::{debug, instrument};
use ulid::Ulid;

use super::eval::{compare_documents, matches};
use crate::compiler::{CompiledQuery, MemoryPlan};
use crate::executor::{BackendError, BackendSession, RawDocumentStream};

/// Identifier key assigned on insert when a document has none.
pub const ID_FIELD: &str = "_id";

/// Configuration for [`MemoryBackend`].
#[derive(Debug, Clone)]
pub struct MemoryBackendConfig {
    /// Documents returned per page fetch.
    pub fetch_size: usize,
}

impl Default for MemoryBackendConfig {
    fn default() -> Self {
        Self { fetch_size: 100 }
    }
}

impl MemoryBackendConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the page size (at least 1).
    pub fn with_fetch_size(mut self, fetch_size: usize) -> Self {
        self.fetch_size = fetch_size.max(1);
        self
    }
}

struct Inner {
    config: MemoryBackendConfig,
    collections: RwLock<HashMap<String, Vec<Json>>>,
    fetches: AtomicUsize,
    fail_after: Mutex<Option<usize>>,
}

/// Named collections of JSON documents. Cheap to clone; clones share data.
#[derive(Clone)]
pub struct MemoryBackend {
    inner: Arc<Inner>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new(MemoryBackendConfig::default())
    }
}

impl MemoryBackend {
    pub fn new(config: MemoryBackendConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                collections: RwLock::new(HashMap::new()),
                fetches: AtomicUsize::new(0),
                fail_after: Mutex::new(None),
            }),
        }
    }

    /// Insert a document, assigning an `_id` if it has none. Returns the id.
    pub fn insert(&self, collection: &str, mut doc: Json) -> Result<String, BackendError> {
        let object = doc
            .as_object_mut()
            .ok_or_else(|| BackendError::Rejected("document must be a JSON object".into()))?;
        let id = match object.get(ID_FIELD).and_then(Json::as_str) {
            Some(id) => id.to_string(),
            None => {
                let id = Ulid::new().to_string();
                object.insert(ID_FIELD.into(), Json::String(id.clone()));
                id
            }
        };
        self.inner
            .collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .push(doc);
        Ok(id)
    }

    pub fn insert_many(
        &self,
        collection: &str,
        docs: impl IntoIterator<Item = Json>,
    ) -> Result<Vec<String>, BackendError> {
        docs.into_iter().map(|doc| self.insert(collection, doc)).collect()
    }

    /// Number of documents in `collection`.
    pub fn len(&self, collection: &str) -> usize {
        self.inner
            .collections
            .read()
            .get(collection)
            .map_or(0, Vec::len)
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    /// Page fetches performed so far, across all executions.
    pub fn fetch_count(&self) -> usize {
        self.inner.fetches.load(Ordering::SeqCst)
    }

    /// Fail every execution with a connection error after `pages` pages.
    pub fn fail_after(&self, pages: usize) {
        *self.inner.fail_after.lock() = Some(pages);
    }

    /// Stop injecting failures.
    pub fn heal(&self) {
        *self.inner.fail_after.lock() = None;
    }
}

impl Inner {
    /// Matching documents in plan order, after offset and limit.
    #[instrument(skip_all, fields(collection = %collection))]
    fn select(&self, collection: &str, plan: &MemoryPlan) -> Vec<Json> {
        let collections = self.collections.read();
        let mut matched: Vec<Json> = collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|doc| matches(&plan.predicate, doc))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        if !plan.sort.is_empty() {
            matched.sort_by(|a, b| compare_documents(&plan.sort, a, b));
        }
        let limit = plan.limit.unwrap_or(usize::MAX);
        let selected: Vec<Json> = matched.into_iter().skip(plan.offset).take(limit).collect();
        debug!(rows = selected.len(), "selected documents");
        selected
    }
}

struct Cursor {
    matched: Option<Arc<Vec<Json>>>,
    position: usize,
    pages: usize,
}

impl BackendSession for MemoryBackend {
    type Native = MemoryPlan;

    fn execute(&self, query: &CompiledQuery<MemoryPlan>) -> RawDocumentStream {
        let inner = Arc::clone(&self.inner);
        let plan = Arc::new(query.native.clone());
        let collection: Arc<str> = query.entity.as_str().into();
        let start = Cursor {
            matched: None,
            position: 0,
            pages: 0,
        };

        stream::unfold(Some(start), move |cursor| {
            let inner = Arc::clone(&inner);
            let plan = Arc::clone(&plan);
            let collection = Arc::clone(&collection);
            async move {
                let mut cursor = cursor?;
                if inner.fail_after.lock().is_some_and(|pages| cursor.pages >= pages) {
                    let err = BackendError::Connection(format!(
                        "connection to '{}' lost after {} pages",
                        collection, cursor.pages
                    ));
                    return Some((vec![Err(err)], None));
                }
                let matched = Arc::clone(
                    cursor
                        .matched
                        .get_or_insert_with(|| Arc::new(inner.select(&collection, &plan))),
                );
                if cursor.position >= matched.len() {
                    return None;
                }
                let end = (cursor.position + inner.config.fetch_size).min(matched.len());
                let page: Vec<Result<Json, BackendError>> =
                    matched[cursor.position..end].iter().cloned().map(Ok).collect();
                cursor.position = end;
                cursor.pages += 1;
                let fetches = inner.fetches.fetch_add(1, Ordering::SeqCst) + 1;
                debug!(collection = %collection, page = cursor.pages, rows = page.len(), fetches, "fetched page");
                Some((page, Some(cursor)))
            }
        })
        .flat_map(stream::iter)
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{Predicate, SortKey};
    use crate::catalog::FieldType;
    use crate::expression::{Path, SortDirection};
    use serde_json::json;

    fn plan() -> CompiledQuery<MemoryPlan> {
        CompiledQuery {
            backend: "memory",
            entity: "people".into(),
            native: MemoryPlan {
                predicate: Predicate::Constant { value: true },
                sort: vec![SortKey {
                    path: Path::parse("age"),
                    direction: SortDirection::Ascending,
                    field_type: FieldType::Integer,
                }],
                offset: 1,
                limit: Some(3),
            },
            projection: None,
        }
    }

    fn backend(fetch_size: usize) -> MemoryBackend {
        let backend = MemoryBackend::new(MemoryBackendConfig::new().with_fetch_size(fetch_size));
        backend
            .insert_many("people", (0..6).rev().map(|age| json!({ "age": age })))
            .unwrap();
        backend
    }

    #[test]
    fn test_insert_assigns_ids() {
        let backend = MemoryBackend::default();
        let id = backend.insert("people", json!({ "name": "Ann" })).unwrap();
        assert_eq!(id.len(), 26);
        assert_eq!(backend.insert("people", json!({ "_id": "x" })).unwrap(), "x");
        assert_eq!(backend.len("people"), 2);
        assert!(backend.insert("people", json!(1)).is_err());
    }

    #[tokio::test]
    async fn test_sort_offset_limit_paging() {
        let backend = backend(2);
        let docs: Vec<_> = backend.execute(&plan()).collect().await;
        let ages: Vec<i64> = docs
            .into_iter()
            .map(|doc| doc.unwrap()["age"].as_i64().unwrap())
            .collect();
        assert_eq!(ages, vec![1, 2, 3]);
        assert_eq!(backend.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_lazy_fetching() {
        let backend = backend(1);
        let stream = backend.execute(&plan());
        assert_eq!(backend.fetch_count(), 0);
        let first: Vec<_> = stream.take(1).collect().await;
        assert_eq!(first.len(), 1);
        assert_eq!(backend.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_fault_injection() {
        let backend = backend(1);
        backend.fail_after(2);
        let items: Vec<_> = backend.execute(&plan()).collect().await;
        assert_eq!(items.len(), 3);
        assert!(items[0].is_ok() && items[1].is_ok());
        assert!(matches!(items[2], Err(BackendError::Connection(_))));

        backend.heal();
        let items: Vec<_> = backend.execute(&plan()).collect().await;
        assert!(items.iter().all(Result::is_ok));
    }
}
