//! Execution core: compiled query + backend session → lazy tuples.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{debug, error, info_span, warn};
use ulid::Ulid;

use super::error::{QueryError, QueryResult};
use super::mapper::LazySequence;
use super::session::BackendSession;
use super::tuple::Tuple;
use crate::compiler::CompiledQuery;
use crate::expression::{Path, Projection, Value};

/// Build the lazy tuple sequence of `query` on `session`.
///
/// Every open of the returned sequence is a new execution with its own id.
/// A document whose projected columns cannot be extracted yields a row
/// error and the sequence continues; a backend error is yielded once and
/// ends the sequence.
pub fn execute<N>(
    query: Arc<CompiledQuery<N>>,
    session: Arc<dyn BackendSession<Native = N>>,
) -> LazySequence<Tuple>
where
    N: Send + Sync + 'static,
{
    let columns: Arc<[Path]> = match &query.projection {
        Some(projection) => projection
            .fields
            .iter()
            .map(|f| f.path.clone())
            .collect::<Vec<_>>()
            .into(),
        None => vec![Path::element()].into(),
    };

    LazySequence::new(move || {
        let execution = Ulid::new();
        let raw = info_span!("execute", %execution, backend = query.backend, entity = %query.entity)
            .in_scope(|| {
                debug!("opening backend stream");
                session.execute(&query)
            });

        let query = Arc::clone(&query);
        let columns = Arc::clone(&columns);
        stream::unfold(Some((raw, 0usize)), move |state| {
            let query = Arc::clone(&query);
            let columns = Arc::clone(&columns);
            async move {
                let (mut raw, row) = state?;
                match raw.next().await {
                    None => {
                        debug!(%execution, rows = row, "execution finished");
                        None
                    }
                    Some(Ok(doc)) => {
                        let item = extract(query.projection.as_ref(), &columns, row, &doc);
                        if let Err(err) = &item {
                            warn!(%execution, error = %err, "skipping row");
                        }
                        Some((item, Some((raw, row + 1))))
                    }
                    Some(Err(err)) => {
                        error!(%execution, error = %err, "backend failed");
                        Some((Err(QueryError::Backend(err)), None))
                    }
                }
            }
        })
        .boxed()
    })
}

/// Extract one tuple from a raw document.
fn extract(
    projection: Option<&Projection>,
    columns: &Arc<[Path]>,
    row: usize,
    doc: &serde_json::Value,
) -> QueryResult<Tuple> {
    let row_error = |path: &Path, reason: String| QueryError::ProjectionExtraction {
        row,
        path: path.to_string(),
        reason,
    };

    let Some(projection) = projection else {
        let object = doc
            .as_object()
            .ok_or_else(|| row_error(&Path::element(), "document is not an object".into()))?;
        return Ok(Tuple::new(row, Arc::clone(columns), vec![Value::Object(object.clone())]));
    };

    let values = projection
        .fields
        .iter()
        .map(|field| {
            let raw = field
                .path
                .lookup(doc)
                .ok_or_else(|| row_error(&field.path, "missing field".into()))?;
            Value::from_json(raw, &field.field_type, field.cardinality)
                .map_err(|reason| row_error(&field.path, reason))
        })
        .collect::<QueryResult<Vec<_>>>()?;
    Ok(Tuple::new(row, Arc::clone(columns), values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Cardinality, FieldType};
    use crate::executor::{BackendError, RawDocumentStream};
    use crate::expression::ProjectedField;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Replays fixed documents, optionally failing at the end.
    struct Fixed {
        docs: Vec<serde_json::Value>,
        fail: Option<BackendError>,
        opened: AtomicUsize,
    }

    impl BackendSession for Fixed {
        type Native = ();

        fn execute(&self, _query: &CompiledQuery<()>) -> RawDocumentStream {
            self.opened.fetch_add(1, Ordering::SeqCst);
            let mut items: Vec<Result<serde_json::Value, BackendError>> =
                self.docs.iter().cloned().map(Ok).collect();
            if let Some(err) = &self.fail {
                items.push(Err(err.clone()));
                items.push(Ok(json!({ "name": "never" })));
            }
            stream::iter(items).boxed()
        }
    }

    fn compiled(projection: Option<Projection>) -> Arc<CompiledQuery<()>> {
        Arc::new(CompiledQuery {
            backend: "fixed",
            entity: "people".into(),
            native: (),
            projection,
        })
    }

    fn names() -> Projection {
        Projection::new(vec![
            ProjectedField {
                path: Path::parse("name"),
                field_type: FieldType::Text,
                cardinality: Cardinality::Required,
            },
            ProjectedField {
                path: Path::parse("nickname"),
                field_type: FieldType::Text,
                cardinality: Cardinality::Nullable,
            },
        ])
    }

    #[tokio::test]
    async fn test_row_errors_keep_order() {
        let session = Arc::new(Fixed {
            docs: vec![
                json!({ "name": "Ann", "nickname": null }),
                json!({ "name": "Bob" }),
                json!({ "name": "Cara", "nickname": "C" }),
            ],
            fail: None,
            opened: AtomicUsize::new(0),
        });
        let rows: Vec<_> = execute(compiled(Some(names())), session).open().collect().await;

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].as_ref().unwrap().values(), &[Value::from("Ann"), Value::Null]);
        assert_eq!(
            rows[1],
            Err(QueryError::ProjectionExtraction {
                row: 1,
                path: "nickname".into(),
                reason: "missing field".into(),
            })
        );
        assert_eq!(rows[2].as_ref().unwrap().row(), 2);
    }

    #[tokio::test]
    async fn test_backend_error_ends_sequence() {
        let session = Arc::new(Fixed {
            docs: vec![json!({ "name": "Ann", "nickname": null })],
            fail: Some(BackendError::Timeout(50)),
            opened: AtomicUsize::new(0),
        });
        let rows: Vec<_> = execute(compiled(Some(names())), session).open().collect().await;
        assert_eq!(rows.len(), 2);
        assert!(rows[0].is_ok());
        assert_eq!(rows[1], Err(QueryError::Backend(BackendError::Timeout(50))));
    }

    #[tokio::test]
    async fn test_whole_documents_without_projection() {
        let session = Arc::new(Fixed {
            docs: vec![json!({ "name": "Ann" }), json!(3)],
            fail: None,
            opened: AtomicUsize::new(0),
        });
        let rows: Vec<_> = execute(compiled(None), session).open().collect().await;
        let first = rows[0].as_ref().unwrap();
        assert_eq!(first.arity(), 1);
        assert_eq!(first.get::<serde_json::Value>(0).unwrap(), json!({ "name": "Ann" }));
        assert!(rows[1].as_ref().unwrap_err().is_row_error());
    }

    #[tokio::test]
    async fn test_lazy_until_opened() {
        let session = Arc::new(Fixed {
            docs: vec![],
            fail: None,
            opened: AtomicUsize::new(0),
        });
        let seq = execute(compiled(None), session.clone());
        assert_eq!(session.opened.load(Ordering::SeqCst), 0);
        let _ = seq.open().collect::<Vec<_>>().await;
        let _ = seq.open().collect::<Vec<_>>().await;
        assert_eq!(session.opened.load(Ordering::SeqCst), 2);
    }
}
