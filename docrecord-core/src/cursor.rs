//! Lazy iteration over query results.
//!
//! A [`Cursor`] wraps either a server-side result stream or an in-memory list of rows
//! (aggregation output, or rows handed over by the caller). Both follow the same protocol:
//!
//! ```ignore
//! cursor.rewind();
//! while cursor.valid().await? {
//!     let row = cursor.current()?;
//!     cursor.next().await?;
//! }
//! ```
//!
//! A cursor bound to a document type yields loaded documents instead of raw rows; each
//! row fires the type's `beforeFind`/`afterFind` hooks as it is materialized.
//!
//! In-memory cursors apply `skip` and `limit` lazily, once, on the first call to
//! [`Cursor::valid`]; [`Cursor::slice_state`] exposes whether that happened.

use std::fmt;

use bson::{Bson, Document as BsonDocument};
use futures::StreamExt;
use mea::mutex::Mutex;

use crate::{
    backend::RowStream,
    collection::Collection,
    database::{Database, TypeEntry},
    document::{AnyDocument, Document},
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Query, Sort},
    schema::Model,
};

/// One row produced by a cursor.
#[derive(Clone)]
pub enum Row {
    /// A raw stored row, from a cursor bound to no type.
    Raw(BsonDocument),
    /// A loaded document.
    Document(Box<dyn AnyDocument>),
}

impl Row {
    pub fn as_raw(&self) -> Option<&BsonDocument> {
        match self {
            Row::Raw(row) => Some(row),
            Row::Document(_) => None,
        }
    }

    pub fn as_document(&self) -> Option<&dyn AnyDocument> {
        match self {
            Row::Document(document) => Some(document.as_ref()),
            Row::Raw(_) => None,
        }
    }

    /// The stored form of the row; documents are flattened to their raw payload.
    pub fn into_raw(self) -> BsonDocument {
        match self {
            Row::Raw(row) => row,
            Row::Document(document) => document.to_raw(),
        }
    }

    /// Downcasts a loaded document to its concrete type.
    pub fn into_model<M: Model>(self) -> Option<Document<M>> {
        match self {
            Row::Document(document) => document.downcast::<M>().map(|document| *document),
            Row::Raw(_) => None,
        }
    }
}

impl fmt::Debug for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Row::Raw(row) => f.debug_tuple("Raw").field(row).finish(),
            Row::Document(document) => f
                .debug_tuple("Document")
                .field(&document.document_type())
                .field(&document.to_raw())
                .finish(),
        }
    }
}

/// Whether an in-memory cursor has applied its skip and limit yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceState {
    Unopened,
    Sliced,
}

enum ServerState {
    Pending,
    Open {
        stream: Mutex<RowStream>,
        current: Option<BsonDocument>,
        lookahead: Option<Option<BsonDocument>>,
        position: usize,
    },
}

enum Backing {
    Server {
        collection: Collection,
        query: Query,
        state: ServerState,
    },
    Memory {
        rows: Vec<BsonDocument>,
        skip: Option<usize>,
        limit: Option<usize>,
        position: usize,
        state: SliceState,
    },
}

#[derive(Clone)]
struct Target {
    entry: TypeEntry,
    database: Database,
}

/// A lazy cursor over raw rows or loaded documents.
pub struct Cursor {
    backing: Backing,
    target: Option<Target>,
}

impl Cursor {
    /// A server cursor over `query`; nothing is fetched until the first read.
    pub fn server(collection: Collection, query: Query) -> Self {
        Cursor {
            backing: Backing::Server {
                collection,
                query,
                state: ServerState::Pending,
            },
            target: None,
        }
    }

    /// An in-memory cursor over `rows`.
    pub fn from_rows(rows: Vec<BsonDocument>) -> Self {
        Cursor {
            backing: Backing::Memory {
                rows,
                skip: None,
                limit: None,
                position: 0,
                state: SliceState::Unopened,
            },
            target: None,
        }
    }

    /// An in-memory cursor with no rows.
    pub fn empty() -> Self {
        Cursor::from_rows(Vec::new())
    }

    /// Materializes every row as a document of the type registered as `entry`.
    pub fn bind(mut self, entry: TypeEntry, database: Database) -> Self {
        self.target = Some(Target { entry, database });
        self
    }

    pub fn is_server(&self) -> bool {
        matches!(self.backing, Backing::Server { .. })
    }

    /// The document type rows are materialized as, if bound.
    pub fn bound_type(&self) -> Option<&str> {
        self.target.as_ref().map(|target| target.entry.name())
    }

    /// `None` for server cursors.
    pub fn slice_state(&self) -> Option<SliceState> {
        match &self.backing {
            Backing::Memory { state, .. } => Some(*state),
            Backing::Server { .. } => None,
        }
    }

    /// Orders a server cursor; must be called before iteration starts.
    ///
    /// In-memory rows keep their order; the call is ignored with a warning.
    pub fn sort(&mut self, sort: Sort) -> DocumentStoreResult<&mut Self> {
        match &mut self.backing {
            Backing::Server { query, state, .. } => {
                ensure_pending(state)?;
                let keys = query.sort.get_or_insert_with(Sort::new);
                keys.keys.extend(sort.keys);
            }
            Backing::Memory { .. } => {
                tracing::warn!("sort is not applied to in-memory cursors");
            }
        }
        Ok(self)
    }

    /// Skips the first `count` rows.
    pub fn skip(&mut self, count: usize) -> DocumentStoreResult<&mut Self> {
        match &mut self.backing {
            Backing::Server { query, state, .. } => {
                ensure_pending(state)?;
                query.skip = Some(count);
            }
            Backing::Memory { skip, .. } => *skip = Some(count),
        }
        Ok(self)
    }

    /// Yields at most `count` rows.
    pub fn limit(&mut self, count: usize) -> DocumentStoreResult<&mut Self> {
        match &mut self.backing {
            Backing::Server { query, state, .. } => {
                ensure_pending(state)?;
                query.limit = Some(count);
            }
            Backing::Memory { limit, .. } => *limit = Some(count),
        }
        Ok(self)
    }

    /// Returns to the first row. A started server cursor re-runs its query on the next read.
    pub fn rewind(&mut self) {
        match &mut self.backing {
            Backing::Server { state, .. } => *state = ServerState::Pending,
            Backing::Memory { position, .. } => *position = 0,
        }
    }

    /// Reports whether the cursor points at a row, opening or slicing it first if needed.
    pub async fn valid(&mut self) -> DocumentStoreResult<bool> {
        match &mut self.backing {
            Backing::Server { collection, query, state } => {
                if matches!(state, ServerState::Pending) {
                    *state = open(collection, query).await?;
                }
                Ok(matches!(state, ServerState::Open { current: Some(_), .. }))
            }
            Backing::Memory { rows, skip, limit, position, state } => {
                if *state == SliceState::Unopened {
                    slice(rows, *skip, *limit);
                    *position = 0;
                    *state = SliceState::Sliced;
                }
                Ok(*position < rows.len())
            }
        }
    }

    fn current_raw(&self) -> Option<&BsonDocument> {
        match &self.backing {
            Backing::Server { state: ServerState::Open { current, .. }, .. } => current.as_ref(),
            Backing::Server { .. } => None,
            Backing::Memory { rows, skip, limit, position, state } => {
                memory_index(rows, *skip, *limit, *position, *state).and_then(|index| rows.get(index))
            }
        }
    }

    /// The row under the cursor.
    ///
    /// A bound cursor returns `Ok(None)` when the type's `beforeFind` vetoes the row.
    pub fn current(&self) -> DocumentStoreResult<Option<Row>> {
        let Some(raw) = self.current_raw() else {
            return Ok(None);
        };

        match &self.target {
            Some(target) => Ok(target
                .entry
                .materialize(&target.database, raw.clone())?
                .map(Row::Document)),
            None => Ok(Some(Row::Raw(raw.clone()))),
        }
    }

    /// The row under the cursor as a document of type `M`.
    ///
    /// Unbound cursors materialize raw rows as `M` directly.
    pub fn current_as<M: Model>(&self) -> DocumentStoreResult<Option<Document<M>>> {
        match &self.target {
            Some(_) => Ok(self.current()?.and_then(Row::into_model::<M>)),
            None => {
                let (Some(raw), Some(database)) = (self.current_raw(), self.database()) else {
                    return Ok(None);
                };
                let entry = database.entry::<M>()?;
                Ok(entry
                    .materialize(database, raw.clone())?
                    .and_then(|document| document.downcast::<M>())
                    .map(|document| *document))
            }
        }
    }

    fn database(&self) -> Option<&Database> {
        match (&self.target, &self.backing) {
            (Some(target), _) => Some(&target.database),
            (None, Backing::Server { collection, .. }) => Some(collection.database()),
            (None, Backing::Memory { .. }) => None,
        }
    }

    /// The key of the current row: its `_id` for server cursors, its position otherwise.
    pub fn key(&self) -> Option<Bson> {
        match &self.backing {
            Backing::Server { .. } => self.current_raw().and_then(|row| row.get("_id").cloned()),
            Backing::Memory { rows, skip, limit, position, state } => {
                memory_index(rows, *skip, *limit, *position, *state).map(|_| Bson::Int64(*position as i64))
            }
        }
    }

    /// Advances to the next row. On an unopened server cursor this opens it at the first row.
    pub async fn next(&mut self) -> DocumentStoreResult<()> {
        match &mut self.backing {
            Backing::Server { collection, query, state } => {
                if matches!(state, ServerState::Pending) {
                    *state = open(collection, query).await?;
                    return Ok(());
                }
                if let ServerState::Open { stream, current, lookahead, position } = state {
                    let row = match lookahead.take() {
                        Some(row) => row,
                        None => pull(stream).await?,
                    };
                    if row.is_some() {
                        *position += 1;
                    }
                    *current = row;
                }
            }
            Backing::Memory { rows, skip, limit, position, state } => {
                if *state == SliceState::Unopened {
                    slice(rows, *skip, *limit);
                    *state = SliceState::Sliced;
                }
                *position += 1;
            }
        }
        Ok(())
    }

    /// Counts rows: server cursors ask the backend (ignoring skip and limit), in-memory
    /// cursors report the size of their row list at the time of the call.
    pub async fn count(&self) -> DocumentStoreResult<u64> {
        match &self.backing {
            Backing::Server { collection, query, .. } => collection.count(query.filter.clone()).await,
            Backing::Memory { rows, .. } => Ok(rows.len() as u64),
        }
    }

    /// Reports whether another row follows the current one.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Unsupported`] for in-memory cursors.
    pub async fn has_next(&mut self) -> DocumentStoreResult<bool> {
        match &mut self.backing {
            Backing::Server { collection, query, state } => {
                if matches!(state, ServerState::Pending) {
                    *state = open(collection, query).await?;
                }
                match state {
                    ServerState::Open { stream, lookahead, .. } => {
                        if lookahead.is_none() {
                            *lookahead = Some(pull(stream).await?);
                        }
                        Ok(matches!(lookahead, Some(Some(_))))
                    }
                    ServerState::Pending => Ok(false),
                }
            }
            Backing::Memory { .. } => Err(DocumentStoreError::Unsupported(
                "has_next is only available on server cursors".to_string(),
            )),
        }
    }

    /// Drains the cursor from the start.
    pub async fn to_vec(mut self) -> DocumentStoreResult<Vec<Row>> {
        self.rewind();

        let mut rows = Vec::new();
        while self.valid().await? {
            if let Some(row) = self.current()? {
                rows.push(row);
            }
            self.next().await?;
        }
        Ok(rows)
    }
}

fn ensure_pending(state: &ServerState) -> DocumentStoreResult<()> {
    match state {
        ServerState::Pending => Ok(()),
        ServerState::Open { .. } => Err(DocumentStoreError::CursorStarted),
    }
}

async fn open(collection: &Collection, query: &Query) -> DocumentStoreResult<ServerState> {
    tracing::trace!(collection = collection.name(), "opening cursor");

    let mut stream = collection
        .database()
        .backend()
        .find(collection.name(), query.clone())
        .await?;
    let current = stream.next().await.transpose()?;

    Ok(ServerState::Open {
        stream: Mutex::new(stream),
        current,
        lookahead: None,
        position: 0,
    })
}

async fn pull(stream: &mut Mutex<RowStream>) -> DocumentStoreResult<Option<BsonDocument>> {
    stream.get_mut().next().await.transpose()
}

/// Index into `rows` of the row at `position`, honouring a skip and limit not yet applied.
fn memory_index(
    rows: &[BsonDocument],
    skip: Option<usize>,
    limit: Option<usize>,
    position: usize,
    state: SliceState,
) -> Option<usize> {
    let index = match state {
        SliceState::Sliced => position,
        SliceState::Unopened if limit.is_some_and(|limit| position >= limit) => return None,
        SliceState::Unopened => skip.unwrap_or(0) + position,
    };
    (index < rows.len()).then_some(index)
}

fn slice(rows: &mut Vec<BsonDocument>, skip: Option<usize>, limit: Option<usize>) {
    if let Some(skip) = skip {
        rows.drain(..skip.min(rows.len()));
    }
    if let Some(limit) = limit {
        rows.truncate(limit);
    }
}

impl Clone for Cursor {
    /// Clones the cursor; a server cursor clone re-runs its query when first read.
    fn clone(&self) -> Self {
        let backing = match &self.backing {
            Backing::Server { collection, query, .. } => Backing::Server {
                collection: collection.clone(),
                query: query.clone(),
                state: ServerState::Pending,
            },
            Backing::Memory { rows, skip, limit, position, state } => Backing::Memory {
                rows: rows.clone(),
                skip: *skip,
                limit: *limit,
                position: *position,
                state: *state,
            },
        };

        Cursor {
            backing,
            target: self.target.clone(),
        }
    }
}

impl fmt::Debug for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.backing {
            Backing::Server { collection, query, state } => f
                .debug_struct("Cursor")
                .field("collection", &collection.name())
                .field("query", query)
                .field("started", &matches!(state, ServerState::Open { .. }))
                .field("bound", &self.bound_type())
                .finish(),
            Backing::Memory { rows, position, state, .. } => f
                .debug_struct("Cursor")
                .field("rows", &rows.len())
                .field("position", position)
                .field("state", state)
                .field("bound", &self.bound_type())
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use futures::executor::block_on;

    fn three_rows() -> Cursor {
        Cursor::from_rows(vec![doc! { "n": 1 }, doc! { "n": 2 }, doc! { "n": 3 }])
    }

    fn drain(cursor: Cursor) -> Vec<BsonDocument> {
        block_on(cursor.to_vec())
            .unwrap()
            .into_iter()
            .map(Row::into_raw)
            .collect()
    }

    #[test]
    fn test_limit_applies_on_first_valid() {
        let mut cursor = three_rows();
        cursor.limit(2).unwrap();

        assert_eq!(cursor.slice_state(), Some(SliceState::Unopened));
        assert!(block_on(cursor.valid()).unwrap());
        assert_eq!(cursor.slice_state(), Some(SliceState::Sliced));

        assert_eq!(drain(cursor), vec![doc! { "n": 1 }, doc! { "n": 2 }]);
    }

    #[test]
    fn test_skip_renumbers_positions() {
        let mut cursor = three_rows();
        cursor.skip(2).unwrap();

        assert!(block_on(cursor.valid()).unwrap());
        assert_eq!(cursor.key(), Some(Bson::Int64(0)));
        assert_eq!(drain(cursor), vec![doc! { "n": 3 }]);
    }

    #[test]
    fn test_skip_past_end_yields_nothing() {
        let mut cursor = three_rows();
        cursor.skip(5).unwrap().limit(1).unwrap();

        assert!(!block_on(cursor.valid()).unwrap());
    }

    #[test]
    fn test_count_before_and_after_slicing() {
        let mut cursor = three_rows();
        cursor.limit(1).unwrap();

        assert_eq!(block_on(cursor.count()).unwrap(), 3);
        block_on(cursor.valid()).unwrap();
        assert_eq!(block_on(cursor.count()).unwrap(), 1);
    }

    #[test]
    fn test_manual_iteration() {
        let mut cursor = three_rows();
        let mut seen = Vec::new();

        cursor.rewind();
        while block_on(cursor.valid()).unwrap() {
            let row = cursor.current().unwrap().unwrap();
            seen.push(row.into_raw().get_i32("n").unwrap());
            block_on(cursor.next()).unwrap();
        }

        assert_eq!(seen, vec![1, 2, 3]);
        assert_eq!(cursor.key(), None);
        assert!(cursor.current().unwrap().is_none());
    }

    #[test]
    fn test_sort_is_ignored_in_memory() {
        let mut cursor = three_rows();
        cursor
            .sort(Sort::by("n", crate::query::SortDirection::Desc))
            .unwrap();

        assert_eq!(drain(cursor)[0], doc! { "n": 1 });
    }

    #[test]
    fn test_has_next_unsupported_in_memory() {
        let mut cursor = three_rows();
        let err = block_on(cursor.has_next()).unwrap_err();

        assert!(matches!(err, DocumentStoreError::Unsupported(_)));
    }

    #[test]
    fn test_empty_cursor() {
        let mut cursor = Cursor::empty();

        assert!(!block_on(cursor.valid()).unwrap());
        assert_eq!(block_on(cursor.count()).unwrap(), 0);
    }
}
