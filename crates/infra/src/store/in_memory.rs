use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use kardex_core::{DocumentId, ExpectedVersion};

use super::query::{Page, Query, compare_json, lookup};
use super::r#trait::{DocumentStore, RawDocument, StoreError, UniqueKey, WriteOp};

#[derive(Debug, Clone)]
struct Stored {
    version: u64,
    body: JsonValue,
    keys: Vec<UniqueKey>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct KeySlot {
    collection: String,
    field: String,
    value: String,
}

/// How to take back one applied write of a failed batch.
#[derive(Debug)]
enum Undo {
    Inserted { collection: String, id: DocumentId },
    Saved { collection: String, id: DocumentId, previous: Stored },
}

#[derive(Debug, Default)]
struct State {
    collections: HashMap<String, BTreeMap<DocumentId, Stored>>,
    keys: HashMap<KeySlot, DocumentId>,
    counters: HashMap<(String, String, String), i64>,
}

impl State {
    /// First key in `keys` owned by a document other than `owner`.
    fn taken_key(&self, collection: &str, owner: DocumentId, keys: &[UniqueKey]) -> Option<StoreError> {
        keys.iter().find_map(|k| {
            let slot = slot(collection, k);
            match self.keys.get(&slot) {
                Some(holder) if *holder != owner => Some(StoreError::DuplicateKey {
                    collection: collection.to_string(),
                    field: k.field.clone(),
                    value: k.value.clone(),
                }),
                _ => None,
            }
        })
    }

    fn release_keys(&mut self, collection: &str, keys: &[UniqueKey]) {
        for k in keys {
            self.keys.remove(&slot(collection, k));
        }
    }

    fn claim_keys(&mut self, collection: &str, owner: DocumentId, keys: &[UniqueKey]) {
        for k in keys {
            self.keys.insert(slot(collection, k), owner);
        }
    }

    fn insert_doc(
        &mut self,
        collection: &str,
        id: DocumentId,
        body: JsonValue,
        unique_keys: &[UniqueKey],
    ) -> Result<(u64, Undo), StoreError> {
        let exists = self
            .collections
            .get(collection)
            .is_some_and(|docs| docs.contains_key(&id));
        if exists {
            return Err(StoreError::DuplicateKey {
                collection: collection.to_string(),
                field: "id".to_string(),
                value: id.to_string(),
            });
        }
        if let Some(err) = self.taken_key(collection, id, unique_keys) {
            return Err(err);
        }

        self.claim_keys(collection, id, unique_keys);
        self.collections.entry(collection.to_string()).or_default().insert(
            id,
            Stored {
                version: 1,
                body,
                keys: unique_keys.to_vec(),
            },
        );
        let undo = Undo::Inserted {
            collection: collection.to_string(),
            id,
        };
        Ok((1, undo))
    }

    fn save_doc(
        &mut self,
        collection: &str,
        id: DocumentId,
        body: JsonValue,
        expected: ExpectedVersion,
        unique_keys: &[UniqueKey],
    ) -> Result<(u64, Undo), StoreError> {
        let previous = match self.collections.get(collection).and_then(|d| d.get(&id)) {
            Some(stored) => stored.clone(),
            None => {
                return Err(StoreError::Concurrency(format!(
                    "{collection}/{id} no longer exists"
                )));
            }
        };
        if !expected.matches(previous.version) {
            return Err(StoreError::Concurrency(format!(
                "{collection}/{id}: expected {expected:?}, found {}",
                previous.version
            )));
        }
        if let Some(err) = self.taken_key(collection, id, unique_keys) {
            return Err(err);
        }

        self.release_keys(collection, &previous.keys);
        self.claim_keys(collection, id, unique_keys);
        let next = previous.version + 1;
        if let Some(stored) = self.collections.get_mut(collection).and_then(|d| d.get_mut(&id)) {
            stored.version = next;
            stored.body = body;
            stored.keys = unique_keys.to_vec();
        }
        let undo = Undo::Saved {
            collection: collection.to_string(),
            id,
            previous,
        };
        Ok((next, undo))
    }

    fn apply(&mut self, op: WriteOp) -> Result<(u64, Undo), StoreError> {
        match op {
            WriteOp::Insert {
                collection,
                id,
                body,
                unique_keys,
            } => self.insert_doc(&collection, id, body, &unique_keys),
            WriteOp::Save {
                collection,
                id,
                body,
                expected,
                unique_keys,
            } => self.save_doc(&collection, id, body, expected, &unique_keys),
        }
    }

    fn undo(&mut self, undo: Undo) {
        match undo {
            Undo::Inserted { collection, id } => {
                let removed = self.collections.get_mut(&collection).and_then(|d| d.remove(&id));
                if let Some(stored) = removed {
                    self.release_keys(&collection, &stored.keys);
                }
            }
            Undo::Saved {
                collection,
                id,
                previous,
            } => {
                let restored_keys = previous.keys.clone();
                let replaced = self
                    .collections
                    .get_mut(&collection)
                    .and_then(|d| d.get_mut(&id))
                    .map(|stored| std::mem::replace(stored, previous));
                if let Some(replaced) = replaced {
                    self.release_keys(&collection, &replaced.keys);
                    self.claim_keys(&collection, id, &restored_keys);
                }
            }
        }
    }
}

fn slot(collection: &str, key: &UniqueKey) -> KeySlot {
    KeySlot {
        collection: collection.to_string(),
        field: key.field.clone(),
        value: key.value.clone(),
    }
}

/// In-memory document store.
///
/// Intended for tests/dev. Every operation takes one lock over the whole state,
/// so writes are linearizable; not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    state: RwLock<State>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, State>, StoreError> {
        self.state
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, State>, StoreError> {
        self.state
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn find(&self, collection: &str, query: &Query) -> Result<Page<RawDocument>, StoreError> {
        let state = self.read()?;
        let mut matches: Vec<RawDocument> = state
            .collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|(_, d)| query.matches(&d.body))
                    .map(|(id, d)| RawDocument {
                        id: *id,
                        version: d.version,
                        body: d.body.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        drop(state);

        if let Some(sort) = &query.sort {
            // Stable sort: ties keep id order. Missing fields sort first.
            matches.sort_by(|a, b| {
                let ord = match (lookup(&a.body, &sort.path), lookup(&b.body, &sort.path)) {
                    (Some(x), Some(y)) => compare_json(x, y).unwrap_or(Ordering::Equal),
                    (None, Some(_)) => Ordering::Less,
                    (Some(_), None) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                };
                if sort.descending { ord.reverse() } else { ord }
            });
        }

        let total = matches.len() as u64;
        let items = match query.pagination {
            Some(p) => matches
                .into_iter()
                .skip(p.offset as usize)
                .take(p.limit as usize)
                .collect(),
            None => matches,
        };
        Ok(Page::new(items, total, query.pagination))
    }

    async fn get(&self, collection: &str, id: DocumentId) -> Result<Option<RawDocument>, StoreError> {
        let state = self.read()?;
        Ok(state
            .collections
            .get(collection)
            .and_then(|docs| docs.get(&id))
            .map(|d| RawDocument {
                id,
                version: d.version,
                body: d.body.clone(),
            }))
    }

    async fn insert(
        &self,
        collection: &str,
        id: DocumentId,
        body: JsonValue,
        unique_keys: &[UniqueKey],
    ) -> Result<u64, StoreError> {
        let mut state = self.write()?;
        let (version, _) = state.insert_doc(collection, id, body, unique_keys)?;
        Ok(version)
    }

    async fn save(
        &self,
        collection: &str,
        id: DocumentId,
        body: JsonValue,
        expected: ExpectedVersion,
        unique_keys: &[UniqueKey],
    ) -> Result<u64, StoreError> {
        let mut state = self.write()?;
        let (version, _) = state.save_doc(collection, id, body, expected, unique_keys)?;
        Ok(version)
    }

    async fn write_all(&self, ops: Vec<WriteOp>) -> Result<Vec<u64>, StoreError> {
        let mut state = self.write()?;
        let mut versions = Vec::with_capacity(ops.len());
        let mut applied = Vec::with_capacity(ops.len());
        for op in ops {
            match state.apply(op) {
                Ok((version, undo)) => {
                    versions.push(version);
                    applied.push(undo);
                }
                Err(err) => {
                    for undo in applied.into_iter().rev() {
                        state.undo(undo);
                    }
                    return Err(err);
                }
            }
        }
        Ok(versions)
    }

    async fn delete(&self, collection: &str, id: DocumentId) -> Result<bool, StoreError> {
        let mut state = self.write()?;
        let removed = state.collections.get_mut(collection).and_then(|d| d.remove(&id));
        match removed {
            Some(stored) => {
                state.release_keys(collection, &stored.keys);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn atomic_increment(&self, collection: &str, key: &str, field: &str) -> Result<i64, StoreError> {
        let mut state = self.write()?;
        let counter = state
            .counters
            .entry((collection.to_string(), key.to_string(), field.to_string()))
            .or_insert(0);
        *counter += 1;
        Ok(*counter)
    }
}
