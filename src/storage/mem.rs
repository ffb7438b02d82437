//! In-memory engine
//!
//! Stores are `BTreeMap<Key, Value>`; each secondary index is a
//! `BTreeMap<Key, BTreeSet<Key>>` from index key to the primary keys carrying
//! it, so an index scan walks (index key, primary key) in order.
//!
//! A cursor holds only the entry it is positioned on. Each advance re-seeks
//! the ordered maps from just past that (index key, primary key) position,
//! so a cursor sees writes committed after it was opened and never copies
//! values it does not land on. Each advance yields to the runtime once so
//! callers see the same suspension behavior as a disk-backed engine.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use serde_json::Value;

use super::engine::{Cursor, Engine, ScanTarget, Scope, ScopeMode, StorageFuture};
use super::entry::Entry;
use super::errors::{StorageError, StorageResult};
use super::key::Key;
use crate::planner::{Direction, KeyRange};

/// Secondary index over one field path of a store's values
#[derive(Debug)]
struct IndexTree {
    /// Dotted path into the value, e.g. `address.city`
    key_path: String,
    tree: BTreeMap<Key, BTreeSet<Key>>,
}

impl IndexTree {
    fn new(key_path: impl Into<String>) -> Self {
        Self {
            key_path: key_path.into(),
            tree: BTreeMap::new(),
        }
    }

    /// Index key of a value, if the path resolves to something keyable
    fn extract(&self, value: &Value) -> Option<Key> {
        let mut current = value;
        for segment in self.key_path.split('.') {
            current = current.get(segment)?;
        }
        Key::from_json(current)
    }

    fn insert(&mut self, primary_key: &Key, value: &Value) {
        if let Some(key) = self.extract(value) {
            self.tree.entry(key).or_default().insert(primary_key.clone());
        }
    }

    fn remove(&mut self, primary_key: &Key, value: &Value) {
        let Some(key) = self.extract(value) else {
            return;
        };
        if let Some(primary_keys) = self.tree.get_mut(&key) {
            primary_keys.remove(primary_key);
            if primary_keys.is_empty() {
                self.tree.remove(&key);
            }
        }
    }
}

#[derive(Debug, Default)]
struct StoreData {
    records: BTreeMap<Key, Value>,
    indexes: BTreeMap<String, IndexTree>,
}

impl StoreData {
    fn put(&mut self, primary_key: Key, value: Value) {
        if let Some(old) = self.records.get(&primary_key) {
            for index in self.indexes.values_mut() {
                index.remove(&primary_key, old);
            }
        }
        for index in self.indexes.values_mut() {
            index.insert(&primary_key, &value);
        }
        self.records.insert(primary_key, value);
    }

    fn delete(&mut self, primary_key: &Key) -> bool {
        match self.records.remove(primary_key) {
            Some(old) => {
                for index in self.indexes.values_mut() {
                    index.remove(primary_key, &old);
                }
                true
            }
            None => false,
        }
    }

    /// (index key, primary key) positions a scan visits, in scan order,
    /// starting just past `after` when given.
    ///
    /// Collapsing keeps the lowest primary key of each distinct index key in
    /// both directions, so a backward collapsed scan is the exact reverse of
    /// a forward one. Store scans use the primary key for both halves.
    fn positions<'a>(
        &'a self,
        store: &str,
        target: &ScanTarget,
        range: &KeyRange,
        direction: Direction,
        after: Option<(&Key, &Key)>,
    ) -> StorageResult<Positions<'a>> {
        let index = match target {
            ScanTarget::Store => None,
            ScanTarget::Index(name) => {
                Some(self.indexes.get(name).ok_or_else(|| StorageError::IndexNotFound {
                    store: store.to_string(),
                    index: name.clone(),
                })?)
            }
        };

        let Some((low, high)) = range.bounds() else {
            let nothing: Positions<'a> = Box::new(std::iter::empty());
            return Ok(nothing);
        };
        let descending = direction.is_descending();
        // `after` lies inside the range, so narrowing never inverts the bounds
        let (low, high) = match after {
            None => (low, high),
            Some((key, _)) if descending => (low, Bound::Excluded(key)),
            Some((key, _)) => (Bound::Excluded(key), high),
        };

        let Some(index) = index else {
            let keys = self
                .records
                .range::<Key, (Bound<&Key>, Bound<&Key>)>((low, high))
                .map(|(pk, _)| (pk, pk));
            let keys: Positions<'a> = if descending {
                Box::new(keys.rev())
            } else {
                Box::new(keys)
            };
            return Ok(keys);
        };

        let unique = direction.collapses_duplicates();

        // Rest of the duplicates under the index key the cursor sits on
        let same_key: Positions<'a> = match after {
            Some((key, pk)) if !unique => match index.tree.get_key_value(key) {
                Some((index_key, primary_keys)) if descending => Box::new(
                    primary_keys
                        .range::<Key, (Bound<&Key>, Bound<&Key>)>((
                            Bound::Unbounded,
                            Bound::Excluded(pk),
                        ))
                        .rev()
                        .map(move |p| (index_key, p)),
                ),
                Some((index_key, primary_keys)) => Box::new(
                    primary_keys
                        .range::<Key, (Bound<&Key>, Bound<&Key>)>((
                            Bound::Excluded(pk),
                            Bound::Unbounded,
                        ))
                        .map(move |p| (index_key, p)),
                ),
                None => Box::new(std::iter::empty()),
            },
            _ => Box::new(std::iter::empty()),
        };

        let keys = index.tree.range::<Key, (Bound<&Key>, Bound<&Key>)>((low, high));
        let keys: Box<dyn Iterator<Item = (&'a Key, &'a BTreeSet<Key>)> + 'a> = if descending {
            Box::new(keys.rev())
        } else {
            Box::new(keys)
        };
        let rest = keys.flat_map(move |(index_key, primary_keys)| {
            let primary: Box<dyn Iterator<Item = &'a Key> + 'a> = if unique {
                Box::new(primary_keys.iter().take(1))
            } else if descending {
                Box::new(primary_keys.iter().rev())
            } else {
                Box::new(primary_keys.iter())
            };
            primary.map(move |pk| (index_key, pk))
        });
        Ok(Box::new(same_key.chain(rest)))
    }

    /// Entry `skip` positions past the first one a scan visits after `after`
    fn seek(
        &self,
        store: &str,
        target: &ScanTarget,
        range: &KeyRange,
        direction: Direction,
        after: Option<(&Key, &Key)>,
        skip: usize,
    ) -> StorageResult<Option<Entry>> {
        let found = self
            .positions(store, target, range, direction, after)?
            .filter_map(|(index_key, pk)| self.records.get(pk).map(|v| (index_key, pk, v)))
            .nth(skip);
        Ok(found.map(|(index_key, pk, value)| entry(target, index_key, pk, value)))
    }

    /// Up to `limit` entries in forward order
    fn read(
        &self,
        store: &str,
        target: &ScanTarget,
        range: &KeyRange,
        limit: Option<u64>,
    ) -> StorageResult<Vec<Entry>> {
        let take = limit.map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX));
        let entries = self
            .positions(store, target, range, Direction::Forward, None)?
            .filter_map(|(index_key, pk)| self.records.get(pk).map(|v| (index_key, pk, v)))
            .take(take)
            .map(|(index_key, pk, value)| entry(target, index_key, pk, value))
            .collect();
        Ok(entries)
    }

    /// Number of entries in range, counted over keys only
    fn count(&self, store: &str, target: &ScanTarget, range: &KeyRange) -> StorageResult<u64> {
        let count = self
            .positions(store, target, range, Direction::Forward, None)?
            .filter(|(_, pk)| self.records.contains_key(*pk))
            .count();
        Ok(count as u64)
    }
}

type Positions<'a> = Box<dyn Iterator<Item = (&'a Key, &'a Key)> + 'a>;

fn entry(target: &ScanTarget, index_key: &Key, primary_key: &Key, value: &Value) -> Entry {
    match target {
        ScanTarget::Store => Entry::primary(primary_key.clone(), value.clone()),
        ScanTarget::Index(_) => {
            Entry::indexed(index_key.clone(), primary_key.clone(), value.clone())
        }
    }
}

#[derive(Debug, Default)]
struct Shared {
    stores: RwLock<HashMap<String, StoreData>>,
    /// Bumped by `abort_open_scopes`; scopes opened under an older epoch fail
    abort_epoch: AtomicU64,
    open_scopes: AtomicUsize,
    scopes_opened: AtomicU64,
    advances: AtomicU64,
}

impl Shared {
    fn with_store<R>(
        &self,
        store: &str,
        f: impl FnOnce(&StoreData) -> StorageResult<R>,
    ) -> StorageResult<R> {
        let stores = self
            .stores
            .read()
            .map_err(|_| StorageError::Backend("store lock poisoned".into()))?;
        let data = stores
            .get(store)
            .ok_or_else(|| StorageError::StoreNotFound(store.to_string()))?;
        f(data)
    }

    fn with_store_mut<R>(
        &self,
        store: &str,
        f: impl FnOnce(&mut StoreData) -> StorageResult<R>,
    ) -> StorageResult<R> {
        let mut stores = self
            .stores
            .write()
            .map_err(|_| StorageError::Backend("store lock poisoned".into()))?;
        let data = stores
            .get_mut(store)
            .ok_or_else(|| StorageError::StoreNotFound(store.to_string()))?;
        f(data)
    }
}

/// Memory-backed engine. Cloning shares the same stores.
#[derive(Debug, Clone, Default)]
pub struct MemoryEngine {
    shared: Arc<Shared>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store. Creating an existing store is a no-op.
    pub fn create_store(&self, name: impl Into<String>) -> StorageResult<()> {
        let mut stores = self
            .shared
            .stores
            .write()
            .map_err(|_| StorageError::Backend("store lock poisoned".into()))?;
        stores.entry(name.into()).or_default();
        Ok(())
    }

    /// Create a secondary index over `key_path` and fill it from existing records.
    pub fn create_index(
        &self,
        store: &str,
        index: impl Into<String>,
        key_path: impl Into<String>,
    ) -> StorageResult<()> {
        let (index, key_path) = (index.into(), key_path.into());
        self.shared.with_store_mut(store, |data| {
            let mut tree = IndexTree::new(key_path);
            for (pk, value) in &data.records {
                tree.insert(pk, value);
            }
            data.indexes.insert(index, tree);
            Ok(())
        })
    }

    /// Insert or replace a record
    pub fn put(&self, store: &str, primary_key: Key, value: Value) -> StorageResult<()> {
        self.shared.with_store_mut(store, |data| {
            data.put(primary_key, value);
            Ok(())
        })
    }

    /// Delete a record, returning whether it existed
    pub fn delete(&self, store: &str, primary_key: &Key) -> StorageResult<bool> {
        self.shared
            .with_store_mut(store, |data| Ok(data.delete(primary_key)))
    }

    /// Number of records in a store
    pub fn len(&self, store: &str) -> StorageResult<usize> {
        self.shared.with_store(store, |data| Ok(data.records.len()))
    }

    /// Scopes currently open
    pub fn open_scopes(&self) -> usize {
        self.shared.open_scopes.load(Ordering::Acquire)
    }

    /// Scopes opened since creation
    pub fn scopes_opened(&self) -> u64 {
        self.shared.scopes_opened.load(Ordering::Relaxed)
    }

    /// Cursor advance calls served since creation
    pub fn advance_calls(&self) -> u64 {
        self.shared.advances.load(Ordering::Relaxed)
    }

    /// Abort every scope open right now. Their cursors fail on the next advance.
    pub fn abort_open_scopes(&self) {
        self.shared.abort_epoch.fetch_add(1, Ordering::AcqRel);
    }
}

impl Engine for MemoryEngine {
    type Scope = MemoryScope;

    fn open_scope<'a>(&'a self, store: &'a str, mode: ScopeMode) -> StorageFuture<'a, MemoryScope> {
        Box::pin(async move {
            tokio::task::yield_now().await;
            self.shared.with_store(store, |_| Ok(()))?;

            self.shared.open_scopes.fetch_add(1, Ordering::AcqRel);
            self.shared.scopes_opened.fetch_add(1, Ordering::Relaxed);
            Ok(MemoryScope {
                shared: Arc::clone(&self.shared),
                store: store.to_string(),
                mode,
                epoch: self.shared.abort_epoch.load(Ordering::Acquire),
                released: false,
            })
        })
    }
}

/// Scope over one store of a [`MemoryEngine`]
#[derive(Debug)]
pub struct MemoryScope {
    shared: Arc<Shared>,
    store: String,
    mode: ScopeMode,
    epoch: u64,
    released: bool,
}

impl MemoryScope {
    fn ensure_live(&self) -> StorageResult<()> {
        if self.released {
            return Err(StorageError::ScopeReleased);
        }
        if self.shared.abort_epoch.load(Ordering::Acquire) != self.epoch {
            return Err(StorageError::ScopeAborted);
        }
        Ok(())
    }

    /// Insert or replace a record. Only allowed in read-write scopes.
    pub fn put(&self, primary_key: Key, value: Value) -> StorageResult<()> {
        self.ensure_live()?;
        if self.mode != ScopeMode::ReadWrite {
            return Err(StorageError::ReadOnly);
        }
        self.shared.with_store_mut(&self.store, |data| {
            data.put(primary_key, value);
            Ok(())
        })
    }
}

impl Scope for MemoryScope {
    type Cursor = MemoryCursor;

    fn store(&self) -> &str {
        &self.store
    }

    fn mode(&self) -> ScopeMode {
        self.mode
    }

    fn open_cursor<'a>(
        &'a self,
        target: &'a ScanTarget,
        range: &'a KeyRange,
        direction: Direction,
    ) -> StorageFuture<'a, Option<MemoryCursor>> {
        Box::pin(async move {
            self.ensure_live()?;
            let first = self.shared.with_store(&self.store, |data| {
                data.seek(&self.store, target, range, direction, None, 0)
            })?;
            tokio::task::yield_now().await;
            Ok(first.map(|current| MemoryCursor {
                shared: Arc::clone(&self.shared),
                store: self.store.clone(),
                target: target.clone(),
                range: range.clone(),
                direction,
                current: Some(current),
                epoch: self.epoch,
            }))
        })
    }

    fn bulk_read<'a>(
        &'a self,
        target: &'a ScanTarget,
        range: &'a KeyRange,
        limit: Option<u64>,
    ) -> StorageFuture<'a, Vec<Entry>> {
        Box::pin(async move {
            self.ensure_live()?;
            let entries = self
                .shared
                .with_store(&self.store, |data| data.read(&self.store, target, range, limit))?;
            tokio::task::yield_now().await;
            Ok(entries)
        })
    }

    fn bulk_count<'a>(
        &'a self,
        target: &'a ScanTarget,
        range: &'a KeyRange,
    ) -> StorageFuture<'a, u64> {
        Box::pin(async move {
            self.ensure_live()?;
            let count = self
                .shared
                .with_store(&self.store, |data| data.count(&self.store, target, range))?;
            tokio::task::yield_now().await;
            Ok(count)
        })
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.shared.open_scopes.fetch_sub(1, Ordering::AcqRel);
        }
    }
}

impl Drop for MemoryScope {
    fn drop(&mut self) {
        self.release();
    }
}

/// Cursor positioned on one entry of a live store
#[derive(Debug)]
pub struct MemoryCursor {
    shared: Arc<Shared>,
    store: String,
    target: ScanTarget,
    range: KeyRange,
    direction: Direction,
    /// `None` once exhausted or aborted
    current: Option<Entry>,
    epoch: u64,
}

impl Cursor for MemoryCursor {
    fn current(&self) -> Option<&Entry> {
        self.current.as_ref()
    }

    fn advance(&mut self, count: u64) -> StorageFuture<'_, ()> {
        Box::pin(async move {
            tokio::task::yield_now().await;
            self.shared.advances.fetch_add(1, Ordering::Relaxed);

            if self.shared.abort_epoch.load(Ordering::Acquire) != self.epoch {
                self.current = None;
                return Err(StorageError::ScopeAborted);
            }
            if count == 0 {
                return Ok(());
            }
            let Some(at) = self.current.take() else {
                return Ok(());
            };

            let skip = usize::try_from(count - 1).unwrap_or(usize::MAX);
            let after = Some((&at.key, &at.primary_key));
            let (store, target, range) = (&self.store, &self.target, &self.range);
            let direction = self.direction;
            self.current = self.shared.with_store(store, |data| {
                data.seek(store, target, range, direction, after, skip)
            })?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn seeded() -> MemoryEngine {
        let engine = MemoryEngine::new();
        engine.create_store("people").unwrap();
        engine.create_index("people", "by_city", "address.city").unwrap();
        for (id, city) in [(1, "oslo"), (2, "bergen"), (3, "oslo"), (4, "tromso")] {
            engine
                .put(
                    "people",
                    Key::from_int(id),
                    json!({ "id": id, "address": { "city": city } }),
                )
                .unwrap();
        }
        engine
    }

    async fn drain(cursor: Option<MemoryCursor>) -> Vec<Entry> {
        let mut out = Vec::new();
        if let Some(mut cursor) = cursor {
            while let Some(entry) = cursor.current() {
                out.push(entry.clone());
                cursor.advance(1).await.unwrap();
            }
        }
        out
    }

    fn primary_ids(entries: &[Entry]) -> Vec<i64> {
        entries.iter().filter_map(|e| e.primary_key.as_int()).collect()
    }

    #[tokio::test]
    async fn test_open_scope_missing_store() {
        let engine = MemoryEngine::new();
        let err = engine.open_scope("nope", ScopeMode::ReadOnly).await.unwrap_err();
        assert_eq!(err, StorageError::StoreNotFound("nope".into()));
        assert_eq!(engine.open_scopes(), 0);
    }

    #[tokio::test]
    async fn test_store_scan_both_directions() {
        let engine = seeded();
        let scope = engine.open_scope("people", ScopeMode::ReadOnly).await.unwrap();

        let range = KeyRange::Unbounded;
        let forward = drain(
            scope.open_cursor(&ScanTarget::Store, &range, Direction::Forward).await.unwrap(),
        )
        .await;
        let backward = drain(
            scope.open_cursor(&ScanTarget::Store, &range, Direction::Backward).await.unwrap(),
        )
        .await;

        assert_eq!(primary_ids(&forward), vec![1, 2, 3, 4]);
        assert_eq!(primary_ids(&backward), vec![4, 3, 2, 1]);
    }

    #[tokio::test]
    async fn test_index_scan_orders_by_index_key_then_primary_key() {
        let engine = seeded();
        let scope = engine.open_scope("people", ScopeMode::ReadOnly).await.unwrap();
        let target = ScanTarget::index("by_city");
        let range = KeyRange::Unbounded;

        let all = drain(scope.open_cursor(&target, &range, Direction::Forward).await.unwrap()).await;
        assert_eq!(primary_ids(&all), vec![2, 1, 3, 4]);

        let unique = drain(
            scope.open_cursor(&target, &range, Direction::ForwardUnique).await.unwrap(),
        )
        .await;
        assert_eq!(primary_ids(&unique), vec![2, 1, 4]);

        let back_unique = drain(
            scope.open_cursor(&target, &range, Direction::BackwardUnique).await.unwrap(),
        )
        .await;
        assert_eq!(primary_ids(&back_unique), vec![4, 1, 2]);
    }

    #[tokio::test]
    async fn test_missing_index() {
        let engine = seeded();
        let scope = engine.open_scope("people", ScopeMode::ReadOnly).await.unwrap();
        let err = scope
            .open_cursor(&ScanTarget::index("by_age"), &KeyRange::Unbounded, Direction::Forward)
            .await
            .unwrap_err();
        assert!(err.is_open_failure());
    }

    #[tokio::test]
    async fn test_empty_range_yields_no_cursor() {
        let engine = seeded();
        let scope = engine.open_scope("people", ScopeMode::ReadOnly).await.unwrap();
        let range = KeyRange::bound(Key::from_int(2), Key::from_int(2), true, false);
        let cursor = scope
            .open_cursor(&ScanTarget::Store, &range, Direction::Forward)
            .await
            .unwrap();
        assert!(cursor.is_none());
    }

    #[tokio::test]
    async fn test_bulk_advance_clamps_to_end() {
        let engine = seeded();
        let scope = engine.open_scope("people", ScopeMode::ReadOnly).await.unwrap();
        let mut cursor = scope
            .open_cursor(&ScanTarget::Store, &KeyRange::Unbounded, Direction::Forward)
            .await
            .unwrap()
            .unwrap();

        cursor.advance(2).await.unwrap();
        assert_eq!(cursor.current().and_then(|e| e.primary_key.as_int()), Some(3));
        cursor.advance(100).await.unwrap();
        assert!(cursor.current().is_none());
        cursor.advance(1).await.unwrap();
        assert!(cursor.current().is_none());
    }

    #[tokio::test]
    async fn test_index_cursor_resumes_inside_duplicates() {
        let engine = seeded();
        engine
            .put("people", Key::from_int(5), json!({ "address": { "city": "oslo" } }))
            .unwrap();
        let scope = engine.open_scope("people", ScopeMode::ReadOnly).await.unwrap();
        let target = ScanTarget::index("by_city");
        let oslo_on = KeyRange::lower_bound(Key::from_string("oslo"), false);

        let mut cursor = scope
            .open_cursor(&target, &oslo_on, Direction::Forward)
            .await
            .unwrap()
            .unwrap();
        cursor.advance(2).await.unwrap();
        assert_eq!(cursor.current().and_then(|e| e.primary_key.as_int()), Some(5));

        let backward = drain(
            scope.open_cursor(&target, &oslo_on, Direction::Backward).await.unwrap(),
        )
        .await;
        assert_eq!(primary_ids(&backward), vec![4, 5, 3, 1]);
    }

    #[tokio::test]
    async fn test_cursor_reads_live_store() {
        let engine = seeded();
        let scope = engine.open_scope("people", ScopeMode::ReadOnly).await.unwrap();
        let mut cursor = scope
            .open_cursor(&ScanTarget::Store, &KeyRange::Unbounded, Direction::Forward)
            .await
            .unwrap()
            .unwrap();

        // Only the current entry is held; later keys are read on advance
        engine.delete("people", &Key::from_int(2)).unwrap();
        engine.put("people", Key::from_int(9), json!({ "id": 9 })).unwrap();

        let mut seen = vec![cursor.current().and_then(|e| e.primary_key.as_int())];
        while cursor.current().is_some() {
            cursor.advance(1).await.unwrap();
            seen.push(cursor.current().and_then(|e| e.primary_key.as_int()));
        }
        assert_eq!(seen, vec![Some(1), Some(3), Some(4), Some(9), None]);
    }

    #[tokio::test]
    async fn test_current_entry_deleted_under_cursor() {
        let engine = seeded();
        let scope = engine.open_scope("people", ScopeMode::ReadOnly).await.unwrap();
        let mut cursor = scope
            .open_cursor(&ScanTarget::Store, &KeyRange::Unbounded, Direction::Backward)
            .await
            .unwrap()
            .unwrap();

        engine.delete("people", &Key::from_int(4)).unwrap();
        assert_eq!(cursor.current().and_then(|e| e.primary_key.as_int()), Some(4));
        cursor.advance(1).await.unwrap();
        assert_eq!(cursor.current().and_then(|e| e.primary_key.as_int()), Some(3));
    }

    #[tokio::test]
    async fn test_bulk_read_and_count() {
        let engine = seeded();
        let scope = engine.open_scope("people", ScopeMode::ReadOnly).await.unwrap();
        let target = ScanTarget::index("by_city");
        let oslo = KeyRange::only(Key::from_string("oslo"));

        assert_eq!(scope.bulk_count(&target, &oslo).await.unwrap(), 2);
        let first = scope.bulk_read(&target, &oslo, Some(1)).await.unwrap();
        assert_eq!(primary_ids(&first), vec![1]);
    }

    #[tokio::test]
    async fn test_put_replaces_index_entries() {
        let engine = seeded();
        engine
            .put("people", Key::from_int(1), json!({ "address": { "city": "bergen" } }))
            .unwrap();

        let scope = engine.open_scope("people", ScopeMode::ReadOnly).await.unwrap();
        let target = ScanTarget::index("by_city");
        let bergen = KeyRange::only(Key::from_string("bergen"));
        let oslo = KeyRange::only(Key::from_string("oslo"));
        assert_eq!(scope.bulk_count(&target, &bergen).await.unwrap(), 2);
        assert_eq!(scope.bulk_count(&target, &oslo).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_scope_release_is_idempotent() {
        let engine = seeded();
        let mut scope = engine.open_scope("people", ScopeMode::ReadOnly).await.unwrap();
        assert_eq!(engine.open_scopes(), 1);

        scope.release();
        scope.release();
        assert_eq!(engine.open_scopes(), 0);
        drop(scope);
        assert_eq!(engine.open_scopes(), 0);
    }

    #[tokio::test]
    async fn test_abort_fails_next_advance() {
        let engine = seeded();
        let scope = engine.open_scope("people", ScopeMode::ReadOnly).await.unwrap();
        let mut cursor = scope
            .open_cursor(&ScanTarget::Store, &KeyRange::Unbounded, Direction::Forward)
            .await
            .unwrap()
            .unwrap();

        engine.abort_open_scopes();
        assert_eq!(cursor.advance(1).await.unwrap_err(), StorageError::ScopeAborted);
        assert!(cursor.current().is_none());
    }

    #[tokio::test]
    async fn test_read_only_scope_rejects_put() {
        let engine = seeded();
        let scope = engine.open_scope("people", ScopeMode::ReadOnly).await.unwrap();
        assert_eq!(
            scope.put(Key::from_int(9), json!({})).unwrap_err(),
            StorageError::ReadOnly
        );

        let scope = engine.open_scope("people", ScopeMode::ReadWrite).await.unwrap();
        scope.put(Key::from_int(9), json!({})).unwrap();
        assert_eq!(engine.len("people").unwrap(), 5);
    }
}
