//! Typed document collections with optimistic concurrency.

use crate::StoreError;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

/// A value that can live in a [`Collection`].
///
/// Documents round-trip through JSON, mirroring how they would be stored
/// by a real document database.
pub trait Document: Serialize + DeserializeOwned {
    /// Primary key of this document.
    fn id(&self) -> String;
}

struct Stored {
    version: u64,
    bytes: Vec<u8>,
}

/// A named collection of versioned documents.
///
/// All reads decode a private copy; all writes are compare-and-swap on the
/// document version. Two writers racing on the same document cannot both
/// win: one succeeds, the other observes [`StoreError::VersionConflict`]
/// and re-reads.
pub struct Collection<T> {
    name: &'static str,
    rows: RwLock<HashMap<String, Stored>>,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T: Document> Collection<T> {
    /// Create an empty collection.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            rows: RwLock::new(HashMap::new()),
            _marker: std::marker::PhantomData,
        }
    }

    /// Collection name (used in error messages).
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Insert a new document at version 1.
    ///
    /// Fails with [`StoreError::AlreadyExists`] if the id is taken.
    pub fn insert(&self, doc: &T) -> Result<(), StoreError> {
        let id = doc.id();
        let bytes = serde_json::to_vec(doc)?;
        let mut rows = self.rows.write().map_err(|_| StoreError::Poisoned(self.name))?;
        if rows.contains_key(&id) {
            return Err(StoreError::AlreadyExists {
                collection: self.name,
                id,
            });
        }
        rows.insert(id, Stored { version: 1, bytes });
        Ok(())
    }

    /// Upsert a document unconditionally, bumping its version.
    ///
    /// Last write wins; use [`Collection::compare_and_swap`] or
    /// [`Collection::update`] when a concurrent writer must not be
    /// clobbered.
    pub fn save(&self, doc: &T) -> Result<u64, StoreError> {
        let id = doc.id();
        let bytes = serde_json::to_vec(doc)?;
        let mut rows = self.rows.write().map_err(|_| StoreError::Poisoned(self.name))?;
        let version = rows.get(&id).map(|s| s.version + 1).unwrap_or(1);
        rows.insert(id, Stored { version, bytes });
        Ok(version)
    }

    /// Fetch a document by id.
    pub fn get(&self, id: &str) -> Result<Option<T>, StoreError> {
        Ok(self.entry(id)?.map(|(doc, _)| doc))
    }

    /// Fetch a document together with its current version.
    pub fn entry(&self, id: &str) -> Result<Option<(T, u64)>, StoreError> {
        let rows = self.rows.read().map_err(|_| StoreError::Poisoned(self.name))?;
        match rows.get(id) {
            Some(stored) => {
                let doc: T = serde_json::from_slice(&stored.bytes)?;
                Ok(Some((doc, stored.version)))
            }
            None => Ok(None),
        }
    }

    /// Fetch a document, failing with [`StoreError::NotFound`] if absent.
    pub fn require(&self, id: &str) -> Result<T, StoreError> {
        self.get(id)?.ok_or_else(|| StoreError::NotFound {
            collection: self.name,
            id: id.to_string(),
        })
    }

    /// Replace a document only if its version is still `expected`.
    ///
    /// Returns the new version on success.
    pub fn compare_and_swap(&self, expected: u64, doc: &T) -> Result<u64, StoreError> {
        let id = doc.id();
        let bytes = serde_json::to_vec(doc)?;
        let mut rows = self.rows.write().map_err(|_| StoreError::Poisoned(self.name))?;
        match rows.get_mut(&id) {
            Some(stored) if stored.version == expected => {
                stored.version += 1;
                stored.bytes = bytes;
                Ok(stored.version)
            }
            Some(stored) => Err(StoreError::VersionConflict {
                collection: self.name,
                id,
                expected,
                found: stored.version,
            }),
            None => Err(StoreError::NotFound {
                collection: self.name,
                id,
            }),
        }
    }

    /// Read-modify-write with bounded retries.
    ///
    /// Loads the document, applies `f` to a private copy, then commits via
    /// compare-and-swap. On a version conflict the whole cycle repeats, so
    /// `f` must re-derive its decisions from the fresh document; this is
    /// what makes conditional updates (decrement-if-enough, and the like)
    /// atomic. Domain errors returned by `f` abort without retrying.
    pub fn update<E, R>(
        &self,
        id: &str,
        max_attempts: u32,
        mut f: impl FnMut(&mut T) -> Result<R, E>,
    ) -> Result<(T, R), E>
    where
        E: From<StoreError>,
    {
        for attempt in 0..max_attempts {
            let (mut doc, version) =
                self.entry(id)?.ok_or_else(|| StoreError::NotFound {
                    collection: self.name,
                    id: id.to_string(),
                })?;
            let outcome = f(&mut doc)?;
            match self.compare_and_swap(version, &doc) {
                Ok(_) => return Ok((doc, outcome)),
                Err(StoreError::VersionConflict { .. }) if attempt + 1 < max_attempts => {
                    std::thread::yield_now();
                }
                Err(StoreError::VersionConflict { .. }) => break,
                Err(e) => return Err(E::from(e)),
            }
        }
        Err(E::from(StoreError::RetryExhausted {
            collection: self.name,
            id: id.to_string(),
            attempts: max_attempts,
        }))
    }

    /// Delete a document. Returns whether it existed.
    pub fn remove(&self, id: &str) -> Result<bool, StoreError> {
        let mut rows = self.rows.write().map_err(|_| StoreError::Poisoned(self.name))?;
        Ok(rows.remove(id).is_some())
    }

    /// All documents matching a predicate.
    pub fn find(&self, mut pred: impl FnMut(&T) -> bool) -> Result<Vec<T>, StoreError> {
        let rows = self.rows.read().map_err(|_| StoreError::Poisoned(self.name))?;
        let mut out = Vec::new();
        for stored in rows.values() {
            let doc: T = serde_json::from_slice(&stored.bytes)?;
            if pred(&doc) {
                out.push(doc);
            }
        }
        Ok(out)
    }

    /// First document matching a predicate.
    pub fn find_one(&self, mut pred: impl FnMut(&T) -> bool) -> Result<Option<T>, StoreError> {
        Ok(self.find(|d| pred(d))?.into_iter().next())
    }

    /// Every document in the collection.
    pub fn all(&self) -> Result<Vec<T>, StoreError> {
        self.find(|_| true)
    }

    /// Number of documents.
    pub fn len(&self) -> usize {
        self.rows.read().map(|r| r.len()).unwrap_or(0)
    }

    /// Whether the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Counter {
        id: String,
        value: i64,
    }

    impl Document for Counter {
        fn id(&self) -> String {
            self.id.clone()
        }
    }

    fn counter(id: &str, value: i64) -> Counter {
        Counter {
            id: id.to_string(),
            value,
        }
    }

    #[test]
    fn test_insert_and_get() {
        let col: Collection<Counter> = Collection::new("counters");
        col.insert(&counter("a", 1)).unwrap();
        assert_eq!(col.get("a").unwrap().unwrap().value, 1);
        assert!(col.get("missing").unwrap().is_none());
    }

    #[test]
    fn test_insert_duplicate_fails() {
        let col: Collection<Counter> = Collection::new("counters");
        col.insert(&counter("a", 1)).unwrap();
        assert!(matches!(
            col.insert(&counter("a", 2)),
            Err(StoreError::AlreadyExists { .. })
        ));
    }

    #[test]
    fn test_compare_and_swap_detects_conflict() {
        let col: Collection<Counter> = Collection::new("counters");
        col.insert(&counter("a", 1)).unwrap();
        let (_, v1) = col.entry("a").unwrap().unwrap();

        col.compare_and_swap(v1, &counter("a", 2)).unwrap();
        // Stale version must lose.
        assert!(matches!(
            col.compare_and_swap(v1, &counter("a", 3)),
            Err(StoreError::VersionConflict { .. })
        ));
    }

    #[test]
    fn test_update_retries_to_success() {
        use std::sync::Arc;

        let col: Arc<Collection<Counter>> = Arc::new(Collection::new("counters"));
        col.insert(&counter("a", 0)).unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let col = Arc::clone(&col);
            handles.push(std::thread::spawn(move || {
                for _ in 0..50 {
                    col.update::<StoreError, _>("a", 64, |c| {
                        c.value += 1;
                        Ok(())
                    })
                    .unwrap();
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(col.get("a").unwrap().unwrap().value, 400);
    }

    #[test]
    fn test_update_domain_error_aborts() {
        let col: Collection<Counter> = Collection::new("counters");
        col.insert(&counter("a", 0)).unwrap();
        let err = col
            .update::<StoreError, ()>("a", 8, |_| {
                Err(StoreError::Serialization("nope".into()))
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::Serialization(_)));
        // Document untouched.
        assert_eq!(col.get("a").unwrap().unwrap().value, 0);
    }

    #[test]
    fn test_save_bumps_version() {
        let col: Collection<Counter> = Collection::new("counters");
        col.insert(&counter("a", 1)).unwrap();
        let v = col.save(&counter("a", 2)).unwrap();
        assert_eq!(v, 2);
        assert_eq!(col.get("a").unwrap().unwrap().value, 2);
    }

    #[test]
    fn test_find_and_remove() {
        let col: Collection<Counter> = Collection::new("counters");
        col.insert(&counter("a", 1)).unwrap();
        col.insert(&counter("b", 2)).unwrap();
        col.insert(&counter("c", 3)).unwrap();

        let big = col.find(|c| c.value >= 2).unwrap();
        assert_eq!(big.len(), 2);

        assert!(col.remove("b").unwrap());
        assert!(!col.remove("b").unwrap());
        assert_eq!(col.len(), 2);
    }
}
