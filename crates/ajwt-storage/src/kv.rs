//! Namespaced key-value store trait and the in-memory implementation.
//!
//! The [`KvStore`] trait is the persistence seam for registry records,
//! workflow definitions, and consumed-token marks. Beyond plain
//! `get`/`set`/`delete` it requires two atomic primitives, which is what lets
//! callers avoid read-then-write races:
//!
//! - [`insert_new`](KvStore::insert_new): create a key only if absent
//! - [`compare_and_swap`](KvStore::compare_and_swap): replace a value only if
//!   it still equals what the caller last read
//!
//! Use [`ScopedKvStore`] to pre-bind a namespace and get typed JSON access.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::error::{StorageError, StorageResult};

/// Validate that a namespace is safe for use as a key prefix.
///
/// Namespaces must be non-empty and must not contain the null byte
/// (used internally as the namespace/key separator).
pub(crate) fn validate_namespace(namespace: &str) -> StorageResult<()> {
    if namespace.is_empty() {
        return Err(StorageError::InvalidKey(
            "namespace must not be empty".into(),
        ));
    }
    if namespace.contains('\0') {
        return Err(StorageError::InvalidKey(
            "namespace must not contain null bytes".into(),
        ));
    }
    Ok(())
}

/// Validate that a key is non-empty and free of null bytes.
pub(crate) fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey("key must not be empty".into()));
    }
    if key.contains('\0') {
        return Err(StorageError::InvalidKey(
            "key must not contain null bytes".into(),
        ));
    }
    Ok(())
}

/// Namespaced byte-level key-value store.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Get a value. Returns `None` if the key does not exist.
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Set a value, overwriting any existing one.
    async fn set(&self, namespace: &str, key: &str, value: Vec<u8>) -> StorageResult<()>;

    /// Atomically create a key.
    ///
    /// Returns `false` and leaves the store untouched if the key exists.
    async fn insert_new(&self, namespace: &str, key: &str, value: Vec<u8>) -> StorageResult<bool>;

    /// Atomically replace a value if it currently equals `expected`.
    ///
    /// `expected = None` means "the key must not exist". Returns `false`
    /// and leaves the store untouched when the current value differs.
    async fn compare_and_swap(
        &self,
        namespace: &str,
        key: &str,
        expected: Option<&[u8]>,
        value: Vec<u8>,
    ) -> StorageResult<bool>;

    /// Delete a key. Returns `true` if it existed.
    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<bool>;

    /// Check if a key exists.
    async fn exists(&self, namespace: &str, key: &str) -> StorageResult<bool>;

    /// List all keys in a namespace, sorted.
    async fn list_keys(&self, namespace: &str) -> StorageResult<Vec<String>>;
}

/// In-memory key-value store.
///
/// Keys are stored as `"{namespace}\0{key}"`. Every atomic operation holds
/// the write lock for its whole read-compare-write.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    data: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryKvStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn full_key(namespace: &str, key: &str) -> StorageResult<String> {
        validate_namespace(namespace)?;
        validate_key(key)?;
        Ok(format!("{namespace}\0{key}"))
    }

    fn read(
        &self,
    ) -> StorageResult<std::sync::RwLockReadGuard<'_, HashMap<String, Vec<u8>>>> {
        self.data
            .read()
            .map_err(|e| StorageError::Internal(e.to_string()))
    }

    fn write(
        &self,
    ) -> StorageResult<std::sync::RwLockWriteGuard<'_, HashMap<String, Vec<u8>>>> {
        self.data
            .write()
            .map_err(|e| StorageError::Internal(e.to_string()))
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let full = Self::full_key(namespace, key)?;
        Ok(self.read()?.get(&full).cloned())
    }

    async fn set(&self, namespace: &str, key: &str, value: Vec<u8>) -> StorageResult<()> {
        let full = Self::full_key(namespace, key)?;
        self.write()?.insert(full, value);
        Ok(())
    }

    async fn insert_new(&self, namespace: &str, key: &str, value: Vec<u8>) -> StorageResult<bool> {
        let full = Self::full_key(namespace, key)?;
        let mut data = self.write()?;
        if data.contains_key(&full) {
            return Ok(false);
        }
        data.insert(full, value);
        Ok(true)
    }

    async fn compare_and_swap(
        &self,
        namespace: &str,
        key: &str,
        expected: Option<&[u8]>,
        value: Vec<u8>,
    ) -> StorageResult<bool> {
        let full = Self::full_key(namespace, key)?;
        let mut data = self.write()?;
        if data.get(&full).map(Vec::as_slice) != expected {
            return Ok(false);
        }
        data.insert(full, value);
        Ok(true)
    }

    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        let full = Self::full_key(namespace, key)?;
        Ok(self.write()?.remove(&full).is_some())
    }

    async fn exists(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        let full = Self::full_key(namespace, key)?;
        Ok(self.read()?.contains_key(&full))
    }

    async fn list_keys(&self, namespace: &str) -> StorageResult<Vec<String>> {
        validate_namespace(namespace)?;
        let prefix = format!("{namespace}\0");
        let mut keys: Vec<String> = self
            .read()?
            .keys()
            .filter_map(|k| k.strip_prefix(&prefix).map(String::from))
            .collect();
        keys.sort();
        Ok(keys)
    }
}

/// A namespace-scoped view into a [`KvStore`] with JSON convenience.
#[derive(Clone)]
pub struct ScopedKvStore {
    inner: Arc<dyn KvStore>,
    namespace: String,
}

impl std::fmt::Debug for ScopedKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedKvStore")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> StorageResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| StorageError::Serialization(e.to_string()))
}

impl ScopedKvStore {
    /// Create a scoped view into `store` for `namespace`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidKey`] if the namespace is empty or
    /// contains null bytes.
    pub fn new(store: Arc<dyn KvStore>, namespace: impl Into<String>) -> StorageResult<Self> {
        let namespace = namespace.into();
        validate_namespace(&namespace)?;
        Ok(Self {
            inner: store,
            namespace,
        })
    }

    /// The namespace this store is scoped to.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Get a raw value.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidKey`] for an invalid key, or the
    /// backend's error.
    pub async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        self.inner.get(&self.namespace, key).await
    }

    /// Delete a key. Returns `true` if it existed.
    ///
    /// # Errors
    ///
    /// Returns the backend's error.
    pub async fn delete(&self, key: &str) -> StorageResult<bool> {
        self.inner.delete(&self.namespace, key).await
    }

    /// Check if a key exists.
    ///
    /// # Errors
    ///
    /// Returns the backend's error.
    pub async fn exists(&self, key: &str) -> StorageResult<bool> {
        self.inner.exists(&self.namespace, key).await
    }

    /// List all keys in this namespace, sorted.
    ///
    /// # Errors
    ///
    /// Returns the backend's error.
    pub async fn list_keys(&self) -> StorageResult<Vec<String>> {
        self.inner.list_keys(&self.namespace).await
    }

    /// Deserialize a JSON value. Returns `None` if the key does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Serialization`] if deserialization fails.
    pub async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        key: &str,
    ) -> StorageResult<Option<T>> {
        self.get(key)
            .await?
            .map(|b| {
                serde_json::from_slice(&b).map_err(|e| StorageError::Serialization(e.to_string()))
            })
            .transpose()
    }

    /// Serialize a value as JSON and store it, overwriting.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Serialization`] if serialization fails.
    pub async fn set_json<T: serde::Serialize + Sync>(
        &self,
        key: &str,
        value: &T,
    ) -> StorageResult<()> {
        self.inner.set(&self.namespace, key, to_json(value)?).await
    }

    /// Serialize a value as JSON and create the key only if absent.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Serialization`] if serialization fails.
    pub async fn insert_new_json<T: serde::Serialize + Sync>(
        &self,
        key: &str,
        value: &T,
    ) -> StorageResult<bool> {
        self.inner
            .insert_new(&self.namespace, key, to_json(value)?)
            .await
    }

    /// Replace the JSON value at `key` only if its stored bytes still equal
    /// the serialization of `expected`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Serialization`] if serialization fails.
    pub async fn compare_and_swap_json<T: serde::Serialize + Sync>(
        &self,
        key: &str,
        expected: Option<&T>,
        value: &T,
    ) -> StorageResult<bool> {
        let expected = expected.map(to_json).transpose()?;
        self.inner
            .compare_and_swap(&self.namespace, key, expected.as_deref(), to_json(value)?)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_get_set() {
        let store = MemoryKvStore::new();
        store.set("ns1", "key1", b"hello".to_vec()).await.unwrap();
        assert_eq!(
            store.get("ns1", "key1").await.unwrap(),
            Some(b"hello".to_vec())
        );
        assert!(store.get("ns1", "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_insert_new_only_once() {
        let store = MemoryKvStore::new();
        assert!(store.insert_new("ns", "k", b"first".to_vec()).await.unwrap());
        assert!(!store.insert_new("ns", "k", b"second".to_vec()).await.unwrap());
        assert_eq!(store.get("ns", "k").await.unwrap(), Some(b"first".to_vec()));
    }

    #[tokio::test]
    async fn test_memory_compare_and_swap() {
        let store = MemoryKvStore::new();
        assert!(
            store
                .compare_and_swap("ns", "k", None, b"v1".to_vec())
                .await
                .unwrap()
        );
        assert!(
            !store
                .compare_and_swap("ns", "k", None, b"v2".to_vec())
                .await
                .unwrap()
        );
        assert!(
            !store
                .compare_and_swap("ns", "k", Some(b"stale"), b"v2".to_vec())
                .await
                .unwrap()
        );
        assert!(
            store
                .compare_and_swap("ns", "k", Some(b"v1"), b"v2".to_vec())
                .await
                .unwrap()
        );
        assert_eq!(store.get("ns", "k").await.unwrap(), Some(b"v2".to_vec()));
    }

    #[tokio::test]
    async fn test_memory_delete_and_exists() {
        let store = MemoryKvStore::new();
        store.set("ns1", "k", b"v".to_vec()).await.unwrap();
        assert!(store.exists("ns1", "k").await.unwrap());
        assert!(store.delete("ns1", "k").await.unwrap());
        assert!(!store.delete("ns1", "k").await.unwrap());
        assert!(!store.exists("ns1", "k").await.unwrap());
    }

    #[tokio::test]
    async fn test_memory_namespace_isolation_and_listing() {
        let store = MemoryKvStore::new();
        store.set("ns1", "b", b"2".to_vec()).await.unwrap();
        store.set("ns1", "a", b"1".to_vec()).await.unwrap();
        store.set("ns2", "c", b"3".to_vec()).await.unwrap();
        assert_eq!(store.list_keys("ns1").await.unwrap(), vec!["a", "b"]);
        assert_eq!(store.list_keys("ns2").await.unwrap(), vec!["c"]);
    }

    #[tokio::test]
    async fn test_memory_rejects_invalid_keys() {
        let store = MemoryKvStore::new();
        assert!(matches!(
            store.get("", "k").await,
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(
            store.set("ns", "bad\0key", vec![]).await,
            Err(StorageError::InvalidKey(_))
        ));
    }

    #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Record {
        version: u64,
    }

    #[tokio::test]
    async fn test_scoped_json() {
        let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
        let scoped = ScopedKvStore::new(Arc::clone(&store), "ajwt:test").unwrap();

        let v1 = Record { version: 1 };
        let v2 = Record { version: 2 };
        assert!(scoped.insert_new_json("r", &v1).await.unwrap());
        assert!(!scoped.insert_new_json("r", &v2).await.unwrap());
        assert!(!scoped.compare_and_swap_json("r", Some(&v2), &v2).await.unwrap());
        assert!(scoped.compare_and_swap_json("r", Some(&v1), &v2).await.unwrap());
        assert_eq!(scoped.get_json::<Record>("r").await.unwrap(), Some(v2));

        let other = ScopedKvStore::new(store, "ajwt:other").unwrap();
        assert!(other.get("r").await.unwrap().is_none());
    }

    #[test]
    fn test_scoped_rejects_bad_namespace() {
        let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
        assert!(ScopedKvStore::new(Arc::clone(&store), "").is_err());
        assert!(ScopedKvStore::new(store, "a\0b").is_err());
    }
}
