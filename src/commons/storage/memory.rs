use std::{
    collections::{BTreeSet, HashMap, HashSet},
    fmt::Display,
    sync::{Mutex, MutexGuard},
    thread,
    time::Duration,
};

use lazy_static::lazy_static;
use serde_json::Value;

use crate::commons::storage::{Key, KeyValueError, KeyValueStoreDispatcher, Scope, SegmentBuf, StorageResult};

#[derive(Debug)]
pub struct MemoryStore(HashMap<String, HashMap<Key, Value>>);

impl MemoryStore {
    fn new() -> Self {
        MemoryStore(HashMap::new())
    }

    fn has(&self, namespace: &str, key: &Key) -> bool {
        self.0.get(namespace).map(|m| m.contains_key(key)).unwrap_or(false)
    }

    fn get(&self, namespace: &str, key: &Key) -> Option<Value> {
        self.0.get(namespace).and_then(|m| m.get(key).cloned())
    }

    fn insert(&mut self, namespace: &str, key: &Key, value: Value) {
        let map = self.0.entry(namespace.to_string()).or_default();
        map.insert(key.clone(), value);
    }

    fn delete(&mut self, namespace: &str, key: &Key) -> StorageResult<()> {
        self.0
            .get_mut(namespace)
            .ok_or(KeyValueError::UnknownKey(key.clone()))?
            .remove(key)
            .ok_or(KeyValueError::UnknownKey(key.clone()))?;
        Ok(())
    }

    fn list_scopes(&self, namespace: &str) -> Vec<Scope> {
        let scopes: BTreeSet<Scope> = self
            .0
            .get(namespace)
            .map(|m| m.keys().flat_map(|k| k.scope().sub_scopes()).collect())
            .unwrap_or_default();

        scopes.into_iter().collect()
    }

    fn delete_scope(&mut self, namespace: &str, scope: &Scope) {
        if let Some(map) = self.0.get_mut(namespace) {
            map.retain(|k, _| !k.scope().starts_with(scope));
        }
    }

    fn clear(&mut self, namespace: &str) {
        self.0.remove(namespace);
    }
}

lazy_static! {
    static ref STORE: Mutex<MemoryStore> = Mutex::new(MemoryStore::new());
    static ref LOCKS: Mutex<HashSet<ScopeLock>> = Mutex::new(HashSet::new());
}

#[derive(Clone, Debug, Hash, PartialEq, Eq)]
struct ScopeLock(String);

impl ScopeLock {
    fn new(namespace: &str, scope: &Scope) -> Self {
        ScopeLock(format!("{}/{}", namespace, scope))
    }
}

/// Removes the scope lock when dropped, also if the operation panics.
struct ScopeLockGuard<'a> {
    locks: &'a Mutex<HashSet<ScopeLock>>,
    lock: ScopeLock,
}

impl Drop for ScopeLockGuard<'_> {
    fn drop(&mut self) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.remove(&self.lock);
    }
}

#[derive(Clone, Debug)]
pub struct Memory {
    // Prevents collisions between stores created with different memory URLs.
    effective_namespace: String,
    inner: &'static Mutex<MemoryStore>,
    locks: &'static Mutex<HashSet<ScopeLock>>,
}

impl Memory {
    const POLL_LOCK_INTERVAL: Duration = Duration::from_millis(10);
    const POLL_LOCK_TRIES: usize = 1000;

    pub(crate) fn new(namespace_prefix: Option<&str>, namespace: SegmentBuf) -> Self {
        let effective_namespace = match namespace_prefix {
            Some(pfx) => format!("{}_{}", pfx, namespace),
            None => namespace.to_string(),
        };

        Memory {
            effective_namespace,
            inner: &STORE,
            locks: &LOCKS,
        }
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, MemoryStore>> {
        self.inner
            .lock()
            .map_err(|e| KeyValueError::Other(format!("cannot unlock mutex: {e}")))
    }

    fn lock_scope(&self, scope: &Scope) -> StorageResult<ScopeLockGuard<'static>> {
        let scope_lock = ScopeLock::new(&self.effective_namespace, scope);

        for _ in 0..Self::POLL_LOCK_TRIES {
            let mut locks = self
                .locks
                .lock()
                .map_err(|e| KeyValueError::Other(format!("Can't get lock: {e}")))?;

            if locks.insert(scope_lock.clone()) {
                return Ok(ScopeLockGuard {
                    locks: self.locks,
                    lock: scope_lock,
                });
            }
            drop(locks);
            thread::sleep(Self::POLL_LOCK_INTERVAL);
        }

        Err(KeyValueError::Other(format!("Scope {} already locked", scope)))
    }
}

impl Display for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "memory://{}", self.effective_namespace)
    }
}

impl Memory {
    pub fn execute<F, T>(&self, scope: &Scope, op: F) -> Result<T, KeyValueError>
    where
        F: FnOnce(&KeyValueStoreDispatcher) -> Result<T, KeyValueError>,
    {
        let _guard = self.lock_scope(scope)?;
        op(&KeyValueStoreDispatcher::Memory(self))
    }
}

impl Memory {
    pub fn has(&self, key: &Key) -> StorageResult<bool> {
        Ok(self.lock()?.has(&self.effective_namespace, key))
    }

    pub fn get(&self, key: &Key) -> StorageResult<Option<Value>> {
        Ok(self.lock()?.get(&self.effective_namespace, key))
    }

    pub fn list_scopes(&self) -> StorageResult<Vec<Scope>> {
        Ok(self.lock()?.list_scopes(&self.effective_namespace))
    }
}

impl Memory {
    pub fn store(&self, key: &Key, value: Value) -> StorageResult<()> {
        self.lock()?.insert(&self.effective_namespace, key, value);
        Ok(())
    }

    pub fn delete(&self, key: &Key) -> StorageResult<()> {
        self.lock()?.delete(&self.effective_namespace, key)
    }

    pub fn delete_scope(&self, scope: &Scope) -> StorageResult<()> {
        self.lock()?.delete_scope(&self.effective_namespace, scope);
        Ok(())
    }

    pub fn clear(&self) -> StorageResult<()> {
        self.lock()?.clear(&self.effective_namespace);
        Ok(())
    }
}
