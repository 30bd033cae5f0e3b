use std::fmt;

use log::trace;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use url::Url;

use crate::commons::{
    error::PreflightIoError,
    storage::{Disk, Key, Memory, Scope, SegmentBuf},
};

//------------ KeyValueStore -------------------------------------------------

/// A JSON key-value store for one namespace.
///
/// The backend is selected by the scheme of the storage URI: `memory://name`
/// keeps values in a process-wide map (shared by every store created with
/// the same name), and `local://path` keeps one file per key under
/// `path/namespace`.
#[derive(Debug)]
pub enum KeyValueStore {
    Memory(Memory),
    Disk(Disk),
}

// # Construct and high level functions.
impl KeyValueStore {
    /// Creates a new KeyValueStore.
    pub fn create(storage_uri: &Url, namespace: &str) -> Result<Self, KeyValueError> {
        let namespace = SegmentBuf::parse(namespace)
            .map_err(|e| KeyValueError::Other(format!("Cannot parse namespace: {}. Error: {}", namespace, e)))?;

        match storage_uri.scheme() {
            "local" => {
                let path = format!("{}{}", storage_uri.host_str().unwrap_or_default(), storage_uri.path());

                Ok(KeyValueStore::Disk(Disk::new(&path, namespace.as_str())?))
            }
            "memory" => {
                let prefix = match storage_uri.host_str() {
                    Some(host) if !host.is_empty() => Some(host),
                    _ if !storage_uri.path().is_empty() => Some(storage_uri.path()),
                    _ => None,
                };
                Ok(KeyValueStore::Memory(Memory::new(prefix, namespace)))
            }
            scheme => Err(KeyValueError::UnknownScheme(scheme.to_owned())),
        }
    }

    /// Removes every value in the namespace of this store.
    pub fn wipe(&self) -> Result<(), KeyValueError> {
        self.execute(&Scope::global(), |kv| kv.clear())
    }

    /// Execute one or more `KeyValueStoreDispatcher` operations
    /// while holding the lock for the given scope.
    ///
    /// The closure needs to return a Result<T, KeyValueError>. This
    /// allows the caller to simply use the ? operator on any kv
    /// calls that could result in an error within the closure.
    ///
    /// Operations on different scopes do not wait for each other. The
    /// dispatcher must not be used to call `execute` for the same scope
    /// again, this would wait forever.
    pub fn execute<F, T>(&self, scope: &Scope, op: F) -> Result<T, KeyValueError>
    where
        F: FnOnce(&KeyValueStoreDispatcher) -> Result<T, KeyValueError>,
    {
        match self {
            KeyValueStore::Memory(memory) => memory.execute(scope, op),
            KeyValueStore::Disk(disk) => disk.execute(scope, op),
        }
    }
}

// # Keys and Values
impl KeyValueStore {
    /// Stores a key value pair, serialized as json, overwrite existing
    pub fn store<V: Serialize>(&self, key: &Key, value: &V) -> Result<(), KeyValueError> {
        self.execute(key.scope(), |kv| kv.store(key, serde_json::to_value(value)?))
    }

    /// Gets a value for a key, returns an error if the value cannot be deserialized,
    /// returns None if it cannot be found.
    pub fn get<V: DeserializeOwned>(&self, key: &Key) -> Result<Option<V>, KeyValueError> {
        self.execute(key.scope(), |kv| kv.get_as(key))
    }

    /// Delete a key-value pair if it exists. Returns whether it did.
    pub fn drop_key_if_exists(&self, key: &Key) -> Result<bool, KeyValueError> {
        self.execute(key.scope(), |kv| {
            if kv.has(key)? {
                kv.delete(key)?;
                Ok(true)
            } else {
                Ok(false)
            }
        })
    }
}

// # Scopes
impl KeyValueStore {
    /// Delete a scope and everything in it. A missing scope is not an error.
    pub fn drop_scope(&self, scope: &Scope) -> Result<(), KeyValueError> {
        self.execute(scope, |kv| kv.delete_scope(scope))
    }

    /// Returns all scopes, including sub_scopes
    pub fn scopes(&self) -> Result<Vec<Scope>, KeyValueError> {
        self.execute(&Scope::global(), |kv| kv.list_scopes())
    }
}

impl fmt::Display for KeyValueStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyValueStore::Memory(memory) => memory.fmt(f),
            KeyValueStore::Disk(disk) => disk.fmt(f),
        }
    }
}

//------------ KeyValueStoreDispatcher ---------------------------------------

/// Gives access to the backend while a scope lock is held.
#[derive(Debug)]
pub enum KeyValueStoreDispatcher<'a> {
    Memory(&'a Memory),
    Disk(&'a Disk),
}

impl KeyValueStoreDispatcher<'_> {
    pub fn has(&self, key: &Key) -> StorageResult<bool> {
        match self {
            KeyValueStoreDispatcher::Memory(m) => m.has(key),
            KeyValueStoreDispatcher::Disk(d) => d.has(key),
        }
    }

    pub fn get(&self, key: &Key) -> StorageResult<Option<Value>> {
        match self {
            KeyValueStoreDispatcher::Memory(m) => m.get(key),
            KeyValueStoreDispatcher::Disk(d) => d.get(key),
        }
    }

    /// Gets a value and deserializes it.
    pub fn get_as<V: DeserializeOwned>(&self, key: &Key) -> StorageResult<Option<V>> {
        if let Some(value) = self.get(key)? {
            trace!("got value for key: {}", key);
            Ok(Some(serde_json::from_value(value)?))
        } else {
            trace!("got nothing for key: {}", key);
            Ok(None)
        }
    }

    pub fn list_scopes(&self) -> StorageResult<Vec<Scope>> {
        match self {
            KeyValueStoreDispatcher::Memory(m) => m.list_scopes(),
            KeyValueStoreDispatcher::Disk(d) => d.list_scopes(),
        }
    }

    /// Store a value.
    pub fn store(&self, key: &Key, value: Value) -> StorageResult<()> {
        match self {
            KeyValueStoreDispatcher::Memory(m) => m.store(key, value),
            KeyValueStoreDispatcher::Disk(d) => d.store(key, value),
        }
    }

    /// Delete a value for a key.
    pub fn delete(&self, key: &Key) -> StorageResult<()> {
        match self {
            KeyValueStoreDispatcher::Memory(m) => m.delete(key),
            KeyValueStoreDispatcher::Disk(d) => d.delete(key),
        }
    }

    /// Delete all values for a scope.
    pub fn delete_scope(&self, scope: &Scope) -> StorageResult<()> {
        match self {
            KeyValueStoreDispatcher::Memory(m) => m.delete_scope(scope),
            KeyValueStoreDispatcher::Disk(d) => d.delete_scope(scope),
        }
    }

    /// Delete all values within the namespace of this store.
    pub fn clear(&self) -> StorageResult<()> {
        match self {
            KeyValueStoreDispatcher::Memory(m) => m.clear(),
            KeyValueStoreDispatcher::Disk(d) => d.clear(),
        }
    }
}

//------------ StorageResult -------------------------------------------------

pub type StorageResult<T> = Result<T, KeyValueError>;

//------------ KeyValueError -------------------------------------------------

/// This type defines possible Errors for the KeyValueStore
#[derive(Debug)]
pub enum KeyValueError {
    UnknownScheme(String),
    IoError(PreflightIoError),
    JsonError(serde_json::Error),
    UnknownKey(Key),
    InvalidKey(Key),
    Other(String),
}

impl From<PreflightIoError> for KeyValueError {
    fn from(e: PreflightIoError) -> Self {
        KeyValueError::IoError(e)
    }
}

impl From<serde_json::Error> for KeyValueError {
    fn from(e: serde_json::Error) -> Self {
        KeyValueError::JsonError(e)
    }
}

impl fmt::Display for KeyValueError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            KeyValueError::UnknownScheme(e) => write!(f, "Unknown Scheme: {}", e),
            KeyValueError::IoError(e) => write!(f, "I/O error: {}", e),
            KeyValueError::JsonError(e) => write!(f, "JSON error: {}", e),
            KeyValueError::UnknownKey(key) => write!(f, "Unknown key: {}", key),
            KeyValueError::InvalidKey(key) => write!(f, "Invalid key: {}", key),
            KeyValueError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for KeyValueError {}

//------------ Tests ---------------------------------------------------------
