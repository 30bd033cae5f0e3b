use log::trace;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{
    commons::{
        crypto::KeyStore,
        storage::{Key, KeyValueStore, SegmentBuf},
        util::ext_serde,
    },
    constants::{JSON_SUFFIX, KEYSTORE_NS},
    keystore::{KeystoreLocation, KeystoreStorage, KeystoreStorageError, reseal_for_write, verify_readable},
};

//------------ StoredKeystore ------------------------------------------------

/// The JSON document holding a keystore in the cluster store.
#[derive(Debug, Deserialize, Serialize)]
struct StoredKeystore {
    #[serde(serialize_with = "ext_serde::ser_bytes", deserialize_with = "ext_serde::de_bytes")]
    pkcs12: Vec<u8>,
}

//------------ KeystoreClusterStorage ----------------------------------------

/// Keeps keystores in the cluster-wide key-value store.
///
/// Every location is a single key, so a write replaces the whole document
/// at once.
#[derive(Debug)]
pub struct KeystoreClusterStorage {
    store: KeyValueStore,
}

impl KeystoreClusterStorage {
    pub fn new(storage_uri: &Url) -> Result<Self, KeystoreStorageError> {
        let store = KeyValueStore::create(storage_uri, KEYSTORE_NS)?;
        Ok(KeystoreClusterStorage { store })
    }

    /// Locations map to keys one to one, locations that are no valid key
    /// name are rejected.
    fn key(location: &KeystoreLocation) -> Result<Key, KeystoreStorageError> {
        let name = SegmentBuf::parse(location.as_str()).map_err(|e| {
            KeystoreStorageError::Other(format!(
                "Keystore location '{}' cannot be used in the cluster store: {}",
                location, e
            ))
        })?;
        Ok(Key::new_global(name.with_suffix(JSON_SUFFIX)))
    }
}

impl KeystoreStorage for KeystoreClusterStorage {
    fn read(
        &self,
        location: &KeystoreLocation,
        password: &SecretString,
    ) -> Result<Option<KeyStore>, KeystoreStorageError> {
        let key = Self::key(location)?;
        match self.store.get::<StoredKeystore>(&key)? {
            Some(stored) => {
                trace!("Read keystore {} from {}", location, self.store);
                verify_readable(KeyStore::from_der(stored.pkcs12), password).map(Some)
            }
            None => Ok(None),
        }
    }

    fn write(
        &self,
        location: &KeystoreLocation,
        keystore: &KeyStore,
        read_password: &SecretString,
        write_password: &SecretString,
    ) -> Result<(), KeystoreStorageError> {
        let key = Self::key(location)?;
        let sealed = reseal_for_write(keystore, read_password, write_password)?;
        let stored = StoredKeystore {
            pkcs12: sealed.into_der(),
        };
        self.store.store(&key, &stored)?;
        trace!("Wrote keystore {} to {}", location, self.store);
        Ok(())
    }

    fn delete(&self, location: &KeystoreLocation) -> Result<(), KeystoreStorageError> {
        self.store.drop_key_if_exists(&Self::key(location)?)?;
        Ok(())
    }
}
