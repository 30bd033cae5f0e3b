//! Persistence of sealed keystores.
//!
//! A keystore backend stores [`KeyStore`] blobs by [`KeystoreLocation`]. It
//! knows nothing about certificates: it only checks that a blob can be
//! opened with the password the caller gives it.
use std::{fmt, path::Path};

use secrecy::SecretString;

use crate::{
    commons::{
        crypto::{CryptoError, KeyStore},
        error::PreflightIoError,
        storage::KeyValueError,
    },
    constants::CA_KEYSTORE_ID,
};

mod cluster;
pub use self::cluster::KeystoreClusterStorage;

mod file;
pub use self::file::KeystoreFileStorage;

//------------ KeystoreStorage -----------------------------------------------

/// Reads and writes password protected keystores by location.
///
/// Implementations must never expose a partially written keystore: a read
/// that follows a failed write sees the previous content, or nothing.
pub trait KeystoreStorage: Send + Sync {
    /// Reads the keystore at the location, checking that it opens with the
    /// password. Returns `None` if there is no keystore.
    fn read(&self, location: &KeystoreLocation, password: &SecretString)
    -> Result<Option<KeyStore>, KeystoreStorageError>;

    /// Writes the keystore. It is opened with `read_password` and persisted
    /// protected by `write_password`.
    fn write(
        &self,
        location: &KeystoreLocation,
        keystore: &KeyStore,
        read_password: &SecretString,
        write_password: &SecretString,
    ) -> Result<(), KeystoreStorageError>;

    /// Removes the keystore. Removing an absent keystore is not an error.
    fn delete(&self, location: &KeystoreLocation) -> Result<(), KeystoreStorageError>;
}

/// Checks that a persisted keystore opens with the password.
fn verify_readable(keystore: KeyStore, password: &SecretString) -> Result<KeyStore, KeystoreStorageError> {
    keystore.open(password).map_err(KeystoreStorageError::Unreadable)?;
    Ok(keystore)
}

/// Re-protects a keystore before it is persisted. The entry keeps its alias.
fn reseal_for_write(
    keystore: &KeyStore,
    read_password: &SecretString,
    write_password: &SecretString,
) -> Result<KeyStore, KeystoreStorageError> {
    keystore
        .reseal(read_password, write_password)
        .map_err(KeystoreStorageError::Unreadable)
}

//------------ KeystoreLocation ----------------------------------------------

/// Identifies a keystore within a backend.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct KeystoreLocation(String);

impl KeystoreLocation {
    /// The location of the generated certificate authority.
    pub fn certificate_authority() -> Self {
        KeystoreLocation(CA_KEYSTORE_ID.to_string())
    }

    /// A location given as a file path, e.g. an operator supplied keystore.
    ///
    /// Relative paths are resolved against the current directory.
    pub fn file(path: &Path) -> Self {
        let path = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        KeystoreLocation(path.to_string_lossy().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeystoreLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

//------------ KeystoreStorageError ------------------------------------------

#[derive(Debug)]
pub enum KeystoreStorageError {
    KeyValueError(KeyValueError),
    IoError(PreflightIoError),
    /// Wrong password, or content that is not a keystore.
    Unreadable(CryptoError),
    Other(String),
}

impl fmt::Display for KeystoreStorageError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            KeystoreStorageError::KeyValueError(e) => write!(f, "Key/Value error: {}", e),
            KeystoreStorageError::IoError(e) => e.fmt(f),
            KeystoreStorageError::Unreadable(e) => {
                write!(f, "Cannot open keystore, wrong password or corrupt content: {}", e)
            }
            KeystoreStorageError::Other(msg) => msg.fmt(f),
        }
    }
}

impl std::error::Error for KeystoreStorageError {}

impl From<KeyValueError> for KeystoreStorageError {
    fn from(e: KeyValueError) -> Self {
        KeystoreStorageError::KeyValueError(e)
    }
}

impl From<PreflightIoError> for KeystoreStorageError {
    fn from(e: PreflightIoError) -> Self {
        KeystoreStorageError::IoError(e)
    }
}

//------------ Tests ---------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{commons::crypto::CaKeyPairFactory, test};

    fn secret(s: &str) -> SecretString {
        SecretString::new(s.to_string())
    }

    fn keystore_with_alias(alias: &str, password: &str) -> KeyStore {
        let material = CaKeyPairFactory::generate("Acme", Duration::from_secs(86_400)).unwrap();
        KeyStore::seal(&material, alias, &secret(password)).unwrap()
    }

    fn keystore(password: &str) -> KeyStore {
        keystore_with_alias("ca", password)
    }

    fn impl_contract(storage: &dyn KeystoreStorage) {
        let location = KeystoreLocation::certificate_authority();
        assert!(storage.read(&location, &secret("stored-pw")).unwrap().is_none());

        storage
            .write(&location, &keystore("upload-pw"), &secret("upload-pw"), &secret("stored-pw"))
            .unwrap();
        let read = storage.read(&location, &secret("stored-pw")).unwrap().unwrap();
        assert!(read.open(&secret("stored-pw")).is_ok());

        assert!(matches!(
            storage.read(&location, &secret("upload-pw")),
            Err(KeystoreStorageError::Unreadable(_))
        ));

        // a write that cannot open the keystore leaves the old one in place
        assert!(
            storage
                .write(&location, &keystore("x"), &secret("wrong"), &secret("stored-pw"))
                .is_err()
        );
        let again = storage.read(&location, &secret("stored-pw")).unwrap().unwrap();
        assert_eq!(again, read);

        storage.delete(&location).unwrap();
        storage.delete(&location).unwrap();
        assert!(storage.read(&location, &secret("stored-pw")).unwrap().is_none());
    }

    #[test]
    fn cluster_storage_contract() {
        let storage = KeystoreClusterStorage::new(&test::mem_storage()).unwrap();
        impl_contract(&storage);
    }

    #[test]
    fn file_storage_contract() {
        test::test_under_tmp(|dir| {
            let storage = KeystoreFileStorage::new(&dir);
            impl_contract(&storage);
        })
    }

    fn impl_keeps_alias(storage: &dyn KeystoreStorage) {
        let location = KeystoreLocation::certificate_authority();
        storage
            .write(&location, &keystore_with_alias("node-7", "pw"), &secret("pw"), &secret("stored"))
            .unwrap();

        let opened = storage.read(&location, &secret("stored")).unwrap().unwrap().open(&secret("stored")).unwrap();
        assert_eq!(opened.certificate().alias(), Some(&b"node-7"[..]));
    }

    #[test]
    fn backends_keep_the_alias() {
        impl_keeps_alias(&KeystoreClusterStorage::new(&test::mem_storage()).unwrap());
        test::test_under_tmp(|dir| impl_keeps_alias(&KeystoreFileStorage::new(&dir)));
    }

    #[test]
    fn cluster_storage_rejects_path_locations() {
        let storage = KeystoreClusterStorage::new(&test::mem_storage()).unwrap();
        let location = KeystoreLocation::file(Path::new("/etc/preflight/ca.p12"));

        assert!(matches!(
            storage.write(&location, &keystore("pw"), &secret("pw"), &secret("pw")),
            Err(KeystoreStorageError::Other(_))
        ));
        assert!(storage.read(&location, &secret("pw")).is_err());
        assert!(storage.delete(&location).is_err());
    }
}
