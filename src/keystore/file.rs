use std::path::{Path, PathBuf};

use log::trace;
use secrecy::SecretString;

use crate::{
    commons::{crypto::KeyStore, util::file},
    constants::PKCS12_SUFFIX,
    keystore::{KeystoreLocation, KeystoreStorage, KeystoreStorageError, reseal_for_write, verify_readable},
};

//------------ KeystoreFileStorage -------------------------------------------

/// Keeps keystores as PKCS#12 files on the local file system.
///
/// A location that is an absolute path is used as is, any other location
/// becomes `<keystore_dir>/<location>.p12`.
#[derive(Clone, Debug)]
pub struct KeystoreFileStorage {
    keystore_dir: PathBuf,
}

impl KeystoreFileStorage {
    pub fn new(keystore_dir: &Path) -> Self {
        KeystoreFileStorage {
            keystore_dir: keystore_dir.to_path_buf(),
        }
    }

    pub fn path(&self, location: &KeystoreLocation) -> PathBuf {
        let path = Path::new(location.as_str());
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            file::file_path(&self.keystore_dir, &format!("{}{}", location, PKCS12_SUFFIX))
        }
    }
}

impl KeystoreStorage for KeystoreFileStorage {
    fn read(
        &self,
        location: &KeystoreLocation,
        password: &SecretString,
    ) -> Result<Option<KeyStore>, KeystoreStorageError> {
        let path = self.path(location);
        match file::read_if_exists(&path)? {
            Some(der) => {
                trace!("Read keystore from {}", path.display());
                verify_readable(KeyStore::from_der(der), password).map(Some)
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
        let sealed = reseal_for_write(keystore, read_password, write_password)?;
        file::save(sealed.as_der(), &self.path(location))?;
        Ok(())
    }

    fn delete(&self, location: &KeystoreLocation) -> Result<(), KeystoreStorageError> {
        file::delete_file(&self.path(location))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_locations_live_in_keystore_dir() {
        let storage = KeystoreFileStorage::new(Path::new("/var/lib/preflight/keystores"));
        assert_eq!(
            storage.path(&KeystoreLocation::certificate_authority()),
            PathBuf::from("/var/lib/preflight/keystores/certificate-authority.p12")
        );
        assert_eq!(
            storage.path(&KeystoreLocation::file(Path::new("/etc/ca.p12"))),
            PathBuf::from("/etc/ca.p12")
        );
    }
}
