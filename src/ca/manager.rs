//! Lifecycle of the certificate authority of the cluster.
use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock},
    time::Duration,
};

use log::{debug, error, info};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::{
    ca::{CaChangeListener, CaChangedEvent, CaConfig, resolve_password},
    commons::{
        PreflightEmptyResult, PreflightResult,
        crypto::{CaKeyMaterial, CaKeyPairFactory, KeyStore, PemCaReader},
        error::Error,
    },
    constants::{CA_KEY_ALIAS, LOCAL_CA_IDENTITY},
    keystore::{KeystoreFileStorage, KeystoreLocation, KeystoreStorage, KeystoreStorageError},
};

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

//------------ CaSource ------------------------------------------------------

/// Where the active certificate authority comes from.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CaSource {
    /// A keystore file configured by the operator.
    LocalFile,
    /// A CA created or uploaded through preflight, kept in the keystore
    /// backend.
    Generated,
}

impl fmt::Display for CaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaSource::LocalFile => write!(f, "LOCAL_FILE"),
            CaSource::Generated => write!(f, "GENERATED"),
        }
    }
}

//------------ CertificateAuthority ------------------------------------------

/// Describes the active certificate authority, without any key material.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct CertificateAuthority {
    source: CaSource,
    identity: String,
}

impl CertificateAuthority {
    fn local_file() -> Self {
        CertificateAuthority {
            source: CaSource::LocalFile,
            identity: LOCAL_CA_IDENTITY.to_string(),
        }
    }

    fn generated() -> Self {
        CertificateAuthority {
            source: CaSource::Generated,
            identity: KeystoreLocation::certificate_authority().to_string(),
        }
    }

    pub fn source(&self) -> CaSource {
        self.source
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }
}

impl fmt::Display for CertificateAuthority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.identity, self.source)
    }
}

//------------ CaManager -----------------------------------------------------

/// Creates, imports, loads and removes the certificate authority.
///
/// A CA file configured by the operator always takes precedence over a CA
/// kept in the keystore backend. Operations that change the CA are
/// serialized, and listeners are told about a change once it has been
/// persisted.
pub struct CaManager {
    config: RwLock<Arc<CaConfig>>,
    generated: Arc<dyn KeystoreStorage>,
    local: KeystoreFileStorage,
    listener: Arc<dyn CaChangeListener>,
    lock: Mutex<()>,
}

impl CaManager {
    pub fn new(
        config: CaConfig,
        generated: Arc<dyn KeystoreStorage>,
        local: KeystoreFileStorage,
        listener: Arc<dyn CaChangeListener>,
    ) -> Self {
        CaManager {
            config: RwLock::new(Arc::new(config)),
            generated,
            local,
            listener,
            lock: Mutex::new(()),
        }
    }

    /// The configuration in use right now.
    pub fn config(&self) -> Arc<CaConfig> {
        self.config.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Replaces the configuration for all following operations.
    pub fn update_config(&self, config: CaConfig) {
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(config);
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn location() -> KeystoreLocation {
        KeystoreLocation::certificate_authority()
    }

    fn notify(&self, event: CaChangedEvent) {
        debug!("Publishing '{}'", event);
        self.listener.listen(&event);
    }
}

/// # Reading the CA
impl CaManager {
    /// Returns the active CA, or `CaNotFound` if there is none.
    pub fn get(&self) -> PreflightResult<CertificateAuthority> {
        let config = self.config();
        if config.configured_ca_exists() {
            return Ok(CertificateAuthority::local_file());
        }

        match self.generated.read(&Self::location(), resolve_password(&config))? {
            Some(_) => Ok(CertificateAuthority::generated()),
            None => Err(Error::CaNotFound),
        }
    }

    /// Returns the keystore of the active CA, protected by the resolved
    /// password. Uses the same precedence as [`CaManager::get`].
    pub fn load_keystore(&self) -> PreflightResult<KeyStore> {
        let config = self.config();
        let password = resolve_password(&config);

        let keystore = match &config.ca_keystore_file {
            Some(path) if config.configured_ca_exists() => {
                self.local.read(&KeystoreLocation::file(path), password)?
            }
            _ => self.generated.read(&Self::location(), password)?,
        };
        keystore.ok_or(Error::CaNotFound)
    }

    /// Returns the private key and certificate chain of the active CA.
    pub fn load_key_material(&self) -> PreflightResult<CaKeyMaterial> {
        let config = self.config();
        let keystore = self.load_keystore()?;
        keystore
            .open(resolve_password(&config))
            .map_err(|e| Error::KeystoreStorage(KeystoreStorageError::Unreadable(e)))
    }

    /// Returns the certificate of the active CA in PEM format.
    pub fn ca_certificate_pem(&self) -> PreflightResult<String> {
        let pem = self.load_key_material()?.certificate_pem().map_err(Error::custom)?;
        String::from_utf8(pem).map_err(Error::custom)
    }

    /// Returns the keystore of the active CA protected by another password.
    pub fn export(&self, export_password: &SecretString) -> PreflightResult<KeyStore> {
        let config = self.config();
        self.load_keystore()?
            .reseal(resolve_password(&config), export_password)
            .map_err(|e| Error::KeystoreStorage(KeystoreStorageError::Unreadable(e)))
    }
}

/// # Changing the CA
impl CaManager {
    /// Generates a new CA and stores it in the keystore backend.
    ///
    /// A validity of zero days, or none, means the configured default. An
    /// existing CA is not removed first, call [`CaManager::start_over`] for
    /// that.
    pub fn create(
        &self,
        organization: &str,
        validity_days: Option<u32>,
        export_password: Option<&SecretString>,
    ) -> PreflightResult<CertificateAuthority> {
        let _lock = self.lock();
        let config = self.config();
        let resolved = resolve_password(&config);
        let export_password = export_password.unwrap_or(resolved);

        let days = validity_days
            .filter(|days| *days > 0)
            .unwrap_or(config.default_validity_days);
        let validity = Duration::from_secs(u64::from(days) * SECONDS_PER_DAY);

        let material = CaKeyPairFactory::generate(organization, validity).map_err(Error::ca_creation)?;
        let keystore = KeyStore::seal(&material, CA_KEY_ALIAS, export_password).map_err(Error::ca_creation)?;
        self.generated
            .write(&Self::location(), &keystore, export_password, resolved)
            .map_err(Error::ca_creation)?;

        info!("Created CA for '{}', valid for {} days", organization, days);
        self.notify(CaChangedEvent::Created);

        Ok(CertificateAuthority::generated())
    }

    /// Imports a CA from one or more uploaded files.
    ///
    /// A part that contains a PEM certificate is read as PEM, anything else
    /// as a PKCS#12 keystore protected by the password. The parts are folded
    /// into a single CA entry in memory, later parts replacing earlier ones,
    /// and only written once all of them were read. If any part fails,
    /// nothing is written.
    pub fn upload(&self, password: Option<&SecretString>, parts: &[Vec<u8>]) -> PreflightEmptyResult {
        let _lock = self.lock();
        let config = self.config();

        let empty = SecretString::new(String::new());
        let upload_password = password.unwrap_or(&empty);

        let keystore = Self::fold_parts(upload_password, parts).inspect_err(|e| error!("CA upload failed: {}", e))?;

        self.generated
            .write(&Self::location(), &keystore, upload_password, resolve_password(&config))
            .map_err(Error::ca_creation)?;

        info!("Uploaded CA from {} part(s)", parts.len());
        self.notify(CaChangedEvent::Uploaded);

        Ok(())
    }

    fn fold_parts(password: &SecretString, parts: &[Vec<u8>]) -> PreflightResult<KeyStore> {
        let mut material: Option<CaKeyMaterial> = None;

        for (nr, part) in parts.iter().enumerate().map(|(i, part)| (i + 1, part)) {
            if part.is_empty() {
                return Err(Error::ca_creation(format!("part {} is empty", nr)));
            }

            let part_material = if PemCaReader::is_pem(part) {
                debug!("Reading uploaded part {} as PEM", nr);
                PemCaReader::parse(part, Some(password))
                    .map_err(|e| Error::ca_creation(format!("part {}: {}", nr, e)))?
            } else {
                debug!("Reading uploaded part {} as PKCS#12", nr);
                KeyStore::from_der(part.clone())
                    .open(password)
                    .map_err(|e| Error::ca_creation(format!("part {} is neither PEM nor a keystore: {}", nr, e)))?
            };
            material = Some(part_material);
        }

        let material = material.ok_or_else(|| Error::ca_creation("no files uploaded"))?;
        KeyStore::seal(&material, CA_KEY_ALIAS, password).map_err(Error::ca_creation)
    }

    /// Removes the CA from the keystore backend. Does nothing if there is
    /// none. An operator configured CA file is left alone.
    pub fn start_over(&self) -> PreflightEmptyResult {
        let _lock = self.lock();
        self.generated.delete(&Self::location())?;
        info!("Removed the generated CA");
        Ok(())
    }
}

//------------ Tests ---------------------------------------------------------
