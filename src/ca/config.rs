use std::path::PathBuf;

use secrecy::SecretString;

use crate::constants::DEFAULT_CA_VALIDITY_DAYS;

//------------ CaConfig ------------------------------------------------------

/// The part of the configuration the CA manager works with.
#[derive(Clone, Debug)]
pub struct CaConfig {
    /// A PKCS#12 file with a CA supplied by the operator.
    pub ca_keystore_file: Option<PathBuf>,

    /// The password of the CA keystores, if the operator set one.
    pub ca_password: Option<SecretString>,

    /// The shared secret of the cluster.
    pub password_secret: SecretString,

    /// Used when a CA is created without a validity.
    pub default_validity_days: u32,
}

impl CaConfig {
    pub fn new(password_secret: SecretString) -> Self {
        CaConfig {
            ca_keystore_file: None,
            ca_password: None,
            password_secret,
            default_validity_days: DEFAULT_CA_VALIDITY_DAYS,
        }
    }

    pub fn with_ca_password(mut self, password: SecretString) -> Self {
        self.ca_password = Some(password);
        self
    }

    pub fn with_ca_keystore_file(mut self, path: PathBuf) -> Self {
        self.ca_keystore_file = Some(path);
        self
    }

    /// Returns whether an operator supplied CA file is configured and
    /// present on disk.
    pub fn configured_ca_exists(&self) -> bool {
        self.ca_keystore_file.as_ref().map(|path| path.is_file()).unwrap_or(false)
    }
}

/// Returns the password that protects the CA keystores.
///
/// An explicitly configured CA password wins, otherwise it is the shared
/// secret of the cluster. Only ever one of the two is used, a keystore
/// protected by the other one will not open.
pub fn resolve_password(config: &CaConfig) -> &SecretString {
    config.ca_password.as_ref().unwrap_or(&config.password_secret)
}
