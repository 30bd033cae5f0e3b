//! Various preflight-wide constants.

use crate::commons::storage::SegmentBuf;


//------------ Binary Names -------------------------------------------------

/// The friendly name of the `preflightctl` binary.
pub const PREFLIGHT_CLIENT_APP: &str = "Preflight Client";


//------------ Config Files Paths -------------------------------------------

/// The default path to the preflight config file.
pub const PREFLIGHT_DEFAULT_CONFIG_FILE: &str = "/etc/preflight.conf";


//------------ Environment Variables ----------------------------------------

/// The environment variable with the log level.
///
/// The variable should contain the name of a [`log::LevelFilter`]. It will
/// be overwritten by the config file. The default is “info.”
pub const PREFLIGHT_ENV_LOG_LEVEL: &str = "PREFLIGHT_LOG_LEVEL";

/// The environment variable with the shared password secret.
pub const PREFLIGHT_ENV_PASSWORD_SECRET: &str = "PREFLIGHT_PASSWORD_SECRET";


//------------ Certificate Authority ----------------------------------------

/// The alias of the single key entry in a CA keystore.
pub const CA_KEY_ALIAS: &str = "ca";

/// The location key of the generated CA keystore.
pub const CA_KEYSTORE_ID: &str = "certificate-authority";

/// Identity reported for a CA that comes from an operator supplied file.
pub const LOCAL_CA_IDENTITY: &str = "local CA";

/// Validity of a generated CA when no explicit value is given.
pub const DEFAULT_CA_VALIDITY_DAYS: u32 = 365;

/// Size of generated RSA keys, in bits.
pub const CA_KEY_SIZE: u32 = 2048;

/// The minimum length of the shared password secret.
pub const PASSWORD_SECRET_MIN_LEN: usize = 16;


//------------ Storage Namespaces -------------------------------------------

/// Namespace in the cluster store for keystore blobs.
pub const KEYSTORE_NS: &str = "keystores";

/// Namespace in the cluster store for node provisioning records.
pub const PROVISIONING_NS: &str = "provisioning";

/// Namespace in the cluster store for cluster-wide configuration objects.
pub const CLUSTER_CONFIG_NS: &str = "cluster_config";

/// File extension used for JSON values in the key-value store.
pub const JSON_SUFFIX: &str = ".json";

/// File extension used for PKCS#12 files.
pub const PKCS12_SUFFIX: &str = ".p12";

/// The key name of a provisioning record within its node's scope.
pub fn provisioning_record_name() -> SegmentBuf {
    SegmentBuf::parse_lossy("config.json")
}
