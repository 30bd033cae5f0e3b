use std::{
    env, fmt, fs, io,
    path::{Path, PathBuf},
    str::FromStr,
};

use log::{LevelFilter, error};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, de};
#[cfg(unix)]
use syslog::Facility;
use url::Url;

use crate::{
    ca::CaConfig,
    commons::util::ext_serde,
    constants::{
        DEFAULT_CA_VALIDITY_DAYS, PASSWORD_SECRET_MIN_LEN, PREFLIGHT_ENV_LOG_LEVEL, PREFLIGHT_ENV_PASSWORD_SECRET,
    },
    preflight::{StaticNode, StaticNodeDirectory},
};

//------------ ConfigDefaults ------------------------------------------------

pub struct ConfigDefaults;

impl ConfigDefaults {
    fn data_dir() -> PathBuf {
        PathBuf::from("./data")
    }

    fn ca_keystore_storage() -> CaKeystoreStorage {
        CaKeystoreStorage::Cluster
    }

    fn keystore_dir() -> PathBuf {
        PathBuf::from("./data/keystores")
    }

    fn password_secret() -> SecretString {
        SecretString::new(env::var(PREFLIGHT_ENV_PASSWORD_SECRET).unwrap_or_default())
    }

    fn default_ca_validity_days() -> u32 {
        DEFAULT_CA_VALIDITY_DAYS
    }

    pub fn log_level() -> LevelFilter {
        match env::var(PREFLIGHT_ENV_LOG_LEVEL) {
            Ok(level) => match LevelFilter::from_str(&level) {
                Ok(level) => level,
                Err(_) => {
                    eprintln!(
                        "Unrecognized value for log level in env var {}, using 'info'",
                        PREFLIGHT_ENV_LOG_LEVEL
                    );
                    LevelFilter::Info
                }
            },
            _ => LevelFilter::Info,
        }
    }

    fn log_type() -> LogType {
        LogType::File
    }

    fn log_file() -> PathBuf {
        PathBuf::from("./preflight.log")
    }

    fn syslog_facility() -> String {
        "daemon".to_string()
    }
}

//------------ Config --------------------------------------------------------

/// Global configuration for preflight.
///
/// The storage URI selects the cluster store: `local://path` keeps data on
/// disk, `memory://name` keeps it in this process only. Without one, data
/// is kept on disk in the data directory.
#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    #[serde(default = "ConfigDefaults::data_dir")]
    pub data_dir: PathBuf,

    #[serde(default)]
    storage_uri: Option<Url>,

    /// Where a generated or uploaded CA is kept.
    #[serde(default = "ConfigDefaults::ca_keystore_storage")]
    pub ca_keystore_storage: CaKeystoreStorage,

    #[serde(default = "ConfigDefaults::keystore_dir")]
    pub keystore_dir: PathBuf,

    /// A CA keystore supplied by the operator. Takes precedence over any
    /// generated CA while the file exists.
    #[serde(default)]
    pub ca_keystore_file: Option<PathBuf>,

    #[serde(default)]
    pub ca_password: Option<SecretString>,

    #[serde(default = "ConfigDefaults::password_secret")]
    pub password_secret: SecretString,

    #[serde(default = "ConfigDefaults::default_ca_validity_days")]
    pub default_ca_validity_days: u32,

    #[serde(default = "ConfigDefaults::log_level", deserialize_with = "ext_serde::de_level_filter")]
    log_level: LevelFilter,

    #[serde(default = "ConfigDefaults::log_type")]
    log_type: LogType,

    #[serde(default = "ConfigDefaults::log_file")]
    log_file: PathBuf,

    #[serde(default = "ConfigDefaults::syslog_facility")]
    syslog_facility: String,

    /// The nodes of the cluster, for a static node directory.
    #[serde(default)]
    pub nodes: Vec<StaticNode>,
}

/// # Accessors
impl Config {
    /// The part of the configuration used by the CA manager.
    pub fn ca_config(&self) -> CaConfig {
        CaConfig {
            ca_keystore_file: self.ca_keystore_file.clone(),
            ca_password: self.ca_password.clone(),
            password_secret: self.password_secret.clone(),
            default_validity_days: self.default_ca_validity_days,
        }
    }

    /// The location of the cluster store.
    pub fn storage_uri(&self) -> Result<Url, ConfigError> {
        match &self.storage_uri {
            Some(uri) => Ok(uri.clone()),
            None => Url::parse(&format!("local://{}/", self.data_dir.to_string_lossy()))
                .map_err(|e| ConfigError::Other(format!("Invalid data_dir '{}': {}", self.data_dir.display(), e))),
        }
    }

    pub fn node_directory(&self) -> StaticNodeDirectory {
        StaticNodeDirectory::new(self.nodes.clone())
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn set_log_type(&mut self, log_type: LogType) {
        self.log_type = log_type;
    }
}

/// # Create
impl Config {
    /// Reads and verifies the config file.
    pub fn create(config_file: &Path) -> Result<Self, ConfigError> {
        let config = Self::read_config(config_file).map_err(|e| {
            ConfigError::Other(format!(
                "Error parsing config file: {}, error: {}",
                config_file.display(),
                e
            ))
        })?;
        config.verify().map_err(|e| {
            ConfigError::Other(format!(
                "Error parsing config file: {}, error: {}",
                config_file.display(),
                e
            ))
        })?;
        Ok(config)
    }

    pub fn read_config(file: &Path) -> Result<Self, ConfigError> {
        let s = fs::read_to_string(file)?;
        Self::parse_str(&s)
    }

    pub fn parse_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(ConfigError::TomlError)
    }

    pub fn verify(&self) -> Result<(), ConfigError> {
        if self.password_secret.expose_secret().chars().count() < PASSWORD_SECRET_MIN_LEN {
            return Err(ConfigError::Other(format!(
                "password_secret must be at least {} characters, set it in the config file or in the {} environment variable",
                PASSWORD_SECRET_MIN_LEN, PREFLIGHT_ENV_PASSWORD_SECRET
            )));
        }

        if self.default_ca_validity_days == 0 {
            return Err(ConfigError::other("default_ca_validity_days must be at least 1"));
        }

        match self.storage_uri()?.scheme() {
            "local" | "memory" => {}
            other => {
                return Err(ConfigError::Other(format!(
                    "Unsupported storage_uri scheme '{}', use 'local' or 'memory'",
                    other
                )));
            }
        }

        Ok(())
    }
}

/// # Logging
impl Config {
    pub fn init_logging(&self) -> Result<(), ConfigError> {
        match self.log_type {
            LogType::File => self.file_logger(&self.log_file),
            LogType::Stderr => self.stderr_logger(),
            LogType::Syslog => self.syslog_logger(),
        }
    }

    /// Creates a stderr logger.
    fn stderr_logger(&self) -> Result<(), ConfigError> {
        self.fern_logger()
            .chain(io::stderr())
            .apply()
            .map_err(|e| ConfigError::Other(format!("Failed to init stderr logging: {}", e)))
    }

    /// Creates a file logger using the file provided by `path`.
    fn file_logger(&self, path: &Path) -> Result<(), ConfigError> {
        let file = match fern::log_file(path) {
            Ok(file) => file,
            Err(err) => {
                let error_string = format!("Failed to open log file '{}': {}", path.display(), err);
                error!("{}", error_string.as_str());
                return Err(ConfigError::Other(error_string));
            }
        };
        self.fern_logger()
            .chain(file)
            .apply()
            .map_err(|e| ConfigError::Other(format!("Failed to init file logging: {}", e)))
    }

    /// Creates a syslog logger and configures correctly.
    #[cfg(unix)]
    fn syslog_logger(&self) -> Result<(), ConfigError> {
        let facility =
            Facility::from_str(&self.syslog_facility).map_err(|_| ConfigError::other("Invalid syslog_facility"))?;
        let process = env::current_exe()
            .ok()
            .and_then(|path| {
                path.file_name()
                    .and_then(std::ffi::OsStr::to_str)
                    .map(ToString::to_string)
            })
            .unwrap_or_else(|| String::from("preflight"));
        let formatter = syslog::Formatter3164 {
            facility,
            hostname: None,
            process,
            pid: std::process::id(),
        };
        let logger = syslog::unix(formatter.clone())
            .or_else(|_| syslog::tcp(formatter.clone(), ("127.0.0.1", 601)))
            .or_else(|_| syslog::udp(formatter, ("127.0.0.1", 0), ("127.0.0.1", 514)));
        match logger {
            Ok(logger) => self
                .fern_logger()
                .chain(logger)
                .apply()
                .map_err(|e| ConfigError::Other(format!("Failed to init syslog: {}", e))),
            Err(err) => Err(ConfigError::Other(format!("Cannot connect to syslog: {}", err))),
        }
    }

    #[cfg(not(unix))]
    fn syslog_logger(&self) -> Result<(), ConfigError> {
        Err(ConfigError::other("syslog is only supported on unix"))
    }

    /// Creates and returns a fern logger with log level tweaks
    fn fern_logger(&self) -> fern::Dispatch {
        // the storage layer logs every access at trace level
        let storage_level = self.log_level.min(LevelFilter::Debug);

        let show_target = self.log_level == LevelFilter::Trace || self.log_level == LevelFilter::Debug;
        fern::Dispatch::new()
            .format(move |out, message, record| {
                if show_target {
                    out.finish(format_args!(
                        "{} [{}] [{}] {}",
                        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                        record.level(),
                        record.target(),
                        message
                    ))
                } else {
                    out.finish(format_args!(
                        "{} [{}] {}",
                        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                        record.level(),
                        message
                    ))
                }
            })
            .level(self.log_level)
            .level_for("preflight::commons::storage", storage_level)
            .level_for("preflight::keystore", storage_level)
    }
}

//------------ ConfigError ---------------------------------------------------

#[derive(Debug)]
pub enum ConfigError {
    IoError(io::Error),
    TomlError(toml::de::Error),
    Other(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => e.fmt(f),
            ConfigError::TomlError(e) => e.fmt(f),
            ConfigError::Other(s) => s.fmt(f),
        }
    }
}

impl std::error::Error for ConfigError {}

impl ConfigError {
    pub fn other(s: &str) -> ConfigError {
        ConfigError::Other(s.to_string())
    }
}

impl From<io::Error> for ConfigError {
    fn from(e: io::Error) -> Self {
        ConfigError::IoError(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::TomlError(e)
    }
}

//------------ LogType -------------------------------------------------------

/// The target to log to.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LogType {
    Stderr,
    File,
    Syslog,
}

impl<'de> Deserialize<'de> for LogType {
    fn deserialize<D>(d: D) -> Result<LogType, D::Error>
    where
        D: Deserializer<'de>,
    {
        let string = String::deserialize(d)?;
        match string.as_str() {
            "stderr" => Ok(LogType::Stderr),
            "file" => Ok(LogType::File),
            "syslog" => Ok(LogType::Syslog),
            _ => Err(de::Error::custom(format!(
                "expected \"stderr\", \"file\" or \"syslog\", found : \"{}\"",
                string
            ))),
        }
    }
}

//------------ CaKeystoreStorage ---------------------------------------------

/// The backend that keeps the generated CA.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CaKeystoreStorage {
    /// The `keystores` namespace of the cluster store.
    Cluster,
    /// A PKCS#12 file in the keystore directory.
    File,
}

impl<'de> Deserialize<'de> for CaKeystoreStorage {
    fn deserialize<D>(d: D) -> Result<CaKeystoreStorage, D::Error>
    where
        D: Deserializer<'de>,
    {
        let string = String::deserialize(d)?;
        match string.as_str() {
            "cluster" => Ok(CaKeystoreStorage::Cluster),
            "file" => Ok(CaKeystoreStorage::File),
            _ => Err(de::Error::custom(format!(
                "expected \"cluster\" or \"file\", found : \"{}\"",
                string
            ))),
        }
    }
}

//------------ Tests ---------------------------------------------------------
