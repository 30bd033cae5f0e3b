//! Cluster-wide configuration objects.
use std::{fmt, time::Duration};

use log::debug;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use url::Url;

use crate::{
    commons::{
        PreflightEmptyResult, PreflightResult,
        error::Error,
        storage::{Key, KeyValueStore, SegmentBuf},
        util::ext_serde,
    },
    constants::{CLUSTER_CONFIG_NS, JSON_SUFFIX},
};

//------------ ClusterConfigType ---------------------------------------------

/// A configuration object that is kept once for the whole cluster.
pub trait ClusterConfigType: Serialize + DeserializeOwned {
    /// The name the object is stored under.
    const CONFIG_TYPE: &'static str;
}

//------------ ClusterConfigService ------------------------------------------

/// Removes cluster-wide configuration objects.
pub trait ClusterConfigService: Send + Sync {
    /// Removes the object of the given type. Removing an absent object is
    /// not an error.
    fn remove(&self, config_type: &str) -> PreflightEmptyResult;
}

//------------ RenewalPolicy -------------------------------------------------

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RenewalMode {
    Automatic,
    Manual,
}

impl fmt::Display for RenewalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenewalMode::Automatic => write!(f, "AUTOMATIC"),
            RenewalMode::Manual => write!(f, "MANUAL"),
        }
    }
}

/// How node certificates are renewed once the cluster is live.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct RenewalPolicy {
    pub mode: RenewalMode,

    #[serde(serialize_with = "ext_serde::ser_duration", deserialize_with = "ext_serde::de_duration")]
    pub certificate_lifetime: Duration,
}

impl ClusterConfigType for RenewalPolicy {
    const CONFIG_TYPE: &'static str = "renewal_policy";
}

//------------ KvClusterConfig -----------------------------------------------

/// Keeps cluster configuration objects in the cluster key-value store, one
/// global key per type.
#[derive(Debug)]
pub struct KvClusterConfig {
    store: KeyValueStore,
}

impl KvClusterConfig {
    pub fn create(storage_uri: &Url) -> PreflightResult<Self> {
        let store = KeyValueStore::create(storage_uri, CLUSTER_CONFIG_NS)?;
        Ok(KvClusterConfig { store })
    }

    fn key(config_type: &str) -> Key {
        Key::new_global(SegmentBuf::parse_lossy(config_type).with_suffix(JSON_SUFFIX))
    }

    pub fn write<T: ClusterConfigType>(&self, config: &T) -> PreflightEmptyResult {
        debug!("Writing cluster config '{}'", T::CONFIG_TYPE);
        self.store.store(&Self::key(T::CONFIG_TYPE), config).map_err(Error::from)
    }

    pub fn get<T: ClusterConfigType>(&self) -> PreflightResult<Option<T>> {
        self.store.get(&Self::key(T::CONFIG_TYPE)).map_err(Error::from)
    }
}

impl ClusterConfigService for KvClusterConfig {
    fn remove(&self, config_type: &str) -> PreflightEmptyResult {
        if self.store.drop_key_if_exists(&Self::key(config_type))? {
            debug!("Removed cluster config '{}'", config_type);
        }
        Ok(())
    }
}
