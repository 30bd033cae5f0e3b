//! Drives the provisioning of the cluster nodes.
//!
//! [`Preflight`] brings the CA manager, the provisioning tracker, the node
//! directory and the cluster configuration together behind the operations
//! an operator uses before the cluster goes live.
use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
    time::Duration,
};

use log::{debug, info};
use serde::Serialize;

use crate::{
    ca::{CaChangeListener, CaManager},
    commons::{PreflightEmptyResult, PreflightResult, error::Error},
    config::{CaKeystoreStorage, Config},
    keystore::{KeystoreClusterStorage, KeystoreFileStorage, KeystoreStorage},
    provisioning::{NodeId, NodeProvisioningTracker, ProvisioningState},
};

mod clusterconfig;
pub use self::clusterconfig::{
    ClusterConfigService, ClusterConfigType, KvClusterConfig, RenewalMode, RenewalPolicy,
};

mod directory;
pub use self::directory::{NodeDirectory, NodeInfo, NodeStatus, StaticNode, StaticNodeDirectory};

//------------ NodeOverview --------------------------------------------------

/// An active node together with its provisioning progress.
///
/// `state` is `None` for a node preflight never heard of.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct NodeOverview {
    pub node_id: NodeId,
    pub transport_address: String,
    pub state: Option<ProvisioningState>,
    pub error_message: Option<String>,
    pub hostname: String,
    pub short_id: String,
    pub live_status: NodeStatus,
}

//------------ Preflight -----------------------------------------------------

pub struct Preflight {
    ca_manager: Arc<CaManager>,
    tracker: NodeProvisioningTracker,
    directory: Arc<dyn NodeDirectory>,
    cluster_config: Arc<dyn ClusterConfigService>,
}

impl Preflight {
    pub fn new(
        ca_manager: Arc<CaManager>,
        tracker: NodeProvisioningTracker,
        directory: Arc<dyn NodeDirectory>,
        cluster_config: Arc<dyn ClusterConfigService>,
    ) -> Self {
        Preflight {
            ca_manager,
            tracker,
            directory,
            cluster_config,
        }
    }

    /// Sets up all components as configured, using the nodes listed in the
    /// configuration.
    pub fn build(config: &Config, listener: Arc<dyn CaChangeListener>) -> PreflightResult<Self> {
        let storage_uri = config.storage_uri().map_err(Error::custom)?;

        let generated: Arc<dyn KeystoreStorage> = match config.ca_keystore_storage {
            CaKeystoreStorage::Cluster => Arc::new(KeystoreClusterStorage::new(&storage_uri)?),
            CaKeystoreStorage::File => Arc::new(KeystoreFileStorage::new(&config.keystore_dir)),
        };
        let local = KeystoreFileStorage::new(&config.keystore_dir);
        let ca_manager = CaManager::new(config.ca_config(), generated, local, listener);

        let tracker = NodeProvisioningTracker::create(&storage_uri)?;
        let cluster_config = KvClusterConfig::create(&storage_uri)?;

        info!("Using cluster store at {}", storage_uri);

        Ok(Preflight::new(
            Arc::new(ca_manager),
            tracker,
            Arc::new(config.node_directory()),
            Arc::new(cluster_config),
        ))
    }

    pub fn ca_manager(&self) -> &CaManager {
        &self.ca_manager
    }

    pub fn tracker(&self) -> &NodeProvisioningTracker {
        &self.tracker
    }
}

/// # Nodes
impl Preflight {
    /// Lists all active nodes with their provisioning state, if any.
    ///
    /// Records of nodes that are not active are left out.
    pub fn list_nodes(&self) -> PreflightResult<Vec<NodeOverview>> {
        let active = self.directory.list_active_nodes()?;
        let mut records: HashMap<NodeId, _> = self
            .tracker
            .stream_all()?
            .into_iter()
            .map(|record| (record.node_id().clone(), record))
            .collect();

        Ok(active
            .into_iter()
            .map(|(node_id, info)| {
                let record = records.remove(&node_id);
                NodeOverview {
                    state: record.as_ref().map(|r| r.state()),
                    error_message: record.as_ref().and_then(|r| r.error_message().map(str::to_string)),
                    node_id,
                    transport_address: info.transport_address,
                    hostname: info.hostname,
                    short_id: info.short_id,
                    live_status: info.live_status,
                }
            })
            .collect())
    }

    /// Marks every active node as configured, creating records where
    /// needed.
    pub fn generate(&self) -> PreflightEmptyResult {
        let active = self.directory.list_active_nodes()?;
        for node_id in active.keys() {
            self.tracker.change_state(node_id, ProvisioningState::Configured)?;
        }
        info!("Marked {} node(s) as configured", active.len());
        Ok(())
    }

    /// Sets the alternative names and certificate validity for a node.
    ///
    /// Replaces earlier values as a whole and keeps the state of the node.
    pub fn add_parameters(
        &self,
        node_id: &NodeId,
        alt_names: BTreeSet<String>,
        validity: Option<Duration>,
    ) -> PreflightEmptyResult {
        debug!("Node '{}' gets alternative names: {:?}", node_id, alt_names);
        self.tracker.set_parameters(node_id, alt_names, validity)
    }

    /// Forgets a single node. The CA is not touched.
    pub fn reset_node(&self, node_id: &NodeId) -> PreflightEmptyResult {
        self.tracker.delete(node_id)?;
        info!("Reset provisioning of node '{}'", node_id);
        Ok(())
    }

    /// Starts over completely.
    ///
    /// Removes the CA first, so that no node can be seen as configured
    /// against a CA that is gone, then the renewal policy, then all node
    /// records.
    pub fn full_reset(&self) -> PreflightEmptyResult {
        self.ca_manager.start_over()?;
        self.cluster_config.remove(RenewalPolicy::CONFIG_TYPE)?;
        self.tracker.delete_all()?;
        info!("Preflight was reset");
        Ok(())
    }
}

//------------ Tests ---------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use secrecy::SecretString;

    use super::*;
    use crate::{
        ca::{CaConfig, NoopListener},
        test,
    };

    fn node(id: &str) -> NodeId {
        NodeId::parse(id).unwrap()
    }

    fn info(address: &str) -> NodeInfo {
        NodeInfo {
            transport_address: address.to_string(),
            hostname: address.to_string(),
            short_id: address.to_string(),
            live_status: NodeStatus::Available,
        }
    }

    /// Remembers the order of removals, to check the reset sequence.
    #[derive(Default)]
    struct RecordingConfig {
        removed: Mutex<Vec<String>>,
    }

    impl ClusterConfigService for RecordingConfig {
        fn remove(&self, config_type: &str) -> PreflightEmptyResult {
            self.removed.lock().unwrap().push(config_type.to_string());
            Ok(())
        }
    }

    fn preflight(
        dir: &std::path::Path,
        directory: StaticNodeDirectory,
        cluster_config: Arc<dyn ClusterConfigService>,
    ) -> Preflight {
        let storage_uri = test::mem_storage();
        let ca_config = CaConfig::new(SecretString::new("a-shared-secret-of-some-length".to_string()));
        let ca_manager = CaManager::new(
            ca_config,
            Arc::new(KeystoreClusterStorage::new(&storage_uri).unwrap()),
            KeystoreFileStorage::new(dir),
            Arc::new(NoopListener),
        );
        let tracker = NodeProvisioningTracker::create(&storage_uri).unwrap();
        Preflight::new(Arc::new(ca_manager), tracker, Arc::new(directory), cluster_config)
    }

    #[test]
    fn list_nodes_left_joins_records() {
        test::test_under_tmp(|dir| {
            let directory = StaticNodeDirectory::default()
                .with_node(node("a"), info("a:9300"))
                .with_node(node("b"), info("b:9300"));
            let preflight = preflight(&dir, directory, Arc::new(RecordingConfig::default()));

            preflight.tracker().set_error(&node("b"), "no route").unwrap();
            preflight.tracker().change_state(&node("gone"), ProvisioningState::New).unwrap();

            let nodes = preflight.list_nodes().unwrap();
            assert_eq!(nodes.len(), 2);
            assert_eq!(nodes[0].node_id, node("a"));
            assert_eq!(nodes[0].state, None);
            assert_eq!(nodes[0].transport_address, "a:9300");
            assert_eq!(nodes[1].state, Some(ProvisioningState::Error));
            assert_eq!(nodes[1].error_message.as_deref(), Some("no route"));
        })
    }

    #[test]
    fn generate_configures_all_active_nodes() {
        test::test_under_tmp(|dir| {
            let directory = StaticNodeDirectory::default()
                .with_node(node("a"), info("a:9300"))
                .with_node(node("b"), info("b:9300"));
            let preflight = preflight(&dir, directory, Arc::new(RecordingConfig::default()));
            preflight.tracker().change_state(&node("a"), ProvisioningState::Signed).unwrap();

            preflight.generate().unwrap();
            for id in ["a", "b"] {
                let record = preflight.tracker().get_config_for(&node(id)).unwrap().unwrap();
                assert_eq!(record.state(), ProvisioningState::Configured);
            }
        })
    }

    #[test]
    fn add_parameters_replaces_and_keeps_state() {
        test::test_under_tmp(|dir| {
            let preflight = preflight(&dir, StaticNodeDirectory::default(), Arc::new(RecordingConfig::default()));
            let node_1 = node("node-1");
            let days_30 = Some(Duration::from_secs(30 * 24 * 3600));

            preflight
                .add_parameters(&node_1, ["10.0.0.1".to_string()].into(), days_30)
                .unwrap();
            preflight.tracker().change_state(&node_1, ProvisioningState::Csr).unwrap();
            preflight
                .add_parameters(&node_1, ["10.0.0.2".to_string()].into(), days_30)
                .unwrap();

            let record = preflight.tracker().get_config_for(&node_1).unwrap().unwrap();
            assert_eq!(record.state(), ProvisioningState::Csr);
            assert_eq!(record.alt_names(), &BTreeSet::from(["10.0.0.2".to_string()]));
            assert_eq!(record.validity(), days_30);
        })
    }

    #[test]
    fn full_reset_removes_ca_policy_and_records() {
        test::test_under_tmp(|dir| {
            let recording = Arc::new(RecordingConfig::default());
            let preflight = preflight(&dir, StaticNodeDirectory::default(), recording.clone());

            preflight.ca_manager().create("Acme", None, None).unwrap();
            preflight.add_parameters(&node("node-1"), BTreeSet::new(), None).unwrap();

            preflight.full_reset().unwrap();
            assert!(preflight.ca_manager().get().unwrap_err().is_not_found());
            assert_eq!(preflight.tracker().get_config_for(&node("node-1")).unwrap(), None);
            assert_eq!(*recording.removed.lock().unwrap(), vec!["renewal_policy".to_string()]);

            // nothing left to reset
            preflight.full_reset().unwrap();
        })
    }

    #[test]
    fn reset_node_keeps_ca_and_other_nodes() {
        test::test_under_tmp(|dir| {
            let preflight = preflight(&dir, StaticNodeDirectory::default(), Arc::new(RecordingConfig::default()));
            preflight.ca_manager().create("Acme", None, None).unwrap();
            preflight.tracker().change_state(&node("a"), ProvisioningState::New).unwrap();
            preflight.tracker().change_state(&node("b"), ProvisioningState::New).unwrap();

            preflight.reset_node(&node("a")).unwrap();
            assert!(preflight.ca_manager().get().is_ok());
            assert_eq!(preflight.tracker().get_config_for(&node("a")).unwrap(), None);
            assert!(preflight.tracker().get_config_for(&node("b")).unwrap().is_some());
        })
    }
}
