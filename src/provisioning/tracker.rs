//! A store that tracks the provisioning progress of each node.

use std::{collections::BTreeSet, sync::Arc, time::Duration};

use log::{debug, info};
use url::Url;

use crate::{
    commons::{
        PreflightEmptyResult, PreflightResult,
        error::Error,
        storage::{Key, KeyValueStore, Scope},
    },
    constants::{PROVISIONING_NS, provisioning_record_name},
    provisioning::{NodeId, NodeProvisioningRecord, PermissiveTransitions, ProvisioningState, TransitionPolicy},
};

//------------ NodeProvisioningTracker ---------------------------------------

/// Keeps one [`NodeProvisioningRecord`] per node.
///
/// # Key-value store usage
///
/// The tracker uses its own namespace, `"provisioning"`. Each node gets a
/// single segment scope named after its node id, holding one key
/// `config.json` with the record. Because locks are taken per scope,
/// updates for different nodes never wait for each other. Updates for the
/// same node are serialized, the last one wins.
pub struct NodeProvisioningTracker {
    store: KeyValueStore,
    policy: Arc<dyn TransitionPolicy>,
}

impl NodeProvisioningTracker {
    /// Creates a tracker that allows every state transition.
    pub fn create(storage_uri: &Url) -> PreflightResult<Self> {
        Self::create_with_policy(storage_uri, Arc::new(PermissiveTransitions))
    }

    pub fn create_with_policy(storage_uri: &Url, policy: Arc<dyn TransitionPolicy>) -> PreflightResult<Self> {
        let store = KeyValueStore::create(storage_uri, PROVISIONING_NS)?;
        Ok(NodeProvisioningTracker { store, policy })
    }

    fn scope(node_id: &NodeId) -> Scope {
        Scope::from_segment(node_id.as_segment().clone())
    }

    fn key(node_id: &NodeId) -> Key {
        Key::new_scoped(Self::scope(node_id), provisioning_record_name())
    }

    fn check_transition(
        &self,
        node_id: &NodeId,
        from: Option<ProvisioningState>,
        to: ProvisioningState,
    ) -> PreflightEmptyResult {
        if from == Some(to) || self.policy.allows(from, to) {
            Ok(())
        } else {
            Err(Error::IllegalTransition {
                node: node_id.clone(),
                from,
                to,
            })
        }
    }

    /// Loads the record for the node, lets `op` change it, and saves it,
    /// all while holding the lock for the node.
    fn update<F>(&self, node_id: &NodeId, op: F) -> PreflightEmptyResult
    where
        F: FnOnce(Option<NodeProvisioningRecord>) -> PreflightResult<NodeProvisioningRecord>,
    {
        let key = Self::key(node_id);
        self.store.execute(key.scope(), |kv| {
            let existing: Option<NodeProvisioningRecord> = kv.get_as(&key)?;
            let from = existing.as_ref().map(|record| record.state());

            let record = match op(existing) {
                Ok(record) => record,
                Err(e) => return Ok(Err(e)),
            };
            if let Err(e) = self.check_transition(node_id, from, record.state()) {
                return Ok(Err(e));
            }

            kv.store(&key, serde_json::to_value(&record)?)?;
            Ok(Ok(()))
        })?
    }
}

impl NodeProvisioningTracker {
    /// Returns a snapshot of all records, ordered by node id.
    pub fn stream_all(&self) -> PreflightResult<Vec<NodeProvisioningRecord>> {
        let mut records = Vec::new();
        for scope in self.store.scopes()? {
            if scope.segments().len() != 1 {
                continue;
            }
            let key = Key::new_scoped(scope, provisioning_record_name());
            // a concurrent delete may have removed the record in the meantime
            if let Some(record) = self.store.get::<NodeProvisioningRecord>(&key)? {
                records.push(record);
            }
        }
        records.sort_by(|a, b| a.node_id().cmp(b.node_id()));
        Ok(records)
    }

    pub fn get_config_for(&self, node_id: &NodeId) -> PreflightResult<Option<NodeProvisioningRecord>> {
        self.store.get(&Self::key(node_id)).map_err(Error::from)
    }

    /// Saves the record, replacing any existing record for the node as a
    /// whole.
    pub fn save(&self, record: &NodeProvisioningRecord) -> PreflightEmptyResult {
        debug!("Saving provisioning record for node '{}'", record.node_id());
        self.update(record.node_id(), |_| Ok(record.clone()))
    }

    /// Sets the state of the node, creating a record if there is none.
    ///
    /// Leaving the error state drops the error message.
    pub fn change_state(&self, node_id: &NodeId, state: ProvisioningState) -> PreflightEmptyResult {
        debug!("Node '{}' moves to state {}", node_id, state);
        self.update(node_id, |existing| {
            let record = existing.unwrap_or_else(|| NodeProvisioningRecord::new(node_id.clone()));
            Ok(record.with_state(state))
        })
    }

    /// Replaces the alternative names and validity of the node, keeping its
    /// state. Creates a record in state `NEW` if there is none.
    pub fn set_parameters(
        &self,
        node_id: &NodeId,
        alt_names: BTreeSet<String>,
        validity: Option<Duration>,
    ) -> PreflightEmptyResult {
        debug!("Setting certificate parameters for node '{}'", node_id);
        self.update(node_id, |existing| {
            let record = existing.unwrap_or_else(|| NodeProvisioningRecord::new(node_id.clone()));
            Ok(record.with_parameters(alt_names, validity))
        })
    }

    /// Puts the node in the error state with the given message.
    pub fn set_error(&self, node_id: &NodeId, message: impl Into<String>) -> PreflightEmptyResult {
        let message = message.into();
        info!("Node '{}' failed provisioning: {}", node_id, message);
        self.update(node_id, |existing| {
            let mut record = existing.unwrap_or_else(|| NodeProvisioningRecord::new(node_id.clone()));
            record.set_error(message);
            Ok(record)
        })
    }

    /// Removes the record of the node. Does nothing if there is none.
    pub fn delete(&self, node_id: &NodeId) -> PreflightEmptyResult {
        debug!("Removing provisioning record for node '{}'", node_id);
        self.store.drop_scope(&Self::scope(node_id)).map_err(Error::from)
    }

    /// Removes all records.
    pub fn delete_all(&self) -> PreflightEmptyResult {
        info!("Removing all node provisioning records");
        self.store.wipe().map_err(Error::from)
    }
}

//------------ Tests ---------------------------------------------------------
