use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::{commons::PreflightResult, provisioning::NodeId};

//------------ NodeStatus ----------------------------------------------------

/// The liveness of a node as reported by the node directory.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeStatus {
    Starting,
    Prepared,
    #[default]
    Available,
    Unavailable,
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeStatus::Starting => "STARTING",
            NodeStatus::Prepared => "PREPARED",
            NodeStatus::Available => "AVAILABLE",
            NodeStatus::Unavailable => "UNAVAILABLE",
        };
        s.fmt(f)
    }
}

//------------ NodeInfo ------------------------------------------------------

/// What the node directory knows about an active node.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct NodeInfo {
    pub transport_address: String,
    pub hostname: String,
    pub short_id: String,
    #[serde(default)]
    pub live_status: NodeStatus,
}

//------------ NodeDirectory -------------------------------------------------

/// Lists the nodes that currently take part in the cluster.
pub trait NodeDirectory: Send + Sync {
    fn list_active_nodes(&self) -> PreflightResult<BTreeMap<NodeId, NodeInfo>>;
}

//------------ StaticNode ----------------------------------------------------

/// A node as it is listed in the `[[nodes]]` tables of the config file.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct StaticNode {
    pub node_id: NodeId,
    pub transport_address: String,

    #[serde(default)]
    pub hostname: Option<String>,

    #[serde(default)]
    pub short_id: Option<String>,
}

impl StaticNode {
    fn into_entry(self) -> (NodeId, NodeInfo) {
        let hostname = self.hostname.unwrap_or_else(|| host_part(&self.transport_address));
        let short_id = self
            .short_id
            .unwrap_or_else(|| self.node_id.as_str().chars().take(8).collect());
        let info = NodeInfo {
            transport_address: self.transport_address,
            hostname,
            short_id,
            live_status: NodeStatus::Available,
        };
        (self.node_id, info)
    }
}

/// Takes the host out of an address like `https://host:9200/`. Addresses
/// without a scheme, like `host:9300`, are read as `tcp://host:9300`.
fn host_part(address: &str) -> String {
    Url::parse(address)
        .ok()
        .filter(Url::has_host)
        .or_else(|| Url::parse(&format!("tcp://{}", address)).ok())
        .and_then(|url| url.host_str().map(str::to_string))
        .unwrap_or_else(|| address.to_string())
}

//------------ StaticNodeDirectory -------------------------------------------

/// A node directory with a fixed set of nodes.
#[derive(Clone, Debug, Default)]
pub struct StaticNodeDirectory {
    nodes: BTreeMap<NodeId, NodeInfo>,
}

impl StaticNodeDirectory {
    pub fn new(nodes: Vec<StaticNode>) -> Self {
        StaticNodeDirectory {
            nodes: nodes.into_iter().map(StaticNode::into_entry).collect(),
        }
    }

    pub fn with_node(mut self, node_id: NodeId, info: NodeInfo) -> Self {
        self.nodes.insert(node_id, info);
        self
    }
}

impl NodeDirectory for StaticNodeDirectory {
    fn list_active_nodes(&self) -> PreflightResult<BTreeMap<NodeId, NodeInfo>> {
        Ok(self.nodes.clone())
    }
}
