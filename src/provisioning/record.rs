use std::{collections::BTreeSet, fmt, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};

use crate::commons::{
    error::Error,
    storage::{ParseSegmentError, SegmentBuf},
    util::ext_serde,
};

//------------ NodeId --------------------------------------------------------

/// Identifies a cluster node.
///
/// Node ids are used as storage scopes, so they must be non-empty, must not
/// contain a `/` and must not start or end with whitespace. They must not
/// start with a `.` either, the disk store keeps its lock files under such
/// names.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeId(SegmentBuf);

impl NodeId {
    pub fn parse(id: &str) -> Result<Self, Error> {
        if id.starts_with('.') {
            return Err(Error::InvalidNodeId(format!("{}: node ids must not start with '.'", id)));
        }
        SegmentBuf::parse(id)
            .map(NodeId)
            .map_err(|e: ParseSegmentError| Error::InvalidNodeId(format!("{}: {}", id, e)))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn as_segment(&self) -> &SegmentBuf {
        &self.0
    }
}

impl FromStr for NodeId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for NodeId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<NodeId> for String {
    fn from(node_id: NodeId) -> Self {
        node_id.0.into()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

//------------ ProvisioningState ---------------------------------------------

/// How far a node got in obtaining its TLS identity.
///
/// A node without a record has not been seen at all, which is different
/// from a node in state `New`.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProvisioningState {
    New,
    /// A certificate signing request was issued.
    Csr,
    Signed,
    Configured,
    Error,
}

impl ProvisioningState {
    pub fn as_str(self) -> &'static str {
        match self {
            ProvisioningState::New => "NEW",
            ProvisioningState::Csr => "CSR",
            ProvisioningState::Signed => "SIGNED",
            ProvisioningState::Configured => "CONFIGURED",
            ProvisioningState::Error => "ERROR",
        }
    }

    /// Configured nodes are done, nothing moves them on except a reset.
    pub fn is_terminal(self) -> bool {
        matches!(self, ProvisioningState::Configured)
    }
}

impl fmt::Display for ProvisioningState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_str().fmt(f)
    }
}

impl FromStr for ProvisioningState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "NEW" => Ok(ProvisioningState::New),
            "CSR" => Ok(ProvisioningState::Csr),
            "SIGNED" => Ok(ProvisioningState::Signed),
            "CONFIGURED" => Ok(ProvisioningState::Configured),
            "ERROR" => Ok(ProvisioningState::Error),
            _ => Err(Error::custom(format!("Unknown provisioning state: {}", s))),
        }
    }
}

//------------ NodeProvisioningRecord ----------------------------------------

/// The provisioning progress and certificate parameters of one node.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct NodeProvisioningRecord {
    node_id: NodeId,
    state: ProvisioningState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
    #[serde(default)]
    alt_names: BTreeSet<String>,
    #[serde(
        default,
        serialize_with = "ext_serde::ser_duration_opt",
        deserialize_with = "ext_serde::de_duration_opt"
    )]
    validity: Option<Duration>,
}

impl NodeProvisioningRecord {
    /// Creates a record in state `New` without certificate parameters.
    pub fn new(node_id: NodeId) -> Self {
        NodeProvisioningRecord {
            node_id,
            state: ProvisioningState::New,
            error_message: None,
            alt_names: BTreeSet::new(),
            validity: None,
        }
    }

    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    pub fn state(&self) -> ProvisioningState {
        self.state
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn alt_names(&self) -> &BTreeSet<String> {
        &self.alt_names
    }

    pub fn validity(&self) -> Option<Duration> {
        self.validity
    }

    /// Sets the state. Any state other than `Error` clears the error
    /// message.
    pub fn set_state(&mut self, state: ProvisioningState) {
        self.state = state;
        if state != ProvisioningState::Error {
            self.error_message = None;
        }
    }

    pub fn set_error(&mut self, message: String) {
        self.state = ProvisioningState::Error;
        self.error_message = Some(message);
    }

    /// Replaces the certificate parameters.
    pub fn set_parameters(&mut self, alt_names: BTreeSet<String>, validity: Option<Duration>) {
        self.alt_names = alt_names;
        self.validity = validity;
    }

    pub fn with_state(mut self, state: ProvisioningState) -> Self {
        self.set_state(state);
        self
    }

    pub fn with_parameters(mut self, alt_names: BTreeSet<String>, validity: Option<Duration>) -> Self {
        self.set_parameters(alt_names, validity);
        self
    }
}

//------------ Tests ---------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_must_be_a_segment() {
        assert!(NodeId::parse("node-1").is_ok());
        assert!(matches!(NodeId::parse(""), Err(Error::InvalidNodeId(_))));
        assert!(matches!(NodeId::parse("a/b"), Err(Error::InvalidNodeId(_))));
        assert!(matches!(NodeId::parse(" a"), Err(Error::InvalidNodeId(_))));
    }

    #[test]
    fn node_id_must_not_name_a_path_component() {
        for id in [".", "..", ".locks", ".hidden"] {
            assert!(matches!(NodeId::parse(id), Err(Error::InvalidNodeId(_))), "{}", id);
            assert!(serde_json::from_str::<NodeId>(&format!("\"{}\"", id)).is_err());
        }
        assert!(NodeId::parse("node.example").is_ok());
        assert_eq!(serde_json::to_string(&NodeId::parse("node-1").unwrap()).unwrap(), "\"node-1\"");
    }

    #[test]
    fn record_json_format() {
        let record = NodeProvisioningRecord::new(NodeId::parse("node-1").unwrap()).with_parameters(
            ["10.0.0.1".to_string()].into_iter().collect(),
            Some(Duration::from_secs(30 * 86_400)),
        );

        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(
            json,
            r#"{"node_id":"node-1","state":"NEW","alt_names":["10.0.0.1"],"validity":2592000}"#
        );
        let parsed: NodeProvisioningRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn leaving_error_state_clears_message() {
        let mut record = NodeProvisioningRecord::new(NodeId::parse("node-1").unwrap());
        record.set_error("signing failed".to_string());
        assert_eq!(record.state(), ProvisioningState::Error);
        assert_eq!(record.error_message(), Some("signing failed"));

        record.set_state(ProvisioningState::New);
        assert_eq!(record.error_message(), None);
    }

    #[test]
    fn states_parse_case_insensitive() {
        assert_eq!(
            "configured".parse::<ProvisioningState>().unwrap(),
            ProvisioningState::Configured
        );
        assert_eq!(ProvisioningState::Csr.to_string(), "CSR");
        assert!("DONE".parse::<ProvisioningState>().is_err());
    }
}
