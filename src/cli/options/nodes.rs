//! Commands related to the nodes of the cluster.

use std::time::Duration;

use super::CliError;
use crate::{cli::report::Report, preflight::Preflight, provisioning::NodeId};

#[derive(clap::Subcommand)]
pub enum Command {
    /// List the active nodes and their provisioning state
    List,

    /// Set the alternative names and certificate validity of a node
    Params(Params),
}

impl Command {
    pub fn run(self, preflight: &Preflight) -> Result<Report, CliError> {
        match self {
            Self::List => Ok(Report::Nodes(preflight.list_nodes()?)),
            Self::Params(cmd) => cmd.run(preflight),
        }
    }
}

//-------- Params ------------------------------------------------------------

#[derive(clap::Parser)]
pub struct Params {
    /// The node id
    node: String,

    /// An alternative name for the node certificate, may be repeated
    #[arg(long = "alt-name", value_name = "name")]
    alt_names: Vec<String>,

    /// Validity of the node certificate in days
    #[arg(long, value_name = "number")]
    days: Option<u64>,
}

impl Params {
    fn run(self, preflight: &Preflight) -> Result<Report, CliError> {
        let node_id = NodeId::parse(&self.node)?;
        let validity = self.days.map(|days| Duration::from_secs(days * 24 * 60 * 60));
        preflight.add_parameters(&node_id, self.alt_names.into_iter().collect(), validity)?;
        Ok(Report::Success(format!("Updated parameters of node '{}'", node_id)))
    }
}
