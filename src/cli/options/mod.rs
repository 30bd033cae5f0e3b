//! The options for the preflight command line client.

//------------ Sub-modules ---------------------------------------------------

mod ca;
mod nodes;

//------------ Content -------------------------------------------------------

use std::{fmt, path::PathBuf, sync::Arc};

use clap::Parser;

use super::report::{Report, ReportError, ReportFormat};
use crate::{
    ca::NoopListener,
    commons::error::{Error, PreflightIoError},
    config::{Config, ConfigError},
    constants::PREFLIGHT_DEFAULT_CONFIG_FILE,
    preflight::Preflight,
    provisioning::NodeId,
};

//------------ Options -------------------------------------------------------

/// The command line options for the preflight client.
#[derive(clap::Parser)]
#[command(version, about = "Manages the cluster CA and node provisioning before the cluster goes live.")]
pub struct Options {
    #[command(flatten)]
    pub general: GeneralOptions,

    #[command(subcommand)]
    pub command: Command,
}

impl Options {
    /// Creates the options from the process arguments.
    ///
    /// If the arguments won’t result in usable options, exits the process.
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Runs the command and returns what should be printed, if anything.
    pub fn run(self) -> Result<Option<String>, CliError> {
        let config = Config::create(&self.general.config)?;
        config.init_logging()?;

        let preflight = Preflight::build(&config, Arc::new(NoopListener))?;
        let report = self.command.run(&preflight)?;
        report.report(self.general.format).map_err(CliError::from)
    }
}

//------------ GeneralOptions ------------------------------------------------

/// The options common to all commands.
#[derive(clap::Args)]
pub struct GeneralOptions {
    /// The preflight config file.
    #[arg(short, long, env = "PREFLIGHT_CONFIG", default_value = PREFLIGHT_DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Report format: none, text or json.
    #[arg(short, long, env = "PREFLIGHT_CLI_FORMAT", default_value = "text")]
    pub format: ReportFormat,
}

//------------ Command -------------------------------------------------------

#[derive(clap::Subcommand)]
pub enum Command {
    /// Manage the certificate authority
    #[command(subcommand)]
    Ca(ca::Command),

    /// Show and prepare the nodes of the cluster
    #[command(subcommand)]
    Nodes(nodes::Command),

    /// Mark all active nodes as configured
    Generate,

    /// Start over. Removes the CA and all node state, or only the state of
    /// one node if it is given.
    Reset(Reset),
}

impl Command {
    pub fn run(self, preflight: &Preflight) -> Result<Report, CliError> {
        match self {
            Self::Ca(cmd) => cmd.run(preflight.ca_manager()),
            Self::Nodes(cmd) => cmd.run(preflight),
            Self::Generate => {
                preflight.generate()?;
                Ok(Report::Success("All active nodes are configured".into()))
            }
            Self::Reset(cmd) => cmd.run(preflight),
        }
    }
}

//------------ Reset ---------------------------------------------------------

#[derive(clap::Parser)]
pub struct Reset {
    /// Only reset this node
    node: Option<String>,
}

impl Reset {
    fn run(self, preflight: &Preflight) -> Result<Report, CliError> {
        match self.node {
            Some(node) => {
                let node_id = NodeId::parse(&node)?;
                preflight.reset_node(&node_id)?;
                Ok(Report::Success(format!("Reset node '{}'", node_id)))
            }
            None => {
                preflight.full_reset()?;
                Ok(Report::Success("Reset the CA and all nodes".into()))
            }
        }
    }
}

//------------ CliError ------------------------------------------------------

#[derive(Debug)]
pub enum CliError {
    Config(ConfigError),
    Preflight(Error),
    Io(PreflightIoError),
    Report(ReportError),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CliError::Config(e) => e.fmt(f),
            CliError::Preflight(e) => e.fmt(f),
            CliError::Io(e) => e.fmt(f),
            CliError::Report(e) => e.fmt(f),
        }
    }
}

impl std::error::Error for CliError {}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e)
    }
}

impl From<Error> for CliError {
    fn from(e: Error) -> Self {
        CliError::Preflight(e)
    }
}

impl From<PreflightIoError> for CliError {
    fn from(e: PreflightIoError) -> Self {
        CliError::Io(e)
    }
}

impl From<ReportError> for CliError {
    fn from(e: ReportError) -> Self {
        CliError::Report(e)
    }
}

//------------ Tests ---------------------------------------------------------

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn verify_cli() {
        Options::command().debug_assert();
    }

    #[test]
    fn parse_commands() {
        let options = Options::try_parse_from([
            "preflightctl",
            "--config",
            "/tmp/preflight.conf",
            "--format",
            "json",
            "nodes",
            "params",
            "node-1",
            "--alt-name",
            "10.0.0.1",
            "--alt-name",
            "node-1.local",
            "--days",
            "30",
        ])
        .unwrap();
        assert_eq!(options.general.config, PathBuf::from("/tmp/preflight.conf"));
        assert_eq!(options.general.format, ReportFormat::Json);
        assert!(matches!(options.command, Command::Nodes(_)));

        let options = Options::try_parse_from(["preflightctl", "reset"]).unwrap();
        assert!(matches!(options.command, Command::Reset(Reset { node: None })));

        assert!(Options::try_parse_from(["preflightctl", "ca", "create"]).is_err());
    }
}
