//! The preflight command line client.

pub mod options;
pub mod report;

pub use self::options::{CliError, Options};
