//! Defines all preflight errors.

use std::{fmt, io};

use crate::commons::crypto::ParseError;
use crate::commons::storage::KeyValueError;
use crate::keystore::KeystoreStorageError;
use crate::provisioning::{NodeId, ProvisioningState};

//------------ PreflightIoError ----------------------------------------------

/// An I/O error together with a description of what we were doing.
#[derive(Debug)]
pub struct PreflightIoError {
    context: String,
    cause: io::Error,
}

impl PreflightIoError {
    pub fn new(context: String, cause: io::Error) -> Self {
        PreflightIoError { context, cause }
    }

    pub fn cause(&self) -> &io::Error {
        &self.cause
    }
}

impl fmt::Display for PreflightIoError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "context: {}, underlying io::Error: {}", self.context, self.cause)
    }
}

impl std::error::Error for PreflightIoError {}

//------------ ErrorKind -----------------------------------------------------

/// Classifies an [`Error`] for callers that need to report it.
///
/// A boundary layer would map these to 404, 400 and 500 respectively.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    NotFound,
    BadRequest,
    Internal,
}

//------------ Error ---------------------------------------------------------

#[derive(Debug)]
pub enum Error {
    //-----------------------------------------------------------------
    // System Issues
    //-----------------------------------------------------------------
    IoError(PreflightIoError),
    KeyValueError(KeyValueError),
    KeystoreStorage(KeystoreStorageError),

    //-----------------------------------------------------------------
    // Certificate Authority Issues
    //-----------------------------------------------------------------
    CaNotFound,
    CaParse(ParseError),
    CaCreation(String),

    //-----------------------------------------------------------------
    // Node Provisioning Issues
    //-----------------------------------------------------------------
    InvalidNodeId(String),
    IllegalTransition {
        node: NodeId,
        from: Option<ProvisioningState>,
        to: ProvisioningState,
    },

    //-----------------------------------------------------------------
    // Other
    //-----------------------------------------------------------------
    Custom(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::IoError(e) => e.fmt(f),
            Error::KeyValueError(e) => write!(f, "Key/Value error: {}", e),
            Error::KeystoreStorage(e) => write!(f, "Keystore storage error: {}", e),
            Error::CaNotFound => write!(f, "No certificate authority exists"),
            Error::CaParse(e) => write!(f, "Could not read CA: {}", e),
            Error::CaCreation(msg) => write!(f, "Could not write CA: {}", msg),
            Error::InvalidNodeId(id) => write!(f, "Invalid node id '{}'", id),
            Error::IllegalTransition { node, from, to } => match from {
                Some(from) => write!(f, "Node '{}' cannot move from {} to {}", node, from, to),
                None => write!(f, "Node '{}' cannot be created in state {}", node, to),
            },
            Error::Custom(msg) => msg.fmt(f),
        }
    }
}

impl std::error::Error for Error {}

impl Error {
    pub fn custom(msg: impl fmt::Display) -> Self {
        Error::Custom(msg.to_string())
    }

    pub fn ca_creation(msg: impl fmt::Display) -> Self {
        Error::CaCreation(msg.to_string())
    }

    /// Returns whether the error only reports that something is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::CaNotFound)
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::CaNotFound => ErrorKind::NotFound,
            Error::CaParse(_)
            | Error::CaCreation(_)
            | Error::InvalidNodeId(_)
            | Error::IllegalTransition { .. } => ErrorKind::BadRequest,
            Error::IoError(_)
            | Error::KeyValueError(_)
            | Error::KeystoreStorage(_)
            | Error::Custom(_) => ErrorKind::Internal,
        }
    }
}

impl From<PreflightIoError> for Error {
    fn from(e: PreflightIoError) -> Self {
        Error::IoError(e)
    }
}

impl From<KeyValueError> for Error {
    fn from(e: KeyValueError) -> Self {
        Error::KeyValueError(e)
    }
}

impl From<KeystoreStorageError> for Error {
    fn from(e: KeystoreStorageError) -> Self {
        Error::KeystoreStorage(e)
    }
}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Self {
        Error::CaParse(e)
    }
}

//------------ Tests ---------------------------------------------------------
