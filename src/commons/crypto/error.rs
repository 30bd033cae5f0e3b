use std::fmt;

use openssl::error::ErrorStack;

//------------ CryptoError ---------------------------------------------------

/// Errors building, sealing or opening CA key material.
#[derive(Debug)]
pub enum CryptoError {
    OpenSslError(ErrorStack),
    EmptyChain,
    KeyMismatch,
    MissingEntry(&'static str),
    InvalidValidity(String),
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CryptoError::OpenSslError(e) => e.fmt(f),
            CryptoError::EmptyChain => write!(f, "Certificate chain is empty"),
            CryptoError::KeyMismatch => write!(f, "No certificate in the chain matches the private key"),
            CryptoError::MissingEntry(what) => write!(f, "Keystore contains no {}", what),
            CryptoError::InvalidValidity(e) => write!(f, "Invalid validity: {}", e),
        }
    }
}

impl std::error::Error for CryptoError {}

impl From<ErrorStack> for CryptoError {
    fn from(e: ErrorStack) -> Self {
        CryptoError::OpenSslError(e)
    }
}

//------------ ParseError ----------------------------------------------------

/// Errors parsing an uploaded PEM payload into CA key material.
#[derive(Debug)]
pub enum ParseError {
    NoCertificate,
    Certificate(ErrorStack),
    NoPrivateKey,
    PrivateKey(ErrorStack),
    KeyMismatch,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ParseError::NoCertificate => write!(f, "no certificate found"),
            ParseError::Certificate(e) => write!(f, "cannot parse certificate: {}", e),
            ParseError::NoPrivateKey => write!(f, "no private key found"),
            ParseError::PrivateKey(e) => write!(f, "cannot read private key, wrong password?: {}", e),
            ParseError::KeyMismatch => write!(f, "private key does not match any certificate"),
        }
    }
}

impl std::error::Error for ParseError {}

impl From<CryptoError> for ParseError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::OpenSslError(e) => ParseError::Certificate(e),
            CryptoError::EmptyChain => ParseError::NoCertificate,
            CryptoError::MissingEntry(_) => ParseError::NoPrivateKey,
            CryptoError::KeyMismatch | CryptoError::InvalidValidity(_) => ParseError::KeyMismatch,
        }
    }
}
