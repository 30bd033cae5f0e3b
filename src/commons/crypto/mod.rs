//! Cryptographic objects: CA key material, keystores and PEM parsing.
mod error;
pub use self::error::*;

mod keypair;
pub use self::keypair::CaKeyPairFactory;

mod keystore;
pub use self::keystore::{CaKeyMaterial, KeyStore};

mod pem;
pub use self::pem::PemCaReader;

pub type CryptoResult<T> = std::result::Result<T, self::error::CryptoError>;
