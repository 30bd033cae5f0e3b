//! CA key material and the sealed keystore container it is stored in.
use std::fmt;

use openssl::{
    pkcs12::Pkcs12,
    pkey::{PKey, Private},
    stack::Stack,
    x509::X509,
};
use secrecy::{ExposeSecret, SecretString};

use crate::commons::crypto::CryptoError;

//------------ CaKeyMaterial -------------------------------------------------

/// A private key together with its certificate chain.
///
/// The chain is never empty and its first certificate, the leaf, always
/// belongs to the private key.
#[derive(Clone)]
pub struct CaKeyMaterial {
    private_key: PKey<Private>,
    chain: Vec<X509>,
}

impl CaKeyMaterial {
    /// Creates key material, moving the certificate for the key to the front.
    ///
    /// The remaining certificates keep their relative order.
    pub fn new(private_key: PKey<Private>, mut chain: Vec<X509>) -> Result<Self, CryptoError> {
        if chain.is_empty() {
            return Err(CryptoError::EmptyChain);
        }

        let mut leaf_pos = None;
        for (pos, cert) in chain.iter().enumerate() {
            if cert.public_key()?.public_eq(&private_key) {
                leaf_pos = Some(pos);
                break;
            }
        }
        let leaf_pos = leaf_pos.ok_or(CryptoError::KeyMismatch)?;
        let leaf = chain.remove(leaf_pos);
        chain.insert(0, leaf);

        Ok(CaKeyMaterial { private_key, chain })
    }

    pub fn private_key(&self) -> &PKey<Private> {
        &self.private_key
    }

    /// The certificate belonging to the private key.
    pub fn certificate(&self) -> &X509 {
        &self.chain[0]
    }

    pub fn chain(&self) -> &[X509] {
        &self.chain
    }

    /// The leaf certificate in PEM format.
    pub fn certificate_pem(&self) -> Result<Vec<u8>, CryptoError> {
        self.certificate().to_pem().map_err(CryptoError::from)
    }
}

impl fmt::Debug for CaKeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaKeyMaterial")
            .field("chain_len", &self.chain.len())
            .finish_non_exhaustive()
    }
}

//------------ KeyStore ------------------------------------------------------

/// A password protected PKCS#12 container with a single key entry.
///
/// This is what the keystore backends persist. It can only be turned back
/// into usable key material with the password it was sealed with.
#[derive(Clone, Eq, PartialEq)]
pub struct KeyStore {
    der: Vec<u8>,
}

impl KeyStore {
    /// Wraps DER encoded PKCS#12 bytes, e.g. as read from disk.
    ///
    /// The content is not checked until the keystore is opened.
    pub fn from_der(der: Vec<u8>) -> Self {
        KeyStore { der }
    }

    /// Seals the key material under the given alias and password.
    pub fn seal(material: &CaKeyMaterial, alias: &str, password: &SecretString) -> Result<Self, CryptoError> {
        Self::seal_with(material, Some(alias), password)
    }

    fn seal_with(material: &CaKeyMaterial, alias: Option<&str>, password: &SecretString) -> Result<Self, CryptoError> {
        let mut builder = Pkcs12::builder();
        if let Some(alias) = alias {
            builder.name(alias);
        }
        builder.pkey(material.private_key()).cert(material.certificate());

        if material.chain().len() > 1 {
            let mut ca = Stack::new()?;
            for cert in &material.chain()[1..] {
                ca.push(cert.clone())?;
            }
            builder.ca(ca);
        }

        let pkcs12 = builder.build2(password.expose_secret())?;
        Ok(KeyStore { der: pkcs12.to_der()? })
    }

    /// Opens the keystore. Fails if the password is wrong or the content is
    /// not a PKCS#12 container with a key and certificate.
    pub fn open(&self, password: &SecretString) -> Result<CaKeyMaterial, CryptoError> {
        let parsed = Pkcs12::from_der(&self.der)?.parse2(password.expose_secret())?;

        let private_key = parsed.pkey.ok_or(CryptoError::MissingEntry("private key"))?;
        let cert = parsed.cert.ok_or(CryptoError::MissingEntry("certificate"))?;

        let mut chain = vec![cert];
        if let Some(ca) = parsed.ca {
            chain.extend(ca);
        }

        CaKeyMaterial::new(private_key, chain)
    }

    /// Returns a new keystore with the same content and alias, protected by
    /// another password.
    pub fn reseal(&self, read_password: &SecretString, write_password: &SecretString) -> Result<Self, CryptoError> {
        let material = self.open(read_password)?;
        let alias = material
            .certificate()
            .alias()
            .map(|alias| String::from_utf8_lossy(alias).into_owned());
        Self::seal_with(&material, alias.as_deref(), write_password)
    }

    pub fn as_der(&self) -> &[u8] {
        &self.der
    }

    pub fn into_der(self) -> Vec<u8> {
        self.der
    }
}

impl fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyStore({} bytes)", self.der.len())
    }
}

//------------ Tests ---------------------------------------------------------
