use openssl::{pkey::PKey, x509::X509};
use secrecy::{ExposeSecret, SecretString};

use crate::commons::crypto::{CaKeyMaterial, ParseError};

const CERTIFICATE_MARKER: &[u8] = b"-----BEGIN CERTIFICATE";
const PRIVATE_KEY_MARKER: &[u8] = b"PRIVATE KEY-----";

//------------ PemCaReader ---------------------------------------------------

/// Reads CA key material from PEM text.
pub struct PemCaReader;

impl PemCaReader {
    /// Returns whether the bytes contain at least one PEM certificate.
    pub fn is_pem(bytes: &[u8]) -> bool {
        contains(bytes, CERTIFICATE_MARKER)
    }

    /// Parses all certificates and the private key from PEM text.
    ///
    /// An encrypted key is decrypted with the password. An absent password
    /// counts as the empty password.
    pub fn parse(pem: &[u8], password: Option<&SecretString>) -> Result<CaKeyMaterial, ParseError> {
        if !Self::is_pem(pem) {
            return Err(ParseError::NoCertificate);
        }
        let chain = X509::stack_from_pem(pem).map_err(ParseError::Certificate)?;
        if chain.is_empty() {
            return Err(ParseError::NoCertificate);
        }

        if !contains(pem, PRIVATE_KEY_MARKER) {
            return Err(ParseError::NoPrivateKey);
        }
        // Always pass a passphrase, openssl would otherwise prompt on the
        // terminal for an encrypted key.
        let passphrase = password.map(|p| p.expose_secret().as_str()).unwrap_or("");
        let private_key =
            PKey::private_key_from_pem_passphrase(pem, passphrase.as_bytes()).map_err(ParseError::PrivateKey)?;

        Ok(CaKeyMaterial::new(private_key, chain)?)
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}

//------------ Tests ---------------------------------------------------------
