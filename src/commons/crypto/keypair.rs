use std::time::Duration;

use log::debug;
use openssl::{
    asn1::Asn1Time,
    bn::{BigNum, MsbOption},
    hash::MessageDigest,
    nid::Nid,
    pkey::PKey,
    rsa::Rsa,
    x509::{
        X509, X509NameBuilder,
        extension::{BasicConstraints, KeyUsage, SubjectKeyIdentifier},
    },
};

use crate::{
    commons::crypto::{CaKeyMaterial, CryptoError, CryptoResult},
    constants::CA_KEY_SIZE,
};

//------------ CaKeyPairFactory ----------------------------------------------

/// Generates fresh self-signed CA key material.
pub struct CaKeyPairFactory;

impl CaKeyPairFactory {
    /// Generates a new RSA key and a self-signed CA certificate for it.
    ///
    /// The organization is used as both the common name and the
    /// organization of the subject. The certificate is valid from now until
    /// now plus `validity`. Every call produces a new key.
    pub fn generate(organization: &str, validity: Duration) -> CryptoResult<CaKeyMaterial> {
        if validity.is_zero() {
            return Err(CryptoError::InvalidValidity("validity must be positive".to_string()));
        }
        let validity_secs = i64::try_from(validity.as_secs())
            .map_err(|_| CryptoError::InvalidValidity(format!("{} seconds is too long", validity.as_secs())))?;

        debug!("Generating {} bit RSA key for CA '{}'", CA_KEY_SIZE, organization);
        let rsa = Rsa::generate(CA_KEY_SIZE)?;
        let private_key = PKey::from_rsa(rsa)?;

        let mut name = X509NameBuilder::new()?;
        name.append_entry_by_nid(Nid::COMMONNAME, organization)?;
        name.append_entry_by_nid(Nid::ORGANIZATIONNAME, organization)?;
        let name = name.build();

        let mut serial = BigNum::new()?;
        serial.rand(159, MsbOption::MAYBE_ZERO, false)?;
        let serial = serial.to_asn1_integer()?;

        let now = chrono::Utc::now().timestamp();
        let not_before = Asn1Time::from_unix(now)?;
        let not_after = Asn1Time::from_unix(now.saturating_add(validity_secs))?;

        let mut builder = X509::builder()?;
        builder.set_version(2)?;
        builder.set_serial_number(&serial)?;
        builder.set_subject_name(&name)?;
        builder.set_issuer_name(&name)?;
        builder.set_pubkey(&private_key)?;
        builder.set_not_before(&not_before)?;
        builder.set_not_after(&not_after)?;
        builder.append_extension(BasicConstraints::new().critical().ca().build()?)?;
        builder.append_extension(KeyUsage::new().critical().key_cert_sign().crl_sign().build()?)?;
        let subject_key_id = SubjectKeyIdentifier::new().build(&builder.x509v3_context(None, None))?;
        builder.append_extension(subject_key_id)?;
        builder.sign(&private_key, MessageDigest::sha256())?;

        CaKeyMaterial::new(private_key, vec![builder.build()])
    }
}

//------------ Tests ---------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_self_signed_ca() {
        let material = CaKeyPairFactory::generate("Acme Logging", Duration::from_secs(30 * 86_400)).unwrap();
        let cert = material.certificate();

        let org = cert
            .subject_name()
            .entries_by_nid(Nid::ORGANIZATIONNAME)
            .next()
            .unwrap()
            .data()
            .as_utf8()
            .unwrap()
            .to_string();
        assert_eq!(org, "Acme Logging");
        assert!(cert.verify(material.private_key()).unwrap());

        let now = Asn1Time::days_from_now(0).unwrap();
        let starts = now.diff(cert.not_before()).unwrap();
        assert!(starts.days == 0 && starts.secs <= 0);
        let ends = now.diff(cert.not_after()).unwrap();
        assert!(ends.days <= 30 && ends.days >= 29);
    }

    #[test]
    fn every_call_produces_a_new_key() {
        let one = CaKeyPairFactory::generate("Acme", Duration::from_secs(86_400)).unwrap();
        let two = CaKeyPairFactory::generate("Acme", Duration::from_secs(86_400)).unwrap();
        assert!(!one.private_key().public_eq(two.private_key()));

        let one_serial = one.certificate().serial_number().to_bn().unwrap();
        let two_serial = two.certificate().serial_number().to_bn().unwrap();
        assert_ne!(one_serial, two_serial);
        assert!(!one_serial.is_negative());
        assert!(one_serial.num_bits() <= 159);
    }

    #[test]
    fn zero_validity_is_rejected() {
        assert!(CaKeyPairFactory::generate("Acme", Duration::ZERO).is_err());
    }
}
