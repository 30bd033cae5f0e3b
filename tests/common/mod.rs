//! Helpers shared by the preflight integration tests.
#![allow(dead_code)]

use std::{path::Path, sync::Arc, time::Duration};

use preflight::{
    ca::{CaChangeListener, EventCounter},
    commons::crypto::{CaKeyMaterial, CaKeyPairFactory, KeyStore},
    config::Config,
    preflight::Preflight,
    provisioning::NodeId,
};
use secrecy::SecretString;
use tempfile::TempDir;

pub const SHARED_SECRET: &str = "integration-shared-secret";

pub fn tmp_dir() -> TempDir {
    tempfile::tempdir().unwrap()
}

/// A storage URI that no other test uses.
pub fn mem_storage() -> String {
    let mut bytes = [0; 8];
    openssl::rand::rand_bytes(&mut bytes).unwrap();
    format!("memory://{}", hex::encode(bytes))
}

pub fn secret(s: &str) -> SecretString {
    SecretString::new(s.to_string())
}

pub fn node(id: &str) -> NodeId {
    NodeId::parse(id).unwrap()
}

/// Builds a verified config for the given storage and keystore directory,
/// with extra TOML appended.
pub fn config(storage_uri: &str, keystore_dir: &Path, extra: &str) -> Config {
    let toml = format!(
        "storage_uri = \"{}\"\nkeystore_dir = \"{}\"\npassword_secret = \"{}\"\nlog_type = \"stderr\"\n{}",
        storage_uri,
        keystore_dir.display(),
        SHARED_SECRET,
        extra
    );
    let config = Config::parse_str(&toml).unwrap();
    config.verify().unwrap();
    config
}

/// TOML for a `[[nodes]]` table per node id.
pub fn nodes(ids: &[&str]) -> String {
    ids.iter()
        .map(|id| format!("[[nodes]]\nnode_id = \"{}\"\ntransport_address = \"https://{}:9300\"\n", id, id))
        .collect()
}

pub fn preflight(config: &Config) -> (Preflight, Arc<EventCounter>) {
    let counter = Arc::new(EventCounter::default());
    let listener: Arc<dyn CaChangeListener> = counter.clone();
    (Preflight::build(config, listener).unwrap(), counter)
}

pub fn ca_material(organization: &str) -> CaKeyMaterial {
    CaKeyPairFactory::generate(organization, Duration::from_secs(24 * 3600)).unwrap()
}

/// A PEM upload with the certificate and an unencrypted key.
pub fn pem_upload(material: &CaKeyMaterial) -> Vec<u8> {
    let mut pem = material.certificate_pem().unwrap();
    pem.extend(material.private_key().private_key_to_pem_pkcs8().unwrap());
    pem
}

pub fn pkcs12_upload(material: &CaKeyMaterial, password: &str) -> Vec<u8> {
    KeyStore::seal(material, "uploaded", &secret(password)).unwrap().into_der()
}
