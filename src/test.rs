//! Helper functions for testing preflight.

use std::path::PathBuf;

use url::Url;

/// This method sets up a fresh temporary directory, runs the test provided
/// in the closure with it, and removes the directory again afterwards.
pub fn test_under_tmp<F>(op: F)
where
    F: FnOnce(PathBuf),
{
    let dir = tempfile::tempdir().unwrap();
    op(dir.path().into());
}

pub fn random_hex_string() -> String {
    let mut bytes = [0; 8];
    openssl::rand::rand_bytes(&mut bytes).unwrap();
    hex::encode(bytes)
}

/// Returns a storage URI for an in-memory store that no other test uses.
pub fn mem_storage() -> Url {
    Url::parse(&format!("memory://{}", random_hex_string())).unwrap()
}
