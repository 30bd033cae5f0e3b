//! End to end behaviour of the preflight components.

use std::{collections::BTreeSet, time::Duration};

use openssl::asn1::Asn1Time;
use preflight::{
    ca::{CaChangedEvent, CaSource},
    commons::error::{Error, ErrorKind},
    constants::LOCAL_CA_IDENTITY,
    provisioning::{NodeId, ProvisioningState},
};

mod common;

use common::{node, secret};

#[test]
fn create_then_get_reports_generated_ca() {
    let dir = common::tmp_dir();
    let config = common::config(&common::mem_storage(), dir.path(), "");
    let (preflight, events) = common::preflight(&config);
    let ca = preflight.ca_manager();

    for days in [1, 30, 400] {
        ca.create("Acme Logging", Some(days), Some(&secret("export-password"))).unwrap();
        assert_eq!(ca.get().unwrap().source(), CaSource::Generated);

        let material = ca.load_key_material().unwrap();
        let leaf = material.certificate();
        let now = Asn1Time::days_from_now(0).unwrap();
        assert!(leaf.not_before() <= now);
        assert!(leaf.not_after() > now);

        let limit = Asn1Time::days_from_now(days).unwrap();
        assert!(leaf.not_after() <= limit);
    }
    assert_eq!(events.total(), 3);
}

#[test]
fn failed_upload_keeps_previous_state() {
    let dir = common::tmp_dir();
    let config = common::config(&common::mem_storage(), dir.path(), "");
    let (preflight, events) = common::preflight(&config);
    let ca = preflight.ca_manager();

    let good = common::pem_upload(&common::ca_material("Uploaded"));
    let malformed = b"this is neither a certificate nor a keystore".to_vec();

    // nothing before, nothing after
    let err = ca.upload(None, &[good.clone(), malformed.clone()]).unwrap_err();
    assert!(matches!(err, Error::CaCreation(_)));
    assert!(ca.get().unwrap_err().is_not_found());

    // a prior CA stays exactly as it was
    ca.create("Prior", None, None).unwrap();
    let before = ca.load_keystore().unwrap();
    assert!(ca.upload(None, &[good, malformed]).is_err());
    assert_eq!(ca.get().unwrap().source(), CaSource::Generated);
    assert_eq!(ca.load_keystore().unwrap(), before);

    assert_eq!(events.events(), vec![CaChangedEvent::Created]);
}

#[test]
fn upload_pkcs12_and_pem_parts() {
    let dir = common::tmp_dir();
    let config = common::config(&common::mem_storage(), dir.path(), "");
    let (preflight, events) = common::preflight(&config);
    let ca = preflight.ca_manager();

    let from_p12 = common::ca_material("From PKCS12");
    ca.upload(
        Some(&secret("upload-pw")),
        &[common::pkcs12_upload(&from_p12, "upload-pw")],
    )
    .unwrap();
    let loaded = ca.load_key_material().unwrap();
    assert!(loaded.private_key().public_eq(from_p12.private_key()));

    // the stored keystore is protected by the shared secret, not the upload
    // password
    let stored = ca.load_keystore().unwrap();
    assert!(stored.open(&secret(common::SHARED_SECRET)).is_ok());
    assert!(stored.open(&secret("upload-pw")).is_err());

    let from_pem = common::ca_material("From PEM");
    ca.upload(None, &[common::pem_upload(&from_pem)]).unwrap();
    let loaded = ca.load_key_material().unwrap();
    assert!(loaded.private_key().public_eq(from_pem.private_key()));

    assert_eq!(events.events(), vec![CaChangedEvent::Uploaded, CaChangedEvent::Uploaded]);
}

#[test]
fn start_over_twice() {
    let dir = common::tmp_dir();
    let config = common::config(&common::mem_storage(), dir.path(), "");
    let (preflight, _) = common::preflight(&config);
    let ca = preflight.ca_manager();

    ca.create("Acme", None, None).unwrap();
    ca.start_over().unwrap();
    ca.start_over().unwrap();

    let err = ca.get().unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn node_parameters_round_trip() {
    let dir = common::tmp_dir();
    let config = common::config(&common::mem_storage(), dir.path(), "");
    let (preflight, _) = common::preflight(&config);
    let node_1 = node("node-1");
    let days_30 = Some(Duration::from_secs(30 * 24 * 3600));

    preflight
        .add_parameters(&node_1, BTreeSet::from(["10.0.0.1".to_string()]), days_30)
        .unwrap();
    let record = preflight.tracker().get_config_for(&node_1).unwrap().unwrap();
    assert_eq!(record.alt_names(), &BTreeSet::from(["10.0.0.1".to_string()]));
    assert_eq!(record.validity(), days_30);

    preflight
        .add_parameters(&node_1, BTreeSet::from(["node-1.example".to_string()]), days_30)
        .unwrap();
    let record = preflight.tracker().get_config_for(&node_1).unwrap().unwrap();
    assert_eq!(record.alt_names(), &BTreeSet::from(["node-1.example".to_string()]));
}

#[test]
fn generate_configures_active_nodes() {
    let dir = common::tmp_dir();
    let config = common::config(&common::mem_storage(), dir.path(), &common::nodes(&["node-a", "node-b"]));
    let (preflight, _) = common::preflight(&config);

    let before = preflight.list_nodes().unwrap();
    assert_eq!(before.len(), 2);
    assert!(before.iter().all(|n| n.state.is_none()));

    preflight.generate().unwrap();

    let after = preflight.list_nodes().unwrap();
    assert!(after.iter().all(|n| n.state == Some(ProvisioningState::Configured)));
    for id in ["node-a", "node-b"] {
        let record = preflight.tracker().get_config_for(&node(id)).unwrap().unwrap();
        assert_eq!(record.state(), ProvisioningState::Configured);
    }
}

#[test]
fn full_reset_clears_everything() {
    let dir = common::tmp_dir();
    let config = common::config(&common::mem_storage(), dir.path(), &common::nodes(&["node-1"]));
    let (preflight, _) = common::preflight(&config);

    preflight.ca_manager().create("Acme", None, None).unwrap();
    preflight
        .add_parameters(&node("node-1"), BTreeSet::from(["10.0.0.1".to_string()]), None)
        .unwrap();

    preflight.full_reset().unwrap();
    assert!(preflight.ca_manager().get().unwrap_err().is_not_found());
    assert_eq!(preflight.tracker().get_config_for(&node("node-1")).unwrap(), None);
    assert_eq!(preflight.list_nodes().unwrap()[0].state, None);
}

#[test]
fn shared_secret_fallback_and_explicit_password() {
    let dir = common::tmp_dir();
    let storage = common::mem_storage();

    // only the shared secret
    let config = common::config(&storage, dir.path(), "");
    let (preflight, _) = common::preflight(&config);
    preflight.ca_manager().create("Acme", None, None).unwrap();
    assert!(preflight.ca_manager().get().is_ok());
    assert!(preflight.ca_manager().load_keystore().is_ok());

    // an explicit CA password is used exclusively, the stored CA was not
    // migrated
    let config = common::config(&storage, dir.path(), "ca_password = \"explicit-ca-password\"");
    let (preflight, _) = common::preflight(&config);
    let err = preflight.ca_manager().get().unwrap_err();
    assert!(matches!(err, Error::KeystoreStorage(_)));
    assert_eq!(err.kind(), ErrorKind::Internal);
    assert!(matches!(preflight.ca_manager().load_keystore(), Err(Error::KeystoreStorage(_))));
}

#[test]
fn file_backend_for_generated_ca() {
    let dir = common::tmp_dir();
    let config = common::config(&common::mem_storage(), dir.path(), "ca_keystore_storage = \"file\"");
    let (preflight, _) = common::preflight(&config);

    preflight.ca_manager().create("Acme", None, None).unwrap();
    assert!(dir.path().join("certificate-authority.p12").is_file());
    assert_eq!(preflight.ca_manager().get().unwrap().source(), CaSource::Generated);

    preflight.ca_manager().start_over().unwrap();
    assert!(!dir.path().join("certificate-authority.p12").exists());
}

#[test]
fn operator_ca_file_wins() {
    let dir = common::tmp_dir();
    let material = common::ca_material("Operator");
    let ca_file = dir.path().join("operator.p12");
    std::fs::write(&ca_file, common::pkcs12_upload(&material, "operator-password")).unwrap();

    let extra = format!(
        "ca_keystore_file = \"{}\"\nca_password = \"operator-password\"",
        ca_file.display()
    );
    let config = common::config(&common::mem_storage(), dir.path(), &extra);
    let (preflight, _) = common::preflight(&config);

    let ca = preflight.ca_manager().get().unwrap();
    assert_eq!(ca.source(), CaSource::LocalFile);
    assert_eq!(ca.identity(), LOCAL_CA_IDENTITY);

    let pem = preflight.ca_manager().ca_certificate_pem().unwrap();
    assert_eq!(pem.as_bytes(), material.certificate_pem().unwrap().as_slice());

    // a full reset leaves the operator file alone
    preflight.full_reset().unwrap();
    assert!(ca_file.is_file());
    assert_eq!(preflight.ca_manager().get().unwrap().source(), CaSource::LocalFile);
}

#[test]
fn disk_storage_survives_restart() {
    let dir = common::tmp_dir();
    let storage = format!("local://{}/data/", dir.path().display());
    let config = common::config(&storage, &dir.path().join("keystores"), &common::nodes(&["node-1"]));

    {
        let (preflight, _) = common::preflight(&config);
        preflight.ca_manager().create("Acme", None, None).unwrap();
        preflight.generate().unwrap();
    }

    let (preflight, _) = common::preflight(&config);
    assert_eq!(preflight.ca_manager().get().unwrap().source(), CaSource::Generated);
    assert_eq!(
        preflight.list_nodes().unwrap()[0].state,
        Some(ProvisioningState::Configured)
    );
}

#[test]
fn reset_node_on_disk_leaves_ca_and_other_nodes() {
    let dir = common::tmp_dir();
    let storage = format!("local://{}/data/", dir.path().display());
    let config = common::config(&storage, &dir.path().join("keystores"), &common::nodes(&["node-a", "node-b"]));
    let (preflight, _) = common::preflight(&config);

    preflight.ca_manager().create("Acme", None, None).unwrap();
    preflight.generate().unwrap();

    for id in [".", "..", ".locks"] {
        let err = NodeId::parse(id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
    }

    preflight.reset_node(&node("node-a")).unwrap();
    assert_eq!(preflight.ca_manager().get().unwrap().source(), CaSource::Generated);
    assert_eq!(preflight.tracker().get_config_for(&node("node-a")).unwrap(), None);
    assert_eq!(
        preflight.tracker().get_config_for(&node("node-b")).unwrap().unwrap().state(),
        ProvisioningState::Configured
    );
}
