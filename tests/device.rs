mod util;

use provkit::cert::Certificate;
use provkit::cert::extensions::{
    ExtendedKeyUsageOption, KeyUsage, KeyUsages, SubjectAltName, ToAndFromX509Extension,
};
use provkit::chain::ChainOrchestrator;
use provkit::error::ProvKitError;
use provkit::pkcs12::{Pkcs12Loader, Pkcs12Packager};
use util::{Event, RecordingObserver};

fn chain_in(dir: &std::path::Path, intermediates: u8) {
    ChainOrchestrator::default()
        .create_cert_chain(dir, "TestRoot", "pw1", intermediates)
        .unwrap();
}

#[test]
fn device_certificate_scenario() {
    util::init_logging();
    let ca_dir = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    chain_in(ca_dir.path(), 2);

    let mut orchestrator = ChainOrchestrator::default();
    let path = orchestrator
        .create_device_cert(
            out_dir.path(),
            "device-001",
            "device-pw",
            &ca_dir.path().join("Intermediate 2.pfx"),
            "pw1",
        )
        .unwrap();
    assert_eq!(path, out_dir.path().join("device-001.pfx"));
    assert_eq!(util::file_names(out_dir.path()), vec!["device-001.pfx"]);

    let device = Pkcs12Loader::new()
        .load_signing_archive(&path, "device-pw")
        .unwrap();
    let leaf = &device.primary;
    assert_eq!(leaf.subject_name(), "device-001");
    assert!(!leaf.is_ca());
    assert_eq!(
        leaf.subject_alt_name().unwrap(),
        Some(SubjectAltName {
            names: vec!["device-001".to_string()]
        })
    );
    assert_eq!(
        leaf.extended_key_usage().unwrap().unwrap().usage,
        vec![
            ExtendedKeyUsageOption::ClientAuth,
            ExtendedKeyUsageOption::ServerAuth
        ]
    );
    assert_eq!(
        leaf.key_usage().unwrap(),
        Some(KeyUsage(
            KeyUsages::DigitalSignature | KeyUsages::KeyEncipherment
        ))
    );
    let basic_constraints = leaf.basic_constraints().unwrap().unwrap();
    assert!(!basic_constraints.is_ca);
    assert_eq!(basic_constraints.path_len_constraint(), 0);
    assert_eq!(leaf.is_extension_critical(KeyUsage::OID), Some(true));
    assert_eq!(leaf.is_extension_critical(SubjectAltName::OID), Some(false));

    // Issuing CA first, then the CA archive's own chain.
    assert_eq!(
        util::subjects(&device.auxiliary),
        vec![
            "TestRoot - Intermediate 2",
            "TestRoot",
            "TestRoot - Intermediate 1"
        ]
    );
    let issuer = &device.auxiliary[0];
    assert_eq!(util::aki(leaf), Some(util::ski(issuer)));
    assert!(leaf.verify_signed_by(issuer).unwrap());
    assert!(issuer.validity().contains(&leaf.validity()));
}

#[test]
fn device_issuance_reports_ca_archive_entries() {
    let ca_dir = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    chain_in(ca_dir.path(), 1);

    let observer = RecordingObserver::default();
    let mut orchestrator =
        ChainOrchestrator::default().with_loader(Pkcs12Loader::with_observer(observer.clone()));
    orchestrator
        .create_device_cert(
            out_dir.path(),
            "device-001",
            "device-pw",
            &ca_dir.path().join("Intermediate 1.pfx"),
            "pw1",
        )
        .unwrap();

    let events = observer.events.borrow();
    assert_eq!(events.len(), 3);
    let Event::Entry(issuer) = &events[0] else {
        panic!("expected an entry first, got {:?}", events[0]);
    };
    assert_eq!(issuer.subject, "TestRoot - Intermediate 1");
    assert!(issuer.has_private_key);
    assert_eq!(issuer.thumbprint.len(), 40);
    assert!(matches!(
        &events[1],
        Event::Entry(root) if root.subject == "TestRoot" && !root.has_private_key
    ));
    assert_eq!(
        events[2],
        Event::Primary("TestRoot - Intermediate 1".to_string())
    );
}

#[test]
fn device_from_root_only_chain() {
    let ca_dir = tempfile::tempdir().unwrap();
    chain_in(ca_dir.path(), 0);

    let mut orchestrator = ChainOrchestrator::default();
    let path = orchestrator
        .create_device_cert(
            ca_dir.path(),
            "sensor.example.com",
            "device-pw",
            &ca_dir.path().join("TestRoot.pfx"),
            "pw1",
        )
        .unwrap();
    let device = Pkcs12Loader::new()
        .load_signing_archive(&path, "device-pw")
        .unwrap();
    assert_eq!(util::subjects(&device.auxiliary), vec!["TestRoot"]);
}

#[test]
fn ca_archive_without_key_writes_nothing() {
    let ca_dir = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    let chain = util::generate_chain(1);
    let ca_path = ca_dir.path().join("public.pfx");
    std::fs::write(
        &ca_path,
        Pkcs12Packager::default().pack_public(&chain, "pw1").unwrap(),
    )
    .unwrap();

    let mut orchestrator = ChainOrchestrator::default();
    let result =
        orchestrator.create_device_cert(out_dir.path(), "device-001", "pw", &ca_path, "pw1");
    assert!(matches!(
        result,
        Err(ProvKitError::NoUsablePrivateKeyCertificate)
    ));
    assert!(util::file_names(out_dir.path()).is_empty());
}

#[test]
fn invalid_device_name_writes_nothing() {
    let ca_dir = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    chain_in(ca_dir.path(), 1);

    let mut orchestrator = ChainOrchestrator::default();
    let result = orchestrator.create_device_cert(
        out_dir.path(),
        "bad name",
        "pw",
        &ca_dir.path().join("Intermediate 1.pfx"),
        "pw1",
    );
    let err = result.unwrap_err();
    assert!(matches!(err, ProvKitError::InvalidSubjectName(_)));
    assert_eq!(err.exit_code(), -1);
    assert!(util::file_names(out_dir.path()).is_empty());
}

#[test]
fn wrong_ca_password() {
    let ca_dir = tempfile::tempdir().unwrap();
    chain_in(ca_dir.path(), 0);

    let mut orchestrator = ChainOrchestrator::default();
    let err = orchestrator
        .create_device_cert(
            ca_dir.path(),
            "device-001",
            "pw",
            &ca_dir.path().join("TestRoot.pfx"),
            "not-pw1",
        )
        .unwrap_err();
    assert!(matches!(err, ProvKitError::DecryptionFailed));
    assert_eq!(err.exit_code(), -3);
}

#[test]
fn verification_certificate_is_public_only() {
    let ca_dir = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    chain_in(ca_dir.path(), 0);

    let mut orchestrator = ChainOrchestrator::default();
    let path = orchestrator
        .create_verification_cert(
            out_dir.path(),
            "4F2A9C0D1E3B5A7C",
            &ca_dir.path().join("TestRoot.pfx"),
            "pw1",
        )
        .unwrap();
    assert_eq!(util::file_names(out_dir.path()), vec!["4F2A9C0D1E3B5A7C.cer"]);

    let certificate = Certificate::from_der(&std::fs::read(path).unwrap()).unwrap();
    let root =
        Certificate::from_der(&std::fs::read(ca_dir.path().join("TestRoot.cer")).unwrap())
            .unwrap();
    assert_eq!(certificate.subject_name(), "4F2A9C0D1E3B5A7C");
    assert!(!certificate.is_ca());
    assert_eq!(util::aki(&certificate), Some(util::ski(&root)));
    assert!(certificate.verify_signed_by(&root).unwrap());
}
