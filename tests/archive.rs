mod util;

use provkit::cert::builder::CertificateBuilder;
use provkit::cert::profile::Role;
use provkit::config::{ArchiveOptions, IssuanceProfile};
use provkit::error::ProvKitError;
use provkit::key::KeyPair;
use provkit::pkcs12::{Pkcs12Loader, Pkcs12Packager};
use util::{Event, RecordingObserver};

#[test]
fn round_trip_keeps_primary_and_auxiliary_order() {
    util::init_logging();
    let chain = util::generate_chain(2);
    let mut builder = CertificateBuilder::new(IssuanceProfile::default());
    let device = builder
        .build("device-001", KeyPair::generate(), Role::Leaf, chain.last())
        .unwrap();
    // Auxiliary entries in an order that differs from the chain order.
    let auxiliary = vec![
        chain[2].public_only(),
        chain[0].public_only(),
        chain[1].public_only(),
    ];

    let packager = Pkcs12Packager::new(ArchiveOptions::default());
    let der = packager.pack(&device, &auxiliary, "device-pw").unwrap();
    let loaded = Pkcs12Loader::new()
        .unpack(&der, "device-pw")
        .unwrap()
        .expect("archive has a private key");

    assert_eq!(loaded.primary.to_der().unwrap(), device.to_der().unwrap());
    assert_eq!(loaded.primary.serial_number(), device.serial_number());
    assert_eq!(
        loaded.primary.private_key().unwrap().public_key(),
        device.private_key().unwrap().public_key()
    );
    assert_eq!(
        util::subjects(&loaded.auxiliary),
        vec![
            "TestRoot - Intermediate 2",
            "TestRoot",
            "TestRoot - Intermediate 1"
        ]
    );
    assert!(loaded.auxiliary.iter().all(|c| !c.has_private_key()));
}

#[test]
fn auxiliary_keys_are_never_written() {
    let chain = util::generate_chain(1);
    let mut builder = CertificateBuilder::default();
    let device = builder
        .build("device-001", KeyPair::generate(), Role::Leaf, chain.last())
        .unwrap();
    // The issuing CA still owns its key here.
    assert!(chain[1].has_private_key());
    let der = Pkcs12Packager::default()
        .pack(&device, &chain, "pw")
        .unwrap();
    let loaded = Pkcs12Loader::new().unpack(&der, "pw").unwrap().unwrap();
    assert_eq!(loaded.primary.subject_name(), "device-001");
    assert_eq!(loaded.auxiliary.len(), 2);
    assert!(loaded.auxiliary.iter().all(|c| !c.has_private_key()));
}

#[test]
fn wrong_password_fails_decryption() {
    let chain = util::generate_chain(0);
    let der = Pkcs12Packager::default()
        .pack(&chain[0], &[], "pw1")
        .unwrap();
    let result = Pkcs12Loader::new().unpack(&der, "pw2");
    assert!(matches!(result, Err(ProvKitError::DecryptionFailed)));
    assert!(matches!(
        Pkcs12Loader::new().unpack(&der, ""),
        Err(ProvKitError::DecryptionFailed)
    ));
}

#[test]
fn empty_and_unicode_passwords() {
    let chain = util::generate_chain(0);
    for password in ["", "pässwörd-✓"] {
        let der = Pkcs12Packager::default()
            .pack(&chain[0], &[], password)
            .unwrap();
        assert!(Pkcs12Loader::new().unpack(&der, password).unwrap().is_some());
    }
}

#[test]
fn packing_without_private_key_fails() {
    let chain = util::generate_chain(0);
    let public = chain[0].public_only();
    assert!(matches!(
        Pkcs12Packager::default().pack(&public, &[], "pw1"),
        Err(ProvKitError::MissingPrivateKey(name)) if name == "TestRoot"
    ));
}

#[test]
fn public_archive_has_no_signing_certificate() {
    let chain = util::generate_chain(1);
    let der = Pkcs12Packager::default()
        .pack_public(&chain, "pw1")
        .unwrap();

    let observer = RecordingObserver::default();
    let loader = Pkcs12Loader::with_observer(observer.clone());
    assert!(loader.unpack(&der, "pw1").unwrap().is_none());

    let events = observer.events.borrow();
    assert_eq!(events.len(), 3);
    assert!(matches!(&events[0], Event::Entry(e) if e.subject == "TestRoot" && !e.has_private_key));
    assert!(matches!(&events[1], Event::Entry(e) if e.subject == "TestRoot - Intermediate 1"));
    assert_eq!(events[2], Event::NoPrivateKey);
    drop(events);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("public.pfx");
    std::fs::write(&path, &der).unwrap();
    assert!(matches!(
        loader.load_signing_archive(&path, "pw1"),
        Err(ProvKitError::NoUsablePrivateKeyCertificate)
    ));
    assert_eq!(ProvKitError::NoUsablePrivateKeyCertificate.exit_code(), -1);
}

#[test]
fn observer_sees_every_entry_and_the_primary() {
    let chain = util::generate_chain(1);
    let der = Pkcs12Packager::default()
        .pack(&chain[1], &chain[..1], "pw1")
        .unwrap();

    let observer = RecordingObserver::default();
    let loaded = Pkcs12Loader::with_observer(observer.clone())
        .unpack(&der, "pw1")
        .unwrap()
        .unwrap();

    let events = observer.events.borrow();
    let thumbprint = loaded.primary.thumbprint_hex().unwrap();
    assert_eq!(thumbprint.len(), 40);
    assert!(matches!(
        &events[0],
        Event::Entry(e) if e.thumbprint == thumbprint && e.has_private_key
    ));
    assert!(matches!(&events[1], Event::Entry(e) if !e.has_private_key));
    assert_eq!(
        events[2],
        Event::Primary("TestRoot - Intermediate 1".to_string())
    );
}

#[test]
fn load_file_path_errors() {
    let loader = Pkcs12Loader::new();
    let dir = tempfile::tempdir().unwrap();

    assert!(matches!(
        loader.load_file(std::path::Path::new(""), "pw1"),
        Err(ProvKitError::InvalidPath(_))
    ));
    assert!(matches!(
        loader.load_file(dir.path(), "pw1"),
        Err(ProvKitError::InvalidPath(_))
    ));

    let missing = dir.path().join("missing.pfx");
    let err = loader.load_file(&missing, "pw1").unwrap_err();
    assert!(matches!(&err, ProvKitError::FileNotFound(p) if *p == missing));
    assert_eq!(err.exit_code(), -2);
}

#[test]
fn corrupt_file_is_malformed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("corrupt.pfx");
    std::fs::write(&path, b"\x30\x03\x02\x01\x03").unwrap();
    let err = Pkcs12Loader::new().load_file(&path, "pw1").unwrap_err();
    assert!(matches!(err, ProvKitError::MalformedArchive(_)));
    assert_eq!(err.exit_code(), -3);
}
