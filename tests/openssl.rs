mod util;

use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkcs12::Pkcs12;
use openssl::pkey::PKey;
use openssl::stack::Stack;
use openssl::x509::store::X509StoreBuilder;
use openssl::x509::{X509, X509StoreContext};
use provkit::cert::builder::CertificateBuilder;
use provkit::cert::profile::Role;
use provkit::chain::ChainOrchestrator;
use provkit::key::KeyPair;
use provkit::pkcs12::Pkcs12Loader;

fn to_x509(certificate: &provkit::cert::Certificate) -> X509 {
    X509::from_der(&certificate.to_der().unwrap()).expect("OpenSSL failed to parse certificate")
}

fn common_name(name: &openssl::x509::X509NameRef) -> String {
    name.entries_by_nid(Nid::COMMONNAME)
        .next()
        .unwrap()
        .data()
        .as_utf8()
        .unwrap()
        .to_string()
}

#[test]
fn test_openssl_parses_certificate_fields() {
    let chain = util::generate_chain(1);
    let mut builder = CertificateBuilder::default();
    let device = builder
        .build("device-001", KeyPair::generate(), Role::Leaf, chain.last())
        .unwrap();

    let x509 = to_x509(&device);
    assert_eq!(common_name(x509.subject_name()), "device-001");
    assert_eq!(common_name(x509.issuer_name()), "TestRoot - Intermediate 1");
    assert_eq!(x509.version(), 2, "X509 version should be 3 (0-based index)");
    assert_eq!(
        x509.signature_algorithm().object().nid(),
        Nid::ECDSA_WITH_SHA256
    );

    let san = x509.subject_alt_names().expect("SAN present");
    let dns: Vec<&str> = san.iter().filter_map(|name| name.dnsname()).collect();
    assert_eq!(dns, vec!["device-001"]);

    let issuer = to_x509(&chain[1]);
    assert_eq!(
        x509.authority_key_id().unwrap().as_slice(),
        issuer.subject_key_id().unwrap().as_slice()
    );

    // The serial is the 8 little-endian timestamp bytes read as a big-endian integer.
    let serial = x509.serial_number().to_bn().unwrap().to_vec();
    let mut padded = vec![0u8; 8 - serial.len()];
    padded.extend_from_slice(&serial);
    let timestamp = u64::from_le_bytes(padded.try_into().unwrap());
    assert_eq!(Some(timestamp), device.serial_timestamp());
}

#[test]
fn test_openssl_verifies_device_chain() {
    let chain = util::generate_chain(3);
    let mut builder = CertificateBuilder::default();
    let device = builder
        .build("device-001", KeyPair::generate(), Role::Leaf, chain.last())
        .unwrap();

    let root = to_x509(&chain[0]);
    let mut store = X509StoreBuilder::new().unwrap();
    store.add_cert(root).unwrap();
    let store = store.build();

    let mut intermediates = Stack::new().unwrap();
    for ca in &chain[1..] {
        intermediates.push(to_x509(ca)).unwrap();
    }

    let leaf = to_x509(&device);
    let mut context = X509StoreContext::new().unwrap();
    let verified = context
        .init(&store, &leaf, &intermediates, |c| {
            let ok = c.verify_cert()?;
            if !ok {
                eprintln!("verification error: {}", c.error());
            }
            Ok(ok)
        })
        .unwrap();
    assert!(verified, "OpenSSL rejected the generated chain");

    for pair in chain.windows(2) {
        let issuer_key = to_x509(&pair[0]).public_key().unwrap();
        assert!(to_x509(&pair[1]).verify(&issuer_key).unwrap());
    }
}

#[test]
fn test_openssl_reads_generated_archive() {
    let mut orchestrator = ChainOrchestrator::default();
    let generated = orchestrator.generate("TestRoot", "pw1", 2).unwrap();
    let archive = generated
        .artifacts
        .iter()
        .find(|a| a.file_name() == "Intermediate 2.pfx")
        .unwrap();

    let parsed = Pkcs12::from_der(archive.bytes())
        .unwrap()
        .parse2("pw1")
        .expect("OpenSSL failed to open the archive");
    let cert = parsed.cert.expect("certificate with key");
    let pkey = parsed.pkey.expect("private key");
    assert_eq!(common_name(cert.subject_name()), "TestRoot - Intermediate 2");
    assert!(cert.public_key().unwrap().public_eq(&pkey));

    let mut ca: Vec<String> = parsed
        .ca
        .expect("chain certificates")
        .iter()
        .map(|c| common_name(c.subject_name()))
        .collect();
    ca.sort();
    assert_eq!(ca, vec!["TestRoot", "TestRoot - Intermediate 1"]);

    assert!(Pkcs12::from_der(archive.bytes()).unwrap().parse2("wrong").is_err());
}

#[test]
fn test_openssl_built_archive_loads() {
    if openssl::version::number() < 0x3000_0000 {
        // OpenSSL 1.x defaults to RC2 for certificate bags, which is not supported.
        return;
    }
    let chain = util::generate_chain(1);
    let ca = &chain[1];
    let pkcs8 = ca.private_key().unwrap().to_pkcs8_der().unwrap();
    let pkey = PKey::private_key_from_der(pkcs8.as_bytes()).unwrap();

    let mut extra = Stack::new().unwrap();
    extra.push(to_x509(&chain[0])).unwrap();
    let der = Pkcs12::builder()
        .name("TestRoot - Intermediate 1")
        .pkey(&pkey)
        .cert(&to_x509(ca))
        .ca(extra)
        .build2("pw1")
        .unwrap()
        .to_der()
        .unwrap();

    let loaded = Pkcs12Loader::new().unpack(&der, "pw1").unwrap().unwrap();
    assert_eq!(loaded.primary.thumbprint().unwrap(), ca.thumbprint().unwrap());
    assert!(loaded.primary.has_private_key());
    assert_eq!(util::subjects(&loaded.auxiliary), vec!["TestRoot"]);

    // The loaded CA signs like a freshly generated one.
    let mut builder = CertificateBuilder::default();
    let device = builder
        .build(
            "device-001",
            KeyPair::generate(),
            Role::Leaf,
            Some(&loaded.primary),
        )
        .unwrap();
    assert!(device.verify_signed_by(ca).unwrap());

    assert!(matches!(
        Pkcs12Loader::new().unpack(&der, "wrong"),
        Err(provkit::error::ProvKitError::DecryptionFailed)
    ));

    // A CA archive in that layout can issue devices.
    let dir = tempfile::tempdir().unwrap();
    let ca_path = dir.path().join("legacy-ca.pfx");
    std::fs::write(&ca_path, &der).unwrap();
    let device_path = ChainOrchestrator::default()
        .create_device_cert(dir.path(), "device-001", "device-pw", &ca_path, "pw1")
        .unwrap();
    let device = Pkcs12Loader::new()
        .load_signing_archive(&device_path, "device-pw")
        .unwrap();
    assert!(device.primary.verify_signed_by(ca).unwrap());
}

#[test]
fn test_openssl_legacy_triple_des_archive_loads() {
    let chain = util::generate_chain(1);
    let ca = &chain[1];
    let pkcs8 = ca.private_key().unwrap().to_pkcs8_der().unwrap();
    let pkey = PKey::private_key_from_der(pkcs8.as_bytes()).unwrap();

    let mut extra = Stack::new().unwrap();
    extra.push(to_x509(&chain[0])).unwrap();
    // The layout written by .NET's X509Certificate2Collection.Export.
    let der = Pkcs12::builder()
        .name("TestRoot - Intermediate 1")
        .pkey(&pkey)
        .cert(&to_x509(ca))
        .ca(extra)
        .key_algorithm(Nid::PBE_WITHSHA1AND3_KEY_TRIPLEDES_CBC)
        .cert_algorithm(Nid::PBE_WITHSHA1AND3_KEY_TRIPLEDES_CBC)
        .mac_md(MessageDigest::sha1())
        .build2("pw1")
        .unwrap()
        .to_der()
        .unwrap();

    let loaded = Pkcs12Loader::new().unpack(&der, "pw1").unwrap().unwrap();
    assert_eq!(loaded.primary.thumbprint().unwrap(), ca.thumbprint().unwrap());
    assert!(loaded.primary.has_private_key());
    assert_eq!(util::subjects(&loaded.auxiliary), vec!["TestRoot"]);

    assert!(matches!(
        Pkcs12Loader::new().unpack(&der, "wrong"),
        Err(provkit::error::ProvKitError::DecryptionFailed)
    ));
}
