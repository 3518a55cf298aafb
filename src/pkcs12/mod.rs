//! Password-protected PKCS #12 archives.
//!
//! Archives follow the layout OpenSSL 3 writes by default:
//!
//! * certificates in `certBag`s inside one PBES2-encrypted `EncryptedData`,
//!   the key-bearing certificate first;
//! * the private key in a `pkcs8ShroudedKeyBag` inside a plain `Data` safe;
//! * bags encrypted with PBKDF2-HMAC-SHA256 and AES-256-CBC;
//! * an HMAC-SHA256 integrity MAC keyed with the RFC 7292 KDF.
//!
//! The key bag and the certificate it belongs to share a `localKeyId`
//! (the certificate's SHA-1 thumbprint) and a `friendlyName`.

pub mod asn1;
pub mod kdf;
pub mod observer;

use std::fmt::Display;
use std::fs;
use std::path::Path;

use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, KeyIvInit};
use der::asn1::{OctetString, SetOfVec};
use der::{Any, Decode, Encode, Tag, Tagged};
use pkcs5::{EncryptionScheme, pbes2};
use sha1::Sha1;
use x509_cert::attr::Attribute;
use x509_cert::spki::AlgorithmIdentifierOwned;
use zeroize::Zeroizing;

use asn1::{
    CERT_BAG, CertBag, ContentInfo, DigestInfo, EncryptedContentInfo, EncryptedData,
    FRIENDLY_NAME, ID_DATA, ID_ENCRYPTED_DATA, KEY_BAG, LOCAL_KEY_ID, MacData,
    PBE_SHA1_3DES_CBC, PKCS8_SHROUDED_KEY_BAG, PFX_VERSION, Pfx, Pkcs12PbeParams, SafeBag,
    ShroudedKeyBag, X509_CERTIFICATE,
};
use kdf::MacAlgorithm;
use observer::{ArchiveEntry, ArchiveObserver, LogObserver};

use crate::cert::Certificate;
use crate::config::ArchiveOptions;
use crate::error::{ProvKitError, Result};
use crate::key::{KeyPair, PublicKey};

const SALT_LEN: usize = 16;
const AES_BLOCK_LEN: usize = 16;
const TDES_KEY_LEN: usize = 24;
const DES_BLOCK_LEN: usize = 8;

type TdesCbcDec = cbc::Decryptor<des::TdesEde3>;

/// The content of a successfully unpacked archive.
///
/// # Fields
/// * `primary` - The first certificate that has a private key.
/// * `auxiliary` - Every other certificate, in archive order, without keys.
#[derive(Debug)]
pub struct LoadedArchive {
    pub primary: Certificate,
    pub auxiliary: Vec<Certificate>,
}

/// Writes PKCS #12 archives.
#[derive(Clone, Debug, Default)]
pub struct Pkcs12Packager {
    options: ArchiveOptions,
}

impl Pkcs12Packager {
    pub fn new(options: ArchiveOptions) -> Self {
        Self { options }
    }

    /// Packs `primary` with its private key plus public `auxiliary` certificates.
    ///
    /// # Arguments
    /// * `primary` - Certificate whose private key is stored in the archive.
    /// * `auxiliary` - Chain certificates; any private keys they hold are not written.
    /// * `password` - Protects both the bag encryption and the integrity MAC.
    ///
    /// # Returns
    /// The DER-encoded PFX.
    pub fn pack(
        &self,
        primary: &Certificate,
        auxiliary: &[Certificate],
        password: &str,
    ) -> Result<Vec<u8>> {
        let key = primary
            .private_key()
            .ok_or_else(|| ProvKitError::MissingPrivateKey(primary.subject_name()))?;

        let attributes = bag_attributes(&primary.subject_name(), &primary.thumbprint()?)?;

        let mut cert_bags = Vec::with_capacity(auxiliary.len() + 1);
        cert_bags.push(cert_bag(primary, Some(attributes.clone()))?);
        for certificate in auxiliary {
            cert_bags.push(cert_bag(certificate, None)?);
        }
        let key_bag = self.key_bag(key, password, Some(attributes))?;

        log::debug!(
            "packing '{}' with {} auxiliary certificate(s)",
            primary.subject_name(),
            auxiliary.len()
        );
        self.assemble(cert_bags, vec![key_bag], password)
    }

    /// Packs certificates without any private key.
    ///
    /// Such an archive unpacks to `None`.
    pub fn pack_public(&self, certificates: &[Certificate], password: &str) -> Result<Vec<u8>> {
        let cert_bags = certificates
            .iter()
            .map(|certificate| cert_bag(certificate, None))
            .collect::<Result<Vec<_>>>()?;
        self.assemble(cert_bags, Vec::new(), password)
    }

    fn key_bag(
        &self,
        key: &KeyPair,
        password: &str,
        attributes: Option<SetOfVec<Attribute>>,
    ) -> Result<SafeBag> {
        let pkcs8 = key.to_pkcs8_der()?;
        let (encryption_algorithm, encrypted) = self.encrypt(password, pkcs8.as_bytes())?;
        let shrouded = ShroudedKeyBag {
            encryption_algorithm,
            encrypted_data: OctetString::new(encrypted)?,
        };
        Ok(SafeBag {
            bag_id: PKCS8_SHROUDED_KEY_BAG,
            bag_value: Any::from_der(&shrouded.to_der()?)?,
            bag_attributes: attributes,
        })
    }

    fn assemble(
        &self,
        cert_bags: Vec<SafeBag>,
        key_bags: Vec<SafeBag>,
        password: &str,
    ) -> Result<Vec<u8>> {
        let (algorithm, encrypted) = self.encrypt(password, &cert_bags.to_der()?)?;
        let encrypted_data = EncryptedData {
            version: 0,
            encrypted_content_info: EncryptedContentInfo {
                content_type: ID_DATA,
                content_encryption_algorithm: algorithm,
                encrypted_content: Some(OctetString::new(encrypted)?),
            },
        };

        let mut contents = vec![ContentInfo {
            content_type: ID_ENCRYPTED_DATA,
            content: Some(Any::from_der(&encrypted_data.to_der()?)?),
        }];
        if !key_bags.is_empty() {
            let key_safe = key_bags.to_der()?;
            contents.push(ContentInfo {
                content_type: ID_DATA,
                content: Some(Any::new(Tag::OctetString, key_safe)?),
            });
        }
        let auth_safe = contents.to_der()?;

        let mac_salt: [u8; SALT_LEN] = rand::random();
        let digest = kdf::compute_mac(
            MacAlgorithm::Sha256,
            password,
            &mac_salt,
            self.options.mac_iterations,
            &auth_safe,
        )?;

        let pfx = Pfx {
            version: PFX_VERSION,
            auth_safe: ContentInfo {
                content_type: ID_DATA,
                content: Some(Any::new(Tag::OctetString, auth_safe)?),
            },
            mac_data: Some(MacData {
                mac: DigestInfo {
                    digest_algorithm: AlgorithmIdentifierOwned {
                        oid: MacAlgorithm::Sha256.oid(),
                        parameters: Some(Any::null()),
                    },
                    digest: OctetString::new(digest)?,
                },
                mac_salt: OctetString::new(mac_salt.to_vec())?,
                iterations: Some(self.options.mac_iterations),
            }),
        };
        Ok(pfx.to_der()?)
    }

    /// PBES2 encryption with fresh salt and IV.
    fn encrypt(
        &self,
        password: &str,
        plaintext: &[u8],
    ) -> Result<(AlgorithmIdentifierOwned, Vec<u8>)> {
        let salt: [u8; SALT_LEN] = rand::random();
        let iv: [u8; AES_BLOCK_LEN] = rand::random();
        let params =
            pbes2::Parameters::pbkdf2_sha256_aes256cbc(self.options.kdf_iterations, &salt, &iv)
                .map_err(|e| ProvKitError::EncodingError(e.to_string()))?;
        let scheme = EncryptionScheme::from(params);
        let ciphertext = scheme
            .encrypt(password, plaintext)
            .map_err(|e| ProvKitError::EncodingError(e.to_string()))?;
        let algorithm = AlgorithmIdentifierOwned::from_der(&scheme.to_der()?)?;
        Ok((algorithm, ciphertext))
    }
}

fn bag_attributes(friendly_name: &str, local_key_id: &[u8]) -> Result<SetOfVec<Attribute>> {
    let bmp_name: Vec<u8> = friendly_name
        .encode_utf16()
        .flat_map(u16::to_be_bytes)
        .collect();
    let attributes = vec![
        Attribute {
            oid: FRIENDLY_NAME,
            values: SetOfVec::try_from(vec![Any::new(Tag::BmpString, bmp_name)?])?,
        },
        Attribute {
            oid: LOCAL_KEY_ID,
            values: SetOfVec::try_from(vec![Any::new(Tag::OctetString, local_key_id)?])?,
        },
    ];
    Ok(SetOfVec::try_from(attributes)?)
}

fn cert_bag(certificate: &Certificate, attributes: Option<SetOfVec<Attribute>>) -> Result<SafeBag> {
    let bag = CertBag {
        cert_id: X509_CERTIFICATE,
        cert_value: OctetString::new(certificate.to_der()?)?,
    };
    Ok(SafeBag {
        bag_id: CERT_BAG,
        bag_value: Any::from_der(&bag.to_der()?)?,
        bag_attributes: attributes,
    })
}

fn malformed(err: impl Display) -> ProvKitError {
    ProvKitError::MalformedArchive(err.to_string())
}

/// Decrypts PBES2 or legacy PKCS #12 3DES content.
fn decrypt(
    algorithm: &AlgorithmIdentifierOwned,
    password: &str,
    ciphertext: &[u8],
) -> Result<Zeroizing<Vec<u8>>> {
    match algorithm.oid {
        pbes2::PBES2_OID => decrypt_pbes2(algorithm, password, ciphertext),
        PBE_SHA1_3DES_CBC => decrypt_triple_des(algorithm, password, ciphertext),
        other => Err(ProvKitError::UnsupportedAlgorithm(format!(
            "content encryption {other}"
        ))),
    }
}

/// `pbeWithSHAAnd3-KeyTripleDES-CBC`: key and IV come from the RFC 7292 KDF over SHA-1.
fn decrypt_triple_des(
    algorithm: &AlgorithmIdentifierOwned,
    password: &str,
    ciphertext: &[u8],
) -> Result<Zeroizing<Vec<u8>>> {
    let params = algorithm
        .parameters
        .as_ref()
        .ok_or_else(|| malformed("3DES encryption without parameters"))?
        .decode_as::<Pkcs12PbeParams>()
        .map_err(malformed)?;
    let password = kdf::bmp_password(password);
    let salt = params.salt.as_bytes();
    let key = kdf::derive_key::<Sha1>(
        &password,
        salt,
        kdf::CIPHER_KEY_ID,
        params.iterations,
        TDES_KEY_LEN,
    );
    let iv = kdf::derive_key::<Sha1>(
        &password,
        salt,
        kdf::CIPHER_IV_ID,
        params.iterations,
        DES_BLOCK_LEN,
    );
    let cipher = TdesCbcDec::new_from_slices(&key, &iv)
        .map_err(|e| ProvKitError::DecodingError(e.to_string()))?;
    cipher
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map(Zeroizing::new)
        .map_err(|_| ProvKitError::DecryptionFailed)
}

fn decrypt_pbes2(
    algorithm: &AlgorithmIdentifierOwned,
    password: &str,
    ciphertext: &[u8],
) -> Result<Zeroizing<Vec<u8>>> {
    let encoded = algorithm.to_der()?;
    let scheme = EncryptionScheme::from_der(&encoded)
        .map_err(|e| ProvKitError::UnsupportedAlgorithm(format!("PBES2 parameters: {e}")))?;
    scheme
        .decrypt(password, ciphertext)
        .map(Zeroizing::new)
        .map_err(|_| ProvKitError::DecryptionFailed)
}

/// The bytes of a `Data` content info.
fn data_content(content_info: &ContentInfo) -> Result<Vec<u8>> {
    let content = content_info
        .content
        .as_ref()
        .ok_or_else(|| malformed("content info without content"))?;
    let octets = content.decode_as::<OctetString>().map_err(malformed)?;
    Ok(octets.as_bytes().to_vec())
}

/// Verifies the MAC and returns every safe bag, decrypting where needed.
fn read_bags(bytes: &[u8], password: &str) -> Result<Vec<SafeBag>> {
    let pfx = Pfx::from_der(bytes).map_err(malformed)?;
    if pfx.version != PFX_VERSION {
        return Err(malformed(format!("PFX version {}", pfx.version)));
    }
    if pfx.auth_safe.content_type != ID_DATA {
        return Err(ProvKitError::UnsupportedAlgorithm(format!(
            "public-key integrity mode ({})",
            pfx.auth_safe.content_type
        )));
    }
    let auth_safe = data_content(&pfx.auth_safe)?;

    let mac_data = pfx
        .mac_data
        .ok_or_else(|| malformed("archive has no integrity MAC"))?;
    kdf::verify_mac(
        MacAlgorithm::from_oid(mac_data.mac.digest_algorithm.oid)?,
        password,
        mac_data.mac_salt.as_bytes(),
        mac_data.iterations.unwrap_or(1),
        &auth_safe,
        mac_data.mac.digest.as_bytes(),
    )?;

    let contents = Vec::<ContentInfo>::from_der(&auth_safe).map_err(malformed)?;
    let mut bags = Vec::new();
    for content_info in &contents {
        match content_info.content_type {
            ID_DATA => {
                let safe = data_content(content_info)?;
                bags.extend(Vec::<SafeBag>::from_der(&safe).map_err(malformed)?);
            }
            ID_ENCRYPTED_DATA => {
                let encrypted = content_info
                    .content
                    .as_ref()
                    .ok_or_else(|| malformed("encrypted data without content"))?
                    .decode_as::<EncryptedData>()
                    .map_err(malformed)?;
                let info = encrypted.encrypted_content_info;
                let ciphertext = info
                    .encrypted_content
                    .ok_or_else(|| malformed("encrypted data without ciphertext"))?;
                let plaintext =
                    decrypt(&info.content_encryption_algorithm, password, ciphertext.as_bytes())?;
                bags.extend(Vec::<SafeBag>::from_der(&plaintext).map_err(malformed)?);
            }
            other => {
                return Err(ProvKitError::UnsupportedAlgorithm(format!(
                    "content type {other}"
                )));
            }
        }
    }
    Ok(bags)
}

fn local_key_id(bag: &SafeBag) -> Option<Vec<u8>> {
    bag.attribute(LOCAL_KEY_ID)
        .filter(|value| value.tag() == Tag::OctetString)
        .map(|value| value.value().to_vec())
}

struct BagCertificate {
    certificate: Certificate,
    local_key_id: Option<Vec<u8>>,
}

impl BagCertificate {
    fn read(bag: &SafeBag) -> Result<Self> {
        let cert_bag = bag.bag_value.decode_as::<CertBag>().map_err(malformed)?;
        if cert_bag.cert_id != X509_CERTIFICATE {
            return Err(ProvKitError::UnsupportedAlgorithm(format!(
                "certificate type {}",
                cert_bag.cert_id
            )));
        }
        let certificate =
            Certificate::from_der(cert_bag.cert_value.as_bytes()).map_err(malformed)?;
        Ok(Self {
            certificate,
            local_key_id: local_key_id(bag),
        })
    }
}

struct BagKey {
    key_pair: KeyPair,
    local_key_id: Option<Vec<u8>>,
}

impl BagKey {
    fn read_shrouded(bag: &SafeBag, password: &str) -> Result<Self> {
        let shrouded = bag.bag_value.decode_as::<ShroudedKeyBag>().map_err(malformed)?;
        let pkcs8 = decrypt(
            &shrouded.encryption_algorithm,
            password,
            shrouded.encrypted_data.as_bytes(),
        )?;
        Self::from_pkcs8(&pkcs8, bag)
    }

    fn read_plain(bag: &SafeBag) -> Result<Self> {
        let pkcs8 = Zeroizing::new(bag.bag_value.to_der()?);
        Self::from_pkcs8(&pkcs8, bag)
    }

    fn from_pkcs8(der: &[u8], bag: &SafeBag) -> Result<Self> {
        let key_pair = KeyPair::from_pkcs8_der(der)
            .map_err(|e| ProvKitError::UnsupportedAlgorithm(format!("private key: {e}")))?;
        Ok(Self {
            key_pair,
            local_key_id: local_key_id(bag),
        })
    }

    /// Matches by `localKeyId` when both sides carry one, otherwise by public key.
    fn belongs_to(&self, entry: &BagCertificate, public_key: Option<&PublicKey>) -> bool {
        match (&self.local_key_id, &entry.local_key_id) {
            (Some(key_id), Some(cert_id)) => key_id == cert_id,
            _ => public_key.is_some_and(|pk| *pk == self.key_pair.public_key()),
        }
    }
}

/// Attaches each key to the first certificate it belongs to.
fn pair_keys(entries: Vec<BagCertificate>, keys: Vec<BagKey>) -> Result<Vec<Certificate>> {
    let mut keys: Vec<Option<BagKey>> = keys.into_iter().map(Some).collect();
    let mut certificates = Vec::with_capacity(entries.len());
    for entry in entries {
        let public_key = entry.certificate.public_key().ok();
        let position = keys.iter().position(|key| {
            key.as_ref()
                .is_some_and(|key| key.belongs_to(&entry, public_key.as_ref()))
        });
        let certificate = match position.and_then(|i| keys[i].take()) {
            Some(key) => entry
                .certificate
                .with_private_key(key.key_pair)
                .map_err(|_| malformed("private key does not match its certificate"))?,
            None => entry.certificate,
        };
        certificates.push(certificate);
    }
    let unmatched = keys.iter().flatten().count();
    if unmatched > 0 {
        log::warn!("{unmatched} private key(s) in archive match no certificate");
    }
    Ok(certificates)
}

/// Reads PKCS #12 archives.
pub struct Pkcs12Loader {
    observer: Box<dyn ArchiveObserver>,
}

impl Default for Pkcs12Loader {
    fn default() -> Self {
        Self::with_observer(LogObserver)
    }
}

impl Pkcs12Loader {
    pub fn new() -> Self {
        Self::default()
    }

    /// A loader that reports entries to `observer` instead of the log.
    pub fn with_observer(observer: impl ArchiveObserver + 'static) -> Self {
        Self {
            observer: Box::new(observer),
        }
    }

    /// Unpacks an archive.
    ///
    /// # Returns
    /// `Ok(None)` when the archive is intact but no certificate has a private key.
    ///
    /// # Errors
    /// * [`ProvKitError::DecryptionFailed`] - wrong password or failed integrity check.
    /// * [`ProvKitError::MalformedArchive`] - the archive structure cannot be parsed.
    /// * [`ProvKitError::UnsupportedAlgorithm`] - encryption or MAC scheme not supported.
    pub fn unpack(&self, bytes: &[u8], password: &str) -> Result<Option<LoadedArchive>> {
        let mut entries = Vec::new();
        let mut keys = Vec::new();
        for bag in read_bags(bytes, password)? {
            match bag.bag_id {
                CERT_BAG => entries.push(BagCertificate::read(&bag)?),
                PKCS8_SHROUDED_KEY_BAG => keys.push(BagKey::read_shrouded(&bag, password)?),
                KEY_BAG => keys.push(BagKey::read_plain(&bag)?),
                other => log::debug!("skipping safe bag of type {other}"),
            }
        }

        let mut primary: Option<Certificate> = None;
        let mut auxiliary = Vec::new();
        for mut certificate in pair_keys(entries, keys)? {
            self.observer.entry_found(&ArchiveEntry {
                thumbprint: certificate.thumbprint_hex()?,
                subject: certificate.subject_name(),
                has_private_key: certificate.has_private_key(),
            });
            if primary.is_none() && certificate.has_private_key() {
                primary = Some(certificate);
                continue;
            }
            if certificate.take_private_key().is_some() {
                log::warn!(
                    "ignoring private key of '{}': archive already has a primary certificate",
                    certificate.subject_name()
                );
            }
            auxiliary.push(certificate);
        }

        match primary {
            Some(primary) => {
                self.observer.primary_selected(&primary);
                Ok(Some(LoadedArchive { primary, auxiliary }))
            }
            None => {
                self.observer.no_private_key();
                Ok(None)
            }
        }
    }

    /// Reads and unpacks an archive file.
    ///
    /// # Errors
    /// [`ProvKitError::InvalidPath`] for an empty path or a directory,
    /// [`ProvKitError::FileNotFound`] when nothing exists at `path`, plus
    /// everything [`Pkcs12Loader::unpack`] returns.
    pub fn load_file(&self, path: &Path, password: &str) -> Result<Option<LoadedArchive>> {
        if path.as_os_str().is_empty() {
            return Err(ProvKitError::InvalidPath(
                "archive path must not be empty".to_string(),
            ));
        }
        if path.is_dir() {
            return Err(ProvKitError::InvalidPath(format!(
                "{} is a directory",
                path.display()
            )));
        }
        if !path.exists() {
            return Err(ProvKitError::FileNotFound(path.to_path_buf()));
        }
        let bytes = fs::read(path)?;
        self.unpack(&bytes, password)
    }

    /// Loads an archive that must provide a signing certificate.
    pub fn load_signing_archive(&self, path: &Path, password: &str) -> Result<LoadedArchive> {
        self.load_file(path, password)?
            .ok_or(ProvKitError::NoUsablePrivateKeyCertificate)
    }
}
