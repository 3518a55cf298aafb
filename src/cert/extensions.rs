use const_oid::AssociatedOid;
use der::{
    Decode, Encode,
    asn1::{Ia5String, OctetString},
    oid::ObjectIdentifier,
};
use x509_cert::ext::pkix::name::GeneralName;

pub use der::flagset::FlagSet;
use x509_cert::ext::pkix::KeyUsage as X509KeyUsage;
pub use x509_cert::ext::pkix::KeyUsages;

use crate::error::ProvKitError;
use crate::key::{KEY_IDENTIFIER_LEN, PublicKey};

use super::params::ExtensionParam;

/// Trait for converting to and from X.509 extensions.
///
/// This trait provides methods to encode and decode X.509 extension values.
///
/// # Example
/// ```
/// use provkit::cert::extensions::SubjectAltName;
/// use provkit::cert::extensions::ToAndFromX509Extension;
/// let san = SubjectAltName { names: vec!["device-001".to_string()] };
/// let encoded = san.to_x509_extension_value().unwrap();
/// let decoded = SubjectAltName::from_x509_extension_value(&encoded).unwrap();
/// assert_eq!(san.names, decoded.names);
/// ```
pub trait ToAndFromX509Extension {
    /// The Object Identifier (OID) for the extension.
    const OID: ObjectIdentifier;

    /// Encodes the extension into a DER-encoded byte vector.
    fn to_x509_extension_value(&self) -> Result<Vec<u8>, ProvKitError>;

    /// Decodes the extension from a DER-encoded byte slice.
    fn from_x509_extension_value(extension: &[u8]) -> Result<Self, ProvKitError>
    where
        Self: Sized;
}

/// Represents the Subject Alternative Name (SAN) extension.
///
/// # Fields
/// * `names` - A list of DNS names. Other general name forms are skipped on decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectAltName {
    pub names: Vec<String>,
}

impl ToAndFromX509Extension for SubjectAltName {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::SubjectAltName::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>, ProvKitError> {
        let san = x509_cert::ext::pkix::SubjectAltName(
            self.names
                .iter()
                .map(|name| {
                    Ia5String::new(name)
                        .map(GeneralName::DnsName)
                        .map_err(|e| ProvKitError::InvalidInput(e.to_string()))
                })
                .collect::<Result<Vec<_>, _>>()?,
        );

        Ok(san.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self, ProvKitError> {
        let san = x509_cert::ext::pkix::SubjectAltName::from_der(extension)?;
        let names = san
            .0
            .iter()
            .filter_map(|name| match name {
                GeneralName::DnsName(dns) => Some(dns.to_string()),
                _ => None,
            })
            .collect();
        Ok(Self { names })
    }
}

/// Represents the Basic Constraints extension.
///
/// # Fields
/// * `is_ca` - Indicates if the certificate is a CA.
/// * `max_path_length` - The maximum number of intermediate CAs allowed below this one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BasicConstraints {
    pub is_ca: bool,
    pub max_path_length: Option<u32>,
}

impl BasicConstraints {
    /// Path length as most X.509 toolkits report it: an absent constraint reads as 0.
    pub fn path_len_constraint(&self) -> u32 {
        self.max_path_length.unwrap_or(0)
    }
}

impl ToAndFromX509Extension for BasicConstraints {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::BasicConstraints::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>, ProvKitError> {
        let path_len_constraint = self
            .max_path_length
            .map(u8::try_from)
            .transpose()
            .map_err(|e| ProvKitError::InvalidInput(e.to_string()))?;
        let bc = x509_cert::ext::pkix::BasicConstraints {
            ca: self.is_ca,
            path_len_constraint,
        };

        Ok(bc.to_der()?)
    }

    fn from_x509_extension_value(der_bytes: &[u8]) -> Result<Self, ProvKitError> {
        let bc = x509_cert::ext::pkix::BasicConstraints::from_der(der_bytes)?;
        Ok(Self {
            is_ca: bc.ca,
            max_path_length: bc.path_len_constraint.map(u32::from),
        })
    }
}

/// Represents the Key Usage extension.
///
/// This extension defines the purpose of the key contained in the certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyUsage(pub FlagSet<KeyUsages>);

impl ToAndFromX509Extension for KeyUsage {
    const OID: ObjectIdentifier = <X509KeyUsage as AssociatedOid>::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>, ProvKitError> {
        let ku = X509KeyUsage::from(self.0);
        Ok(ku.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self, ProvKitError> {
        let ku = X509KeyUsage::from_der(extension)?;
        Ok(Self(ku.0))
    }
}

/// Represents the Extended Key Usage extension.
///
/// This extension indicates purposes for which the public key may be used.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtendedKeyUsage {
    pub usage: Vec<ExtendedKeyUsageOption>,
}

impl ExtendedKeyUsage {
    pub fn oids(&self) -> Vec<ObjectIdentifier> {
        self.usage.iter().map(|v| (*v).into()).collect()
    }
}

impl ToAndFromX509Extension for ExtendedKeyUsage {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::ExtendedKeyUsage::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>, ProvKitError> {
        let eku = x509_cert::ext::pkix::ExtendedKeyUsage(self.oids());
        Ok(eku.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self, ProvKitError> {
        let eku = x509_cert::ext::pkix::ExtendedKeyUsage::from_der(extension)?;
        let usage = eku.0.into_iter().map(ExtendedKeyUsageOption::from).collect();
        Ok(Self { usage })
    }
}

/// Represents an option for the Extended Key Usage extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtendedKeyUsageOption {
    /// TLS client authentication, `1.3.6.1.5.5.7.3.2`.
    ClientAuth,
    /// TLS server authentication, `1.3.6.1.5.5.7.3.1`.
    ServerAuth,
    /// Any other purpose found on a loaded certificate.
    Other(ObjectIdentifier),
}

impl From<ExtendedKeyUsageOption> for ObjectIdentifier {
    fn from(value: ExtendedKeyUsageOption) -> Self {
        match value {
            ExtendedKeyUsageOption::ClientAuth => const_oid::db::rfc5912::ID_KP_CLIENT_AUTH,
            ExtendedKeyUsageOption::ServerAuth => const_oid::db::rfc5912::ID_KP_SERVER_AUTH,
            ExtendedKeyUsageOption::Other(oid) => oid,
        }
    }
}

impl From<ObjectIdentifier> for ExtendedKeyUsageOption {
    fn from(oid: ObjectIdentifier) -> Self {
        match oid {
            const_oid::db::rfc5912::ID_KP_CLIENT_AUTH => ExtendedKeyUsageOption::ClientAuth,
            const_oid::db::rfc5912::ID_KP_SERVER_AUTH => ExtendedKeyUsageOption::ServerAuth,
            other => ExtendedKeyUsageOption::Other(other),
        }
    }
}

/// Represents the Subject Key Identifier (SKI) extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectKeyIdentifier {
    pub key_identifier: Vec<u8>,
}

impl SubjectKeyIdentifier {
    /// Derives the identifier from the subject public key (RFC 5280 method 1).
    pub fn from_public_key(public_key: &PublicKey) -> Self {
        Self {
            key_identifier: public_key.key_identifier().to_vec(),
        }
    }
}

impl ToAndFromX509Extension for SubjectKeyIdentifier {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::SubjectKeyIdentifier::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>, ProvKitError> {
        let ski =
            x509_cert::ext::pkix::SubjectKeyIdentifier(OctetString::new(self.key_identifier.clone())?);
        Ok(ski.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self, ProvKitError> {
        let ski = x509_cert::ext::pkix::SubjectKeyIdentifier::from_der(extension)?;
        Ok(Self {
            key_identifier: ski.0.as_bytes().to_vec(),
        })
    }
}

/// Represents the Authority Key Identifier (AKI) extension.
///
/// Only the `keyIdentifier` form is produced; it links a certificate to the
/// Subject Key Identifier of its issuer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorityKeyIdentifier {
    pub key_identifier: Vec<u8>,
}

impl AuthorityKeyIdentifier {
    /// Builds the AKI from an issuer's Subject Key Identifier.
    ///
    /// The identifier must be a 20-byte SHA-1 key id.
    pub fn from_issuer_key_id(key_id: &[u8]) -> Result<Self, ProvKitError> {
        if key_id.len() != KEY_IDENTIFIER_LEN {
            return Err(ProvKitError::InvalidKeyIdentifier(key_id.len()));
        }
        Ok(Self {
            key_identifier: key_id.to_vec(),
        })
    }
}

/// SEQUENCE header for an AKI holding only a 20-byte `[0] keyIdentifier`.
const AKI_SEQUENCE_HEADER: [u8; 2] = [0x30, 0x16];
/// Context-specific primitive tag 0 with length 20.
const AKI_KEY_ID_HEADER: [u8; 2] = [0x80, 0x14];

impl ToAndFromX509Extension for AuthorityKeyIdentifier {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::AuthorityKeyIdentifier::OID;

    /// Produces `30 16 80 14 <keyId>`.
    fn to_x509_extension_value(&self) -> Result<Vec<u8>, ProvKitError> {
        if self.key_identifier.len() != KEY_IDENTIFIER_LEN {
            return Err(ProvKitError::InvalidKeyIdentifier(
                self.key_identifier.len(),
            ));
        }
        let mut value = Vec::with_capacity(4 + KEY_IDENTIFIER_LEN);
        value.extend_from_slice(&AKI_SEQUENCE_HEADER);
        value.extend_from_slice(&AKI_KEY_ID_HEADER);
        value.extend_from_slice(&self.key_identifier);
        Ok(value)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self, ProvKitError> {
        let aki = x509_cert::ext::pkix::AuthorityKeyIdentifier::from_der(extension)?;
        let key_identifier = aki
            .key_identifier
            .map(|id| id.as_bytes().to_vec())
            .ok_or_else(|| {
                ProvKitError::DecodingError(
                    "authority key identifier has no keyIdentifier".to_string(),
                )
            })?;
        Ok(Self { key_identifier })
    }
}

/// One extension of the fixed provisioning profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extension {
    BasicConstraints(BasicConstraints),
    KeyUsage(KeyUsage),
    ExtendedKeyUsage(ExtendedKeyUsage),
    SubjectAltName(SubjectAltName),
    SubjectKeyIdentifier(SubjectKeyIdentifier),
    AuthorityKeyIdentifier(AuthorityKeyIdentifier),
}

impl Extension {
    pub fn oid(&self) -> ObjectIdentifier {
        match self {
            Extension::BasicConstraints(_) => BasicConstraints::OID,
            Extension::KeyUsage(_) => KeyUsage::OID,
            Extension::ExtendedKeyUsage(_) => ExtendedKeyUsage::OID,
            Extension::SubjectAltName(_) => SubjectAltName::OID,
            Extension::SubjectKeyIdentifier(_) => SubjectKeyIdentifier::OID,
            Extension::AuthorityKeyIdentifier(_) => AuthorityKeyIdentifier::OID,
        }
    }

    /// Basic constraints and key usage are critical; everything else is not.
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            Extension::BasicConstraints(_) | Extension::KeyUsage(_)
        )
    }

    /// Encodes the extension into its OID/criticality/value triple.
    pub fn to_param(&self) -> Result<ExtensionParam, ProvKitError> {
        let critical = self.is_critical();
        match self {
            Extension::BasicConstraints(ext) => ExtensionParam::from_extension(ext, critical),
            Extension::KeyUsage(ext) => ExtensionParam::from_extension(ext, critical),
            Extension::ExtendedKeyUsage(ext) => ExtensionParam::from_extension(ext, critical),
            Extension::SubjectAltName(ext) => ExtensionParam::from_extension(ext, critical),
            Extension::SubjectKeyIdentifier(ext) => ExtensionParam::from_extension(ext, critical),
            Extension::AuthorityKeyIdentifier(ext) => {
                ExtensionParam::from_extension(ext, critical)
            }
        }
    }
}
