pub mod builder;
pub mod extensions;
pub mod params;
pub mod profile;

use std::fmt;

use der::{Decode, Encode};
use extensions::{
    AuthorityKeyIdentifier, BasicConstraints, ExtendedKeyUsage, KeyUsage, SubjectAltName,
    SubjectKeyIdentifier, ToAndFromX509Extension,
};
use params::Validity;
use sha1::{Digest, Sha1};
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;

use crate::error::{ProvKitError, Result};
use crate::key::{KeyPair, PublicKey};
use crate::tbs_certificate::from_x509_time;

/// Signature algorithms used for issued certificates.
///
/// Only ECDSA over P-256 is produced, so this has a single member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    /// ECDSA with SHA-256, `1.2.840.10045.4.3.2`, with absent parameters.
    EcdsaWithSha256,
}

impl From<SignatureAlgorithm> for x509_cert::spki::AlgorithmIdentifierOwned {
    fn from(value: SignatureAlgorithm) -> Self {
        match value {
            SignatureAlgorithm::EcdsaWithSha256 => x509_cert::spki::AlgorithmIdentifierOwned {
                oid: const_oid::db::rfc5912::ECDSA_WITH_SHA_256,
                parameters: None,
            },
        }
    }
}

/// An X.509 certificate, optionally owning the private key of its subject.
///
/// The signed part never changes after creation. The private key can be
/// dropped with [`Certificate::public_only`] or taken with
/// [`Certificate::take_private_key`].
pub struct Certificate {
    inner: x509_cert::Certificate,
    key: Option<KeyPair>,
}

impl Certificate {
    pub(crate) fn new(inner: x509_cert::Certificate, key: Option<KeyPair>) -> Self {
        Self { inner, key }
    }

    /// Parses a DER certificate. The result carries no private key.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let inner = x509_cert::Certificate::from_der(der)?;
        Ok(Self { inner, key: None })
    }

    /// Encodes the certificate into DER format.
    ///
    /// # Returns
    /// A byte vector containing the DER-encoded certificate.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        self.inner
            .to_der()
            .map_err(|e| ProvKitError::EncodingError(e.to_string()))
    }

    /// The subject common name, or the full distinguished name when there is no CN.
    pub fn subject_name(&self) -> String {
        let subject = &self.inner.tbs_certificate.subject;
        params::common_name(subject).unwrap_or_else(|| subject.to_string())
    }

    pub fn subject(&self) -> &Name {
        &self.inner.tbs_certificate.subject
    }

    pub fn issuer(&self) -> &Name {
        &self.inner.tbs_certificate.issuer
    }

    pub fn public_key(&self) -> Result<PublicKey> {
        PublicKey::from_x509spki(&self.inner.tbs_certificate.subject_public_key_info)
    }

    pub fn has_private_key(&self) -> bool {
        self.key.is_some()
    }

    pub fn private_key(&self) -> Option<&KeyPair> {
        self.key.as_ref()
    }

    /// Removes and returns the private key, leaving a public-only certificate.
    pub fn take_private_key(&mut self) -> Option<KeyPair> {
        self.key.take()
    }

    /// A copy of the certificate without private key material.
    pub fn public_only(&self) -> Certificate {
        Certificate {
            inner: self.inner.clone(),
            key: None,
        }
    }

    /// Attaches a private key, which must match the certificate's public key.
    pub fn with_private_key(mut self, key: KeyPair) -> Result<Self> {
        if key.public_key() != self.public_key()? {
            return Err(ProvKitError::KeyMismatch);
        }
        self.key = Some(key);
        Ok(self)
    }

    pub fn validity(&self) -> Validity {
        let validity = &self.inner.tbs_certificate.validity;
        Validity {
            not_before: from_x509_time(&validity.not_before),
            not_after: from_x509_time(&validity.not_after),
        }
    }

    pub fn serial_number(&self) -> &SerialNumber {
        &self.inner.tbs_certificate.serial_number
    }

    /// The Unix timestamp encoded in the serial number, if it is one of ours.
    pub fn serial_timestamp(&self) -> Option<u64> {
        params::timestamp_from_serial(self.serial_number().as_bytes())
    }

    /// Looks up and decodes an extension by its type.
    ///
    /// # Returns
    /// `Ok(None)` if the certificate does not carry the extension.
    pub fn find_extension<E: ToAndFromX509Extension>(&self) -> Result<Option<E>> {
        let Some(extensions) = &self.inner.tbs_certificate.extensions else {
            return Ok(None);
        };
        extensions
            .iter()
            .find(|ext| ext.extn_id == E::OID)
            .map(|ext| E::from_x509_extension_value(ext.extn_value.as_bytes()))
            .transpose()
    }

    /// Whether the extension with `oid` is present and marked critical.
    pub fn is_extension_critical(&self, oid: der::oid::ObjectIdentifier) -> Option<bool> {
        self.inner
            .tbs_certificate
            .extensions
            .as_ref()?
            .iter()
            .find(|ext| ext.extn_id == oid)
            .map(|ext| ext.critical)
    }

    pub fn basic_constraints(&self) -> Result<Option<BasicConstraints>> {
        self.find_extension()
    }

    pub fn key_usage(&self) -> Result<Option<KeyUsage>> {
        self.find_extension()
    }

    pub fn extended_key_usage(&self) -> Result<Option<ExtendedKeyUsage>> {
        self.find_extension()
    }

    pub fn subject_alt_name(&self) -> Result<Option<SubjectAltName>> {
        self.find_extension()
    }

    pub fn subject_key_identifier(&self) -> Result<Option<SubjectKeyIdentifier>> {
        self.find_extension()
    }

    pub fn authority_key_identifier(&self) -> Result<Option<AuthorityKeyIdentifier>> {
        self.find_extension()
    }

    /// The identifier children use in their Authority Key Identifier.
    ///
    /// Taken from the Subject Key Identifier extension when present, otherwise
    /// derived from the public key.
    pub fn key_identifier(&self) -> Result<Vec<u8>> {
        match self.subject_key_identifier()? {
            Some(ski) => Ok(ski.key_identifier),
            None => Ok(self.public_key()?.key_identifier().to_vec()),
        }
    }

    pub fn is_ca(&self) -> bool {
        matches!(self.basic_constraints(), Ok(Some(bc)) if bc.is_ca)
    }

    pub fn is_self_signed(&self) -> bool {
        self.inner.tbs_certificate.issuer == self.inner.tbs_certificate.subject
    }

    /// SHA-1 over the DER encoding, as shown by most certificate viewers.
    pub fn thumbprint(&self) -> Result<[u8; 20]> {
        let digest = Sha1::digest(self.to_der()?);
        let mut thumbprint = [0u8; 20];
        thumbprint.copy_from_slice(&digest);
        Ok(thumbprint)
    }

    /// Upper-case hex form of [`Certificate::thumbprint`].
    pub fn thumbprint_hex(&self) -> Result<String> {
        Ok(self
            .thumbprint()?
            .iter()
            .map(|b| format!("{b:02X}"))
            .collect())
    }

    /// Checks that this certificate's signature was made by `issuer`'s key.
    pub fn verify_signed_by(&self, issuer: &Certificate) -> Result<bool> {
        let expected: x509_cert::spki::AlgorithmIdentifierOwned =
            SignatureAlgorithm::EcdsaWithSha256.into();
        if self.inner.signature_algorithm.oid != expected.oid {
            return Err(ProvKitError::UnsupportedAlgorithm(format!(
                "signature algorithm {}",
                self.inner.signature_algorithm.oid
            )));
        }
        let tbs = self.inner.tbs_certificate.to_der()?;
        Ok(issuer
            .public_key()?
            .verify(&tbs, self.inner.signature.raw_bytes()))
    }
}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate")
            .field("subject", &self.subject_name())
            .field("serial_number", self.serial_number())
            .field("has_private_key", &self.has_private_key())
            .finish()
    }
}
