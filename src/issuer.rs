use der::Encode;
use x509_cert::name::Name;

use crate::cert::Certificate;
use crate::cert::params::Validity;
use crate::error::{ProvKitError, Result};
use crate::key::KeyPair;
use crate::tbs_certificate::TbsCertificate;

/// Represents an entity capable of signing certificates.
///
/// This trait provides methods to retrieve issuer details and sign a prepared
/// [`TbsCertificate`].
pub trait Issuer {
    /// Returns the distinguished name placed in the issued certificate's `issuer` field.
    fn issuer_name(&self) -> Name;

    /// Returns the signing key of the issuer.
    ///
    /// Fails with [`ProvKitError::IssuerMissingPrivateKey`] when the issuer holds
    /// only a public certificate.
    fn signing_key(&self) -> Result<&KeyPair>;

    /// The window issued certificates are clamped to; `None` for self-signing.
    fn validity(&self) -> Option<Validity>;

    /// Signs the TBS structure with the issuer key.
    ///
    /// # Arguments
    /// * `tbs` - The certificate body, with extensions already encoded.
    ///
    /// # Returns
    /// The signed `x509-cert` certificate.
    fn sign(&self, tbs: &TbsCertificate) -> Result<x509_cert::Certificate> {
        let key = self.signing_key()?;
        let tbs_cert_inner = tbs.to_tbs_certificate_inner()?;
        let signature = key.sign_data(&tbs_cert_inner.to_der()?)?;

        Ok(x509_cert::Certificate {
            tbs_certificate: tbs_cert_inner,
            signature_algorithm: tbs.signature_algorithm.into(),
            signature: der::asn1::BitString::from_bytes(&signature)?,
        })
    }
}

impl Issuer for Certificate {
    fn issuer_name(&self) -> Name {
        // The name of the issuer is the subject of the certificate
        self.subject().clone()
    }

    fn signing_key(&self) -> Result<&KeyPair> {
        self.private_key()
            .ok_or_else(|| ProvKitError::IssuerMissingPrivateKey(self.subject_name()))
    }

    fn validity(&self) -> Option<Validity> {
        Some(Certificate::validity(self))
    }
}

/// Issuer for self-signed certificates: the subject signs its own body.
pub struct SelfIssuer<'a> {
    pub name: Name,
    pub key: &'a KeyPair,
}

impl Issuer for SelfIssuer<'_> {
    fn issuer_name(&self) -> Name {
        self.name.clone()
    }

    fn signing_key(&self) -> Result<&KeyPair> {
        Ok(self.key)
    }

    fn validity(&self) -> Option<Validity> {
        None
    }
}
