use std::time::SystemTime;

use der::asn1::{GeneralizedTime, OctetString, UtcTime};
use time::OffsetDateTime;
use x509_cert::Version;
use x509_cert::certificate::TbsCertificateInner;
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;

use crate::cert::SignatureAlgorithm;
use crate::cert::params::{ExtensionParam, Validity};
use crate::error::{ProvKitError, Result};
use crate::key::PublicKey;

/// Represents the "To Be Signed" (TBS) portion of an X.509 certificate.
///
/// # Fields
/// * `serial_number` - The unique identifier for the certificate.
/// * `signature_algorithm` - The algorithm used to sign the certificate.
/// * `issuer` - The distinguished name of the certificate issuer.
/// * `validity` - The certificate's validity period.
/// * `subject` - The distinguished name of the certificate subject.
/// * `subject_public_key` - The public key of the certificate subject.
/// * `extensions` - X.509v3 extensions, in encoding order.
pub struct TbsCertificate {
    pub serial_number: SerialNumber,
    pub signature_algorithm: SignatureAlgorithm,
    pub issuer: Name,
    pub validity: Validity,
    pub subject: Name,
    pub subject_public_key: PublicKey,
    pub extensions: Vec<ExtensionParam>,
}

impl TbsCertificate {
    /// Converts the `TbsCertificate` into a `TbsCertificateInner` for DER encoding.
    pub fn to_tbs_certificate_inner(&self) -> Result<TbsCertificateInner> {
        let extensions = self
            .extensions
            .iter()
            .map(|ext| {
                Ok(x509_cert::ext::Extension {
                    extn_id: ext.oid,
                    critical: ext.critical,
                    extn_value: OctetString::new(ext.value.clone())?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let validity = x509_cert::time::Validity {
            not_before: to_x509_time(self.validity.not_before)?,
            not_after: to_x509_time(self.validity.not_after)?,
        };

        Ok(TbsCertificateInner {
            version: Version::V3,
            serial_number: self.serial_number.clone(),
            signature: self.signature_algorithm.into(),
            issuer: self.issuer.clone(),
            validity,
            subject: self.subject.clone(),
            subject_public_key_info: self.subject_public_key.to_spki()?,
            issuer_unique_id: None,
            subject_unique_id: None,
            extensions: Some(extensions),
        })
    }
}

/// RFC 5280: UTCTime through 2049, GeneralizedTime from 2050 on.
pub(crate) fn to_x509_time(t: OffsetDateTime) -> Result<x509_cert::time::Time> {
    let system_time: SystemTime = t.into();
    let time = if t.year() < 2050 {
        x509_cert::time::Time::UtcTime(
            UtcTime::from_system_time(system_time)
                .map_err(|e| ProvKitError::EncodingError(e.to_string()))?,
        )
    } else {
        x509_cert::time::Time::GeneralTime(
            GeneralizedTime::from_system_time(system_time)
                .map_err(|e| ProvKitError::EncodingError(e.to_string()))?,
        )
    };
    Ok(time)
}

pub(crate) fn from_x509_time(t: &x509_cert::time::Time) -> OffsetDateTime {
    match t {
        x509_cert::time::Time::UtcTime(ut) => OffsetDateTime::from(ut.to_system_time()),
        x509_cert::time::Time::GeneralTime(gt) => OffsetDateTime::from(gt.to_system_time()),
    }
}
