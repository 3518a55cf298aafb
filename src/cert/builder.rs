use time::OffsetDateTime;

use super::params::{ExtensionParam, SerialNumberSource, SubjectName, Validity};
use super::profile::{Role, encode_for_role};
use super::{Certificate, SignatureAlgorithm};
use crate::config::IssuanceProfile;
use crate::error::{ProvKitError, Result};
use crate::issuer::{Issuer, SelfIssuer};
use crate::key::KeyPair;
use crate::tbs_certificate::TbsCertificate;

/// Assembles and signs provisioning certificates.
///
/// Owns the serial number clock, so certificates built by one builder never
/// share a serial.
#[derive(Debug, Default)]
pub struct CertificateBuilder {
    profile: IssuanceProfile,
    serials: SerialNumberSource,
}

impl CertificateBuilder {
    pub fn new(profile: IssuanceProfile) -> Self {
        Self {
            profile,
            serials: SerialNumberSource::new(),
        }
    }

    /// Builds a certificate for `subject_name` at the current time.
    ///
    /// # Arguments
    /// * `subject_name` - Common name and sole SAN DNS name of the new certificate.
    /// * `key_pair` - The subject's key pair; it ends up owned by the result.
    /// * `role` - Root, intermediate or leaf.
    /// * `issuer` - Signing CA, `None` only for a self-signed root.
    ///
    /// # Returns
    /// The signed certificate, carrying the subject's private key.
    pub fn build(
        &mut self,
        subject_name: &str,
        key_pair: KeyPair,
        role: Role,
        issuer: Option<&Certificate>,
    ) -> Result<Certificate> {
        self.build_at(OffsetDateTime::now_utc(), subject_name, key_pair, role, issuer)
    }

    /// Same as [`CertificateBuilder::build`] with an explicit clock reading.
    pub fn build_at(
        &mut self,
        now: OffsetDateTime,
        subject_name: &str,
        key_pair: KeyPair,
        role: Role,
        issuer: Option<&Certificate>,
    ) -> Result<Certificate> {
        let subject = SubjectName::for_role(subject_name, role)?;

        match (role, issuer) {
            (Role::Root, Some(_)) => {
                return Err(ProvKitError::InvalidInput(
                    "a root certificate is self-signed and takes no issuer".to_string(),
                ));
            }
            (Role::Intermediate | Role::Leaf, None) => {
                return Err(ProvKitError::InvalidInput(format!(
                    "{role:?} certificate '{subject_name}' needs an issuing CA"
                )));
            }
            (_, Some(issuer)) => {
                issuer.signing_key()?;
            }
            (Role::Root, None) => {}
        }

        let issuer_validity = issuer.and_then(Issuer::validity);
        let validity = Validity::clamped(now, &self.profile, issuer_validity.as_ref())?;
        if validity.not_before > validity.not_after {
            return Err(ProvKitError::InvalidInput(format!(
                "issuer validity ends before '{subject_name}' could start"
            )));
        }

        let public_key = key_pair.public_key();
        let extensions = encode_for_role(role, &public_key, subject.as_str(), issuer)?
            .iter()
            .map(|ext| ext.to_param())
            .collect::<Result<Vec<ExtensionParam>>>()?;

        let subject_dn = subject.as_x509_name()?;
        let tbs = TbsCertificate {
            serial_number: self.serials.next_serial(now)?,
            signature_algorithm: SignatureAlgorithm::EcdsaWithSha256,
            issuer: match issuer {
                Some(issuer) => issuer.issuer_name(),
                None => subject_dn.clone(),
            },
            validity,
            subject: subject_dn.clone(),
            subject_public_key: public_key,
            extensions,
        };

        let signed = match issuer {
            Some(issuer) => issuer.sign(&tbs)?,
            None => SelfIssuer {
                name: subject_dn,
                key: &key_pair,
            }
            .sign(&tbs)?,
        };

        log::debug!(
            "built {role:?} certificate '{}' valid {} to {}",
            subject.as_str(),
            validity.not_before,
            validity.not_after
        );

        Ok(Certificate::new(signed, Some(key_pair)))
    }
}
