//! The fixed extension profile used for provisioning certificates.
//!
//! Extensions are a pure function of the certificate role, the subject, and
//! (when present) the issuer's key identifier.

use super::Certificate;
use super::extensions::{
    AuthorityKeyIdentifier, BasicConstraints, ExtendedKeyUsage, ExtendedKeyUsageOption, Extension,
    FlagSet, KeyUsage, KeyUsages, SubjectAltName, SubjectKeyIdentifier,
};
use crate::error::Result;
use crate::key::PublicKey;

/// Path length constraint placed on every CA certificate.
pub const CA_PATH_LEN_CONSTRAINT: u32 = 12;

/// Position of a certificate in the provisioning hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Root,
    Intermediate,
    Leaf,
}

impl Role {
    pub fn is_ca(self) -> bool {
        !matches!(self, Role::Leaf)
    }
}

/// Builds the ordered extension set for a certificate.
///
/// # Arguments
/// * `role` - Root, intermediate or leaf profile.
/// * `subject_public_key` - Source of the Subject Key Identifier.
/// * `subject_name` - The single DNS name placed in the Subject Alternative Name.
/// * `issuer` - Issuing CA; when present an Authority Key Identifier pointing at
///   its Subject Key Identifier is added.
pub fn encode_for_role(
    role: Role,
    subject_public_key: &PublicKey,
    subject_name: &str,
    issuer: Option<&Certificate>,
) -> Result<Vec<Extension>> {
    let (basic_constraints, key_usage) = if role.is_ca() {
        (
            BasicConstraints {
                is_ca: true,
                max_path_length: Some(CA_PATH_LEN_CONSTRAINT),
            },
            KeyUsage(KeyUsages::KeyCertSign.into()),
        )
    } else {
        let flags: FlagSet<KeyUsages> = KeyUsages::DigitalSignature | KeyUsages::KeyEncipherment;
        (
            BasicConstraints {
                is_ca: false,
                max_path_length: None,
            },
            KeyUsage(flags),
        )
    };

    let mut extensions = vec![
        Extension::BasicConstraints(basic_constraints),
        Extension::KeyUsage(key_usage),
    ];

    if let Some(issuer) = issuer {
        let issuer_key_id = issuer.key_identifier()?;
        extensions.push(Extension::AuthorityKeyIdentifier(
            AuthorityKeyIdentifier::from_issuer_key_id(&issuer_key_id)?,
        ));
    }

    extensions.push(Extension::SubjectAltName(SubjectAltName {
        names: vec![subject_name.to_string()],
    }));

    if role == Role::Leaf {
        extensions.push(Extension::ExtendedKeyUsage(ExtendedKeyUsage {
            usage: vec![
                ExtendedKeyUsageOption::ClientAuth,
                ExtendedKeyUsageOption::ServerAuth,
            ],
        }));
    }

    extensions.push(Extension::SubjectKeyIdentifier(
        SubjectKeyIdentifier::from_public_key(subject_public_key),
    ));

    Ok(extensions)
}
