use std::fmt;

use der::{Decode, asn1::ObjectIdentifier};
use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{DerSignature, SigningKey, VerifyingKey};
use p256::pkcs8::{DecodePrivateKey, EncodePrivateKey, EncodePublicKey};
use pkcs8::SecretDocument;
use sha1::{Digest, Sha1};
use x509_cert::spki::SubjectPublicKeyInfoOwned;

use crate::error::{ProvKitError, Result};

/// Length of an RFC 5280 method-1 key identifier (a SHA-1 digest).
pub const KEY_IDENTIFIER_LEN: usize = 20;

/// An ECDSA P-256 signing key pair.
///
/// The secret scalar is zeroized when the pair is dropped. The type is
/// deliberately not `Clone`: a private key has exactly one owner.
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    /// Generate an ECDSA P-256 key pair from the operating system RNG.
    pub fn generate() -> Self {
        let mut rng = rand_core::OsRng;
        Self {
            signing_key: SigningKey::random(&mut rng),
        }
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(*self.signing_key.verifying_key())
    }

    /// Signs `data` with ECDSA/SHA-256 and returns the DER `ECDSA-Sig-Value`.
    pub fn sign_data(&self, data: &[u8]) -> Result<Vec<u8>> {
        let signature: DerSignature = self
            .signing_key
            .try_sign(data)
            .map_err(|e| ProvKitError::SigningError(e.to_string()))?;
        Ok(signature.as_bytes().to_vec())
    }

    /// Encodes the private key as an unencrypted PKCS#8 document.
    pub fn to_pkcs8_der(&self) -> Result<SecretDocument> {
        Ok(self.signing_key.to_pkcs8_der()?)
    }

    pub fn from_pkcs8_der(der: &[u8]) -> Result<Self> {
        Ok(Self {
            signing_key: SigningKey::from_pkcs8_der(der)?,
        })
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

/// The public half of a [`KeyPair`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PublicKey(VerifyingKey);

impl PublicKey {
    /// Encodes the key as a `SubjectPublicKeyInfo` (id-ecPublicKey, secp256r1).
    pub fn to_spki(&self) -> Result<SubjectPublicKeyInfoOwned> {
        let document = self.0.to_public_key_der()?;
        Ok(SubjectPublicKeyInfoOwned::from_der(document.as_bytes())?)
    }

    /// Reads a P-256 key out of a certificate's `SubjectPublicKeyInfo`.
    pub fn from_x509spki(spki: &SubjectPublicKeyInfoOwned) -> Result<Self> {
        if spki.algorithm.oid != const_oid::db::rfc5912::ID_EC_PUBLIC_KEY {
            return Err(ProvKitError::UnsupportedAlgorithm(format!(
                "public key algorithm {}",
                spki.algorithm.oid
            )));
        }
        let curve = spki
            .algorithm
            .parameters
            .as_ref()
            .map(|params| params.decode_as::<ObjectIdentifier>())
            .transpose()?;
        if curve != Some(const_oid::db::rfc5912::SECP_256_R_1) {
            return Err(ProvKitError::UnsupportedAlgorithm(
                "elliptic curve other than P-256".to_string(),
            ));
        }
        let verifying_key = VerifyingKey::from_sec1_bytes(spki.subject_public_key.raw_bytes())
            .map_err(|e| ProvKitError::DecodingError(e.to_string()))?;
        Ok(Self(verifying_key))
    }

    /// Uncompressed SEC1 point, the contents of the SPKI `subjectPublicKey` BIT STRING.
    pub fn to_sec1_bytes(&self) -> Vec<u8> {
        self.0.to_encoded_point(false).as_bytes().to_vec()
    }

    /// RFC 5280 method (1) key identifier: SHA-1 over the `subjectPublicKey` bits.
    pub fn key_identifier(&self) -> [u8; KEY_IDENTIFIER_LEN] {
        let digest = Sha1::digest(self.to_sec1_bytes());
        let mut id = [0u8; KEY_IDENTIFIER_LEN];
        id.copy_from_slice(&digest);
        id
    }

    /// Checks a DER-encoded ECDSA/SHA-256 signature over `data`.
    pub fn verify(&self, data: &[u8], signature: &[u8]) -> bool {
        match DerSignature::try_from(signature) {
            Ok(signature) => self.0.verify(data, &signature).is_ok(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pkcs8_round_trip_keeps_public_key() {
        let key_pair = KeyPair::generate();
        let document = key_pair.to_pkcs8_der().unwrap();
        let restored = KeyPair::from_pkcs8_der(document.as_bytes()).unwrap();
        assert_eq!(key_pair.public_key(), restored.public_key());
    }

    #[test]
    fn signature_verifies_only_for_signed_data() {
        let key_pair = KeyPair::generate();
        let signature = key_pair.sign_data(b"tbs").unwrap();
        assert!(key_pair.public_key().verify(b"tbs", &signature));
        assert!(!key_pair.public_key().verify(b"other", &signature));
        assert!(!KeyPair::generate().public_key().verify(b"tbs", &signature));
    }

    #[test]
    fn spki_round_trip() {
        let public_key = KeyPair::generate().public_key();
        let spki = public_key.to_spki().unwrap();
        assert_eq!(PublicKey::from_x509spki(&spki).unwrap(), public_key);
        assert_eq!(spki.subject_public_key.raw_bytes(), public_key.to_sec1_bytes());
    }
}
