//! use provkit::error::ProvKitError;

use std::path::PathBuf;

use thiserror::Error;

/// Represents errors that can occur while building certificates or handling archives.
///
/// Every variant is a deterministic input or data problem; nothing here is retried.
#[derive(Debug, Error, Clone)]
pub enum ProvKitError {
    /// The subject name is not acceptable for the requested role.
    #[error("Invalid subject name '{0}': must be a valid DNS host name")]
    InvalidSubjectName(String),

    /// Attempted to sign with a certificate that carries no private key.
    #[error("Issuer certificate '{0}' has no private key")]
    IssuerMissingPrivateKey(String),

    /// Attempted to package a primary certificate that carries no private key.
    #[error("Certificate '{0}' has no private key to package")]
    MissingPrivateKey(String),

    /// The archive path does not exist.
    #[error("{} does not exist", .0.display())]
    FileNotFound(PathBuf),

    /// The archive path is empty or does not name a file.
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Wrong archive password, or integrity check failure.
    #[error("Failed to decrypt archive: wrong password or corrupted data")]
    DecryptionFailed,

    /// Structural corruption of an archive.
    #[error("Malformed archive: {0}")]
    MalformedArchive(String),

    /// The archive parsed but contains no certificate with a private key.
    #[error("Archive did not contain any certificate with a private key")]
    NoUsablePrivateKeyCertificate,

    /// Error due to invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Requested intermediate chain length is outside `0..=5`.
    #[error("Intermediate count {0} is out of range (0..=5)")]
    InvalidIntermediateCount(u8),

    /// A key identifier did not have the expected SHA-1 length.
    #[error("Invalid key identifier: expected 20 bytes, found {0}")]
    InvalidKeyIdentifier(usize),

    /// An algorithm found in a certificate or archive is not supported.
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// A private key does not belong to the certificate it was attached to.
    #[error("Private key does not match the certificate public key")]
    KeyMismatch,

    /// Error during data encoding.
    #[error("Failed to encode data: {0}")]
    EncodingError(String),

    /// Error during data decoding.
    #[error("Failed to decode data: {0}")]
    DecodingError(String),

    /// Error from the signature backend.
    #[error("Signing error: {0}")]
    SigningError(String),

    /// Error reading or writing a file.
    #[error("I/O error: {0}")]
    Io(String),
}

impl ProvKitError {
    /// Process exit code reported by the command line tool for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            ProvKitError::NoUsablePrivateKeyCertificate
            | ProvKitError::InvalidSubjectName(_)
            | ProvKitError::InvalidInput(_)
            | ProvKitError::InvalidIntermediateCount(_)
            | ProvKitError::IssuerMissingPrivateKey(_)
            | ProvKitError::MissingPrivateKey(_) => -1,
            ProvKitError::FileNotFound(_) | ProvKitError::InvalidPath(_) | ProvKitError::Io(_) => {
                -2
            }
            ProvKitError::DecryptionFailed
            | ProvKitError::MalformedArchive(_)
            | ProvKitError::UnsupportedAlgorithm(_) => -3,
            _ => -4,
        }
    }
}

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, ProvKitError>;

impl From<der::Error> for ProvKitError {
    /// Converts a `der::Error` into a `ProvKitError`.
    fn from(err: der::Error) -> Self {
        ProvKitError::DecodingError(err.to_string())
    }
}

impl From<pkcs8::Error> for ProvKitError {
    fn from(err: pkcs8::Error) -> Self {
        ProvKitError::DecodingError(err.to_string())
    }
}

impl From<x509_cert::spki::Error> for ProvKitError {
    fn from(err: x509_cert::spki::Error) -> Self {
        ProvKitError::DecodingError(err.to_string())
    }
}

impl From<std::io::Error> for ProvKitError {
    fn from(err: std::io::Error) -> Self {
        ProvKitError::Io(err.to_string())
    }
}
