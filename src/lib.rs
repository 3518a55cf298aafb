//! # provkit - Test PKIs for IoT Device Provisioning
//!
//! provkit builds a private PKI for exercising device provisioning services:
//! a self-signed root CA, up to five intermediate CAs below it, and device
//! certificates signed by any of them. Everything is written to
//! password-protected PKCS #12 archives that OpenSSL and other PKCS #12
//! readers can open, and which provkit itself loads back to sign more
//! certificates. It is built entirely on RustCrypto crates.
//!
//! ## Certificate Profile
//!
//! All keys are ECDSA P-256 and all signatures ECDSA with SHA-256. The
//! extension set is fixed per role:
//!
//! - **CA** (root and intermediates): critical Basic Constraints with
//!   `cA = true` and a path length of 12, critical Key Usage `keyCertSign`.
//! - **Leaf** (devices): critical Basic Constraints with `cA = false`, critical
//!   Key Usage `digitalSignature | keyEncipherment`, Extended Key Usage client
//!   and server authentication.
//! - **All**: the subject name as the single SAN DNS name, a SHA-1 Subject Key
//!   Identifier, and (unless self-signed) an Authority Key Identifier equal to
//!   the issuer's Subject Key Identifier.
//!
//! Serial numbers are issuing timestamps and validity windows never extend past
//! the issuer's.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use provkit::chain::ChainOrchestrator;
//! use provkit::pkcs12::Pkcs12Loader;
//!
//! # fn main() -> Result<(), provkit::error::ProvKitError> {
//! let mut orchestrator = ChainOrchestrator::default();
//!
//! // TestRoot.pfx, TestRoot.cer, Intermediate 1.pfx, Intermediate 2.pfx
//! let chain = orchestrator.generate("TestRoot", "pw1", 2)?;
//! for artifact in &chain.artifacts {
//!     artifact.write_to(std::path::Path::new("."))?;
//! }
//!
//! let ca = Pkcs12Loader::new()
//!     .load_signing_archive(std::path::Path::new("Intermediate 2.pfx"), "pw1")?;
//! let device = orchestrator.issue_device(&ca, "device-001", "device-pw")?;
//! println!("issued {}", device.file_name());
//! # Ok(())
//! # }
//! ```
//!
//! ## Building Certificates Directly
//!
//! ```rust
//! use provkit::cert::builder::CertificateBuilder;
//! use provkit::cert::profile::Role;
//! use provkit::config::IssuanceProfile;
//! use provkit::key::KeyPair;
//!
//! # fn main() -> Result<(), provkit::error::ProvKitError> {
//! let mut builder = CertificateBuilder::new(IssuanceProfile::default());
//! let root = builder.build("TestRoot", KeyPair::generate(), Role::Root, None)?;
//! let device = builder.build("device-001", KeyPair::generate(), Role::Leaf, Some(&root))?;
//!
//! let aki = device.authority_key_identifier()?.expect("issued certificates carry an AKI");
//! assert_eq!(aki.key_identifier, root.key_identifier()?);
//! assert!(device.verify_signed_by(&root)?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Every fallible operation returns [`error::ProvKitError`]:
//!
//! ```rust
//! use provkit::error::ProvKitError;
//! use provkit::pkcs12::Pkcs12Loader;
//!
//! match Pkcs12Loader::new().unpack(b"not an archive", "pw1") {
//!     Ok(_) => println!("loaded"),
//!     Err(ProvKitError::DecryptionFailed) => println!("wrong password"),
//!     Err(ProvKitError::MalformedArchive(msg)) => println!("corrupt archive: {}", msg),
//!     Err(e) => println!("Other error: {}", e),
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`key`]: P-256 key pairs and key identifiers
//! - [`cert`]: Certificates, extensions, the role profile and the builder
//! - [`issuer`]: Signing of prepared certificate bodies
//! - [`tbs_certificate`]: Low-level certificate structure
//! - [`pkcs12`]: Archive packing and loading
//! - [`chain`]: Chain, device and verification certificate generation
//! - [`config`]: Validity and archive protection settings
//! - [`error`]: Error type and exit codes

pub mod cert;
pub mod chain;
pub mod config;
pub mod error;
pub mod issuer;
pub mod key;
pub mod pkcs12;
pub mod tbs_certificate;
