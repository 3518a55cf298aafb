//! Generation of CA chains, device certificates and verification certificates.
//!
//! Every operation builds its output files in memory as [`Artifact`]s. Nothing
//! is written until all certificates have been built and packed, so a failed
//! run leaves the output directory untouched.

use std::fs;
use std::path::{Path, PathBuf};

use crate::cert::Certificate;
use crate::cert::builder::CertificateBuilder;
use crate::cert::profile::Role;
use crate::config::{ArchiveOptions, IssuanceProfile};
use crate::error::{ProvKitError, Result};
use crate::key::KeyPair;
use crate::pkcs12::{LoadedArchive, Pkcs12Loader, Pkcs12Packager};

/// Longest supported chain of intermediates below the root.
pub const MAX_INTERMEDIATES: u8 = 5;

/// A named output file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Artifact {
    file_name: String,
    bytes: Vec<u8>,
}

impl Artifact {
    /// The file name must be a plain name without directory components.
    pub fn new(file_name: String, bytes: Vec<u8>) -> Result<Self> {
        let invalid = file_name.is_empty()
            || file_name == "."
            || file_name == ".."
            || file_name.contains(['/', '\\', '\0']);
        if invalid {
            return Err(ProvKitError::InvalidPath(format!(
                "'{file_name}' is not a valid file name"
            )));
        }
        Ok(Self { file_name, bytes })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(&self.file_name);
        fs::write(&path, &self.bytes)?;
        log::info!("wrote {}", path.display());
        Ok(path)
    }
}

/// Writes every artifact into `dir`, creating the directory if needed.
pub fn write_all(artifacts: &[Artifact], dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;
    artifacts.iter().map(|artifact| artifact.write_to(dir)).collect()
}

/// Result of [`ChainOrchestrator::generate`].
///
/// # Fields
/// * `artifacts` - Root archive, root `.cer` and one archive per intermediate.
/// * `issuing_ca` - The deepest CA, with its private key.
/// * `public_chain` - Every CA above `issuing_ca`, root first, without keys.
#[derive(Debug)]
pub struct GeneratedChain {
    pub artifacts: Vec<Artifact>,
    pub issuing_ca: Certificate,
    pub public_chain: Vec<Certificate>,
}

/// Drives certificate building and packaging for the tool's three commands.
pub struct ChainOrchestrator {
    builder: CertificateBuilder,
    packager: Pkcs12Packager,
    loader: Pkcs12Loader,
}

impl Default for ChainOrchestrator {
    fn default() -> Self {
        Self::new(IssuanceProfile::default(), ArchiveOptions::default())
    }
}

impl ChainOrchestrator {
    pub fn new(profile: IssuanceProfile, options: ArchiveOptions) -> Self {
        Self {
            builder: CertificateBuilder::new(profile),
            packager: Pkcs12Packager::new(options),
            loader: Pkcs12Loader::new(),
        }
    }

    /// Replaces the archive loader, e.g. to observe loaded entries.
    pub fn with_loader(mut self, loader: Pkcs12Loader) -> Self {
        self.loader = loader;
        self
    }

    /// Builds a root CA and `intermediate_count` intermediates below it.
    ///
    /// # Arguments
    /// * `root_name` - Root subject; intermediates are named `"<root> - Intermediate <i>"`.
    /// * `password` - Password for every archive produced.
    /// * `intermediate_count` - Chain depth below the root, at most [`MAX_INTERMEDIATES`].
    ///
    /// # Returns
    /// `"<root>.pfx"`, `"<root>.cer"` and `"Intermediate <i>.pfx"` artifacts, plus
    /// the deepest CA for issuing devices.
    pub fn generate(
        &mut self,
        root_name: &str,
        password: &str,
        intermediate_count: u8,
    ) -> Result<GeneratedChain> {
        if intermediate_count > MAX_INTERMEDIATES {
            return Err(ProvKitError::InvalidIntermediateCount(intermediate_count));
        }

        let root = self
            .builder
            .build(root_name, KeyPair::generate(), Role::Root, None)?;
        let mut artifacts = vec![
            Artifact::new(
                format!("{root_name}.pfx"),
                self.packager.pack(&root, &[], password)?,
            )?,
            Artifact::new(format!("{root_name}.cer"), root.to_der()?)?,
        ];

        let mut public_chain = Vec::new();
        let mut previous = root;
        for i in 1..=intermediate_count {
            let name = format!("{root_name} - Intermediate {i}");
            let intermediate = self.builder.build(
                &name,
                KeyPair::generate(),
                Role::Intermediate,
                Some(&previous),
            )?;
            public_chain.push(previous.public_only());
            artifacts.push(Artifact::new(
                format!("Intermediate {i}.pfx"),
                self.packager.pack(&intermediate, &public_chain, password)?,
            )?);
            previous = intermediate;
        }

        Ok(GeneratedChain {
            artifacts,
            issuing_ca: previous,
            public_chain,
        })
    }

    /// Issues a device certificate and packs it with the CA chain.
    ///
    /// The archive holds the device key, the issuing CA and the CA archive's
    /// other certificates, all public.
    pub fn issue_device(
        &mut self,
        ca: &LoadedArchive,
        subject: &str,
        password: &str,
    ) -> Result<Artifact> {
        let device =
            self.builder
                .build(subject, KeyPair::generate(), Role::Leaf, Some(&ca.primary))?;
        let mut auxiliary = vec![ca.primary.public_only()];
        auxiliary.extend(ca.auxiliary.iter().map(Certificate::public_only));
        Artifact::new(
            format!("{subject}.pfx"),
            self.packager.pack(&device, &auxiliary, password)?,
        )
    }

    /// Issues a proof-of-possession certificate for a portal verification code.
    ///
    /// Only the public certificate is produced; its key is discarded.
    pub fn issue_verification(&mut self, ca: &LoadedArchive, subject: &str) -> Result<Artifact> {
        let certificate =
            self.builder
                .build(subject, KeyPair::generate(), Role::Leaf, Some(&ca.primary))?;
        Artifact::new(format!("{subject}.cer"), certificate.to_der()?)
    }

    /// `createcertchain`: writes the chain archives into `out_dir`.
    pub fn create_cert_chain(
        &mut self,
        out_dir: &Path,
        root_name: &str,
        password: &str,
        intermediate_count: u8,
    ) -> Result<Vec<PathBuf>> {
        let chain = self.generate(root_name, password, intermediate_count)?;
        write_all(&chain.artifacts, out_dir)
    }

    /// `createdevicecert`: signs a device certificate with the CA in `ca_path`.
    pub fn create_device_cert(
        &mut self,
        out_dir: &Path,
        subject: &str,
        password: &str,
        ca_path: &Path,
        ca_password: &str,
    ) -> Result<PathBuf> {
        let ca = self.loader.load_signing_archive(ca_path, ca_password)?;
        let artifact = self.issue_device(&ca, subject, password)?;
        fs::create_dir_all(out_dir)?;
        artifact.write_to(out_dir)
    }

    /// `createverificationcert`: writes `"<subject>.cer"` signed by the CA in `ca_path`.
    pub fn create_verification_cert(
        &mut self,
        out_dir: &Path,
        subject: &str,
        ca_path: &Path,
        ca_password: &str,
    ) -> Result<PathBuf> {
        let ca = self.loader.load_signing_archive(ca_path, ca_password)?;
        let artifact = self.issue_verification(&ca, subject)?;
        fs::create_dir_all(out_dir)?;
        artifact.write_to(out_dir)
    }
}
