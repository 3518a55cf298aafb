use std::path::PathBuf;

use provkit::chain::{ChainOrchestrator, write_all};
use provkit::config::{ArchiveOptions, IssuanceProfile};
use provkit::error::ProvKitError;

fn main() -> Result<(), ProvKitError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let out_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("demo-pki"));

    // Short-lived certificates and a cheaper KDF are fine for a throwaway PKI.
    let profile = IssuanceProfile::builder().validity_days(30).build();
    let options = ArchiveOptions::builder()
        .kdf_iterations(1024)
        .mac_iterations(1024)
        .build();
    let mut orchestrator = ChainOrchestrator::new(profile, options);

    let chain = orchestrator.generate("Demo Root", "demo", 2)?;
    for ca in chain.public_chain.iter().chain(std::iter::once(&chain.issuing_ca)) {
        println!(
            "{:<30} serial timestamp {:?}",
            ca.subject_name(),
            ca.serial_timestamp()
        );
    }

    let ca = provkit::pkcs12::Pkcs12Loader::new().unpack(
        chain
            .artifacts
            .last()
            .map(|artifact| artifact.bytes())
            .unwrap_or_default(),
        "demo",
    )?;
    let ca = ca.ok_or(ProvKitError::NoUsablePrivateKeyCertificate)?;

    let mut artifacts = chain.artifacts;
    for device in ["sensor-01", "sensor-02"] {
        artifacts.push(orchestrator.issue_device(&ca, device, "device")?);
    }
    artifacts.push(orchestrator.issue_verification(&ca, "0A1B2C3D4E5F")?);

    for path in write_all(&artifacts, &out_dir)? {
        println!("{}", path.display());
    }
    Ok(())
}
