use crate::cert::Certificate;

/// One certificate found while reading an archive.
///
/// # Fields
/// * `thumbprint` - Upper-case hex SHA-1 of the certificate DER.
/// * `subject` - Subject common name.
/// * `has_private_key` - Whether a matching key bag was found.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub thumbprint: String,
    pub subject: String,
    pub has_private_key: bool,
}

/// Receives progress while an archive is unpacked.
///
/// All methods default to doing nothing.
pub trait ArchiveObserver {
    fn entry_found(&self, _entry: &ArchiveEntry) {}

    fn primary_selected(&self, _certificate: &Certificate) {}

    fn no_private_key(&self) {}
}

/// Forwards archive progress to the `log` facade.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogObserver;

impl ArchiveObserver for LogObserver {
    fn entry_found(&self, entry: &ArchiveEntry) {
        log::info!(
            "Found certificate: {} {}; private key: {}",
            entry.thumbprint,
            entry.subject,
            entry.has_private_key
        );
    }

    fn primary_selected(&self, certificate: &Certificate) {
        match certificate.thumbprint_hex() {
            Ok(thumbprint) => log::info!(
                "Using certificate {thumbprint} {}",
                certificate.subject_name()
            ),
            Err(_) => log::info!("Using certificate {}", certificate.subject_name()),
        }
    }

    fn no_private_key(&self) {
        log::error!("Archive did not contain any certificate with a private key");
    }
}
