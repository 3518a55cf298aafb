use bon::Builder;

/// Validity settings applied by the certificate builder.
///
/// # Fields
/// * `validity_days` - Days from now until `notAfter` (before issuer clamping).
/// * `backdate_days` - Days subtracted from now for `notBefore`, to tolerate clock skew.
#[derive(Clone, Debug, Builder)]
pub struct IssuanceProfile {
    #[builder(default = 365)]
    pub validity_days: i64,
    #[builder(default = 1)]
    pub backdate_days: i64,
}

impl Default for IssuanceProfile {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Password-based protection settings for written PKCS#12 archives.
///
/// # Fields
/// * `kdf_iterations` - PBKDF2 iterations for each encrypted bag.
/// * `mac_iterations` - Iterations of the PKCS#12 key derivation for the integrity MAC.
#[derive(Clone, Debug, Builder)]
pub struct ArchiveOptions {
    #[builder(default = 2048)]
    pub kdf_iterations: u32,
    #[builder(default = 2048)]
    pub mac_iterations: u32,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}
