use std::sync::LazyLock;

use const_oid::ObjectIdentifier;
use der::{Any, Tag, Tagged};
use regex::Regex;
use time::{Duration, OffsetDateTime};
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::name::{Name, RdnSequence, RelativeDistinguishedName};
use x509_cert::serial_number::SerialNumber;

use super::extensions::ToAndFromX509Extension;
use super::profile::Role;
use crate::config::IssuanceProfile;
use crate::error::{ProvKitError, Result};

/// Upper bound for a common name (`ub-common-name` in RFC 5280).
const MAX_COMMON_NAME_LEN: usize = 64;
const MAX_HOST_NAME_LEN: usize = 253;

static HOST_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)*\.?$",
    )
    .expect("host name pattern is valid")
});

/// A validated certificate subject, used both as the CN and the single SAN DNS name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubjectName(String);

impl SubjectName {
    /// Accepts a syntactically valid DNS host name (RFC 1123 labels).
    pub fn host_name(name: &str) -> Result<Self> {
        if name.is_empty() || name.len() > MAX_HOST_NAME_LEN || !HOST_NAME.is_match(name) {
            return Err(ProvKitError::InvalidSubjectName(name.to_string()));
        }
        Ok(Self(name.to_string()))
    }

    /// Accepts a CA display name such as `"TestRoot - Intermediate 1"`.
    pub fn ca_name(name: &str) -> Result<Self> {
        let printable = name.chars().all(|c| c.is_ascii() && !c.is_ascii_control());
        if name.trim().is_empty() || name.len() > MAX_COMMON_NAME_LEN || !printable {
            return Err(ProvKitError::InvalidSubjectName(name.to_string()));
        }
        Ok(Self(name.to_string()))
    }

    /// Leaves need host names; CAs may carry display names.
    pub fn for_role(name: &str, role: Role) -> Result<Self> {
        match role {
            Role::Leaf => Self::host_name(name),
            Role::Root | Role::Intermediate => Self::ca_name(name),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `CN=<name>` as a single-attribute X.509 name.
    pub fn as_x509_name(&self) -> Result<Name> {
        let common_name = AttributeTypeAndValue {
            oid: const_oid::db::rfc4519::CN,
            value: Any::new(Tag::Utf8String, self.0.as_bytes())?,
        };
        let rdn = RelativeDistinguishedName::try_from(vec![common_name])?;
        Ok(RdnSequence(vec![rdn]))
    }
}

/// Extracts the first common name from an X.509 name.
pub fn common_name(name: &Name) -> Option<String> {
    name.0
        .iter()
        .flat_map(|rdn| rdn.0.iter())
        .find(|attr| attr.oid == const_oid::db::rfc4519::CN)
        .and_then(|attr| match attr.value.tag() {
            Tag::Utf8String | Tag::PrintableString | Tag::Ia5String => {
                std::str::from_utf8(attr.value.value()).ok().map(str::to_string)
            }
            _ => None,
        })
}

/// Certificate validity period, in whole seconds.
///
/// # Fields
/// * `not_before` - The start of the validity period.
/// * `not_after` - The end of the validity period.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Validity {
    pub not_before: OffsetDateTime,
    pub not_after: OffsetDateTime,
}

impl Validity {
    /// Creates the validity window for a certificate issued at `now`.
    ///
    /// Starts `backdate_days` before `now` and lasts `validity_days` from `now`,
    /// then narrows to the issuer's window so a child never outlives its issuer.
    /// A self-signed certificate (`issuer == None`) is not clamped.
    pub fn clamped(
        now: OffsetDateTime,
        profile: &IssuanceProfile,
        issuer: Option<&Validity>,
    ) -> Result<Self> {
        let now = truncate_to_seconds(now);
        let mut not_before = days(profile.backdate_days)
            .and_then(|backdate| now.checked_sub(backdate))
            .ok_or_else(|| out_of_range("backdate_days", profile.backdate_days))?;
        let mut not_after = days(profile.validity_days)
            .and_then(|lifetime| now.checked_add(lifetime))
            .ok_or_else(|| out_of_range("validity_days", profile.validity_days))?;
        if let Some(issuer) = issuer {
            not_before = not_before.max(issuer.not_before);
            not_after = not_after.min(issuer.not_after);
        }
        Ok(Self {
            not_before,
            not_after,
        })
    }

    pub fn contains(&self, other: &Validity) -> bool {
        self.not_before <= other.not_before && other.not_after <= self.not_after
    }
}

fn days(n: i64) -> Option<Duration> {
    n.checked_mul(86_400).map(Duration::seconds)
}

fn out_of_range(field: &str, value: i64) -> ProvKitError {
    ProvKitError::InvalidInput(format!("{field} = {value} is out of range"))
}

/// Drops the sub-second part; X.509 times only carry whole seconds.
pub fn truncate_to_seconds(t: OffsetDateTime) -> OffsetDateTime {
    t - Duration::nanoseconds(i64::from(t.nanosecond()))
}

/// Issues timestamp serial numbers.
///
/// A serial is the issuing second as an 8-byte little-endian Unix timestamp.
/// Within one source the second never repeats: a second request in the same
/// second takes the next unused one.
#[derive(Debug, Default)]
pub struct SerialNumberSource {
    last_second: Option<u64>,
}

impl SerialNumberSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the 8 little-endian timestamp bytes for the next certificate.
    pub fn next_timestamp(&mut self, now: OffsetDateTime) -> [u8; 8] {
        let now = u64::try_from(now.unix_timestamp()).unwrap_or(0);
        let second = match self.last_second {
            Some(last) if now <= last => last + 1,
            _ => now,
        };
        self.last_second = Some(second);
        second.to_le_bytes()
    }

    /// Same as [`Self::next_timestamp`], as a DER serial number.
    pub fn next_serial(&mut self, now: OffsetDateTime) -> Result<SerialNumber> {
        serial_from_timestamp_bytes(self.next_timestamp(now))
    }
}

/// Reads the 8 timestamp bytes as an unsigned big-endian INTEGER, so the
/// encoded serial content is the little-endian timestamp itself.
pub fn serial_from_timestamp_bytes(bytes: [u8; 8]) -> Result<SerialNumber> {
    SerialNumber::new(&bytes).map_err(|e| ProvKitError::EncodingError(e.to_string()))
}

/// Recovers the Unix timestamp from a serial produced by [`SerialNumberSource`].
pub fn timestamp_from_serial(serial: &[u8]) -> Option<u64> {
    let digits: Vec<u8> = serial.iter().copied().skip_while(|b| *b == 0).collect();
    if digits.len() > 8 {
        return None;
    }
    let mut be = [0u8; 8];
    be[8 - digits.len()..].copy_from_slice(&digits);
    Some(u64::from_le_bytes(be))
}

/// Represents an X.509 extension.
///
/// # Fields
/// * `oid` - The object identifier of the extension.
/// * `critical` - Indicates if the extension is critical.
/// * `value` - The DER-encoded value of the extension.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtensionParam {
    pub oid: ObjectIdentifier,
    pub critical: bool,
    /// DER-encoded extension value
    pub value: Vec<u8>,
}

impl ExtensionParam {
    /// Creates an `ExtensionParam` from a specific extension.
    pub fn from_extension<E: ToAndFromX509Extension>(extension: &E, critical: bool) -> Result<Self> {
        Ok(Self {
            oid: E::OID,
            critical,
            value: extension.to_x509_extension_value()?,
        })
    }

}
