use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::Error;

/// Content hash used to validate cache freshness.
///
/// A fingerprint is a lowercase hex string. The default (empty) fingerprint
/// means "unversioned": requests carrying it are always fetched fresh and
/// never served from or written to a cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fingerprint(String);

impl Fingerprint {
    /// The unversioned fingerprint.
    pub fn unversioned() -> Self { Self::default() }

    /// Parse a hex fingerprint. Surrounding whitespace is ignored and the
    /// digits are normalized to lowercase.
    ///
    /// # Examples
    ///
    /// ```
    /// use stowage_manifest::Fingerprint;
    ///
    /// let fp = Fingerprint::parse(" 0A1b ").unwrap();
    /// assert_eq!(fp.as_str(), "0a1b");
    /// assert!(Fingerprint::parse("xyz").is_err());
    /// ```
    pub fn parse(s: &str) -> Result<Self, Error> {
        let s = s.trim();
        if !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::InvalidFingerprint(s.to_string()));
        }
        Ok(Self(s.to_ascii_lowercase()))
    }

    /// Fingerprint used when requesting a given manifest version.
    ///
    /// Each version maps to a distinct fingerprint so a cached copy of one
    /// version is never mistaken for another.
    ///
    /// ```
    /// use stowage_manifest::Fingerprint;
    ///
    /// assert_eq!(
    ///     Fingerprint::from_version(3).as_str(),
    ///     "00000000000000000000000000000003"
    /// );
    /// ```
    pub fn from_version(version: u32) -> Self { Self(format!("{version:032x}")) }

    /// 128-bit fingerprint of a payload: the first half of its SHA-256.
    pub fn digest(bytes: &[u8]) -> Self {
        let hash = Sha256::digest(bytes);
        Self(hex::encode(&hash[..16]))
    }

    pub fn is_unversioned(&self) -> bool { self.0.is_empty() }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unversioned() {
            f.write_str("<unversioned>")
        } else {
            f.write_str(&self.0)
        }
    }
}

impl FromStr for Fingerprint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> { Self::parse(s) }
}

impl TryFrom<String> for Fingerprint {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> { Self::parse(&s) }
}

impl From<Fingerprint> for String {
    fn from(fp: Fingerprint) -> Self { fp.0 }
}
