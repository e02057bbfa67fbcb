//! Volume size parsing and representation.
//!
//! Sizes follow the `lvcreate` conventions:
//! - "4096" -> 4096 MiB (a bare number is mebibytes)
//! - "512k", "512M", "10g", "1T" -> powers of 1024, in either case
//! - "512Ki", "512Mi", "10Gi", "1Ti" -> powers of 1024
//! - "1048576b" -> bytes

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{StrataError, StrataResult};

const KI: u64 = 1024;
const MI: u64 = 1024 * KI;
const GI: u64 = 1024 * MI;
const TI: u64 = 1024 * GI;

/// The virtual size of a thin volume, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VolumeSize(u64);

impl VolumeSize {
    /// Create a size from bytes.
    #[must_use]
    pub const fn bytes(bytes: u64) -> Self {
        Self(bytes)
    }

    /// Create a size from mebibytes (MiB).
    #[must_use]
    pub const fn mebibytes(mib: u64) -> Self {
        Self(mib * MI)
    }

    /// Create a size from gibibytes (GiB).
    #[must_use]
    pub const fn gibibytes(gib: u64) -> Self {
        Self(gib * GI)
    }

    /// Size in bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> u64 {
        self.0
    }

    /// Size in mebibytes (truncated).
    #[must_use]
    pub const fn as_mebibytes(&self) -> u64 {
        self.0 / MI
    }

    /// The size as an LVM `--virtualsize` argument.
    #[must_use]
    pub fn to_lvm_arg(&self) -> String {
        format!("{}b", self.0)
    }

    /// Parse a size string.
    pub fn parse(s: &str) -> StrataResult<Self> {
        let s = s.trim();
        let invalid = || StrataError::InvalidSize {
            value: s.to_string(),
        };

        let suffixes = [
            ("Ki", KI),
            ("Mi", MI),
            ("Gi", GI),
            ("Ti", TI),
            ("b", 1),
            ("B", 1),
            ("k", KI),
            ("m", MI),
            ("g", GI),
            ("t", TI),
            ("K", KI),
            ("M", MI),
            ("G", GI),
            ("T", TI),
        ];

        let (digits, multiplier) = suffixes
            .iter()
            .find_map(|(suffix, multiplier)| {
                s.strip_suffix(suffix).map(|digits| (digits, *multiplier))
            })
            .unwrap_or((s, MI));

        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let value: u64 = digits.parse().map_err(|_| invalid())?;
        let bytes = value.checked_mul(multiplier).ok_or_else(invalid)?;
        if bytes == 0 {
            return Err(invalid());
        }

        Ok(Self(bytes))
    }
}

impl fmt::Display for VolumeSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 >= TI && self.0 % TI == 0 {
            write!(f, "{}Ti", self.0 / TI)
        } else if self.0 >= GI && self.0 % GI == 0 {
            write!(f, "{}Gi", self.0 / GI)
        } else if self.0 >= MI && self.0 % MI == 0 {
            write!(f, "{}Mi", self.0 / MI)
        } else if self.0 >= KI && self.0 % KI == 0 {
            write!(f, "{}Ki", self.0 / KI)
        } else {
            write!(f, "{}b", self.0)
        }
    }
}

impl FromStr for VolumeSize {
    type Err = StrataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
