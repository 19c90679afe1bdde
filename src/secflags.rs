//! # Security Policy Flags
//!
//! A set of named insecurity toggles parsed from a comma-separated option
//! string such as `image,tls` or `all`.
//!
//! ## Options
//!
//! | Option   | Effect                                             |
//! |----------|----------------------------------------------------|
//! | `none`   | No checks skipped (zero value)                     |
//! | `image`  | Skip image signature verification                  |
//! | `tls`    | Skip TLS certificate verification                  |
//! | `ondisk` | Skip on-disk integrity checks of stored images     |
//! | `http`   | Allow plain HTTP transfers                         |
//! | `pubkey` | Trust public keys fetched over insecure transports |
//! | `all`    | Every option above                                 |
//!
//! Bit positions are internal. Anything crossing a process boundary (the
//! store's `insecureoptions` column, serde output) uses the option names, so
//! adding an option never reinterprets persisted values.

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

const INSECURE_NONE: u32 = 0;
const INSECURE_IMAGE: u32 = 1 << 0;
const INSECURE_TLS: u32 = 1 << 1;
const INSECURE_ONDISK: u32 = 1 << 2;
const INSECURE_HTTP: u32 = 1 << 3;
const INSECURE_PUBKEY: u32 = 1 << 4;
const INSECURE_ALL: u32 =
    INSECURE_IMAGE | INSECURE_TLS | INSECURE_ONDISK | INSECURE_HTTP | INSECURE_PUBKEY;

/// Individual options in declaration order. Rendering follows this order.
const INDIVIDUAL_OPTIONS: &[(&str, u32)] = &[
    ("image", INSECURE_IMAGE),
    ("tls", INSECURE_TLS),
    ("ondisk", INSECURE_ONDISK),
    ("http", INSECURE_HTTP),
    ("pubkey", INSECURE_PUBKEY),
];

/// Every token accepted by [`SecFlags::parse`].
pub const PERMISSIBLE_OPTIONS: &[&str] = &["none", "image", "tls", "ondisk", "http", "pubkey", "all"];

fn option_bits(token: &str) -> Option<u32> {
    match token {
        "none" => Some(INSECURE_NONE),
        "all" => Some(INSECURE_ALL),
        other => INDIVIDUAL_OPTIONS
            .iter()
            .find(|(name, _)| *name == other)
            .map(|(_, bits)| *bits),
    }
}

/// Parsed set of insecurity toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SecFlags {
    flags: u32,
}

impl SecFlags {
    /// No checks skipped.
    pub const NONE: Self = Self {
        flags: INSECURE_NONE,
    };

    /// Every check skipped.
    pub const ALL: Self = Self {
        flags: INSECURE_ALL,
    };

    /// Parses a comma-separated option list.
    ///
    /// Tokens are trimmed; each must be one of [`PERMISSIBLE_OPTIONS`].
    /// `none` contributes no bits, so `none,tls` is simply `tls`.
    pub fn parse(options: &str) -> Result<Self> {
        let mut flags = INSECURE_NONE;
        for raw in options.split(',') {
            let token = raw.trim();
            let bits = option_bits(token).ok_or_else(|| Error::UnknownOption {
                token: token.to_string(),
                permissible: PERMISSIBLE_OPTIONS.join(", "),
            })?;
            flags |= bits;
        }
        Ok(Self { flags })
    }

    /// Raw bitmask.
    pub fn bits(&self) -> u32 {
        self.flags
    }

    fn has_flag(&self, flag: u32) -> bool {
        self.flags & flag == flag
    }

    pub fn skip_image_check(&self) -> bool {
        self.has_flag(INSECURE_IMAGE)
    }

    pub fn skip_tls_check(&self) -> bool {
        self.has_flag(INSECURE_TLS)
    }

    pub fn skip_on_disk_check(&self) -> bool {
        self.has_flag(INSECURE_ONDISK)
    }

    pub fn allow_http(&self) -> bool {
        self.has_flag(INSECURE_HTTP)
    }

    pub fn consider_insecure_pub_keys(&self) -> bool {
        self.has_flag(INSECURE_PUBKEY)
    }

    /// True iff every defined option is set.
    pub fn skip_all_security_checks(&self) -> bool {
        self.has_flag(INSECURE_ALL)
    }

    /// True iff any option is set.
    pub fn skip_any_security_checks(&self) -> bool {
        self.flags != INSECURE_NONE
    }

    /// Names of the set options, in declaration order.
    pub fn option_names(&self) -> Vec<&'static str> {
        INDIVIDUAL_OPTIONS
            .iter()
            .filter(|(_, bits)| self.has_flag(*bits))
            .map(|(name, _)| *name)
            .collect()
    }
}

impl std::ops::BitOr for SecFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self {
            flags: self.flags | rhs.flags,
        }
    }
}

impl FromStr for SecFlags {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for SecFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.flags == INSECURE_NONE {
            return write!(f, "none");
        }
        write!(f, "{}", self.option_names().join(","))
    }
}

impl Serialize for SecFlags {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.option_names().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SecFlags {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let names = Vec::<String>::deserialize(deserializer)?;
        if names.is_empty() {
            return Ok(Self::NONE);
        }
        Self::parse(&names.join(",")).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_is_union_of_individual_options() {
        let union = ["image", "tls", "ondisk", "http", "pubkey"]
            .iter()
            .map(|o| SecFlags::parse(o).unwrap())
            .fold(SecFlags::NONE, |acc, f| acc | f);
        assert_eq!(SecFlags::parse("all").unwrap(), union);
        assert_eq!(union, SecFlags::ALL);
    }

    #[test]
    fn test_display_is_declaration_ordered() {
        let flags = SecFlags::parse("pubkey,image,http").unwrap();
        assert_eq!(flags.to_string(), "image,http,pubkey");
        assert_eq!(SecFlags::ALL.to_string(), "image,tls,ondisk,http,pubkey");
        assert_eq!(SecFlags::NONE.to_string(), "none");
    }

    #[test]
    fn test_display_reparses_to_same_flags() {
        let flags = SecFlags::parse("tls, ondisk").unwrap();
        assert_eq!(flags.to_string().parse::<SecFlags>().unwrap(), flags);
    }
}
