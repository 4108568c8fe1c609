use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Globally unique identifier for an [`crate::Element`]: `(site, clock, salt)`.
///
/// `site` is the peer's stable identifier, `clock` is that peer's
/// monotonically increasing per-site insert counter, and `salt` only exists
/// to keep identifiers unique across rapid retries after a crash — it plays
/// no part in ordering.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier {
    pub site: String,
    pub clock: u64,
    pub salt: u32,
}

impl Identifier {
    pub fn new(site: impl Into<String>, clock: u64) -> Self {
        Identifier {
            site: site.into(),
            clock,
            salt: rand::thread_rng().gen(),
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.site, self.clock, self.salt)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseIdentifierError;

impl fmt::Display for ParseIdentifierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed identifier, expected \"<site>-<clock>-<salt>\"")
    }
}

impl std::error::Error for ParseIdentifierError {}

impl std::str::FromStr for Identifier {
    type Err = ParseIdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Site identifiers are themselves plain strings with no fixed shape,
        // so parse from the right: the last two dash-separated fields are
        // clock and salt, everything before them is the site.
        let mut parts = s.rsplitn(3, '-');
        let salt = parts.next().ok_or(ParseIdentifierError)?;
        let clock = parts.next().ok_or(ParseIdentifierError)?;
        let site = parts.next().ok_or(ParseIdentifierError)?;

        Ok(Identifier {
            site: site.to_string(),
            clock: clock.parse().map_err(|_| ParseIdentifierError)?,
            salt: salt.parse().map_err(|_| ParseIdentifierError)?,
        })
    }
}

// The wire representation is the rendered "<site>-<clock>-<salt>" string
// (spec §3), not a struct-of-fields record.
impl Serialize for Identifier {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Identifier {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
