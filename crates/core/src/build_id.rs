use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use uuid::Uuid;

/// Unique build identifier of a compiled binary image (the Mach-O `LC_UUID`).
///
/// This is the join key against debug-symbol stores. Tokens are normalized once
/// at parse time, so `AAAAAAAA-1111-...` and `aaaaaaaa1111...` produce equal values
/// and downstream code never compares formatted strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BuildId(Uuid);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuildIdError {
    #[error("Invalid build identifier '{0}'")]
    Invalid(String),
    #[error("Nil build identifier is not a real binary identity")]
    Nil,
}

impl BuildId {
    /// Parse a token in hyphenated or simple (32 hex digits) form, any case.
    /// Surrounding angle brackets, as found in image tables, are tolerated.
    pub fn parse(token: &str) -> Result<Self, BuildIdError> {
        let trimmed = token.trim().trim_start_matches('<').trim_end_matches('>').trim();
        let uuid = Uuid::try_parse(trimmed).map_err(|_| BuildIdError::Invalid(token.to_string()))?;
        if uuid.is_nil() {
            return Err(BuildIdError::Nil);
        }
        Ok(Self(uuid))
    }

    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Lowercase, separator-free rendering used by iOS-style image tables.
    pub fn simple_lowercase(&self) -> String {
        self.0.simple().to_string()
    }
}

impl fmt::Display for BuildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Uppercase hyphenated, the way dwarfdump --uuid prints it.
        write!(f, "{}", self.0.hyphenated().encode_upper(&mut Uuid::encode_buffer()))
    }
}

impl FromStr for BuildId {
    type Err = BuildIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for BuildId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BuildId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        BuildId::parse(&s).map_err(serde::de::Error::custom)
    }
}
