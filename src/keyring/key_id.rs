// Key id rendering and stored key id comparison

use std::fmt;

use serde::{Deserialize, Serialize};
use sequoia_openpgp::KeyID;

use crate::error::KeyfixError;

/// Long-form OpenPGP key id: always 16 uppercase hex digits
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct KeyId(String);

/// How a stored key id relates to the derived long-form key id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyIdMatch {
    /// Same key id, ignoring case
    Exact,
    /// The stored value is the last `len` hex digits of the derived key id
    Suffix { len: usize },
    /// The stored value names a different key
    Different,
}

impl KeyIdMatch {
    /// A genuinely different key, which needs operator attention
    pub fn is_discrepancy(&self) -> bool {
        matches!(self, KeyIdMatch::Different)
    }
}

impl KeyId {
    /// Length of the long form
    pub const LONG_FORM_LEN: usize = 16;

    /// Length of the short form
    pub const SHORT_FORM_LEN: usize = 8;

    /// Render a raw 64-bit key id
    pub fn from_u64(raw: u64) -> Self {
        KeyId(format!("{:016X}", raw))
    }

    /// Render key id bytes, left-padding with zeros to 8 bytes.
    ///
    /// Returns `None` when there are no bytes to render. Inputs longer than
    /// 8 bytes keep their trailing 8 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.is_empty() {
            return None;
        }

        let tail = &bytes[bytes.len().saturating_sub(8)..];
        let mut padded = [0u8; 8];
        padded[8 - tail.len()..].copy_from_slice(tail);

        Some(KeyId(hex::encode_upper(padded)))
    }

    /// Render a parsed OpenPGP key id
    pub fn from_openpgp(key_id: &KeyID) -> Option<Self> {
        Self::from_bytes(key_id.as_bytes())
    }

    /// The 16-digit rendering
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The last 8 hex digits
    pub fn short_form(&self) -> &str {
        &self.0[Self::LONG_FORM_LEN - Self::SHORT_FORM_LEN..]
    }

    /// Compare a stored key id, which may be short, long, or of a length
    /// left behind by older truncation bugs, against this key id.
    pub fn compare_stored(&self, stored: &str) -> KeyIdMatch {
        let stored = stored.to_uppercase();

        if stored == self.0 {
            KeyIdMatch::Exact
        } else if stored.len() <= Self::LONG_FORM_LEN && self.0.ends_with(&stored) {
            KeyIdMatch::Suffix { len: stored.len() }
        } else {
            KeyIdMatch::Different
        }
    }
}

impl TryFrom<String> for KeyId {
    type Error = KeyfixError;

    /// Accepts exactly 16 hex digits, in either case
    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.len() != Self::LONG_FORM_LEN || !value.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(KeyfixError::SerializationError(format!(
                "'{}' is not a 16-digit hex key id",
                value
            )));
        }
        Ok(KeyId(value.to_ascii_uppercase()))
    }
}

impl From<KeyId> for String {
    fn from(key_id: KeyId) -> Self {
        key_id.0
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for KeyId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for KeyId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for KeyId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}
