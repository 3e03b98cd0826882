/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs LLC <hello@stalw.art>
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

//! Stable identifiers for participants, links, locations and alarms.
//!
//! Per spec: a non-empty string of up to 256 characters drawn from
//! `[A-Za-z0-9_-]`. When reading an iCalendar property, the id is taken
//! from its `X-JMAP-ID` parameter if present, otherwise derived by
//! SHA-1-hashing the property's canonical serialization. This mirrors
//! `sha1key()` in the cyrus-imapd JMAP calendar bridge this crate's
//! semantics are grounded on.

use sha1::{Digest, Sha1};
use std::fmt;

/// A validated JMAP id: `[A-Za-z0-9_-]{1,256}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JmapId(String);

impl JmapId {
    pub fn is_valid(s: &str) -> bool {
        !s.is_empty()
            && s.len() <= 256
            && s.bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
    }

    /// Wraps an already-valid id without checking (used for ids we derived
    /// ourselves, e.g. via [`derive`]).
    fn new_unchecked(s: String) -> Self {
        debug_assert!(Self::is_valid(&s));
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Derives a stable id from the canonical serialization of an
    /// iCalendar property: `SHA1_hex(serialized)`, lowercase, 40 hex chars.
    pub fn derive(serialized: &str) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(serialized.as_bytes());
        let digest = hasher.finalize();
        let mut hex = String::with_capacity(40);
        for byte in digest {
            hex.push_str(&format!("{byte:02x}"));
        }
        Self::new_unchecked(hex)
    }
}

impl TryFrom<String> for JmapId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if Self::is_valid(&value) {
            Ok(Self(value))
        } else {
            Err(value)
        }
    }
}

impl fmt::Display for JmapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_chars() {
        assert!(JmapId::try_from("has space".to_string()).is_err());
        assert!(JmapId::try_from("".to_string()).is_err());
        assert!(JmapId::try_from("a".repeat(257)).is_err());
        assert!(JmapId::try_from("Ok_id-123".to_string()).is_ok());
    }

    #[test]
    fn derive_is_deterministic() {
        let a = JmapId::derive("ATTENDEE:mailto:alice@example.com");
        let b = JmapId::derive("ATTENDEE:mailto:alice@example.com");
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 40);
        assert!(a.as_str().bytes().all(|b| b.is_ascii_hexdigit()));
    }
}
