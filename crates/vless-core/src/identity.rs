//! The 16-byte shared identifier clients present in every handshake.
//!
//! Written in configs and links as a UUID (`5efabea4-f6d4-91fd-...`), carried
//! on the wire as the raw 16 bytes.

use crate::error::{VlessError, VlessResult};
use std::fmt;
use std::str::FromStr;
use subtle::ConstantTimeEq;

/// Length of an identifier on the wire.
pub const IDENTIFIER_LEN: usize = 16;

/// A shared-secret identifier.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Identifier([u8; IDENTIFIER_LEN]);

impl Identifier {
    pub const fn from_bytes(bytes: [u8; IDENTIFIER_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; IDENTIFIER_LEN] {
        &self.0
    }

    /// Compare against another identifier without early exit.
    pub fn matches(&self, other: &Identifier) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl FromStr for Identifier {
    type Err = VlessError;

    /// Accepts the hyphenated UUID form or 32 bare hex digits.
    fn from_str(s: &str) -> VlessResult<Self> {
        let compact: String = s.trim().chars().filter(|c| *c != '-').collect();
        if compact.len() != IDENTIFIER_LEN * 2 {
            return Err(VlessError::InvalidIdentifier(format!(
                "expected {} hex digits, got {}",
                IDENTIFIER_LEN * 2,
                compact.len()
            )));
        }
        let mut bytes = [0u8; IDENTIFIER_LEN];
        hex::decode_to_slice(&compact, &mut bytes)
            .map_err(|e| VlessError::InvalidIdentifier(e.to_string()))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Identifier {
    /// Lowercase hyphenated UUID layout (8-4-4-4-12).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let h = hex::encode(self.0);
        write!(
            f,
            "{}-{}-{}-{}-{}",
            &h[0..8],
            &h[8..12],
            &h[12..16],
            &h[16..20],
            &h[20..32]
        )
    }
}

// Keep the secret out of logs.
impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Identifier(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UUID: &str = "5efabea4-f6d4-91fd-b8f0-17e004c89c60";

    #[test]
    fn parses_hyphenated_uuid() {
        let id: Identifier = UUID.parse().unwrap();
        assert_eq!(id.as_bytes()[0], 0x5e);
        assert_eq!(id.as_bytes()[15], 0x60);
        assert_eq!(id.to_string(), UUID);
    }

    #[test]
    fn parses_bare_hex() {
        let a: Identifier = "5efabea4f6d491fdb8f017e004c89c60".parse().unwrap();
        let b: Identifier = UUID.parse().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_wrong_length_and_bad_hex() {
        assert!("5efabea4".parse::<Identifier>().is_err());
        assert!("zzfabea4-f6d4-91fd-b8f0-17e004c89c60"
            .parse::<Identifier>()
            .is_err());
    }

    #[test]
    fn matches_is_exact() {
        let id: Identifier = UUID.parse().unwrap();
        let mut bytes = *id.as_bytes();
        assert!(id.matches(&Identifier::from_bytes(bytes)));
        bytes[7] ^= 0x01;
        assert!(!id.matches(&Identifier::from_bytes(bytes)));
    }

    #[test]
    fn debug_hides_bytes() {
        let id: Identifier = UUID.parse().unwrap();
        assert_eq!(format!("{id:?}"), "Identifier(..)");
    }
}
