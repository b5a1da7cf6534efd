//! Instance-lifetime challenge.
//!
//! One challenge is generated when the server is constructed and sent in every
//! protocol-2 greeting. A request signed against an earlier run of the server
//! carries that run's challenge and is rejected.

use crate::error::{Result, VotifierError};
use std::fmt;
use subtle::ConstantTimeEq;

/// Random bytes behind a challenge (128 bits)
pub const CHALLENGE_BYTES: usize = 16;

/// Printable random value held for the lifetime of a server instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge(String);

impl Challenge {
    /// Generate a fresh challenge from the operating system RNG.
    pub fn generate() -> Result<Self> {
        let mut bytes = [0u8; CHALLENGE_BYTES];
        getrandom::fill(&mut bytes)
            .map_err(|e| VotifierError::Custom(format!("Failed to generate challenge: {e}")))?;
        Ok(Self(hex::encode(bytes)))
    }

    /// Wrap an existing value, e.g. a challenge read from a greeting line.
    pub fn from_value(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Constant-time equality against a challenge echoed by a client.
    pub fn matches(&self, candidate: &str) -> bool {
        self.0.as_bytes().ct_eq(candidate.as_bytes()).into()
    }
}

impl fmt::Display for Challenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_challenge_is_hex_128_bits() {
        let challenge = Challenge::generate().unwrap();
        assert_eq!(challenge.as_str().len(), CHALLENGE_BYTES * 2);
        assert!(challenge.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_challenges_differ() {
        let a = Challenge::generate().unwrap();
        let b = Challenge::generate().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_matches_exact_only() {
        let challenge = Challenge::from_value("abc123");
        assert!(challenge.matches("abc123"));
        assert!(!challenge.matches("abc12"));
        assert!(!challenge.matches("ABC123"));
        assert!(!challenge.matches(""));
    }
}
