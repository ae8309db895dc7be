//! Room Identifiers
//!
//! Six uppercase ASCII alphanumerics. User input is trimmed and uppercased
//! before validation; anything else is rejected before the transport is
//! touched.

use std::fmt;
use std::str::FromStr;
use serde::{Serialize, Deserialize};

use crate::core::rng::DeterministicRng;

/// Room id length.
pub const ROOM_ID_LEN: usize = 6;

/// Characters a room id may contain.
pub const ROOM_ID_ALPHABET: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// A validated room identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomId(String);

impl RoomId {
    /// Validate an id exactly as given.
    pub fn parse(value: &str) -> Result<Self, RoomIdError> {
        let found = value.chars().count();
        if found != ROOM_ID_LEN {
            return Err(RoomIdError::InvalidLength { expected: ROOM_ID_LEN, found });
        }
        if let Some((index, ch)) = value
            .chars()
            .enumerate()
            .find(|(_, ch)| !ROOM_ID_ALPHABET.contains(*ch))
        {
            return Err(RoomIdError::InvalidCharacter { ch, index });
        }
        Ok(Self(value.to_string()))
    }

    /// Trim and uppercase user input, then validate.
    pub fn normalize(input: &str) -> Result<Self, RoomIdError> {
        Self::parse(&input.trim().to_ascii_uppercase())
    }

    /// Draw a fresh id.
    pub fn generate(rng: &mut DeterministicRng) -> Self {
        let alphabet = ROOM_ID_ALPHABET.as_bytes();
        let id = (0..ROOM_ID_LEN)
            .map(|_| alphabet[rng.next_int(alphabet.len() as u32) as usize] as char)
            .collect();
        Self(id)
    }

    /// The id text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for RoomId {
    type Err = RoomIdError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl TryFrom<String> for RoomId {
    type Error = RoomIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RoomId> for String {
    fn from(id: RoomId) -> Self {
        id.0
    }
}

/// Room id validation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomIdError {
    /// Wrong number of characters.
    #[error("Room id must be {expected} characters, got {found}")]
    InvalidLength {
        /// Required length
        expected: usize,
        /// Actual length
        found: usize,
    },

    /// Character outside `A-Z0-9`.
    #[error("Invalid character '{ch}' at position {index}")]
    InvalidCharacter {
        /// Offending character
        ch: char,
        /// Its position
        index: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        let id = RoomId::parse("AB12CD").unwrap();
        assert_eq!(id.as_str(), "AB12CD");
        assert_eq!(id.to_string(), "AB12CD");
        assert_eq!("ZZZ999".parse::<RoomId>().unwrap().as_str(), "ZZZ999");
    }

    #[test]
    fn test_parse_rejects() {
        assert_eq!(
            RoomId::parse("ABC"),
            Err(RoomIdError::InvalidLength { expected: 6, found: 3 })
        );
        assert_eq!(
            RoomId::parse("ab12cd"),
            Err(RoomIdError::InvalidCharacter { ch: 'a', index: 0 })
        );
        assert_eq!(
            RoomId::parse("AB-2CD"),
            Err(RoomIdError::InvalidCharacter { ch: '-', index: 2 })
        );
        assert!(RoomId::parse("ÄB12CD").is_err());
    }

    #[test]
    fn test_normalize_user_input() {
        assert_eq!(RoomId::normalize("  ab12cd \n").unwrap().as_str(), "AB12CD");
        assert!(RoomId::normalize("ab12c").is_err());
        assert!(RoomId::normalize("ab 2cd").is_err());
    }

    #[test]
    fn test_generate_is_valid() {
        let mut rng = DeterministicRng::new(3);
        for _ in 0..50 {
            let id = RoomId::generate(&mut rng);
            assert!(RoomId::parse(id.as_str()).is_ok());
        }
    }

    #[test]
    fn test_serde_validates() {
        let id: RoomId = serde_json::from_str("\"Q1W2E3\"").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"Q1W2E3\"");
        assert!(serde_json::from_str::<RoomId>("\"nope\"").is_err());
    }
}
