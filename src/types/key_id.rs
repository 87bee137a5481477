use std::fmt;
use std::str::FromStr;

use crate::errors::{Error, Result};

/// Represents a Key ID.
///
/// The low-order four bytes form the short key id.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Default, derive_more::Debug)]
#[debug("KeyId({})", hex::encode(_0))]
pub struct KeyId([u8; 8]);

impl AsRef<[u8]> for KeyId {
    fn as_ref(&self) -> &[u8] {
        &self.0[..]
    }
}

impl From<[u8; 8]> for KeyId {
    fn from(value: [u8; 8]) -> Self {
        KeyId(value)
    }
}

impl KeyId {
    pub fn from_slice(input: &[u8]) -> Result<KeyId> {
        ensure_eq!(input.len(), 8, "invalid input length");
        let mut r = [0u8; 8];
        r.copy_from_slice(input);

        Ok(KeyId(r))
    }

    /// Takes the low-order 8 bytes of `input`.
    pub fn from_tail(input: &[u8]) -> Result<KeyId> {
        ensure!(input.len() >= 8, "input too short for a key id");
        Self::from_slice(&input[input.len() - 8..])
    }

    /// The low-order 4 bytes.
    pub fn short(&self) -> &[u8] {
        &self.0[4..]
    }

    /// Matches either the full 8 byte id or the 4 byte short id.
    pub fn matches(&self, id: &[u8]) -> bool {
        match id.len() {
            8 => self.0[..] == *id,
            4 => self.short() == id,
            _ => false,
        }
    }

    pub fn is_wildcard(&self) -> bool {
        self.0 == [0u8; 8]
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode_upper(self.0))
    }
}

impl FromStr for KeyId {
    type Err = Error;

    /// Parses 16 hex digits, with an optional `0x` prefix.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let s = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        ensure_eq!(s.len(), 16, "invalid key id length");
        let raw = hex::decode(s).map_err(|e| format_err!("invalid key id: {}", e))?;
        Self::from_slice(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_id() {
        let id = KeyId::from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        assert_eq!(id.short(), &[5, 6, 7, 8]);
        assert!(id.matches(&[1, 2, 3, 4, 5, 6, 7, 8]));
        assert!(id.matches(&[5, 6, 7, 8]));
        assert!(!id.matches(&[1, 2, 3, 4]));
        assert!(!id.matches(&[6, 7, 8]));

        assert_eq!(id.to_string(), "0102030405060708");
        assert_eq!("0x0102030405060708".parse::<KeyId>().unwrap(), id);
        assert!("01020304".parse::<KeyId>().is_err());
        assert!("zz02030405060708".parse::<KeyId>().is_err());
        assert!(KeyId::from_slice(&[1, 2]).is_err());

        let tail = KeyId::from_tail(&[9, 9, 1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        assert_eq!(tail, id);
    }
}
