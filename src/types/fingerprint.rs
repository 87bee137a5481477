use std::fmt;

use crate::errors::Result;
use crate::types::KeyId;

/// Represents a Fingerprint.
///
/// The length depends on the hash that produced it: 16 bytes for MD5 based
/// fingerprints, 20 bytes for SHA1.
#[derive(Clone, Eq, PartialEq, Hash, derive_more::Debug)]
#[debug("Fingerprint({})", hex::encode(_0))]
pub struct Fingerprint(Vec<u8>);

impl Fingerprint {
    pub fn new(fp: &[u8]) -> Self {
        Fingerprint(fp.to_vec())
    }

    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The low-order 8 bytes.
    pub fn key_id(&self) -> Result<KeyId> {
        KeyId::from_tail(&self.0)
    }
}

impl AsRef<[u8]> for Fingerprint {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode_upper(&self.0))
    }
}
