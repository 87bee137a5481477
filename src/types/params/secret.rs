use std::io;

use bytes::Buf;

use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::errors::Result;
use crate::parsing::BufParsing;
use crate::ser::Serialize;
use crate::types::{EncryptedSecretParams, PlainSecretParams, S2kParams};

/// The secret part of a secret key packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretParams {
    Plain(PlainSecretParams),
    Encrypted(EncryptedSecretParams),
}

impl SecretParams {
    pub fn is_encrypted(&self) -> bool {
        matches!(self, SecretParams::Encrypted(_))
    }

    /// Reads the string to key usage octet and everything after it.
    pub fn from_buf<B: Buf>(alg: PublicKeyAlgorithm, mut i: B) -> Result<Self> {
        let s2k = S2kParams::from_buf(&mut i)?;
        if s2k.is_protected() {
            let data = i.rest().to_vec();
            return Ok(SecretParams::Encrypted(EncryptedSecretParams::new(data, s2k)));
        }

        let params = PlainSecretParams::from_buf_checked(alg, &mut i)?;
        ensure!(!i.has_remaining(), "trailing secret key material");
        Ok(SecretParams::Plain(params))
    }
}

impl Serialize for SecretParams {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            SecretParams::Plain(params) => {
                S2kParams::Unprotected.to_writer(writer)?;
                params.to_writer(writer)?;
                writer.write_all(&params.checksum_simple()?)?;
            }
            SecretParams::Encrypted(params) => params.to_writer(writer)?,
        }

        Ok(())
    }

    fn write_len(&self) -> usize {
        match self {
            SecretParams::Plain(params) => 1 + params.write_len() + 2,
            SecretParams::Encrypted(params) => params.write_len(),
        }
    }
}
