use std::io;

use bytes::Buf;
use log::debug;
use zeroize::Zeroizing;

use crate::crypto::checksum;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::errors::{Error, Result};
use crate::ser::Serialize;
use crate::types::{PlainSecretParams, S2kParams};

/// Passphrase protected secret key material.
#[derive(Clone, PartialEq, Eq, derive_more::Debug)]
pub struct EncryptedSecretParams {
    /// The encrypted MPIs, followed by their encrypted checksum or hash.
    #[debug("{}", hex::encode(data))]
    data: Vec<u8>,
    s2k: S2kParams,
}

impl EncryptedSecretParams {
    pub fn new(data: Vec<u8>, s2k: S2kParams) -> Self {
        EncryptedSecretParams { data, s2k }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn s2k(&self) -> &S2kParams {
        &self.s2k
    }

    /// Decrypts the material and checks its checksum or hash.
    ///
    /// Any mismatch is reported as [`Error::InvalidPassphrase`].
    pub fn unlock(&self, passphrase: &[u8], alg: PublicKeyAlgorithm) -> Result<PlainSecretParams> {
        let Some((sym_alg, key, iv)) = self.s2k.derive(passphrase)? else {
            bail!("secret key material is not encrypted");
        };

        let mut plaintext = Zeroizing::new(self.data.clone());
        sym_alg.decrypt_with_iv_regular(&key, iv, &mut plaintext)?;

        let check_len = match self.s2k {
            S2kParams::Cfb { .. } => 20,
            _ => 2,
        };
        if plaintext.len() < check_len {
            return Err(Error::InvalidPassphrase);
        }
        let (material, check) = plaintext.split_at(plaintext.len() - check_len);

        let ok = match self.s2k {
            S2kParams::Cfb { .. } => checksum::sha1(check, material).is_ok(),
            _ => checksum::simple(check, material).is_ok(),
        };
        if !ok {
            debug!("secret key checksum mismatch");
            return Err(Error::InvalidPassphrase);
        }

        let mut buf = material;
        let params = PlainSecretParams::from_buf(alg, &mut buf)?;
        ensure!(!buf.has_remaining(), "failed to process full secret key material");

        Ok(params)
    }
}

impl Serialize for EncryptedSecretParams {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        self.s2k.to_writer(writer)?;
        writer.write_all(&self.data)?;

        Ok(())
    }

    fn write_len(&self) -> usize {
        self.s2k.write_len() + self.data.len()
    }
}
