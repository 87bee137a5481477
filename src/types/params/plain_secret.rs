use std::io;

use bytes::Buf;
use zeroize::{Zeroize, Zeroizing};

use crate::crypto::hash::HashAlgorithm;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::crypto::{checksum, dsa, elgamal, rsa};
use crate::errors::Result;
use crate::parsing::BufParsing;
use crate::ser::Serialize;
use crate::types::{EncryptedSecretParams, Mpi, PkeskBytes, PublicParams, S2kParams, SecretMpi};

/// Decrypted secret key material.
#[derive(Clone, PartialEq, Eq, Zeroize, derive_more::Debug)]
pub enum PlainSecretParams {
    RSA(rsa::SecretKey),
    DSA(dsa::SecretKey),
    Elgamal(elgamal::SecretKey),
}

impl PlainSecretParams {
    /// Is this material of the same kind as `public`.
    pub fn matches(&self, public: &PublicParams) -> bool {
        matches!(
            (self, public),
            (PlainSecretParams::RSA(_), PublicParams::RSA(_))
                | (PlainSecretParams::DSA(_), PublicParams::DSA(_))
                | (PlainSecretParams::Elgamal(_), PublicParams::Elgamal(_))
        )
    }

    /// Reads the algorithm specific MPIs, without any checksum.
    pub fn from_buf<B: Buf>(alg: PublicKeyAlgorithm, mut i: B) -> Result<Self> {
        let params = match alg {
            PublicKeyAlgorithm::RSA | PublicKeyAlgorithm::RSAEncrypt | PublicKeyAlgorithm::RSASign => {
                let d = SecretMpi::from_buf(&mut i)?;
                let p = SecretMpi::from_buf(&mut i)?;
                let q = SecretMpi::from_buf(&mut i)?;
                let u = SecretMpi::from_buf(&mut i)?;
                PlainSecretParams::RSA(rsa::SecretKey { d, p, q, u })
            }
            PublicKeyAlgorithm::DSA => PlainSecretParams::DSA(dsa::SecretKey {
                x: SecretMpi::from_buf(&mut i)?,
            }),
            PublicKeyAlgorithm::Elgamal | PublicKeyAlgorithm::ElgamalSign => {
                PlainSecretParams::Elgamal(elgamal::SecretKey {
                    x: SecretMpi::from_buf(&mut i)?,
                })
            }
            PublicKeyAlgorithm::Unknown(id) => unsupported_err!("secret key algorithm {}", id),
        };

        Ok(params)
    }

    /// Reads the MPIs followed by a two octet checksum, as stored in
    /// unprotected keys.
    pub fn from_buf_checked<B: Buf>(alg: PublicKeyAlgorithm, mut i: B) -> Result<Self> {
        let params = Self::from_buf(alg, &mut i)?;
        let sum = i.read_array::<2>()?;
        checksum::simple(&sum, &params.to_bytes()?)?;

        Ok(params)
    }

    pub fn checksum_simple(&self) -> Result<[u8; 2]> {
        let raw = Zeroizing::new(self.to_bytes()?);
        Ok(checksum::calculate_simple(&raw).to_be_bytes())
    }

    pub fn checksum_sha1(&self) -> Result<[u8; 20]> {
        let raw = Zeroizing::new(self.to_bytes()?);
        Ok(checksum::calculate_sha1(&raw))
    }

    /// Encrypts the material under a key derived from `passphrase`.
    pub fn encrypt(&self, passphrase: &[u8], s2k: S2kParams) -> Result<EncryptedSecretParams> {
        let Some((sym_alg, key, iv)) = s2k.derive(passphrase)? else {
            bail!("can not encrypt without protection parameters");
        };
        ensure!(
            !matches!(sym_alg, SymmetricKeyAlgorithm::Plaintext),
            "plaintext is not a valid protection"
        );

        let mut data = Zeroizing::new(self.to_bytes()?);
        let check = match s2k {
            S2kParams::Cfb { .. } => checksum::calculate_sha1(&data).to_vec(),
            _ => checksum::calculate_simple(&data).to_be_bytes().to_vec(),
        };
        data.extend_from_slice(&check);
        sym_alg.encrypt_with_iv_regular(&key, iv, &mut data)?;

        Ok(EncryptedSecretParams::new(data.to_vec(), s2k))
    }

    /// Creates the raw signature values over the given digest.
    pub fn sign(
        &self,
        public: &PublicParams,
        hash: HashAlgorithm,
        digest: &[u8],
    ) -> Result<Vec<Mpi>> {
        match (self, public) {
            (PlainSecretParams::RSA(key), PublicParams::RSA(public)) => {
                Ok(vec![key.sign(public, hash, digest)?])
            }
            (PlainSecretParams::DSA(key), PublicParams::DSA(public)) => {
                let (r, s) = key.sign(public, hash, digest)?;
                Ok(vec![r, s])
            }
            (PlainSecretParams::Elgamal(_), _) => {
                unsupported_err!("Elgamal signatures")
            }
            _ => bail!("secret and public key material do not match"),
        }
    }

    /// Decrypts an encrypted session key, returning the unpadded message.
    pub fn decrypt(&self, public: &PublicParams, values: &PkeskBytes) -> Result<Zeroizing<Vec<u8>>> {
        let msg = match (self, public, values) {
            (PlainSecretParams::RSA(key), PublicParams::RSA(public), PkeskBytes::Rsa { mpi }) => {
                key.decrypt(public, mpi)?
            }
            (
                PlainSecretParams::Elgamal(key),
                PublicParams::Elgamal(public),
                PkeskBytes::Elgamal { first, second },
            ) => key.decrypt(public, first, second)?,
            _ => bail!("secret key, public key and session key do not match"),
        };

        Ok(Zeroizing::new(msg))
    }
}

impl Serialize for PlainSecretParams {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            PlainSecretParams::RSA(key) => {
                key.d.to_writer(writer)?;
                key.p.to_writer(writer)?;
                key.q.to_writer(writer)?;
                key.u.to_writer(writer)?;
            }
            PlainSecretParams::DSA(key) => key.x.to_writer(writer)?,
            PlainSecretParams::Elgamal(key) => key.x.to_writer(writer)?,
        }

        Ok(())
    }

    fn write_len(&self) -> usize {
        match self {
            PlainSecretParams::RSA(key) => {
                key.d.write_len() + key.p.write_len() + key.q.write_len() + key.u.write_len()
            }
            PlainSecretParams::DSA(key) => key.x.write_len(),
            PlainSecretParams::Elgamal(key) => key.x.write_len(),
        }
    }
}
