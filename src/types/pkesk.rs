use std::io;

use bytes::{Buf, Bytes};
use rand::{CryptoRng, Rng};

use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::crypto::{elgamal, rsa};
use crate::errors::Result;
use crate::parsing::BufParsing;
use crate::ser::Serialize;
use crate::types::{Mpi, PublicParams};

/// Algorithm specific encrypted session key values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PkeskBytes {
    Rsa {
        mpi: Mpi,
    },
    /// The ephemeral value `g^k mod p` and the ciphertext.
    Elgamal {
        first: Mpi,
        second: Mpi,
    },
    Other {
        data: Bytes,
    },
}

impl PkeskBytes {
    /// Encrypts the session key message to the given public key.
    pub fn encrypt<R: CryptoRng + Rng>(
        rng: &mut R,
        public: &PublicParams,
        msg: &[u8],
    ) -> Result<Self> {
        match public {
            PublicParams::RSA(params) => Ok(PkeskBytes::Rsa {
                mpi: rsa::encrypt(rng, params, msg)?,
            }),
            PublicParams::Elgamal(params) => {
                let (first, second) = elgamal::encrypt(rng, params, msg)?;
                Ok(PkeskBytes::Elgamal { first, second })
            }
            PublicParams::DSA(_) => bail!("DSA is only used for signing"),
            PublicParams::Unknown { .. } => unsupported_err!("encryption with unknown algorithm"),
        }
    }

    pub fn from_buf<B: Buf>(alg: PublicKeyAlgorithm, mut i: B) -> Result<Self> {
        let values = match alg {
            PublicKeyAlgorithm::RSA | PublicKeyAlgorithm::RSAEncrypt | PublicKeyAlgorithm::RSASign => {
                PkeskBytes::Rsa {
                    mpi: Mpi::from_buf(&mut i)?,
                }
            }
            PublicKeyAlgorithm::Elgamal | PublicKeyAlgorithm::ElgamalSign => {
                let first = Mpi::from_buf(&mut i)?;
                let second = Mpi::from_buf(&mut i)?;
                PkeskBytes::Elgamal { first, second }
            }
            _ => PkeskBytes::Other { data: i.rest() },
        };

        Ok(values)
    }
}

impl Serialize for PkeskBytes {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            PkeskBytes::Rsa { mpi } => mpi.to_writer(writer)?,
            PkeskBytes::Elgamal { first, second } => {
                first.to_writer(writer)?;
                second.to_writer(writer)?;
            }
            PkeskBytes::Other { data } => writer.write_all(data)?,
        }

        Ok(())
    }

    fn write_len(&self) -> usize {
        match self {
            PkeskBytes::Rsa { mpi } => mpi.write_len(),
            PkeskBytes::Elgamal { first, second } => first.write_len() + second.write_len(),
            PkeskBytes::Other { data } => data.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::errors::Error;
    use crate::types::PlainSecretParams;

    #[test]
    fn test_rsa_codec() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let (public, secret) = crate::crypto::rsa::tests::test_key(5);
        let public = PublicParams::RSA(public);
        let secret = PlainSecretParams::RSA(secret);

        let msg = b"\x09session key material0123456789ab\x12\x34";
        let values = PkeskBytes::encrypt(&mut rng, &public, msg).unwrap();

        let raw = values.to_bytes().unwrap();
        let values = PkeskBytes::from_buf(PublicKeyAlgorithm::RSA, &raw[..]).unwrap();
        assert_eq!(&secret.decrypt(&public, &values).unwrap()[..], &msg[..]);
    }

    #[test]
    fn test_elgamal_codec() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let (public, secret) = crate::crypto::elgamal::tests::test_key(6);
        let public = PublicParams::Elgamal(public);
        let secret = PlainSecretParams::Elgamal(secret);

        let msg = [0x07u8; 19];
        let values = PkeskBytes::encrypt(&mut rng, &public, &msg).unwrap();
        assert!(matches!(values, PkeskBytes::Elgamal { .. }));
        assert_eq!(&secret.decrypt(&public, &values).unwrap()[..], &msg[..]);
    }

    #[test]
    fn test_corrupted_leading_byte() {
        let (public, secret) = crate::crypto::rsa::tests::test_key(5);
        let public_params = PublicParams::RSA(public.clone());

        // a block carrying 0x01 where 0x02 belongs
        let mut block = vec![0x00, 0x01];
        block.extend(std::iter::repeat(0x55).take(public.n.len() - 2 - 6));
        block.extend_from_slice(&[0x00, 1, 2, 3, 4, 5]);
        let c = num_bigint::BigUint::from_bytes_be(&block)
            .modpow(&public.e.to_biguint(), &public.n.to_biguint());
        let values = PkeskBytes::Rsa { mpi: c.into() };

        assert!(matches!(
            PlainSecretParams::RSA(secret).decrypt(&public_params, &values),
            Err(Error::DecryptionFailed)
        ));
    }

    #[test]
    fn test_dsa_rejected() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let (public, _) = crate::crypto::dsa::tests::test_key();
        assert!(PkeskBytes::encrypt(&mut rng, &PublicParams::DSA(public), b"abc").is_err());
    }
}
