use log::debug;
use num_bigint::{BigUint, ModInverse, RandBigInt};
use num_traits::One;
use rand::{CryptoRng, Rng};
use zeroize::Zeroize;

use crate::crypto::pkcs1;
use crate::errors::{Error, Result};
use crate::types::{ElgamalPublicParams, Mpi, SecretMpi};

/// Secret key for Elgamal.
#[derive(Clone, PartialEq, Eq, Zeroize, derive_more::Debug)]
pub struct SecretKey {
    /// MPI of Elgamal secret exponent x.
    #[debug("..")]
    pub x: SecretMpi,
}

/// Elgamal encryption of an EME-PKCS1-v1_5 encoded message.
/// Returns the ephemeral value `g^k` and the ciphertext `m * y^k`.
pub fn encrypt<R: CryptoRng + Rng>(
    rng: &mut R,
    params: &ElgamalPublicParams,
    plaintext: &[u8],
) -> Result<(Mpi, Mpi)> {
    debug!("Elgamal encrypt");
    let p = params.p.to_biguint();
    let block = pkcs1::eme_encode(rng, plaintext, params.p.len())?;
    let m = BigUint::from_bytes_be(&block);
    ensure!(m < p, "message out of range");

    let one = BigUint::one();
    let k = rng.gen_biguint_range(&one, &(&p - &one));
    let c1 = params.g.to_biguint().modpow(&k, &p);
    let c2 = (m * params.y.to_biguint().modpow(&k, &p)) % &p;

    Ok((c1.into(), c2.into()))
}

impl SecretKey {
    /// Decrypts and strips the padding.
    ///
    /// The decrypted value is handled as a plain big-endian integer, so its
    /// leading zero byte is gone and the block is expected to start with a
    /// single `0x02`.
    pub fn decrypt(&self, params: &ElgamalPublicParams, c1: &Mpi, c2: &Mpi) -> Result<Vec<u8>> {
        let p = params.p.to_biguint();
        let s = c1.to_biguint().modpow(&self.x.to_biguint(), &p);
        let s_inv = s
            .mod_inverse(&p)
            .and_then(|v| v.to_biguint())
            .ok_or(Error::DecryptionFailed)?;
        let m = (c2.to_biguint() * s_inv) % &p;

        let block = m.to_bytes_be();
        let msg = pkcs1::eme_decode(&block, &[0x02])?;
        Ok(msg.to_vec())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use num_traits::Num;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    /// 2048-bit MODP group from <https://www.rfc-editor.org/rfc/rfc3526#section-3>
    const MODP_2048: &str = "\
        FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD129024E088A67CC74\
        020BBEA63B139B22514A08798E3404DDEF9519B3CD3A431B302B0A6DF25F1437\
        4FE1356D6D51C245E485B576625E7EC6F44C42E9A637ED6B0BFF5CB6F406B7ED\
        EE386BFB5A899FA5AE9F24117C4B1FE649286651ECE45B3DC2007CB8A163BF05\
        98DA48361C55D39A69163FA8FD24CF5F83655D23DCA3AD961C62F356208552BB\
        9ED529077096966D670C354E4ABC9804F1746C08CA18217C32905E462E36CE3B\
        E39E772C180E86039B2783A2EC07A28FB5C55DF06F4C52C9DE2BCBF695581718\
        3995497CEA956AE515D2261898FA051015728E5A8AACAA68FFFFFFFFFFFFFFFF";

    pub(crate) fn test_key(seed: u64) -> (ElgamalPublicParams, SecretKey) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let p = BigUint::from_str_radix(MODP_2048, 16).unwrap();
        let g = BigUint::from(2u32);
        let x = rng.gen_biguint_range(&BigUint::from(2u32), &(&p - BigUint::from(2u32)));
        let y = g.modpow(&x, &p);

        (
            ElgamalPublicParams {
                p: p.into(),
                g: g.into(),
                y: y.into(),
            },
            SecretKey { x: (&x).into() },
        )
    }

    #[test]
    fn test_encrypt_decrypt() {
        let (params, key) = test_key(0);
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        for msg in [&b"\x09"[..], &[0xAB; 35][..], &[]] {
            let (c1, c2) = encrypt(&mut rng, &params, msg).unwrap();
            assert_eq!(key.decrypt(&params, &c1, &c2).unwrap(), msg);
        }
    }

    #[test]
    fn test_decrypt_corrupted() {
        let (params, key) = test_key(2);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let (c1, c2) = encrypt(&mut rng, &params, b"session").unwrap();

        let mut raw = c2.as_ref().to_vec();
        raw[0] ^= 0x40;
        assert!(matches!(
            key.decrypt(&params, &c1, &Mpi::from_slice(&raw)),
            Err(Error::DecryptionFailed)
        ));
    }

    #[test]
    fn test_single_leading_byte_quirk() {
        // the decoder looks for one 0x02 byte, not the 0x00 0x02 pair
        let mut block = vec![0x02];
        block.extend_from_slice(&[0x11; 12]);
        block.push(0x00);
        block.extend_from_slice(b"key");
        assert_eq!(pkcs1::eme_decode(&block, &[0x02]).unwrap(), b"key");

        let mut padded = vec![0x00];
        padded.extend_from_slice(&block);
        assert!(pkcs1::eme_decode(&padded, &[0x02]).is_err());
    }
}
