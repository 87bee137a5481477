use log::debug;
use num_bigint::{BigUint, ModInverse};
use rand::{CryptoRng, Rng};
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use rsa::RsaPrivateKey;
use zeroize::Zeroize;

use crate::crypto::hash::HashAlgorithm;
use crate::crypto::pkcs1;
use crate::errors::{Error, Result};
use crate::types::{Mpi, RsaPublicParams, SecretMpi};

/// Secret key for RSA.
#[derive(Clone, PartialEq, Eq, Zeroize, derive_more::Debug)]
pub struct SecretKey {
    #[debug("..")]
    pub d: SecretMpi,
    #[debug("..")]
    pub p: SecretMpi,
    #[debug("..")]
    pub q: SecretMpi,
    /// Multiplicative inverse of `p` modulo `q`.
    #[debug("..")]
    pub u: SecretMpi,
}

impl SecretKey {
    /// Raw private operation `c^d mod n`, left padded to the modulus length.
    fn raw_decrypt(&self, public: &RsaPublicParams, c: &BigUint) -> Result<Vec<u8>> {
        let n = public.n.to_biguint();
        ensure!(c < &n, "value out of range");
        let m = c.modpow(&self.d.to_biguint(), &n);
        Ok(left_pad(&m.to_bytes_be(), public.n.len()))
    }

    /// Recovers the message from an RSA encrypted session key MPI.
    ///
    /// The block must start with `0x00 0x02`; any padding error yields
    /// [`Error::DecryptionFailed`].
    pub fn decrypt(&self, public: &RsaPublicParams, mpi: &Mpi) -> Result<Vec<u8>> {
        let block = self
            .raw_decrypt(public, &mpi.to_biguint())
            .map_err(|_| Error::DecryptionFailed)?;
        let msg = pkcs1::eme_decode(&block, &[0x00, 0x02])?;
        Ok(msg.to_vec())
    }

    /// Sign using RSA, with PKCS1v15 padding.
    pub fn sign(
        &self,
        public: &RsaPublicParams,
        hash: HashAlgorithm,
        digest: &[u8],
    ) -> Result<Mpi> {
        let block = pkcs1::emsa_encode(hash, digest, public.n.len())?;
        let m = BigUint::from_bytes_be(&block);
        let s = m.modpow(&self.d.to_biguint(), &public.n.to_biguint());
        Ok(s.into())
    }
}

fn left_pad(raw: &[u8], len: usize) -> Vec<u8> {
    if raw.len() >= len {
        return raw.to_vec();
    }
    let mut out = vec![0u8; len - raw.len()];
    out.extend_from_slice(raw);
    out
}

/// Raw public operation `m^e mod n`.
fn raw_encrypt(public: &RsaPublicParams, m: &BigUint) -> Result<BigUint> {
    let n = public.n.to_biguint();
    ensure!(m < &n, "value out of range");
    Ok(m.modpow(&public.e.to_biguint(), &n))
}

/// RSA encryption using PKCS1v15 padding.
pub fn encrypt<R: CryptoRng + Rng>(
    rng: &mut R,
    public: &RsaPublicParams,
    plaintext: &[u8],
) -> Result<Mpi> {
    debug!("RSA encrypt");
    let block = pkcs1::eme_encode(rng, plaintext, public.n.len())?;
    let c = raw_encrypt(public, &BigUint::from_bytes_be(&block))?;
    Ok(c.into())
}

/// Verify a RSA, PKCS1v15 padded signature.
pub fn verify(public: &RsaPublicParams, hash: HashAlgorithm, digest: &[u8], sig: &Mpi) -> bool {
    let Ok(m) = raw_encrypt(public, &sig.to_biguint()) else {
        return false;
    };
    let block = left_pad(&m.to_bytes_be(), public.n.len());
    pkcs1::emsa_verify(hash, digest, &block)
}

/// Generate an RSA KeyPair.
pub fn generate_key<R: Rng + CryptoRng>(
    rng: &mut R,
    bit_size: usize,
) -> Result<(RsaPublicParams, SecretKey)> {
    let key = RsaPrivateKey::new(rng, bit_size)?;

    let p = &key.primes()[0];
    let q = &key.primes()[1];
    let u = p
        .clone()
        .mod_inverse(q)
        .and_then(|x| x.to_biguint())
        .ok_or_else(|| format_err!("invalid prime"))?;

    Ok((
        RsaPublicParams {
            n: key.n().into(),
            e: key.e().into(),
        },
        SecretKey {
            d: key.d().into(),
            p: p.into(),
            q: q.into(),
            u: (&u).into(),
        },
    ))
}
