use std::io;

use byteorder::{BigEndian, WriteBytesExt};
use chrono::{DateTime, Duration, Utc};
use log::debug;

use crate::crypto::hash::{HashAlgorithm, WriteHasher};
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::crypto::{dsa, rsa};
use crate::errors::{Error, Result};
use crate::ser::{time_to_u32, Serialize};
use crate::types::{Fingerprint, KeyId, KeyVersion, Mpi, PublicParams};

/// Metadata of a key packet, and everything derived from it.
pub trait KeyDetails: std::fmt::Debug {
    fn version(&self) -> KeyVersion;

    fn algorithm(&self) -> PublicKeyAlgorithm;

    fn created_at(&self) -> &DateTime<Utc>;

    /// Validity period in days after key creation (only applicable to v2 and v3 keys).
    fn expiration(&self) -> Option<u16>;

    fn public_params(&self) -> &PublicParams;

    /// The point in time after which a v2 or v3 key is expired.
    fn expires_at(&self) -> Option<DateTime<Utc>> {
        match self.expiration() {
            Some(days) if days > 0 => {
                Some(*self.created_at() + Duration::days(i64::from(days)))
            }
            _ => None,
        }
    }

    /// Writes the public key packet body: version, creation time, validity
    /// period for v2/v3 keys, algorithm and the key material.
    fn to_writer_body<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(self.version().into())?;
        writer.write_u32::<BigEndian>(time_to_u32(self.created_at()))?;
        if self.version().is_legacy() {
            writer.write_u16::<BigEndian>(self.expiration().unwrap_or_default())?;
        }
        writer.write_u8(self.algorithm().into())?;
        self.public_params().to_writer(writer)?;

        Ok(())
    }

    fn body_len(&self) -> usize {
        let legacy = if self.version().is_legacy() { 2 } else { 0 };
        1 + 4 + legacy + 1 + self.public_params().write_len()
    }

    /// The form keys are hashed in: `0x99`, a two octet length, then the body.
    fn serialize_for_hashing<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(0x99)?;
        writer.write_u16::<BigEndian>(self.body_len().try_into()?)?;
        self.to_writer_body(writer)
    }

    /// Computes the fingerprint, hashing v4 keys with `hash`.
    ///
    /// v2 and v3 RSA keys are always MD5 over the raw bytes of `n` and `e`.
    fn fingerprint_with(&self, hash: HashAlgorithm) -> Result<Fingerprint> {
        if self.version().is_legacy() {
            let PublicParams::RSA(params) = self.public_params() else {
                unsupported_err!("v{} fingerprint for {:?}", u8::from(self.version()), self.algorithm());
            };
            let mut raw = params.n.as_ref().to_vec();
            raw.extend_from_slice(params.e.as_ref());
            return Ok(Fingerprint::new(&HashAlgorithm::Md5.digest(&raw)?));
        }

        let mut hasher = hash.new_hasher()?;
        self.serialize_for_hashing(&mut WriteHasher(&mut hasher))?;
        Ok(Fingerprint::new(&hasher.finalize()))
    }

    fn fingerprint(&self) -> Result<Fingerprint> {
        self.fingerprint_with(HashAlgorithm::Sha1)
    }

    /// v2 and v3 key ids are the low 64 bits of the modulus, v4 key ids the
    /// low 64 bits of the fingerprint.
    fn key_id_with(&self, hash: HashAlgorithm) -> Result<KeyId> {
        if self.version().is_legacy() {
            let PublicParams::RSA(params) = self.public_params() else {
                unsupported_err!("v{} key id for {:?}", u8::from(self.version()), self.algorithm());
            };
            return KeyId::from_tail(params.n.as_ref());
        }

        self.fingerprint_with(hash)?.key_id()
    }

    fn key_id(&self) -> Result<KeyId> {
        self.key_id_with(HashAlgorithm::Sha1)
    }

    /// Checks a raw signature over `digest`.
    fn verify_signature(&self, hash: HashAlgorithm, digest: &[u8], sig: &[Mpi]) -> Result<()> {
        let ok = match (self.public_params(), sig) {
            (PublicParams::RSA(params), [s]) => rsa::verify(params, hash, digest, s),
            (PublicParams::DSA(params), [r, s]) => dsa::verify(params, digest, r, s),
            (PublicParams::RSA(_) | PublicParams::DSA(_), _) => {
                debug!("unexpected number of signature values: {}", sig.len());
                false
            }
            (params, _) => unsupported_err!("verification with {:?}", params),
        };

        if ok {
            Ok(())
        } else {
            Err(Error::InvalidSignature)
        }
    }
}

impl<T: KeyDetails> KeyDetails for &T {
    fn version(&self) -> KeyVersion {
        (*self).version()
    }

    fn algorithm(&self) -> PublicKeyAlgorithm {
        (*self).algorithm()
    }

    fn created_at(&self) -> &DateTime<Utc> {
        (*self).created_at()
    }

    fn expiration(&self) -> Option<u16> {
        (*self).expiration()
    }

    fn public_params(&self) -> &PublicParams {
        (*self).public_params()
    }
}

/// Keys that can create signatures.
///
/// Contains private data.
pub trait SigningKey: KeyDetails {
    /// Creates the raw signature values over `digest`, unlocking the secret
    /// material with the passphrase `key_pw` returns if needed.
    fn create_signature<F>(&self, key_pw: F, hash: HashAlgorithm, digest: &[u8]) -> Result<Vec<Mpi>>
    where
        F: FnOnce() -> String;
}
