use std::io;

use bytes::Buf;
use log::debug;
use num_enum::{FromPrimitive, IntoPrimitive};
use rand::{CryptoRng, Rng};
use zeroize::Zeroizing;

use crate::crypto::hash::HashAlgorithm;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::Result;
use crate::parsing::BufParsing;
use crate::ser::Serialize;

const EXPBIAS: u32 = 6;
const DEFAULT_ITER_SALTED_COUNT: u8 = 224;

/// Available String-To-Key types
///
/// Ref: <https://www.rfc-editor.org/rfc/rfc4880.html#section-3.7.1>
#[derive(Debug, PartialEq, Eq, Copy, Clone, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum StringToKeyType {
    Simple = 0,
    Salted = 1,
    Reserved = 2,
    IteratedAndSalted = 3,

    #[num_enum(catch_all)]
    Other(u8),
}

/// A string to key specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringToKey {
    typ: StringToKeyType,
    hash: HashAlgorithm,
    salt: Option<[u8; 8]>,
    count: Option<u8>,
}

impl StringToKey {
    pub fn new_simple(hash: HashAlgorithm) -> Self {
        StringToKey {
            typ: StringToKeyType::Simple,
            hash,
            salt: None,
            count: None,
        }
    }

    pub fn new_salted<R: CryptoRng + Rng>(mut rng: R, hash: HashAlgorithm) -> Self {
        StringToKey {
            typ: StringToKeyType::Salted,
            hash,
            salt: Some(rng.gen()),
            count: None,
        }
    }

    pub fn new_iterated<R: CryptoRng + Rng>(mut rng: R, hash: HashAlgorithm, count: u8) -> Self {
        StringToKey {
            typ: StringToKeyType::IteratedAndSalted,
            hash,
            salt: Some(rng.gen()),
            count: Some(count),
        }
    }

    /// Iterated and salted SHA256, with a coded count of 224.
    pub fn new_default<R: CryptoRng + Rng>(rng: R) -> Self {
        Self::new_iterated(rng, HashAlgorithm::Sha256, DEFAULT_ITER_SALTED_COUNT)
    }

    pub fn typ(&self) -> StringToKeyType {
        self.typ
    }

    pub fn hash(&self) -> HashAlgorithm {
        self.hash
    }

    pub fn salt(&self) -> Option<&[u8; 8]> {
        self.salt.as_ref()
    }

    /// Converts a coded count into the count.
    /// Ref: <https://www.rfc-editor.org/rfc/rfc4880.html#section-3.7.1.3>
    pub fn count(&self) -> Option<usize> {
        self.count
            .map(|c| ((16u32 + u32::from(c & 15)) << (u32::from(c >> 4) + EXPBIAS)) as usize)
    }

    pub fn from_buf<B: Buf>(mut i: B) -> Result<Self> {
        let typ = StringToKeyType::from(i.read_u8()?);
        let hash = HashAlgorithm::from(i.read_u8()?);
        let (salt, count) = match typ {
            StringToKeyType::Simple => (None, None),
            StringToKeyType::Salted => (Some(i.read_array::<8>()?), None),
            StringToKeyType::IteratedAndSalted => {
                (Some(i.read_array::<8>()?), Some(i.read_u8()?))
            }
            _ => unsupported_err!("string to key type {:?}", typ),
        };

        Ok(StringToKey {
            typ,
            hash,
            salt,
            count,
        })
    }

    /// Derives a key of `key_size` bytes from the passphrase.
    ///
    /// When one digest is not enough, further hash contexts are preloaded with
    /// one more zero octet each and their outputs concatenated.
    pub fn derive_key(&self, passphrase: &[u8], key_size: usize) -> Result<Zeroizing<Vec<u8>>> {
        debug!("derive key {:?} {:?} {}", self.typ, self.hash, key_size);
        let digest_size = self.hash.digest_size().unwrap_or(0);
        ensure!(digest_size > 0, "invalid hash algorithm {:?}", self.hash);

        let mut salted = Zeroizing::new(Vec::with_capacity(8 + passphrase.len()));
        if let Some(salt) = &self.salt {
            salted.extend_from_slice(salt);
        }
        salted.extend_from_slice(passphrase);

        let total = match self.typ {
            StringToKeyType::IteratedAndSalted => self.count().unwrap_or(0).max(salted.len()),
            _ => salted.len(),
        };

        let mut key = Zeroizing::new(Vec::with_capacity(key_size + digest_size));
        let mut round = 0;
        while key.len() < key_size {
            let mut hasher = self.hash.new_hasher()?;
            hasher.update(&vec![0u8; round]);

            let mut remaining = total;
            while remaining > 0 {
                let n = remaining.min(salted.len());
                hasher.update(&salted[..n]);
                remaining -= n;
            }

            key.extend_from_slice(&hasher.finalize());
            round += 1;
        }
        key.truncate(key_size);

        Ok(key)
    }
}

impl Serialize for StringToKey {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&[self.typ.into(), self.hash.into()])?;

        if let Some(ref salt) = self.salt {
            writer.write_all(salt)?;
        }

        if let Some(count) = self.count {
            writer.write_all(&[count])?;
        }

        Ok(())
    }

    fn write_len(&self) -> usize {
        2 + self.salt.map(|_| 8).unwrap_or(0) + self.count.map(|_| 1).unwrap_or(0)
    }
}

/// How the secret parts of a key are protected, as given by the string to key
/// usage octet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum S2kParams {
    /// Usage `0`: stored in the clear, with a two octet checksum.
    Unprotected,
    /// Usage `254`: CFB encrypted, with a SHA1 check hash.
    Cfb {
        sym_alg: SymmetricKeyAlgorithm,
        s2k: StringToKey,
        iv: Vec<u8>,
    },
    /// Usage `255`: CFB encrypted, with a two octet checksum.
    MalleableCfb {
        sym_alg: SymmetricKeyAlgorithm,
        s2k: StringToKey,
        iv: Vec<u8>,
    },
    /// Any other usage octet names the cipher directly; the key is the MD5 of
    /// the passphrase.
    LegacyCfb {
        sym_alg: SymmetricKeyAlgorithm,
        iv: Vec<u8>,
    },
}

impl S2kParams {
    /// Protection with AES128 and the default iterated and salted S2K.
    pub fn new_default<R: CryptoRng + Rng>(mut rng: R) -> Self {
        let sym_alg = SymmetricKeyAlgorithm::AES128;
        let mut iv = vec![0u8; sym_alg.block_size()];
        rng.fill(&mut iv[..]);

        S2kParams::Cfb {
            sym_alg,
            s2k: StringToKey::new_default(&mut rng),
            iv,
        }
    }

    pub fn usage(&self) -> u8 {
        match self {
            S2kParams::Unprotected => 0,
            S2kParams::Cfb { .. } => 254,
            S2kParams::MalleableCfb { .. } => 255,
            S2kParams::LegacyCfb { sym_alg, .. } => (*sym_alg).into(),
        }
    }

    pub fn is_protected(&self) -> bool {
        !matches!(self, S2kParams::Unprotected)
    }

    pub fn from_buf<B: Buf>(mut i: B) -> Result<Self> {
        let usage = i.read_u8()?;
        let params = match usage {
            0 => S2kParams::Unprotected,
            254 | 255 => {
                let sym_alg = SymmetricKeyAlgorithm::from(i.read_u8()?);
                let s2k = StringToKey::from_buf(&mut i)?;
                let iv = i.read_take(sym_alg.block_size())?.to_vec();
                if usage == 254 {
                    S2kParams::Cfb { sym_alg, s2k, iv }
                } else {
                    S2kParams::MalleableCfb { sym_alg, s2k, iv }
                }
            }
            _ => {
                let sym_alg = SymmetricKeyAlgorithm::from(usage);
                let iv = i.read_take(sym_alg.block_size())?.to_vec();
                S2kParams::LegacyCfb { sym_alg, iv }
            }
        };

        Ok(params)
    }

    /// The cipher, derived key and IV used to protect the secret material.
    pub(crate) fn derive(
        &self,
        passphrase: &[u8],
    ) -> Result<Option<(SymmetricKeyAlgorithm, Zeroizing<Vec<u8>>, &[u8])>> {
        match self {
            S2kParams::Unprotected => Ok(None),
            S2kParams::Cfb { sym_alg, s2k, iv } | S2kParams::MalleableCfb { sym_alg, s2k, iv } => {
                let key = s2k.derive_key(passphrase, sym_alg.key_size())?;
                Ok(Some((*sym_alg, key, iv)))
            }
            S2kParams::LegacyCfb { sym_alg, iv } => {
                let key = StringToKey::new_simple(HashAlgorithm::Md5)
                    .derive_key(passphrase, sym_alg.key_size())?;
                Ok(Some((*sym_alg, key, iv)))
            }
        }
    }
}

impl Serialize for S2kParams {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&[self.usage()])?;
        match self {
            S2kParams::Unprotected => {}
            S2kParams::Cfb { sym_alg, s2k, iv } | S2kParams::MalleableCfb { sym_alg, s2k, iv } => {
                writer.write_all(&[(*sym_alg).into()])?;
                s2k.to_writer(writer)?;
                writer.write_all(iv)?;
            }
            S2kParams::LegacyCfb { iv, .. } => {
                writer.write_all(iv)?;
            }
        }

        Ok(())
    }

    fn write_len(&self) -> usize {
        1 + match self {
            S2kParams::Unprotected => 0,
            S2kParams::Cfb { s2k, iv, .. } | S2kParams::MalleableCfb { s2k, iv, .. } => {
                1 + s2k.write_len() + iv.len()
            }
            S2kParams::LegacyCfb { iv, .. } => iv.len(),
        }
    }
}
