use aes::{Aes128, Aes192, Aes256};
use camellia::{Camellia128, Camellia192, Camellia256};
use cast5::Cast5;
use cfb_mode::{
    cipher::{AsyncStreamCipher, KeyIvInit},
    Decryptor, Encryptor,
};
use cipher::{BlockCipher, BlockEncryptMut};
use des::TdesEde3;
use idea::Idea;
use log::debug;
use num_enum::{FromPrimitive, IntoPrimitive};
use rand::{CryptoRng, Rng};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::errors::{Error, Result};

mod cipher_state;

pub use self::cipher_state::CipherState;

/// MDC packet: 1 byte tag, 1 byte length and a SHA1 digest.
const MDC_LEN: usize = 22;

fn encrypt_regular<C>(key: &[u8], iv: &[u8], data: &mut [u8]) -> Result<()>
where
    C: BlockEncryptMut + BlockCipher,
    Encryptor<C>: KeyIvInit,
{
    Encryptor::<C>::new_from_slices(key, iv)?.encrypt(data);
    Ok(())
}

fn decrypt_regular<C>(key: &[u8], iv: &[u8], data: &mut [u8]) -> Result<()>
where
    C: BlockEncryptMut + BlockCipher,
    Decryptor<C>: KeyIvInit,
{
    Decryptor::<C>::new_from_slices(key, iv)?.decrypt(data);
    Ok(())
}

/// Available symmetric key algorithms.
/// Ref: <https://www.rfc-editor.org/rfc/rfc4880.html#section-9.2>
#[derive(Debug, PartialEq, Eq, Copy, Clone, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum SymmetricKeyAlgorithm {
    /// Plaintext or unencrypted data
    Plaintext = 0,
    /// IDEA
    IDEA = 1,
    /// Triple-DES
    TripleDES = 2,
    /// CAST5
    CAST5 = 3,
    /// AES with 128-bit key
    AES128 = 7,
    /// AES with 192-bit key
    AES192 = 8,
    /// AES with 256-bit key
    AES256 = 9,
    /// [Camellia](https://tools.ietf.org/html/rfc5581#section-3) with 128-bit key
    Camellia128 = 11,
    /// [Camellia](https://tools.ietf.org/html/rfc5581#section-3) with 192-bit key
    Camellia192 = 12,
    /// [Camellia](https://tools.ietf.org/html/rfc5581#section-3) with 256-bit key
    Camellia256 = 13,

    #[num_enum(catch_all)]
    Other(u8),
}

#[allow(clippy::derivable_impls)]
impl Default for SymmetricKeyAlgorithm {
    fn default() -> Self {
        Self::AES128
    }
}

impl zeroize::DefaultIsZeroes for SymmetricKeyAlgorithm {}

impl SymmetricKeyAlgorithm {
    /// The size of a single block in bytes.
    pub fn block_size(self) -> usize {
        match self {
            SymmetricKeyAlgorithm::Plaintext => 0,
            SymmetricKeyAlgorithm::IDEA => 8,
            SymmetricKeyAlgorithm::TripleDES => 8,
            SymmetricKeyAlgorithm::CAST5 => 8,
            SymmetricKeyAlgorithm::AES128 => 16,
            SymmetricKeyAlgorithm::AES192 => 16,
            SymmetricKeyAlgorithm::AES256 => 16,
            SymmetricKeyAlgorithm::Camellia128 => 16,
            SymmetricKeyAlgorithm::Camellia192 => 16,
            SymmetricKeyAlgorithm::Camellia256 => 16,
            SymmetricKeyAlgorithm::Other(_) => 0,
        }
    }

    /// The size of the key in bytes.
    pub const fn key_size(self) -> usize {
        match self {
            SymmetricKeyAlgorithm::Plaintext => 0,
            SymmetricKeyAlgorithm::IDEA => 16,
            SymmetricKeyAlgorithm::TripleDES => 24,
            SymmetricKeyAlgorithm::CAST5 => 16,
            SymmetricKeyAlgorithm::AES128 => 16,
            SymmetricKeyAlgorithm::AES192 => 24,
            SymmetricKeyAlgorithm::AES256 => 32,
            SymmetricKeyAlgorithm::Camellia128 => 16,
            SymmetricKeyAlgorithm::Camellia192 => 24,
            SymmetricKeyAlgorithm::Camellia256 => 32,
            SymmetricKeyAlgorithm::Other(_) => 0,
        }
    }

    /// Creates a keyed [`CipherState`] starting at `iv`.
    pub fn new_state(self, key: &[u8], iv: &[u8]) -> Result<CipherState> {
        CipherState::new(self, key, iv)
    }

    /// Encrypt the data using CFB mode, without padding. Overwrites the input.
    pub fn encrypt_with_iv_regular(self, key: &[u8], iv_vec: &[u8], data: &mut [u8]) -> Result<()> {
        match self {
            SymmetricKeyAlgorithm::Plaintext => {
                bail!("'Plaintext' is not a legal cipher for encrypted data")
            }
            SymmetricKeyAlgorithm::IDEA => encrypt_regular::<Idea>(key, iv_vec, data),
            SymmetricKeyAlgorithm::TripleDES => encrypt_regular::<TdesEde3>(key, iv_vec, data),
            SymmetricKeyAlgorithm::CAST5 => encrypt_regular::<Cast5>(key, iv_vec, data),
            SymmetricKeyAlgorithm::AES128 => encrypt_regular::<Aes128>(key, iv_vec, data),
            SymmetricKeyAlgorithm::AES192 => encrypt_regular::<Aes192>(key, iv_vec, data),
            SymmetricKeyAlgorithm::AES256 => encrypt_regular::<Aes256>(key, iv_vec, data),
            SymmetricKeyAlgorithm::Camellia128 => encrypt_regular::<Camellia128>(key, iv_vec, data),
            SymmetricKeyAlgorithm::Camellia192 => encrypt_regular::<Camellia192>(key, iv_vec, data),
            SymmetricKeyAlgorithm::Camellia256 => encrypt_regular::<Camellia256>(key, iv_vec, data),
            SymmetricKeyAlgorithm::Other(_) => {
                unimplemented_err!("SymmetricKeyAlgorithm {} is unsupported", u8::from(self))
            }
        }
    }

    /// Decrypt the data using CFB mode, without padding. Overwrites the input.
    pub fn decrypt_with_iv_regular(self, key: &[u8], iv_vec: &[u8], data: &mut [u8]) -> Result<()> {
        match self {
            SymmetricKeyAlgorithm::Plaintext => {
                bail!("'Plaintext' is not a legal cipher for encrypted data")
            }
            SymmetricKeyAlgorithm::IDEA => decrypt_regular::<Idea>(key, iv_vec, data),
            SymmetricKeyAlgorithm::TripleDES => decrypt_regular::<TdesEde3>(key, iv_vec, data),
            SymmetricKeyAlgorithm::CAST5 => decrypt_regular::<Cast5>(key, iv_vec, data),
            SymmetricKeyAlgorithm::AES128 => decrypt_regular::<Aes128>(key, iv_vec, data),
            SymmetricKeyAlgorithm::AES192 => decrypt_regular::<Aes192>(key, iv_vec, data),
            SymmetricKeyAlgorithm::AES256 => decrypt_regular::<Aes256>(key, iv_vec, data),
            SymmetricKeyAlgorithm::Camellia128 => decrypt_regular::<Camellia128>(key, iv_vec, data),
            SymmetricKeyAlgorithm::Camellia192 => decrypt_regular::<Camellia192>(key, iv_vec, data),
            SymmetricKeyAlgorithm::Camellia256 => decrypt_regular::<Camellia256>(key, iv_vec, data),
            SymmetricKeyAlgorithm::Other(_) => {
                unimplemented_err!("SymmetricKeyAlgorithm {} is unsupported", u8::from(self))
            }
        }
    }

    /// Random prefix of `bs` bytes, followed by a repetition of its last two.
    fn prefix<R: CryptoRng + Rng>(self, rng: &mut R) -> Result<Vec<u8>> {
        let bs = self.block_size();
        ensure!(bs > 0, "invalid cipher {:?}", self);
        let mut prefix = vec![0u8; bs + 2];
        rng.fill_bytes(&mut prefix[..bs]);
        prefix[bs] = prefix[bs - 2];
        prefix[bs + 1] = prefix[bs - 1];
        Ok(prefix)
    }

    fn check_prefix(self, prefix: &[u8]) -> Result<()> {
        let bs = self.block_size();
        if prefix[bs - 2..bs] != prefix[bs..bs + 2] {
            return Err(Error::QuickCheck);
        }
        Ok(())
    }

    /// Legacy Symmetrically Encrypted Data: OpenPGP CFB with a zero IV and a
    /// resynchronisation after the `bs + 2` byte prefix.
    ///
    /// Ref: <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.7>
    pub fn encrypt_legacy<R: CryptoRng + Rng>(
        self,
        mut rng: R,
        key: &[u8],
        plaintext: &[u8],
    ) -> Result<Vec<u8>> {
        debug!("encrypt unprotected");
        let iv_vec = vec![0u8; self.block_size()];
        let mut state = CipherState::new(self, key, &iv_vec)?;

        let mut ciphertext = self.prefix(&mut rng)?;
        state.encrypt_se(&mut ciphertext);
        state.resync();

        let start = ciphertext.len();
        ciphertext.extend_from_slice(plaintext);
        state.encrypt_se(&mut ciphertext[start..]);

        Ok(ciphertext)
    }

    /// Reverses [`Self::encrypt_legacy`]. There is no integrity check beyond the
    /// two quick check bytes.
    pub fn decrypt_legacy(self, key: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
        debug!("decrypt unprotected");
        let bs = self.block_size();
        ensure!(bs > 0, "invalid cipher {:?}", self);
        ensure!(ciphertext.len() >= bs + 2, "ciphertext too short");

        let iv_vec = vec![0u8; bs];
        let mut state = CipherState::new(self, key, &iv_vec)?;

        let mut prefix = ciphertext[..bs + 2].to_vec();
        state.decrypt_se(&mut prefix);
        self.check_prefix(&prefix)?;
        state.resync();

        let mut plaintext = ciphertext[bs + 2..].to_vec();
        state.decrypt_se(&mut plaintext);

        Ok(plaintext)
    }

    /// Symmetrically Encrypted Integrity Protected Data (version 1), with the
    /// modification detection code appended to the plaintext.
    ///
    /// Ref: <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.13>
    pub fn encrypt_protected<R: CryptoRng + Rng>(
        self,
        mut rng: R,
        key: &[u8],
        plaintext: &[u8],
    ) -> Result<Vec<u8>> {
        use sha1::{Digest, Sha1};

        debug!("protected encrypt");

        let mut ciphertext = self.prefix(&mut rng)?;
        ciphertext.reserve(plaintext.len() + MDC_LEN);
        ciphertext.extend_from_slice(plaintext);
        // mdc header
        ciphertext.extend_from_slice(&[0xD3, 0x14]);
        // mdc body
        let checksum = Sha1::digest(&ciphertext);
        ciphertext.extend_from_slice(&checksum);

        // IV is all zeroes
        let iv_vec = vec![0u8; self.block_size()];
        self.encrypt_with_iv_regular(key, &iv_vec, &mut ciphertext)?;

        Ok(ciphertext)
    }

    /// Reverses [`Self::encrypt_protected`], checking the quick check bytes and
    /// the modification detection code.
    pub fn decrypt_protected(self, key: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
        use sha1::{Digest, Sha1};

        debug!("protected decrypt");
        let bs = self.block_size();
        ensure!(bs > 0, "invalid cipher {:?}", self);
        ensure!(
            ciphertext.len() >= bs + 2 + MDC_LEN,
            "ciphertext too short"
        );

        let mut buf = ciphertext.to_vec();
        let iv_vec = vec![0u8; bs];
        self.decrypt_with_iv_regular(key, &iv_vec, &mut buf)?;
        self.check_prefix(&buf)?;

        let mdc_start = buf.len() - MDC_LEN;
        let (body, mdc) = buf.split_at(mdc_start);
        if mdc[..2] != [0xD3, 0x14] {
            return Err(Error::MdcError);
        }
        let mut hasher = Sha1::new();
        hasher.update(body);
        hasher.update(&mdc[..2]);
        if !bool::from(hasher.finalize().as_slice().ct_eq(&mdc[2..])) {
            return Err(Error::MdcError);
        }

        Ok(body[bs + 2..].to_vec())
    }

    /// Generate a new session key.
    pub fn new_session_key<R: Rng + CryptoRng>(self, mut rng: R) -> Zeroizing<Vec<u8>> {
        let mut session_key = Zeroizing::new(vec![0u8; self.key_size()]);
        rng.fill_bytes(&mut session_key);
        session_key
    }
}
