use aes::{Aes128, Aes192, Aes256};
use camellia::{Camellia128, Camellia192, Camellia256};
use cast5::Cast5;
use cipher::{generic_array::GenericArray, BlockDecrypt, BlockEncrypt, KeyInit};
use des::TdesEde3;
use idea::Idea;
use log::debug;
use zeroize::Zeroizing;

use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::{Error, Result};

/// Keyed block cipher instance, one variant per supported algorithm.
enum RawCipher {
    Idea(Idea),
    TripleDes(TdesEde3),
    Cast5(Cast5),
    Aes128(Aes128),
    Aes192(Aes192),
    Aes256(Aes256),
    Camellia128(Camellia128),
    Camellia192(Camellia192),
    Camellia256(Camellia256),
}

macro_rules! with_cipher {
    ($raw:expr, $c:ident => $body:expr) => {
        match $raw {
            RawCipher::Idea($c) => $body,
            RawCipher::TripleDes($c) => $body,
            RawCipher::Cast5($c) => $body,
            RawCipher::Aes128($c) => $body,
            RawCipher::Aes192($c) => $body,
            RawCipher::Aes256($c) => $body,
            RawCipher::Camellia128($c) => $body,
            RawCipher::Camellia192($c) => $body,
            RawCipher::Camellia256($c) => $body,
        }
    };
}

impl RawCipher {
    fn new(alg: SymmetricKeyAlgorithm, key: &[u8]) -> Result<Self> {
        let map = |_| Error::InvalidKeyLength;
        Ok(match alg {
            SymmetricKeyAlgorithm::IDEA => Self::Idea(Idea::new_from_slice(key).map_err(map)?),
            SymmetricKeyAlgorithm::TripleDES => {
                Self::TripleDes(TdesEde3::new_from_slice(key).map_err(map)?)
            }
            SymmetricKeyAlgorithm::CAST5 => Self::Cast5(Cast5::new_from_slice(key).map_err(map)?),
            SymmetricKeyAlgorithm::AES128 => {
                Self::Aes128(Aes128::new_from_slice(key).map_err(map)?)
            }
            SymmetricKeyAlgorithm::AES192 => {
                Self::Aes192(Aes192::new_from_slice(key).map_err(map)?)
            }
            SymmetricKeyAlgorithm::AES256 => {
                Self::Aes256(Aes256::new_from_slice(key).map_err(map)?)
            }
            SymmetricKeyAlgorithm::Camellia128 => {
                Self::Camellia128(Camellia128::new_from_slice(key).map_err(map)?)
            }
            SymmetricKeyAlgorithm::Camellia192 => {
                Self::Camellia192(Camellia192::new_from_slice(key).map_err(map)?)
            }
            SymmetricKeyAlgorithm::Camellia256 => {
                Self::Camellia256(Camellia256::new_from_slice(key).map_err(map)?)
            }
            SymmetricKeyAlgorithm::Plaintext => {
                bail!("'Plaintext' is not a legal cipher for encrypted data")
            }
            SymmetricKeyAlgorithm::Other(_) => {
                unsupported_err!("SymmetricKeyAlgorithm {} is unsupported", u8::from(alg))
            }
        })
    }

    /// `block` must be exactly one block long.
    fn encrypt_block(&self, block: &mut [u8]) {
        with_cipher!(self, c => c.encrypt_block(GenericArray::from_mut_slice(block)))
    }

    /// `block` must be exactly one block long.
    fn decrypt_block(&self, block: &mut [u8]) {
        with_cipher!(self, c => c.decrypt_block(GenericArray::from_mut_slice(block)))
    }
}

/// State of a keyed symmetric cipher.
///
/// Besides single block operations and one-shot CFB over a whole buffer, this
/// carries the registers needed for the byte oriented OpenPGP CFB variant used
/// by legacy (v3) encrypted packets:
///
/// - `iv`: the initial vector the state was created with
/// - `civ`: the working feedback register
/// - `siv`: the previous ciphertext block, saved at each block boundary
/// - `num`: number of bytes of the current block already consumed
///
/// Ref: <https://www.rfc-editor.org/rfc/rfc4880.html#section-13.9>
#[derive(derive_more::Debug)]
pub struct CipherState {
    alg: SymmetricKeyAlgorithm,
    #[debug(skip)]
    cipher: RawCipher,
    #[debug("..")]
    key: Zeroizing<Vec<u8>>,
    iv: Vec<u8>,
    civ: Vec<u8>,
    siv: Vec<u8>,
    num: usize,
}

impl CipherState {
    /// Sets up the key schedule and the feedback registers.
    pub fn new(alg: SymmetricKeyAlgorithm, key: &[u8], iv: &[u8]) -> Result<Self> {
        let cipher = RawCipher::new(alg, key)?;
        let bs = alg.block_size();
        if iv.len() != bs {
            return Err(Error::CfbInvalidKeyIvLength);
        }

        Ok(Self {
            alg,
            cipher,
            key: Zeroizing::new(key.to_vec()),
            iv: iv.to_vec(),
            civ: iv.to_vec(),
            siv: vec![0u8; bs],
            num: bs,
        })
    }

    pub fn algorithm(&self) -> SymmetricKeyAlgorithm {
        self.alg
    }

    pub fn block_size(&self) -> usize {
        self.alg.block_size()
    }

    pub fn key_size(&self) -> usize {
        self.alg.key_size()
    }

    pub fn iv(&self) -> &[u8] {
        &self.iv
    }

    /// Encrypts a single block in place.
    pub fn block_encrypt(&self, block: &mut [u8]) -> Result<()> {
        ensure_eq!(block.len(), self.block_size(), "invalid block length");
        self.cipher.encrypt_block(block);
        Ok(())
    }

    /// Decrypts a single block in place.
    pub fn block_decrypt(&self, block: &mut [u8]) -> Result<()> {
        ensure_eq!(block.len(), self.block_size(), "invalid block length");
        self.cipher.decrypt_block(block);
        Ok(())
    }

    /// Regular CFB encryption of the whole buffer, starting from `iv`.
    pub fn cfb_encrypt(&self, buf: &mut [u8]) -> Result<()> {
        self.alg.encrypt_with_iv_regular(&self.key, &self.iv, buf)
    }

    /// Regular CFB decryption of the whole buffer, starting from `iv`.
    pub fn cfb_decrypt(&self, buf: &mut [u8]) -> Result<()> {
        self.alg.decrypt_with_iv_regular(&self.key, &self.iv, buf)
    }

    fn next_block(&mut self) {
        self.siv.copy_from_slice(&self.civ);
        self.cipher.encrypt_block(&mut self.civ);
        self.num = 0;
    }

    /// OpenPGP CFB encryption, continuing from the current register state.
    pub fn encrypt_se(&mut self, buf: &mut [u8]) {
        let bs = self.block_size();
        for b in buf.iter_mut() {
            if self.num == bs {
                self.next_block();
            }
            let c = self.civ[self.num] ^ *b;
            self.civ[self.num] = c;
            *b = c;
            self.num += 1;
        }
    }

    /// OpenPGP CFB decryption, continuing from the current register state.
    pub fn decrypt_se(&mut self, buf: &mut [u8]) {
        let bs = self.block_size();
        for b in buf.iter_mut() {
            if self.num == bs {
                self.next_block();
            }
            let c = *b;
            *b = self.civ[self.num] ^ c;
            self.civ[self.num] = c;
            self.num += 1;
        }
    }

    /// Resynchronises the feedback register on the last `bs` ciphertext bytes.
    ///
    /// After a partial block the register is made of the tail of the saved
    /// block followed by the bytes consumed so far.
    pub fn resync(&mut self) {
        let bs = self.block_size();
        if self.num == bs {
            return;
        }
        debug!("cfb resync at {}", self.num);

        let num = self.num;
        self.civ.copy_within(0..num, bs - num);
        self.civ[..bs - num].copy_from_slice(&self.siv[num..]);
        self.num = bs;
    }

    /// Resets the registers to the initial vector.
    pub fn reset(&mut self) {
        self.civ.copy_from_slice(&self.iv);
        self.siv.iter_mut().for_each(|b| *b = 0);
        self.num = self.block_size();
    }
}

#[cfg(test)]
mod tests {
    use cfb_mode::{cipher::KeyIvInit, BufEncryptor};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use rand::{RngCore, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    use super::*;

    const ALGS: [SymmetricKeyAlgorithm; 9] = [
        SymmetricKeyAlgorithm::IDEA,
        SymmetricKeyAlgorithm::TripleDES,
        SymmetricKeyAlgorithm::CAST5,
        SymmetricKeyAlgorithm::AES128,
        SymmetricKeyAlgorithm::AES192,
        SymmetricKeyAlgorithm::AES256,
        SymmetricKeyAlgorithm::Camellia128,
        SymmetricKeyAlgorithm::Camellia192,
        SymmetricKeyAlgorithm::Camellia256,
    ];

    fn state(alg: SymmetricKeyAlgorithm, rng: &mut ChaCha8Rng) -> CipherState {
        let mut key = vec![0u8; alg.key_size()];
        rng.fill_bytes(&mut key);
        let mut iv = vec![0u8; alg.block_size()];
        rng.fill_bytes(&mut iv);
        CipherState::new(alg, &key, &iv).unwrap()
    }

    fn lengths(bs: usize) -> Vec<usize> {
        vec![0, 1, bs - 1, bs, bs + 1, 3 * bs + 5]
    }

    #[test]
    fn test_block_roundtrip() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        for alg in ALGS {
            let st = state(alg, &mut rng);
            let mut block = vec![0u8; alg.block_size()];
            rng.fill_bytes(&mut block);
            let orig = block.clone();

            st.block_encrypt(&mut block).unwrap();
            assert_ne!(block, orig);
            st.block_decrypt(&mut block).unwrap();
            assert_eq!(block, orig);

            assert!(st.block_encrypt(&mut [0u8; 3]).is_err());
        }
    }

    #[test]
    fn test_cfb_roundtrip() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for alg in ALGS {
            let st = state(alg, &mut rng);
            for len in lengths(alg.block_size()) {
                let mut data = vec![0u8; len];
                rng.fill_bytes(&mut data);
                let orig = data.clone();

                st.cfb_encrypt(&mut data).unwrap();
                st.cfb_decrypt(&mut data).unwrap();
                assert_eq!(data, orig, "{:?} len {}", alg, len);
            }
        }
    }

    #[test]
    fn test_se_roundtrip_with_resync() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        for alg in ALGS {
            let bs = alg.block_size();
            for len in lengths(bs) {
                let mut enc = state(alg, &mut rng);
                let mut dec = CipherState::new(alg, &enc.key, enc.iv()).unwrap();

                let mut prefix = vec![0u8; bs + 2];
                rng.fill_bytes(&mut prefix);
                let mut data = vec![0u8; len];
                rng.fill_bytes(&mut data);
                let (orig_prefix, orig_data) = (prefix.clone(), data.clone());

                enc.encrypt_se(&mut prefix);
                enc.resync();
                enc.encrypt_se(&mut data);

                dec.decrypt_se(&mut prefix);
                dec.resync();
                dec.decrypt_se(&mut data);

                assert_eq!(prefix, orig_prefix);
                assert_eq!(data, orig_data, "{:?} len {}", alg, len);
            }
        }
    }

    #[test]
    fn test_se_without_resync_matches_cfb() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for alg in ALGS {
            let mut st = state(alg, &mut rng);
            let mut a = vec![0u8; 5 * alg.block_size() + 3];
            rng.fill_bytes(&mut a);
            let mut b = a.clone();

            // feeding in odd chunks must not matter
            let (x, y) = a.split_at_mut(7);
            st.encrypt_se(x);
            st.encrypt_se(y);
            st.cfb_encrypt(&mut b).unwrap();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_resync_matches_restarted_cfb() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let alg = SymmetricKeyAlgorithm::AES128;
        let mut st = state(alg, &mut rng);
        let bs = alg.block_size();

        let mut data = vec![0u8; bs + 2 + 40];
        rng.fill_bytes(&mut data);
        let mut expected = data.clone();

        {
            let (prefix, rest) = expected.split_at_mut(bs + 2);
            let mut mode = BufEncryptor::<Aes128>::new_from_slices(&st.key, &st.iv).unwrap();
            mode.encrypt(prefix);
            let mut mode = BufEncryptor::<Aes128>::new_from_slices(&st.key, &prefix[2..]).unwrap();
            mode.encrypt(rest);
        }

        let (prefix, rest) = data.split_at_mut(bs + 2);
        st.encrypt_se(prefix);
        st.resync();
        st.encrypt_se(rest);

        assert_eq!(data, expected);
    }

    #[test]
    fn test_reset() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut st = state(SymmetricKeyAlgorithm::CAST5, &mut rng);
        let mut a = *b"some bytes to encrypt";
        let mut b = a;
        st.encrypt_se(&mut a);
        st.reset();
        st.encrypt_se(&mut b);
        assert_eq!(a, b);
    }

    #[test]
    fn test_invalid_setup() {
        assert!(CipherState::new(SymmetricKeyAlgorithm::AES128, &[0u8; 15], &[0u8; 16]).is_err());
        assert!(CipherState::new(SymmetricKeyAlgorithm::AES128, &[0u8; 16], &[0u8; 8]).is_err());
        assert!(CipherState::new(SymmetricKeyAlgorithm::Plaintext, &[], &[]).is_err());
    }

    proptest! {
        #[test]
        fn prop_se_roundtrip(data: Vec<u8>, seed: u64, split in 0usize..64) {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let mut enc = state(SymmetricKeyAlgorithm::AES256, &mut rng);
            let mut dec = CipherState::new(SymmetricKeyAlgorithm::AES256, &enc.key, enc.iv()).unwrap();

            let split = split.min(data.len());
            let mut buf = data.clone();
            let (a, b) = buf.split_at_mut(split);
            enc.encrypt_se(a);
            enc.resync();
            enc.encrypt_se(b);

            let (a, b) = buf.split_at_mut(split);
            dec.decrypt_se(a);
            dec.resync();
            dec.decrypt_se(b);
            prop_assert_eq!(buf, data);
        }
    }
}
