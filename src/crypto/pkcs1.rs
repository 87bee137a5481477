//! PKCS#1 v1.5 style block formatting, as used by OpenPGP.
//!
//! Ref: <https://www.rfc-editor.org/rfc/rfc4880.html#section-13.1>

use rand::{CryptoRng, Rng};
use subtle::ConstantTimeEq;

use crate::crypto::hash::HashAlgorithm;
use crate::errors::{Error, Result};

/// Minimum number of bytes in front of the message: the block type prefix
/// plus at least eight bytes of padding.
const MIN_PAD: usize = 10;

/// EME-PKCS1-v1_5 encoding of `msg` into a block of `k` bytes:
/// `0x00 0x02 PS 0x00 M`, with `PS` non-zero random bytes.
pub fn eme_encode<R: CryptoRng + Rng>(rng: &mut R, msg: &[u8], k: usize) -> Result<Vec<u8>> {
    ensure!(
        msg.len() + MIN_PAD + 1 <= k,
        "message too long: {} bytes for a {} byte block",
        msg.len(),
        k
    );

    let ps_len = k - msg.len() - 3;
    let mut out = Vec::with_capacity(k);
    out.extend_from_slice(&[0x00, 0x02]);
    for _ in 0..ps_len {
        out.push(rng.gen_range(1..=255u8));
    }
    out.push(0x00);
    out.extend_from_slice(msg);

    Ok(out)
}

/// Strips EME-PKCS1-v1_5 padding starting with the given `leading` bytes.
///
/// Every failure maps to the same error, regardless of where the padding was
/// found to be broken.
pub fn eme_decode<'a>(buf: &'a [u8], leading: &[u8]) -> Result<&'a [u8]> {
    if buf.len() < leading.len() || !bool::from(buf[..leading.len()].ct_eq(leading)) {
        return Err(Error::DecryptionFailed);
    }

    let sep = buf[leading.len()..]
        .iter()
        .position(|b| *b == 0)
        .map(|p| p + leading.len())
        .ok_or(Error::DecryptionFailed)?;

    if sep < MIN_PAD {
        return Err(Error::DecryptionFailed);
    }

    Ok(&buf[sep + 1..])
}

/// EMSA-PKCS1-v1_5 encoding of a digest into a block of `k` bytes:
/// `0x00 0x01 0xff.. 0x00 prefix digest`.
pub fn emsa_encode(hash: HashAlgorithm, digest: &[u8], k: usize) -> Result<Vec<u8>> {
    let Some(prefix) = hash.pkcs1_prefix() else {
        unsupported_err!("no PKCS#1 prefix for {:?}", hash);
    };
    let t_len = prefix.len() + digest.len();
    ensure!(t_len + 11 <= k, "modulus too short for {:?}", hash);

    let mut out = vec![0xff; k];
    out[0] = 0x00;
    out[1] = 0x01;
    out[k - t_len - 1] = 0x00;
    out[k - t_len..k - digest.len()].copy_from_slice(prefix);
    out[k - digest.len()..].copy_from_slice(digest);

    Ok(out)
}

/// Checks an EMSA-PKCS1-v1_5 block against the expected digest.
pub fn emsa_verify(hash: HashAlgorithm, digest: &[u8], block: &[u8]) -> bool {
    let Some(prefix) = hash.pkcs1_prefix() else {
        return false;
    };
    if block.len() < 2 || block[..2] != [0x00, 0x01] {
        return false;
    }

    let pad_len = block[2..].iter().take_while(|b| **b == 0xff).count();
    let sep = 2 + pad_len;
    if pad_len < 8 || block.get(sep) != Some(&0x00) {
        return false;
    }

    let rest = &block[sep + 1..];
    if rest.len() != prefix.len() + digest.len() {
        return false;
    }
    let (p, d) = rest.split_at(prefix.len());

    p == prefix && d.ct_eq(digest).into()
}
