use byteorder::{BigEndian, ByteOrder};
use sha1::{Digest, Sha1};
use subtle::ConstantTimeEq;

use crate::errors::Result;

/// Two octet checksum: sum of all octets mod 65536.
#[inline]
pub fn calculate_simple(data: &[u8]) -> u16 {
    data.iter().fold(0u16, |acc, v| acc.wrapping_add(u16::from(*v)))
}

/// Checks a two octet checksum.
#[inline]
pub fn simple(actual: &[u8], data: &[u8]) -> Result<()> {
    ensure_eq!(actual.len(), 2, "invalid simple checksum length");
    let checksum = BigEndian::read_u16(actual);
    ensure_eq!(checksum, calculate_simple(data), "invalid simple checksum");

    Ok(())
}

/// SHA1 checksum, first 20 octets.
#[inline]
pub fn calculate_sha1(data: &[u8]) -> [u8; 20] {
    Sha1::digest(data).into()
}

#[inline]
pub fn sha1(hash: &[u8], data: &[u8]) -> Result<()> {
    ensure!(bool::from(hash.ct_eq(&calculate_sha1(data)[..])), "invalid SHA1 checksum");

    Ok(())
}
