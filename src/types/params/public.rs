use std::io;

use bytes::{Buf, Bytes};

use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::errors::Result;
use crate::parsing::BufParsing;
use crate::ser::Serialize;
use crate::types::Mpi;

/// Raw RSA public key material.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct RsaPublicParams {
    /// Modulus
    pub n: Mpi,
    /// Public exponent
    pub e: Mpi,
}

/// Raw DSA public key material.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct DsaPublicParams {
    pub p: Mpi,
    pub q: Mpi,
    pub g: Mpi,
    pub y: Mpi,
}

// NIST FIPS 186-4 limits p to 3072 bits, but 4096 bit keys exist in practice.
const DSA_MAX_L_BITS: usize = 4096;
const DSA_MAX_N_BITS: usize = 256;

impl DsaPublicParams {
    fn from_buf<B: Buf>(mut i: B) -> Result<Self> {
        let p = Mpi::from_buf(&mut i)?;
        let q = Mpi::from_buf(&mut i)?;
        let g = Mpi::from_buf(&mut i)?;
        let y = Mpi::from_buf(&mut i)?;

        ensure!(p.bits() <= DSA_MAX_L_BITS, "p is too long ({} bytes)", p.len());
        ensure!(q.bits() <= DSA_MAX_N_BITS, "q is too long ({} bytes)", q.len());
        // g and y are both "mod p"
        ensure!(g.len() <= p.len(), "g is longer than p ({} bytes)", g.len());
        ensure!(y.len() <= p.len(), "y is longer than p ({} bytes)", y.len());

        Ok(DsaPublicParams { p, q, g, y })
    }
}

/// Raw Elgamal public key material.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ElgamalPublicParams {
    pub p: Mpi,
    pub g: Mpi,
    pub y: Mpi,
}

/// Algorithm specific public key material.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum PublicParams {
    RSA(RsaPublicParams),
    DSA(DsaPublicParams),
    Elgamal(ElgamalPublicParams),
    /// Material of an algorithm we can not use, kept verbatim.
    Unknown { data: Bytes },
}

impl PublicParams {
    /// Reads the key material of `alg`, consuming the rest of `i` for
    /// unknown algorithms.
    pub fn from_buf<B: Buf>(alg: PublicKeyAlgorithm, mut i: B) -> Result<Self> {
        let params = match alg {
            PublicKeyAlgorithm::RSA | PublicKeyAlgorithm::RSAEncrypt | PublicKeyAlgorithm::RSASign => {
                let n = Mpi::from_buf(&mut i)?;
                let e = Mpi::from_buf(&mut i)?;
                PublicParams::RSA(RsaPublicParams { n, e })
            }
            PublicKeyAlgorithm::DSA => PublicParams::DSA(DsaPublicParams::from_buf(&mut i)?),
            PublicKeyAlgorithm::Elgamal | PublicKeyAlgorithm::ElgamalSign => {
                let p = Mpi::from_buf(&mut i)?;
                let g = Mpi::from_buf(&mut i)?;
                let y = Mpi::from_buf(&mut i)?;
                PublicParams::Elgamal(ElgamalPublicParams { p, g, y })
            }
            PublicKeyAlgorithm::Unknown(_) => PublicParams::Unknown { data: i.rest() },
        };

        Ok(params)
    }

    /// Does the material fit the given algorithm.
    pub fn matches(&self, alg: PublicKeyAlgorithm) -> bool {
        match self {
            PublicParams::RSA(_) => alg.is_rsa(),
            PublicParams::DSA(_) => alg == PublicKeyAlgorithm::DSA,
            PublicParams::Elgamal(_) => alg.is_elgamal(),
            PublicParams::Unknown { .. } => matches!(alg, PublicKeyAlgorithm::Unknown(_)),
        }
    }

    /// Size of the key in bits, as given by its modulus or prime.
    pub fn bits(&self) -> usize {
        match self {
            PublicParams::RSA(p) => p.n.bits(),
            PublicParams::DSA(p) => p.p.bits(),
            PublicParams::Elgamal(p) => p.p.bits(),
            PublicParams::Unknown { .. } => 0,
        }
    }
}

impl Serialize for PublicParams {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            PublicParams::RSA(params) => {
                params.n.to_writer(writer)?;
                params.e.to_writer(writer)?;
            }
            PublicParams::DSA(params) => {
                params.p.to_writer(writer)?;
                params.q.to_writer(writer)?;
                params.g.to_writer(writer)?;
                params.y.to_writer(writer)?;
            }
            PublicParams::Elgamal(params) => {
                params.p.to_writer(writer)?;
                params.g.to_writer(writer)?;
                params.y.to_writer(writer)?;
            }
            PublicParams::Unknown { data } => {
                writer.write_all(data)?;
            }
        }

        Ok(())
    }

    fn write_len(&self) -> usize {
        match self {
            PublicParams::RSA(params) => params.n.write_len() + params.e.write_len(),
            PublicParams::DSA(params) => {
                params.p.write_len()
                    + params.q.write_len()
                    + params.g.write_len()
                    + params.y.write_len()
            }
            PublicParams::Elgamal(params) => {
                params.p.write_len() + params.g.write_len() + params.y.write_len()
            }
            PublicParams::Unknown { data } => data.len(),
        }
    }
}
