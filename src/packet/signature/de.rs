use byteorder::{BigEndian, WriteBytesExt};
use bytes::{Buf, Bytes};
use log::debug;

use crate::crypto::hash::HashAlgorithm;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::errors::Result;
use crate::packet::signature::{Signature, SignatureConfig, SignatureType, SignatureVersion, Subpacket};
use crate::parsing::BufParsing;
use crate::types::{KeyId, Mpi, PacketHeaderVersion};
use crate::util::dt_from_timestamp;

impl Signature {
    /// Parses a `Signature` packet body.
    pub fn from_buf<B: Buf>(packet_version: PacketHeaderVersion, mut i: B) -> Result<Self> {
        let version = SignatureVersion::from(i.read_u8()?);
        let signature = match version {
            SignatureVersion::V2 | SignatureVersion::V3 => v3_parser(packet_version, version, &mut i)?,
            SignatureVersion::V4 => v4_parser(packet_version, &mut i)?,
            SignatureVersion::Other(v) => unsupported_err!("signature version {}", v),
        };
        debug!("parsed {:?}", signature);

        Ok(signature)
    }
}

/// Reads the signature values up to the end of the packet.
fn signature_values<B: Buf>(alg: PublicKeyAlgorithm, i: &mut B) -> Result<Vec<Mpi>> {
    let count = match alg {
        PublicKeyAlgorithm::RSA | PublicKeyAlgorithm::RSASign | PublicKeyAlgorithm::RSAEncrypt => 1,
        PublicKeyAlgorithm::DSA | PublicKeyAlgorithm::Elgamal | PublicKeyAlgorithm::ElgamalSign => 2,
        PublicKeyAlgorithm::Unknown(_) => {
            let mut values = Vec::new();
            while i.has_remaining() {
                values.push(Mpi::from_buf(&mut *i)?);
            }
            return Ok(values);
        }
    };

    let values = (0..count)
        .map(|_| Mpi::from_buf(&mut *i))
        .collect::<Result<Vec<_>>>()?;
    ensure!(!i.has_remaining(), "trailing data after signature values");

    Ok(values)
}

/// Parses a v2 or v3 signature.
/// Ref: <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.2.2>
fn v3_parser<B: Buf>(
    packet_version: PacketHeaderVersion,
    version: SignatureVersion,
    i: &mut B,
) -> Result<Signature> {
    // One-octet length of following hashed material. MUST be 5.
    let hashed_len = i.read_u8()?;
    ensure_eq!(hashed_len, 5, "invalid v3 hashed length");
    let hashed_area = i.read_take(5)?;

    let mut area = hashed_area.clone();
    let typ = SignatureType::from(area.read_u8()?);
    let created = dt_from_timestamp(area.read_be_u32()?);

    let issuer = KeyId::from(i.read_array::<8>()?);
    let pub_alg = PublicKeyAlgorithm::from(i.read_u8()?);
    let hash_alg = HashAlgorithm::from(i.read_u8()?);
    let signed_hash_value = i.read_array::<2>()?;
    let signature = signature_values(pub_alg, i)?;

    Ok(Signature {
        packet_version,
        config: SignatureConfig {
            version,
            typ,
            pub_alg,
            hash_alg,
            hashed_subpackets: Vec::new(),
            unhashed_subpackets: Vec::new(),
            created: Some(created),
            issuer: Some(issuer),
            hashed_area,
        },
        signed_hash_value,
        signature,
    })
}

/// Parses a v4 signature.
/// Ref: <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.2.3>
fn v4_parser<B: Buf>(packet_version: PacketHeaderVersion, i: &mut B) -> Result<Signature> {
    let typ = i.read_u8()?;
    let pub_alg = i.read_u8()?;
    let hash_alg = i.read_u8()?;

    let hashed_len = i.read_be_u16()?;
    let hashed = i.read_take(hashed_len.into())?;
    let unhashed_len = i.read_be_u16()?;
    let unhashed = i.read_take(unhashed_len.into())?;

    // rebuild the exact hashed span, as found in the packet
    let mut hashed_area = Vec::with_capacity(6 + hashed.len());
    hashed_area.extend_from_slice(&[4, typ, pub_alg, hash_alg]);
    hashed_area.write_u16::<BigEndian>(hashed_len)?;
    hashed_area.extend_from_slice(&hashed);

    let pub_alg = PublicKeyAlgorithm::from(pub_alg);
    let signed_hash_value = i.read_array::<2>()?;
    let signature = signature_values(pub_alg, i)?;

    Ok(Signature {
        packet_version,
        config: SignatureConfig {
            version: SignatureVersion::V4,
            typ: SignatureType::from(typ),
            pub_alg,
            hash_alg: HashAlgorithm::from(hash_alg),
            hashed_subpackets: Subpacket::from_area(hashed)?,
            unhashed_subpackets: Subpacket::from_area(unhashed)?,
            created: None,
            issuer: None,
            hashed_area: Bytes::from(hashed_area),
        },
        signed_hash_value,
        signature,
    })
}
