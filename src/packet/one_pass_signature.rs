use std::io;

use byteorder::WriteBytesExt;
use bytes::Buf;

use crate::crypto::hash::HashAlgorithm;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::errors::Result;
use crate::packet::signature::SignatureType;
use crate::packet::PacketTrait;
use crate::parsing::BufParsing;
use crate::ser::Serialize;
use crate::types::{KeyId, PacketHeaderVersion, Tag};

/// One-Pass Signature Packet
/// <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.4>
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct OnePassSignature {
    packet_version: PacketHeaderVersion,
    pub typ: SignatureType,
    pub hash_algorithm: HashAlgorithm,
    pub pub_algorithm: PublicKeyAlgorithm,
    pub key_id: KeyId,
    /// Zero if another one pass signature follows, applying to the same data.
    pub last: u8,
}

impl OnePassSignature {
    pub fn new(
        typ: SignatureType,
        hash_algorithm: HashAlgorithm,
        pub_algorithm: PublicKeyAlgorithm,
        key_id: KeyId,
    ) -> Self {
        OnePassSignature {
            packet_version: PacketHeaderVersion::New,
            typ,
            hash_algorithm,
            pub_algorithm,
            key_id,
            last: 1,
        }
    }

    pub fn from_buf<B: Buf>(packet_version: PacketHeaderVersion, mut i: B) -> Result<Self> {
        let version = i.read_u8()?;
        ensure_eq!(version, 3, "unsupported one pass signature version");
        let typ = SignatureType::from(i.read_u8()?);
        let hash_algorithm = HashAlgorithm::from(i.read_u8()?);
        let pub_algorithm = PublicKeyAlgorithm::from(i.read_u8()?);
        let key_id = KeyId::from(i.read_array::<8>()?);
        let last = i.read_u8()?;

        Ok(OnePassSignature {
            packet_version,
            typ,
            hash_algorithm,
            pub_algorithm,
            key_id,
            last,
        })
    }

    pub fn is_nested(&self) -> bool {
        self.last == 0
    }
}

impl Serialize for OnePassSignature {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(3)?;
        writer.write_u8(self.typ.into())?;
        writer.write_u8(self.hash_algorithm.into())?;
        writer.write_u8(self.pub_algorithm.into())?;
        writer.write_all(self.key_id.as_ref())?;
        writer.write_u8(self.last)?;

        Ok(())
    }

    fn write_len(&self) -> usize {
        1 + 1 + 1 + 1 + 8 + 1
    }
}

impl PacketTrait for OnePassSignature {
    fn packet_version(&self) -> PacketHeaderVersion {
        self.packet_version
    }

    fn tag(&self) -> Tag {
        Tag::OnePassSignature
    }
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::*;

    #[test]
    fn test_one_pass_signature() {
        let raw = hex!("03 00 08 01 0102030405060708 01");
        let ops = OnePassSignature::from_buf(PacketHeaderVersion::New, &raw[..]).unwrap();
        assert_eq!(ops.typ, SignatureType::Binary);
        assert_eq!(ops.hash_algorithm, HashAlgorithm::Sha256);
        assert_eq!(ops.pub_algorithm, PublicKeyAlgorithm::RSA);
        assert!(!ops.is_nested());
        assert_eq!(ops.to_bytes().unwrap(), raw);

        assert!(OnePassSignature::from_buf(PacketHeaderVersion::New, &hex!("04 00")[..]).is_err());
    }
}
