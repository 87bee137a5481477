use std::io;

use crate::errors::{Error, Result};
use crate::packet::{
    LiteralData, OnePassSignature, PacketHeader, PublicKey, PublicKeyEncryptedSessionKey,
    PublicSubkey, SecretKey, SecretSubkey, Signature, Trust, UserAttribute, UserId,
};
use crate::ser::Serialize;
use crate::types::{PacketHeaderVersion, Tag};

/// Represents a Packet. A packet is the record structure used to encode a chunk of data in OpenPGP.
/// Ref: <https://www.rfc-editor.org/rfc/rfc4880.html#section-4>
#[derive(Debug, PartialEq, Eq, Clone)]
#[allow(clippy::large_enum_variant)]
pub enum Packet {
    PublicKey(PublicKey),
    PublicSubkey(PublicSubkey),
    SecretKey(SecretKey),
    SecretSubkey(SecretSubkey),
    LiteralData(LiteralData),
    OnePassSignature(OnePassSignature),
    PublicKeyEncryptedSessionKey(PublicKeyEncryptedSessionKey),
    Signature(Signature),
    Trust(Trust),
    UserAttribute(UserAttribute),
    UserId(UserId),
}

macro_rules! impl_try_from_into {
    ($enum:ident, $( $name:ident => $variant_type:ty ),*) => {
        $(
            impl TryFrom<$enum> for $variant_type {
                type Error = Error;

                fn try_from(other: $enum) -> Result<$variant_type> {
                    if let $enum::$name(value) = other {
                        Ok(value)
                    } else {
                        Err(format_err!("invalid packet type: {:?}", other.tag()))
                    }
                }
            }

            impl From<$variant_type> for $enum {
                fn from(other: $variant_type) -> $enum {
                    $enum::$name(other)
                }
            }
        )*
    }
}

impl_try_from_into!(
    Packet,
    PublicKey => PublicKey,
    PublicSubkey => PublicSubkey,
    SecretKey => SecretKey,
    SecretSubkey => SecretSubkey,
    LiteralData => LiteralData,
    OnePassSignature => OnePassSignature,
    PublicKeyEncryptedSessionKey => PublicKeyEncryptedSessionKey,
    Signature => Signature,
    Trust => Trust,
    UserAttribute => UserAttribute,
    UserId => UserId
);

impl Serialize for Packet {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            Self::PublicKey(p) => p.to_writer_with_header(writer),
            Self::PublicSubkey(p) => p.to_writer_with_header(writer),
            Self::SecretKey(p) => p.to_writer_with_header(writer),
            Self::SecretSubkey(p) => p.to_writer_with_header(writer),
            Self::LiteralData(p) => p.to_writer_with_header(writer),
            Self::OnePassSignature(p) => p.to_writer_with_header(writer),
            Self::PublicKeyEncryptedSessionKey(p) => p.to_writer_with_header(writer),
            Self::Signature(p) => p.to_writer_with_header(writer),
            Self::Trust(p) => p.to_writer_with_header(writer),
            Self::UserAttribute(p) => p.to_writer_with_header(writer),
            Self::UserId(p) => p.to_writer_with_header(writer),
        }
    }

    fn write_len(&self) -> usize {
        match self {
            Self::PublicKey(p) => p.write_len_with_header(),
            Self::PublicSubkey(p) => p.write_len_with_header(),
            Self::SecretKey(p) => p.write_len_with_header(),
            Self::SecretSubkey(p) => p.write_len_with_header(),
            Self::LiteralData(p) => p.write_len_with_header(),
            Self::OnePassSignature(p) => p.write_len_with_header(),
            Self::PublicKeyEncryptedSessionKey(p) => p.write_len_with_header(),
            Self::Signature(p) => p.write_len_with_header(),
            Self::Trust(p) => p.write_len_with_header(),
            Self::UserAttribute(p) => p.write_len_with_header(),
            Self::UserId(p) => p.write_len_with_header(),
        }
    }
}

pub trait PacketTrait: Serialize {
    fn packet_version(&self) -> PacketHeaderVersion;

    /// Returns the tag for this packet type.
    fn tag(&self) -> Tag;

    fn packet_header(&self) -> Result<PacketHeader> {
        Ok(PacketHeader::new_fixed(
            self.packet_version(),
            self.tag(),
            self.write_len().try_into()?,
        ))
    }

    /// Write this packet including the packet header.
    fn to_writer_with_header<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        self.packet_header()?.to_writer(writer)?;
        self.to_writer(writer)
    }

    /// Length in bytes used when calling `to_writer_with_header`.
    fn write_len_with_header(&self) -> usize {
        let len = self.write_len();
        self.packet_version().header_len(len) + len
    }
}

impl PacketTrait for Packet {
    fn packet_version(&self) -> PacketHeaderVersion {
        match self {
            Self::PublicKey(p) => p.packet_version(),
            Self::PublicSubkey(p) => p.packet_version(),
            Self::SecretKey(p) => p.packet_version(),
            Self::SecretSubkey(p) => p.packet_version(),
            Self::LiteralData(p) => p.packet_version(),
            Self::OnePassSignature(p) => p.packet_version(),
            Self::PublicKeyEncryptedSessionKey(p) => p.packet_version(),
            Self::Signature(p) => p.packet_version(),
            Self::Trust(p) => p.packet_version(),
            Self::UserAttribute(p) => p.packet_version(),
            Self::UserId(p) => p.packet_version(),
        }
    }

    fn tag(&self) -> Tag {
        match self {
            Self::PublicKey(p) => p.tag(),
            Self::PublicSubkey(p) => p.tag(),
            Self::SecretKey(p) => p.tag(),
            Self::SecretSubkey(p) => p.tag(),
            Self::LiteralData(p) => p.tag(),
            Self::OnePassSignature(p) => p.tag(),
            Self::PublicKeyEncryptedSessionKey(p) => p.tag(),
            Self::Signature(p) => p.tag(),
            Self::Trust(p) => p.tag(),
            Self::UserAttribute(p) => p.tag(),
            Self::UserId(p) => p.tag(),
        }
    }
}

impl Packet {
    /// Decodes a packet body with the given header.
    pub fn from_body(header: &PacketHeader, body: bytes::Bytes) -> Result<Self> {
        let version = header.version();
        let packet = match header.tag() {
            Tag::PublicKey => PublicKey::from_buf(version, body)?.into(),
            Tag::PublicSubkey => PublicSubkey::from_buf(version, body)?.into(),
            Tag::SecretKey => SecretKey::from_buf(version, body)?.into(),
            Tag::SecretSubkey => SecretSubkey::from_buf(version, body)?.into(),
            Tag::LiteralData => LiteralData::from_buf(version, body)?.into(),
            Tag::OnePassSignature => OnePassSignature::from_buf(version, body)?.into(),
            Tag::PublicKeyEncryptedSessionKey => {
                PublicKeyEncryptedSessionKey::from_buf(version, body)?.into()
            }
            Tag::Signature => Signature::from_buf(version, body)?.into(),
            Tag::Trust => Trust::from_buf(version, body)?.into(),
            Tag::UserAttribute => UserAttribute::from_buf(version, body)?.into(),
            Tag::UserId => UserId::from_buf(version, body)?.into(),
            tag => unsupported_err!("packet {:?}", tag),
        };

        Ok(packet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_from() {
        let packet = Packet::from(UserId::from_str(PacketHeaderVersion::New, "me"));
        assert_eq!(packet.tag(), Tag::UserId);
        assert!(Signature::try_from(packet.clone()).is_err());
        assert_eq!(UserId::try_from(packet).unwrap().id(), b"me");
    }

    #[test]
    fn test_header_len() {
        let packet = Packet::from(Trust::from_slice(PacketHeaderVersion::Old, &[0u8; 300]));
        assert_eq!(packet.write_len(), 3 + 300);
        let raw = packet.to_bytes().unwrap();
        assert_eq!(&raw[..3], &[0x81 | (12 << 2), 0x01, 0x2c]);
    }
}
