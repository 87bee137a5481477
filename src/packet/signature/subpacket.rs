use std::io;

use byteorder::{BigEndian, WriteBytesExt};
use bytes::{Buf, Bytes};
use chrono::{DateTime, Utc};
use log::debug;

use crate::crypto::hash::HashAlgorithm;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::Result;
use crate::parsing::BufParsing;
use crate::ser::{time_to_u32, Serialize};
use crate::types::KeyId;
use crate::util::dt_from_timestamp;

#[derive(Debug, PartialEq, Eq, Copy, Clone, num_enum::FromPrimitive, num_enum::IntoPrimitive)]
#[repr(u8)]
/// Available signature subpacket types
pub enum SubpacketType {
    SignatureCreationTime = 2,
    SignatureExpirationTime = 3,
    ExportableCertification = 4,
    TrustSignature = 5,
    RegularExpression = 6,
    Revocable = 7,
    KeyExpirationTime = 9,
    PreferredSymmetricAlgorithms = 11,
    RevocationKey = 12,
    Issuer = 16,
    Notation = 20,
    PreferredHashAlgorithms = 21,
    PreferredCompressionAlgorithms = 22,
    KeyServerPreferences = 23,
    PreferredKeyServer = 24,
    PrimaryUserId = 25,
    PolicyURI = 26,
    KeyFlags = 27,
    SignersUserID = 28,
    RevocationReason = 29,
    Features = 30,
    SignatureTarget = 31,
    EmbeddedSignature = 32,

    #[num_enum(catch_all)]
    Other(u8),
}

impl SubpacketType {
    pub fn as_u8(self, is_critical: bool) -> u8 {
        let raw = u8::from(self);
        if is_critical {
            // set critical bit
            raw | 0b1000_0000
        } else {
            raw
        }
    }

    #[inline]
    pub fn from_u8(n: u8) -> (Self, bool) {
        let is_critical = (n >> 7) == 1;
        // remove critical bit
        (SubpacketType::from(n & 0b0111_1111), is_critical)
    }
}

/// Represents a subpacket length.
///
/// Ref <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.2.3.1>
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum SubpacketLength {
    /// 1 byte encoding, less than `192`.
    One(u8),
    /// 2 byte encoding, `192` to `8383`.
    Two(u16),
    /// 5 byte encoding
    Five(u32),
}

impl SubpacketLength {
    pub(crate) fn from_buf<B: Buf>(mut i: B) -> Result<Self> {
        let olen = i.read_u8()?;
        let len = match olen {
            0..=191 => Self::One(olen),
            192..=254 => {
                let a = i.read_u8()?;
                Self::Two(((u16::from(olen) - 192) << 8) + 192 + u16::from(a))
            }
            255 => Self::Five(i.read_be_u32()?),
        };
        Ok(len)
    }

    /// Encodes the given length into its minimal form.
    pub(crate) fn encode(len: u32) -> Self {
        match len {
            0..=191 => Self::One(len as u8),
            192..=8383 => Self::Two(len as u16),
            _ => Self::Five(len),
        }
    }

    pub(crate) fn len(&self) -> usize {
        match self {
            Self::One(l) => *l as usize,
            Self::Two(l) => *l as usize,
            Self::Five(l) => *l as usize,
        }
    }
}

impl Serialize for SubpacketLength {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            Self::One(l) => writer.write_u8(*l)?,
            Self::Two(l) => {
                writer.write_u8((((l - 192) >> 8) + 192) as u8)?;
                writer.write_u8(((l - 192) & 0xff) as u8)?;
            }
            Self::Five(l) => {
                writer.write_u8(0xff)?;
                writer.write_u32::<BigEndian>(*l)?;
            }
        }
        Ok(())
    }

    fn write_len(&self) -> usize {
        match self {
            Self::One(_) => 1,
            Self::Two(_) => 2,
            Self::Five(_) => 5,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Subpacket {
    pub is_critical: bool,
    pub data: SubpacketData,
}

impl Subpacket {
    /// Construct a new regular subpacket.
    pub fn regular(data: SubpacketData) -> Self {
        Subpacket {
            is_critical: false,
            data,
        }
    }

    /// Construct a new critical subpacket.
    pub fn critical(data: SubpacketData) -> Self {
        Subpacket {
            is_critical: true,
            data,
        }
    }

    pub fn typ(&self) -> SubpacketType {
        self.data.typ()
    }

    /// Parses a single subpacket: length, type and body.
    pub fn from_buf<B: Buf>(mut i: B) -> Result<Self> {
        let len = SubpacketLength::from_buf(&mut i)?.len();
        ensure!(len > 0, "empty subpacket");
        let (typ, is_critical) = SubpacketType::from_u8(i.read_u8()?);
        let body = i.read_take(len - 1)?;
        let data = SubpacketData::from_body(typ, body)?;

        Ok(Subpacket { is_critical, data })
    }

    /// Parses a whole subpacket area.
    pub fn from_area(mut area: Bytes) -> Result<Vec<Self>> {
        let mut packets = Vec::new();
        while area.has_remaining() {
            packets.push(Subpacket::from_buf(&mut area)?);
        }
        Ok(packets)
    }

    fn body_len(&self) -> usize {
        1 + self.data.write_len()
    }
}

impl Serialize for Subpacket {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        SubpacketLength::encode(self.body_len().try_into()?).to_writer(writer)?;
        writer.write_u8(self.typ().as_u8(self.is_critical))?;
        self.data.to_writer(writer)
    }

    fn write_len(&self) -> usize {
        let len = self.body_len();
        SubpacketLength::encode(len as u32).write_len() + len
    }
}

#[derive(derive_more::Debug, PartialEq, Eq, Clone)]
pub enum SubpacketData {
    /// The time the signature was made.
    SignatureCreationTime(DateTime<Utc>),
    /// Seconds after creation at which the signature expires. Zero means never.
    SignatureExpirationTime(u32),
    /// Seconds after key creation at which the key expires.
    KeyExpirationTime(u32),
    /// The OpenPGP Key ID of the key issuing the signature.
    Issuer(KeyId),
    /// Trust level and amount of a trust signature.
    TrustSignature(u8, u8),
    IsPrimary(bool),
    Revocable(bool),
    ExportableCertification(bool),
    KeyFlags(#[debug("{}", hex::encode(_0))] Bytes),
    PreferredSymmetricAlgorithms(Vec<SymmetricKeyAlgorithm>),
    PreferredHashAlgorithms(Vec<HashAlgorithm>),
    RegularExpression(Bytes),
    RevocationReason(u8, Bytes),
    SignersUserID(Bytes),
    Other(SubpacketType, #[debug("{}", hex::encode(_1))] Bytes),
}

impl SubpacketData {
    pub fn typ(&self) -> SubpacketType {
        match self {
            SubpacketData::SignatureCreationTime(_) => SubpacketType::SignatureCreationTime,
            SubpacketData::SignatureExpirationTime(_) => SubpacketType::SignatureExpirationTime,
            SubpacketData::KeyExpirationTime(_) => SubpacketType::KeyExpirationTime,
            SubpacketData::Issuer(_) => SubpacketType::Issuer,
            SubpacketData::TrustSignature(..) => SubpacketType::TrustSignature,
            SubpacketData::IsPrimary(_) => SubpacketType::PrimaryUserId,
            SubpacketData::Revocable(_) => SubpacketType::Revocable,
            SubpacketData::ExportableCertification(_) => SubpacketType::ExportableCertification,
            SubpacketData::KeyFlags(_) => SubpacketType::KeyFlags,
            SubpacketData::PreferredSymmetricAlgorithms(_) => {
                SubpacketType::PreferredSymmetricAlgorithms
            }
            SubpacketData::PreferredHashAlgorithms(_) => SubpacketType::PreferredHashAlgorithms,
            SubpacketData::RegularExpression(_) => SubpacketType::RegularExpression,
            SubpacketData::RevocationReason(..) => SubpacketType::RevocationReason,
            SubpacketData::SignersUserID(_) => SubpacketType::SignersUserID,
            SubpacketData::Other(typ, _) => *typ,
        }
    }

    fn from_body(typ: SubpacketType, mut body: Bytes) -> Result<Self> {
        let data = match typ {
            SubpacketType::SignatureCreationTime => {
                SubpacketData::SignatureCreationTime(dt_from_timestamp(body.read_be_u32()?))
            }
            SubpacketType::SignatureExpirationTime => {
                SubpacketData::SignatureExpirationTime(body.read_be_u32()?)
            }
            SubpacketType::KeyExpirationTime => {
                SubpacketData::KeyExpirationTime(body.read_be_u32()?)
            }
            SubpacketType::Issuer => SubpacketData::Issuer(KeyId::from(body.read_array::<8>()?)),
            SubpacketType::TrustSignature => {
                let level = body.read_u8()?;
                let amount = body.read_u8()?;
                SubpacketData::TrustSignature(level, amount)
            }
            SubpacketType::PrimaryUserId => SubpacketData::IsPrimary(body.read_u8()? != 0),
            SubpacketType::Revocable => SubpacketData::Revocable(body.read_u8()? != 0),
            SubpacketType::ExportableCertification => {
                SubpacketData::ExportableCertification(body.read_u8()? != 0)
            }
            SubpacketType::KeyFlags => SubpacketData::KeyFlags(body.rest()),
            SubpacketType::PreferredSymmetricAlgorithms => {
                SubpacketData::PreferredSymmetricAlgorithms(
                    body.rest().iter().map(|b| SymmetricKeyAlgorithm::from(*b)).collect(),
                )
            }
            SubpacketType::PreferredHashAlgorithms => SubpacketData::PreferredHashAlgorithms(
                body.rest().iter().map(|b| HashAlgorithm::from(*b)).collect(),
            ),
            SubpacketType::RegularExpression => SubpacketData::RegularExpression(body.rest()),
            SubpacketType::RevocationReason => {
                let code = body.read_u8()?;
                SubpacketData::RevocationReason(code, body.rest())
            }
            SubpacketType::SignersUserID => SubpacketData::SignersUserID(body.rest()),
            _ => {
                debug!("keeping raw subpacket {:?}", typ);
                return Ok(SubpacketData::Other(typ, body));
            }
        };
        ensure!(!body.has_remaining(), "trailing data in subpacket {:?}", typ);

        Ok(data)
    }
}

impl Serialize for SubpacketData {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            SubpacketData::SignatureCreationTime(t) => {
                writer.write_u32::<BigEndian>(time_to_u32(t))?
            }
            SubpacketData::SignatureExpirationTime(secs)
            | SubpacketData::KeyExpirationTime(secs) => writer.write_u32::<BigEndian>(*secs)?,
            SubpacketData::Issuer(id) => writer.write_all(id.as_ref())?,
            SubpacketData::TrustSignature(level, amount) => {
                writer.write_u8(*level)?;
                writer.write_u8(*amount)?;
            }
            SubpacketData::IsPrimary(v)
            | SubpacketData::Revocable(v)
            | SubpacketData::ExportableCertification(v) => writer.write_u8(u8::from(*v))?,
            SubpacketData::KeyFlags(raw)
            | SubpacketData::RegularExpression(raw)
            | SubpacketData::SignersUserID(raw)
            | SubpacketData::Other(_, raw) => writer.write_all(raw)?,
            SubpacketData::PreferredSymmetricAlgorithms(algs) => {
                for alg in algs {
                    writer.write_u8((*alg).into())?;
                }
            }
            SubpacketData::PreferredHashAlgorithms(algs) => {
                for alg in algs {
                    writer.write_u8((*alg).into())?;
                }
            }
            SubpacketData::RevocationReason(code, reason) => {
                writer.write_u8(*code)?;
                writer.write_all(reason)?;
            }
        }

        Ok(())
    }

    fn write_len(&self) -> usize {
        match self {
            SubpacketData::SignatureCreationTime(_)
            | SubpacketData::SignatureExpirationTime(_)
            | SubpacketData::KeyExpirationTime(_) => 4,
            SubpacketData::Issuer(_) => 8,
            SubpacketData::TrustSignature(..) => 2,
            SubpacketData::IsPrimary(_)
            | SubpacketData::Revocable(_)
            | SubpacketData::ExportableCertification(_) => 1,
            SubpacketData::KeyFlags(raw)
            | SubpacketData::RegularExpression(raw)
            | SubpacketData::SignersUserID(raw)
            | SubpacketData::Other(_, raw) => raw.len(),
            SubpacketData::PreferredSymmetricAlgorithms(algs) => algs.len(),
            SubpacketData::PreferredHashAlgorithms(algs) => algs.len(),
            SubpacketData::RevocationReason(_, reason) => 1 + reason.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_subpacket_encoding() {
        let created = Utc.timestamp_opt(0x5a00_0000, 0).unwrap();
        let packet = Subpacket::regular(SubpacketData::SignatureCreationTime(created));
        assert_eq!(packet.to_bytes().unwrap(), [5, 2, 0x5a, 0, 0, 0]);

        let packet = Subpacket::critical(SubpacketData::IsPrimary(true));
        assert_eq!(packet.to_bytes().unwrap(), [2, 25 | 0x80, 1]);

        let back = Subpacket::from_buf(&[2u8, 25 | 0x80, 1][..]).unwrap();
        assert_eq!(back, packet);
    }

    #[test]
    fn test_subpacket_area() {
        let mut raw = Vec::new();
        let packets = vec![
            Subpacket::regular(SubpacketData::Issuer(KeyId::from([1, 2, 3, 4, 5, 6, 7, 8]))),
            Subpacket::regular(SubpacketData::TrustSignature(1, 120)),
            Subpacket::regular(SubpacketData::Other(SubpacketType::Other(101), Bytes::from_static(b"x"))),
        ];
        packets.to_writer(&mut raw).unwrap();
        assert_eq!(raw.len(), packets.write_len());

        assert_eq!(Subpacket::from_area(raw.into()).unwrap(), packets);
        assert!(Subpacket::from_area(Bytes::from_static(&[5, 2, 0])).is_err());
        assert!(Subpacket::from_area(Bytes::from_static(&[3, 2, 0, 0, 0])).is_err());
    }

    proptest! {
        #[test]
        fn subpacket_length_roundtrip(len in 0u32..100_000) {
            let encoded = SubpacketLength::encode(len);
            let mut buf = Vec::new();
            encoded.to_writer(&mut buf).unwrap();
            prop_assert_eq!(buf.len(), encoded.write_len());
            let back = SubpacketLength::from_buf(&buf[..]).unwrap();
            prop_assert_eq!(back.len(), len as usize);
        }
    }
}
