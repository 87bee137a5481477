use std::io;

use byteorder::{BigEndian, WriteBytesExt};
use bytes::{Buf, Bytes};
use chrono::{DateTime, SubsecRound, Utc};

use crate::errors::Result;
use crate::packet::PacketTrait;
use crate::parsing::BufParsing;
use crate::ser::{time_to_u32, Serialize};
use crate::types::{PacketHeaderVersion, Tag};
use crate::util::{dt_from_timestamp, normalize_crlf};

/// Literal Data Packet
/// <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.9>
#[derive(derive_more::Debug, Clone, PartialEq, Eq)]
pub struct LiteralData {
    packet_version: PacketHeaderVersion,
    mode: DataMode,
    #[debug("{}", hex::encode(file_name))]
    file_name: Bytes,
    created: DateTime<Utc>,
    #[debug("{}", hex::encode(data))]
    data: Bytes,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, num_enum::FromPrimitive, num_enum::IntoPrimitive)]
#[repr(u8)]
pub enum DataMode {
    Binary = 0x62,
    Text = 0x74,
    Utf8 = 0x75,

    #[num_enum(catch_all)]
    Other(u8),
}

impl LiteralData {
    /// Creates a binary literal data packet.
    pub fn from_bytes(file_name: &[u8], data: Bytes) -> Self {
        LiteralData {
            packet_version: PacketHeaderVersion::New,
            mode: DataMode::Binary,
            file_name: Bytes::copy_from_slice(file_name),
            created: Utc::now().trunc_subsecs(0),
            data,
        }
    }

    /// Creates a text literal data packet.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(file_name: &[u8], text: &str) -> Self {
        LiteralData {
            mode: DataMode::Utf8,
            ..Self::from_bytes(file_name, Bytes::copy_from_slice(text.as_bytes()))
        }
    }

    pub fn from_buf<B: Buf>(packet_version: PacketHeaderVersion, mut i: B) -> Result<Self> {
        let mode = DataMode::from(i.read_u8()?);
        let name_len = i.read_u8()?;
        let file_name = i.read_take(name_len.into())?;
        let created = dt_from_timestamp(i.read_be_u32()?);
        let data = i.rest();

        Ok(LiteralData {
            packet_version,
            mode,
            file_name,
            created,
            data,
        })
    }

    pub fn mode(&self) -> DataMode {
        self.mode
    }

    pub fn is_binary(&self) -> bool {
        matches!(self.mode, DataMode::Binary)
    }

    pub fn file_name(&self) -> &[u8] {
        &self.file_name
    }

    pub fn created(&self) -> &DateTime<Utc> {
        &self.created
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The bytes a signature over this packet covers, line endings are
    /// canonicalised for text modes.
    pub fn signed_data(&self) -> Bytes {
        if self.is_binary() {
            self.data.clone()
        } else {
            normalize_crlf(&self.data).into()
        }
    }
}

impl Serialize for LiteralData {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(self.mode.into())?;
        writer.write_u8(self.file_name.len().try_into()?)?;
        writer.write_all(&self.file_name)?;
        writer.write_u32::<BigEndian>(time_to_u32(&self.created))?;
        writer.write_all(&self.data)?;

        Ok(())
    }

    fn write_len(&self) -> usize {
        1 + 1 + self.file_name.len() + 4 + self.data.len()
    }
}

impl PacketTrait for LiteralData {
    fn packet_version(&self) -> PacketHeaderVersion {
        self.packet_version
    }

    fn tag(&self) -> Tag {
        Tag::LiteralData
    }
}
