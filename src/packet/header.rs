use std::io;

use bytes::Buf;
use log::debug;

use crate::errors::Result;
use crate::parsing::BufParsing;
use crate::ser::Serialize;
use crate::types::{PacketHeaderVersion, PacketLength, Tag};

/// Represents a packet header.
///
/// Ref: <https://www.rfc-editor.org/rfc/rfc4880.html#section-4.2>
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PacketHeader {
    version: PacketHeaderVersion,
    tag: Tag,
    length: PacketLength,
}

impl PacketHeader {
    /// Parse a single packet header from the given buffer.
    pub fn from_buf<B: Buf>(mut i: B) -> Result<Self> {
        let header = i.read_u8()?;

        match header & 0b1100_0000 {
            0b1100_0000 => {
                // new starts with 0b11
                let tag = Tag::from(header & 0b0011_1111);
                let length = PacketLength::from_buf(&mut i)?;
                Ok(PacketHeader {
                    version: PacketHeaderVersion::New,
                    tag,
                    length,
                })
            }
            0b1000_0000 => {
                // old starts with 0b10
                let tag = Tag::from((header >> 2) & 0b1111);
                let length = match header & 0b11 {
                    // One-Octet Lengths
                    0 => PacketLength::Fixed(i.read_u8()?.into()),
                    // Two-Octet Lengths
                    1 => PacketLength::Fixed(i.read_be_u16()?.into()),
                    // Four-Octet Lengths
                    2 => PacketLength::Fixed(i.read_be_u32()?),
                    _ => PacketLength::Indeterminate,
                };
                Ok(PacketHeader {
                    version: PacketHeaderVersion::Old,
                    tag,
                    length,
                })
            }
            _ => bail!("unknown packet header version {:b}", header),
        }
    }

    /// Creates a header with a fixed length.
    pub fn new_fixed(version: PacketHeaderVersion, tag: Tag, length: u32) -> Self {
        PacketHeader {
            version,
            tag,
            length: PacketLength::Fixed(length),
        }
    }

    pub fn version(&self) -> PacketHeaderVersion {
        self.version
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn packet_length(&self) -> PacketLength {
        self.length
    }
}

impl Serialize for PacketHeader {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        debug!("writing packet header {:?}", self);
        match self.length {
            PacketLength::Fixed(len) => self.version.write_header(writer, self.tag, len.try_into()?),
            _ => unsupported_err!("writing {:?} packet lengths", self.length),
        }
    }

    fn write_len(&self) -> usize {
        self.version
            .header_len(self.length.maybe_len().unwrap_or_default() as usize)
    }
}
