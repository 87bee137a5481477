use std::io;

use bytes::{Buf, Bytes};

use crate::errors::Result;
use crate::packet::PacketTrait;
use crate::parsing::BufParsing;
use crate::ser::Serialize;
use crate::types::{PacketHeaderVersion, Tag};

/// User Attribute Packet
/// <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.12>
///
/// The subpackets are kept opaque, certifications hash the raw body.
#[derive(derive_more::Debug, PartialEq, Eq, Clone)]
pub struct UserAttribute {
    packet_version: PacketHeaderVersion,
    #[debug("{}", hex::encode(data))]
    data: Bytes,
}

impl UserAttribute {
    pub fn from_buf<B: Buf>(packet_version: PacketHeaderVersion, mut input: B) -> Result<Self> {
        let data = input.rest();
        ensure!(!data.is_empty(), "empty user attribute");

        Ok(UserAttribute {
            packet_version,
            data,
        })
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl Serialize for UserAttribute {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.data)?;
        Ok(())
    }

    fn write_len(&self) -> usize {
        self.data.len()
    }
}

impl PacketTrait for UserAttribute {
    fn packet_version(&self) -> PacketHeaderVersion {
        self.packet_version
    }

    fn tag(&self) -> Tag {
        Tag::UserAttribute
    }
}
