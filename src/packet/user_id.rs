use std::{fmt, io, str};

use bytes::{Buf, Bytes};

use crate::errors::Result;
use crate::packet::PacketTrait;
use crate::parsing::BufParsing;
use crate::ser::Serialize;
use crate::types::{PacketHeaderVersion, Tag};

/// User ID Packet
/// <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.11>
///
/// The id is kept as raw bytes, it is usually, but not always, UTF-8.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct UserId {
    packet_version: PacketHeaderVersion,
    id: Bytes,
}

impl UserId {
    pub fn from_buf<B: Buf>(packet_version: PacketHeaderVersion, mut input: B) -> Result<Self> {
        Ok(UserId {
            packet_version,
            id: input.rest(),
        })
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(packet_version: PacketHeaderVersion, input: &str) -> Self {
        UserId {
            packet_version,
            id: Bytes::copy_from_slice(input.as_bytes()),
        }
    }

    pub fn id(&self) -> &[u8] {
        &self.id
    }

    /// The id as a string, if it is valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        str::from_utf8(&self.id).ok()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.id))
    }
}

impl Serialize for UserId {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.id)?;
        Ok(())
    }

    fn write_len(&self) -> usize {
        self.id.len()
    }
}

impl PacketTrait for UserId {
    fn packet_version(&self) -> PacketHeaderVersion {
        self.packet_version
    }

    fn tag(&self) -> Tag {
        Tag::UserId
    }
}
