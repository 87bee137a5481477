use std::io;

use bytes::{Buf, Bytes};
use log::debug;

use crate::errors::Result;
use crate::packet::PacketTrait;
use crate::parsing::BufParsing;
use crate::ser::Serialize;
use crate::types::{PacketHeaderVersion, Tag};

/// Trust Packet
/// <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.10>
///
/// Trust packets are kept for local keyrings, they never influence validation.
#[derive(derive_more::Debug, PartialEq, Eq, Clone)]
pub struct Trust {
    packet_version: PacketHeaderVersion,
    #[debug("{}", hex::encode(data))]
    data: Bytes,
}

impl Trust {
    pub fn from_buf<B: Buf>(packet_version: PacketHeaderVersion, mut input: B) -> Result<Self> {
        let data = input.rest();
        debug!("trust packet with {} bytes", data.len());

        Ok(Trust {
            packet_version,
            data,
        })
    }

    pub fn from_slice(packet_version: PacketHeaderVersion, input: &[u8]) -> Self {
        Trust {
            packet_version,
            data: Bytes::copy_from_slice(input),
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl Serialize for Trust {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.data)?;
        Ok(())
    }

    fn write_len(&self) -> usize {
        self.data.len()
    }
}

impl PacketTrait for Trust {
    fn packet_version(&self) -> PacketHeaderVersion {
        self.packet_version
    }

    fn tag(&self) -> Tag {
        Tag::Trust
    }
}
