use bytes::{Buf, Bytes, BytesMut};
use log::{debug, warn};

use crate::errors::{Error, Result};
use crate::packet::{Packet, PacketHeader};
use crate::parsing::BufParsing;
use crate::types::{PacketHeaderVersion, PacketLength};

/// Parses a sequence of packets from an in memory buffer.
///
/// Packets with a tag this crate does not know are reported as
/// [`Error::Unsupported`] and parsing continues after them. A malformed
/// header or a truncated body ends the iteration after yielding the error.
#[derive(Debug)]
pub struct PacketParser {
    buf: Bytes,
    done: bool,
}

impl PacketParser {
    pub fn new(buf: impl Into<Bytes>) -> Self {
        PacketParser {
            buf: buf.into(),
            done: false,
        }
    }

    /// The bytes not consumed yet.
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    fn read_body(&mut self, header: &PacketHeader) -> Result<Bytes> {
        match header.packet_length() {
            PacketLength::Fixed(len) => Ok(self.buf.read_take(len.try_into()?)?),
            PacketLength::Indeterminate => {
                ensure_eq!(
                    header.version(),
                    PacketHeaderVersion::Old,
                    "indeterminate length in a new format header"
                );
                Ok(self.buf.rest())
            }
            PacketLength::Partial(first) => {
                ensure_eq!(
                    header.version(),
                    PacketHeaderVersion::New,
                    "partial length in an old format header"
                );
                let mut body = BytesMut::new();
                let mut len = first;
                loop {
                    body.extend_from_slice(&self.buf.read_take(len.try_into()?)?);
                    match PacketLength::from_buf(&mut self.buf)? {
                        PacketLength::Partial(next) => len = next,
                        PacketLength::Fixed(last) => {
                            body.extend_from_slice(&self.buf.read_take(last.try_into()?)?);
                            break;
                        }
                        PacketLength::Indeterminate => {
                            bail!("indeterminate length inside a partial body")
                        }
                    }
                }
                Ok(body.freeze())
            }
        }
    }

    fn next_packet(&mut self) -> Result<Packet> {
        let header = PacketHeader::from_buf(&mut self.buf)?;
        debug!("packet header {:?}", header);
        let body = self.read_body(&header)?;

        Packet::from_body(&header, body)
    }
}

impl Iterator for PacketParser {
    type Item = Result<Packet>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || !self.buf.has_remaining() {
            return None;
        }

        let packet = self.next_packet();
        match &packet {
            // the body was consumed, so the stream stays in sync
            Err(Error::Unsupported { message }) => warn!("skipping packet: {}", message),
            Err(err) => {
                warn!("packet stream broken: {}", err);
                self.done = true;
            }
            Ok(_) => {}
        }

        Some(packet)
    }
}
