use std::io;

use byteorder::{BigEndian, WriteBytesExt};

use crate::errors::Result;
use crate::packet::signature::{Signature, SignatureVersion};
use crate::ser::Serialize;

impl Signature {
    /// v2/v3: version, hashed length, hashed material, issuer, algorithms.
    fn to_writer_v3<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        let Some(issuer) = self.config.issuer else {
            bail!("v3 signature without issuer");
        };
        writer.write_u8(self.config.version.into())?;
        writer.write_u8(5)?;
        writer.write_all(&self.config.hashed_area)?;
        writer.write_all(issuer.as_ref())?;
        writer.write_u8(self.config.pub_alg.into())?;
        writer.write_u8(self.config.hash_alg.into())?;

        Ok(())
    }

    /// v4: the hashed span as created or read, then the unhashed subpackets.
    fn to_writer_v4<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.config.hashed_area)?;

        writer.write_u16::<BigEndian>(self.config.unhashed_subpackets.write_len().try_into()?)?;
        self.config.unhashed_subpackets.to_writer(writer)?;

        Ok(())
    }
}

impl Serialize for Signature {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        match self.config.version {
            SignatureVersion::V2 | SignatureVersion::V3 => self.to_writer_v3(writer)?,
            SignatureVersion::V4 => self.to_writer_v4(writer)?,
            SignatureVersion::Other(v) => unsupported_err!("signature version {}", v),
        }

        // signed hash value
        writer.write_all(&self.signed_hash_value)?;
        self.signature.to_writer(writer)?;

        Ok(())
    }

    fn write_len(&self) -> usize {
        let head = match self.config.version {
            SignatureVersion::V2 | SignatureVersion::V3 => 1 + 1 + 5 + 8 + 1 + 1,
            _ => self.config.hashed_area.len() + 2 + self.config.unhashed_subpackets.write_len(),
        };
        head + 2 + self.signature.write_len()
    }
}
