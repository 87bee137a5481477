use std::io;

use byteorder::{BigEndian, WriteBytesExt};
use bytes::Buf;
use log::debug;
use rand::{CryptoRng, Rng};
use zeroize::Zeroizing;

use crate::crypto::checksum;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::{Error, Result};
use crate::packet::PacketTrait;
use crate::parsing::BufParsing;
use crate::ser::Serialize;
use crate::types::{
    KeyDetails, KeyId, PacketHeaderVersion, PkeskBytes, PkeskVersion, PlainSecretParams, Tag,
};

/// Public Key Encrypted Session Key Packet
/// <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.1>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKeyEncryptedSessionKey {
    packet_version: PacketHeaderVersion,
    id: KeyId,
    pk_algo: PublicKeyAlgorithm,
    values: PkeskBytes,
}

impl PublicKeyEncryptedSessionKey {
    /// Encrypts the given session key to `pkey`.
    ///
    /// The encrypted message is the algorithm octet, the key and a two
    /// octet checksum of the key.
    pub fn from_session_key<R: CryptoRng + Rng>(
        rng: &mut R,
        session_key: &[u8],
        alg: SymmetricKeyAlgorithm,
        pkey: &impl KeyDetails,
    ) -> Result<Self> {
        ensure_eq!(session_key.len(), alg.key_size(), "session key size");
        ensure!(
            pkey.algorithm().can_encrypt(),
            "algorithm {:?} can not encrypt",
            pkey.algorithm()
        );

        let mut data = Zeroizing::new(Vec::with_capacity(session_key.len() + 3));
        data.push(u8::from(alg));
        data.extend_from_slice(session_key);
        data.write_u16::<BigEndian>(checksum::calculate_simple(session_key))?;

        let values = PkeskBytes::encrypt(rng, pkey.public_params(), &data)?;

        Ok(PublicKeyEncryptedSessionKey {
            packet_version: PacketHeaderVersion::New,
            id: pkey.key_id()?,
            pk_algo: pkey.algorithm(),
            values,
        })
    }

    pub fn from_buf<B: Buf>(packet_version: PacketHeaderVersion, mut i: B) -> Result<Self> {
        let version = PkeskVersion::from(i.read_u8()?);
        ensure_eq!(version, PkeskVersion::V3, "unsupported session key packet version");
        let id = KeyId::from(i.read_array::<8>()?);
        let pk_algo = PublicKeyAlgorithm::from(i.read_u8()?);
        let values = PkeskBytes::from_buf(pk_algo, &mut i)?;
        ensure!(!i.has_remaining(), "trailing data in session key packet");

        Ok(PublicKeyEncryptedSessionKey {
            packet_version,
            id,
            pk_algo,
            values,
        })
    }

    pub fn id(&self) -> &KeyId {
        &self.id
    }

    pub fn algorithm(&self) -> PublicKeyAlgorithm {
        self.pk_algo
    }

    pub fn values(&self) -> &PkeskBytes {
        &self.values
    }

    /// Decrypts the session key with the matching secret key material.
    ///
    /// Any failure to decode the message is reported as [`Error::DecryptionFailed`].
    pub fn decrypt(
        &self,
        public: &impl KeyDetails,
        secret: &PlainSecretParams,
    ) -> Result<(SymmetricKeyAlgorithm, Zeroizing<Vec<u8>>)> {
        let plain = secret.decrypt(public.public_params(), &self.values)?;
        if plain.len() < 3 {
            return Err(Error::DecryptionFailed);
        }

        let alg = SymmetricKeyAlgorithm::from(plain[0]);
        let key = &plain[1..plain.len() - 2];
        let sum = &plain[plain.len() - 2..];
        if key.len() != alg.key_size() || checksum::simple(sum, key).is_err() {
            debug!("session key check failed");
            return Err(Error::DecryptionFailed);
        }

        Ok((alg, Zeroizing::new(key.to_vec())))
    }
}

impl Serialize for PublicKeyEncryptedSessionKey {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(PkeskVersion::V3.into())?;
        writer.write_all(self.id.as_ref())?;
        writer.write_u8(self.pk_algo.into())?;
        self.values.to_writer(writer)?;

        Ok(())
    }

    fn write_len(&self) -> usize {
        1 + 8 + 1 + self.values.write_len()
    }
}

impl PacketTrait for PublicKeyEncryptedSessionKey {
    fn packet_version(&self) -> PacketHeaderVersion {
        self.packet_version
    }

    fn tag(&self) -> Tag {
        Tag::PublicKeyEncryptedSessionKey
    }
}
