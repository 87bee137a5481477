use std::io;

use bytes::Buf;
use chrono::{DateTime, Utc};
use rand::{CryptoRng, Rng};

use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::errors::Result;
use crate::packet::PacketTrait;
use crate::parsing::BufParsing;
use crate::ser::Serialize;
use crate::types::{
    KeyDetails, KeyVersion, PacketHeaderVersion, PkeskBytes, PublicParams, Tag,
};
use crate::util::dt_from_timestamp;

/// Public Key Packet
/// <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.5.1.1>
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct PublicKey {
    packet_version: PacketHeaderVersion,
    version: KeyVersion,
    algorithm: PublicKeyAlgorithm,
    created_at: DateTime<Utc>,
    expiration: Option<u16>,
    public_params: PublicParams,
}

/// Public Subkey Packet
/// <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.5.1.2>
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct PublicSubkey(PublicKey);

impl PublicKey {
    /// Create a new `PublicKey` packet from underlying parameters.
    pub fn new(
        packet_version: PacketHeaderVersion,
        version: KeyVersion,
        algorithm: PublicKeyAlgorithm,
        created_at: DateTime<Utc>,
        expiration: Option<u16>,
        public_params: PublicParams,
    ) -> Result<Self> {
        match version {
            KeyVersion::V2 | KeyVersion::V3 => {
                ensure!(
                    algorithm.is_rsa(),
                    "invalid algorithm for a v{} key: {:?}",
                    u8::from(version),
                    algorithm
                );
            }
            KeyVersion::V4 => {
                ensure!(expiration.is_none(), "v4 keys carry no validity period");
            }
            KeyVersion::Other(v) => unsupported_err!("key version {}", v),
        }
        ensure!(
            public_params.matches(algorithm),
            "key material does not match algorithm {:?}",
            algorithm
        );

        Ok(PublicKey {
            packet_version,
            version,
            algorithm,
            created_at,
            expiration,
            public_params,
        })
    }

    /// Parses a public key packet body.
    pub fn from_buf<B: Buf>(packet_version: PacketHeaderVersion, mut i: B) -> Result<Self> {
        let version = KeyVersion::from(i.read_u8()?);
        let created_at = dt_from_timestamp(i.read_be_u32()?);
        let expiration = match version {
            KeyVersion::V2 | KeyVersion::V3 => Some(i.read_be_u16()?),
            KeyVersion::V4 => None,
            KeyVersion::Other(v) => unsupported_err!("key version {}", v),
        };
        let algorithm = PublicKeyAlgorithm::from(i.read_u8()?);
        let public_params = PublicParams::from_buf(algorithm, &mut i)?;

        Self::new(
            packet_version,
            version,
            algorithm,
            created_at,
            expiration,
            public_params,
        )
    }

    /// Reads the public part of a key packet, leaving the rest of `i` unread.
    pub(crate) fn from_buf_prefix<B: Buf>(
        packet_version: PacketHeaderVersion,
        i: &mut B,
    ) -> Result<Self> {
        let version = KeyVersion::from(i.read_u8()?);
        let created_at = dt_from_timestamp(i.read_be_u32()?);
        let expiration = match version {
            KeyVersion::V2 | KeyVersion::V3 => Some(i.read_be_u16()?),
            KeyVersion::V4 => None,
            KeyVersion::Other(v) => unsupported_err!("key version {}", v),
        };
        let algorithm = PublicKeyAlgorithm::from(i.read_u8()?);
        ensure!(
            !matches!(algorithm, PublicKeyAlgorithm::Unknown(_)),
            "secret key with unknown algorithm {:?}",
            algorithm
        );
        let public_params = PublicParams::from_buf(algorithm, &mut *i)?;

        Self::new(
            packet_version,
            version,
            algorithm,
            created_at,
            expiration,
            public_params,
        )
    }

    /// Encrypts `plain`, a session key message, to this key.
    pub fn encrypt<R: CryptoRng + Rng>(&self, rng: &mut R, plain: &[u8]) -> Result<PkeskBytes> {
        ensure!(
            self.algorithm.can_encrypt(),
            "algorithm {:?} can not encrypt",
            self.algorithm
        );
        PkeskBytes::encrypt(rng, &self.public_params, plain)
    }
}

impl PublicSubkey {
    pub fn new(key: PublicKey) -> Self {
        PublicSubkey(key)
    }

    pub fn from_buf<B: Buf>(packet_version: PacketHeaderVersion, i: B) -> Result<Self> {
        PublicKey::from_buf(packet_version, i).map(PublicSubkey)
    }

    pub fn key(&self) -> &PublicKey {
        &self.0
    }

    pub fn into_key(self) -> PublicKey {
        self.0
    }
}

impl KeyDetails for PublicKey {
    fn version(&self) -> KeyVersion {
        self.version
    }

    fn algorithm(&self) -> PublicKeyAlgorithm {
        self.algorithm
    }

    fn created_at(&self) -> &DateTime<Utc> {
        &self.created_at
    }

    fn expiration(&self) -> Option<u16> {
        self.expiration
    }

    fn public_params(&self) -> &PublicParams {
        &self.public_params
    }
}

impl KeyDetails for PublicSubkey {
    fn version(&self) -> KeyVersion {
        self.0.version
    }

    fn algorithm(&self) -> PublicKeyAlgorithm {
        self.0.algorithm
    }

    fn created_at(&self) -> &DateTime<Utc> {
        &self.0.created_at
    }

    fn expiration(&self) -> Option<u16> {
        self.0.expiration
    }

    fn public_params(&self) -> &PublicParams {
        &self.0.public_params
    }
}

impl Serialize for PublicKey {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        self.to_writer_body(writer)
    }

    fn write_len(&self) -> usize {
        self.body_len()
    }
}

impl Serialize for PublicSubkey {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        self.0.to_writer_body(writer)
    }

    fn write_len(&self) -> usize {
        self.0.body_len()
    }
}

impl PacketTrait for PublicKey {
    fn packet_version(&self) -> PacketHeaderVersion {
        self.packet_version
    }

    fn tag(&self) -> Tag {
        Tag::PublicKey
    }
}

impl PacketTrait for PublicSubkey {
    fn packet_version(&self) -> PacketHeaderVersion {
        self.0.packet_version
    }

    fn tag(&self) -> Tag {
        Tag::PublicSubkey
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    use super::*;
    use crate::crypto::hash::HashAlgorithm;
    use crate::types::{Mpi, RsaPublicParams};

    pub(crate) fn rsa_key(seed: u64, version: KeyVersion) -> PublicKey {
        let (params, _) = crate::crypto::rsa::tests::test_key(seed);
        let created = Utc.timestamp_opt(1_500_000_000, 0).unwrap();
        let expiration = version.is_legacy().then_some(0);
        PublicKey::new(
            PacketHeaderVersion::New,
            version,
            PublicKeyAlgorithm::RSA,
            created,
            expiration,
            PublicParams::RSA(params),
        )
        .unwrap()
    }

    #[test]
    fn test_v4_fingerprint() {
        let key = rsa_key(0, KeyVersion::V4);

        let mut buf = vec![0x99];
        buf.extend_from_slice(&(key.write_len() as u16).to_be_bytes());
        key.to_writer(&mut buf).unwrap();

        let fp = key.fingerprint().unwrap();
        assert_eq!(fp.len(), 20);
        assert_eq!(fp.as_bytes(), HashAlgorithm::Sha1.digest(&buf).unwrap());
        assert_eq!(key.key_id().unwrap().as_ref(), &fp.as_bytes()[12..]);

        // md5 based variant
        let fp = key.fingerprint_with(HashAlgorithm::Md5).unwrap();
        assert_eq!(fp.len(), 16);
        assert_eq!(fp.as_bytes(), HashAlgorithm::Md5.digest(&buf).unwrap());
        assert_eq!(
            key.key_id_with(HashAlgorithm::Md5).unwrap().as_ref(),
            &fp.as_bytes()[8..]
        );
    }

    #[test]
    fn test_v3_fingerprint() {
        let key = rsa_key(1, KeyVersion::V3);
        let PublicParams::RSA(params) = key.public_params() else {
            panic!("not rsa");
        };

        let mut raw = params.n.as_ref().to_vec();
        raw.extend_from_slice(params.e.as_ref());
        let fp = key.fingerprint().unwrap();
        assert_eq!(fp.len(), 16);
        assert_eq!(fp.as_bytes(), HashAlgorithm::Md5.digest(&raw).unwrap());

        let n = params.n.as_ref();
        assert_eq!(key.key_id().unwrap().as_ref(), &n[n.len() - 8..]);
    }

    #[test]
    fn test_v3_key_expiry() {
        let (params, _) = crate::crypto::rsa::tests::test_key(1);
        let created = Utc.timestamp_opt(1_000_000, 0).unwrap();
        let key = PublicKey::new(
            PacketHeaderVersion::Old,
            KeyVersion::V3,
            PublicKeyAlgorithm::RSA,
            created,
            Some(10),
            PublicParams::RSA(params),
        )
        .unwrap();

        assert_eq!(
            key.expires_at().unwrap().timestamp(),
            1_000_000 + 10 * 86400
        );
        let raw = key.to_bytes().unwrap();
        let back = PublicKey::from_buf(PacketHeaderVersion::Old, &raw[..]).unwrap();
        assert_eq!(back, key);
    }

    #[test]
    fn test_invalid_keys() {
        let params = PublicParams::RSA(RsaPublicParams {
            n: Mpi::from_slice(&[0xff; 64]),
            e: Mpi::from_slice(&[1, 0, 1]),
        });
        let created = Utc.timestamp_opt(0, 0).unwrap();

        // material does not match the algorithm
        assert!(PublicKey::new(
            PacketHeaderVersion::New,
            KeyVersion::V4,
            PublicKeyAlgorithm::DSA,
            created,
            None,
            params.clone(),
        )
        .is_err());

        // v4 keys have no validity period
        assert!(PublicKey::new(
            PacketHeaderVersion::New,
            KeyVersion::V4,
            PublicKeyAlgorithm::RSA,
            created,
            Some(3),
            params,
        )
        .is_err());
    }

    proptest! {
        #[test]
        fn key_id_is_fingerprint_tail(seed in 0u64..4) {
            let key = rsa_key(seed, KeyVersion::V4);
            let fp = key.fingerprint().unwrap();
            let fp2 = key.fingerprint().unwrap();
            prop_assert_eq!(&fp, &fp2);
            prop_assert_eq!(key.key_id().unwrap(), fp.key_id().unwrap());

            let raw = key.to_bytes().unwrap();
            prop_assert_eq!(raw.len(), key.write_len());
            let back = PublicKey::from_buf(PacketHeaderVersion::New, &raw[..]).unwrap();
            prop_assert_eq!(back, key);
        }
    }
}
