use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use num_enum::{FromPrimitive, IntoPrimitive};

use crate::crypto::hash::HashAlgorithm;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::packet::signature::{Subpacket, SubpacketData};
use crate::packet::PacketTrait;
use crate::types::{KeyId, Mpi, PacketHeaderVersion, Tag};

/// Signature Packet
/// <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.2>
#[derive(derive_more::Debug, PartialEq, Eq, Clone)]
pub struct Signature {
    pub(crate) packet_version: PacketHeaderVersion,
    pub config: SignatureConfig,
    /// The left 16 bits of the signed digest.
    #[debug("{}", hex::encode(signed_hash_value))]
    pub signed_hash_value: [u8; 2],
    pub signature: Vec<Mpi>,
}

/// Everything in a signature packet except the signature values.
#[derive(derive_more::Debug, PartialEq, Eq, Clone)]
pub struct SignatureConfig {
    pub version: SignatureVersion,
    pub typ: SignatureType,
    pub pub_alg: PublicKeyAlgorithm,
    pub hash_alg: HashAlgorithm,
    pub hashed_subpackets: Vec<Subpacket>,
    pub unhashed_subpackets: Vec<Subpacket>,

    /// v3 only
    pub created: Option<DateTime<Utc>>,
    /// v3 only
    pub issuer: Option<KeyId>,

    /// The exact bytes covered by the hash, ahead of the trailer.
    /// For v4 this is version through the hashed subpackets, for v2/v3 the
    /// signature type and creation time.
    #[debug("{}", hex::encode(hashed_area))]
    pub(crate) hashed_area: Bytes,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum SignatureVersion {
    V2 = 2,
    V3 = 3,
    V4 = 4,

    #[num_enum(catch_all)]
    Other(u8),
}

impl Default for SignatureVersion {
    fn default() -> Self {
        Self::V4
    }
}

impl SignatureVersion {
    pub fn is_legacy(self) -> bool {
        matches!(self, SignatureVersion::V2 | SignatureVersion::V3)
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum SignatureType {
    /// Signature of a binary document.
    Binary = 0x00,
    /// Signature of a canonical text document.
    /// The signature is calculated over the text data with its line endings
    /// converted to `<CR><LF>`.
    Text = 0x01,
    /// Standalone signature, over its own subpackets only.
    Standalone = 0x02,
    /// Generic certification of a User ID and Public-Key packet.
    CertGeneric = 0x10,
    /// Persona certification of a User ID and Public-Key packet.
    CertPersona = 0x11,
    /// Casual certification of a User ID and Public-Key packet.
    CertCasual = 0x12,
    /// Positive certification of a User ID and Public-Key packet.
    CertPositive = 0x13,
    /// Subkey Binding Signature
    /// A statement by the top-level signing key that it owns the subkey.
    /// Calculated directly on the primary key and subkey.
    SubkeyBinding = 0x18,
    /// Primary Key Binding Signature, made by a signing subkey.
    KeyBinding = 0x19,
    /// Signature directly on a key
    Key = 0x1F,
    /// Key revocation signature
    /// The signature is calculated directly on the key being revoked.
    KeyRevocation = 0x20,
    /// Subkey revocation signature
    /// Calculated directly on the primary key and the subkey being revoked.
    SubkeyRevocation = 0x28,
    /// Certification revocation signature
    /// Revokes an earlier User ID certification, calculated like it.
    CertRevocation = 0x30,
    /// Timestamp signature.
    Timestamp = 0x40,
    /// Third-Party Confirmation signature.
    ThirdParty = 0x50,

    #[num_enum(catch_all)]
    Other(u8),
}

impl SignatureType {
    /// Signatures over a user id or user attribute and the primary key.
    pub fn is_certification(self) -> bool {
        matches!(
            self,
            SignatureType::CertGeneric
                | SignatureType::CertPersona
                | SignatureType::CertCasual
                | SignatureType::CertPositive
                | SignatureType::CertRevocation
        )
    }

    pub fn is_revocation(self) -> bool {
        matches!(
            self,
            SignatureType::KeyRevocation
                | SignatureType::SubkeyRevocation
                | SignatureType::CertRevocation
        )
    }
}

/// The decoded facts about a signature, independent of its algorithm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureInfo {
    pub version: SignatureVersion,
    pub typ: SignatureType,
    pub pub_alg: PublicKeyAlgorithm,
    pub hash_alg: HashAlgorithm,
    /// Number of bytes hashed ahead of the trailer.
    pub hashed_len: usize,
    pub created: Option<DateTime<Utc>>,
    /// Seconds after creation at which the signature expires.
    pub duration: Option<u32>,
    pub issuer: Option<KeyId>,
}

impl SignatureConfig {
    pub fn hashed_area(&self) -> &[u8] {
        &self.hashed_area
    }

    pub fn hashed_subpackets(&self) -> impl Iterator<Item = &Subpacket> {
        self.hashed_subpackets.iter()
    }

    pub fn unhashed_subpackets(&self) -> impl Iterator<Item = &Subpacket> {
        self.unhashed_subpackets.iter()
    }

    pub fn created(&self) -> Option<&DateTime<Utc>> {
        if self.version.is_legacy() {
            return self.created.as_ref();
        }

        self.hashed_subpackets().find_map(|p| match &p.data {
            SubpacketData::SignatureCreationTime(d) => Some(d),
            _ => None,
        })
    }

    /// The issuer key id. For v4 signatures the hashed area is searched
    /// first, then the unhashed one.
    pub fn issuer(&self) -> Option<&KeyId> {
        if self.version.is_legacy() {
            return self.issuer.as_ref();
        }

        self.hashed_subpackets()
            .chain(self.unhashed_subpackets())
            .find_map(|p| match &p.data {
                SubpacketData::Issuer(id) => Some(id),
                _ => None,
            })
    }
}

impl Signature {
    pub fn typ(&self) -> SignatureType {
        self.config.typ
    }

    pub fn version(&self) -> SignatureVersion {
        self.config.version
    }

    pub fn pub_alg(&self) -> PublicKeyAlgorithm {
        self.config.pub_alg
    }

    pub fn hash_alg(&self) -> HashAlgorithm {
        self.config.hash_alg
    }

    pub fn created(&self) -> Option<&DateTime<Utc>> {
        self.config.created()
    }

    pub fn issuer(&self) -> Option<&KeyId> {
        self.config.issuer()
    }

    /// Seconds after creation at which the signature expires, `None` if it never does.
    pub fn expiration(&self) -> Option<u32> {
        self.config
            .hashed_subpackets()
            .find_map(|p| match &p.data {
                SubpacketData::SignatureExpirationTime(d) => Some(*d),
                _ => None,
            })
            .filter(|d| *d > 0)
    }

    pub fn key_expiration(&self) -> Option<u32> {
        self.config
            .hashed_subpackets()
            .find_map(|p| match &p.data {
                SubpacketData::KeyExpirationTime(d) => Some(*d),
                _ => None,
            })
            .filter(|d| *d > 0)
    }

    pub fn is_expired_at(&self, now: &DateTime<Utc>) -> bool {
        match (self.created(), self.expiration()) {
            (Some(created), Some(secs)) => *created + Duration::seconds(i64::from(secs)) < *now,
            _ => false,
        }
    }

    pub fn is_primary(&self) -> bool {
        self.config
            .hashed_subpackets()
            .find_map(|p| match &p.data {
                SubpacketData::IsPrimary(d) => Some(*d),
                _ => None,
            })
            .unwrap_or(false)
    }

    /// Trust level and amount of a trust signature.
    pub fn trust_signature(&self) -> Option<(u8, u8)> {
        self.config.hashed_subpackets().find_map(|p| match &p.data {
            SubpacketData::TrustSignature(level, amount) => Some((*level, *amount)),
            _ => None,
        })
    }

    pub fn revocation_reason(&self) -> Option<(u8, &[u8])> {
        self.config.hashed_subpackets().find_map(|p| match &p.data {
            SubpacketData::RevocationReason(code, reason) => Some((*code, &reason[..])),
            _ => None,
        })
    }

    pub fn info(&self) -> SignatureInfo {
        SignatureInfo {
            version: self.version(),
            typ: self.typ(),
            pub_alg: self.pub_alg(),
            hash_alg: self.hash_alg(),
            hashed_len: self.config.hashed_area.len(),
            created: self.created().copied(),
            duration: self.expiration(),
            issuer: self.issuer().copied(),
        }
    }
}

impl PacketTrait for Signature {
    fn packet_version(&self) -> PacketHeaderVersion {
        self.packet_version
    }

    fn tag(&self) -> Tag {
        Tag::Signature
    }
}
