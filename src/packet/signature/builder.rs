use std::io;

use byteorder::{BigEndian, WriteBytesExt};
use bytes::Bytes;
use chrono::{DateTime, SubsecRound, Utc};
use digest::DynDigest;
use log::debug;

use crate::crypto::hash::HashAlgorithm;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::debug::DebugConfig;
use crate::errors::{Error, Result};
use crate::packet::signature::verify::{hash_data, hash_key, hash_user_attribute, hash_user_id};
use crate::packet::signature::{
    Signature, SignatureConfig, SignatureType, SignatureVersion, Subpacket, SubpacketData,
};
use crate::packet::{PacketTrait, UserAttribute, UserId};
use crate::ser::{time_to_u32, Serialize};
use crate::types::{KeyDetails, KeyId, PacketHeaderVersion, SigningKey};

/// Stages of [`SignatureCreator`], in the order they are passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CreateState {
    New,
    HashInit,
    WritePreamble,
    AddHashedSubpackets,
    EndHashed,
    Finalize,
    Written,
}

impl CreateState {
    fn name(self) -> &'static str {
        match self {
            CreateState::New => "new",
            CreateState::HashInit => "hash init",
            CreateState::WritePreamble => "write preamble",
            CreateState::AddHashedSubpackets => "add hashed subpackets",
            CreateState::EndHashed => "end hashed",
            CreateState::Finalize => "finalize",
            CreateState::Written => "written",
        }
    }
}

/// Builds a signature step by step.
///
/// The objects being signed (keys, user ids, data) are hashed first. The
/// preamble and the hashed subpackets are collected separately, their
/// length is only fixed once the hashed area is closed. At finalisation the
/// hashed area and the version trailer go into the hash and the digest is
/// signed.
///
/// ```
/// # use chrono::{TimeZone, Utc};
/// # use rand::SeedableRng;
/// # use pgpcore::crypto::hash::HashAlgorithm;
/// # use pgpcore::packet::{SecretKey, SignatureCreator, SignatureType, SignatureVersion};
/// # use pgpcore::types::KeyDetails;
/// # let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(0);
/// # let created = Utc.timestamp_opt(1_600_000_000, 0).unwrap();
/// # let key = SecretKey::generate_rsa(&mut rng, 1024, created).unwrap();
/// let mut creator = SignatureCreator::new(
///     SignatureVersion::V4,
///     SignatureType::Binary,
///     key.algorithm(),
///     HashAlgorithm::Sha256,
/// );
/// creator.hash_init().unwrap();
/// creator.hash_data(b"hello").unwrap();
/// creator.write_preamble().unwrap();
/// creator.add_creation_time(created).unwrap();
/// creator.add_issuer(key.key_id().unwrap()).unwrap();
/// creator.end_hashed().unwrap();
/// creator.finalize(&key, String::new).unwrap();
/// let sig = creator.into_signature().unwrap();
///
/// assert!(sig.verify_data(&key, b"hello").is_ok());
/// ```
pub struct SignatureCreator {
    state: CreateState,
    version: SignatureVersion,
    typ: SignatureType,
    pub_alg: PublicKeyAlgorithm,
    hash_alg: HashAlgorithm,
    hasher: Option<Box<dyn DynDigest>>,
    /// Version through hash algorithm.
    preamble: Vec<u8>,
    /// Encoded hashed subpackets.
    hashed: Vec<u8>,
    hashed_subpackets: Vec<Subpacket>,
    unhashed_subpackets: Vec<Subpacket>,
    hashed_area: Option<Bytes>,
    // v3 only
    created: Option<DateTime<Utc>>,
    issuer: Option<KeyId>,
    signature: Option<Signature>,
    packet_version: PacketHeaderVersion,
    debug: DebugConfig,
}

impl std::fmt::Debug for SignatureCreator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureCreator")
            .field("state", &self.state)
            .field("version", &self.version)
            .field("typ", &self.typ)
            .field("pub_alg", &self.pub_alg)
            .field("hash_alg", &self.hash_alg)
            .field("hashed", &hex::encode(&self.hashed))
            .finish()
    }
}

impl SignatureCreator {
    pub fn new(
        version: SignatureVersion,
        typ: SignatureType,
        pub_alg: PublicKeyAlgorithm,
        hash_alg: HashAlgorithm,
    ) -> Self {
        SignatureCreator {
            state: CreateState::New,
            version,
            typ,
            pub_alg,
            hash_alg,
            hasher: None,
            preamble: Vec::new(),
            hashed: Vec::new(),
            hashed_subpackets: Vec::new(),
            unhashed_subpackets: Vec::new(),
            hashed_area: None,
            created: None,
            issuer: None,
            signature: None,
            packet_version: PacketHeaderVersion::New,
            debug: DebugConfig::default(),
        }
    }

    /// Enables hex dumps of the hashed material, when `signature` is enabled in `debug`.
    pub fn with_debug(mut self, debug: DebugConfig) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_packet_version(mut self, packet_version: PacketHeaderVersion) -> Self {
        self.packet_version = packet_version;
        self
    }

    pub fn state(&self) -> CreateState {
        self.state
    }

    fn expect_state(&self, allowed: &[CreateState]) -> Result<()> {
        if allowed.contains(&self.state) {
            return Ok(());
        }

        Err(Error::CreateState {
            expected: allowed.first().map(|s| s.name()).unwrap_or("none"),
            actual: self.state.name(),
        })
    }

    fn hasher(&mut self) -> Result<&mut Box<dyn DynDigest>> {
        self.hasher
            .as_mut()
            .ok_or_else(|| format_err!("hash context is not initialised"))
    }

    /// Objects may be hashed from hash init until the hashed area is closed.
    fn expect_hashing(&self) -> Result<()> {
        self.expect_state(&[
            CreateState::HashInit,
            CreateState::WritePreamble,
            CreateState::AddHashedSubpackets,
            CreateState::EndHashed,
        ])
    }

    fn dump(&self, what: &str, data: &[u8]) {
        if self.debug.is_enabled("signature") {
            debug!("{}: {}", what, hex::encode(data));
        }
    }

    /// Selects the hash context.
    pub fn hash_init(&mut self) -> Result<()> {
        self.expect_state(&[CreateState::New])?;
        ensure!(
            matches!(self.version, SignatureVersion::V3 | SignatureVersion::V4),
            "can not create v{} signatures",
            u8::from(self.version)
        );
        self.hasher = Some(self.hash_alg.new_hasher()?);
        self.state = CreateState::HashInit;

        Ok(())
    }

    /// Hashes a key, in the `0x99` prefixed form.
    pub fn hash_key(&mut self, key: &impl KeyDetails) -> Result<()> {
        self.expect_hashing()?;
        if self.debug.is_enabled("signature") {
            let mut raw = Vec::new();
            key.serialize_for_hashing(&mut raw)?;
            self.dump("key", &raw);
        }
        hash_key(self.hasher()?, key)
    }

    pub fn hash_user_id(&mut self, id: &UserId) -> Result<()> {
        self.expect_hashing()?;
        self.dump("user id", id.id());
        hash_user_id(self.hasher()?, id)
    }

    pub fn hash_user_attribute(&mut self, attr: &UserAttribute) -> Result<()> {
        self.expect_hashing()?;
        hash_user_attribute(self.hasher()?, attr)
    }

    /// Hashes document data. Text signatures canonicalise line endings.
    pub fn hash_data(&mut self, data: &[u8]) -> Result<()> {
        self.expect_hashing()?;
        let typ = self.typ;
        hash_data(self.hasher()?, typ, data);
        Ok(())
    }

    /// Writes version, type and algorithms.
    pub fn write_preamble(&mut self) -> Result<()> {
        self.expect_state(&[CreateState::HashInit])?;
        if self.version == SignatureVersion::V4 {
            self.preamble = vec![
                self.version.into(),
                self.typ.into(),
                self.pub_alg.into(),
                self.hash_alg.into(),
            ];
        }
        self.state = CreateState::WritePreamble;

        Ok(())
    }

    /// Appends a subpacket to the hashed area.
    ///
    /// v3 signatures only carry a creation time and an issuer.
    pub fn add_hashed_subpacket(&mut self, packet: Subpacket) -> Result<()> {
        self.expect_state(&[CreateState::WritePreamble, CreateState::AddHashedSubpackets])?;

        if self.version.is_legacy() {
            match packet.data {
                SubpacketData::SignatureCreationTime(t) => self.created = Some(t),
                SubpacketData::Issuer(id) => self.issuer = Some(id),
                _ => unsupported_err!("subpacket {:?} in a v3 signature", packet.typ()),
            }
        } else {
            packet.to_writer(&mut self.hashed)?;
            self.hashed_subpackets.push(packet);
        }
        self.state = CreateState::AddHashedSubpackets;

        Ok(())
    }

    pub fn add_creation_time(&mut self, created: DateTime<Utc>) -> Result<()> {
        self.add_hashed_subpacket(Subpacket::regular(SubpacketData::SignatureCreationTime(
            created.trunc_subsecs(0),
        )))
    }

    /// Seconds after creation at which the signature expires.
    pub fn add_expiration(&mut self, secs: u32) -> Result<()> {
        self.add_hashed_subpacket(Subpacket::regular(SubpacketData::SignatureExpirationTime(secs)))
    }

    pub fn add_issuer(&mut self, id: KeyId) -> Result<()> {
        self.add_hashed_subpacket(Subpacket::regular(SubpacketData::Issuer(id)))
    }

    pub fn add_primary_user_id(&mut self, primary: bool) -> Result<()> {
        self.add_hashed_subpacket(Subpacket::regular(SubpacketData::IsPrimary(primary)))
    }

    pub fn add_trust(&mut self, level: u8, amount: u8) -> Result<()> {
        self.add_hashed_subpacket(Subpacket::regular(SubpacketData::TrustSignature(
            level, amount,
        )))
    }

    /// Closes the hashed area, fixing its length.
    pub fn end_hashed(&mut self) -> Result<()> {
        self.expect_state(&[CreateState::WritePreamble, CreateState::AddHashedSubpackets])?;

        let area = if self.version.is_legacy() {
            let Some(created) = self.created else {
                bail!("v3 signatures need a creation time");
            };
            ensure!(self.issuer.is_some(), "v3 signatures need an issuer");
            let mut area = vec![self.typ.into()];
            area.write_u32::<BigEndian>(time_to_u32(&created))?;
            area
        } else {
            let mut area = Vec::with_capacity(self.preamble.len() + 2 + self.hashed.len());
            area.extend_from_slice(&self.preamble);
            area.write_u16::<BigEndian>(self.hashed.len().try_into()?)?;
            area.extend_from_slice(&self.hashed);
            area
        };
        self.dump("hashed area", &area);
        self.hashed_area = Some(area.into());
        self.state = CreateState::EndHashed;

        Ok(())
    }

    /// Appends a subpacket to the unhashed area.
    pub fn add_unhashed_subpacket(&mut self, packet: Subpacket) -> Result<()> {
        self.expect_state(&[CreateState::EndHashed])?;
        ensure!(
            !self.version.is_legacy(),
            "v3 signatures have no unhashed subpackets"
        );
        self.unhashed_subpackets.push(packet);

        Ok(())
    }

    /// Hashes the hashed area and trailer, and signs the digest with `key`.
    pub fn finalize<F>(&mut self, key: &impl SigningKey, key_pw: F) -> Result<()>
    where
        F: FnOnce() -> String,
    {
        self.expect_state(&[CreateState::EndHashed])?;
        ensure_eq!(key.algorithm(), self.pub_alg, "signing key algorithm");

        let Some(hashed_area) = self.hashed_area.take() else {
            bail!("hashed area is not closed");
        };
        let config = SignatureConfig {
            version: self.version,
            typ: self.typ,
            pub_alg: self.pub_alg,
            hash_alg: self.hash_alg,
            hashed_subpackets: std::mem::take(&mut self.hashed_subpackets),
            unhashed_subpackets: std::mem::take(&mut self.unhashed_subpackets),
            created: self.created.filter(|_| self.version.is_legacy()),
            issuer: self.issuer.filter(|_| self.version.is_legacy()),
            hashed_area,
        };

        let Some(mut hasher) = self.hasher.take() else {
            bail!("hash context is not initialised");
        };
        config.hash_signature_data(&mut hasher)?;
        let digest = hasher.finalize();
        self.dump("digest", &digest);
        ensure!(digest.len() >= 2, "digest too short");

        let signed_hash_value = [digest[0], digest[1]];
        let signature = key.create_signature(key_pw, self.hash_alg, &digest)?;

        self.signature = Some(Signature {
            packet_version: self.packet_version,
            config,
            signed_hash_value,
            signature,
        });
        self.state = CreateState::Finalize;

        Ok(())
    }

    /// Emits the packet header and body.
    pub fn write<W: io::Write>(&mut self, writer: &mut W) -> Result<()> {
        self.expect_state(&[CreateState::Finalize])?;
        let Some(signature) = &self.signature else {
            bail!("no signature created");
        };
        signature.to_writer_with_header(writer)?;
        self.state = CreateState::Written;

        Ok(())
    }

    /// The finished signature.
    pub fn into_signature(self) -> Result<Signature> {
        self.expect_state(&[CreateState::Finalize, CreateState::Written])?;
        self.signature
            .ok_or_else(|| format_err!("no signature created"))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::packet::key::tests::{dsa_secret_key, rsa_secret_key};

    fn created() -> DateTime<Utc> {
        Utc.timestamp_opt(1_600_000_000, 0).unwrap()
    }

    #[test]
    fn test_out_of_order() {
        let mut creator = SignatureCreator::new(
            SignatureVersion::V4,
            SignatureType::Binary,
            PublicKeyAlgorithm::RSA,
            HashAlgorithm::Sha256,
        );

        assert!(matches!(
            creator.write_preamble(),
            Err(Error::CreateState {
                expected: "hash init",
                actual: "new"
            })
        ));
        assert!(creator.hash_data(b"x").is_err());

        creator.hash_init().unwrap();
        assert!(creator.hash_init().is_err());
        assert!(creator.end_hashed().is_err());
        creator.write_preamble().unwrap();
        creator.end_hashed().unwrap();
        assert!(creator.add_creation_time(created()).is_err());
        assert!(creator.into_signature().is_err());
    }

    #[test]
    fn test_hashed_area_layout() {
        let _ = pretty_env_logger::try_init();
        let key = rsa_secret_key(3);
        let id = key.key_id().unwrap();

        let mut creator = SignatureCreator::new(
            SignatureVersion::V4,
            SignatureType::Binary,
            PublicKeyAlgorithm::RSA,
            HashAlgorithm::Sha1,
        )
        .with_debug(DebugConfig::from_list("signature"));
        creator.hash_init().unwrap();
        creator.hash_data(b"hello world").unwrap();
        creator.write_preamble().unwrap();
        creator.add_creation_time(created()).unwrap();
        creator.add_issuer(id).unwrap();
        creator.end_hashed().unwrap();
        creator
            .add_unhashed_subpacket(Subpacket::regular(SubpacketData::SignersUserID(
                "me".into(),
            )))
            .unwrap();
        creator.finalize(&key, String::new).unwrap();

        let mut raw = Vec::new();
        creator.write(&mut raw).unwrap();
        assert_eq!(creator.state(), CreateState::Written);
        let sig = creator.into_signature().unwrap();

        let area = sig.config.hashed_area();
        assert_eq!(&area[..4], &[4, 0x00, 1, 2]);
        // creation time (6) + issuer (10)
        assert_eq!(&area[4..6], &[0, 16]);
        assert_eq!(area.len(), 6 + 16);
        assert_eq!(sig.config.trailer().unwrap(), [4, 0xff, 0, 0, 0, 22]);

        // the digest over data, hashed area and trailer
        let mut hashed = b"hello world".to_vec();
        hashed.extend_from_slice(area);
        hashed.extend_from_slice(&sig.config.trailer().unwrap());
        let digest = HashAlgorithm::Sha1.digest(&hashed).unwrap();
        assert_eq!(sig.signed_hash_value, [digest[0], digest[1]]);

        assert_eq!(raw.len(), sig.write_len_with_header());
        assert_eq!(raw[0], 0xc2);
        assert_eq!(sig.issuer(), Some(&id));
        assert_eq!(sig.created(), Some(&created()));
        assert!(sig.verify_data(&key, b"hello world").is_ok());
        assert!(sig.verify_data(&key, b"hello world!").is_err());
    }

    #[test]
    fn test_v3_signature() {
        let key = dsa_secret_key();
        let mut creator = SignatureCreator::new(
            SignatureVersion::V3,
            SignatureType::Text,
            PublicKeyAlgorithm::DSA,
            HashAlgorithm::Sha256,
        );
        creator.hash_init().unwrap();
        creator.hash_data(b"one\ntwo").unwrap();
        creator.write_preamble().unwrap();
        assert!(creator.add_trust(1, 60).is_err());
        creator.add_creation_time(created()).unwrap();
        creator.add_issuer(key.key_id().unwrap()).unwrap();
        creator.end_hashed().unwrap();
        creator.finalize(&key, String::new).unwrap();
        let sig = creator.into_signature().unwrap();

        assert_eq!(sig.config.hashed_area().len(), 5);
        assert!(sig.config.trailer().unwrap().is_empty());
        assert_eq!(sig.signature.len(), 2);
        assert!(sig.verify_data(&key, b"one\r\ntwo").is_ok());

        let raw = sig.to_bytes().unwrap();
        assert_eq!(raw.len(), sig.write_len());
        let back = Signature::from_buf(PacketHeaderVersion::New, &raw[..]).unwrap();
        assert_eq!(back, sig);
        assert!(back.verify_data(&key, b"one\ntwo").is_ok());
    }
}
