use std::io;

use chrono::{DateTime, Utc};
use log::{debug, warn};

use crate::crypto::hash::HashAlgorithm;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::errors::Result;
use crate::packet::{
    Packet, PublicKey, PublicSubkey, SecretKey, SecretSubkey, Signature, SignatureType, UserAttribute,
    UserId,
};
use crate::ser::Serialize;
use crate::types::{Fingerprint, KeyDetails, KeyId, KeyVersion, PublicParams};

/// The primary key of a [`KeyEntry`].
#[derive(Debug, Clone, PartialEq, Eq, derive_more::From)]
pub enum KeyMaterial {
    Public(PublicKey),
    Secret(SecretKey),
}

impl KeyMaterial {
    pub fn is_secret(&self) -> bool {
        matches!(self, KeyMaterial::Secret(_))
    }

    pub fn public_key(&self) -> &PublicKey {
        match self {
            KeyMaterial::Public(key) => key,
            KeyMaterial::Secret(key) => key.public_key(),
        }
    }

    pub fn secret_key(&self) -> Option<&SecretKey> {
        match self {
            KeyMaterial::Public(_) => None,
            KeyMaterial::Secret(key) => Some(key),
        }
    }

    pub fn to_packet(&self) -> Packet {
        match self {
            KeyMaterial::Public(key) => key.clone().into(),
            KeyMaterial::Secret(key) => key.clone().into(),
        }
    }
}

/// The key material of a [`BoundSubkey`].
#[derive(Debug, Clone, PartialEq, Eq, derive_more::From)]
pub enum SubkeyMaterial {
    Public(PublicSubkey),
    Secret(SecretSubkey),
}

impl SubkeyMaterial {
    pub fn public_key(&self) -> &PublicSubkey {
        match self {
            SubkeyMaterial::Public(key) => key,
            SubkeyMaterial::Secret(key) => key.public_key(),
        }
    }

    pub fn secret_key(&self) -> Option<&SecretSubkey> {
        match self {
            SubkeyMaterial::Public(_) => None,
            SubkeyMaterial::Secret(key) => Some(key),
        }
    }
}

/// A subkey attached to a primary key, with its derived id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundSubkey {
    pub key: SubkeyMaterial,
    pub key_id: KeyId,
    pub fingerprint: Fingerprint,
}

impl BoundSubkey {
    pub fn public_key(&self) -> &PublicSubkey {
        self.key.public_key()
    }
}

/// What a stored signature is made over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SigTarget {
    /// The primary key alone: direct key signatures, key revocations, and
    /// certifications that arrived before any user id.
    Key,
    /// Index into [`KeyEntry::user_ids`].
    UserId(usize),
    /// Index into [`KeyEntry::user_attributes`].
    UserAttribute(usize),
    /// Index into [`KeyEntry::subkeys`].
    Subkey(usize),
}

/// A signature stored with a key, and the trust it conveys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubSig {
    pub target: SigTarget,
    pub signature: Signature,
    pub trust_level: u8,
    pub trust_amount: u8,
}

impl SubSig {
    /// The user id index this signature certifies, if any.
    pub fn user_id(&self) -> Option<usize> {
        match self.target {
            SigTarget::UserId(i) => Some(i),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revocation {
    /// [`SigTarget::Key`] revokes the whole key.
    pub target: SigTarget,
    pub code: u8,
    pub reason: String,
    pub created: Option<DateTime<Utc>>,
}

/// One slot of a [`Keyring`](crate::Keyring): a primary key and everything
/// attached to it, kept in parse order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEntry {
    key: KeyMaterial,
    key_id: KeyId,
    fingerprint: Fingerprint,
    user_ids: Vec<UserId>,
    user_attributes: Vec<UserAttribute>,
    /// Every packet after the primary key, as it arrived.
    packets: Vec<Packet>,
    subsigs: Vec<SubSig>,
    subkeys: Vec<BoundSubkey>,
    revocations: Vec<Revocation>,
    revoked: bool,
    primary_user_id: Option<usize>,
    /// The object signatures currently attach to.
    last_object: SigTarget,
}

impl KeyEntry {
    pub(crate) fn new(key: KeyMaterial, hash_alg: HashAlgorithm) -> Result<Self> {
        let public = key.public_key();
        let fingerprint = public.fingerprint_with(hash_alg)?;
        let key_id = public.key_id_with(hash_alg)?;
        debug!("new key entry {} ({})", key_id, fingerprint);

        Ok(KeyEntry {
            key,
            key_id,
            fingerprint,
            user_ids: Vec::new(),
            user_attributes: Vec::new(),
            packets: Vec::new(),
            subsigs: Vec::new(),
            subkeys: Vec::new(),
            revocations: Vec::new(),
            revoked: false,
            primary_user_id: None,
            last_object: SigTarget::Key,
        })
    }

    pub fn key(&self) -> &KeyMaterial {
        &self.key
    }

    pub fn public_key(&self) -> &PublicKey {
        self.key.public_key()
    }

    pub fn is_secret(&self) -> bool {
        self.key.is_secret()
    }

    pub fn key_id(&self) -> &KeyId {
        &self.key_id
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    pub fn user_ids(&self) -> &[UserId] {
        &self.user_ids
    }

    pub fn user_attributes(&self) -> &[UserAttribute] {
        &self.user_attributes
    }

    pub fn packets(&self) -> &[Packet] {
        &self.packets
    }

    pub fn subsigs(&self) -> &[SubSig] {
        &self.subsigs
    }

    pub fn subkeys(&self) -> &[BoundSubkey] {
        &self.subkeys
    }

    pub fn revocations(&self) -> &[Revocation] {
        &self.revocations
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked
    }

    /// The user id flagged primary by a self signature, otherwise the first one.
    pub fn primary_user_id(&self) -> Option<&UserId> {
        self.primary_user_id
            .and_then(|i| self.user_ids.get(i))
            .or_else(|| self.user_ids.first())
    }

    /// Does `id` (8 octets, or the low 4 octets) name this key or one of its subkeys.
    pub fn matches_key_id(&self, id: &[u8]) -> bool {
        self.key_id.matches(id) || self.subkeys.iter().any(|s| s.key_id.matches(id))
    }

    /// The subkey with the given full id.
    pub fn subkey(&self, id: &KeyId) -> Option<&BoundSubkey> {
        self.subkeys.iter().find(|s| &s.key_id == id)
    }

    /// The first subkey that can encrypt, falling back to the primary key.
    pub fn encryption_key_id(&self) -> Option<&KeyId> {
        self.subkeys
            .iter()
            .find(|s| s.public_key().algorithm().can_encrypt())
            .map(|s| &s.key_id)
            .or_else(|| {
                self.public_key()
                    .algorithm()
                    .can_encrypt()
                    .then_some(&self.key_id)
            })
    }

    pub(crate) fn push_packet(&mut self, packet: Packet) -> bool {
        if let Err(err) = self.packets.try_reserve(1) {
            log::error!("key {}: can not store packet: {}", self.key_id, err);
            return false;
        }
        self.packets.push(packet);
        true
    }

    pub(crate) fn add_subkey(&mut self, key: SubkeyMaterial, hash_alg: HashAlgorithm) -> Result<bool> {
        let public = key.public_key();
        let bound = BoundSubkey {
            key_id: public.key_id_with(hash_alg)?,
            fingerprint: public.fingerprint_with(hash_alg)?,
            key,
        };
        if self.subkeys.try_reserve(1).is_err() {
            log::error!("key {}: can not store subkey {}", self.key_id, bound.key_id);
            return Ok(false);
        }
        let packet = match &bound.key {
            SubkeyMaterial::Public(k) => k.clone().into(),
            SubkeyMaterial::Secret(k) => k.clone().into(),
        };
        debug!("key {}: subkey {}", self.key_id, bound.key_id);
        self.subkeys.push(bound);
        self.last_object = SigTarget::Subkey(self.subkeys.len() - 1);

        Ok(self.push_packet(packet))
    }

    pub(crate) fn add_user_id(&mut self, id: UserId) -> bool {
        if self.user_ids.try_reserve(1).is_err() {
            log::error!("key {}: can not store user id", self.key_id);
            return false;
        }
        self.user_ids.push(id.clone());
        self.last_object = SigTarget::UserId(self.user_ids.len() - 1);

        self.push_packet(id.into())
    }

    pub(crate) fn add_user_attribute(&mut self, attr: UserAttribute) -> bool {
        if self.user_attributes.try_reserve(1).is_err() {
            log::error!("key {}: can not store user attribute", self.key_id);
            return false;
        }
        self.user_attributes.push(attr.clone());
        self.last_object = SigTarget::UserAttribute(self.user_attributes.len() - 1);

        self.push_packet(attr.into())
    }

    /// Stores a signature against the object it covers.
    pub(crate) fn add_signature(&mut self, signature: Signature) -> bool {
        let typ = signature.typ();
        let target = match typ {
            t if t.is_certification() => self.last_object,
            SignatureType::SubkeyBinding | SignatureType::SubkeyRevocation => self.last_object,
            _ => SigTarget::Key,
        };
        if typ.is_certification() && matches!(target, SigTarget::Key | SigTarget::Subkey(_)) {
            warn!("key {}: certification without a user id", self.key_id);
        }

        if typ.is_revocation() {
            let (code, reason) = signature
                .revocation_reason()
                .map(|(c, r)| (c, String::from_utf8_lossy(r).into_owned()))
                .unwrap_or_default();
            if typ == SignatureType::KeyRevocation {
                self.revoked = true;
            }
            if self.revocations.try_reserve(1).is_err() {
                log::error!("key {}: can not store revocation", self.key_id);
                return false;
            }
            self.revocations.push(Revocation {
                target,
                code,
                reason,
                created: signature.created().copied(),
            });
        }

        if let SigTarget::UserId(i) = target {
            let self_signed = signature.issuer() == Some(&self.key_id);
            if typ.is_certification() && !typ.is_revocation() && self_signed && signature.is_primary() {
                self.primary_user_id = Some(i);
            }
        }

        let (trust_level, trust_amount) = signature.trust_signature().unwrap_or_default();
        if self.subsigs.try_reserve(1).is_err() {
            log::error!("key {}: can not store signature", self.key_id);
            return false;
        }
        self.subsigs.push(SubSig {
            target,
            signature: signature.clone(),
            trust_level,
            trust_amount,
        });

        self.push_packet(signature.into())
    }

    /// The entry as a packet sequence: the primary key, then everything else in parse order.
    pub fn to_packets(&self) -> Vec<Packet> {
        std::iter::once(self.key.to_packet())
            .chain(self.packets.iter().cloned())
            .collect()
    }

    /// Short human readable summary, one line per user id and subkey.
    pub fn describe(&self) -> String {
        let key = self.public_key();
        let mut out = format!(
            "{} {}/{} {} {}",
            if self.is_secret() { "sec" } else { "pub" },
            key.public_params().bits(),
            algorithm_name(key.algorithm()),
            self.key_id,
            key.created_at().format("%Y-%m-%d"),
        );
        if self.revoked {
            out.push_str(" [REVOKED]");
        }
        out.push_str(&format!("\nKey fingerprint: {}", self.fingerprint));
        for id in &self.user_ids {
            out.push_str(&format!("\nuid              {}", id));
        }
        for sub in &self.subkeys {
            let key = sub.public_key();
            out.push_str(&format!(
                "\nsub {}/{} {} {}",
                key.public_params().bits(),
                algorithm_name(key.algorithm()),
                sub.key_id,
                key.created_at().format("%Y-%m-%d"),
            ));
        }
        out
    }
}

impl Serialize for KeyEntry {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        self.key.to_packet().to_writer(writer)?;
        for packet in &self.packets {
            packet.to_writer(writer)?;
        }
        Ok(())
    }

    fn write_len(&self) -> usize {
        self.key.to_packet().write_len() + self.packets.iter().map(|p| p.write_len()).sum::<usize>()
    }
}

fn algorithm_name(alg: PublicKeyAlgorithm) -> &'static str {
    match alg {
        PublicKeyAlgorithm::RSA | PublicKeyAlgorithm::RSAEncrypt | PublicKeyAlgorithm::RSASign => {
            "RSA"
        }
        PublicKeyAlgorithm::DSA => "DSA",
        PublicKeyAlgorithm::Elgamal => "Elgamal",
        _ => "unknown",
    }
}

/// The key a signature resolves to: a primary key or one of its subkeys.
#[derive(Debug, Clone, Copy)]
pub enum SignerKey<'a> {
    Primary(&'a PublicKey),
    Subkey(&'a PublicSubkey),
}

impl KeyDetails for SignerKey<'_> {
    fn version(&self) -> KeyVersion {
        match self {
            SignerKey::Primary(k) => k.version(),
            SignerKey::Subkey(k) => k.version(),
        }
    }

    fn algorithm(&self) -> PublicKeyAlgorithm {
        match self {
            SignerKey::Primary(k) => k.algorithm(),
            SignerKey::Subkey(k) => k.algorithm(),
        }
    }

    fn created_at(&self) -> &DateTime<Utc> {
        match self {
            SignerKey::Primary(k) => k.created_at(),
            SignerKey::Subkey(k) => k.created_at(),
        }
    }

    fn expiration(&self) -> Option<u16> {
        match self {
            SignerKey::Primary(k) => k.expiration(),
            SignerKey::Subkey(k) => k.expiration(),
        }
    }

    fn public_params(&self) -> &PublicParams {
        match self {
            SignerKey::Primary(k) => k.public_params(),
            SignerKey::Subkey(k) => k.public_params(),
        }
    }
}
