//! # Keyring
//!
//! An insertion ordered, in memory store of keys together with their user
//! ids, subkeys and signatures.

mod entry;

use std::io;

use bytes::Bytes;
use log::{debug, error, info, warn};
use regex::RegexBuilder;

pub use self::entry::{
    BoundSubkey, KeyEntry, KeyMaterial, Revocation, SigTarget, SignerKey, SubSig, SubkeyMaterial,
};

use crate::crypto::hash::HashAlgorithm;
use crate::errors::{ErrorCode, ErrorStack, Result};
use crate::packet::{Packet, PacketParser, PacketTrait, Signature, UserAttribute, UserId};
use crate::ser::Serialize;
use crate::types::KeyId;

/// A collection of [`KeyEntry`] values, in the order they were added.
///
/// Key ids and fingerprints are derived with the keyring's hash algorithm
/// when a key is added: SHA-1 for OpenPGP, MD5 for the SSH style variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyring {
    keys: Vec<KeyEntry>,
    hash_alg: HashAlgorithm,
}

impl Default for Keyring {
    fn default() -> Self {
        Keyring::new(HashAlgorithm::Sha1)
    }
}

impl Keyring {
    pub fn new(hash_alg: HashAlgorithm) -> Self {
        Keyring {
            keys: Vec::new(),
            hash_alg,
        }
    }

    /// Parses a keyring from a buffer of binary packets.
    ///
    /// Problems with single packets are recorded on `errors`, parsing
    /// continues with the next packet.
    pub fn from_bytes(hash_alg: HashAlgorithm, input: impl Into<Bytes>, errors: &mut ErrorStack) -> Self {
        let mut keyring = Keyring::new(hash_alg);
        let added = keyring.add_packets(PacketParser::new(input), errors);
        info!("read {} keys", added);
        keyring
    }

    pub fn hash_alg(&self) -> HashAlgorithm {
        self.hash_alg
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[KeyEntry] {
        &self.keys
    }

    pub fn get(&self, index: usize) -> Option<&KeyEntry> {
        self.keys.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, KeyEntry> {
        self.keys.iter()
    }

    fn last_mut(&mut self) -> Option<&mut KeyEntry> {
        let last = self.keys.last_mut();
        if last.is_none() {
            warn!("no key to attach to");
        }
        last
    }

    /// Appends a new primary key, deriving its id and fingerprint.
    ///
    /// Returns `None` if the key id can not be computed or memory for the
    /// entry can not be reserved.
    pub fn add_key(&mut self, key: impl Into<KeyMaterial>) -> Option<&mut KeyEntry> {
        let entry = match KeyEntry::new(key.into(), self.hash_alg) {
            Ok(entry) => entry,
            Err(err) => {
                error!("can not add key: {}", err);
                return None;
            }
        };
        if let Err(err) = self.keys.try_reserve(1) {
            error!("can not grow keyring: {}", err);
            return None;
        }
        self.keys.push(entry);
        self.keys.last_mut()
    }

    /// Attaches a subkey to the most recently added key.
    pub fn add_subkey(&mut self, subkey: impl Into<SubkeyMaterial>) -> bool {
        let hash_alg = self.hash_alg;
        let Some(entry) = self.last_mut() else {
            return false;
        };
        match entry.add_subkey(subkey.into(), hash_alg) {
            Ok(added) => added,
            Err(err) => {
                error!("can not add subkey: {}", err);
                false
            }
        }
    }

    /// Attaches a user id to the most recently added key.
    pub fn add_user_id(&mut self, id: UserId) -> bool {
        self.last_mut().is_some_and(|e| e.add_user_id(id))
    }

    /// Attaches a user attribute to the most recently added key.
    pub fn add_user_attribute(&mut self, attr: UserAttribute) -> bool {
        self.last_mut().is_some_and(|e| e.add_user_attribute(attr))
    }

    /// Attaches a signature to the most recently added key.
    pub fn add_signature(&mut self, sig: Signature) -> bool {
        self.last_mut().is_some_and(|e| e.add_signature(sig))
    }

    /// Stores a packet with the most recently added key without interpreting it.
    pub fn add_raw(&mut self, packet: Packet) -> bool {
        self.last_mut().is_some_and(|e| e.push_packet(packet))
    }

    /// Builds entries from a packet sequence. Returns the number of keys added.
    pub fn add_packets<I>(&mut self, packets: I, errors: &mut ErrorStack) -> usize
    where
        I: IntoIterator<Item = Result<Packet>>,
    {
        let mut added = 0;
        for packet in packets {
            let packet = match packet {
                Ok(packet) => packet,
                Err(err) => {
                    push_error!(errors, err.code(), "reading keyring: {}", err);
                    continue;
                }
            };

            let ok = match packet {
                Packet::PublicKey(key) => {
                    let ok = self.add_key(key).is_some();
                    added += usize::from(ok);
                    ok
                }
                Packet::SecretKey(key) => {
                    let ok = self.add_key(key).is_some();
                    added += usize::from(ok);
                    ok
                }
                Packet::PublicSubkey(key) => self.add_subkey(key),
                Packet::SecretSubkey(key) => self.add_subkey(key),
                Packet::UserId(id) => self.add_user_id(id),
                Packet::UserAttribute(attr) => self.add_user_attribute(attr),
                Packet::Signature(sig) => self.add_signature(sig),
                Packet::Trust(_) => self.add_raw(packet),
                other => {
                    debug!("ignoring {:?} in keyring", other.tag());
                    push_error!(errors, ErrorCode::BadFormat, "unexpected packet {:?} in keyring", other.tag());
                    continue;
                }
            };
            if !ok {
                push_error!(errors, ErrorCode::OutOfMemory, "packet dropped from keyring");
            }
        }

        added
    }

    /// Finds the next key at or after `from` whose primary or subkey id
    /// matches `id`, either all 8 octets or the low 4.
    ///
    /// Returns the index of the match; continue with `index + 1` to
    /// enumerate every key sharing a short id.
    pub fn lookup_by_keyid(&self, id: &[u8], from: usize) -> Option<(usize, &KeyEntry)> {
        self.keys
            .iter()
            .enumerate()
            .skip(from)
            .find(|(_, entry)| entry.matches_key_id(id))
    }

    /// All keys matching `id`, in keyring order.
    pub fn lookup_all_by_keyid<'a>(&'a self, id: &'a [u8]) -> impl Iterator<Item = &'a KeyEntry> + 'a {
        self.keys.iter().filter(move |entry| entry.matches_key_id(id))
    }

    /// Looks up a key by a hex key id, or else by the first user id the
    /// case insensitive regular expression `name` matches.
    pub fn lookup_by_name(&self, name: &str) -> Result<Option<&KeyEntry>> {
        let trimmed = name.trim();
        let hex_id = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        if let Ok(raw) = hex::decode(hex_id) {
            if let Some((_, entry)) = self.lookup_by_keyid(&raw, 0) {
                return Ok(Some(entry));
            }
        }

        let re = RegexBuilder::new(name).case_insensitive(true).build()?;
        let found = self.keys.iter().find(|entry| {
            entry
                .user_ids()
                .iter()
                .any(|id| re.is_match(&String::from_utf8_lossy(id.id())))
        });
        Ok(found)
    }

    /// Resolves the key that made a signature with issuer `id`: a bound
    /// subkey if one has that id, otherwise a primary key.
    pub fn find_signer(&self, id: &KeyId) -> Option<(&KeyEntry, SignerKey<'_>)> {
        let (_, entry) = self.lookup_by_keyid(id.as_ref(), 0)?;
        let key = match entry.subkey(id) {
            Some(sub) => SignerKey::Subkey(sub.public_key()),
            None => SignerKey::Primary(entry.public_key()),
        };
        Some((entry, key))
    }
}

impl Serialize for Keyring {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        for entry in &self.keys {
            entry.to_writer(writer)?;
        }
        Ok(())
    }

    fn write_len(&self) -> usize {
        self.keys.iter().map(|e| e.write_len()).sum()
    }
}

impl<'a> IntoIterator for &'a Keyring {
    type Item = &'a KeyEntry;
    type IntoIter = std::slice::Iter<'a, KeyEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.keys.iter()
    }
}
