use byteorder::{BigEndian, WriteBytesExt};
use digest::DynDigest;
use log::debug;

use crate::crypto::hash::WriteHasher;
use crate::errors::{Error, Result};
use crate::packet::signature::{Signature, SignatureConfig, SignatureType, SignatureVersion};
use crate::packet::{UserAttribute, UserId};
use crate::types::KeyDetails;
use crate::util::normalize_crlf;

/// Hashes a key in its `0x99` prefixed form.
pub(crate) fn hash_key(hasher: &mut Box<dyn DynDigest>, key: &impl KeyDetails) -> Result<()> {
    key.serialize_for_hashing(&mut WriteHasher(hasher))
}

pub(crate) fn hash_user_id(hasher: &mut Box<dyn DynDigest>, id: &UserId) -> Result<()> {
    let mut prefix = vec![0xb4];
    prefix.write_u32::<BigEndian>(id.id().len().try_into()?)?;
    hasher.update(&prefix);
    hasher.update(id.id());
    Ok(())
}

pub(crate) fn hash_user_attribute(
    hasher: &mut Box<dyn DynDigest>,
    attr: &UserAttribute,
) -> Result<()> {
    let mut prefix = vec![0xd1];
    prefix.write_u32::<BigEndian>(attr.data().len().try_into()?)?;
    hasher.update(&prefix);
    hasher.update(attr.data());
    Ok(())
}

/// Hashes document data, canonicalising line endings for text signatures.
pub(crate) fn hash_data(hasher: &mut Box<dyn DynDigest>, typ: SignatureType, data: &[u8]) {
    if typ == SignatureType::Text {
        hasher.update(&normalize_crlf(data));
    } else {
        hasher.update(data);
    }
}

impl SignatureConfig {
    /// The version specific trailer, appended after the hashed area.
    pub fn trailer(&self) -> Result<Vec<u8>> {
        match self.version {
            // the hashed area already is the type and creation time
            SignatureVersion::V2 | SignatureVersion::V3 => Ok(Vec::new()),
            SignatureVersion::V4 => {
                let mut trailer = vec![0x04, 0xFF];
                trailer.write_u32::<BigEndian>(self.hashed_area.len().try_into()?)?;
                Ok(trailer)
            }
            SignatureVersion::Other(v) => unsupported_err!("signature version {}", v),
        }
    }

    /// Feeds the hashed area and the trailer into `hasher`.
    pub(crate) fn hash_signature_data(&self, hasher: &mut Box<dyn DynDigest>) -> Result<()> {
        hasher.update(&self.hashed_area);
        hasher.update(&self.trailer()?);
        Ok(())
    }
}

impl Signature {
    fn new_hasher(&self) -> Result<Box<dyn DynDigest>> {
        self.config.hash_alg.new_hasher()
    }

    /// Completes the hash and checks the signature values against `signer`.
    fn verify_hashed(&self, signer: &impl KeyDetails, mut hasher: Box<dyn DynDigest>) -> Result<()> {
        ensure_eq!(
            signer.algorithm(),
            self.config.pub_alg,
            "signer algorithm does not match the signature"
        );

        self.config.hash_signature_data(&mut hasher)?;
        let digest = hasher.finalize();

        if digest.len() < 2 || digest[..2] != self.signed_hash_value {
            debug!(
                "signed hash value mismatch: {} != {}",
                hex::encode(&digest[..digest.len().min(2)]),
                hex::encode(self.signed_hash_value)
            );
            return Err(Error::InvalidSignature);
        }

        signer.verify_signature(self.config.hash_alg, &digest, &self.signature)
    }

    /// Verifies a certification of `id` on `key`, made by `signer`.
    pub fn verify_certification(
        &self,
        signer: &impl KeyDetails,
        key: &impl KeyDetails,
        id: &UserId,
    ) -> Result<()> {
        debug!("verifying certification {:?} of {}", self.typ(), id);
        ensure!(
            self.typ().is_certification(),
            "not a certification: {:?}",
            self.typ()
        );

        let mut hasher = self.new_hasher()?;
        hash_key(&mut hasher, key)?;
        hash_user_id(&mut hasher, id)?;
        self.verify_hashed(signer, hasher)
    }

    /// Verifies a certification of the user attribute `attr` on `key`.
    pub fn verify_user_attribute_certification(
        &self,
        signer: &impl KeyDetails,
        key: &impl KeyDetails,
        attr: &UserAttribute,
    ) -> Result<()> {
        ensure!(
            self.typ().is_certification(),
            "not a certification: {:?}",
            self.typ()
        );

        let mut hasher = self.new_hasher()?;
        hash_key(&mut hasher, key)?;
        hash_user_attribute(&mut hasher, attr)?;
        self.verify_hashed(signer, hasher)
    }

    /// Verifies a subkey binding, primary key binding or subkey revocation.
    pub fn verify_subkey_binding(
        &self,
        signer: &impl KeyDetails,
        key: &impl KeyDetails,
        subkey: &impl KeyDetails,
    ) -> Result<()> {
        ensure!(
            matches!(
                self.typ(),
                SignatureType::SubkeyBinding
                    | SignatureType::KeyBinding
                    | SignatureType::SubkeyRevocation
            ),
            "not a subkey binding: {:?}",
            self.typ()
        );

        let mut hasher = self.new_hasher()?;
        hash_key(&mut hasher, key)?;
        hash_key(&mut hasher, subkey)?;
        self.verify_hashed(signer, hasher)
    }

    /// Verifies a direct key signature or a key revocation.
    pub fn verify_key(&self, signer: &impl KeyDetails, key: &impl KeyDetails) -> Result<()> {
        ensure!(
            matches!(self.typ(), SignatureType::Key | SignatureType::KeyRevocation),
            "not a key signature: {:?}",
            self.typ()
        );

        let mut hasher = self.new_hasher()?;
        hash_key(&mut hasher, key)?;
        self.verify_hashed(signer, hasher)
    }

    /// Verifies a binary or text signature over `data`.
    pub fn verify_data(&self, signer: &impl KeyDetails, data: &[u8]) -> Result<()> {
        ensure!(
            matches!(self.typ(), SignatureType::Binary | SignatureType::Text),
            "not a document signature: {:?}",
            self.typ()
        );

        let mut hasher = self.new_hasher()?;
        hash_data(&mut hasher, self.typ(), data);
        self.verify_hashed(signer, hasher)
    }

    /// Verifies a standalone signature, which covers only its own subpackets.
    pub fn verify_standalone(&self, signer: &impl KeyDetails) -> Result<()> {
        ensure_eq!(self.typ(), SignatureType::Standalone, "not a standalone signature");

        let hasher = self.new_hasher()?;
        self.verify_hashed(signer, hasher)
    }
}
