use std::io;

use bytes::Buf;
use chrono::{DateTime, SubsecRound, Utc};
use log::debug;
use rand::{CryptoRng, Rng};
use zeroize::Zeroizing;

use crate::crypto::hash::HashAlgorithm;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::crypto::rsa;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::Result;
use crate::packet::{
    PacketTrait, PublicKey, PublicKeyEncryptedSessionKey, PublicSubkey, Signature,
    SignatureCreator, SignatureType, SignatureVersion, Subpacket, SubpacketData, UserId,
};
use crate::ser::Serialize;
use crate::types::{
    KeyDetails, KeyVersion, Mpi, PacketHeaderVersion, PlainSecretParams, PublicParams,
    S2kParams, SecretParams, SigningKey, Tag,
};

/// Secret Key Packet
/// <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.5.1.3>
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct SecretKey(SecretKeyInner<PublicKey>);

/// Secret Subkey Packet
/// <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.5.1.4>
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct SecretSubkey(SecretKeyInner<PublicSubkey>);

#[derive(Debug, PartialEq, Eq, Clone)]
struct SecretKeyInner<D> {
    details: D,
    secret_params: SecretParams,
}

impl<D: KeyDetails> SecretKeyInner<D> {
    fn new(details: D, secret_params: SecretParams) -> Result<Self> {
        if let SecretParams::Plain(plain) = &secret_params {
            ensure!(
                plain.matches(details.public_params()),
                "secret key material does not match the public key"
            );
        }

        Ok(SecretKeyInner {
            details,
            secret_params,
        })
    }

    /// Decrypts the secret material in place.
    fn remove_password<P>(&mut self, password: P) -> Result<()>
    where
        P: FnOnce() -> String,
    {
        if let SecretParams::Encrypted(_) = &self.secret_params {
            let unlocked = self.unlocked(password)?;
            self.secret_params = SecretParams::Plain(unlocked);
        }

        Ok(())
    }

    fn set_password<P, R>(&mut self, rng: R, password: P) -> Result<()>
    where
        P: FnOnce() -> String,
        R: Rng + CryptoRng,
    {
        let s2k = S2kParams::new_default(rng);
        self.set_password_with_s2k(password, s2k)
    }

    fn set_password_with_s2k<P>(&mut self, password: P, s2k_params: S2kParams) -> Result<()>
    where
        P: FnOnce() -> String,
    {
        let SecretParams::Plain(plain) = &self.secret_params else {
            bail!("Secret Key packet must be unlocked");
        };
        ensure!(
            !self.details.version().is_legacy(),
            "protecting v{} secret keys is not supported",
            u8::from(self.details.version())
        );

        let password = Zeroizing::new(password());
        self.secret_params =
            SecretParams::Encrypted(plain.encrypt(password.as_bytes(), s2k_params)?);

        Ok(())
    }

    /// The plain secret material, decrypting a copy if needed.
    fn unlocked<P>(&self, password: P) -> Result<PlainSecretParams>
    where
        P: FnOnce() -> String,
    {
        match &self.secret_params {
            SecretParams::Plain(plain) => Ok(plain.clone()),
            SecretParams::Encrypted(enc) => {
                ensure!(
                    !self.details.version().is_legacy(),
                    "v{} secret key protection is not supported",
                    u8::from(self.details.version())
                );
                let password = Zeroizing::new(password());
                let plain = enc.unlock(password.as_bytes(), self.details.algorithm())?;
                ensure!(
                    plain.matches(self.details.public_params()),
                    "secret key material does not match the public key"
                );
                Ok(plain)
            }
        }
    }

    fn create_signature<F>(&self, key_pw: F, hash: HashAlgorithm, digest: &[u8]) -> Result<Vec<Mpi>>
    where
        F: FnOnce() -> String,
    {
        ensure!(
            self.details.algorithm().can_sign(),
            "algorithm {:?} can not sign",
            self.details.algorithm()
        );
        let plain = self.unlocked(key_pw)?;
        plain.sign(self.details.public_params(), hash, digest)
    }

    fn decrypt_session_key<F>(
        &self,
        pkesk: &PublicKeyEncryptedSessionKey,
        key_pw: F,
    ) -> Result<(SymmetricKeyAlgorithm, Zeroizing<Vec<u8>>)>
    where
        F: FnOnce() -> String,
    {
        ensure_eq!(
            pkesk.algorithm(),
            self.details.algorithm(),
            "session key algorithm"
        );
        let plain = self.unlocked(key_pw)?;
        pkesk.decrypt(&self.details, &plain)
    }

    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        self.details.to_writer_body(writer)?;
        self.secret_params.to_writer(writer)?;
        Ok(())
    }

    fn write_len(&self) -> usize {
        self.details.body_len() + self.secret_params.write_len()
    }
}

impl SecretKey {
    pub fn new(details: PublicKey, secret_params: SecretParams) -> Result<Self> {
        SecretKeyInner::new(details, secret_params).map(Self)
    }

    /// Parses a `SecretKey` packet body.
    pub fn from_buf<B: Buf>(packet_version: PacketHeaderVersion, mut i: B) -> Result<Self> {
        let details = PublicKey::from_buf_prefix(packet_version, &mut i)?;
        let secret_params = SecretParams::from_buf(details.algorithm(), &mut i)?;
        Self::new(details, secret_params)
    }

    /// Generates a new v4 RSA key.
    pub fn generate_rsa<R: Rng + CryptoRng>(
        rng: &mut R,
        bits: usize,
        created: DateTime<Utc>,
    ) -> Result<Self> {
        debug!("generating {} bit RSA key", bits);
        let (public, secret) = rsa::generate_key(rng, bits)?;
        let details = PublicKey::new(
            PacketHeaderVersion::New,
            KeyVersion::V4,
            PublicKeyAlgorithm::RSA,
            created.trunc_subsecs(0),
            None,
            PublicParams::RSA(public),
        )?;

        Self::new(
            details,
            SecretParams::Plain(PlainSecretParams::RSA(secret)),
        )
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.0.details
    }

    pub fn secret_params(&self) -> &SecretParams {
        &self.0.secret_params
    }

    pub fn is_locked(&self) -> bool {
        self.0.secret_params.is_encrypted()
    }

    /// Removes the passphrase protection.
    pub fn unlock<F>(&mut self, password: F) -> Result<()>
    where
        F: FnOnce() -> String,
    {
        self.0.remove_password(password)
    }

    /// Protects the secret material with a passphrase, using the default S2K settings.
    pub fn lock<R, F>(&mut self, rng: R, password: F) -> Result<()>
    where
        R: Rng + CryptoRng,
        F: FnOnce() -> String,
    {
        self.0.set_password(rng, password)
    }

    pub fn lock_with_s2k<F>(&mut self, password: F, s2k_params: S2kParams) -> Result<()>
    where
        F: FnOnce() -> String,
    {
        self.0.set_password_with_s2k(password, s2k_params)
    }

    pub fn decrypt_session_key<F>(
        &self,
        pkesk: &PublicKeyEncryptedSessionKey,
        key_pw: F,
    ) -> Result<(SymmetricKeyAlgorithm, Zeroizing<Vec<u8>>)>
    where
        F: FnOnce() -> String,
    {
        self.0.decrypt_session_key(pkesk, key_pw)
    }

    /// Runs the signature creation steps, hashing the signed objects with `hash_objects`.
    fn create<F, H>(
        &self,
        typ: SignatureType,
        hash: HashAlgorithm,
        key_pw: F,
        subpackets: Vec<SubpacketData>,
        hash_objects: H,
    ) -> Result<Signature>
    where
        F: FnOnce() -> String,
        H: FnOnce(&mut SignatureCreator) -> Result<()>,
    {
        let mut creator =
            SignatureCreator::new(SignatureVersion::V4, typ, self.algorithm(), hash);
        creator.hash_init()?;
        hash_objects(&mut creator)?;
        creator.write_preamble()?;
        creator.add_creation_time(Utc::now())?;
        creator.add_issuer(self.key_id()?)?;
        for data in subpackets {
            creator.add_hashed_subpacket(Subpacket::regular(data))?;
        }
        creator.end_hashed()?;
        creator.finalize(self, key_pw)?;

        creator.into_signature()
    }

    /// Self certifies `id`, marking it as the primary user id.
    pub fn sign_user_id<F>(&self, id: &UserId, hash: HashAlgorithm, key_pw: F) -> Result<Signature>
    where
        F: FnOnce() -> String,
    {
        self.create(
            SignatureType::CertPositive,
            hash,
            key_pw,
            vec![SubpacketData::IsPrimary(true)],
            |c| {
                c.hash_key(self.public_key())?;
                c.hash_user_id(id)
            },
        )
    }

    /// Certifies the binding of `id` to someone else's `key`.
    pub fn certify_user_id<F>(
        &self,
        key: &impl KeyDetails,
        id: &UserId,
        hash: HashAlgorithm,
        key_pw: F,
    ) -> Result<Signature>
    where
        F: FnOnce() -> String,
    {
        self.create(SignatureType::CertGeneric, hash, key_pw, vec![], |c| {
            c.hash_key(key)?;
            c.hash_user_id(id)
        })
    }

    /// Binds `subkey` to this key.
    pub fn sign_subkey<F>(
        &self,
        subkey: &impl KeyDetails,
        hash: HashAlgorithm,
        key_pw: F,
    ) -> Result<Signature>
    where
        F: FnOnce() -> String,
    {
        self.create(SignatureType::SubkeyBinding, hash, key_pw, vec![], |c| {
            c.hash_key(self.public_key())?;
            c.hash_key(subkey)
        })
    }

    /// Creates a direct key signature over `key`.
    pub fn sign_key<F>(&self, key: &impl KeyDetails, hash: HashAlgorithm, key_pw: F) -> Result<Signature>
    where
        F: FnOnce() -> String,
    {
        self.create(SignatureType::Key, hash, key_pw, vec![], |c| c.hash_key(key))
    }

    /// Revokes this key.
    pub fn revoke_key<F>(
        &self,
        code: u8,
        reason: &[u8],
        hash: HashAlgorithm,
        key_pw: F,
    ) -> Result<Signature>
    where
        F: FnOnce() -> String,
    {
        self.create(
            SignatureType::KeyRevocation,
            hash,
            key_pw,
            vec![SubpacketData::RevocationReason(
                code,
                bytes::Bytes::copy_from_slice(reason),
            )],
            |c| c.hash_key(self.public_key()),
        )
    }

    /// Signs a binary document.
    pub fn sign_data<F>(&self, data: &[u8], hash: HashAlgorithm, key_pw: F) -> Result<Signature>
    where
        F: FnOnce() -> String,
    {
        self.create(SignatureType::Binary, hash, key_pw, vec![], |c| c.hash_data(data))
    }

    /// Signs a text document, line endings are canonicalised first.
    pub fn sign_text<F>(&self, text: &[u8], hash: HashAlgorithm, key_pw: F) -> Result<Signature>
    where
        F: FnOnce() -> String,
    {
        self.create(SignatureType::Text, hash, key_pw, vec![], |c| c.hash_data(text))
    }
}

impl SecretSubkey {
    pub fn new(details: PublicSubkey, secret_params: SecretParams) -> Result<Self> {
        SecretKeyInner::new(details, secret_params).map(Self)
    }

    /// Parses a `SecretSubkey` packet body.
    pub fn from_buf<B: Buf>(packet_version: PacketHeaderVersion, mut i: B) -> Result<Self> {
        let details = PublicSubkey::new(PublicKey::from_buf_prefix(packet_version, &mut i)?);
        let secret_params = SecretParams::from_buf(details.algorithm(), &mut i)?;
        Self::new(details, secret_params)
    }

    pub fn public_key(&self) -> &PublicSubkey {
        &self.0.details
    }

    pub fn secret_params(&self) -> &SecretParams {
        &self.0.secret_params
    }

    pub fn unlock<F>(&mut self, password: F) -> Result<()>
    where
        F: FnOnce() -> String,
    {
        self.0.remove_password(password)
    }

    pub fn lock<R, F>(&mut self, rng: R, password: F) -> Result<()>
    where
        R: Rng + CryptoRng,
        F: FnOnce() -> String,
    {
        self.0.set_password(rng, password)
    }

    pub fn decrypt_session_key<F>(
        &self,
        pkesk: &PublicKeyEncryptedSessionKey,
        key_pw: F,
    ) -> Result<(SymmetricKeyAlgorithm, Zeroizing<Vec<u8>>)>
    where
        F: FnOnce() -> String,
    {
        self.0.decrypt_session_key(pkesk, key_pw)
    }
}

macro_rules! impl_key_details {
    ($name:ident) => {
        impl KeyDetails for $name {
            fn version(&self) -> KeyVersion {
                self.0.details.version()
            }

            fn algorithm(&self) -> PublicKeyAlgorithm {
                self.0.details.algorithm()
            }

            fn created_at(&self) -> &DateTime<Utc> {
                self.0.details.created_at()
            }

            fn expiration(&self) -> Option<u16> {
                self.0.details.expiration()
            }

            fn public_params(&self) -> &PublicParams {
                self.0.details.public_params()
            }
        }

        impl SigningKey for $name {
            fn create_signature<F>(
                &self,
                key_pw: F,
                hash: HashAlgorithm,
                digest: &[u8],
            ) -> Result<Vec<Mpi>>
            where
                F: FnOnce() -> String,
            {
                self.0.create_signature(key_pw, hash, digest)
            }
        }

        impl Serialize for $name {
            fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
                self.0.to_writer(writer)
            }

            fn write_len(&self) -> usize {
                self.0.write_len()
            }
        }
    };
}

impl_key_details!(SecretKey);
impl_key_details!(SecretSubkey);

impl PacketTrait for SecretKey {
    fn packet_version(&self) -> PacketHeaderVersion {
        self.0.details.packet_version()
    }

    fn tag(&self) -> Tag {
        Tag::SecretKey
    }
}

impl PacketTrait for SecretSubkey {
    fn packet_version(&self) -> PacketHeaderVersion {
        self.0.details.packet_version()
    }

    fn tag(&self) -> Tag {
        Tag::SecretSubkey
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::errors::Error;
    use crate::packet::key::tests::{dsa_secret_key, rsa_secret_key};

    #[test]
    fn test_generate_rsa() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let created = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let key = SecretKey::generate_rsa(&mut rng, 1024, created).unwrap();

        assert_eq!(key.algorithm(), PublicKeyAlgorithm::RSA);
        assert_eq!(key.version(), KeyVersion::V4);
        assert_eq!(key.created_at(), &created);
        assert_eq!(key.public_params().bits(), 1024);
        assert_eq!(key.key_id().unwrap(), key.public_key().key_id().unwrap());
    }

    #[test]
    fn test_secret_key_packet_roundtrip() {
        let key = dsa_secret_key();
        let raw = key.to_bytes().unwrap();
        assert_eq!(raw.len(), key.write_len());

        let back = SecretKey::from_buf(PacketHeaderVersion::New, &raw[..]).unwrap();
        assert_eq!(back, key);
        assert_eq!(
            &back.public_key().to_bytes().unwrap()[..],
            &raw[..key.public_key().write_len()]
        );
    }

    #[test]
    fn test_lock_unlock() {
        let _ = pretty_env_logger::try_init();
        let mut rng = ChaCha8Rng::seed_from_u64(12);
        let original = rsa_secret_key(5);
        let mut key = original.clone();

        key.lock(&mut rng, || "hunter2".to_string()).unwrap();
        assert!(key.is_locked());
        assert!(key.lock(&mut rng, || "again".to_string()).is_err());

        // locked keys sign after asking for the passphrase
        let sig = key
            .sign_data(b"data", HashAlgorithm::Sha256, || "hunter2".to_string())
            .unwrap();
        assert!(sig.verify_data(&original, b"data").is_ok());
        assert!(matches!(
            key.sign_data(b"data", HashAlgorithm::Sha256, || "wrong".to_string()),
            Err(Error::InvalidPassphrase)
        ));

        let raw = key.to_bytes().unwrap();
        let mut back = SecretKey::from_buf(PacketHeaderVersion::New, &raw[..]).unwrap();
        assert!(back.is_locked());
        assert!(back.unlock(|| "wrong".to_string()).is_err());
        back.unlock(|| "hunter2".to_string()).unwrap();
        assert_eq!(back, original);
    }

    #[test]
    fn test_subkey_binding() {
        let key = rsa_secret_key(5);
        let sub = SecretSubkey::new(
            PublicSubkey::new(rsa_secret_key(6).public_key().clone()),
            rsa_secret_key(6).secret_params().clone(),
        )
        .unwrap();

        let sig = key
            .sign_subkey(sub.public_key(), HashAlgorithm::Sha1, String::new)
            .unwrap();
        assert!(sig
            .verify_subkey_binding(&key, key.public_key(), sub.public_key())
            .is_ok());
        assert!(sig
            .verify_subkey_binding(&key, key.public_key(), key.public_key())
            .is_err());

        let raw = sub.to_bytes().unwrap();
        let back = SecretSubkey::from_buf(PacketHeaderVersion::New, &raw[..]).unwrap();
        assert_eq!(back, sub);
    }

    #[test]
    fn test_revocation_and_direct_key() {
        let key = rsa_secret_key(5);
        let rev = key
            .revoke_key(2, b"compromised", HashAlgorithm::Sha256, String::new)
            .unwrap();
        assert_eq!(rev.typ(), SignatureType::KeyRevocation);
        assert_eq!(rev.revocation_reason(), Some((2, &b"compromised"[..])));
        assert!(rev.verify_key(&key, key.public_key()).is_ok());

        let direct = key.sign_key(key.public_key(), HashAlgorithm::Sha256, String::new).unwrap();
        assert!(direct.verify_key(&key, key.public_key()).is_ok());
        assert!(direct.verify_key(&key, dsa_secret_key().public_key()).is_err());
    }

    #[test]
    fn test_mismatched_material() {
        let rsa = rsa_secret_key(5);
        assert!(SecretKey::new(
            rsa_secret_key(6).public_key().clone(),
            rsa.secret_params().clone()
        )
        .is_ok());
        assert!(SecretKey::new(
            dsa_secret_key().public_key().clone(),
            rsa.secret_params().clone()
        )
        .is_err());
    }
}
