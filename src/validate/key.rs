use log::{debug, info, warn};

use crate::errors::{Error, ErrorCode, ErrorStack, Result};
use crate::keyring::{KeyEntry, Keyring};
use crate::packet::{Packet, PacketTrait, PublicKey, PublicSubkey, Signature, SignatureType, Trust, UserAttribute, UserId};
use crate::validate::{drive, Flow, PacketHandler, ValidationOptions, ValidationResult};

/// The object certifications apply to.
#[derive(Debug, Clone)]
enum SignedObject {
    UserId(UserId),
    UserAttribute(UserAttribute),
}

/// Validates the signatures of a single transferable key.
///
/// Feed it the key's packets in order: the primary key, then user ids,
/// attributes, subkeys and the signatures following each of them.
#[derive(Debug)]
pub struct KeyValidator<'a> {
    keyring: &'a Keyring,
    options: &'a ValidationOptions,
    primary: Option<PublicKey>,
    subkey: Option<PublicSubkey>,
    last_object: Option<SignedObject>,
    last_trust: Option<Trust>,
    result: ValidationResult,
    errors: ErrorStack,
}

impl<'a> KeyValidator<'a> {
    pub fn new(keyring: &'a Keyring, options: &'a ValidationOptions) -> Self {
        KeyValidator {
            keyring,
            options,
            primary: None,
            subkey: None,
            last_object: None,
            last_trust: None,
            result: ValidationResult::default(),
            errors: ErrorStack::new(),
        }
    }

    pub fn result(&self) -> &ValidationResult {
        &self.result
    }

    /// The trust packet seen last. It never influences the outcome.
    pub fn last_trust(&self) -> Option<&Trust> {
        self.last_trust.as_ref()
    }

    pub fn finish(self) -> (ValidationResult, ErrorStack) {
        (self.result, self.errors)
    }

    fn capture_primary(&mut self, key: PublicKey) -> Flow {
        if self.primary.is_some() {
            push_error!(self.errors, ErrorCode::Validation, "second primary key in a key pass");
            return Flow::Finished;
        }
        self.primary = Some(key);
        Flow::Continue
    }

    fn check_signature(&mut self, sig: &Signature) -> Flow {
        let info = sig.info();
        let Some(issuer) = sig.issuer() else {
            debug!("signature without issuer");
            self.result.add_unknown(info);
            return Flow::Continue;
        };
        let Some((_, signer)) = self.keyring.find_signer(issuer) else {
            debug!("signer {} not in keyring", issuer);
            self.result.add_unknown(info);
            return Flow::Continue;
        };
        let Some(primary) = &self.primary else {
            push_error!(self.errors, ErrorCode::UnexpectedSignature, "signature before any key");
            self.result.add_invalid(info);
            return Flow::Continue;
        };

        if self.options.debug().is_enabled("validate") {
            debug!(
                "{:?} by {}: hashed area {}",
                sig.typ(),
                issuer,
                hex::encode(sig.config.hashed_area())
            );
        }

        let outcome = match sig.typ() {
            typ if typ.is_certification() => match &self.last_object {
                Some(SignedObject::UserId(id)) => sig.verify_certification(&signer, primary, id),
                Some(SignedObject::UserAttribute(attr)) => {
                    sig.verify_user_attribute_certification(&signer, primary, attr)
                }
                None => {
                    push_error!(
                        self.errors,
                        ErrorCode::UnexpectedSignature,
                        "certification by {} without a user id",
                        issuer
                    );
                    Err(Error::InvalidSignature)
                }
            },
            SignatureType::SubkeyBinding
            | SignatureType::KeyBinding
            | SignatureType::SubkeyRevocation => match &self.subkey {
                Some(subkey) => sig.verify_subkey_binding(&signer, primary, subkey),
                None => {
                    push_error!(
                        self.errors,
                        ErrorCode::UnexpectedSignature,
                        "subkey binding by {} without a subkey",
                        issuer
                    );
                    Err(Error::InvalidSignature)
                }
            },
            SignatureType::Key | SignatureType::KeyRevocation => sig.verify_key(&signer, primary),
            typ => {
                push_error!(
                    self.errors,
                    ErrorCode::UnexpectedSignature,
                    "{:?} signature on a key",
                    typ
                );
                Err(Error::InvalidSignature)
            }
        };

        match outcome {
            Ok(()) => self.result.add_valid(info),
            Err(err) => {
                warn!("{:?} signature by {} is invalid: {}", sig.typ(), issuer, err);
                self.result.add_invalid(info);
            }
        }

        Flow::Continue
    }
}

impl PacketHandler for KeyValidator<'_> {
    fn handle(&mut self, packet: Result<Packet>) -> Flow {
        let packet = match packet {
            Ok(packet) => packet,
            Err(err) => {
                push_error!(self.errors, ErrorCode::Stream, "key pass aborted: {}", err);
                return Flow::Finished;
            }
        };

        match packet {
            Packet::PublicKey(key) => self.capture_primary(key),
            Packet::SecretKey(key) => self.capture_primary(key.public_key().clone()),
            Packet::PublicSubkey(key) => {
                self.subkey = Some(key);
                Flow::Continue
            }
            Packet::SecretSubkey(key) => {
                self.subkey = Some(key.public_key().clone());
                Flow::Continue
            }
            Packet::UserId(id) => {
                self.last_object = Some(SignedObject::UserId(id));
                Flow::Continue
            }
            Packet::UserAttribute(attr) => {
                self.last_object = Some(SignedObject::UserAttribute(attr));
                Flow::Continue
            }
            Packet::Signature(sig) => self.check_signature(&sig),
            Packet::Trust(trust) => {
                self.last_trust = Some(trust);
                Flow::Continue
            }
            other => {
                debug!("ignoring {:?} in key pass", other.tag());
                Flow::Continue
            }
        }
    }
}

/// Runs one key pass over a packet sequence.
pub fn validate_packets<I>(
    packets: I,
    keyring: &Keyring,
    options: &ValidationOptions,
    errors: &mut ErrorStack,
) -> ValidationResult
where
    I: IntoIterator<Item = Result<Packet>>,
{
    let mut validator = KeyValidator::new(keyring, options);
    drive(&mut validator, packets);
    let (result, mut pass_errors) = validator.finish();
    errors.append(&mut pass_errors);

    result
}

/// Validates the signatures attached to `entry`, using `keyring` to find signers.
pub fn validate_key(
    entry: &KeyEntry,
    keyring: &Keyring,
    options: &ValidationOptions,
    errors: &mut ErrorStack,
) -> ValidationResult {
    let result = validate_packets(entry.to_packets().into_iter().map(Ok), keyring, options, errors);
    info!(
        "key {}: {} valid, {} invalid, {} unknown",
        entry.key_id(),
        result.validc(),
        result.invalidc(),
        result.unknownc()
    );
    result
}

/// Validates every key in `keyring` against the keyring itself.
pub fn validate_keyring(
    keyring: &Keyring,
    options: &ValidationOptions,
    errors: &mut ErrorStack,
) -> ValidationResult {
    let mut result = ValidationResult::default();
    for entry in keyring {
        result.merge(validate_key(entry, keyring, options, errors));
    }
    result
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::crypto::hash::HashAlgorithm;
    use crate::packet::key_tests::{dsa_secret_key, rsa_secret_key};
    use crate::packet::{SecretKey, SignatureCreator, SignatureVersion};
    use crate::types::{KeyDetails, PacketHeaderVersion};
    use crate::validate::ValidationOptionsBuilder;

    fn uid(s: &str) -> UserId {
        UserId::from_str(PacketHeaderVersion::New, s)
    }

    fn self_signed(key: &SecretKey, name: &str) -> Vec<Packet> {
        let id = uid(name);
        let sig = key.sign_user_id(&id, HashAlgorithm::Sha1, String::new).unwrap();
        vec![key.public_key().clone().into(), id.into(), sig.into()]
    }

    fn keyring_of(packets: &[Packet]) -> Keyring {
        let mut keyring = Keyring::default();
        let mut errors = ErrorStack::new();
        keyring.add_packets(packets.iter().cloned().map(Ok), &mut errors);
        assert!(errors.is_empty());
        keyring
    }

    #[test]
    fn test_self_signature() {
        let _ = pretty_env_logger::try_init();
        let key = rsa_secret_key(40);
        let packets = self_signed(&key, "alice@example.com");
        let keyring = keyring_of(&packets);
        let opts = ValidationOptions::default();
        let mut errors = ErrorStack::new();

        let res = validate_packets(packets.into_iter().map(Ok), &keyring, &opts, &mut errors);
        assert_eq!((res.validc(), res.invalidc(), res.unknownc()), (1, 0, 0));
        assert!(res.is_accepted(&Utc::now()));
        assert!(errors.is_empty());
    }

    #[test]
    fn test_unknown_signer() {
        let key = rsa_secret_key(40);
        let stranger = rsa_secret_key(41);
        let mut packets = self_signed(&key, "alice@example.com");
        let id = uid("alice@example.com");
        packets.push(
            stranger
                .certify_user_id(key.public_key(), &id, HashAlgorithm::Sha256, String::new)
                .unwrap()
                .into(),
        );
        let keyring = keyring_of(&packets);

        let mut errors = ErrorStack::new();
        let res = validate_keyring(&keyring, &ValidationOptions::default(), &mut errors);
        assert_eq!((res.validc(), res.invalidc(), res.unknownc()), (1, 0, 1));
        assert!(!res.is_accepted(&Utc::now()));
    }

    #[test]
    fn test_third_party_certification() {
        let key = rsa_secret_key(40);
        let friend = dsa_secret_key();
        let mut packets = self_signed(&key, "alice@example.com");
        packets.push(
            friend
                .certify_user_id(key.public_key(), &uid("alice@example.com"), HashAlgorithm::Sha256, String::new)
                .unwrap()
                .into(),
        );
        let mut keyring = keyring_of(&packets);
        keyring.add_key(friend.public_key().clone());

        let mut errors = ErrorStack::new();
        let res = validate_key(&keyring.keys()[0], &keyring, &ValidationOptions::default(), &mut errors);
        assert_eq!((res.validc(), res.invalidc(), res.unknownc()), (2, 0, 0));
    }

    #[test]
    fn test_certification_without_user_id() {
        let key = rsa_secret_key(40);
        let sig = key
            .sign_user_id(&uid("x"), HashAlgorithm::Sha1, String::new)
            .unwrap();
        let packets: Vec<Packet> = vec![key.public_key().clone().into(), sig.into()];
        let keyring = keyring_of(&packets);

        let mut errors = ErrorStack::new();
        let res = validate_packets(packets.into_iter().map(Ok), &keyring, &ValidationOptions::default(), &mut errors);
        assert_eq!(res.invalidc(), 1);
        assert!(errors.has_code(ErrorCode::UnexpectedSignature));
    }

    #[test]
    fn test_subkey_binding() {
        let key = rsa_secret_key(40);
        let sub = PublicSubkey::new(dsa_secret_key().public_key().clone());
        let mut packets = self_signed(&key, "alice@example.com");
        packets.push(sub.clone().into());
        packets.push(key.sign_subkey(&sub, HashAlgorithm::Sha256, String::new).unwrap().into());
        // bound to the wrong subkey
        let other = PublicSubkey::new(rsa_secret_key(41).public_key().clone());
        packets.push(other.into());
        packets.push(key.sign_subkey(&sub, HashAlgorithm::Sha256, String::new).unwrap().into());
        let keyring = keyring_of(&packets);

        let mut errors = ErrorStack::new();
        let res = validate_keyring(&keyring, &ValidationOptions::default(), &mut errors);
        assert_eq!((res.validc(), res.invalidc(), res.unknownc()), (2, 1, 0));
    }

    #[test]
    fn test_expired_signature() {
        let key = rsa_secret_key(40);
        let id = uid("alice@example.com");
        let created = Utc::now() - Duration::days(2);

        let mut creator = SignatureCreator::new(
            SignatureVersion::V4,
            SignatureType::CertPositive,
            key.algorithm(),
            HashAlgorithm::Sha1,
        );
        creator.hash_init().unwrap();
        creator.hash_key(key.public_key()).unwrap();
        creator.hash_user_id(&id).unwrap();
        creator.write_preamble().unwrap();
        creator.add_creation_time(created).unwrap();
        creator.add_expiration(3600).unwrap();
        creator.add_issuer(key.key_id().unwrap()).unwrap();
        creator.end_hashed().unwrap();
        creator.finalize(&key, String::new).unwrap();
        let sig = creator.into_signature().unwrap();

        let packets: Vec<Packet> = vec![key.public_key().clone().into(), id.into(), sig.into()];
        let keyring = keyring_of(&packets);
        let mut errors = ErrorStack::new();
        let opts = ValidationOptions::default();
        let res = validate_keyring(&keyring, &opts, &mut errors);

        assert_eq!((res.validc(), res.invalidc(), res.unknownc()), (1, 0, 0));
        assert!(!res.is_accepted(&opts.now()));

        let then = ValidationOptionsBuilder::default()
            .now(created + Duration::minutes(30))
            .build()
            .unwrap();
        assert!(res.is_accepted(&then.now()));
    }

    #[test]
    fn test_stream_errors_stop_the_pass() {
        let key = rsa_secret_key(40);
        let packets = self_signed(&key, "alice@example.com");
        let keyring = keyring_of(&packets);

        let stream = vec![
            Ok(packets[0].clone()),
            Err(crate::errors::Error::InvalidInput),
            Ok(packets[1].clone()),
            Ok(packets[2].clone()),
        ];
        let mut errors = ErrorStack::new();
        let res = validate_packets(stream, &keyring, &ValidationOptions::default(), &mut errors);
        assert!(res.is_empty());
        assert!(errors.has_code(ErrorCode::Stream));

        let twice = vec![Ok(packets[0].clone()), Ok(packets[0].clone()), Ok(packets[1].clone()), Ok(packets[2].clone())];
        let res = validate_packets(twice, &keyring, &ValidationOptions::default(), &mut errors);
        assert!(res.is_empty());
    }
}
