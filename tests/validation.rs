use chrono::{Duration, TimeZone, Utc};
use pgpcore::crypto::hash::HashAlgorithm;
use pgpcore::crypto::sym::SymmetricKeyAlgorithm;
use pgpcore::errors::ErrorStack;
use pgpcore::packet::{
    LiteralData, OnePassSignature, Packet, PacketParser, PublicKeyEncryptedSessionKey,
    PublicSubkey, SecretKey, SecretSubkey, SignatureCreator, SignatureType, SignatureVersion,
    UserId,
};
use pgpcore::ser::Serialize;
use pgpcore::types::{KeyDetails, Mpi, PacketHeaderVersion, SecretParams};
use pgpcore::validate::{
    validate_data, validate_detached, validate_keyring, validate_packets, ValidationOptions,
    ValidationOptionsBuilder,
};
use pgpcore::Keyring;
use pretty_assertions::assert_eq;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn generate(seed: u64, bits: usize) -> SecretKey {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let created = Utc.timestamp_opt(1_600_000_000, 0).unwrap();
    SecretKey::generate_rsa(&mut rng, bits, created).unwrap()
}

fn transferable(key: &SecretKey, name: &str) -> Vec<Packet> {
    let id = UserId::from_str(PacketHeaderVersion::New, name);
    let sig = key.sign_user_id(&id, HashAlgorithm::Sha1, String::new).unwrap();
    vec![key.public_key().clone().into(), id.into(), sig.into()]
}

fn to_bytes(packets: &[Packet]) -> Vec<u8> {
    let mut out = Vec::new();
    for p in packets {
        p.to_writer(&mut out).unwrap();
    }
    out
}

fn counts(res: &pgpcore::ValidationResult) -> (usize, usize, usize) {
    (res.validc(), res.invalidc(), res.unknownc())
}

#[test]
fn rsa_2048_self_signature_validates() {
    let _ = pretty_env_logger::try_init();
    let key = generate(1, 2048);
    let raw = to_bytes(&transferable(&key, "alice@example.com"));

    let mut errors = ErrorStack::new();
    let keyring = Keyring::from_bytes(HashAlgorithm::Sha1, raw.clone(), &mut errors);
    assert_eq!(keyring.len(), 1);
    assert!(errors.is_empty());

    let opts = ValidationOptions::default();
    let res = validate_packets(PacketParser::new(raw), &keyring, &opts, &mut errors);
    assert_eq!(counts(&res), (1, 0, 0));
    assert!(res.is_accepted(&opts.now()));
    assert!(errors.is_empty());
}

#[test]
fn corrupted_signature_is_rejected() {
    let key = generate(2, 1024);
    let mut packets = transferable(&key, "alice@example.com");
    let Packet::Signature(sig) = &mut packets[2] else {
        panic!("expected a signature");
    };
    let mut value = sig.signature[0].as_ref().to_vec();
    value[5] ^= 0x40;
    sig.signature[0] = Mpi::from_slice(&value);

    let mut errors = ErrorStack::new();
    let mut keyring = Keyring::default();
    keyring.add_packets(packets.into_iter().map(Ok), &mut errors);

    let opts = ValidationOptions::default();
    let res = validate_keyring(&keyring, &opts, &mut errors);
    assert_eq!(counts(&res), (0, 1, 0));
    assert!(!res.is_accepted(&opts.now()));
}

#[test]
fn tampered_issuer_is_unknown() {
    let key = generate(2, 1024);
    let id = UserId::from_str(PacketHeaderVersion::New, "alice@example.com");

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
    creator.add_creation_time(Utc::now()).unwrap();
    creator.add_issuer([0xAA; 8].into()).unwrap();
    creator.end_hashed().unwrap();
    creator.finalize(&key, String::new).unwrap();
    let sig = creator.into_signature().unwrap();

    let packets: Vec<Packet> = vec![key.public_key().clone().into(), id.into(), sig.into()];
    let mut errors = ErrorStack::new();
    let mut keyring = Keyring::default();
    keyring.add_packets(packets.into_iter().map(Ok), &mut errors);

    let res = validate_keyring(&keyring, &ValidationOptions::default(), &mut errors);
    assert_eq!(counts(&res), (0, 0, 1));
}

#[test]
fn expired_signature_is_rejected() {
    let key = generate(3, 1024);
    let id = UserId::from_str(PacketHeaderVersion::New, "alice@example.com");
    let created = Utc.timestamp_opt(1_650_000_000, 0).unwrap();

    let mut creator = SignatureCreator::new(
        SignatureVersion::V4,
        SignatureType::CertPositive,
        key.algorithm(),
        HashAlgorithm::Sha256,
    );
    creator.hash_init().unwrap();
    creator.hash_key(key.public_key()).unwrap();
    creator.hash_user_id(&id).unwrap();
    creator.write_preamble().unwrap();
    creator.add_creation_time(created).unwrap();
    creator.add_expiration(86_400).unwrap();
    creator.add_issuer(key.key_id().unwrap()).unwrap();
    creator.end_hashed().unwrap();
    creator.finalize(&key, String::new).unwrap();
    let sig = creator.into_signature().unwrap();

    let packets: Vec<Packet> = vec![key.public_key().clone().into(), id.into(), sig.into()];
    let mut errors = ErrorStack::new();
    let keyring = Keyring::from_bytes(HashAlgorithm::Sha1, to_bytes(&packets), &mut errors);

    let late = ValidationOptionsBuilder::default()
        .now(created + Duration::days(2))
        .build()
        .unwrap();
    let res = validate_keyring(&keyring, &late, &mut errors);
    assert_eq!(counts(&res), (1, 0, 0));
    assert!(!res.is_accepted(&late.now()));

    let early = ValidationOptionsBuilder::default()
        .now(created + Duration::hours(12))
        .build()
        .unwrap();
    assert!(res.is_accepted(&early.now()));
}

#[test]
fn secret_keyring_export_roundtrip() {
    let mut rng = ChaCha8Rng::seed_from_u64(4);
    let mut primary = generate(4, 1024);
    let sub_secret = generate(5, 1024);
    let subkey = SecretSubkey::new(
        PublicSubkey::new(sub_secret.public_key().clone()),
        sub_secret.secret_params().clone(),
    )
    .unwrap();

    let id = UserId::from_str(PacketHeaderVersion::New, "Carol <carol@example.net>");
    let cert = primary.sign_user_id(&id, HashAlgorithm::Sha256, String::new).unwrap();
    let binding = primary
        .sign_subkey(subkey.public_key(), HashAlgorithm::Sha256, String::new)
        .unwrap();
    primary.lock(&mut rng, || "correct horse".to_string()).unwrap();

    let mut keyring = Keyring::default();
    let mut errors = ErrorStack::new();
    let packets: Vec<Packet> = vec![
        primary.clone().into(),
        id.into(),
        cert.into(),
        subkey.clone().into(),
        binding.into(),
    ];
    keyring.add_packets(packets.into_iter().map(Ok), &mut errors);
    assert!(errors.is_empty());

    let raw = keyring.to_bytes().unwrap();
    let back = Keyring::from_bytes(HashAlgorithm::Sha1, raw, &mut errors);
    assert!(errors.is_empty());
    assert_eq!(back, keyring);

    let entry = &back.keys()[0];
    assert!(entry.is_secret());
    assert_eq!(entry.subkeys().len(), 1);
    assert_eq!(entry.subkeys()[0].key_id, subkey.key_id().unwrap());

    let res = validate_keyring(&back, &ValidationOptions::default(), &mut errors);
    assert_eq!(counts(&res), (2, 0, 0));

    let mut secret = entry.key().secret_key().unwrap().clone();
    assert!(matches!(secret.secret_params(), SecretParams::Encrypted(_)));
    assert!(secret.unlock(|| "wrong".to_string()).is_err());
    secret.unlock(|| "correct horse".to_string()).unwrap();
    assert!(matches!(secret.secret_params(), SecretParams::Plain(_)));
}

#[test]
fn keyring_lookups() {
    let alice = generate(6, 1024);
    let bob = generate(7, 1024);
    let mut packets = transferable(&alice, "Alice <alice@example.com>");
    packets.extend(transferable(&bob, "Bob <bob@example.org>"));

    let mut errors = ErrorStack::new();
    let keyring = Keyring::from_bytes(HashAlgorithm::Sha1, to_bytes(&packets), &mut errors);
    assert_eq!(keyring.len(), 2);

    let bob_id = bob.key_id().unwrap();
    let (idx, entry) = keyring.lookup_by_keyid(bob_id.as_ref(), 0).unwrap();
    assert_eq!(idx, 1);
    assert_eq!(entry.fingerprint(), &bob.fingerprint().unwrap());
    let (idx, _) = keyring.lookup_by_keyid(bob_id.short(), 0).unwrap();
    assert_eq!(idx, 1);

    let by_hex = keyring.lookup_by_name(&bob_id.to_string()).unwrap().unwrap();
    assert_eq!(by_hex.key_id(), &bob_id);
    let by_name = keyring.lookup_by_name("ALICE@EXAMPLE").unwrap().unwrap();
    assert_eq!(by_name.key_id(), &alice.key_id().unwrap());
    assert!(keyring.lookup_by_name("mallory").unwrap().is_none());
}

#[test]
fn signed_message_and_detached_signature() {
    let key = generate(8, 1024);
    let mut errors = ErrorStack::new();
    let keyring = Keyring::from_bytes(
        HashAlgorithm::Sha1,
        to_bytes(&transferable(&key, "signer@example.com")),
        &mut errors,
    );

    let data = b"the quick brown fox\n";
    let sig = key.sign_data(data, HashAlgorithm::Sha256, String::new).unwrap();
    let ops = OnePassSignature::new(
        SignatureType::Binary,
        HashAlgorithm::Sha256,
        key.algorithm(),
        key.key_id().unwrap(),
    );
    let message = to_bytes(&[
        ops.into(),
        LiteralData::from_bytes(b"fox.txt", data.to_vec().into()).into(),
        sig.clone().into(),
    ]);

    let opts = ValidationOptions::default();
    let res = validate_data(PacketParser::new(message), &keyring, &opts, &mut errors);
    assert_eq!(counts(&res), (1, 0, 0));

    let detached = to_bytes(&[sig.into()]);
    let res = validate_detached(data, PacketParser::new(detached.clone()), &keyring, &opts, &mut errors);
    assert_eq!(counts(&res), (1, 0, 0));

    let res = validate_detached(b"the quick brown cat\n", PacketParser::new(detached), &keyring, &opts, &mut errors);
    assert_eq!(counts(&res), (0, 1, 0));
    assert!(errors.is_empty());
}

#[test]
fn session_key_to_keyring_recipient() {
    let mut rng = ChaCha8Rng::seed_from_u64(9);
    let key = generate(9, 1024);
    let mut errors = ErrorStack::new();
    let mut keyring = Keyring::default();
    let packets: Vec<Packet> = vec![
        key.clone().into(),
        UserId::from_str(PacketHeaderVersion::New, "r@x").into(),
    ];
    keyring.add_packets(packets.into_iter().map(Ok), &mut errors);

    let entry = keyring.lookup_by_name("r@x").unwrap().unwrap();
    let recipient = entry.encryption_key_id().copied().unwrap();
    assert_eq!(recipient, key.key_id().unwrap());

    let alg = SymmetricKeyAlgorithm::AES256;
    let session_key = alg.new_session_key(&mut rng);
    let pkesk =
        PublicKeyEncryptedSessionKey::from_session_key(&mut rng, &session_key, alg, entry.public_key())
            .unwrap();
    let ciphertext = alg.encrypt_protected(&mut rng, &session_key, b"secret payload").unwrap();

    let packets: Vec<_> = PacketParser::new(to_bytes(&[pkesk.into()]))
        .collect::<Result<_, _>>()
        .unwrap();
    let Packet::PublicKeyEncryptedSessionKey(pkesk) = &packets[0] else {
        panic!("expected a session key packet");
    };
    assert_eq!(pkesk.id(), &recipient);

    let secret = entry.key().secret_key().unwrap();
    let (got_alg, got_key) = secret.decrypt_session_key(pkesk, String::new).unwrap();
    assert_eq!(got_alg, alg);
    assert_eq!(
        alg.decrypt_protected(&got_key, &ciphertext).unwrap(),
        b"secret payload".to_vec()
    );
    assert!(errors.is_empty());
}
