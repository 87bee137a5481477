mod builder;
mod de;
mod ser;
mod subpacket;
mod types;
pub(crate) mod verify;

pub use self::builder::{CreateState, SignatureCreator};
pub use self::subpacket::{Subpacket, SubpacketData, SubpacketLength, SubpacketType};
pub use self::types::{Signature, SignatureConfig, SignatureInfo, SignatureType, SignatureVersion};

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    use super::*;
    use crate::crypto::hash::HashAlgorithm;
    use crate::packet::key::tests::{dsa_secret_key, rsa_secret_key};
    use crate::packet::{PacketTrait, UserId};
    use crate::ser::Serialize;
    use crate::types::{KeyDetails, Mpi, PacketHeaderVersion};

    #[test]
    fn test_certification_roundtrip() {
        let _ = pretty_env_logger::try_init();
        let key = rsa_secret_key(4);
        let id = UserId::from_str(PacketHeaderVersion::New, "alice@example.com");
        let sig = key
            .sign_user_id(&id, HashAlgorithm::Sha1, String::new)
            .unwrap();

        assert_eq!(sig.typ(), SignatureType::CertPositive);
        assert!(sig.is_primary());
        assert!(sig
            .verify_certification(&key, key.public_key(), &id)
            .is_ok());

        let other = UserId::from_str(PacketHeaderVersion::New, "mallory@example.com");
        assert!(sig
            .verify_certification(&key, key.public_key(), &other)
            .is_err());

        let raw = sig.to_bytes().unwrap();
        let back = Signature::from_buf(sig.packet_version(), &raw[..]).unwrap();
        assert_eq!(back, sig);
        assert!(back
            .verify_certification(&key, key.public_key(), &id)
            .is_ok());
    }

    #[test]
    fn test_tampered_signature_value() {
        let key = rsa_secret_key(4);
        let mut sig = key.sign_data(b"payload", HashAlgorithm::Sha256, String::new).unwrap();
        assert!(sig.verify_data(&key, b"payload").is_ok());

        let mut raw = sig.signature[0].as_ref().to_vec();
        raw[10] ^= 0x01;
        sig.signature[0] = Mpi::from_slice(&raw);
        assert!(sig.verify_data(&key, b"payload").is_err());
    }

    #[test]
    fn test_info() {
        let key = dsa_secret_key();
        let sig = key.sign_data(b"x", HashAlgorithm::Sha256, String::new).unwrap();
        let info = sig.info();

        assert_eq!(info.version, SignatureVersion::V4);
        assert_eq!(info.typ, SignatureType::Binary);
        assert_eq!(info.hash_alg, HashAlgorithm::Sha256);
        assert_eq!(info.issuer, Some(key.key_id().unwrap()));
        assert_eq!(info.duration, None);
        assert_eq!(info.hashed_len, sig.config.hashed_area().len());
        assert!(info.created.is_some());
    }

    #[test]
    fn test_expiry() {
        let sig = Signature {
            packet_version: PacketHeaderVersion::New,
            config: SignatureConfig {
                version: SignatureVersion::V4,
                typ: SignatureType::Binary,
                pub_alg: crate::crypto::public_key::PublicKeyAlgorithm::RSA,
                hash_alg: HashAlgorithm::Sha1,
                hashed_subpackets: vec![
                    Subpacket::regular(SubpacketData::SignatureCreationTime(
                        Utc.timestamp_opt(1000, 0).unwrap(),
                    )),
                    Subpacket::regular(SubpacketData::SignatureExpirationTime(60)),
                ],
                unhashed_subpackets: vec![],
                created: None,
                issuer: None,
                hashed_area: bytes::Bytes::new(),
            },
            signed_hash_value: [0, 0],
            signature: vec![],
        };

        let created = Utc.timestamp_opt(1000, 0).unwrap();
        assert_eq!(sig.expiration(), Some(60));
        assert!(!sig.is_expired_at(&(created + Duration::seconds(60))));
        assert!(sig.is_expired_at(&(created + Duration::seconds(61))));
    }

    #[test]
    fn test_sign_verify_all_hashes() {
        let rsa = rsa_secret_key(4);
        let dsa = dsa_secret_key();
        let data = b"release notes\n";

        for key in [&rsa, &dsa] {
            for hash in [
                HashAlgorithm::Md5,
                HashAlgorithm::Sha1,
                HashAlgorithm::Sha224,
                HashAlgorithm::Sha256,
                HashAlgorithm::Sha384,
                HashAlgorithm::Sha512,
            ] {
                let mut creator = SignatureCreator::new(
                    SignatureVersion::V4,
                    SignatureType::Binary,
                    key.algorithm(),
                    hash,
                );
                creator.hash_init().unwrap();
                creator.hash_data(data).unwrap();
                creator.write_preamble().unwrap();
                creator.add_creation_time(Utc.timestamp_opt(1_600_000_000, 0).unwrap()).unwrap();
                creator.add_issuer(key.key_id().unwrap()).unwrap();
                creator.end_hashed().unwrap();
                creator.finalize(key, String::new).unwrap();
                let sig = creator.into_signature().unwrap();

                let raw = sig.to_bytes().unwrap();
                let back = Signature::from_buf(sig.packet_version(), &raw[..]).unwrap();
                assert_eq!(back.hash_alg(), hash);
                assert!(
                    back.verify_data(key, data).is_ok(),
                    "{:?} {:?}",
                    key.algorithm(),
                    hash
                );
                assert!(back.verify_data(key, b"release notes\r\n").is_err());
            }
        }
    }

    #[test]
    fn test_version_octets() {
        assert_eq!(SignatureVersion::default(), SignatureVersion::V4);
        assert_eq!(u8::from(SignatureVersion::V3), 3);
        assert_eq!(SignatureVersion::from(4u8), SignatureVersion::V4);
        assert_eq!(SignatureVersion::from(7u8), SignatureVersion::Other(7));
    }

    #[test]
    fn test_standalone() {
        let key = dsa_secret_key();
        let mut creator = SignatureCreator::new(
            SignatureVersion::V4,
            SignatureType::Standalone,
            key.algorithm(),
            HashAlgorithm::Sha256,
        );
        creator.hash_init().unwrap();
        creator.write_preamble().unwrap();
        creator.add_creation_time(Utc.timestamp_opt(1_600_000_000, 0).unwrap()).unwrap();
        creator.add_issuer(key.key_id().unwrap()).unwrap();
        creator.end_hashed().unwrap();
        creator.finalize(&key, String::new).unwrap();
        let sig = creator.into_signature().unwrap();

        assert!(sig.verify_standalone(&key).is_ok());
        assert!(sig.verify_data(&key, b"").is_err());

        let data_sig = key.sign_data(b"x", HashAlgorithm::Sha256, String::new).unwrap();
        assert!(data_sig.verify_standalone(&key).is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(8))]

        #[test]
        fn data_signature_is_tamper_evident(data in proptest::collection::vec(any::<u8>(), 1..64), bit in 0usize..8) {
            let key = rsa_secret_key(4);
            let sig = key.sign_data(&data, HashAlgorithm::Sha256, String::new).unwrap();
            prop_assert!(sig.verify_data(&key, &data).is_ok());

            let mut tampered = data.clone();
            tampered[0] ^= 1 << bit;
            prop_assert!(sig.verify_data(&key, &tampered).is_err());
        }
    }
}
