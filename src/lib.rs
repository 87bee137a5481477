//! # pgpcore
//!
//! The trust and crypto core of an OpenPGP engine: key packets and their
//! fingerprints, signature creation and verification, public key session key
//! encryption, keyrings and key validation.
//!
//! # Usage
//!
//! ```
//! use chrono::Utc;
//! use pgpcore::crypto::hash::HashAlgorithm;
//! use pgpcore::packet::{SecretKey, UserId};
//! use pgpcore::types::{KeyDetails, PacketHeaderVersion};
//! use rand::SeedableRng;
//!
//! let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(0);
//! let key = SecretKey::generate_rsa(&mut rng, 1024, Utc::now()).unwrap();
//! let id = UserId::from_str(PacketHeaderVersion::New, "alice@example.com");
//!
//! let sig = key.sign_user_id(&id, HashAlgorithm::Sha256, String::new).unwrap();
//! assert!(sig.verify_certification(key.public_key(), key.public_key(), &id).is_ok());
//! assert_eq!(sig.issuer(), Some(&key.key_id().unwrap()));
//! ```

#![forbid(unsafe_code)]

#[macro_use]
pub mod errors;

pub mod crypto;
pub mod debug;
pub mod keyring;
pub mod packet;
pub mod parsing;
pub mod ser;
pub mod types;
pub mod util;
pub mod validate;

pub use self::errors::{Error, ErrorCode, ErrorStack, Result};
pub use self::keyring::Keyring;
pub use self::validate::{ValidationOptions, ValidationResult};
