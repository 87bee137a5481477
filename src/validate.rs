//! # Validation
//!
//! Drives packet sequences through signature verification against a
//! [`Keyring`], sorting every signature into valid, invalid or unknown.
//!
//! ```
//! use pgpcore::crypto::hash::HashAlgorithm;
//! use pgpcore::packet::{SecretKey, UserId};
//! use pgpcore::types::PacketHeaderVersion;
//! use pgpcore::validate::{validate_keyring, ValidationOptions};
//! use pgpcore::{ErrorStack, Keyring};
//! use rand::SeedableRng;
//!
//! let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(1);
//! let key = SecretKey::generate_rsa(&mut rng, 1024, chrono::Utc::now()).unwrap();
//! let id = UserId::from_str(PacketHeaderVersion::New, "alice@example.com");
//! let sig = key.sign_user_id(&id, HashAlgorithm::Sha1, String::new).unwrap();
//!
//! let mut keyring = Keyring::default();
//! keyring.add_key(key.public_key().clone());
//! keyring.add_user_id(id);
//! keyring.add_signature(sig);
//!
//! let mut errors = ErrorStack::new();
//! let res = validate_keyring(&keyring, &ValidationOptions::default(), &mut errors);
//! assert_eq!((res.validc(), res.invalidc(), res.unknownc()), (1, 0, 0));
//! ```

mod data;
mod key;
mod result;

use chrono::{DateTime, Utc};
use derive_builder::Builder;
use log::debug;

pub use self::data::{validate_data, validate_detached, DataValidator};
pub use self::key::{validate_key, validate_keyring, validate_packets, KeyValidator};
pub use self::result::ValidationResult;

use crate::debug::DebugConfig;
use crate::errors::Result;
use crate::packet::Packet;

/// Settings for a validation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Builder)]
#[builder(build_fn(error = "crate::errors::Error"))]
pub struct ValidationOptions {
    /// The time acceptance is judged at, the current time if unset.
    #[builder(default, setter(strip_option))]
    now: Option<DateTime<Utc>>,
    #[builder(default)]
    debug: DebugConfig,
}

impl ValidationOptions {
    pub fn now(&self) -> DateTime<Utc> {
        self.now.unwrap_or_else(Utc::now)
    }

    pub fn debug(&self) -> &DebugConfig {
        &self.debug
    }
}

/// Whether a validation pass wants more packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Finished,
}

/// A consumer of packet events.
pub trait PacketHandler {
    fn handle(&mut self, packet: Result<Packet>) -> Flow;
}

/// Feeds `packets` to `handler` until it asks to stop or the input ends.
pub fn drive<H, I>(handler: &mut H, packets: I)
where
    H: PacketHandler + ?Sized,
    I: IntoIterator<Item = Result<Packet>>,
{
    for packet in packets {
        if handler.handle(packet) == Flow::Finished {
            debug!("validation pass finished early");
            break;
        }
    }
}
