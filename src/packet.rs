//! # Packet module
//!
//! Handles everything in relationship to packets.

mod header;
mod many;
mod packet_sum;

mod key;
mod literal_data;
mod one_pass_signature;
mod public_key_encrypted_session_key;
mod signature;
mod trust;
mod user_attribute;
mod user_id;

pub use self::{
    header::PacketHeader,
    key::*,
    literal_data::*,
    many::*,
    one_pass_signature::*,
    packet_sum::*,
    public_key_encrypted_session_key::*,
    signature::*,
    trust::*,
    user_attribute::*,
    user_id::*,
};

#[cfg(test)]
pub(crate) use self::key::tests as key_tests;
