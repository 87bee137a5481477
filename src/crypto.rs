//! # Cryptography module
//!
//! Raw public key operations, hashing and symmetric ciphers.

// Symmetric

pub mod sym;

// Encryption & Signing

pub mod dsa;
pub mod elgamal;
pub mod pkcs1;
pub mod rsa;

// Misc

pub mod checksum;
pub mod hash;
pub mod public_key;
