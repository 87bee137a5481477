mod fingerprint;
mod key_id;
mod key_traits;
mod mpi;
mod packet;
mod params;
mod pkesk;
mod s2k;

pub use self::{
    fingerprint::Fingerprint,
    key_id::KeyId,
    key_traits::{KeyDetails, SigningKey},
    mpi::{Mpi, SecretMpi},
    packet::*,
    params::*,
    pkesk::PkeskBytes,
    s2k::{S2kParams, StringToKey, StringToKeyType},
};
