mod public;
mod secret;

pub use self::{
    public::{PublicKey, PublicSubkey},
    secret::{SecretKey, SecretSubkey},
};
