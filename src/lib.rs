pub mod bayer_groth;
pub mod codec;
pub mod elgamal;
pub mod game;
pub mod group;
pub mod pedersen;
pub mod sessions;
pub mod sigma;
pub mod transcript;

#[cfg(test)]
pub mod test_utils;

pub use elgamal::{Ciphertext, DecryptionKey, EncryptionKey};
pub use sessions::{Address, SessionStatus};
pub use transcript::Transcript;
