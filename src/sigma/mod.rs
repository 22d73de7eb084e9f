pub mod chaum_pedersen;
pub mod schnorr;

pub use chaum_pedersen::ChaumPedersenProof;
pub use schnorr::SchnorrProof;
