//! Fiat-Shamir transcript
//!
//! An append-only byte buffer. Challenges hash the whole buffer with
//! SHA-512 and reduce the 64-byte digest into the scalar field, so prover
//! and verifier must perform the identical append sequence. Cloning is a
//! value copy; protocols that branch into two dependent sub-proofs clone
//! the shared prefix instead of sharing a mutable reference.

use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use sha2::{Digest, Sha512};

use crate::elgamal::Ciphertext;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transcript {
    buffer: Vec<u8>,
}

impl Transcript {
    /// Start a transcript seeded with a protocol-unique domain tag.
    pub fn new(domain: &'static [u8]) -> Self {
        let mut buffer = Vec::with_capacity(256);
        buffer.extend_from_slice(domain);
        Self { buffer }
    }

    pub fn append_bytes(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Append the canonical 32-byte encoding of a group element.
    pub fn append_element(&mut self, point: &RistrettoPoint) {
        self.buffer.extend_from_slice(&point.compress().to_bytes());
    }

    pub fn append_elements(&mut self, points: &[RistrettoPoint]) {
        for point in points {
            self.append_element(point);
        }
    }

    pub fn append_scalar(&mut self, scalar: &Scalar) {
        self.buffer.extend_from_slice(scalar.as_bytes());
    }

    pub fn append_ciphertext(&mut self, ciphertext: &Ciphertext) {
        self.append_element(&ciphertext.c0);
        self.append_element(&ciphertext.c1);
    }

    pub fn append_ciphertexts(&mut self, ciphertexts: &[Ciphertext]) {
        for ciphertext in ciphertexts {
            self.append_ciphertext(ciphertext);
        }
    }

    /// Derive a challenge scalar from everything appended so far.
    ///
    /// Does not mutate the transcript: two consecutive challenges must be
    /// separated by an append, or they will coincide.
    pub fn challenge(&self) -> Scalar {
        Scalar::from_hash(Sha512::new().chain_update(&self.buffer))
    }
}
