//! DKG and threshold-BLS primitives for the custody enclave.
//!
//! Pure functions over BLS12-381 field elements and curve points: secret
//! polynomial generation, Shamir share computation, Feldman commitments,
//! share verification, and public-key derivation. No I/O, no shared state;
//! every operation validates its parameter ranges before touching secret
//! material.
//!
//! # Security
//!
//! - Coefficients are drawn from the OS CSPRNG and reduced from 64 uniform
//!   bytes, so they are uniform in the scalar field.
//! - Share verification compares complete curve points; the comparison does
//!   not depend on which coefficient caused a mismatch.
//! - Privacy holds against up to t-1 colluding participants.

pub mod kernel;
pub mod types;

pub use kernel::{
    combine_shares, compute_public_shares, compute_secret_share, compute_secret_shares,
    convert_to_g2, derive_bls_public_key, generate_polynomial, verify_share,
};
pub use types::{Commitment, G2Encoding, Polynomial, PublicKeyPoint, SecretShare};
