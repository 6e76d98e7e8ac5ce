//! Typed wrappers over the raw field/curve encodings.
//!
//! Each wrapper carries an explicit length invariant so the kernel never
//! operates on implicitly sized byte buffers. Secret-bearing types redact
//! their `Debug` output and are deliberately not serializable; only the
//! disclosable types (commitments, public keys, G2 encodings) implement
//! serde, as hex strings.

use bls12_381::{G1Affine, G2Affine, Scalar};
use custody_types::{CustodyError, Result};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// Secret polynomial: `t` scalar coefficients, constant term first.
///
/// Exists only inside the trusted boundary; created once per DKG round and
/// dropped when the round's shares and commitments have been derived.
pub struct Polynomial(Vec<Scalar>);

impl Polynomial {
    pub(crate) fn from_coefficients(coefficients: Vec<Scalar>) -> Self {
        Self(coefficients)
    }

    /// Number of coefficients, equal to the threshold `t`.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn coefficients(&self) -> &[Scalar] {
        &self.0
    }
}

impl std::fmt::Debug for Polynomial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Polynomial(t={}, <redacted>)", self.0.len())
    }
}

/// A participant's secret share: the polynomial evaluated at their index.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretShare(Scalar);

impl SecretShare {
    pub(crate) fn new(scalar: Scalar) -> Self {
        Self(scalar)
    }

    pub fn scalar(&self) -> &Scalar {
        &self.0
    }

    /// Hex encoding of the canonical 32-byte little-endian representation.
    /// Used only after the sealing step at the trusted boundary.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0.to_bytes())
    }

    pub fn from_hex(encoded: &str) -> Result<Self> {
        let bytes: [u8; 32] = hex::decode(encoded)
            .ok()
            .and_then(|v| v.try_into().ok())
            .ok_or_else(|| {
                CustodyError::InvalidDkgParameters("malformed share encoding".to_string())
            })?;
        Option::from(Scalar::from_bytes(&bytes))
            .map(Self)
            .ok_or_else(|| {
                CustodyError::InvalidDkgParameters(
                    "share is not a canonical field element".to_string(),
                )
            })
    }
}

impl std::fmt::Debug for SecretShare {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecretShare(<redacted>)")
    }
}

/// Feldman commitment to one polynomial coefficient: `coeff * G2`,
/// compressed. Safe to disclose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Commitment(pub [u8; 96]);

impl Commitment {
    pub(crate) fn decompress(&self) -> Option<G2Affine> {
        Option::from(G2Affine::from_compressed(&self.0))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(encoded: &str) -> Result<Self> {
        decode_fixed(encoded, "commitment").map(Self)
    }
}

/// Derived BLS public key: `secret * G1`, compressed. Safe to disclose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicKeyPoint(pub [u8; 48]);

impl PublicKeyPoint {
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(encoded: &str) -> Result<Self> {
        decode_fixed(encoded, "public key").map(Self)
    }

    pub fn to_affine(&self) -> Option<G1Affine> {
        Option::from(G1Affine::from_compressed(&self.0))
    }
}

/// A scalar re-encoded into the second pairing group, as required by the
/// downstream aggregate-signature scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct G2Encoding(pub [u8; 96]);

impl G2Encoding {
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(encoded: &str) -> Result<Self> {
        decode_fixed(encoded, "G2 encoding").map(Self)
    }
}

fn decode_fixed<const N: usize>(encoded: &str, what: &str) -> Result<[u8; N]> {
    hex::decode(encoded)
        .ok()
        .and_then(|v| v.try_into().ok())
        .ok_or_else(|| {
            CustodyError::InvalidDkgParameters(format!("malformed {} encoding", what))
        })
}

macro_rules! hex_serde {
    ($ty:ident) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(
                deserializer: D,
            ) -> std::result::Result<Self, D::Error> {
                let encoded = String::deserialize(deserializer)?;
                $ty::from_hex(&encoded).map_err(de::Error::custom)
            }
        }
    };
}

hex_serde!(Commitment);
hex_serde!(PublicKeyPoint);
hex_serde!(G2Encoding);
