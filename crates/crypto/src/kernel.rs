//! The DKG kernel: polynomial secret sharing with Feldman commitments.
//!
//! f(x) = a_0 + a_1*x + ... + a_{t-1}*x^{t-1} over the BLS12-381 scalar
//! field; participant `i` holds f(i), commitments are `a_k * G2`.

use bls12_381::{G1Projective, G2Projective, Scalar};
use custody_types::{CustodyError, DkgParams, Result};
use ff::Field;
use group::{Curve, Group};
use rand::{CryptoRng, RngCore};
use subtle::Choice;

use crate::types::{Commitment, G2Encoding, Polynomial, PublicKeyPoint, SecretShare};

/// Draw `t` uniform scalar coefficients from a cryptographically secure
/// source.
pub fn generate_polynomial<R: RngCore + CryptoRng>(t: u32, rng: &mut R) -> Result<Polynomial> {
    if t == 0 {
        return Err(CustodyError::InvalidDkgParameters(
            "threshold t must be at least 1".to_string(),
        ));
    }

    let mut coefficients = Vec::with_capacity(t as usize);
    for _ in 0..t {
        let mut wide = [0u8; 64];
        rng.fill_bytes(&mut wide);
        coefficients.push(Scalar::from_bytes_wide(&wide));
    }

    Ok(Polynomial::from_coefficients(coefficients))
}

/// Horner evaluation of the polynomial at `x`, mod the field order.
fn evaluate(coefficients: &[Scalar], x: &Scalar) -> Scalar {
    let mut acc = Scalar::ZERO;
    for coeff in coefficients.iter().rev() {
        acc = acc * x + coeff;
    }
    acc
}

fn check_polynomial(poly: &Polynomial, t: u32) -> Result<()> {
    if poly.len() != t as usize {
        return Err(CustodyError::InvalidDkgParameters(format!(
            "polynomial has {} coefficients, expected t={}",
            poly.len(),
            t
        )));
    }
    Ok(())
}

/// Secret shares for every participant `i` in `1..=n`.
pub fn compute_secret_shares(poly: &Polynomial, t: u32, n: u32) -> Result<Vec<SecretShare>> {
    DkgParams::new(t, n).validate()?;
    check_polynomial(poly, t)?;

    Ok((1..=n)
        .map(|i| SecretShare::new(evaluate(poly.coefficients(), &Scalar::from(i as u64))))
        .collect())
}

/// Single-index variant of [`compute_secret_shares`]; equals element `i` of
/// the batch result for identical inputs.
pub fn compute_secret_share(poly: &Polynomial, t: u32, n: u32, index: u32) -> Result<SecretShare> {
    let params = DkgParams::new(t, n);
    params.validate()?;
    params.validate_index(index)?;
    check_polynomial(poly, t)?;

    Ok(SecretShare::new(evaluate(
        poly.coefficients(),
        &Scalar::from(index as u64),
    )))
}

/// Feldman commitments `coeff_k * G2` for every coefficient. Independent of
/// any participant index.
pub fn compute_public_shares(poly: &Polynomial, t: u32) -> Result<Vec<Commitment>> {
    if t == 0 {
        return Err(CustodyError::InvalidDkgParameters(
            "threshold t must be at least 1".to_string(),
        ));
    }
    check_polynomial(poly, t)?;

    Ok(poly
        .coefficients()
        .iter()
        .map(|coeff| {
            Commitment((G2Projective::generator() * coeff).to_affine().to_compressed())
        })
        .collect())
}

/// Verify a claimed share against published commitments: recompute the
/// evaluation in the exponent and compare against `share * G2`.
///
/// A mismatch is a caller-facing `false`, never an error; the share may come
/// from an untrusted remote party. Malformed commitments are folded into the
/// same `false` outcome, and the final whole-point comparison does not depend
/// on which coefficient disagrees.
pub fn verify_share(
    commitments: &[Commitment],
    share: &SecretShare,
    t: u32,
    index: u32,
) -> Result<bool> {
    if t == 0 {
        return Err(CustodyError::InvalidDkgParameters(
            "threshold t must be at least 1".to_string(),
        ));
    }
    if index == 0 {
        return Err(CustodyError::InvalidDkgParameters(
            "participant index must be at least 1".to_string(),
        ));
    }
    if commitments.len() != t as usize {
        return Err(CustodyError::InvalidDkgParameters(format!(
            "{} commitments supplied, expected t={}",
            commitments.len(),
            t
        )));
    }

    let lhs = G2Projective::generator() * share.scalar();

    let x = Scalar::from(index as u64);
    let mut x_power = Scalar::ONE;
    let mut rhs = G2Projective::identity();
    let mut well_formed = Choice::from(1u8);

    for commitment in commitments {
        // Fold decompression failures into the verdict instead of exiting
        // early at the offending coefficient.
        match commitment.decompress() {
            Some(point) => rhs += G2Projective::from(point) * x_power,
            None => well_formed &= Choice::from(0u8),
        }
        x_power *= x;
    }

    Ok(bool::from(well_formed) && lhs.to_affine() == rhs.to_affine())
}

/// Derive the BLS public key `secret * G1`. Deterministic.
pub fn derive_bls_public_key(share: &SecretShare) -> PublicKeyPoint {
    PublicKeyPoint(
        (G1Projective::generator() * share.scalar())
            .to_affine()
            .to_compressed(),
    )
}

/// Re-encode a secret scalar into the second pairing group, as the
/// downstream aggregate-signature scheme requires.
pub fn convert_to_g2(share: &SecretShare) -> G2Encoding {
    G2Encoding(
        (G2Projective::generator() * share.scalar())
            .to_affine()
            .to_compressed(),
    )
}

/// Lagrange interpolation at zero: reconstruct f(0) from `t` shares
/// `(i, f(i))`. Returns `None` for an empty set or duplicate indices.
pub fn combine_shares(shares: &[(u32, SecretShare)]) -> Option<SecretShare> {
    if shares.is_empty() {
        return None;
    }

    let mut acc = Scalar::ZERO;
    for (i, (x_i, y_i)) in shares.iter().enumerate() {
        let x_i_scalar = Scalar::from(*x_i as u64);

        let mut numerator = Scalar::ONE;
        let mut denominator = Scalar::ONE;
        for (j, (x_j, _)) in shares.iter().enumerate() {
            if i == j {
                continue;
            }
            let x_j_scalar = Scalar::from(*x_j as u64);
            numerator *= x_j_scalar;
            denominator *= x_j_scalar - x_i_scalar;
        }

        let denominator_inv = Option::<Scalar>::from(denominator.invert())?;
        acc += y_i.scalar() * numerator * denominator_inv;
    }

    Some(SecretShare::new(acc))
}
