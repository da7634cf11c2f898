//! Time-lock puzzle arithmetic.
//!
//! Verification reduces the exponent `2^t` modulo Euler's totient, so the
//! holder of the primes pays one modular exponentiation where the solver
//! paid `t` sequential squarings.

use num_bigint::BigUint;
use num_traits::One;
use toll_common::{RsaEpoch, TollError};

/// Trapdoor verification capability.
///
/// Injected into the proof verifier so protocol tests can substitute a
/// stub and stay independent of the big-integer arithmetic.
pub trait TimeLockVerify: Send + Sync {
    /// True iff `y ≡ x^(2^t) (mod p·q)`.
    fn verify(&self, p: &BigUint, q: &BigUint, x: &BigUint, t: u64, y: &BigUint) -> bool;
}

/// The real capability: exponent reduction modulo φ(n).
pub struct TrapdoorVerifier;

impl TimeLockVerify for TrapdoorVerifier {
    fn verify(&self, p: &BigUint, q: &BigUint, x: &BigUint, t: u64, y: &BigUint) -> bool {
        let n = p * q;
        let phi = (p - BigUint::one()) * (q - BigUint::one());

        // e = 2^t mod φ(n); sound for x coprime to n, which holds for all
        // but a negligible fraction of bases
        let e = BigUint::from(2u32).modpow(&BigUint::from(t), &phi);
        x.modpow(&e, &n) == y % &n
    }
}

/// Sequential evaluation: `t` repeated squarings. This is the work a
/// solver performs; tests use it to produce honest proofs.
#[allow(dead_code)]
pub fn eval(x: &BigUint, n: &BigUint, t: u64) -> BigUint {
    let two = BigUint::from(2u32);
    let mut y = x % n;
    for _ in 0..t {
        y = y.modpow(&two, n);
    }
    y
}

/// Parse a hex field into a big integer. Empty strings are rejected.
pub fn parse_hex(s: &str) -> Option<BigUint> {
    if s.is_empty() {
        return None;
    }
    BigUint::parse_bytes(s.as_bytes(), 16)
}

/// Decode an epoch's stored primes.
pub fn epoch_primes(epoch: &RsaEpoch) -> Result<(BigUint, BigUint), TollError> {
    let p = parse_hex(&epoch.p)
        .ok_or_else(|| TollError::Storage("corrupt epoch prime p".to_string()))?;
    let q = parse_hex(&epoch.q)
        .ok_or_else(|| TollError::Storage("corrupt epoch prime q".to_string()))?;
    Ok((p, q))
}

/// Modulus of an epoch.
pub fn epoch_modulus(epoch: &RsaEpoch) -> Result<BigUint, TollError> {
    let (p, q) = epoch_primes(epoch)?;
    Ok(p * q)
}
