//! Time-lock puzzle issuance and verification.
//!
//! A challenge asks the client for `y = x^(2^t) mod n`, which costs `t`
//! sequential squarings without the factorization of `n`. The verifier,
//! holding the primes, checks a submission in a single modular
//! exponentiation.

mod generator;
mod verifier;
pub mod vdf;

pub use generator::ChallengeGenerator;
pub use verifier::{ProofOutcome, ProofVerifier};
pub use vdf::{TimeLockVerify, TrapdoorVerifier};
