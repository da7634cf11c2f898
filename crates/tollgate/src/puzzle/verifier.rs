//! Proof verification across key epochs.

use std::sync::Arc;
use std::time::Instant;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use num_bigint::BigUint;
use toll_common::{Site, TollError};

use crate::replay::ReplayGuard;
use crate::sites::{SiteRegistry, challenge_mac};

use super::vdf::{TimeLockVerify, epoch_primes, parse_hex};

/// Outcome of a well-formed verification request. An incorrect solution
/// is an outcome, not a protocol error.
#[derive(Debug, Clone)]
pub struct ProofOutcome {
    pub is_correct: bool,
    pub verify_time_ms: f64,
}

/// Proof verifier service
pub struct ProofVerifier {
    registry: Arc<SiteRegistry>,
    replay: Arc<ReplayGuard>,
    timelock: Arc<dyn TimeLockVerify>,
    key_ttl_secs: i64,
    old_key_grace_secs: i64,
}

impl ProofVerifier {
    pub fn new(
        registry: Arc<SiteRegistry>,
        replay: Arc<ReplayGuard>,
        timelock: Arc<dyn TimeLockVerify>,
        key_ttl_secs: i64,
        old_key_grace_secs: i64,
    ) -> Self {
        Self {
            registry,
            replay,
            timelock,
            key_ttl_secs,
            old_key_grace_secs,
        }
    }

    /// Validate a submitted proof triple against its site.
    ///
    /// Cheap rejections run strictly before expensive ones: field
    /// parsing, then the MAC over `x`, then the replay check, and only
    /// then the trapdoor computation.
    pub async fn verify(
        &self,
        api_key: &str,
        x_raw: &str,
        y_raw: &str,
        h_raw: &str,
    ) -> Result<ProofOutcome, TollError> {
        let x = parse_hex(x_raw).ok_or(TollError::MalformedProof("x"))?;
        let y = parse_hex(y_raw).ok_or(TollError::MalformedProof("y"))?;

        let site = self.registry.lookup_by_api_key(api_key).await?;

        // An attacker without the MAC key cannot get past this point, so
        // forged bases never reach the trapdoor check
        let our_h = challenge_mac(&site.hmac_key, format!("{x:x}").as_bytes())?;
        if URL_SAFE_NO_PAD.encode(our_h) != h_raw {
            return Err(TollError::InvalidSignature);
        }

        // A replayed proof fails deterministically and cheaply here
        if self.replay.exists(h_raw).await {
            return Err(TollError::AlreadyUsed);
        }

        let started = Instant::now();
        let is_correct = self.check_epochs(&site, &x, &y)?;
        let verify_time_ms = started.elapsed().as_secs_f64() * 1000.0;

        if is_correct {
            // Claim the nonce; of two racing identical submissions only
            // one may be admitted
            if !self.replay.claim(h_raw).await {
                return Err(TollError::AlreadyUsed);
            }

            tracing::info!(api_key = %api_key, verify_time_ms, "Proof verified");
        } else {
            // Deliberately not recorded: the client may retry a corrected
            // computation under the same challenge
            tracing::debug!(api_key = %api_key, "Proof incorrect");
        }

        Ok(ProofOutcome {
            is_correct,
            verify_time_ms,
        })
    }

    /// Trapdoor check against the current epoch, then the previous one
    /// while it is inside its grace window.
    fn check_epochs(&self, site: &Site, x: &BigUint, y: &BigUint) -> Result<bool, TollError> {
        if site.rsa_key.age_secs() < self.key_ttl_secs {
            let (p, q) = epoch_primes(&site.rsa_key)?;
            if self.timelock.verify(&p, &q, x, site.hardness, y) {
                return Ok(true);
            }
        } else {
            // Rotation is lazy, so a stale current epoch should not be
            // observable here; handled anyway rather than trusted
            tracing::warn!(api_key = %site.api_key, "Current RSA epoch past TTL, skipping");
        }

        if let Some(old) = &site.old_rsa_key {
            if old.age_secs() < self.old_key_grace_secs {
                let (p, q) = epoch_primes(old)?;
                return Ok(self.timelock.verify(&p, &q, x, site.hardness, y));
            }
            tracing::debug!(api_key = %site.api_key, "Previous RSA epoch past grace window, skipping");
        }

        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::puzzle::ChallengeGenerator;
    use crate::puzzle::vdf::{TrapdoorVerifier, eval};
    use crate::store::{MemoryStore, Store};
    use num_bigint::BigUint;
    use toll_common::Challenge;

    const TTL: i64 = 600;
    const GRACE: i64 = 1200;

    /// Capability stub with a fixed answer, for exercising epoch routing
    /// without big-integer work
    struct StubTimeLock(bool);

    impl TimeLockVerify for StubTimeLock {
        fn verify(&self, _: &BigUint, _: &BigUint, _: &BigUint, _: u64, _: &BigUint) -> bool {
            self.0
        }
    }

    struct Harness {
        registry: Arc<SiteRegistry>,
        generator: ChallengeGenerator,
        verifier: ProofVerifier,
    }

    fn harness_with(timelock: Arc<dyn TimeLockVerify>) -> Harness {
        let store = Store::Memory(MemoryStore::new());
        let registry = Arc::new(SiteRegistry::new(store.clone(), 256, TTL, 512));
        let replay = Arc::new(ReplayGuard::new(store, 1_000_000));
        Harness {
            registry: registry.clone(),
            generator: ChallengeGenerator::new(registry.clone(), replay.clone(), 0.0),
            verifier: ProofVerifier::new(registry, replay, timelock, TTL, GRACE),
        }
    }

    fn harness() -> Harness {
        harness_with(Arc::new(TrapdoorVerifier))
    }

    /// Do the client's work: t sequential squarings
    fn solve(challenge: &Challenge) -> String {
        let x = parse_hex(&challenge.x).unwrap();
        let n = parse_hex(&challenge.n).unwrap();
        format!("{:x}", eval(&x, &n, challenge.t))
    }

    #[tokio::test]
    async fn test_correct_proof_accepted_exactly_once() {
        let h = harness();
        let mut site = h.registry.create("test-agent").await.unwrap();
        let challenge = h.generator.issue(&mut site).await.unwrap();
        let y = solve(&challenge);

        let outcome = h
            .verifier
            .verify(&site.api_key, &challenge.x, &y, &challenge.h)
            .await
            .unwrap();
        assert!(outcome.is_correct);

        // identical resubmission is replay-rejected
        assert!(matches!(
            h.verifier
                .verify(&site.api_key, &challenge.x, &y, &challenge.h)
                .await,
            Err(TollError::AlreadyUsed)
        ));
    }

    #[tokio::test]
    async fn test_forged_signature_rejected_even_with_correct_solution() {
        let h = harness();
        let mut site = h.registry.create("test-agent").await.unwrap();
        let challenge = h.generator.issue(&mut site).await.unwrap();
        let y = solve(&challenge);

        let forged = URL_SAFE_NO_PAD.encode([0u8; 32]);
        assert!(matches!(
            h.verifier
                .verify(&site.api_key, &challenge.x, &y, &forged)
                .await,
            Err(TollError::InvalidSignature)
        ));

        // the untouched original still goes through afterwards
        let outcome = h
            .verifier
            .verify(&site.api_key, &challenge.x, &y, &challenge.h)
            .await
            .unwrap();
        assert!(outcome.is_correct);
    }

    #[tokio::test]
    async fn test_incorrect_solution_is_not_consumed() {
        let h = harness();
        let mut site = h.registry.create("test-agent").await.unwrap();
        let challenge = h.generator.issue(&mut site).await.unwrap();
        let y = solve(&challenge);

        let wrong = format!("{:x}", parse_hex(&y).unwrap() + BigUint::from(1u32));
        let outcome = h
            .verifier
            .verify(&site.api_key, &challenge.x, &wrong, &challenge.h)
            .await
            .unwrap();
        assert!(!outcome.is_correct);

        // the nonce was not burned; a corrected retry succeeds
        let outcome = h
            .verifier
            .verify(&site.api_key, &challenge.x, &y, &challenge.h)
            .await
            .unwrap();
        assert!(outcome.is_correct);
    }

    #[tokio::test]
    async fn test_malformed_fields_rejected_before_any_crypto() {
        let h = harness();
        let mut site = h.registry.create("test-agent").await.unwrap();
        let challenge = h.generator.issue(&mut site).await.unwrap();
        let y = solve(&challenge);

        assert!(matches!(
            h.verifier
                .verify(&site.api_key, "zz-not-hex", &y, &challenge.h)
                .await,
            Err(TollError::MalformedProof("x"))
        ));
        assert!(matches!(
            h.verifier.verify(&site.api_key, &challenge.x, "", &challenge.h).await,
            Err(TollError::MalformedProof("y"))
        ));

        // a garbage signature alongside a malformed field still reports
        // the parse failure, proving parsing runs first
        assert!(matches!(
            h.verifier
                .verify(&site.api_key, &challenge.x, "0xqq", "AAAA")
                .await,
            Err(TollError::MalformedProof("y"))
        ));
    }

    #[tokio::test]
    async fn test_unknown_site_rejected() {
        let h = harness();
        assert!(matches!(
            h.verifier.verify("no-such-site", "1a", "2b", "AAAA").await,
            Err(TollError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_grace_window_verifies_against_previous_epoch() {
        let h = harness();
        let mut site = h.registry.create("test-agent").await.unwrap();

        // challenge issued against the first epoch
        let challenge = h.generator.issue(&mut site).await.unwrap();
        let y = solve(&challenge);

        // epoch rotates while the client is still grinding squarings
        site.rsa_key.create_time -= TTL + 1;
        assert!(h.registry.rotate_if_due(&mut site).await.unwrap());

        let outcome = h
            .verifier
            .verify(&site.api_key, &challenge.x, &y, &challenge.h)
            .await
            .unwrap();
        assert!(outcome.is_correct, "old-epoch proof inside grace window");
    }

    #[tokio::test]
    async fn test_previous_epoch_past_grace_is_rejected() {
        // the capability says yes to everything; only the grace window
        // can say no
        let h = harness_with(Arc::new(StubTimeLock(true)));
        let mut site = h.registry.create("test-agent").await.unwrap();
        let challenge = h.generator.issue(&mut site).await.unwrap();

        site.rsa_key.create_time -= TTL + 1;
        assert!(h.registry.rotate_if_due(&mut site).await.unwrap());

        // age the previous epoch past its own grace window; the current
        // epoch must not recognize the proof either (different modulus),
        // so reject via the stub's routing only
        let mut expired = site.clone();
        expired.old_rsa_key.as_mut().unwrap().create_time -= GRACE;
        expired.rsa_key.create_time -= TTL;
        h.registry.save(&expired).await.unwrap();

        let outcome = h
            .verifier
            .verify(&site.api_key, &challenge.x, "2b", &challenge.h)
            .await
            .unwrap();
        assert!(!outcome.is_correct);
    }

    #[tokio::test]
    async fn test_stale_current_epoch_without_old_key_rejects() {
        // defensively skip a current epoch past its TTL even though the
        // capability would accept anything
        let h = harness_with(Arc::new(StubTimeLock(true)));
        let mut site = h.registry.create("test-agent").await.unwrap();
        let challenge = h.generator.issue(&mut site).await.unwrap();

        site.rsa_key.create_time -= TTL + 1;
        h.registry.save(&site).await.unwrap();

        let outcome = h
            .verifier
            .verify(&site.api_key, &challenge.x, "2b", &challenge.h)
            .await
            .unwrap();
        assert!(!outcome.is_correct);
    }

    /// The full admission scenario: create, issue, grind, redeem, replay,
    /// rotate.
    #[tokio::test]
    async fn test_end_to_end_admission_flow() {
        let h = harness();
        let mut site = h.registry.create("integration-agent").await.unwrap();

        let challenge = h.generator.issue(&mut site).await.unwrap();
        let y = solve(&challenge);

        let outcome = h
            .verifier
            .verify(&site.api_key, &challenge.x, &y, &challenge.h)
            .await
            .unwrap();
        assert!(outcome.is_correct);
        assert!(outcome.verify_time_ms >= 0.0);

        assert!(matches!(
            h.verifier
                .verify(&site.api_key, &challenge.x, &y, &challenge.h)
                .await,
            Err(TollError::AlreadyUsed)
        ));

        // past the TTL, the next challenge runs on a fresh modulus
        let mut site = h.registry.lookup_by_api_key(&site.api_key).await.unwrap();
        site.rsa_key.create_time -= TTL + 1;
        h.registry.save(&site).await.unwrap();
        let mut site = h.registry.lookup_by_api_key(&site.api_key).await.unwrap();

        let next = h.generator.issue(&mut site).await.unwrap();
        assert_ne!(next.n, challenge.n);
        assert_eq!(site.rsa_key_regenerate_count, 1);
    }
}
