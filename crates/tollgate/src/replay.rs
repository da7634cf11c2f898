//! Replay prevention for redeemed proofs.
//!
//! A verified proof's signature `h` becomes a one-time nonce. Records are
//! keyed by a coarse time bucket so reclamation can drop whole buckets at
//! once: lookup and retention both cover exactly the bucket containing
//! "now" and the one before it, which keeps a nonce rejectable across a
//! bucket boundary.

use std::sync::atomic::{AtomicBool, Ordering};

use rand::Rng;
use tokio::sync::Mutex;
use toll_common::constants::store_keys::NONCE_PREFIX;

use crate::store::Store;

pub struct ReplayGuard {
    store: Store,
    bucket_secs: i64,

    /// At most one sweep pass runs at a time; an overlapping trigger is a
    /// silent no-op
    sweeping: AtomicBool,

    /// Serializes claim's check-then-write so racing identical proofs
    /// cannot both be admitted
    claim_lock: Mutex<()>,
}

impl ReplayGuard {
    pub fn new(store: Store, bucket_secs: i64) -> Self {
        Self {
            store,
            bucket_secs,
            sweeping: AtomicBool::new(false),
            claim_lock: Mutex::new(()),
        }
    }

    fn bucket(&self, ts: i64) -> i64 {
        ts / self.bucket_secs
    }

    fn key_for(&self, bucket: i64, nonce: &str) -> String {
        format!("{NONCE_PREFIX}{bucket}-{nonce}")
    }

    /// Membership check across the two kept buckets. A storage failure
    /// degrades to "not seen": the guard must never turn a store outage
    /// into denial of service.
    pub async fn exists(&self, nonce: &str) -> bool {
        let now_bucket = self.bucket(chrono::Utc::now().timestamp());

        for bucket in [now_bucket, now_bucket - 1] {
            match self.store.key_exists(&self.key_for(bucket, nonce)).await {
                Ok(true) => return true,
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "Replay lookup failed, treating nonce as unseen");
                }
            }
        }
        false
    }

    /// Record a nonce, admitting it only if it was not already present.
    ///
    /// Returns false when the nonce was seen before: of two racing
    /// identical submissions exactly one claim wins. A write failure is
    /// logged and swallowed — the proof is still admitted, since replay
    /// bookkeeping must never crash the verifier.
    pub async fn claim(&self, nonce: &str) -> bool {
        let _guard = self.claim_lock.lock().await;

        if self.exists(nonce).await {
            return false;
        }

        let now = chrono::Utc::now().timestamp();
        let key = self.key_for(self.bucket(now), nonce);
        match self.store.put(&key, now.to_string().as_bytes()).await {
            Ok(()) => tracing::debug!(key = %key, "Recorded nonce"),
            Err(e) => tracing::warn!(key = %key, error = %e, "Unable to record nonce"),
        }
        true
    }

    /// With the given probability, reclaim nonce buckets outside the
    /// retention window.
    pub async fn sweep(&self, probability: f64) {
        if rand::rng().random::<f64>() >= probability {
            return;
        }

        if self
            .sweeping
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Replay sweep already in progress, skipping");
            return;
        }

        self.sweep_pass().await;

        self.sweeping.store(false, Ordering::Release);
    }

    async fn sweep_pass(&self) {
        let keys = match self.store.list(NONCE_PREFIX).await {
            Ok(keys) => keys,
            Err(e) => {
                tracing::warn!(error = %e, "Replay sweep failed to list nonce keys");
                return;
            }
        };

        let now_bucket = self.bucket(chrono::Utc::now().timestamp());
        let kept = [
            format!("{NONCE_PREFIX}{now_bucket}-"),
            format!("{NONCE_PREFIX}{}-", now_bucket - 1),
        ];

        let mut removed = 0usize;
        for key in keys {
            if kept.iter().any(|prefix| key.starts_with(prefix)) {
                continue;
            }
            match self.store.delete(&key).await {
                Ok(()) => removed += 1,
                Err(e) => tracing::warn!(key = %key, error = %e, "Unable to delete stale nonce"),
            }
        }

        tracing::info!(removed, "Replay sweep complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    // Wide buckets so the current bucket cannot roll over mid-test
    const BUCKET_SECS: i64 = 1_000_000;

    fn now_bucket() -> i64 {
        chrono::Utc::now().timestamp() / BUCKET_SECS
    }

    #[tokio::test]
    async fn test_claim_admits_once() {
        let guard = ReplayGuard::new(Store::Memory(MemoryStore::new()), BUCKET_SECS);

        assert!(!guard.exists("h1").await);
        assert!(guard.claim("h1").await);
        assert!(guard.exists("h1").await);
        assert!(!guard.claim("h1").await);
    }

    #[tokio::test]
    async fn test_racing_claims_admit_at_most_one() {
        let guard = Arc::new(ReplayGuard::new(
            Store::Memory(MemoryStore::new()),
            BUCKET_SECS,
        ));

        let a = tokio::spawn({
            let g = guard.clone();
            async move { g.claim("h-race").await }
        });
        let b = tokio::spawn({
            let g = guard.clone();
            async move { g.claim("h-race").await }
        });

        let (a, b) = (a.await.unwrap(), b.await.unwrap());
        assert!(a ^ b);
    }

    #[tokio::test]
    async fn test_lookup_straddles_bucket_boundary() {
        let store = Store::Memory(MemoryStore::new());
        let guard = ReplayGuard::new(store.clone(), BUCKET_SECS);

        // a nonce recorded just before a rollover lands in the previous
        // bucket; the two-bucket lookup must still find it
        let prev = now_bucket() - 1;
        store
            .put(&format!("nonce/{prev}-h2"), b"0")
            .await
            .unwrap();

        assert!(guard.exists("h2").await);
        assert!(!guard.claim("h2").await);
    }

    #[tokio::test]
    async fn test_nonce_two_buckets_back_is_forgotten() {
        let store = Store::Memory(MemoryStore::new());
        let guard = ReplayGuard::new(store.clone(), BUCKET_SECS);

        let stale = now_bucket() - 2;
        store
            .put(&format!("nonce/{stale}-h5"), b"0")
            .await
            .unwrap();

        assert!(!guard.exists("h5").await);
    }

    #[tokio::test]
    async fn test_sweep_retains_exactly_two_buckets() {
        let store = Store::Memory(MemoryStore::new());
        let guard = ReplayGuard::new(store.clone(), BUCKET_SECS);

        let now = now_bucket();
        for bucket in [now, now - 1, now - 2, now - 48] {
            store
                .put(&format!("nonce/{bucket}-h3"), b"0")
                .await
                .unwrap();
        }

        guard.sweep(1.0).await;

        let mut keys = store.list("nonce/").await.unwrap();
        keys.sort();
        let mut expected = vec![
            format!("nonce/{now}-h3"),
            format!("nonce/{}-h3", now - 1),
        ];
        expected.sort();
        assert_eq!(keys, expected);
    }

    #[tokio::test]
    async fn test_sweep_probability_zero_never_runs() {
        let store = Store::Memory(MemoryStore::new());
        let guard = ReplayGuard::new(store.clone(), BUCKET_SECS);

        store.put("nonce/1-h4", b"0").await.unwrap();
        guard.sweep(0.0).await;

        assert_eq!(store.list("nonce/").await.unwrap().len(), 1);
    }
}
