//! Shared constants for Tollgate components.

/// Default HTTP listen address
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8090";

/// Default Redis connection URL
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

/// RSA modulus size for site epochs, in bits
pub const DEFAULT_RSA_KEY_BITS: usize = 512;

/// Lifetime of a site's current RSA epoch (10 minutes)
pub const DEFAULT_RSA_KEY_TTL_SECS: i64 = 600;

/// Validity window of the previous epoch, measured from its own creation
/// time: one TTL spent as the active epoch plus one TTL of overlap for
/// solvers in flight at rotation.
pub const DEFAULT_OLD_KEY_GRACE_SECS: i64 = 2 * DEFAULT_RSA_KEY_TTL_SECS;

/// Default puzzle hardness. Roughly 100ms of sequential squarings on a
/// 2020-era consumer CPU.
pub const DEFAULT_HARDNESS: u64 = (1 << 22) - 1;

/// Width of a replay-store time bucket (1 hour). Lookup and sweeping both
/// cover exactly the bucket containing "now" and the one before it.
pub const DEFAULT_NONCE_BUCKET_SECS: i64 = 3600;

/// Probability that a challenge issuance triggers a replay-store sweep
pub const DEFAULT_SWEEP_PROBABILITY: f64 = 0.01;

/// Storage key prefixes
pub mod store_keys {
    /// Site records: site/{api_key}
    pub const SITE_PREFIX: &str = "site/";

    /// Replay records: nonce/{bucket}-{nonce}
    pub const NONCE_PREFIX: &str = "nonce/";
}
