//! Core types shared across Tollgate components.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::TollError;
use crate::constants::store_keys;

/// One generation of a site's RSA modulus.
///
/// The primes are stored as lowercase hex and parsed into big integers on
/// use. `create_time` anchors both the rotation TTL and the previous-epoch
/// grace window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RsaEpoch {
    /// First secret prime, lowercase hex
    pub p: String,

    /// Second secret prime, lowercase hex
    pub q: String,

    /// Creation timestamp (Unix epoch seconds)
    pub create_time: i64,
}

impl RsaEpoch {
    /// Seconds elapsed since this epoch was generated
    pub fn age_secs(&self) -> i64 {
        Utc::now().timestamp() - self.create_time
    }
}

/// A tenant's cryptographic identity and puzzle configuration.
///
/// Persisted whole under `site/{api_key}`. The relation
/// `api_key == sha256(secret)` is never stored as a separate fact:
/// recomputing it from a presented secret IS the authentication check for
/// owner operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Site {
    /// base64url of 32 random bytes, known only to the owner
    pub secret_key: String,

    /// base64url of SHA-256(secret bytes); public identifier and storage key
    pub api_key: String,

    /// Current RSA epoch
    pub rsa_key: RsaEpoch,

    /// Previous RSA epoch, kept so solvers holding a challenge issued just
    /// before rotation can still redeem their proof
    pub old_rsa_key: Option<RsaEpoch>,

    /// Completed rotations, strictly increasing
    pub rsa_key_regenerate_count: u32,

    /// Number of sequential squarings a client must perform
    pub hardness: u64,

    /// base64url of 16 random bytes; MACs challenge bases, fixed for the
    /// site's lifetime and independent of RSA rotation
    pub hmac_key: String,

    /// Creation timestamp (Unix epoch seconds)
    pub create_time: i64,

    /// Provenance only
    pub creator_user_agent: String,
}

impl Site {
    /// True once the current epoch has aged past `ttl_secs`
    pub fn rotation_due(&self, ttl_secs: i64) -> bool {
        self.rsa_key.age_secs() >= ttl_secs
    }

    /// Storage key for this site's record
    pub fn store_key(&self) -> String {
        format!("{}{}", store_keys::SITE_PREFIX, self.api_key)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, TollError> {
        serde_json::to_vec(self).map_err(|e| TollError::Storage(e.to_string()))
    }

    pub fn from_bytes(raw: &[u8]) -> Result<Self, TollError> {
        serde_json::from_slice(raw).map_err(|e| TollError::Storage(e.to_string()))
    }
}

/// Puzzle data returned to a client. `h` doubles as the one-time nonce
/// identifier once the proof is redeemed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Challenge {
    /// Puzzle base, lowercase hex
    pub x: String,

    /// base64url MAC over the hex rendering of `x`
    pub h: String,

    /// Modulus of the active epoch, lowercase hex
    pub n: String,

    /// Iteration count (the site's hardness)
    pub t: u64,
}
