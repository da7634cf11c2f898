//! Site identity and key-epoch lifecycle.
//!
//! A site is a tenant: its secret authenticates owner operations, its
//! api_key addresses it publicly, and its RSA epochs supply the puzzle
//! moduli. Records are loaded fresh from the store on every request and
//! written back whole; concurrent writers are last-write-wins (both
//! epochs a racing rotation can produce are honestly generated, and the
//! grace window covers solvers of either).

mod registry;

pub use registry::SiteRegistry;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use toll_common::TollError;

/// Derive the public api_key from raw secret bytes.
pub fn derive_api_key(secret: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(secret))
}

/// MAC over exactly one message with the site's base64url-encoded HMAC
/// key. Issuance and verification must feed this the identical message
/// bytes: the lowercase hex rendering of the challenge base, nothing else.
pub fn challenge_mac(hmac_key_b64: &str, msg: &[u8]) -> Result<Vec<u8>, TollError> {
    let key = URL_SAFE_NO_PAD
        .decode(hmac_key_b64)
        .map_err(|e| TollError::Storage(format!("corrupt hmac key: {e}")))?;

    let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(&key)
        .map_err(|e| TollError::Storage(format!("unusable hmac key: {e}")))?;
    mac.update(msg);
    Ok(mac.finalize().into_bytes().to_vec())
}
