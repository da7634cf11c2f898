//! Challenge issuance.

use std::sync::Arc;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::Rng;
use toll_common::{Challenge, Site, TollError};

use crate::replay::ReplayGuard;
use crate::sites::{SiteRegistry, challenge_mac};

use super::vdf::epoch_modulus;

/// Challenge generator service
pub struct ChallengeGenerator {
    registry: Arc<SiteRegistry>,
    replay: Arc<ReplayGuard>,
    sweep_probability: f64,
}

impl ChallengeGenerator {
    pub fn new(
        registry: Arc<SiteRegistry>,
        replay: Arc<ReplayGuard>,
        sweep_probability: f64,
    ) -> Self {
        Self {
            registry,
            replay,
            sweep_probability,
        }
    }

    /// Issue a puzzle for `site`, rotating its RSA epoch first when due.
    ///
    /// Nothing is recorded in the replay store here: only a successfully
    /// verified proof consumes a nonce, so unredeemed challenges never
    /// pollute it.
    pub async fn issue(&self, site: &mut Site) -> Result<Challenge, TollError> {
        if self.registry.rotate_if_due(site).await? {
            tracing::debug!(api_key = %site.api_key, "Issuing challenge on freshly rotated epoch");
        }

        // 63-bit base: wide enough that enumerating solutions cannot
        // undercut the puzzle's intended cost
        let x: u64 = rand::rng().random::<u64>() >> 1;
        let x_hex = format!("{x:x}");

        let n = epoch_modulus(&site.rsa_key)?;
        let h = challenge_mac(&site.hmac_key, x_hex.as_bytes())?;

        // Reclaim stale nonce buckets off the request path
        let replay = self.replay.clone();
        let probability = self.sweep_probability;
        tokio::spawn(async move {
            replay.sweep(probability).await;
        });

        Ok(Challenge {
            x: x_hex,
            h: URL_SAFE_NO_PAD.encode(h),
            n: format!("{n:x}"),
            t: site.hardness,
        })
    }
}
