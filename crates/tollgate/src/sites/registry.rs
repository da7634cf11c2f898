//! Site registry: creation, secret-based lookup, and epoch rotation.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::Rng;
use rsa::RsaPrivateKey;
use rsa::traits::PrivateKeyParts;
use toll_common::constants::store_keys::SITE_PREFIX;
use toll_common::{RsaEpoch, Site, TollError};

use crate::store::Store;

use super::derive_api_key;

/// Owns site records: identity derivation, persistence, and the lazy RSA
/// epoch rotation policy.
pub struct SiteRegistry {
    store: Store,
    key_bits: usize,
    key_ttl_secs: i64,
    default_hardness: u64,
}

impl SiteRegistry {
    pub fn new(store: Store, key_bits: usize, key_ttl_secs: i64, default_hardness: u64) -> Self {
        Self {
            store,
            key_bits,
            key_ttl_secs,
            default_hardness,
        }
    }

    /// Create and persist a new site.
    ///
    /// The record is only written once it is fully formed; a failed key
    /// generation leaves nothing behind.
    pub async fn create(&self, user_agent: &str) -> Result<Site, TollError> {
        let mut secret = [0u8; 32];
        rand::rng().fill(&mut secret);

        let mut hmac_key = [0u8; 16];
        rand::rng().fill(&mut hmac_key);

        let rsa_key = generate_epoch(self.key_bits)?;

        let site = Site {
            secret_key: URL_SAFE_NO_PAD.encode(secret),
            api_key: derive_api_key(&secret),
            rsa_key,
            old_rsa_key: None,
            rsa_key_regenerate_count: 0,
            hardness: self.default_hardness,
            hmac_key: URL_SAFE_NO_PAD.encode(hmac_key),
            create_time: chrono::Utc::now().timestamp(),
            creator_user_agent: user_agent.to_string(),
        };

        self.save(&site).await?;

        tracing::info!(api_key = %site.api_key, "Site created");

        Ok(site)
    }

    pub async fn lookup_by_api_key(&self, api_key: &str) -> Result<Site, TollError> {
        let raw = self.store.get(&format!("{SITE_PREFIX}{api_key}")).await?;
        Site::from_bytes(&raw)
    }

    /// Authentication path for owner operations: a presented secret that
    /// hashes to a stored api_key proves ownership.
    pub async fn lookup_by_secret(&self, secret_b64: &str) -> Result<Site, TollError> {
        let secret = URL_SAFE_NO_PAD
            .decode(secret_b64)
            .map_err(|e| TollError::InvalidSecret(e.to_string()))?;
        self.lookup_by_api_key(&derive_api_key(&secret)).await
    }

    pub async fn update_hardness(&self, site: &mut Site, hardness: u64) -> Result<(), TollError> {
        site.hardness = hardness;
        self.save(site).await
    }

    /// Rotate the RSA epoch if the current one has aged past its TTL.
    ///
    /// The replacement epoch is generated before anything is mutated, so a
    /// generation failure leaves the site exactly as loaded. Returns
    /// whether a rotation occurred (and was persisted).
    pub async fn rotate_if_due(&self, site: &mut Site) -> Result<bool, TollError> {
        if !site.rotation_due(self.key_ttl_secs) {
            return Ok(false);
        }

        let fresh = generate_epoch(self.key_bits)?;

        site.old_rsa_key = Some(std::mem::replace(&mut site.rsa_key, fresh));
        site.rsa_key_regenerate_count += 1;

        self.save(site).await?;

        tracing::info!(
            api_key = %site.api_key,
            rotation = site.rsa_key_regenerate_count,
            "RSA epoch rotated"
        );

        Ok(true)
    }

    pub async fn save(&self, site: &Site) -> Result<(), TollError> {
        self.store.put(&site.store_key(), &site.to_bytes()?).await
    }
}

/// Generate a fresh RSA epoch with a modulus of `bits` total size.
fn generate_epoch(bits: usize) -> Result<RsaEpoch, TollError> {
    let key = RsaPrivateKey::new(&mut rand_core::OsRng, bits)
        .map_err(|e| TollError::KeyGeneration(e.to_string()))?;

    let primes = key.primes();
    Ok(RsaEpoch {
        p: format!("{:x}", primes[0]),
        q: format!("{:x}", primes[1]),
        create_time: chrono::Utc::now().timestamp(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    // Small moduli keep test key generation fast
    const TEST_KEY_BITS: usize = 256;

    fn test_registry() -> SiteRegistry {
        SiteRegistry::new(
            Store::Memory(MemoryStore::new()),
            TEST_KEY_BITS,
            600,
            1 << 10,
        )
    }

    #[tokio::test]
    async fn test_create_derives_api_key_from_secret() {
        let registry = test_registry();
        let site = registry.create("test-agent").await.unwrap();

        let secret = URL_SAFE_NO_PAD.decode(&site.secret_key).unwrap();
        assert_eq!(site.api_key, derive_api_key(&secret));
        assert_eq!(site.rsa_key_regenerate_count, 0);
        assert_eq!(site.hardness, 1 << 10);
        assert!(site.old_rsa_key.is_none());

        let loaded = registry.lookup_by_secret(&site.secret_key).await.unwrap();
        assert_eq!(loaded.api_key, site.api_key);
    }

    #[tokio::test]
    async fn test_lookup_with_wrong_secret_fails() {
        let registry = test_registry();
        let site = registry.create("test-agent").await.unwrap();

        let other = URL_SAFE_NO_PAD.encode([7u8; 32]);
        assert!(matches!(
            registry.lookup_by_secret(&other).await,
            Err(TollError::NotFound(_))
        ));
        assert!(matches!(
            registry.lookup_by_secret("not base64url!").await,
            Err(TollError::InvalidSecret(_))
        ));

        // the right secret still resolves
        assert!(registry.lookup_by_secret(&site.secret_key).await.is_ok());
    }

    #[tokio::test]
    async fn test_rotation_is_noop_inside_ttl() {
        let registry = test_registry();
        let mut site = registry.create("test-agent").await.unwrap();

        assert!(!registry.rotate_if_due(&mut site).await.unwrap());
        assert_eq!(site.rsa_key_regenerate_count, 0);
        assert!(site.old_rsa_key.is_none());
    }

    #[tokio::test]
    async fn test_rotation_demotes_expired_epoch() {
        let registry = test_registry();
        let mut site = registry.create("test-agent").await.unwrap();

        let stale_p = site.rsa_key.p.clone();
        site.rsa_key.create_time -= 601;

        assert!(registry.rotate_if_due(&mut site).await.unwrap());
        assert_eq!(site.rsa_key_regenerate_count, 1);
        assert_eq!(site.old_rsa_key.as_ref().unwrap().p, stale_p);
        assert_ne!(site.rsa_key.p, stale_p);

        // the rotated record was persisted
        let loaded = registry.lookup_by_api_key(&site.api_key).await.unwrap();
        assert_eq!(loaded.rsa_key_regenerate_count, 1);

        // a freshly rotated epoch is inside its TTL again
        assert!(!registry.rotate_if_due(&mut site).await.unwrap());
        assert_eq!(site.rsa_key_regenerate_count, 1);
    }

    #[tokio::test]
    async fn test_update_hardness_persists() {
        let registry = test_registry();
        let mut site = registry.create("test-agent").await.unwrap();

        registry.update_hardness(&mut site, 4242).await.unwrap();

        let loaded = registry.lookup_by_api_key(&site.api_key).await.unwrap();
        assert_eq!(loaded.hardness, 4242);
    }
}
