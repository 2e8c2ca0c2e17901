//! Session cache of extended public keys
use crate::CryptoProviderError;
use adasign_core::{
    bip32::ExtendedPublicKey,
    types::{harden, is_hardened, DerivationPath},
};
use async_trait::async_trait;
use futures_util::lock::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, trace};

/// Highest account index exported alongside a requested account in bulk mode
pub const MAX_BULK_EXPORT_ACCOUNT: u32 = 4;

/// Key derivation scheme of a provider
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivationScheme {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub ed25519_mode: u8,
    pub key_file_version: &'static str,
}

impl DerivationScheme {
    /// BIP32-Ed25519 derivation scheme V2, used by every Shelley era wallet
    pub const V2: DerivationScheme =
        DerivationScheme { kind: "v2", ed25519_mode: 2, key_file_version: "2.0.0" };
}

/// A backend able to export extended public keys for hardened paths
#[async_trait]
pub trait ExtendedPublicKeySource: Send + Sync {
    /// Exports one key per path, in request order
    async fn export_xpubs(
        &self,
        paths: &[DerivationPath],
    ) -> Result<Vec<ExtendedPublicKey>, CryptoProviderError>;
}

/// Paths exported from the backend in one call
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeriveBatch {
    paths: Vec<DerivationPath>,
}

impl DeriveBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a path, ignoring duplicates
    pub fn push(&mut self, path: DerivationPath) {
        if !self.paths.contains(&path) {
            self.paths.push(path);
        }
    }

    pub fn paths(&self) -> &[DerivationPath] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Derives extended public keys, memoizing them per path for the lifetime of the provider.
///
/// Only the hardened prefix of a path is requested from the backend; soft suffixes are derived
/// locally from the cached parent key. The cache lock is held across the backend call, so two
/// concurrent misses on the same path end up in a single backend request.
#[derive(Debug)]
pub struct CachedDeriveXpub {
    bulk_export: bool,
    cache: Mutex<HashMap<DerivationPath, ExtendedPublicKey>>,
}

impl CachedDeriveXpub {
    /// `bulk_export` must already account for the backend supporting it
    pub fn new(bulk_export: bool) -> Self {
        Self { bulk_export, cache: Mutex::new(HashMap::new()) }
    }

    pub fn bulk_export(&self) -> bool {
        self.bulk_export
    }

    /// Number of cached keys
    pub async fn len(&self) -> usize {
        self.cache.lock().await.len()
    }

    pub async fn derive<S>(
        &self,
        path: &DerivationPath,
        source: &S,
    ) -> Result<ExtendedPublicKey, CryptoProviderError>
    where
        S: ExtendedPublicKeySource + ?Sized,
    {
        let mut cache = self.cache.lock().await;
        if let Some(xpub) = cache.get(path) {
            return Ok(*xpub)
        }

        let prefix = path.prefix(path.hardened_prefix_len());
        let parent = match cache.get(&prefix) {
            Some(xpub) => *xpub,
            None => {
                let batch = self.batch_for(&prefix, &cache);
                debug!(paths = batch.len(), "exporting extended public keys");
                let xpubs = source.export_xpubs(batch.paths()).await?;
                if xpubs.len() != batch.len() {
                    return Err(CryptoProviderError::UnexpectedResponse(format!(
                        "requested {} public keys, got {}",
                        batch.len(),
                        xpubs.len()
                    )))
                }
                let mut parent = None;
                for (batch_path, xpub) in batch.paths.into_iter().zip(xpubs) {
                    if batch_path == prefix {
                        parent = Some(xpub);
                    }
                    cache.insert(batch_path, xpub);
                }
                parent.ok_or_else(|| {
                    CryptoProviderError::UnexpectedResponse("batch lost the requested path".into())
                })?
            }
        };

        let xpub = parent.derive_path(&path.as_slice()[prefix.len()..])?;
        trace!(%path, %xpub, "derived extended public key");
        cache.insert(path.clone(), xpub);
        Ok(xpub)
    }

    /// The paths to export for a hardened `path`: the path itself and, in bulk mode, the uncached
    /// sibling accounts `0..=MAX_BULK_EXPORT_ACCOUNT` of an account level path.
    fn batch_for(
        &self,
        path: &DerivationPath,
        cache: &HashMap<DerivationPath, ExtendedPublicKey>,
    ) -> DeriveBatch {
        let mut batch = DeriveBatch::new();
        batch.push(path.clone());
        let account_level = path.len() == 3 && path.as_slice().iter().all(|i| is_hardened(*i));
        if !self.bulk_export || !account_level {
            return batch
        }
        if let Some(parent) = path.parent() {
            for account in 0..=MAX_BULK_EXPORT_ACCOUNT {
                let sibling = parent.child(harden(account));
                if !cache.contains_key(&sibling) {
                    batch.push(sibling);
                }
            }
        }
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adasign_core::bip32::{ExtendedPrivateKey, XPRV_LENGTH};
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    #[derive(Debug, Default)]
    struct CountingSource {
        calls: AtomicUsize,
        requested: std::sync::Mutex<Vec<DerivationPath>>,
        fail: bool,
    }

    fn root() -> ExtendedPrivateKey {
        let mut bytes = [7u8; XPRV_LENGTH];
        bytes[0] &= 0xf8;
        bytes[31] &= 0x1f;
        bytes[31] |= 0x40;
        ExtendedPrivateKey::from_bytes(bytes)
    }

    #[async_trait]
    impl ExtendedPublicKeySource for CountingSource {
        async fn export_xpubs(
            &self,
            paths: &[DerivationPath],
        ) -> Result<Vec<ExtendedPublicKey>, CryptoProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requested.lock().unwrap().extend_from_slice(paths);
            if self.fail {
                return Err(CryptoProviderError::BackendOperationFailed("unplugged".into()))
            }
            Ok(paths.iter().map(|path| root().derive_path(path).to_public()).collect())
        }
    }

    #[tokio::test]
    async fn second_derivation_hits_the_cache() {
        let source = CountingSource::default();
        let cache = CachedDeriveXpub::new(false);
        let path: DerivationPath = "m/1852'/1815'/0'/0/3".parse().unwrap();

        let first = cache.derive(&path, &source).await.unwrap();
        let second = cache.derive(&path, &source).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first, root().derive_path(&path).to_public());
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        // a sibling address shares the cached account key
        cache.derive(&"m/1852'/1815'/0'/2/0".parse().unwrap(), &source).await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(*source.requested.lock().unwrap(), vec![DerivationPath::shelley_account(0)]);
    }

    #[tokio::test]
    async fn bulk_mode_exports_sibling_accounts_once() {
        let source = CountingSource::default();
        let cache = CachedDeriveXpub::new(true);

        cache.derive(&DerivationPath::shelley_account(1), &source).await.unwrap();
        assert_eq!(source.requested.lock().unwrap().len(), MAX_BULK_EXPORT_ACCOUNT as usize + 1);

        for account in 0..=MAX_BULK_EXPORT_ACCOUNT {
            cache.derive(&DerivationPath::shelley_account(account), &source).await.unwrap();
        }
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failures_leave_the_cache_untouched() {
        let source = CountingSource { fail: true, ..Default::default() };
        let cache = CachedDeriveXpub::new(true);
        let err = cache.derive(&DerivationPath::byron_account(0), &source).await.unwrap_err();
        assert!(matches!(err, CryptoProviderError::BackendOperationFailed(_)));
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test]
    async fn concurrent_misses_coalesce() {
        let source = Arc::new(CountingSource::default());
        let cache = Arc::new(CachedDeriveXpub::new(false));
        let path: DerivationPath = "m/44'/1815'/0'/0/0".parse().unwrap();

        let (a, b) = futures_util::join!(
            cache.derive(&path, source.as_ref()),
            cache.derive(&path, source.as_ref())
        );
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn batch_ignores_duplicates() {
        let mut batch = DeriveBatch::new();
        batch.push(DerivationPath::shelley_account(0));
        batch.push(DerivationPath::shelley_account(0));
        assert_eq!(batch.len(), 1);
    }
}
