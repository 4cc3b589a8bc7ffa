//! Resolution of private keys from their source, with optional memoization of
//! parsed keys so repeated signing doesn't re-read and re-parse them.

use crate::{error::Error, signing::PrivateKey};
use dashmap::DashMap;
use std::{future::Future, path::Path, sync::Arc};
use tracing::debug;

/// Supplies the PEM encoded bytes of a private key given an identifier for
/// it, eg. a file path
pub trait KeySource {
    /// Reads the key material, failing with [`Error::KeyUnavailable`] if it
    /// can't be found or read
    fn read(&self, source_id: &str) -> Result<Vec<u8>, Error>;
}

impl<F> KeySource for F
where
    F: Fn(&str) -> Result<Vec<u8>, Error>,
{
    fn read(&self, source_id: &str) -> Result<Vec<u8>, Error> {
        (self)(source_id)
    }
}

/// Reads keys from the local filesystem, the source id being the path
#[derive(Copy, Clone, Debug, Default)]
pub struct FileKeySource;

impl KeySource for FileKeySource {
    fn read(&self, source_id: &str) -> Result<Vec<u8>, Error> {
        std::fs::read(Path::new(source_id)).map_err(|err| Error::key_unavailable(source_id, err))
    }
}

/// A cache of parsed private keys, keyed by their source id.
///
/// The cache is unbounded, it is meant to hold the handful of credentials a
/// deployment uses. Concurrent misses for the same source may each parse the
/// key, the last one to finish wins.
#[derive(Debug)]
pub struct KeyCache {
    keys: Option<DashMap<String, Arc<PrivateKey>>>,
}

impl Default for KeyCache {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyCache {
    /// Creates an empty cache
    pub fn new() -> Self {
        Self {
            keys: Some(DashMap::new()),
        }
    }

    /// Creates a "cache" that never stores anything, every resolution reads
    /// and parses the key again
    pub fn disabled() -> Self {
        Self { keys: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.keys.is_some()
    }

    /// The number of keys currently cached
    pub fn len(&self) -> usize {
        self.keys.as_ref().map_or(0, |keys| keys.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes a single key, returning it if it was cached
    pub fn evict(&self, source_id: &str) -> Option<Arc<PrivateKey>> {
        self.keys
            .as_ref()
            .and_then(|keys| keys.remove(source_id))
            .map(|(_, key)| key)
    }

    /// Removes all cached keys
    pub fn clear(&self) {
        if let Some(keys) = &self.keys {
            keys.clear();
        }
    }

    /// Gets a previously cached key
    pub fn get(&self, source_id: &str) -> Option<Arc<PrivateKey>> {
        let key = self
            .keys
            .as_ref()
            .and_then(|keys| keys.get(source_id).map(|entry| entry.value().clone()));

        if self.is_enabled() {
            debug!(source_id, hit = key.is_some(), "key cache lookup");
        }

        key
    }

    fn insert(&self, source_id: &str, key: PrivateKey) -> Arc<PrivateKey> {
        let key = Arc::new(key);

        if let Some(keys) = &self.keys {
            debug!(source_id, "caching parsed key");
            keys.insert(source_id.to_owned(), key.clone());
        }

        key
    }

    /// Resolves the key identified by `source_id` from its PEM bytes. If the
    /// key is already cached the bytes are not parsed again.
    pub fn resolve(&self, source_id: &str, pem: &[u8]) -> Result<Arc<PrivateKey>, Error> {
        if let Some(key) = self.get(source_id) {
            return Ok(key);
        }

        Ok(self.insert(source_id, PrivateKey::from_pem(pem)?))
    }

    /// Resolves the key identified by `source_id`, only reading it from the
    /// source if it is not already cached
    pub fn load<S: KeySource + ?Sized>(
        &self,
        source: &S,
        source_id: &str,
    ) -> Result<Arc<PrivateKey>, Error> {
        if let Some(key) = self.get(source_id) {
            return Ok(key);
        }

        let pem = source.read(source_id)?;
        Ok(self.insert(source_id, PrivateKey::from_pem(pem)?))
    }

    /// Same as [`KeyCache::load`], but the key material is fetched by a
    /// future, so that many signers waiting on key I/O don't block each other.
    /// `fetch` is only invoked on a cache miss.
    pub async fn load_async<F, Fut>(
        &self,
        source_id: &str,
        fetch: F,
    ) -> Result<Arc<PrivateKey>, Error>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<Vec<u8>, Error>>,
    {
        if let Some(key) = self.get(source_id) {
            return Ok(key);
        }

        let pem = fetch(source_id.to_owned()).await?;
        Ok(self.insert(source_id, PrivateKey::from_pem(pem)?))
    }
}
