//! Generation outcomes and the per-key caches.
//!
//! Cache keys are not the file paths themselves: a key is
//! `sha256(secret ‖ path)` where the secret is 32 random bytes drawn once per
//! process. The derived key is safe to hand to browsers as an image
//! identifier: it does not leak the path and cannot be forged without the
//! secret. The secret is never persisted; neither is the cache, so losing it
//! on restart costs nothing.
//!
//! [`ResultCache`] holds thumbnail generation outcomes, including permanent
//! failures (a failed key is never retried for the process lifetime — the
//! system has no way to tell a permanently unsupported file from a transient
//! tool glitch). [`ConversionCache`] memoizes full-resolution picture
//! conversions computed lazily on first read.

use std::fmt;
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use dashmap::DashMap;
use rand::Rng as _;
use sha2::{Digest, Sha256};

use crate::error::ThumbqError;

/// A derived, externally shareable cache key: `sha256(secret ‖ path)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey([u8; 32]);

impl CacheKey {
    /// URL-safe base64 form (no padding), as used in image URLs.
    pub fn to_base64(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.0)
    }

    /// Parse the textual form back into a key. Returns `None` for anything
    /// that is not exactly a 32-byte URL-safe base64 string.
    pub fn from_base64(text: &str) -> Option<Self> {
        let bytes = URL_SAFE_NO_PAD.decode(text).ok()?;
        Some(CacheKey(bytes.try_into().ok()?))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64())
    }
}

/// Derives cache keys from paths using a process-lifetime secret.
pub struct KeyDeriver {
    secret: [u8; 32],
}

impl Default for KeyDeriver {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyDeriver {
    /// Create a deriver with a fresh random secret.
    pub fn new() -> Self {
        let mut secret = [0u8; 32];
        rand::rng().fill(&mut secret);
        Self { secret }
    }

    /// Derive the cache key for `path`.
    pub fn derive(&self, path: &str) -> CacheKey {
        let mut hasher = Sha256::new();
        hasher.update(self.secret);
        hasher.update(path.as_bytes());
        CacheKey(hasher.finalize().into())
    }
}

/// A successfully generated thumbnail and the stream facts that came with it.
#[derive(Debug)]
pub struct Thumbnail {
    /// Codec of the source's first video stream.
    pub codec_name: String,
    /// Source duration in seconds; `None` for still images.
    pub duration: Option<f64>,
    /// Pixel format of the source stream.
    pub pixel_format: String,
    /// Whether the source is a still image (serving layers link these to a
    /// full-resolution conversion instead of a player).
    pub is_still_image: bool,
    /// Encoded JPEG payload.
    pub bytes: Vec<u8>,
}

/// Outcome of one generation attempt for a key.
///
/// `Failed` is terminal: once recorded it is served from the cache on every
/// subsequent read without re-invoking the tool, for the process lifetime.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Generation succeeded.
    Ready(Arc<Thumbnail>),
    /// Generation failed permanently; surfaced as "no thumbnail available".
    Failed,
}

/// Map from derived key to generation outcome. Reads never block behind a
/// generation in progress; a missing entry for an in-flight key simply means
/// "not ready yet".
#[derive(Default)]
pub struct ResultCache {
    map: DashMap<CacheKey, Outcome>,
}

impl ResultCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the outcome for a derived key.
    pub fn get(&self, key: &CacheKey) -> Option<Outcome> {
        self.map.get(key).map(|entry| entry.clone())
    }

    /// Returns `true` if the key has any recorded outcome.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.map.contains_key(key)
    }

    /// Record the outcome for a derived key.
    ///
    /// Workers must call this *before* releasing the key in the queue, so a
    /// resubmission that lands after the release observes the decision of at
    /// most one concurrent generation.
    pub fn put(&self, key: CacheKey, outcome: Outcome) {
        self.map.insert(key, outcome);
    }

    /// Number of cached outcomes (successes and failures).
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns `true` if nothing has been cached yet.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// A memoized full-resolution picture conversion.
#[derive(Debug, Clone)]
pub enum Converted {
    /// The converted image bytes.
    Ready(Arc<Vec<u8>>),
    /// Conversion failed; memoized so the tool is not re-invoked on every
    /// read.
    Failed,
}

/// Lazy memoization of full-resolution picture conversions.
///
/// Conversions are comparatively rare and idempotent, so no in-flight
/// deduplication is done: two concurrent first reads may both convert, but
/// the first recorded result wins and every caller settles on it.
#[derive(Default)]
pub struct ConversionCache {
    map: DashMap<CacheKey, Converted>,
}

impl ConversionCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the memoized conversion for `key`, computing it with `convert`
    /// on first access. Failures are memoized too.
    pub fn get_or_compute<F>(&self, key: CacheKey, convert: F) -> Converted
    where
        F: FnOnce() -> Result<Vec<u8>, ThumbqError>,
    {
        if let Some(entry) = self.map.get(&key) {
            return entry.clone();
        }
        // Deliberately computed outside any map lock; see type docs.
        let converted = match convert() {
            Ok(bytes) => Converted::Ready(Arc::new(bytes)),
            Err(error) => {
                log::warn!("picture conversion failed for {key}: {error}");
                Converted::Failed
            }
        };
        self.map.entry(key).or_insert(converted).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_keys_are_stable_and_path_sensitive() {
        let deriver = KeyDeriver::new();
        assert_eq!(deriver.derive("/a/b.mkv"), deriver.derive("/a/b.mkv"));
        assert_ne!(deriver.derive("/a/b.mkv"), deriver.derive("/a/c.mkv"));
    }

    #[test]
    fn different_secrets_derive_different_keys() {
        let first = KeyDeriver::new();
        let second = KeyDeriver::new();
        assert_ne!(first.derive("/a/b.mkv"), second.derive("/a/b.mkv"));
    }

    #[test]
    fn base64_form_round_trips() {
        let key = KeyDeriver::new().derive("/pictures/cat.png");
        let text = key.to_base64();
        assert_eq!(text.len(), 43, "32 bytes should encode to 43 chars unpadded");
        assert_eq!(CacheKey::from_base64(&text), Some(key));
        assert_eq!(CacheKey::from_base64("not-a-key"), None);
    }
}
