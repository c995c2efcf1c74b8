//! The engine: single owner of the coordination state.
//!
//! [`Engine`] is constructed once at startup and handed to the serving layer
//! by reference. It owns the process secret, the work queue, both caches,
//! and the worker pool, with one clear lifetime: created by
//! [`Engine::start`], torn down by [`Engine::shutdown`]. Nothing here is a
//! global.
//!
//! The serving layer's whole surface is: derive a key, submit the files a
//! directory listing found missing, read outcomes, and lazily convert
//! pictures for full-resolution viewing.

use std::sync::Arc;

use url::Url;

use crate::cache::{CacheKey, Converted, ConversionCache, KeyDeriver, Outcome, ResultCache};
use crate::config::EngineConfig;
use crate::error::ThumbqError;
use crate::ffmpeg::{FfmpegTool, MediaTool};
use crate::pipeline::ThumbnailPipeline;
use crate::queue::WorkQueue;
use crate::worker::{WorkerContext, WorkerPool};

/// Thumbnail-generation engine: queue, caches, worker pool, and the secret
/// behind derived keys.
pub struct Engine {
    config: Arc<EngineConfig>,
    queue: Arc<WorkQueue>,
    cache: Arc<ResultCache>,
    conversions: ConversionCache,
    deriver: Arc<KeyDeriver>,
    tool: Arc<dyn MediaTool>,
    pool: WorkerPool,
    base: Option<Url>,
}

impl Engine {
    /// Start an engine driving the `ffmpeg`/`ffprobe` binaries from the
    /// configuration.
    pub fn start(config: EngineConfig) -> Result<Self, ThumbqError> {
        let tool = Arc::new(FfmpegTool::new(config.ffmpeg.clone(), config.ffprobe.clone()));
        Self::start_with_tool(config, tool)
    }

    /// Start an engine over any [`MediaTool`] implementation.
    pub fn start_with_tool(
        config: EngineConfig,
        tool: Arc<dyn MediaTool>,
    ) -> Result<Self, ThumbqError> {
        let base = match &config.base_url {
            Some(text) => Some(
                Url::parse(text).map_err(|_| ThumbqError::InvalidBaseUrl(text.clone()))?,
            ),
            None => None,
        };

        let config = Arc::new(config);
        let queue = Arc::new(WorkQueue::new());
        let cache = Arc::new(ResultCache::new());
        let deriver = Arc::new(KeyDeriver::new());

        let context = Arc::new(WorkerContext {
            queue: Arc::clone(&queue),
            cache: Arc::clone(&cache),
            deriver: Arc::clone(&deriver),
            pipeline: ThumbnailPipeline::new(Arc::clone(&tool), Arc::clone(&config)),
            config: Arc::clone(&config),
            base: base.clone(),
        });
        let pool = WorkerPool::spawn(config.workers, context)?;
        log::debug!("started engine with {} workers", config.workers);

        Ok(Self {
            config,
            queue,
            cache,
            conversions: ConversionCache::new(),
            deriver,
            tool,
            pool,
            base,
        })
    }

    /// The configuration this engine runs with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Derive the externally shareable cache key for a path.
    pub fn derive_key(&self, path: &str) -> CacheKey {
        self.deriver.derive(path)
    }

    /// Submit keys for generation, in priority order.
    ///
    /// Keys that already have a cached outcome (success or permanent
    /// failure) are dropped; the rest are submitted so that the *first* key
    /// given here is the first one claimed, ahead of anything submitted
    /// earlier and not yet started. Keys currently in flight are left alone.
    pub fn submit_missing<I>(&self, paths: I)
    where
        I: IntoIterator<Item = String>,
    {
        let missing: Vec<String> = paths
            .into_iter()
            .filter(|path| !self.cache.contains(&self.deriver.derive(path)))
            .collect();
        if !missing.is_empty() {
            self.queue.submit_batch(missing);
        }
    }

    /// Look up the outcome for a derived key. `None` means no generation has
    /// completed yet (never submitted, queued, or still in flight).
    pub fn thumbnail(&self, key: &CacheKey) -> Option<Outcome> {
        self.cache.get(key)
    }

    /// Look up the outcome for a path.
    pub fn outcome(&self, path: &str) -> Option<Outcome> {
        self.cache.get(&self.deriver.derive(path))
    }

    /// Full-resolution picture conversion, memoized on first access.
    ///
    /// `want_alpha` preserves the source's alpha channel in the converted
    /// output; callers set it for sources whose thumbnail outcome reports a
    /// transparent-capable pixel format.
    pub fn converted_picture(&self, path: &str, want_alpha: bool) -> Converted {
        let key = self.deriver.derive(path);
        let url = self.resolve(path);
        self.conversions
            .get_or_compute(key, || self.tool.convert_picture(&url, want_alpha))
    }

    /// Number of keys waiting in the queue (excludes in-flight keys).
    pub fn pending(&self) -> usize {
        self.queue.pending()
    }

    /// Shut down: close the queue, wake every blocked worker, and join the
    /// pool. In-flight generations run to completion and their outcomes are
    /// written before the workers exit.
    pub fn shutdown(self) {
        self.queue.close();
        self.pool.join();
        log::debug!("engine shut down");
    }

    fn resolve(&self, path: &str) -> String {
        match &self.base {
            Some(base) => base
                .join(path)
                .map(String::from)
                .unwrap_or_else(|_| path.to_string()),
            None => path.to_string(),
        }
    }
}
