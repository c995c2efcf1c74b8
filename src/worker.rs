//! The worker pool draining the work queue.
//!
//! A fixed number of threads loop over claim → generate → cache → release.
//! The cache write happens strictly before the release, so a resubmission of
//! the same key arriving after the release always observes the completed
//! outcome and is correctly treated as new work only when the cache says so.
//!
//! Workers never retry: a generation failure is recorded as a permanent
//! outcome. Shutdown is cooperative — closing the queue makes every worker
//! exit after finishing its current key.

use std::sync::Arc;
use std::thread::JoinHandle;

use tempfile::NamedTempFile;
use url::Url;

use crate::cache::{KeyDeriver, Outcome, ResultCache};
use crate::config::EngineConfig;
use crate::error::ThumbqError;
use crate::pipeline::ThumbnailPipeline;
use crate::queue::WorkQueue;

/// Everything a worker thread needs, shared once via `Arc`.
pub(crate) struct WorkerContext {
    pub queue: Arc<WorkQueue>,
    pub cache: Arc<ResultCache>,
    pub deriver: Arc<KeyDeriver>,
    pub pipeline: ThumbnailPipeline,
    pub config: Arc<EngineConfig>,
    /// Pre-parsed index base URL, when configured.
    pub base: Option<Url>,
}

impl WorkerContext {
    /// Resolve a queue key to the URL handed to the tool.
    fn resolve(&self, key: &str) -> String {
        match &self.base {
            Some(base) => base
                .join(key)
                .map(String::from)
                .unwrap_or_else(|_| key.to_string()),
            None => key.to_string(),
        }
    }
}

/// Handles to the spawned worker threads.
pub(crate) struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `count` worker threads over the shared context.
    ///
    /// Each worker owns one scratch file with a random name, reused for
    /// every frame it extracts and removed when the worker exits.
    pub fn spawn(count: usize, context: Arc<WorkerContext>) -> Result<Self, ThumbqError> {
        let mut handles = Vec::with_capacity(count);
        for index in 0..count {
            let scratch = NamedTempFile::with_suffix(".png")?;
            let context = Arc::clone(&context);
            let handle = std::thread::Builder::new()
                .name(format!("thumbq-worker-{index}"))
                .spawn(move || worker_loop(&context, &scratch))?;
            handles.push(handle);
        }
        Ok(Self { handles })
    }

    /// Wait for every worker to observe the closed queue and exit.
    ///
    /// Call after [`WorkQueue::close`]; in-flight generations are not
    /// cancelled, so this blocks until each worker finishes its current key.
    pub fn join(self) {
        for handle in self.handles {
            if handle.join().is_err() {
                log::error!("worker thread panicked");
            }
        }
    }
}

fn worker_loop(context: &WorkerContext, scratch: &NamedTempFile) {
    while let Some(key) = context.queue.claim() {
        let url = context.resolve(&key);
        let outcome = match context.pipeline.generate(&url, scratch.path()) {
            Ok(thumbnail) => Outcome::Ready(Arc::new(thumbnail)),
            Err(error) => {
                // Files that were never expected to decode (subtitles,
                // archives, ...) fail routinely; don't drown the log in them.
                if !context.config.is_ignored_key(&key) {
                    log::warn!("thumbnail generation failed for {key}: {error}");
                }
                Outcome::Failed
            }
        };
        context.cache.put(context.deriver.derive(&key), outcome);
        // Must come after the cache write; see module docs.
        context.queue.release(&key);
    }
}
