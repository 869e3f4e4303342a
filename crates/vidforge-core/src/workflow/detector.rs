//! Completion detection: when is the remote render done, and when has the
//! download actually landed on disk.
//!
//! Two very different waits live here. Generation latency is long, highly
//! variable, and exposes no client-observable progress, so the detector
//! sleeps once for a randomized over-provisioned span instead of polling.
//! The download is the opposite: fast and observable through the file
//! system, so it is polled on a short fixed interval up to a hard ceiling.

use crate::config::WaitConfig;
use crate::selectors;
use async_trait::async_trait;
use rand::Rng;
use std::collections::HashSet;
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{Instant, sleep};
use tracing::{debug, info};
use vidforge_browser::{BrowserError, PageDriver};

/// Extension Chromium gives files still being written.
pub const PARTIAL_DOWNLOAD_SUFFIX: &str = ".crdownload";

/// Bounds for the pre-interaction render wait. Injectable so tests swap
/// the production span for zero.
#[derive(Debug, Clone)]
pub struct WaitPolicy {
    pub min: Duration,
    pub max: Duration,
}

impl WaitPolicy {
    pub fn uniform(min: Duration, max: Duration) -> Self {
        Self { min, max }
    }

    pub fn fixed(duration: Duration) -> Self {
        Self {
            min: duration,
            max: duration,
        }
    }

    /// Draw one wait uniformly from the configured span.
    pub fn sample(&self) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        let span_ms = (self.max - self.min).as_millis() as u64;
        let jitter = rand::rng().random_range(0..=span_ms);
        self.min + Duration::from_millis(jitter)
    }
}

/// Observes the artifact store downloads land in. The production
/// implementation lists a directory; tests script listings in memory.
#[async_trait]
pub trait ArtifactObserver: Send + Sync {
    async fn list(&self) -> std::io::Result<HashSet<OsString>>;
}

pub struct DownloadDirObserver {
    dir: PathBuf,
}

impl DownloadDirObserver {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }
}

#[async_trait]
impl ArtifactObserver for DownloadDirObserver {
    async fn list(&self) -> std::io::Result<HashSet<OsString>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            // Not created yet counts as empty, not as an error.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashSet::new()),
            Err(e) => return Err(e),
        };

        let mut names = HashSet::new();
        while let Some(entry) = entries.next_entry().await? {
            names.insert(entry.file_name());
        }
        Ok(names)
    }
}

#[derive(Debug, Error)]
pub enum ArtifactWaitError {
    #[error("no completed download appeared within {0:?}")]
    TimedOut(Duration),
    #[error("failed to inspect the download directory: {0}")]
    Io(#[from] std::io::Error),
}

pub struct CompletionDetector {
    render_wait: WaitPolicy,
    poll_interval: Duration,
    poll_ceiling: Duration,
}

impl CompletionDetector {
    pub fn new(render_wait: WaitPolicy, poll_interval: Duration, poll_ceiling: Duration) -> Self {
        Self {
            render_wait,
            poll_interval,
            poll_ceiling,
        }
    }

    pub fn from_waits(waits: &WaitConfig) -> Self {
        Self::new(
            WaitPolicy::uniform(waits.render_wait_min, waits.render_wait_max),
            waits.download_poll_interval,
            waits.download_poll_ceiling,
        )
    }

    /// Sleep out the sampled render wait.
    pub async fn await_render(&self) {
        let wait = self.render_wait.sample();
        info!(
            minutes = format!("{:.1}", wait.as_secs_f64() / 60.0),
            "Waiting for remote rendering"
        );
        sleep(wait).await;
    }

    /// Scan the page for the remote failure marker.
    pub async fn failure_present(
        &self,
        driver: &dyn PageDriver,
        phrase: &str,
    ) -> Result<bool, BrowserError> {
        let present = driver
            .evaluate(&selectors::page_contains_text(phrase))
            .await?
            .as_bool()
            .unwrap_or(false);
        if present {
            debug!(%phrase, "Failure marker present on page");
        }
        Ok(present)
    }

    /// Poll the artifact store until a file appears that was absent from
    /// `baseline` and is fully written. Returns its name.
    pub async fn await_new_artifact(
        &self,
        observer: &dyn ArtifactObserver,
        baseline: &HashSet<OsString>,
    ) -> Result<OsString, ArtifactWaitError> {
        let started = Instant::now();
        loop {
            let listing = observer.list().await?;
            let fresh = listing
                .iter()
                .find(|name| !baseline.contains(*name) && !is_partial(name));
            if let Some(name) = fresh {
                return Ok(name.clone());
            }

            if started.elapsed() >= self.poll_ceiling {
                return Err(ArtifactWaitError::TimedOut(self.poll_ceiling));
            }
            sleep(self.poll_interval).await;
        }
    }
}

fn is_partial(name: &OsString) -> bool {
    name.to_string_lossy().ends_with(PARTIAL_DOWNLOAD_SUFFIX)
}
