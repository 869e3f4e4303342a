//! Single-slot pool for the shared automation session.
//!
//! The browser is one mutable resource reused across jobs. Instead of a
//! process-wide mutable global, a slot of capacity one owns the live
//! handle: jobs borrow it for their whole run (admission already
//! guarantees one job at a time), and the slot replaces handles that are
//! no longer trustworthy. A handle that left the slot closed is never put
//! back.

use crate::config::AppConfig;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use vidforge_browser::{BrowserSession, LaunchOptions, PageDriver};

/// Creates fresh automation sessions when the slot is empty.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn create(&self) -> anyhow::Result<Arc<dyn PageDriver>>;
}

/// Launches real Chromium sessions per the process configuration.
pub struct ChromeSessionFactory {
    options: LaunchOptions,
}

impl ChromeSessionFactory {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            options: LaunchOptions {
                headless: config.headless(),
                executable: config.browser_executable(),
                user_data_dir: config.user_data_dir.clone(),
            },
        }
    }
}

#[async_trait]
impl SessionFactory for ChromeSessionFactory {
    async fn create(&self) -> anyhow::Result<Arc<dyn PageDriver>> {
        let session = BrowserSession::launch(&self.options).await?;
        Ok(Arc::new(session))
    }
}

#[derive(Default)]
pub struct SessionSlot {
    slot: Mutex<Option<Arc<dyn PageDriver>>>,
}

impl SessionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out the live session, creating one lazily. A handle whose
    /// connection has died is closed and replaced instead of reused.
    pub async fn acquire(
        &self,
        factory: &dyn SessionFactory,
    ) -> anyhow::Result<Arc<dyn PageDriver>> {
        let mut slot = self.slot.lock().await;

        if let Some(session) = slot.as_ref() {
            if session.is_connected() {
                debug!("Reusing warm browser session");
                return Ok(session.clone());
            }
            warn!("Cached browser session lost its connection, replacing it");
            let dead = slot.take().expect("slot checked above");
            if let Err(e) = dead.close().await {
                debug!(error = %e, "Closing dead session failed");
            }
        }

        info!("Launching browser session");
        let session = factory.create().await?;
        *slot = Some(session.clone());
        Ok(session)
    }

    /// Drop `session` from the slot (if it is still the cached one) and
    /// close it. The next acquire starts fresh.
    pub async fn discard(&self, session: &Arc<dyn PageDriver>) {
        {
            let mut slot = self.slot.lock().await;
            if let Some(current) = slot.as_ref()
                && Arc::ptr_eq(current, session)
            {
                *slot = None;
            }
        }
        if let Err(e) = session.close().await {
            debug!(error = %e, "Closing discarded session failed");
        }
    }

    /// Close whatever session is cached. Used on process shutdown.
    pub async fn shutdown(&self) {
        let session = self.slot.lock().await.take();
        if let Some(session) = session {
            info!("Closing browser session");
            if let Err(e) = session.close().await {
                warn!(error = %e, "Closing session on shutdown failed");
            }
        }
    }

    pub async fn is_empty(&self) -> bool {
        self.slot.lock().await.is_none()
    }
}
