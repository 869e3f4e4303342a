//! Core of the Vidforge service: the generation workflow state machine,
//! completion detection, single-flight admission, and the HTTP boundary
//! that feeds it.

pub mod config;
pub mod gate;
pub mod http;
pub mod models;
pub mod selectors;
pub mod workflow;

pub use models::{GenerationJob, JobStatus};

use config::AppConfig;
use gate::AdmissionGate;
use std::sync::Arc;
use tracing::info;
use workflow::{
    ArtifactObserver, ChromeSessionFactory, DownloadDirObserver, SessionFactory, SessionSlot,
    WorkflowEngine,
};

/// Shared application state: configuration, the admission gate, the
/// session slot, and the engine wired to them.
pub struct AppCore {
    pub config: Arc<AppConfig>,
    pub gate: Arc<AdmissionGate>,
    pub sessions: Arc<SessionSlot>,
    pub engine: Arc<WorkflowEngine>,
}

impl AppCore {
    /// Production wiring: real Chromium sessions and the configured
    /// download directory.
    pub fn new(config: AppConfig) -> Arc<Self> {
        let factory = Arc::new(ChromeSessionFactory::from_config(&config));
        let observer = Arc::new(DownloadDirObserver::new(config.download_dir.clone()));
        Self::with_parts(config, factory, observer)
    }

    /// Wiring with injected capabilities, the seam tests build cores
    /// through.
    pub fn with_parts(
        config: AppConfig,
        factory: Arc<dyn SessionFactory>,
        observer: Arc<dyn ArtifactObserver>,
    ) -> Arc<Self> {
        let config = Arc::new(config);
        let gate = AdmissionGate::new();
        let sessions = Arc::new(SessionSlot::new());
        let engine = Arc::new(WorkflowEngine::new(
            config.clone(),
            sessions.clone(),
            factory,
            observer,
        ));

        info!("Initializing Vidforge core");
        Arc::new(Self {
            config,
            gate,
            sessions,
            engine,
        })
    }

    /// Close the live browser session, if any. Called on process exit; a
    /// job in flight at that point is abandoned.
    pub async fn shutdown(&self) {
        self.sessions.shutdown().await;
    }
}
