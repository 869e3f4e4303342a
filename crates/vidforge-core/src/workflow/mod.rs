//! The generation workflow: ordered browser interactions, completion
//! detection, and the session slot they share.

mod detector;
mod engine;
mod session;

pub use detector::{
    ArtifactObserver, ArtifactWaitError, CompletionDetector, DownloadDirObserver, WaitPolicy,
    PARTIAL_DOWNLOAD_SUFFIX,
};
pub use engine::WorkflowEngine;
pub use session::{ChromeSessionFactory, SessionFactory, SessionSlot};

use std::time::Duration;
use thiserror::Error;
use vidforge_browser::BrowserError;

/// A failure tied to one ordered action of the workflow. No step retries
/// internally; the error aborts the job and a fresh request starts over.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("session acquisition failed: {0}")]
    Acquisition(String),
    #[error("navigation failed: {0}")]
    Navigation(#[source] BrowserError),
    #[error("model selection failed: {0}")]
    ModelSelection(String),
    #[error("prompt entry failed: {0}")]
    PromptEntry(String),
    #[error("submission failed: {0}")]
    Submission(String),
    #[error("remote generation failed: page shows {0:?}")]
    ContentFailure(String),
    #[error("result confirmation failed: {0}")]
    ResultConfirmation(String),
    #[error("download trigger failed: {0}")]
    DownloadTrigger(String),
    #[error("download verification failed: {0}")]
    DownloadVerification(String),
    #[error("download did not complete within {0:?}")]
    DownloadTimeout(Duration),
    #[error("browser failure during {step}: {source}")]
    Driver {
        step: &'static str,
        #[source]
        source: BrowserError,
    },
}

impl StepError {
    /// Whether the session that produced this error may be handed to the
    /// next job. Transport-class failures poison the handle; everything
    /// element- or timing-shaped leaves a warm session worth retrying
    /// against.
    pub fn invalidates_session(&self) -> bool {
        match self {
            Self::Driver { source, .. } => source.invalidates_session(),
            Self::Navigation(source) => source.invalidates_session(),
            _ => false,
        }
    }
}
