//! The workflow engine: one prompt in, one downloaded video out.
//!
//! Steps run in strict order against the shared session; each failure is
//! identified by the step it happened in and aborts the rest of the job.
//! Retry is not performed here: a failed job ends, and the next HTTP
//! request starts over from scratch (against the warm session when it is
//! still trustworthy).

use crate::config::AppConfig;
use crate::models::GenerationJob;
use crate::selectors;
use crate::workflow::detector::{ArtifactObserver, ArtifactWaitError, CompletionDetector};
use crate::workflow::session::{SessionFactory, SessionSlot};
use crate::workflow::StepError;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{error, info, warn};
use vidforge_browser::{PageDriver, load_cookie_file};

const ELEMENT_POLL_INTERVAL: Duration = Duration::from_millis(500);

pub struct WorkflowEngine {
    config: Arc<AppConfig>,
    sessions: Arc<SessionSlot>,
    factory: Arc<dyn SessionFactory>,
    observer: Arc<dyn ArtifactObserver>,
    detector: CompletionDetector,
}

impl WorkflowEngine {
    pub fn new(
        config: Arc<AppConfig>,
        sessions: Arc<SessionSlot>,
        factory: Arc<dyn SessionFactory>,
        observer: Arc<dyn ArtifactObserver>,
    ) -> Self {
        let detector = CompletionDetector::from_waits(&config.waits);
        Self {
            config,
            sessions,
            factory,
            observer,
            detector,
        }
    }

    /// Run `job` to a terminal state. All failures are absorbed here: they
    /// are logged and recorded on the job, never propagated, since the
    /// request that spawned the job was answered long ago.
    pub async fn execute(&self, job: &mut GenerationJob) {
        job.mark_running();
        info!(job_id = %job.id, prompt = %job.prompt, "Starting generation job");

        let driver = match self.sessions.acquire(self.factory.as_ref()).await {
            Ok(driver) => driver,
            Err(e) => {
                let step = StepError::Acquisition(e.to_string());
                error!(job_id = %job.id, error = %step, "Generation job failed");
                job.fail(step.to_string());
                return;
            }
        };
        self.install_cookies(driver.as_ref()).await;

        match self.drive(driver.as_ref(), &job.prompt).await {
            Ok(path) => {
                info!(job_id = %job.id, path = %path.display(), "Generation job succeeded");
                job.succeed(path);
            }
            Err(step) => {
                error!(job_id = %job.id, error = %step, "Generation job failed");
                if step.invalidates_session() {
                    warn!(job_id = %job.id, "Session is no longer trustworthy, discarding it");
                    self.sessions.discard(&driver).await;
                }
                job.fail(step.to_string());
            }
        }
    }

    /// The ordered steps. Session acquisition and cookie restore have
    /// already happened.
    async fn drive(&self, driver: &dyn PageDriver, prompt: &str) -> Result<PathBuf, StepError> {
        let waits = &self.config.waits;
        let rules = &self.config.selectors;

        driver
            .navigate(&self.config.project_url, waits.navigation_timeout)
            .await
            .map_err(StepError::Navigation)?;
        sleep(waits.page_settle).await;

        self.select_model(driver).await?;

        // The trailing space is what flips the page's submit control to
        // enabled; the assignment alone does not. Keep it exactly one.
        let entry_text = format!("{prompt} ");
        let input_found = driver
            .set_value_and_notify(&rules.prompt_selector(), &entry_text)
            .await
            .map_err(|source| StepError::Driver {
                step: "prompt entry",
                source,
            })?;
        if !input_found {
            return Err(StepError::PromptEntry(format!(
                "no input matches {}",
                rules.prompt_selector()
            )));
        }

        let submitted = self
            .wait_until_truthy(
                driver,
                &selectors::click_button_with_glyph(&rules.submit_glyph),
                waits.element_wait,
                "submission",
            )
            .await?;
        if !submitted {
            return Err(StepError::Submission(format!(
                "no control carries glyph {:?}",
                rules.submit_glyph
            )));
        }
        info!("Prompt submitted, rendering started remotely");

        self.detector.await_render().await;

        let failed = self
            .detector
            .failure_present(driver, &rules.failure_phrase)
            .await
            .map_err(|source| StepError::Driver {
                step: "failure scan",
                source,
            })?;
        if failed {
            return Err(StepError::ContentFailure(rules.failure_phrase.clone()));
        }

        self.download(driver, prompt).await
    }

    /// Open settings, pick the configured model variant by visible text,
    /// and close the overlay again.
    async fn select_model(&self, driver: &dyn PageDriver) -> Result<(), StepError> {
        let waits = &self.config.waits;
        let rules = &self.config.selectors;

        let opened = self
            .eval_truthy(
                driver,
                &selectors::click_button_with_span_text(&rules.settings_label),
                "model selection",
            )
            .await?;
        if !opened {
            return Err(StepError::ModelSelection(format!(
                "settings control {:?} not found",
                rules.settings_label
            )));
        }
        sleep(waits.control_settle).await;

        let dropdown = self
            .eval_truthy(
                driver,
                &selectors::click_combobox_with_span_text(&rules.model_menu_label),
                "model selection",
            )
            .await?;
        if !dropdown {
            return Err(StepError::ModelSelection(format!(
                "model dropdown {:?} not found",
                rules.model_menu_label
            )));
        }

        let rendered = self
            .wait_until_truthy(
                driver,
                &selectors::menu_rendered_probe(),
                waits.menu_wait,
                "model selection",
            )
            .await?;
        if !rendered {
            return Err(StepError::ModelSelection(
                "model menu never rendered its options".to_string(),
            ));
        }

        let picked = self
            .eval_truthy(
                driver,
                &selectors::click_option_containing(&rules.model_option),
                "model selection",
            )
            .await?;
        if !picked {
            return Err(StepError::ModelSelection(format!(
                "option {:?} not rendered",
                rules.model_option
            )));
        }
        info!(model = %rules.model_option, "Model selected");
        sleep(waits.selection_settle).await;

        // Make sure no settings overlay lingers over the prompt surface.
        driver
            .press_escape()
            .await
            .map_err(|source| StepError::Driver {
                step: "model selection",
                source,
            })?;
        Ok(())
    }

    /// Verify the fresh result, trigger its download at the configured
    /// quality, and wait for the file to finish landing.
    async fn download(&self, driver: &dyn PageDriver, prompt: &str) -> Result<PathBuf, StepError> {
        let waits = &self.config.waits;
        let rules = &self.config.selectors;

        std::fs::create_dir_all(&self.config.download_dir).map_err(|e| {
            StepError::DownloadVerification(format!("cannot create download directory: {e}"))
        })?;
        driver
            .set_download_dir(&self.config.download_dir)
            .await
            .map_err(|source| StepError::Driver {
                step: "download setup",
                source,
            })?;

        let baseline = self
            .observer
            .list()
            .await
            .map_err(|e| StepError::DownloadVerification(e.to_string()))?;

        // The result list grows over time; only an exact text match on the
        // submitted prompt identifies the entry this job produced.
        let confirmed = self
            .wait_until_truthy(
                driver,
                &selectors::result_with_exact_text(prompt),
                waits.result_wait,
                "result confirmation",
            )
            .await?;
        if !confirmed {
            return Err(StepError::ResultConfirmation(
                "no result entry matches the submitted prompt".to_string(),
            ));
        }

        let menu_opened = self
            .wait_until_truthy(
                driver,
                &selectors::click_button_with_glyph(&rules.download_glyph),
                waits.element_wait,
                "download trigger",
            )
            .await?;
        if !menu_opened {
            return Err(StepError::DownloadTrigger(format!(
                "no control carries glyph {:?}",
                rules.download_glyph
            )));
        }
        sleep(waits.menu_render_delay).await;

        let quality_picked = self
            .eval_truthy(
                driver,
                &selectors::click_menuitem_containing(&rules.quality_option),
                "download trigger",
            )
            .await?;
        if !quality_picked {
            return Err(StepError::DownloadTrigger(format!(
                "quality option {:?} not rendered",
                rules.quality_option
            )));
        }
        info!(quality = %rules.quality_option, "Download triggered");

        let name = self
            .detector
            .await_new_artifact(self.observer.as_ref(), &baseline)
            .await
            .map_err(|e| match e {
                ArtifactWaitError::TimedOut(ceiling) => StepError::DownloadTimeout(ceiling),
                ArtifactWaitError::Io(io) => StepError::DownloadVerification(io.to_string()),
            })?;
        Ok(self.config.download_dir.join(name))
    }

    /// Best effort: a missing or broken cookie file degrades to an
    /// unauthenticated session, it never fails the job.
    async fn install_cookies(&self, driver: &dyn PageDriver) {
        match load_cookie_file(&self.config.cookie_file) {
            Ok(Some(cookies)) => {
                let count = cookies.len();
                match driver.set_cookies(&cookies).await {
                    Ok(()) => info!(count, "Restored session cookies"),
                    Err(e) => warn!(error = %e, "Installing cookies failed, continuing without"),
                }
            }
            Ok(None) => info!(
                path = %self.config.cookie_file.display(),
                "No cookie file, continuing unauthenticated"
            ),
            Err(e) => warn!(error = %e, "Cookie file unreadable, continuing without"),
        }
    }

    async fn eval_truthy(
        &self,
        driver: &dyn PageDriver,
        script: &str,
        step: &'static str,
    ) -> Result<bool, StepError> {
        let value = driver
            .evaluate(script)
            .await
            .map_err(|source| StepError::Driver { step, source })?;
        Ok(value.as_bool().unwrap_or(false))
    }

    /// Re-evaluate `script` until it returns true or `timeout` elapses.
    async fn wait_until_truthy(
        &self,
        driver: &dyn PageDriver,
        script: &str,
        timeout: Duration,
        step: &'static str,
    ) -> Result<bool, StepError> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.eval_truthy(driver, script, step).await? {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            sleep(ELEMENT_POLL_INTERVAL.min(timeout)).await;
        }
    }
}
