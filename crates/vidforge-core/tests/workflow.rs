//! End-to-end workflow runs against scripted drivers and observers.

mod common;

use common::{MemoryObserver, MockDriver, MockFactory, download_path, test_config};
use std::sync::atomic::Ordering;
use vidforge_browser::BrowserError;
use vidforge_core::{AppCore, GenerationJob, JobStatus};

#[tokio::test]
async fn prompt_runs_to_a_downloaded_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());

    let driver = MockDriver::new();
    let factory = MockFactory::with_drivers(vec![driver.clone()]);
    // Empty baseline, one partial poll, then the finished file.
    let observer = MemoryObserver::scripted(vec![
        vec![],
        vec!["clip.mp4.crdownload"],
        vec!["clip.mp4.crdownload", "clip.mp4"],
    ]);
    let core = AppCore::with_parts(config, factory, observer);

    let mut job = GenerationJob::new("a cat playing piano");
    core.engine.execute(&mut job).await;

    assert_eq!(job.status, JobStatus::Succeeded);
    assert_eq!(
        job.result_path.as_deref(),
        Some(download_path(&core.config, "clip.mp4").as_path())
    );
    assert!(job.failure_reason.is_none());

    // The interaction sequence actually happened, in its essentials.
    assert!(driver.saw("navigate:"));
    assert!(driver.saw("escape"));
    assert!(driver.saw("set_download_dir:"));
    // The entered text carries exactly one trailing space.
    assert!(driver.saw(":a cat playing piano "));
    assert!(!driver.saw(":a cat playing piano  "));
}

#[tokio::test]
async fn failure_marker_aborts_before_any_download() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());

    let driver = MockDriver::new();
    // The completion-wait failure scan finds the marker.
    driver.rule("innerText.includes", serde_json::json!(true));
    let factory = MockFactory::with_drivers(vec![driver.clone()]);
    let observer = MemoryObserver::scripted(vec![]);
    let core = AppCore::with_parts(config, factory, observer);

    let mut job = GenerationJob::new("x");
    core.engine.execute(&mut job).await;

    assert_eq!(job.status, JobStatus::Failed);
    let reason = job.failure_reason.unwrap();
    assert!(reason.contains("Video Üretilemedi"), "reason: {reason}");
    assert!(!driver.saw("set_download_dir"));
}

#[tokio::test]
async fn warm_session_is_reused_across_jobs() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());

    let driver = MockDriver::new();
    let factory = MockFactory::with_drivers(vec![driver.clone()]);
    let observer = MemoryObserver::scripted(vec![
        vec![],
        vec!["a.mp4"],
        vec!["a.mp4"],
        vec!["a.mp4", "b.mp4"],
    ]);
    let core = AppCore::with_parts(config, factory.clone(), observer);

    let mut first = GenerationJob::new("first clip");
    core.engine.execute(&mut first).await;
    let mut second = GenerationJob::new("second clip");
    core.engine.execute(&mut second).await;

    assert_eq!(first.status, JobStatus::Succeeded);
    assert_eq!(second.status, JobStatus::Succeeded);
    assert_eq!(
        second.result_path.as_deref(),
        Some(download_path(&core.config, "b.mp4").as_path())
    );
    assert_eq!(factory.created.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn transport_failure_discards_the_session() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());

    let broken = MockDriver::new();
    broken.fail_next_navigate(BrowserError::Transport("socket closed".into()));
    let replacement = MockDriver::new();
    let factory = MockFactory::with_drivers(vec![broken.clone(), replacement.clone()]);
    let observer = MemoryObserver::scripted(vec![vec![], vec!["clip.mp4"]]);
    let core = AppCore::with_parts(config, factory.clone(), observer);

    let mut failed = GenerationJob::new("doomed");
    core.engine.execute(&mut failed).await;
    assert_eq!(failed.status, JobStatus::Failed);
    assert!(broken.saw("close"));
    assert!(core.sessions.is_empty().await);

    // The next job gets a fresh session and completes.
    let mut retried = GenerationJob::new("retried");
    core.engine.execute(&mut retried).await;
    assert_eq!(retried.status, JobStatus::Succeeded);
    assert_eq!(factory.created.load(Ordering::SeqCst), 2);
    assert!(replacement.saw("navigate:"));
}

#[tokio::test]
async fn element_failure_keeps_the_session_warm() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());

    let driver = MockDriver::new();
    // The settings control never shows up.
    driver.rule("Ayarlar", serde_json::json!(false));
    let factory = MockFactory::with_drivers(vec![driver.clone()]);
    let observer = MemoryObserver::scripted(vec![]);
    let core = AppCore::with_parts(config, factory.clone(), observer);

    let mut job = GenerationJob::new("no settings");
    core.engine.execute(&mut job).await;

    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.failure_reason.unwrap().contains("model selection"));
    assert!(!driver.saw("close"));
    assert!(!core.sessions.is_empty().await);
    assert_eq!(factory.created.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn download_timeout_is_distinct_from_content_failure() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());

    let driver = MockDriver::new();
    let factory = MockFactory::with_drivers(vec![driver.clone()]);
    // The directory never gains a finished file.
    let observer = MemoryObserver::scripted(vec![vec![], vec!["stuck.crdownload"]]);
    let core = AppCore::with_parts(config, factory, observer);

    let mut job = GenerationJob::new("slow download");
    core.engine.execute(&mut job).await;

    assert_eq!(job.status, JobStatus::Failed);
    let reason = job.failure_reason.unwrap();
    assert!(reason.contains("download did not complete"), "reason: {reason}");
    // The trigger did run; only retrieval timed out.
    assert!(driver.saw("set_download_dir"));
}
