//! Browser automation session for Vidforge.
//!
//! This crate owns the one moving part the workflow cannot mock away in
//! production: a real Chromium process driven over the DevTools protocol.
//! It exposes:
//! - `PageDriver`, the capability trait the workflow engine consumes
//! - `BrowserSession`, the live implementation (process + DevTools page)
//! - cookie-file loading for restoring an authenticated session

use async_trait::async_trait;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub mod cdp;
pub mod chrome;
pub mod cookies;

pub use cookies::{Cookie, load_cookie_file};

const READY_STATE_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Errors surfaced by the automation session.
///
/// The classification matters to callers: `invalidates_session` separates
/// failures that poison the underlying browser connection from failures
/// scoped to a single interaction, so the session slot knows whether the
/// handle may be reused by a later job.
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("failed to launch browser: {0}")]
    Launch(String),
    #[error("devtools transport failure: {0}")]
    Transport(String),
    #[error("devtools protocol error: {0}")]
    Protocol(String),
    #[error("timed out after {0:?}: {1}")]
    Timeout(Duration, String),
}

impl BrowserError {
    /// True when the browser connection itself is gone and the session
    /// must be discarded rather than reused.
    pub fn invalidates_session(&self) -> bool {
        matches!(self, Self::Launch(_) | Self::Transport(_))
    }
}

/// Options for launching a Chromium process.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub headless: bool,
    /// Explicit executable path; when absent the session probes PATH and
    /// well-known install locations.
    pub executable: Option<PathBuf>,
    /// Profile directory, kept across launches so sign-in state survives.
    pub user_data_dir: PathBuf,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            headless: true,
            executable: None,
            user_data_dir: PathBuf::from("./chrome-user-data"),
        }
    }
}

/// Primitive page operations the workflow engine is written against.
///
/// The production implementation is `BrowserSession`; tests substitute
/// their own drivers. Element *location policy* does not live here: callers
/// compile their matching rules down to `evaluate` expressions, keeping
/// this surface small and stable.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Load `url` and wait until the document settles or `timeout` elapses.
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), BrowserError>;

    /// Run a JavaScript expression in the page, returning its value by
    /// JSON serialization. Promises are awaited.
    async fn evaluate(&self, expression: &str) -> Result<Value, BrowserError>;

    /// Assign `value` to the element matching `selector` through the
    /// element's native value setter, then emit a bubbling `input` event so
    /// the page's own reactive logic observes the change. Returns false
    /// when no element matches.
    async fn set_value_and_notify(&self, selector: &str, value: &str)
    -> Result<bool, BrowserError>;

    /// Dispatch an Escape key press to the page.
    async fn press_escape(&self) -> Result<(), BrowserError>;

    /// Route subsequent downloads into `dir`.
    async fn set_download_dir(&self, dir: &Path) -> Result<(), BrowserError>;

    /// Install cookies into the browser before navigation.
    async fn set_cookies(&self, cookies: &[Cookie]) -> Result<(), BrowserError>;

    /// Whether the underlying connection is still usable.
    fn is_connected(&self) -> bool;

    /// Tear the session down. A closed driver must never be reused.
    async fn close(&self) -> Result<(), BrowserError>;
}

/// A live automation session: one Chromium process plus one DevTools page
/// connection.
pub struct BrowserSession {
    pub id: Uuid,
    child: tokio::sync::Mutex<Option<tokio::process::Child>>,
    conn: cdp::CdpConnection,
    closed: AtomicBool,
}

impl BrowserSession {
    /// Launch a Chromium process and attach to its first page target.
    pub async fn launch(options: &LaunchOptions) -> Result<Self, BrowserError> {
        let spawned = chrome::spawn_browser(options).await?;
        let conn = cdp::CdpConnection::connect(&spawned.ws_url).await?;

        // Domains the session relies on for events and cookie injection.
        conn.command("Page.enable", json!({})).await?;
        conn.command("Runtime.enable", json!({})).await?;
        conn.command("Network.enable", json!({})).await?;

        let session = Self {
            id: Uuid::new_v4(),
            child: tokio::sync::Mutex::new(Some(spawned.child)),
            conn,
            closed: AtomicBool::new(false),
        };
        info!(session_id = %session.id, headless = options.headless, "Browser session ready");
        Ok(session)
    }
}

#[async_trait]
impl PageDriver for BrowserSession {
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), BrowserError> {
        debug!(%url, "Navigating");
        self.conn.command("Page.navigate", json!({ "url": url })).await?;

        let deadline = Instant::now() + timeout;
        loop {
            let state = self
                .conn
                .command(
                    "Runtime.evaluate",
                    json!({ "expression": "document.readyState", "returnByValue": true }),
                )
                .await?;
            if state["result"]["value"].as_str() == Some("complete") {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(BrowserError::Timeout(
                    timeout,
                    format!("navigation to {url}"),
                ));
            }
            sleep(READY_STATE_POLL_INTERVAL).await;
        }
    }

    async fn evaluate(&self, expression: &str) -> Result<Value, BrowserError> {
        let reply = self
            .conn
            .command(
                "Runtime.evaluate",
                json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true,
                }),
            )
            .await?;

        if let Some(details) = reply.get("exceptionDetails") {
            let text = details["exception"]["description"]
                .as_str()
                .or_else(|| details["text"].as_str())
                .unwrap_or("unknown page exception");
            return Err(BrowserError::Protocol(text.to_string()));
        }
        Ok(reply["result"]["value"].clone())
    }

    async fn set_value_and_notify(
        &self,
        selector: &str,
        value: &str,
    ) -> Result<bool, BrowserError> {
        let script = assign_script(selector, value);
        Ok(self.evaluate(&script).await?.as_bool().unwrap_or(false))
    }

    async fn press_escape(&self) -> Result<(), BrowserError> {
        for kind in ["keyDown", "keyUp"] {
            self.conn
                .command(
                    "Input.dispatchKeyEvent",
                    json!({
                        "type": kind,
                        "key": "Escape",
                        "code": "Escape",
                        "windowsVirtualKeyCode": 27,
                        "nativeVirtualKeyCode": 27,
                    }),
                )
                .await?;
        }
        Ok(())
    }

    async fn set_download_dir(&self, dir: &Path) -> Result<(), BrowserError> {
        self.conn
            .command(
                "Page.setDownloadBehavior",
                json!({
                    "behavior": "allow",
                    "downloadPath": dir.to_string_lossy(),
                }),
            )
            .await?;
        Ok(())
    }

    async fn set_cookies(&self, cookies: &[Cookie]) -> Result<(), BrowserError> {
        if cookies.is_empty() {
            return Ok(());
        }
        let params: Vec<Value> = cookies.iter().map(Cookie::to_cdp_param).collect();
        self.conn
            .command("Network.setCookies", json!({ "cookies": params }))
            .await?;
        debug!(count = cookies.len(), "Cookies installed");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::SeqCst) && self.conn.is_connected()
    }

    async fn close(&self) -> Result<(), BrowserError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        // Ask the browser to exit cleanly, then make sure the process dies.
        if let Err(e) = self.conn.command("Browser.close", json!({})).await {
            debug!(error = %e, "Browser.close failed, killing process");
        }
        self.conn.shutdown();

        let mut guard = self.child.lock().await;
        if let Some(mut child) = guard.take() {
            if let Err(e) = child.kill().await {
                warn!(error = %e, "Failed to kill browser process");
            }
        }
        info!(session_id = %self.id, "Browser session closed");
        Ok(())
    }
}

/// Script that assigns a value through the element's native setter and
/// fires an `input` event, the path framework-rendered inputs listen on.
/// Simulated per-character typing is deliberately bypassed.
fn assign_script(selector: &str, value: &str) -> String {
    let selector_lit = json_literal(selector);
    let value_lit = json_literal(value);
    format!(
        r#"(() => {{
  const el = document.querySelector({selector_lit});
  if (!el) return false;
  const proto = el instanceof HTMLTextAreaElement
    ? window.HTMLTextAreaElement.prototype
    : window.HTMLInputElement.prototype;
  const setter = Object.getOwnPropertyDescriptor(proto, 'value').set;
  setter.call(el, {value_lit});
  el.dispatchEvent(new Event('input', {{ bubbles: true }}));
  return true;
}})()"#
    )
}

/// Encode a Rust string as a JavaScript string literal.
pub(crate) fn json_literal(text: &str) -> String {
    serde_json::to_string(text).expect("string serialization is infallible")
}
