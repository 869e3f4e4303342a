//! Chromium process management: executable discovery, launch flags, and
//! DevTools endpoint discovery.

use crate::{BrowserError, LaunchOptions};
use serde_json::Value;
use std::net::TcpListener;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::time::{Instant, sleep};
use tracing::{debug, info};

const DEVTOOLS_STARTUP_TIMEOUT: Duration = Duration::from_secs(20);
const DEVTOOLS_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// PATH names probed when no executable is configured.
const EXECUTABLE_CANDIDATES: &[&str] = &[
    "google-chrome-stable",
    "google-chrome",
    "chromium",
    "chromium-browser",
    "chrome",
];

/// macOS install location, useful when Chrome is not on PATH.
const MACOS_CHROME: &str = "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome";

pub struct SpawnedBrowser {
    pub child: Child,
    pub ws_url: String,
    pub debug_port: u16,
}

/// Launch a Chromium process with remote debugging enabled and wait for
/// its DevTools endpoint to accept connections.
pub async fn spawn_browser(options: &LaunchOptions) -> Result<SpawnedBrowser, BrowserError> {
    let executable = resolve_executable(options)?;
    let port = pick_free_port()?;

    let args = launch_args(options, port);
    debug!(executable = %executable.display(), port, "Spawning browser");

    let child = Command::new(&executable)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            BrowserError::Launch(format!("failed to spawn {}: {}", executable.display(), e))
        })?;

    let ws_url = wait_for_devtools(port, DEVTOOLS_STARTUP_TIMEOUT).await?;
    info!(port, "DevTools endpoint up");

    Ok(SpawnedBrowser {
        child,
        ws_url,
        debug_port: port,
    })
}

fn resolve_executable(options: &LaunchOptions) -> Result<PathBuf, BrowserError> {
    if let Some(path) = &options.executable {
        if path.exists() {
            return Ok(path.clone());
        }
        return Err(BrowserError::Launch(format!(
            "configured browser executable not found: {}",
            path.display()
        )));
    }

    for name in EXECUTABLE_CANDIDATES {
        if let Ok(found) = which::which(name) {
            return Ok(found);
        }
    }

    let mac = PathBuf::from(MACOS_CHROME);
    if mac.exists() {
        return Ok(mac);
    }

    Err(BrowserError::Launch(
        "no Chromium executable found on PATH; set an explicit executable path".to_string(),
    ))
}

fn launch_args(options: &LaunchOptions, port: u16) -> Vec<String> {
    let mut args = vec![
        format!("--remote-debugging-port={port}"),
        format!("--user-data-dir={}", options.user_data_dir.display()),
        "--no-first-run".to_string(),
        "--no-default-browser-check".to_string(),
        "--no-sandbox".to_string(),
        "--disable-setuid-sandbox".to_string(),
        // Needed on hosts with a small /dev/shm
        "--disable-dev-shm-usage".to_string(),
        "--start-maximized".to_string(),
    ];
    if options.headless {
        args.push("--headless=new".to_string());
    }
    args
}

fn pick_free_port() -> Result<u16, BrowserError> {
    let listener = TcpListener::bind("127.0.0.1:0")
        .map_err(|e| BrowserError::Launch(format!("failed to reserve debug port: {e}")))?;
    let port = listener
        .local_addr()
        .map_err(|e| BrowserError::Launch(format!("failed to read reserved port: {e}")))?
        .port();
    drop(listener);
    Ok(port)
}

/// Poll the HTTP discovery endpoint until a page target is advertised.
async fn wait_for_devtools(port: u16, timeout: Duration) -> Result<String, BrowserError> {
    let client = reqwest::Client::new();
    let url = format!("http://127.0.0.1:{port}/json/list");
    let deadline = Instant::now() + timeout;

    loop {
        if let Ok(resp) = client.get(&url).send().await {
            if let Ok(targets) = resp.json::<Value>().await {
                if let Some(ws_url) = first_page_ws_url(&targets) {
                    return Ok(ws_url);
                }
            }
        }

        if Instant::now() >= deadline {
            return Err(BrowserError::Launch(format!(
                "DevTools endpoint on port {port} did not come up within {timeout:?}"
            )));
        }
        sleep(DEVTOOLS_POLL_INTERVAL).await;
    }
}

/// Extract the websocket URL of the first page target from a `/json/list`
/// response.
fn first_page_ws_url(targets: &Value) -> Option<String> {
    targets.as_array()?.iter().find_map(|target| {
        if target["type"].as_str() == Some("page") {
            target["webSocketDebuggerUrl"]
                .as_str()
                .map(str::to_string)
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn headless_flag_only_when_requested() {
        let mut options = LaunchOptions::default();
        options.headless = false;
        let args = launch_args(&options, 9222);
        assert!(args.iter().any(|a| a == "--remote-debugging-port=9222"));
        assert!(!args.iter().any(|a| a.starts_with("--headless")));

        options.headless = true;
        let args = launch_args(&options, 9222);
        assert!(args.iter().any(|a| a == "--headless=new"));
    }

    #[test]
    fn picks_first_page_target() {
        let targets = json!([
            { "type": "background_page", "webSocketDebuggerUrl": "ws://x/bg" },
            { "type": "page", "webSocketDebuggerUrl": "ws://x/page-1" },
            { "type": "page", "webSocketDebuggerUrl": "ws://x/page-2" },
        ]);
        assert_eq!(first_page_ws_url(&targets).as_deref(), Some("ws://x/page-1"));
        assert_eq!(first_page_ws_url(&json!([])), None);
        assert_eq!(first_page_ws_url(&json!({"not": "an array"})), None);
    }

    #[test]
    fn free_ports_are_distinct_enough() {
        let a = pick_free_port().unwrap();
        assert!(a > 0);
    }
}
