//! Process configuration, environment-driven with production defaults.

use crate::selectors::SelectorStrategy;
use std::path::PathBuf;
use std::time::Duration;

/// Target project surface driven by the workflow.
const DEFAULT_PROJECT_URL: &str =
    "https://labs.google/fx/tr/tools/flow/project/6cec195e-b57e-4e22-9030-c7a2e4cfcda7";

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Host to bind to (default: 0.0.0.0 so hosted deployments reach it)
    pub host: String,
    /// Port to listen on (default: 10000, `PORT` overrides)
    pub port: u16,
    /// Production mode: headless browser, no local executable override
    pub production: bool,
    /// Explicit Chromium executable, only honored outside production
    pub executable_path: Option<PathBuf>,
    /// Browser profile directory kept across launches
    pub user_data_dir: PathBuf,
    /// The generation project page
    pub project_url: String,
    /// Optional persisted-authentication cookie file
    pub cookie_file: PathBuf,
    /// Where completed videos land and are served from
    pub download_dir: PathBuf,
    pub selectors: SelectorStrategy,
    pub waits: WaitConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        let host = std::env::var("VIDFORGE_HTTP_HOST")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| "0.0.0.0".to_string());

        let port = std::env::var("PORT")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(10000);

        let production = std::env::var("VIDFORGE_ENV")
            .map(|value| value.eq_ignore_ascii_case("production"))
            .unwrap_or(false);

        let executable_path = std::env::var("VIDFORGE_CHROME")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);

        Self {
            host,
            port,
            production,
            executable_path,
            user_data_dir: env_path("VIDFORGE_PROFILE_DIR", "./chrome-user-data"),
            project_url: std::env::var("VIDFORGE_PROJECT_URL")
                .ok()
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_PROJECT_URL.to_string()),
            cookie_file: env_path("VIDFORGE_COOKIE_FILE", "./google-cookies.json"),
            download_dir: env_path("VIDFORGE_DOWNLOAD_DIR", "./downloads"),
            selectors: SelectorStrategy::default(),
            waits: WaitConfig::default(),
        }
    }
}

impl AppConfig {
    /// Headless in production; visible locally where a human may need to
    /// complete a sign-in.
    pub fn headless(&self) -> bool {
        self.production
    }

    /// Executable override applies only to local runs; hosted environments
    /// use whatever Chromium the image provides.
    pub fn browser_executable(&self) -> Option<PathBuf> {
        if self.production {
            None
        } else {
            self.executable_path.clone()
        }
    }
}

fn env_path(var: &str, default: &str) -> PathBuf {
    std::env::var(var)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(default))
}

/// Every wait the workflow performs, in one place. The generation wait is
/// deliberately over-provisioned: the remote renderer exposes no progress
/// signal, and poking an unfinished result costs a full retry, so coarse
/// waiting beats tight polling there. The download is the opposite case,
/// observable on the file system and fast, hence the short poll.
#[derive(Debug, Clone)]
pub struct WaitConfig {
    /// Ceiling for reaching the project page.
    pub navigation_timeout: Duration,
    /// Settle time after navigation before touching controls.
    pub page_settle: Duration,
    /// Short pause after opening a control before its content is queried.
    pub control_settle: Duration,
    /// Pause after picking the model so the selection applies.
    pub selection_settle: Duration,
    /// Ceiling for an open menu to render its options.
    pub menu_wait: Duration,
    /// Ceiling for locating a clickable control.
    pub element_wait: Duration,
    /// Ceiling for the fresh result's confirmation element.
    pub result_wait: Duration,
    /// Pause for the download context menu to render.
    pub menu_render_delay: Duration,
    /// Bounds of the randomized wait for remote rendering.
    pub render_wait_min: Duration,
    pub render_wait_max: Duration,
    /// Download detection poll cadence and ceiling.
    pub download_poll_interval: Duration,
    pub download_poll_ceiling: Duration,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            navigation_timeout: Duration::from_secs(60),
            page_settle: Duration::from_secs(5),
            control_settle: Duration::from_millis(500),
            selection_settle: Duration::from_millis(1500),
            menu_wait: Duration::from_secs(15),
            element_wait: Duration::from_secs(10),
            result_wait: Duration::from_secs(30),
            menu_render_delay: Duration::from_secs(3),
            render_wait_min: Duration::from_secs(5 * 60),
            render_wait_max: Duration::from_secs(8 * 60),
            download_poll_interval: Duration::from_secs(2),
            download_poll_ceiling: Duration::from_secs(3 * 60),
        }
    }
}

impl WaitConfig {
    /// All-zero waits, for exercising the workflow deterministically.
    pub fn instant() -> Self {
        Self {
            navigation_timeout: Duration::from_millis(100),
            page_settle: Duration::ZERO,
            control_settle: Duration::ZERO,
            selection_settle: Duration::ZERO,
            menu_wait: Duration::from_millis(100),
            element_wait: Duration::from_millis(100),
            result_wait: Duration::from_millis(100),
            menu_render_delay: Duration::ZERO,
            render_wait_min: Duration::ZERO,
            render_wait_max: Duration::ZERO,
            download_poll_interval: Duration::from_millis(5),
            download_poll_ceiling: Duration::from_millis(250),
        }
    }
}
