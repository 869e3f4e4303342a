//! Shared test doubles: a scriptable page driver, a factory handing out
//! prepared drivers, and an in-memory artifact observer.
#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::{HashSet, VecDeque};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use vidforge_core::config::{AppConfig, WaitConfig};
use vidforge_core::workflow::{ArtifactObserver, SessionFactory};
use vidforge_browser::{BrowserError, Cookie, PageDriver};

pub struct MockDriver {
    pub calls: Mutex<Vec<String>>,
    rules: Mutex<Vec<(String, Value)>>,
    navigate_error: Mutex<Option<BrowserError>>,
    hold_navigation: Option<Arc<Semaphore>>,
    connected: AtomicBool,
}

impl MockDriver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            rules: Mutex::new(Vec::new()),
            navigate_error: Mutex::new(None),
            hold_navigation: None,
            connected: AtomicBool::new(true),
        })
    }

    /// A driver whose `navigate` blocks until the semaphore hands out a
    /// permit, keeping a job in flight for as long as a test needs.
    pub fn holding(gate: Arc<Semaphore>) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            rules: Mutex::new(Vec::new()),
            navigate_error: Mutex::new(None),
            hold_navigation: Some(gate),
            connected: AtomicBool::new(true),
        })
    }

    /// Make every evaluated script containing `needle` return `value`.
    pub fn rule(&self, needle: &str, value: Value) {
        self.rules
            .lock()
            .unwrap()
            .push((needle.to_string(), value));
    }

    pub fn fail_next_navigate(&self, error: BrowserError) {
        *self.navigate_error.lock().unwrap() = Some(error);
    }

    pub fn saw(&self, needle: &str) -> bool {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .any(|call| call.contains(needle))
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl PageDriver for MockDriver {
    async fn navigate(&self, url: &str, _timeout: Duration) -> Result<(), BrowserError> {
        self.record(format!("navigate:{url}"));
        if let Some(gate) = &self.hold_navigation {
            let permit = gate.acquire().await.expect("semaphore closed");
            permit.forget();
        }
        if let Some(error) = self.navigate_error.lock().unwrap().take() {
            return Err(error);
        }
        Ok(())
    }

    async fn evaluate(&self, expression: &str) -> Result<Value, BrowserError> {
        let head: String = expression.chars().take(160).collect();
        self.record(format!("evaluate:{head}"));

        for (needle, value) in self.rules.lock().unwrap().iter() {
            if expression.contains(needle.as_str()) {
                return Ok(value.clone());
            }
        }

        // Sensible defaults: pages finish loading, nothing has failed,
        // every interaction finds its element.
        if expression.contains("document.readyState") {
            return Ok(json!("complete"));
        }
        if expression.contains("innerText.includes") {
            return Ok(json!(false));
        }
        Ok(json!(true))
    }

    async fn set_value_and_notify(
        &self,
        selector: &str,
        value: &str,
    ) -> Result<bool, BrowserError> {
        self.record(format!("set_value:{selector}:{value}"));
        Ok(true)
    }

    async fn press_escape(&self) -> Result<(), BrowserError> {
        self.record("escape".to_string());
        Ok(())
    }

    async fn set_download_dir(&self, dir: &Path) -> Result<(), BrowserError> {
        self.record(format!("set_download_dir:{}", dir.display()));
        Ok(())
    }

    async fn set_cookies(&self, cookies: &[Cookie]) -> Result<(), BrowserError> {
        self.record(format!("set_cookies:{}", cookies.len()));
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<(), BrowserError> {
        self.record("close".to_string());
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out prepared drivers in order, then fresh defaults.
pub struct MockFactory {
    drivers: Mutex<VecDeque<Arc<MockDriver>>>,
    pub created: AtomicUsize,
}

impl MockFactory {
    pub fn with_drivers(drivers: Vec<Arc<MockDriver>>) -> Arc<Self> {
        Arc::new(Self {
            drivers: Mutex::new(drivers.into()),
            created: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl SessionFactory for MockFactory {
    async fn create(&self) -> anyhow::Result<Arc<dyn PageDriver>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        let driver = self
            .drivers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(MockDriver::new);
        Ok(driver)
    }
}

/// Replays scripted directory listings, repeating the last one once the
/// script runs out.
pub struct MemoryObserver {
    listings: Mutex<VecDeque<HashSet<OsString>>>,
    last: Mutex<HashSet<OsString>>,
}

impl MemoryObserver {
    pub fn scripted(listings: Vec<Vec<&str>>) -> Arc<Self> {
        let listings: VecDeque<HashSet<OsString>> = listings
            .into_iter()
            .map(|names| names.into_iter().map(OsString::from).collect())
            .collect();
        Arc::new(Self {
            listings: Mutex::new(listings),
            last: Mutex::new(HashSet::new()),
        })
    }
}

#[async_trait]
impl ArtifactObserver for MemoryObserver {
    async fn list(&self) -> std::io::Result<HashSet<OsString>> {
        let mut listings = self.listings.lock().unwrap();
        if let Some(next) = listings.pop_front() {
            *self.last.lock().unwrap() = next.clone();
            return Ok(next);
        }
        Ok(self.last.lock().unwrap().clone())
    }
}

/// Configuration with instant waits and paths scoped under `dir`.
pub fn test_config(dir: &Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.download_dir = dir.join("downloads");
    config.cookie_file = dir.join("absent-cookies.json");
    config.user_data_dir = dir.join("profile");
    config.waits = WaitConfig::instant();
    config
}

pub fn download_path(config: &AppConfig, name: &str) -> PathBuf {
    config.download_dir.join(name)
}
