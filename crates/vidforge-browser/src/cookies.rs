//! Cookie persistence: a local JSON file (array of cookie objects) used to
//! restore an authenticated session before navigation.

use crate::BrowserError;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::path::Path;

/// One browser cookie as stored in the cookie file. Exported cookie dumps
/// carry extra bookkeeping fields (`size`, `session`, ...); those are
/// ignored on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secure: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_only: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub same_site: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<f64>,
}

impl Cookie {
    /// The subset of fields `Network.setCookies` accepts.
    pub fn to_cdp_param(&self) -> Value {
        let mut param = json!({ "name": self.name, "value": self.value });
        let object = param.as_object_mut().expect("param is an object");
        if let Some(url) = &self.url {
            object.insert("url".to_string(), json!(url));
        }
        if let Some(domain) = &self.domain {
            object.insert("domain".to_string(), json!(domain));
        }
        if let Some(path) = &self.path {
            object.insert("path".to_string(), json!(path));
        }
        if let Some(secure) = self.secure {
            object.insert("secure".to_string(), json!(secure));
        }
        if let Some(http_only) = self.http_only {
            object.insert("httpOnly".to_string(), json!(http_only));
        }
        if let Some(same_site) = &self.same_site {
            object.insert("sameSite".to_string(), json!(same_site));
        }
        // Negative expiry marks a session cookie in exported dumps; the
        // protocol wants the field omitted in that case.
        if let Some(expires) = self.expires
            && expires > 0.0
        {
            object.insert("expires".to_string(), json!(expires));
        }
        param
    }
}

/// Load the cookie file if present. A missing file is not an error: the
/// session simply proceeds unauthenticated.
pub fn load_cookie_file(path: &Path) -> Result<Option<Vec<Cookie>>, BrowserError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(path)
        .map_err(|e| BrowserError::Protocol(format!("failed to read cookie file: {e}")))?;
    let cookies: Vec<Cookie> = serde_json::from_str(&raw)
        .map_err(|e| BrowserError::Protocol(format!("invalid cookie file: {e}")))?;
    Ok(Some(cookies))
}
