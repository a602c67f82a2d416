//! Cookie snapshot (`auth.json`) in the Playwright `storage_state` layout.

use crate::error::{BrowserError, BrowserResult};
use chromiumoxide::cdp::browser_protocol::network::{
    Cookie, CookieParam, CookieSameSite, TimeSinceEpoch,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SameSite {
    Strict,
    #[default]
    Lax,
    None,
}

impl From<SameSite> for CookieSameSite {
    fn from(s: SameSite) -> Self {
        match s {
            SameSite::Strict => CookieSameSite::Strict,
            SameSite::Lax => CookieSameSite::Lax,
            SameSite::None => CookieSameSite::None,
        }
    }
}

impl From<&CookieSameSite> for SameSite {
    fn from(s: &CookieSameSite) -> Self {
        match s {
            CookieSameSite::Strict => SameSite::Strict,
            CookieSameSite::Lax => SameSite::Lax,
            CookieSameSite::None => SameSite::None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    #[serde(default = "default_path")]
    pub path: String,
    /// Unix seconds; -1 for a session cookie.
    #[serde(default = "session_expiry")]
    pub expires: f64,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub same_site: SameSite,
}

fn default_path() -> String {
    "/".to_string()
}

fn session_expiry() -> f64 {
    -1.0
}

impl StoredCookie {
    pub fn to_param(&self) -> BrowserResult<CookieParam> {
        let mut builder = CookieParam::builder()
            .name(self.name.clone())
            .value(self.value.clone())
            .domain(self.domain.clone())
            .path(self.path.clone())
            .secure(self.secure)
            .http_only(self.http_only)
            .same_site(CookieSameSite::from(self.same_site));
        if self.expires > 0.0 {
            builder = builder.expires(TimeSinceEpoch::new(self.expires));
        }
        builder
            .build()
            .map_err(|e| BrowserError::AuthState(format!("cookie {}: {}", self.name, e)))
    }
}

impl From<&Cookie> for StoredCookie {
    fn from(c: &Cookie) -> Self {
        Self {
            name: c.name.clone(),
            value: c.value.clone(),
            domain: c.domain.clone(),
            path: c.path.clone(),
            expires: if c.session { -1.0 } else { c.expires },
            http_only: c.http_only,
            secure: c.secure,
            same_site: c.same_site.as_ref().map(SameSite::from).unwrap_or_default(),
        }
    }
}

/// `{cookies, origins}`. Origins (local storage) are carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageState {
    #[serde(default)]
    pub cookies: Vec<StoredCookie>,
    #[serde(default)]
    pub origins: Vec<serde_json::Value>,
}

impl StorageState {
    pub fn parse(json: &str) -> BrowserResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// `Ok(None)` when the file does not exist.
    pub fn load<P: AsRef<Path>>(path: P) -> BrowserResult<Option<Self>> {
        let path = path.as_ref();
        if !path.exists() {
            warn!("⚠️ {} not found - login will be required", path.display());
            return Ok(None);
        }
        let state = Self::parse(&std::fs::read_to_string(path)?)?;
        if state.cookies.is_empty() {
            warn!("⚠️ {} contains no cookies", path.display());
        } else {
            info!("🍪 Loaded {} cookies from {}", state.cookies.len(), path.display());
        }
        Ok(Some(state))
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> BrowserResult<()> {
        let path = path.as_ref();
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        info!("✅ Saved {} cookies to {}", self.cookies.len(), path.display());
        Ok(())
    }

    pub fn from_cookies(cookies: &[Cookie]) -> Self {
        Self {
            cookies: cookies.iter().map(StoredCookie::from).collect(),
            origins: Vec::new(),
        }
    }

    pub fn cookie_params(&self) -> BrowserResult<Vec<CookieParam>> {
        self.cookies.iter().map(StoredCookie::to_param).collect()
    }
}
