use anyhow::{anyhow, Context, Result};
use directories::ProjectDirs;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

pub const DEFAULT_API_BASE: &str = "https://test.onlysfree.com/api";

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeMode {
    /// Requests go through the local reverse proxy.
    Development,
    #[default]
    Production,
}

impl std::str::FromStr for RuntimeMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => Err(anyhow!("unknown mode `{}` (expected development, production)", other)),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per page fetch; 1 disables retry.
    pub max_attempts: u32,
    pub backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self { Self { max_attempts: 1, backoff_ms: 500 } }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct SidebarConfig {
    pub hot_path: String,
    pub popular_path: String,
    pub tags_path: String,
    /// How many tag names to sample for display.
    pub tag_sample: usize,
}

impl Default for SidebarConfig {
    fn default() -> Self {
        Self {
            hot_path: "hot".to_string(),
            popular_path: "popular".to_string(),
            tags_path: "tags".to_string(),
            tag_sample: 12,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub mode: RuntimeMode,
    pub api_base: String,
    pub proxy_origin: String,
    pub proxy_prefix: String,
    pub request_timeout_secs: u64,
    pub scroll_threshold_px: f64,
    pub retry: RetryConfig,
    pub sidebar: SidebarConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: RuntimeMode::Production,
            api_base: DEFAULT_API_BASE.to_string(),
            proxy_origin: "http://localhost:9002".to_string(),
            proxy_prefix: "/api-proxy".to_string(),
            request_timeout_secs: 20,
            scroll_threshold_px: 300.0,
            retry: RetryConfig::default(),
            sidebar: SidebarConfig::default(),
        }
    }
}

impl Config {
    /// Load from `path`, or from the default location when `None`. A missing
    /// default file yields defaults; a missing explicit file is an error.
    /// Environment overrides are applied last.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut cfg = match path {
            Some(p) => Self::from_file(p)?,
            None => match default_config_path() {
                Some(p) if p.exists() => Self::from_file(&p)?,
                _ => Self::default(),
            },
        };
        cfg.apply_env(|k| std::env::var(k).ok())?;
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file: {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing config file: {}", path.display()))
    }

    /// `STOREFRONT_*` overrides. `lookup` is injectable for tests.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(m) = lookup("STOREFRONT_MODE") { self.mode = m.parse()?; }
        if let Some(b) = lookup("STOREFRONT_API_BASE") { self.api_base = b; }
        if let Some(o) = lookup("STOREFRONT_PROXY_ORIGIN") { self.proxy_origin = o; }
        if let Some(t) = lookup("STOREFRONT_TIMEOUT_SECS") {
            self.request_timeout_secs = t.parse().with_context(|| format!("invalid STOREFRONT_TIMEOUT_SECS: {t}"))?;
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration { Duration::from_secs(self.request_timeout_secs) }

    /// Resolve the API base once, according to the runtime mode.
    pub fn resolve_base(&self) -> Result<ResolvedBase> {
        let raw = match self.mode {
            RuntimeMode::Production => self.api_base.clone(),
            RuntimeMode::Development => format!(
                "{}/{}",
                self.proxy_origin.trim_end_matches('/'),
                self.proxy_prefix.trim_matches('/')
            ),
        };
        ResolvedBase::parse(&raw)
    }
}

/// Supplies the root every endpoint path is joined onto.
pub trait BaseUrlResolver: Send + Sync {
    fn base_url(&self) -> &Url;
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedBase(Url);

impl ResolvedBase {
    pub fn parse(raw: &str) -> Result<Self> {
        // Trailing slash so Url::join appends instead of replacing the last segment.
        let mut s = raw.trim().trim_end_matches('/').to_string();
        s.push('/');
        let url = Url::parse(&s).with_context(|| format!("invalid API base URL: {raw}"))?;
        Ok(Self(url))
    }
}

impl BaseUrlResolver for ResolvedBase {
    fn base_url(&self) -> &Url { &self.0 }
}

pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("dev", "storefront", "storefront").map(|p| p.config_dir().join("storefront.toml"))
}
