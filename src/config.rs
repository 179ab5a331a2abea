use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use paperscope_core::overlay::{MinSize, DEFAULT_SCALE};

/// Environment variable that overrides `backend.base_url`.
pub const BACKEND_URL_ENV: &str = "PSC_BACKEND_URL";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    pub backend: BackendConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub viewer: ViewerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/psc.sqlite"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct UploadConfig {
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,
    #[serde(default = "default_allowed_mime")]
    pub allowed_mime: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_bytes: default_max_bytes(),
            allowed_mime: default_allowed_mime(),
        }
    }
}

fn default_max_bytes() -> u64 {
    50 * 1024 * 1024
}
fn default_allowed_mime() -> String {
    "application/pdf".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct PollConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
        }
    }
}

fn default_interval_ms() -> u64 {
    2000
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ViewerConfig {
    #[serde(default = "default_scale")]
    pub scale: f64,
    #[serde(default = "default_min_width")]
    pub min_highlight_width: f64,
    #[serde(default = "default_min_height")]
    pub min_highlight_height: f64,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            scale: default_scale(),
            min_highlight_width: default_min_width(),
            min_highlight_height: default_min_height(),
        }
    }
}

fn default_scale() -> f64 {
    DEFAULT_SCALE
}
fn default_min_width() -> f64 {
    10.0
}
fn default_min_height() -> f64 {
    8.0
}

impl ViewerConfig {
    pub fn min_size(&self) -> MinSize {
        MinSize {
            width: self.min_highlight_width,
            height: self.min_highlight_height,
        }
    }
}

impl Config {
    /// Defaults for everything, pointed at `base_url`.
    pub fn minimal(base_url: &str) -> Self {
        Self {
            db: DbConfig::default(),
            backend: BackendConfig {
                base_url: base_url.to_string(),
                timeout_secs: default_timeout_secs(),
            },
            upload: UploadConfig::default(),
            poll: PollConfig::default(),
            viewer: ViewerConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.backend.base_url)
            .with_context(|| format!("backend.base_url is not a URL: {}", self.backend.base_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("backend.base_url must be http or https, got '{}'", url.scheme());
        }
        if self.backend.timeout_secs == 0 {
            anyhow::bail!("backend.timeout_secs must be > 0");
        }
        if self.poll.interval_ms == 0 {
            anyhow::bail!("poll.interval_ms must be > 0");
        }
        if self.upload.max_bytes == 0 {
            anyhow::bail!("upload.max_bytes must be > 0");
        }
        if !(self.viewer.scale.is_finite() && self.viewer.scale > 0.0) {
            anyhow::bail!("viewer.scale must be > 0");
        }
        if self.viewer.min_highlight_width < 0.0 || self.viewer.min_highlight_height < 0.0 {
            anyhow::bail!("viewer minimum highlight size must be >= 0");
        }
        Ok(())
    }
}

/// Parse and validate a config file's contents. The environment is not read.
pub fn parse_config(content: &str) -> Result<Config> {
    parse_config_with_override(content, None)
}

/// Like [`parse_config`], with `backend_url` (when non-blank) replacing
/// `backend.base_url` before validation.
pub fn parse_config_with_override(content: &str, backend_url: Option<&str>) -> Result<Config> {
    let mut config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    if let Some(url) = backend_url.filter(|u| !u.trim().is_empty()) {
        config.backend.base_url = url.to_string();
    }

    config.validate()?;
    Ok(config)
}

/// Read `path` and apply the `PSC_BACKEND_URL` override.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let override_url = std::env::var(BACKEND_URL_ENV).ok();
    parse_config_with_override(&content, override_url.as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_applied() {
        let cfg = parse_config(
            r#"
[backend]
base_url = "http://localhost:8000"
"#,
        )
        .unwrap();
        assert_eq!(cfg.poll.interval_ms, 2000);
        assert_eq!(cfg.upload.max_bytes, 50 * 1024 * 1024);
        assert_eq!(cfg.upload.allowed_mime, "application/pdf");
        assert_eq!(cfg.viewer.scale, 1.5);
        assert_eq!(cfg.viewer.min_size(), MinSize::default());
        assert_eq!(cfg.db.path, PathBuf::from("./data/psc.sqlite"));
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(parse_config("[backend]\nbase_url = \"ftp://x\"\n").is_err());
        assert!(parse_config("[backend]\nbase_url = \"not a url\"\n").is_err());
        assert!(parse_config(
            "[backend]\nbase_url = \"http://x\"\n[poll]\ninterval_ms = 0\n"
        )
        .is_err());
        assert!(parse_config(
            "[backend]\nbase_url = \"http://x\"\n[viewer]\nscale = 0.0\n"
        )
        .is_err());
    }

    #[test]
    fn test_backend_url_override() {
        let content = "[backend]\nbase_url = \"ftp://x\"\n";
        let cfg = parse_config_with_override(content, Some("http://backend:9000")).unwrap();
        assert_eq!(cfg.backend.base_url, "http://backend:9000");

        assert!(parse_config_with_override(content, Some("  ")).is_err());
        assert!(parse_config_with_override(
            "[backend]\nbase_url = \"http://x\"\n",
            Some("not a url")
        )
        .is_err());
    }

    #[test]
    fn test_backend_section_required() {
        assert!(parse_config("[poll]\ninterval_ms = 100\n").is_err());
    }
}
