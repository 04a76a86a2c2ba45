//! qrstudio runtime configuration handling

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Default chat-completion model used for drafting copy
pub const DEFAULT_AI_MODEL: &str = "gpt-3.5-turbo";

/// Default chat-completion API base URL
pub const DEFAULT_AI_BASE_URL: &str = "https://api.openai.com/v1";

/// Top-level configuration structure persisted to disk or environment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QrStudioConfig {
    /// Remote store (PostgREST / Supabase) connection settings
    pub store: StoreOptions,
    /// Chat-completion provider settings
    pub ai: AiOptions,
    /// Logging configuration
    pub logging: LoggingOptions,
    /// Export destination settings
    pub export: ExportOptions,
}

impl QrStudioConfig {
    /// Load configuration from an explicit path or fall back to discovered defaults.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = explicit_path {
            Self::from_file(path)?
        } else if let Some(path) = Self::discover_file()? {
            tracing::info!("Using configuration file: {}", path.display());
            Self::from_file(&path)?
        } else {
            tracing::debug!("No qrstudio.toml / qrstudio.yaml found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// First existing file among [`Self::candidate_paths`].
    fn discover_file() -> Result<Option<PathBuf>> {
        Ok(Self::candidate_paths()?
            .into_iter()
            .find(|path| path.is_file()))
    }

    /// `qrstudio.{toml,yaml,yml}` in the working directory, then
    /// `qrstudio/config.{toml,yaml}` under `$XDG_CONFIG_HOME` (or `~/.config`).
    fn candidate_paths() -> Result<Vec<PathBuf>> {
        let cwd =
            env::current_dir().map_err(|e| Error::Config(format!("Failed to read cwd: {e}")))?;
        let mut paths: Vec<PathBuf> = ["qrstudio.toml", "qrstudio.yaml", "qrstudio.yml"]
            .iter()
            .map(|name| cwd.join(name))
            .collect();

        let config_home = env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")));
        if let Some(base) = config_home.map(|dir| dir.join("qrstudio")) {
            paths.extend(["config.toml", "config.yaml"].iter().map(|name| base.join(name)));
        }
        Ok(paths)
    }

    /// Read configuration from a concrete file path.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {e}", path.display())))?;

        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("")
            .to_ascii_lowercase()
            .as_str()
        {
            "toml" => toml::from_str(&contents).map_err(|e| {
                Error::Config(format!("Failed to parse TOML {}: {e}", path.display()))
            }),
            "yaml" | "yml" => serde_yaml::from_str(&contents).map_err(|e| {
                Error::Config(format!("Failed to parse YAML {}: {e}", path.display()))
            }),
            other => Err(Error::Config(format!(
                "Unsupported config format '{}', expected toml/yaml",
                other
            ))),
        }
    }

    /// Apply environment variable overrides after file/default loading.
    fn apply_env_overrides(&mut self) {
        self.store.apply_env_overrides();
        self.ai.apply_env_overrides();
        self.logging.apply_env_overrides();
        self.export.apply_env_overrides();
    }
}

/// Remote store endpoint and anonymous access key
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreOptions {
    /// Project URL, e.g. `https://xyz.supabase.co`
    pub url: Option<String>,
    /// Anonymous (public) API key
    pub anon_key: Option<String>,
}

impl StoreOptions {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Some(url) = first_env(&["QRSTUDIO_STORE_URL", "SUPABASE_URL"]) {
            self.url = Some(url);
        }
        if let Some(key) = first_env(&["QRSTUDIO_STORE_KEY", "SUPABASE_ANON_KEY"]) {
            self.anon_key = Some(key);
        }
    }

    /// Both values are required; absence is fatal at startup.
    pub fn credentials(&self) -> Result<(&str, &str)> {
        let url = non_empty(self.url.as_deref())
            .ok_or_else(|| Error::Config("Missing store URL (QRSTUDIO_STORE_URL)".to_string()))?;
        let key = non_empty(self.anon_key.as_deref()).ok_or_else(|| {
            Error::Config("Missing store anonymous key (QRSTUDIO_STORE_KEY)".to_string())
        })?;
        Ok((url, key))
    }
}

/// Chat-completion provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiOptions {
    /// API key; drafting is disabled when absent
    pub api_key: Option<String>,
    /// Model identifier
    pub model: String,
    /// API base URL (without the `/chat/completions` suffix)
    pub base_url: String,
}

impl Default for AiOptions {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_AI_MODEL.to_string(),
            base_url: DEFAULT_AI_BASE_URL.to_string(),
        }
    }
}

impl AiOptions {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Some(key) = first_env(&["QRSTUDIO_AI_KEY", "OPENAI_API_KEY"]) {
            self.api_key = Some(key);
        }
        if let Ok(model) = env::var("QRSTUDIO_AI_MODEL") {
            if !model.trim().is_empty() {
                self.model = model;
            }
        }
        if let Ok(base) = env::var("QRSTUDIO_AI_BASE_URL") {
            if !base.trim().is_empty() {
                self.base_url = base;
            }
        }
    }

    /// The API key, if one is set and non-blank
    pub fn key(&self) -> Option<&str> {
        non_empty(self.api_key.as_deref())
    }
}

/// Structured logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingOptions {
    /// Default log level (overridable via `QRSTUDIO_LOG_LEVEL`)
    pub level: String,
    /// Optional log file path for teeing structured logs
    pub file: Option<PathBuf>,
    /// Force ANSI colors in stderr logging
    pub color: bool,
    /// Optional log rotation strategy applied to `file`
    pub rotation: Option<LogRotation>,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            color: true,
            rotation: None,
        }
    }
}

impl LoggingOptions {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(level) = env::var("QRSTUDIO_LOG_LEVEL") {
            self.level = level;
        }
        if let Ok(file) = env::var("QRSTUDIO_LOG_FILE") {
            self.file = Some(PathBuf::from(file));
        }
        if let Ok(color) = env::var("QRSTUDIO_LOG_COLOR") {
            match color.to_ascii_lowercase().as_str() {
                "0" | "false" | "off" => self.color = false,
                "1" | "true" | "on" => self.color = true,
                _ => {}
            }
        }
        if let Ok(rotation) = env::var("QRSTUDIO_LOG_ROTATION") {
            if let Some(parsed) = LogRotation::from_str(&rotation) {
                self.rotation = Some(parsed);
            }
        }
    }
}

/// Supported log rotation policies for file sinks
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    /// Rotate log files once per hour
    Hourly,
    /// Rotate log files once per day
    Daily,
}

impl LogRotation {
    fn from_str(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "hourly" => Some(Self::Hourly),
            "daily" => Some(Self::Daily),
            _ => None,
        }
    }
}

/// Where exported files land
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    /// Output directory for `qr-code.{png,jpg,pdf}`
    pub output_dir: PathBuf,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
        }
    }
}

impl ExportOptions {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(dir) = env::var("QRSTUDIO_OUTPUT_DIR") {
            if !dir.trim().is_empty() {
                self.output_dir = PathBuf::from(dir);
            }
        }
    }
}

fn first_env(names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| env::var(name).ok())
        .find(|value| !value.trim().is_empty())
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn working_directory_is_searched_first() {
        let paths = QrStudioConfig::candidate_paths().unwrap();
        let cwd = env::current_dir().unwrap();
        assert_eq!(paths[0], cwd.join("qrstudio.toml"));
        assert!(paths.iter().skip(3).all(|path| path.ends_with(
            Path::new("qrstudio").join(path.file_name().unwrap())
        )));
    }

    #[test]
    fn parses_toml_sections() {
        let config: QrStudioConfig = toml::from_str(
            r#"
            [store]
            url = "https://demo.supabase.co"
            anon_key = "anon"

            [ai]
            model = "gpt-4o-mini"

            [logging]
            level = "debug"
            rotation = "daily"
            "#,
        )
        .unwrap();

        assert_eq!(
            config.store.credentials().unwrap(),
            ("https://demo.supabase.co", "anon")
        );
        assert_eq!(config.ai.model, "gpt-4o-mini");
        assert_eq!(config.ai.base_url, DEFAULT_AI_BASE_URL);
        assert!(config.ai.key().is_none());
        assert_eq!(config.logging.rotation, Some(LogRotation::Daily));
    }

    #[test]
    fn missing_store_credentials_are_fatal() {
        let options = StoreOptions {
            url: Some("https://demo.supabase.co".to_string()),
            anon_key: Some("   ".to_string()),
        };
        assert!(matches!(options.credentials(), Err(Error::Config(_))));
        assert!(matches!(
            StoreOptions::default().credentials(),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn parses_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qrstudio.yaml");
        fs::write(&path, "export:\n  output_dir: /tmp/out\n").unwrap();

        let config = QrStudioConfig::from_file(&path).unwrap();
        assert_eq!(config.export.output_dir, PathBuf::from("/tmp/out"));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qrstudio.ini");
        fs::write(&path, "").unwrap();
        assert!(matches!(
            QrStudioConfig::from_file(&path),
            Err(Error::Config(_))
        ));
    }
}
