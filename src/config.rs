//! Configuration for views, hot reloading, the preview server and logging.
//!
//! Settings are layered:
//! - Default values
//! - TOML configuration file (`hotview.toml` by default)
//! - Environment variable overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `HOTVIEW_` and use double
//! underscores to separate nested levels:
//! - `HOTVIEW_VIEWS__TEMPLATES_DIR=templates` sets `views.templates_dir`
//! - `HOTVIEW_VIEWS__HOT_RELOADING__ENABLED=true` sets `views.hot_reloading.enabled`
//! - `HOTVIEW_SERVER__BIND=0.0.0.0:8080` sets `server.bind`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Default configuration file name, looked up in the current directory.
pub const CONFIG_FILE: &str = "hotview.toml";

const ENV_PREFIX: &str = "HOTVIEW_";

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Settings {
    /// View engine settings
    #[serde(default)]
    pub views: ViewConfig,

    /// Preview server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Options accepted by a [`Views`](crate::Views) instance.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ViewConfig {
    /// Directory holding template sources. Required.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub templates_dir: Option<PathBuf>,

    /// Base that a relative `templates_dir` is joined onto
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative_to: Option<PathBuf>,

    /// Extension appended to template identifiers that lack it
    #[serde(default = "default_extension")]
    pub default_extension: String,

    /// Content type of rendered responses
    #[serde(default = "default_content_type")]
    pub content_type: String,

    /// Charset of rendered responses
    #[serde(default = "default_encoding")]
    pub encoding: String,

    /// Write compiled templates next to their sources
    #[serde(default = "default_true")]
    pub persist_compiled: bool,

    /// Suffix of the compiled artifact written next to a source file
    #[serde(default = "default_compiled_suffix")]
    pub compiled_suffix: String,

    /// Global context merged into every render
    #[serde(default)]
    pub context: serde_json::Map<String, serde_json::Value>,

    /// Hot reloading settings
    #[serde(default)]
    pub hot_reloading: HotReloadConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HotReloadConfig {
    /// Watch rendered templates and invalidate them on change
    #[serde(default)]
    pub enabled: bool,

    /// Quiet period after the last change before invalidating (milliseconds)
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    /// Glob patterns registered eagerly at startup
    #[serde(default)]
    pub watch_files: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    /// Address the preview server binds to
    #[serde(default = "default_bind")]
    pub bind: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Default level for all modules
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-module level overrides
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

// Default value functions
fn default_extension() -> String {
    ".jinja".to_string()
}
fn default_content_type() -> String {
    "text/html".to_string()
}
fn default_encoding() -> String {
    "utf-8".to_string()
}
fn default_true() -> bool {
    true
}
fn default_compiled_suffix() -> String {
    ".compiled".to_string()
}
fn default_delay_ms() -> u64 {
    2500
}
fn default_bind() -> String {
    "127.0.0.1:3000".to_string()
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            templates_dir: None,
            relative_to: None,
            default_extension: default_extension(),
            content_type: default_content_type(),
            encoding: default_encoding(),
            persist_compiled: true,
            compiled_suffix: default_compiled_suffix(),
            context: serde_json::Map::new(),
            hot_reloading: HotReloadConfig::default(),
        }
    }
}

impl Default for HotReloadConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            delay_ms: default_delay_ms(),
            watch_files: Vec::new(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl ViewConfig {
    /// Configuration rooted at `templates_dir` with all other options defaulted.
    pub fn new(templates_dir: impl Into<PathBuf>) -> Self {
        Self {
            templates_dir: Some(templates_dir.into()),
            ..Self::default()
        }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.default_extension = extension.into();
        self
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        if let serde_json::Value::Object(map) = context {
            self.context = map;
        }
        self
    }

    pub fn with_hot_reloading(mut self, delay_ms: u64) -> Self {
        self.hot_reloading.enabled = true;
        self.hot_reloading.delay_ms = delay_ms;
        self
    }

    pub fn watch_files(mut self, pattern: impl Into<String>) -> Self {
        self.hot_reloading.watch_files.push(pattern.into());
        self
    }

    pub fn persist_compiled(mut self, persist: bool) -> Self {
        self.persist_compiled = persist;
        self
    }

    /// Check the options that cannot be defaulted.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match &self.templates_dir {
            Some(dir) if !dir.as_os_str().is_empty() => {}
            _ => return Err(ConfigError::MissingOption("templates_dir")),
        }

        if self.default_extension.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "default_extension",
                reason: "must not be empty".to_string(),
            });
        }

        if self.compiled_suffix.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "compiled_suffix",
                reason: "must not be empty".to_string(),
            });
        }

        Ok(())
    }

    /// Directory templates resolve against: `relative_to / templates_dir`
    /// when both are set.
    pub fn base_dir(&self) -> Option<PathBuf> {
        let dir = self.templates_dir.as_ref()?;
        Some(match &self.relative_to {
            Some(base) => base.join(dir),
            None => dir.clone(),
        })
    }
}

impl Settings {
    /// Load configuration from all sources, reading `hotview.toml` from the
    /// current directory when present.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(CONFIG_FILE)
    }

    /// Load configuration from a specific file, then apply env overrides.
    ///
    /// A missing file is not an error; defaults and env still apply.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            // Double underscore separates nested levels; single underscores
            // stay within field names.
            .merge(Env::prefixed(ENV_PREFIX).map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
            .extract()
            .map_err(|e| ConfigError::Load(Box::new(e)))
    }

    /// Render the settings as pretty TOML.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.views.default_extension, ".jinja");
        assert_eq!(settings.views.content_type, "text/html");
        assert_eq!(settings.views.encoding, "utf-8");
        assert!(settings.views.persist_compiled);
        assert!(!settings.views.hot_reloading.enabled);
        assert_eq!(settings.views.hot_reloading.delay_ms, 2500);
        assert_eq!(settings.server.bind, "127.0.0.1:3000");
        assert_eq!(settings.logging.default, "warn");
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("hotview.toml");

        let toml_content = r#"
[views]
templates_dir = "/srv/templates"
default_extension = ".html"

[views.context]
site = "example"

[views.hot_reloading]
enabled = true
delay_ms = 300
watch_files = ["**/*.html"]

[server]
bind = "0.0.0.0:8080"
"#;
        fs::write(&config_path, toml_content).unwrap();

        let settings = Settings::load_from(&config_path).unwrap();
        assert_eq!(
            settings.views.templates_dir,
            Some(PathBuf::from("/srv/templates"))
        );
        assert_eq!(settings.views.default_extension, ".html");
        assert_eq!(settings.views.context["site"], "example");
        assert!(settings.views.hot_reloading.enabled);
        assert_eq!(settings.views.hot_reloading.delay_ms, 300);
        assert_eq!(settings.views.hot_reloading.watch_files, vec!["**/*.html"]);
        assert_eq!(settings.server.bind, "0.0.0.0:8080");
        // Untouched values keep their defaults
        assert_eq!(settings.views.content_type, "text/html");
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let settings = Settings::load_from(temp_dir.path().join("absent.toml")).unwrap();
        assert!(settings.views.templates_dir.is_none());
        assert_eq!(settings.views.hot_reloading.delay_ms, 2500);
    }

    #[test]
    fn test_validate_requires_templates_dir() {
        let config = ViewConfig::default();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingOption("templates_dir"))
        ));

        let config = ViewConfig::new("");
        assert!(config.validate().is_err());

        let config = ViewConfig::new("/tpl");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_extension() {
        let config = ViewConfig::new("/tpl").with_extension("");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue {
                field: "default_extension",
                ..
            })
        ));
    }

    #[test]
    fn test_base_dir_joins_relative_to() {
        let mut config = ViewConfig::new("views");
        assert_eq!(config.base_dir(), Some(PathBuf::from("views")));

        config.relative_to = Some(PathBuf::from("/srv/app"));
        assert_eq!(config.base_dir(), Some(PathBuf::from("/srv/app/views")));
    }

    #[test]
    fn test_settings_toml_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("hotview.toml");

        let mut settings = Settings::default();
        settings.views = ViewConfig::new("/tpl").with_hot_reloading(100);
        fs::write(&config_path, settings.to_toml().unwrap()).unwrap();

        let loaded = Settings::load_from(&config_path).unwrap();
        assert_eq!(loaded.views.templates_dir, Some(PathBuf::from("/tpl")));
        assert!(loaded.views.hot_reloading.enabled);
        assert_eq!(loaded.views.hot_reloading.delay_ms, 100);
    }
}
