//! Per-render options.

use std::path::PathBuf;

use crate::config::ViewConfig;

/// Options a single render resolves and marshals with.
///
/// Built from the view configuration, then overlaid with a call's
/// [`ViewOverrides`]. Never mutated after the merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    pub content_type: String,
    pub encoding: String,
    pub templates_dir: Option<PathBuf>,
    pub relative_to: Option<PathBuf>,
    pub default_extension: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self::from_config(&ViewConfig::default())
    }
}

impl RenderOptions {
    pub fn from_config(config: &ViewConfig) -> Self {
        Self {
            content_type: config.content_type.clone(),
            encoding: config.encoding.clone(),
            templates_dir: config.templates_dir.clone(),
            relative_to: config.relative_to.clone(),
            default_extension: config.default_extension.clone(),
        }
    }

    /// Overlay `overrides`; unset fields keep their current value.
    pub fn merge(&self, overrides: &ViewOverrides) -> Self {
        Self {
            content_type: overrides
                .content_type
                .clone()
                .unwrap_or_else(|| self.content_type.clone()),
            encoding: overrides
                .encoding
                .clone()
                .unwrap_or_else(|| self.encoding.clone()),
            templates_dir: overrides
                .templates_dir
                .clone()
                .or_else(|| self.templates_dir.clone()),
            relative_to: overrides
                .relative_to
                .clone()
                .or_else(|| self.relative_to.clone()),
            default_extension: self.default_extension.clone(),
        }
    }

    /// Directory template identifiers resolve against.
    pub fn base_dir(&self) -> Option<PathBuf> {
        let dir = self.templates_dir.as_ref()?;
        Some(match &self.relative_to {
            Some(base) => base.join(dir),
            None => dir.clone(),
        })
    }
}

/// Per-call overrides of the configured render options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewOverrides {
    pub content_type: Option<String>,
    pub encoding: Option<String>,
    pub templates_dir: Option<PathBuf>,
    pub relative_to: Option<PathBuf>,
}

impl ViewOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = Some(encoding.into());
        self
    }

    pub fn templates_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.templates_dir = Some(dir.into());
        self
    }

    pub fn relative_to(mut self, dir: impl Into<PathBuf>) -> Self {
        self.relative_to = Some(dir.into());
        self
    }
}
