//! Render command - render a single template to stdout.

use std::path::PathBuf;

use anyhow::Context;

use crate::config::Settings;
use crate::views::Views;

/// Arguments for the render command.
pub struct RenderArgs {
    pub template: String,
    pub context: Option<String>,
    pub templates: Option<PathBuf>,
}

/// Render a template and return the body.
///
/// Hot reloading is forced off: a one-shot render has nothing to watch.
pub fn render(args: RenderArgs, mut settings: Settings) -> anyhow::Result<String> {
    if let Some(dir) = args.templates {
        settings.views.templates_dir = Some(dir);
    }
    settings.views.hot_reloading.enabled = false;

    let context = match args.context.as_deref() {
        Some(raw) => serde_json::from_str(raw).context("--context must be valid JSON")?,
        None => serde_json::Value::Null,
    };

    let views = Views::new(settings.views)?;
    let rendered = views.render(&args.template, context)?;
    Ok(rendered.body)
}

pub fn run(args: RenderArgs, settings: Settings) -> anyhow::Result<()> {
    let body = render(args, settings)?;
    println!("{body}");
    Ok(())
}
