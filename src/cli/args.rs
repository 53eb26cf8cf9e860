//! CLI argument parsing using clap.

use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::path::PathBuf;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Template views with hot reloading
#[derive(Parser, Debug)]
#[command(
    name = "hotview",
    version = env!("CARGO_PKG_VERSION"),
    about = "Render MiniJinja templates and preview them over HTTP",
    next_line_help = true,
    styles = clap_cargo_style()
)]
pub struct Cli {
    /// Path to a hotview.toml file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve every template over HTTP
    #[command(
        after_help = "Examples:\n  hotview serve --templates views\n  hotview serve --watch --delay 500\n  hotview serve --bind 0.0.0.0:8080"
    )]
    Serve {
        /// Templates directory (overrides config)
        #[arg(short, long)]
        templates: Option<PathBuf>,

        /// Address to bind (overrides config)
        #[arg(short, long)]
        bind: Option<String>,

        /// Invalidate templates when their files change
        #[arg(long)]
        watch: bool,

        /// Quiet period before invalidating, in milliseconds (overrides config)
        #[arg(long)]
        delay: Option<u64>,
    },

    /// Render one template to stdout
    #[command(after_help = "Examples:\n  hotview render hello --context '{\"name\":\"world\"}'")]
    Render {
        /// Template identifier, e.g. `pages/about`
        template: String,

        /// Render context as a JSON object
        #[arg(long)]
        context: Option<String>,

        /// Templates directory (overrides config)
        #[arg(short, long)]
        templates: Option<PathBuf>,
    },

    /// Display the effective settings
    Config,
}
