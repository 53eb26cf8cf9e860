use clap::Parser;
use hotview::Settings;
use hotview::cli::commands::{config, render, serve};
use hotview::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };

    hotview::logging::init_with_config(&settings.logging);

    match cli.command {
        Commands::Serve {
            templates,
            bind,
            watch,
            delay,
        } => {
            serve::run(
                serve::ServeArgs {
                    templates,
                    bind,
                    watch,
                    delay,
                },
                settings,
            )
            .await
        }
        Commands::Render {
            template,
            context,
            templates,
        } => render::run(
            render::RenderArgs {
                template,
                context,
                templates,
            },
            settings,
        ),
        Commands::Config => config::run(&settings),
    }
}
