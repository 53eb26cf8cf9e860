//! Serve command - preview every template over HTTP.

use std::path::PathBuf;

use crate::config::Settings;

/// Arguments for the serve command.
pub struct ServeArgs {
    pub templates: Option<PathBuf>,
    pub bind: Option<String>,
    pub watch: bool,
    pub delay: Option<u64>,
}

/// Fold CLI flags over the loaded settings. Flags win.
pub fn apply(args: ServeArgs, mut settings: Settings) -> Settings {
    if let Some(dir) = args.templates {
        settings.views.templates_dir = Some(dir);
    }
    if let Some(bind) = args.bind {
        settings.server.bind = bind;
    }
    if args.watch {
        settings.views.hot_reloading.enabled = true;
    }
    if let Some(delay) = args.delay {
        settings.views.hot_reloading.delay_ms = delay;
    }
    settings
}

#[cfg(feature = "http-server")]
pub async fn run(args: ServeArgs, settings: Settings) -> anyhow::Result<()> {
    use std::sync::Arc;

    use crate::http::router;
    use crate::views::Views;

    let settings = apply(args, settings);
    let bind = settings.server.bind.clone();

    let views = Arc::new(Views::new(settings.views)?);
    let app = router(views.clone());

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    crate::log_event!(
        "http",
        "listening",
        "http://{bind} (hot reload {})",
        if views.is_hot_reloading() { "on" } else { "off" }
    );
    eprintln!("Previewing templates on http://{bind}");
    eprintln!("Press Ctrl+C to stop the server");

    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            result?;
        }
        _ = shutdown_signal() => {
            eprintln!("Shutting down...");
        }
    }

    views.close();
    Ok(())
}

#[cfg(feature = "http-server")]
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        crate::warn_event!("http", "no ctrl+c handler", "{e}");
        std::future::pending::<()>().await;
    }
}

#[cfg(not(feature = "http-server"))]
pub async fn run(_args: ServeArgs, _settings: Settings) -> anyhow::Result<()> {
    anyhow::bail!("HTTP server support is not compiled in; rebuild with --features http-server")
}
