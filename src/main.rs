use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use devserve::config::{Options, ServerConfig};
use devserve::HttpServer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let opts = Options::parse();
    init_tracing(opts.quiet, opts.timefmt.as_deref());

    // Configuration errors are fatal before the listener binds.
    let config = match ServerConfig::from_options(opts) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };

    let server = HttpServer::new(config.clone())?;
    let listener = TcpListener::bind(config.bind_address()).await?;
    tracing::info!(
        dir = %config.root.display(),
        addr = %listener.local_addr()?,
        "serving"
    );

    if config.open {
        let url = format!("http://localhost:{}", config.port);
        tokio::spawn(async move {
            // Give the listener a moment before the browser hits it.
            tokio::time::sleep(Duration::from_millis(500)).await;
            if let Err(err) = open::that(&url) {
                tracing::warn!(error = %err, "failed to open browser");
            }
        });
    }

    server.run(listener).await?;
    Ok(())
}

fn init_tracing(quiet: bool, timefmt: Option<&str>) {
    let default = if quiet { "devserve=warn" } else { "devserve=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into());
    let registry = tracing_subscriber::registry().with(filter);
    match timefmt {
        Some(format) => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_timer(ChronoLocal::new(format.to_string())),
            )
            .init(),
        None => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}
