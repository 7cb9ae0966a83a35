//! Script bridge server.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────────┐
//!                      │                  SCRIPT BRIDGE                   │
//!                      │                                                  │
//!   Client Request     │  ┌────────┐   ┌──────────┐   ┌───────────────┐   │
//!   ───────────────────┼─▶│  http  │──▶│ routing  │──▶│    context    │   │
//!                      │  │ server │   │  router  │   │    builder    │   │
//!                      │  └────────┘   └────┬─────┘   └───────┬───────┘   │
//!                      │                    │                 │           │
//!                      │                    ▼                 ▼           │
//!                      │              ┌──────────┐     ┌─────────────┐    │
//!                      │              │   vfs    │     │   engine    │────┼──▶ php-cgi
//!                      │              │  store   │◀─┐  │  (CGI)      │    │
//!                      │              └──────────┘  │  └─────────────┘    │
//!                      │                            │                     │
//!                      │              ┌──────────┐  │                     │
//!                      │              │  watch   │──┘  epoch bumps        │
//!                      │              └──────────┘                        │
//!                      │                                                  │
//!                      │  Cross-cutting: config, lifecycle, observability │
//!                      └──────────────────────────────────────────────────┘
//! ```
//!
//! Configuration is read from the file named by `SCRIPT_BRIDGE_CONFIG`, or
//! `./bridge.toml` when present, otherwise defaults apply.

use tokio::net::TcpListener;

use script_bridge::config::load_from_env;
use script_bridge::lifecycle::signals::spawn_signal_listener;
use script_bridge::lifecycle::{Bridge, Shutdown};
use script_bridge::observability::{logging, metrics};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_from_env()?;
    logging::init_logging(&config.observability);

    tracing::info!("script-bridge v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        root = %config.source.root.display(),
        mode = ?config.mode,
        engine = %config.engine.program,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let bridge = Bridge::builder(config).build()?;

    let shutdown = Shutdown::new();
    spawn_signal_listener(&shutdown);
    bridge.serve(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
