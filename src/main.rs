//! Market data streaming demo
//!
//! Connects to the configured quote stream, subscribes to the configured
//! symbols, and logs quotes and connection transitions until Ctrl-C.

use std::time::Duration;

use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use market_stream::{Config, MarketStreamClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    let config = Config::load()?;
    info!(symbols = ?config.symbols, endpoint = %config.ws_endpoint, "Configuration loaded");

    let symbols = config.symbols.clone();
    let client = MarketStreamClient::over_websocket(config);

    let _conn_watch = client.on_connection_change(|event| {
        info!(event = ?event, "Connection state changed");
    });

    let subscription = client
        .subscribe(&symbols, |quote| {
            info!(
                symbol = %quote.symbol,
                price = %quote.price,
                change_percent = %quote.change_percent,
                mock = quote.mock,
                "Quote received"
            );
        })
        .await?;
    info!(symbols = ?subscription.symbols(), "Subscribed");

    let mut status = tokio::time::interval(Duration::from_secs(30));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = status.tick() => {
                let quotes = client.get_all_latest_quotes();
                info!(
                    cached_symbols = quotes.len(),
                    connected = client.is_connected(),
                    "Stream status"
                );
            }
        }
    }

    info!("Shutting down");
    subscription.unsubscribe();
    client.disconnect();

    Ok(())
}
