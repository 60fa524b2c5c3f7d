//! Tail a WebSocket feed
//!
//! Connects to the address in the lifeline configuration, logs every
//! notification, sends each line typed on stdin and keeps the connection
//! alive until Ctrl+C.
//!
//! Configuration path: first argument, else `LIFELINE_CONFIG_PATH`, else
//! `config/lifeline.yaml`. `LIFELINE_ADDRESS` overrides the address.

use anyhow::{Context, Result};
use lifeline_app::bin_common::{
    init_tracing, load_config_from_env, parse_args, BinaryRunner, ConfigType, RunConfig,
};
use lifeline_app::lifeline::{
    ConnectionConfig, ConnectionEvent, ConnectionManager, WebSocketTransport,
};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

const EVENT_POLL_INTERVAL: Duration = Duration::from_millis(20);

struct Tail {
    config: RunConfig,
    manager: Option<ConnectionManager>,
    messages: u64,
}

impl Tail {
    fn new(connection: ConnectionConfig) -> Result<Self> {
        let manager = ConnectionManager::builder()
            .transport(WebSocketTransport::default())
            .config(connection)
            .build()
            .context("Failed to build connection manager")?;

        Ok(Self {
            config: RunConfig::new("lifeline_tail").with_stats_interval(30),
            manager: Some(manager),
            messages: 0,
        })
    }

    fn log_event(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Open { address } => info!("Connected to {}", address),
            ConnectionEvent::Message { data } => {
                self.messages += 1;
                info!("<< {}", data);
            }
            ConnectionEvent::Error { error } => warn!("Connection error: {}", error),
            ConnectionEvent::Close => info!("Connection closed"),
        }
    }
}

impl BinaryRunner for Tail {
    async fn run(&mut self) -> Result<()> {
        let Some(manager) = self.manager.take() else {
            anyhow::bail!("manager already shut down");
        };

        manager.connect()?;

        let mut stdin = BufReader::new(tokio::io::stdin()).lines();
        let mut stdin_open = true;
        let mut poll = tokio::time::interval(EVENT_POLL_INTERVAL);
        let mut stats = tokio::time::interval(Duration::from_secs(self.config.stats_interval_secs));
        stats.tick().await;

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Received shutdown signal (Ctrl+C)");
                    break;
                }
                line = stdin.next_line(), if stdin_open => match line {
                    Ok(Some(line)) if !line.trim().is_empty() => {
                        info!(">> {}", line);
                        manager.send(line)?;
                    }
                    Ok(Some(_)) => {}
                    Ok(None) => stdin_open = false,
                    Err(e) => {
                        error!("Failed to read stdin: {}", e);
                        stdin_open = false;
                    }
                },
                _ = poll.tick() => {
                    while let Some(event) = manager.try_recv_event() {
                        self.log_event(event);
                    }
                }
                _ = stats.tick() => {
                    let metrics = manager.metrics();
                    info!(
                        "state={} sent={} received={} pongs={} reconnect_attempts={}",
                        metrics.connection_state,
                        metrics.messages_sent,
                        metrics.messages_received,
                        metrics.pongs_received,
                        metrics.reconnect_attempts
                    );
                }
            }
        }

        manager.shutdown().await?;
        Ok(())
    }

    fn config(&self) -> &RunConfig {
        &self.config
    }

    fn stats(&self) -> Option<String> {
        Some(format!("Messages received: {}", self.messages))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config_type = ConfigType::from_args(&parse_args());
    let config_path = load_config_from_env(config_type);
    info!("Loading configuration from {}", config_path.display());

    let connection = ConnectionConfig::load(&config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;

    let mut tail = Tail::new(connection)?;
    tail.execute().await
}
