//! Idle Mover bot
//!
//! Connects to a voice server's query interface, runs the idle mover and
//! answers operator commands sent as private text messages.

use std::sync::Arc;

use anyhow::{Context, Result};
use idlemover_bot::events::{handle_event, SessionEvent};
use idlemover_bot::serverquery::ServerQueryClient;
use idlemover_bot::{Config, Controller, SessionClient};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        query_addr = %config.query_addr,
        server_id = config.server_id,
        "Starting idle mover"
    );

    let client = Arc::new(
        ServerQueryClient::connect(&config.query_addr)
            .await
            .with_context(|| format!("Failed to connect to {}", config.query_addr))?,
    );
    client
        .login(
            &config.query_user,
            &config.query_password,
            config.server_id,
            &config.nickname,
        )
        .await
        .context("Failed to log in to the query interface")?;
    client
        .subscribe()
        .await
        .context("Failed to register for server notifications")?;
    let mut events = client
        .take_events()
        .context("Notification stream already taken")?;

    let session: Arc<dyn SessionClient> = client.clone();
    let controller = Controller::new(session, config.mover.clone());

    if config.mover.auto_start {
        if let Err(e) = controller.start().await {
            error!(error = %e, "Failed to start idle mover");
        }
    }

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut keepalive = tokio::time::interval(config.keepalive_interval);
    keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);
    keepalive.tick().await;

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Received shutdown signal");
                break;
            }
            _ = keepalive.tick() => {
                if let Err(e) = client.keepalive().await {
                    warn!(error = %e, "Query keepalive failed");
                }
            }
            notification = events.recv() => {
                let Some(notification) = notification else {
                    error!("Query connection lost");
                    break;
                };
                for event in SessionEvent::from_notification(&notification) {
                    let Some((target, reply)) =
                        handle_event(&controller, &config.command_prefix, event).await
                    else {
                        continue;
                    };
                    if let Err(e) = client.send_text(target, &reply).await {
                        warn!(client_id = %target, error = %e, "Failed to send reply");
                    }
                }
            }
        }
    }

    controller.stop().await;
    info!("Idle mover shutdown complete");
    Ok(())
}
