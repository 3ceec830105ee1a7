mod alarm;
mod command;
mod config;
mod listener;
mod modem;
mod port;
mod position;
mod replies;

use alarm::{AlarmController, AlarmState};
use anyhow::{Context, Result};
use command::handlers::HandlerContext;
use command::{AuthenticatedSenders, CommandDispatcher, DispatchEvent};
use config::TrackerConfig;
use listener::NotificationListener;
use modem::{AtCommandSender, Modem};
use port::{PortConnector, SerialConnector};
use position::PositionEngine;
use std::sync::Arc;
use tokio::sync::mpsc;

use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = TrackerConfig::load()?;

    let connector = SerialConnector::new(&config.modem.port, config.modem.baud);
    info!("GSM tracker starting on {}", connector.name());
    let stream = connector.connect().await?;

    let (modem, urcs) = Modem::new(stream, &config.modem);
    let at = AtCommandSender::new(Arc::new(modem), config.sms.settle());

    at.configure(&config.sms.service_center)
        .await
        .context("configuring modem")?;
    if let Err(e) = at.send_sms(&config.auth.operator, replies::STARTED).await {
        warn!("Startup message to {} failed: {}", config.auth.operator, e);
    }

    let state = Arc::new(AlarmState::new());
    let ctx = HandlerContext {
        at: at.clone(),
        position: PositionEngine::new(at.clone(), state.clone(), config.alarm.gps_warmup()),
        state: state.clone(),
        alarm: Arc::new(AlarmController::new(state)),
        alarm_config: config.alarm.clone(),
    };
    let senders = Arc::new(AuthenticatedSenders::new(config.auth.operator.clone()));

    let (queue_tx, queue_rx) = mpsc::unbounded_channel();
    let listener = NotificationListener::new(at, queue_tx);
    tokio::spawn(listener.run(urcs));

    let (dispatcher, mut events) = CommandDispatcher::new(ctx, senders, config.auth.password.clone());
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            log_dispatch_event(&event);
        }
    });

    info!("Tracker ready, operator {}", config.auth.operator);
    dispatcher.run(queue_rx).await;

    error!("Command queue closed, shutting down");
    Ok(())
}

fn log_dispatch_event(event: &DispatchEvent) {
    match event {
        DispatchEvent::Accepted {
            sequence,
            sender,
            instruction,
        } => debug!("[MAIN] #{} accepted: {} from {}", sequence, instruction, sender),
        DispatchEvent::Ignored { sequence, reason } => {
            debug!("[MAIN] #{} ignored: {}", sequence, reason)
        }
        DispatchEvent::Completed {
            sequence,
            instruction,
        } => info!("[MAIN] #{} {} done", sequence, instruction),
        DispatchEvent::Failed {
            sequence,
            instruction,
            error,
        } => warn!("[MAIN] #{} {} failed: {}", sequence, instruction, error),
    }
}
