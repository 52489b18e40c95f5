pub mod engine;
pub mod mqtt;
pub mod persistence;
pub mod subscription;
pub mod topics;

use color_eyre::eyre::{eyre, Result};
use tokio::sync::mpsc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use crate::engine::{Engine, EngineCommand};
use crate::mqtt::client::MqttHandle;
use crate::topics::store::{default_fleet_templates, TemplateStore};

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let config = persistence::load_config()?;
    info!(
        broker = %config.broker.host,
        templates = config.templates.len(),
        "configuration loaded"
    );

    let store = TemplateStore::from_templates(config.templates.clone()).or_else(|e| {
        warn!(
            "persisted template catalog is invalid ({}), using the default catalog",
            e
        );
        TemplateStore::from_templates(
            default_fleet_templates()
                .into_iter()
                .map(|template| template.with_qos(config.broker.default_qos))
                .collect(),
        )
    })?;

    // Kanäle zwischen Transport, Engine und Präsentation
    let (transport_tx, transport_rx) = mpsc::channel(100);
    let (command_tx, command_rx) = mpsc::channel(100);
    let (routed_tx, mut routed_rx) = mpsc::channel(100);

    let (link, mqtt_handle) = MqttHandle::spawn(&config.broker, transport_tx);
    let (engine, snapshots) = Engine::new(store, link, routed_tx);

    if config.tenant.is_some() {
        command_tx
            .send(EngineCommand::SetTenant(config.tenant.clone()))
            .await
            .map_err(|e| eyre!("engine command channel closed: {}", e))?;
    }

    let engine_task = tokio::spawn(engine.run(command_rx, transport_rx));

    // Presentation stand-in: log routed traffic and subscription indicators
    // until a UI front-end takes over these streams.
    let mut active_rx = snapshots.active.clone();
    let presentation = tokio::spawn(async move {
        loop {
            tokio::select! {
                message = routed_rx.recv() => match message {
                    Some(message) => info!(
                        topic = %message.topic,
                        views = ?message.matched,
                        at = %message.received_at,
                        "message routed"
                    ),
                    None => break,
                },
                changed = active_rx.changed() => match changed {
                    Ok(()) => {
                        let active = active_rx.borrow_and_update().clone();
                        info!(?active, "active subscriptions");
                    }
                    Err(_) => break,
                },
            }
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("shutting down");

    drop(command_tx);
    mqtt_handle.shutdown();
    let _ = engine_task.await;
    presentation.abort();

    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
