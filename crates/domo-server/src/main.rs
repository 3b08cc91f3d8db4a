//! domo daemon
//!
//! Wires the configuration, outputs, executor and scheduler together and
//! runs until interrupted. SIGHUP reloads the schedule document in place.

use anyhow::{Context, Result};
use domo_config::{load_app_config, load_schedule_document, AppConfig};
use domo_executor::{Executor, TimerSettings};
use domo_output::{AudioOutput, LightOutput, Output, PubSubOutput};
use domo_schedule::{Dispatcher, Resolver};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn config_path() -> PathBuf {
    std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.yaml"))
}

fn build_outputs(config: &AppConfig) -> Vec<Arc<dyn Output>> {
    let (audio, audio_rx) = AudioOutput::new(config.audio.clone());
    let (lights, light_rx) = LightOutput::new(config.lights.clone());
    let pubsub = PubSubOutput::new(config.pubsub.clone());
    let mut pubsub_rx = pubsub.subscribe();

    // Downstream transports attach to these channels; until one does, the
    // commands are only logged.
    tokio::spawn(async move {
        let mut rx = audio_rx;
        while let Some(command) = rx.recv().await {
            info!(?command, "audio");
        }
    });
    tokio::spawn(async move {
        let mut rx = light_rx;
        while let Some(update) = rx.recv().await {
            info!(?update, "lights");
        }
    });
    tokio::spawn(async move {
        loop {
            match pubsub_rx.recv().await {
                Ok(message) => info!(topic = %message.topic, "publish"),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "pub/sub log reader lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    vec![Arc::new(audio), Arc::new(lights), Arc::new(pubsub)]
}

#[cfg(unix)]
fn spawn_reload_task(
    schedule_path: PathBuf,
    resolver: Resolver,
    replan: Arc<tokio::sync::Notify>,
) {
    tokio::spawn(async move {
        let mut hangup = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::hangup())
        {
            Ok(stream) => stream,
            Err(err) => {
                error!(%err, "cannot listen for SIGHUP; live reload disabled");
                return;
            }
        };
        while hangup.recv().await.is_some() {
            match load_schedule_document(&schedule_path) {
                Ok(document) => {
                    resolver.set_document(document);
                    replan.notify_one();
                }
                Err(err) => {
                    // Keep running on the previous document.
                    error!(%err, path = %schedule_path.display(), "schedule reload failed");
                }
            }
        }
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let path = config_path();
    let config = load_app_config(&path)
        .with_context(|| format!("loading {}", path.display()))?;
    let document = load_schedule_document(&config.schedule)
        .with_context(|| format!("loading {}", config.schedule.display()))?;
    info!(
        locations = config.locations.len(),
        days = document.day.len(),
        "configuration loaded"
    );

    let outputs = build_outputs(&config);
    let (executor, template_rx) = Executor::new(
        outputs,
        config.locations.iter().cloned(),
        TimerSettings::default(),
    );
    let resolver = Resolver::new(document, executor.clone());
    let dispatcher = Dispatcher::new(resolver.clone(), executor, template_rx);

    #[cfg(unix)]
    spawn_reload_task(
        config.schedule.clone(),
        resolver.clone(),
        dispatcher.replan_handle(),
    );

    let driver = tokio::spawn(dispatcher.run());

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down");
        }
        result = driver => {
            match result {
                Ok(Err(err)) => error!(%err, "scheduler stopped on a fatal error"),
                Ok(Ok(())) => warn!("scheduler exited"),
                Err(err) => error!(%err, "scheduler task panicked"),
            }
        }
    }

    Ok(())
}
