use async_trait::async_trait;
use clap::Parser;
use parlance_app::session::{ReplyGenerator, SessionSignal};
use parlance_app::Cli;
use parlance_foundation::{ShutdownHandler, PresenceController};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::writer::MakeWriterExt;

fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all("logs")?;
    let file_appender = RollingFileAppender::new(Rotation::DAILY, "logs", "parlance.log");
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_writer(std::io::stdout.and(non_blocking_file))
        .with_env_filter(log_level)
        .init();
    std::mem::forget(guard);
    Ok(())
}

/// Stand-in reply collaborator for running the engine without the
/// language-model layer attached: acknowledges what it heard.
struct AcknowledgeReplies;

#[async_trait]
impl ReplyGenerator for AcknowledgeReplies {
    async fn generate(
        &self,
        utterance: &str,
        _cancel: &CancellationToken,
    ) -> anyhow::Result<String> {
        Ok(format!("I heard: {utterance}"))
    }
}

fn spawn_presence_logger(presence: &PresenceController) {
    let changes = presence.subscribe();
    std::thread::spawn(move || {
        while let Ok(change) = changes.recv() {
            tracing::info!(
                target: "presence",
                "presence: {} -> {} ({})",
                change.from,
                change.to,
                change.reason
            );
        }
    });
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging()?;
    tracing::info!("Starting Parlance");

    let cli = Cli::parse();
    let config = cli.into_config();

    let shutdown = ShutdownHandler::new().install().await;

    let mut handle = parlance_app::start(config, Arc::new(AcknowledgeReplies)).await?;
    spawn_presence_logger(&handle.presence);

    let mut utterances = handle.utterances.take();
    loop {
        tokio::select! {
            _ = shutdown.wait() => {
                tracing::info!("Shutdown signal received");
                break;
            }
            signal = handle.control_rx.recv() => {
                match signal {
                    Some(SessionSignal::StopListening) => {
                        tracing::info!("Stop-listening requested by voice");
                        break;
                    }
                    None => break,
                }
            }
            utterance = recv_ambient(&mut utterances) => {
                match utterance {
                    Some(utterance) => {
                        tracing::info!(
                            target: "ambient",
                            "heard {}: {:?} (confidence {:.2})",
                            utterance.speaker_id.as_deref().unwrap_or("unknown"),
                            utterance.text,
                            utterance.confidence
                        );
                    }
                    // Stream ended; stop polling it.
                    None => utterances = None,
                }
            }
        }
    }

    handle.shutdown().await;
    tracing::info!("Shutdown complete");
    Ok(())
}

/// Awaits the next ambient utterance, or pends forever when ambient
/// capture is disabled so the select stays balanced.
async fn recv_ambient(
    utterances: &mut Option<tokio::sync::mpsc::Receiver<parlance_stt::Utterance>>,
) -> Option<parlance_stt::Utterance> {
    match utterances {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
