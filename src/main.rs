use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use speech_capture::{
    create_router, AppState, CaptureEvent, ChannelListener, Config, EngineScript, NatsClient,
    NatsEngineFactory, ScriptedEngineFactory, SpeechCaptureController,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "speech-capture", version, about = "Resilient speech capture controller")]
struct Cli {
    /// Configuration file (without extension)
    #[arg(long, default_value = "config/speech-capture")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the capture control API backed by the NATS STT service
    Serve,

    /// Replay a recorded engine script through a controller
    Replay {
        /// JSON engine script
        script: String,

        /// Use the engine's continuous mode instead of controller restarts
        #[arg(long)]
        continuous: bool,

        /// Stop the capture after this many milliseconds
        #[arg(long, default_value_t = 10_000)]
        stop_after_ms: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve => serve(&cli.config).await,
        Command::Replay {
            script,
            continuous,
            stop_after_ms,
        } => replay(&cli.config, &script, continuous, stop_after_ms).await,
    }
}

async fn serve(config_path: &str) -> Result<()> {
    let cfg = Config::load(config_path)?;

    info!("Loaded config: {}", cfg.service.name);
    info!(
        "HTTP server will bind to {}:{}",
        cfg.service.http.bind, cfg.service.http.port
    );

    let client = NatsClient::connect(&cfg.nats.url).await?;
    let state = AppState::new(Arc::new(NatsEngineFactory::new(client)), cfg.capture);
    let app = create_router(state);

    let listener =
        tokio::net::TcpListener::bind((cfg.service.http.bind.as_str(), cfg.service.http.port))
            .await?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}

async fn replay(
    config_path: &str,
    script_path: &str,
    continuous: bool,
    stop_after_ms: u64,
) -> Result<()> {
    let mut capture = match Config::load(config_path) {
        Ok(cfg) => cfg.capture,
        Err(e) => {
            info!("Using default capture settings ({:#})", e);
            Default::default()
        }
    };
    capture.continuous = continuous;

    let script = EngineScript::load(script_path)?;
    info!(
        "Replaying {} scripted attempt(s) from {}",
        script.attempts.len(),
        script_path
    );

    let factory = Arc::new(ScriptedEngineFactory::new(script));
    let (listener, mut events) = ChannelListener::new();
    let controller =
        SpeechCaptureController::new("replay", capture, factory.clone(), Arc::new(listener));

    let started = controller.start().await;

    let stop_after = tokio::time::sleep(Duration::from_millis(stop_after_ms));
    tokio::pin!(stop_after);
    let mut stopping = !started;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => {
                    println!("{}", event_json(&event));
                    if matches!(event, CaptureEvent::Ended(_) | CaptureEvent::Error(_)) {
                        break;
                    }
                }
                None => break,
            },
            _ = &mut stop_after, if !stopping => {
                info!("Stopping replay after {}ms", stop_after_ms);
                controller.stop().await;
                stopping = true;
            }
            _ = tokio::signal::ctrl_c(), if !stopping => {
                info!("Interrupted, stopping capture");
                controller.stop().await;
                stopping = true;
            }
        }
    }

    info!("Engine instances created: {}", factory.created());

    if !started {
        bail!("Capture could not be started");
    }

    Ok(())
}

fn event_json(event: &CaptureEvent) -> serde_json::Value {
    match event {
        CaptureEvent::Started => json!({ "event": "start" }),
        CaptureEvent::Result { text, is_interim } => {
            json!({ "event": "result", "text": text, "is_interim": is_interim })
        }
        CaptureEvent::Error(error) => {
            json!({ "event": "error", "code": error.code(), "message": error.to_string() })
        }
        CaptureEvent::Ended(transcript) => json!({ "event": "end", "transcript": transcript }),
    }
}
