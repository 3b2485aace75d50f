//! Vitapod gateway — kiosk entry point.
//!
//! Wires the session controller to its clients: one HTTP/WebSocket server for
//! display UIs, a speech transcript channel, and a terminal reader for bench
//! runs. Configuration comes from the environment (`.env` supported):
//!
//! - `VITAPOD_BIND`      listen address, default `127.0.0.1:8765`
//! - `VITAPOD_PLAYBACK`  `local` (kiosk audio), `remote` (client voices the
//!   text), or `none`
//! - `VITAPOD_PRINTER`   receipt printer device node, e.g. `/dev/usb/lp0`
//! - `OPENROUTER_API_KEY` enables free-form language understanding and TTS

mod gateway;
mod http;
mod ws;

use gateway::ClientGateway;
use std::sync::Arc;
use tokio::io::AsyncBufReadExt;
use tokio::sync::{broadcast, mpsc};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vitapod_core::{
    ActionChannel, LocalOracle, NluOracle, OpenRouterOracle, ReadingCoordinator, ReceiptPrinter,
    ResetSignal, Services, SessionConfig, SessionController, SimulatedDevices, SnapshotSink,
};
use vitapod_voice::{
    spawn_transcript_forwarder, NullPlayback, NullSynth, OpenAiSynth, PlaybackBackend,
    RemotePlayback, RodioPlayback, TtsSynth, TurnArbiter,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
    dotenvy::dotenv().ok();

    let bind = std::env::var("VITAPOD_BIND").unwrap_or_else(|_| "127.0.0.1:8765".into());
    let playback_mode = std::env::var("VITAPOD_PLAYBACK").unwrap_or_else(|_| "local".into());

    let reset = ResetSignal::new();
    let (actions_tx, actions) = ActionChannel::new(reset.clone());
    let (clients, _) = broadcast::channel::<String>(64);

    let mut remote = None;
    let backend: Arc<dyn PlaybackBackend> = match playback_mode.as_str() {
        "remote" => {
            let playback = Arc::new(RemotePlayback::new(clients.clone()));
            remote = Some(Arc::clone(&playback));
            playback
        }
        "none" => Arc::new(NullPlayback),
        _ => {
            let synth: Arc<dyn TtsSynth> = match OpenAiSynth::from_env() {
                Ok(synth) => Arc::new(synth),
                Err(err) => {
                    tracing::warn!(error = %err, "no TTS configured, speech will be silent");
                    Arc::new(NullSynth)
                }
            };
            match RodioPlayback::new(synth, Some(clients.clone())) {
                Ok(playback) => Arc::new(playback),
                Err(err) => {
                    tracing::warn!(error = %err, "no audio device, running muted");
                    Arc::new(NullPlayback)
                }
            }
        }
    };
    let arbiter = Arc::new(TurnArbiter::new(backend));

    // Raw speech transcripts enter here; the forwarder cleans them and drops
    // anything heard while the kiosk itself is speaking.
    let (transcripts_tx, transcripts_rx) = mpsc::unbounded_channel();
    spawn_transcript_forwarder(transcripts_rx, actions_tx.clone(), Arc::clone(&arbiter));
    spawn_stdin_reader(transcripts_tx, reset.clone());

    let oracle: Arc<dyn NluOracle> = match OpenRouterOracle::from_env() {
        Some(oracle) => Arc::new(oracle),
        None => {
            tracing::warn!("OPENROUTER_API_KEY not set, keyword-only understanding");
            Arc::new(LocalOracle)
        }
    };

    let gateway = Arc::new(ClientGateway::new(
        clients,
        actions_tx,
        reset.clone(),
        remote,
    ));
    let printer = std::env::var("VITAPOD_PRINTER")
        .ok()
        .map(|device| Arc::new(ReceiptPrinter::new(device)));

    let services = Services {
        reset,
        arbiter,
        sink: Arc::clone(&gateway) as Arc<dyn SnapshotSink>,
        oracle,
        config: SessionConfig::default(),
    };
    let controller = SessionController::new(
        services,
        actions,
        ReadingCoordinator::new(Arc::new(SimulatedDevices::new())),
        printer,
    );

    let app = http::router(gateway);
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .unwrap_or_else(|e| panic!("cannot bind {}: {}", bind, e));
    tracing::info!(%bind, "gateway listening");
    tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, app).await {
            tracing::error!(error = %err, "server stopped");
        }
    });

    controller.run().await;
}

/// Bench input: every stdin line is treated as a speech transcript so it runs
/// through the same cleaning and turn suppression as the real front end.
/// Typing `reset` raises the reset signal directly.
fn spawn_stdin_reader(transcripts: mpsc::UnboundedSender<String>, reset: ResetSignal) {
    tokio::spawn(async move {
        let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if line.trim().eq_ignore_ascii_case("reset") {
                reset.set();
                continue;
            }
            if transcripts.send(line).is_err() {
                break;
            }
        }
    });
}
