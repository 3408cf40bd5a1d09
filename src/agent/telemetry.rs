//! Telemetry broadcast: one JSON status object per cycle, pushed to every
//! connected WebSocket client.
//!
//! # Architecture
//!
//! ```text
//! ControlLoop ──► broadcast::Sender ──► TelemetryState ──► WebSocket clients
//!      ▲                                                        │
//!      └──────────── mpsc (TelemetryCommand) ◄──────────────────┘
//! ```
//!
//! Clients subscribe at connect time and receive the next cycle onward;
//! there is no replay. Inbound client messages are parsed as
//! [`TelemetryCommand`]s and forwarded to the control loop; the only
//! operational command is an operator-initiated intervention rollback.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::agent::learning::{InterventionRecord, SafetyMetrics};

/// Telemetry server configuration.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub enabled: bool,
    pub bind: String,
    pub port: u16,
    pub broadcast_capacity: usize,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind: "127.0.0.1".to_string(),
            port: 8765,
            broadcast_capacity: 64,
        }
    }
}

/// Per-cycle status pushed to dashboard clients.
#[derive(Debug, Clone, Serialize)]
pub struct CycleStatus {
    /// Epoch seconds.
    pub timestamp: u64,
    pub thinking_log: Vec<String>,
    pub total_volume: u64,
    /// Percent of recent transactions that failed.
    pub fail_rate: f64,
    pub active_gateway: String,
    /// Recent per-cycle global success rates, percent.
    pub success_series: Vec<f64>,
    /// Recent per-cycle mean latencies, milliseconds.
    pub latency_series: Vec<f64>,
    pub nrv: f64,
    /// Best hypothesis confidence, percent.
    pub confidence: f64,
    pub intervention_history: Vec<InterventionRecord>,
    pub safety_metrics: SafetyMetrics,
}

/// Client-to-server commands.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TelemetryCommand {
    /// Operator-initiated rollback of an active intervention.
    RollbackIntervention { id: u64 },
    /// Keepalive; handled at the socket, never forwarded.
    Ping { id: u64 },
}

/// Shared state behind the WebSocket route.
pub struct TelemetryState {
    tx: broadcast::Sender<String>,
    command_tx: mpsc::UnboundedSender<TelemetryCommand>,
    client_count: AtomicUsize,
    next_client_id: AtomicUsize,
}

impl TelemetryState {
    /// Create the state and the command receiver the control loop drains.
    pub fn new(capacity: usize) -> (Self, mpsc::UnboundedReceiver<TelemetryCommand>) {
        let (tx, _) = broadcast::channel(capacity);
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                command_tx,
                client_count: AtomicUsize::new(0),
                next_client_id: AtomicUsize::new(1),
            },
            command_rx,
        )
    }

    /// Serialize and push a status to all connected clients. Send errors
    /// (no receivers) are fine.
    pub fn publish(&self, status: &CycleStatus) {
        match serde_json::to_string(status) {
            Ok(json) => {
                let _ = self.tx.send(json);
            }
            Err(e) => warn!(
                target: crate::log_targets::TELEMETRY,
                error = %e,
                "Status serialization failed"
            ),
        }
    }

    pub fn client_count(&self) -> usize {
        self.client_count.load(Ordering::Relaxed)
    }
}

/// Spawn the telemetry server on its own task. Returns immediately; bind
/// failures are logged, never fatal.
pub fn spawn_server(state: Arc<TelemetryState>, config: &TelemetryConfig) {
    if !config.enabled {
        return;
    }
    let addr: SocketAddr = match format!("{}:{}", config.bind, config.port).parse() {
        Ok(addr) => addr,
        Err(e) => {
            warn!(
                target: crate::log_targets::TELEMETRY,
                error = %e,
                "Invalid telemetry bind address"
            );
            return;
        }
    };

    tokio::spawn(async move {
        let app = Router::new()
            .route("/ws", get(ws_handler))
            .with_state(state);
        match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => {
                info!(
                    target: crate::log_targets::TELEMETRY,
                    %addr,
                    "Telemetry WebSocket listening"
                );
                if let Err(e) = axum::serve(listener, app).await {
                    warn!(
                        target: crate::log_targets::TELEMETRY,
                        error = %e,
                        "Telemetry server stopped"
                    );
                }
            }
            Err(e) => warn!(
                target: crate::log_targets::TELEMETRY,
                error = %e,
                %addr,
                "Telemetry bind failed"
            ),
        }
    });
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<TelemetryState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| client_loop(socket, state))
}

async fn client_loop(socket: WebSocket, state: Arc<TelemetryState>) {
    let client_id = state.next_client_id.fetch_add(1, Ordering::Relaxed);
    state.client_count.fetch_add(1, Ordering::Relaxed);
    info!(
        target: crate::log_targets::TELEMETRY,
        client_id,
        "Dashboard client connected"
    );

    let mut rx = state.tx.subscribe();
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            status = rx.recv() => {
                match status {
                    Ok(json) => {
                        if sender.send(Message::Text(json)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        // Slow client: skip missed cycles, keep streaming.
                        debug!(
                            target: crate::log_targets::TELEMETRY,
                            client_id,
                            skipped,
                            "Client lagged"
                        );
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<TelemetryCommand>(&text) {
                            Ok(TelemetryCommand::Ping { .. }) => {}
                            Ok(command) => {
                                info!(
                                    target: crate::log_targets::TELEMETRY,
                                    client_id,
                                    ?command,
                                    "Operator command received"
                                );
                                let _ = state.command_tx.send(command);
                            }
                            Err(e) => debug!(
                                target: crate::log_targets::TELEMETRY,
                                client_id,
                                error = %e,
                                "Unrecognized client message"
                            ),
                        }
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    state.client_count.fetch_sub(1, Ordering::Relaxed);
    info!(
        target: crate::log_targets::TELEMETRY,
        client_id,
        "Dashboard client disconnected"
    );
}
