//! Gateway HTTP server: provider webhooks (`/inbound`, `/status`) and a health probe.

use crate::auth::SignatureVerifier;
use crate::channels::{self, OutboundSender, StatusUpdate};
use crate::config::{Config, SignatureMode};
use crate::gateway::relay::Relay;
use crate::llm::GeminiClient;
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Shared state for the gateway: relay services, validator, optional in-flight limit.
#[derive(Clone)]
pub struct GatewayState {
    pub port: u16,
    pub relay: Arc<Relay>,
    pub verifier: Arc<SignatureVerifier>,
    /// When Some, each webhook request holds a permit while it is processed.
    pub in_flight: Option<Arc<Semaphore>>,
}

impl GatewayState {
    pub fn new(port: u16, relay: Relay, verifier: SignatureVerifier) -> Self {
        Self {
            port,
            relay: Arc::new(relay),
            verifier: Arc::new(verifier),
            in_flight: None,
        }
    }

    /// Limit concurrently processed webhook requests; excess requests wait for a slot.
    pub fn with_max_in_flight(mut self, max: usize) -> Self {
        self.in_flight = Some(Arc::new(Semaphore::new(max.max(1))));
        self
    }

    /// Build services from config: Gemini client, configured transport, signature verifier.
    pub fn from_config(config: &Config) -> Result<Self> {
        let signature = &config.messaging.signature;
        if signature.mode != SignatureMode::None
            && signature
                .secret
                .as_deref()
                .map_or(true, |s| s.trim().is_empty())
        {
            anyhow::bail!(
                "refusing to start with signature mode {:?} and no signature secret (set messaging.signature.secret or VONAGE_API_SIGNATURE_SECRET, or mode \"none\")",
                signature.mode
            );
        }
        let llm = GeminiClient::from_config(&config.llm)?;
        log::info!("using model {}", llm.model());
        let transport = channels::transport_from_config(&config.messaging)?;
        log::info!("outbound transport: {}", transport.name());
        let relay = Relay::new(Arc::new(llm), OutboundSender::new(transport));
        let verifier = SignatureVerifier::new(signature.mode, signature.secret.clone());
        let state = Self::new(config.gateway.port, relay, verifier);
        Ok(match config.gateway.max_in_flight {
            Some(max) => state.with_max_in_flight(max),
            None => state,
        })
    }

    async fn acquire(&self) -> Option<OwnedSemaphorePermit> {
        match &self.in_flight {
            Some(sem) => sem.clone().acquire_owned().await.ok(),
            None => None,
        }
    }
}

/// Router with all gateway routes.
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/", get(health_http))
        .route("/inbound", post(inbound_webhook))
        .route("/status", post(status_webhook))
        .with_state(state)
}

/// Run the gateway server; binds to config.gateway.bind:config.gateway.port.
/// Blocks until shutdown (Ctrl+C or SIGTERM).
pub async fn run_gateway(config: Config) -> Result<()> {
    let state = GatewayState::from_config(&config)?;
    let app = router(state);

    let bind_addr = format!("{}:{}", config.gateway.bind.trim(), config.gateway.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("server is listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("gateway server exited")?;
    log::info!("gateway stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                log::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, draining connections");
}

/// POST /inbound — provider callback for a user message. Replies via the model; 200 on success,
/// 500 (after an apology reply) on failure.
async fn inbound_webhook(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let _permit = state.acquire().await;
    let authorized = state.verifier.verify(&headers, &body);
    if authorized.is_err() && state.verifier.rejects_unauthorized() {
        return StatusCode::UNAUTHORIZED;
    }
    let payload: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            log::warn!("inbound: body is not JSON: {}", e);
            return StatusCode::BAD_REQUEST;
        }
    };
    let sender = channels::sender_of(&payload);
    let text = channels::text_of(&payload);
    log::info!(
        "received message from {}: {}",
        sender.as_deref().unwrap_or("<unknown>"),
        text.as_deref().unwrap_or("<no text>")
    );
    let Some(sender) = sender else {
        log::error!("inbound: no sender address in body, cannot reply");
        return StatusCode::INTERNAL_SERVER_ERROR;
    };
    state.relay.handle(&sender, text, authorized).await
}

/// POST /status — delivery-status callback. Logged and acknowledged.
async fn status_webhook(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let _permit = state.acquire().await;
    if state.verifier.verify(&headers, &body).is_err() && state.verifier.rejects_unauthorized() {
        return StatusCode::UNAUTHORIZED;
    }
    match serde_json::from_slice::<serde_json::Value>(&body) {
        Ok(payload) => {
            log::debug!("status body: {}", payload);
            if let Some(update) = StatusUpdate::from_json(&payload) {
                log::info!(
                    "status update: message {} to {} is {} at {}",
                    update.message_uuid.as_deref().unwrap_or("<unknown>"),
                    update.recipient().as_deref().unwrap_or("<unknown>"),
                    update.status.as_deref().unwrap_or("<unknown>"),
                    update.timestamp.as_deref().unwrap_or("<unknown>")
                );
            }
        }
        Err(e) => log::warn!("status: body is not JSON: {}", e),
    }
    log::info!("received status update");
    StatusCode::OK
}

/// GET / returns a simple health JSON (for probes).
async fn health_http(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    Json(json!({
        "runtime": "running",
        "port": state.port,
        "transport": state.relay.outbound().transport_name(),
    }))
}
