//! Shared helpers for gateway integration tests: recording stubs and a server on a free port.

#![allow(dead_code)]

use async_trait::async_trait;
use jsonwebtoken::{EncodingKey, Header};
use lib::auth::SignatureVerifier;
use lib::channels::{MessageTransport, OutboundReply, OutboundSender, SendError, SendReceipt};
use lib::config::SignatureMode;
use lib::gateway::{self, GatewayState, Relay};
use lib::llm::{LlmError, ReplyGenerator};
use std::sync::{Arc, Mutex};

pub const SECRET: &str = "signature-secret";

/// Model stub: answers with a fixed reply, or fails when `reply` is None. Records every prompt.
#[derive(Default)]
pub struct StubLlm {
    pub reply: Option<String>,
    pub prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl ReplyGenerator for StubLlm {
    async fn reply(&self, text: &str) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(text.to_string());
        self.reply.clone().ok_or(LlmError::Query)
    }
}

/// Transport stub: records every send, optionally failing each one.
#[derive(Default)]
pub struct RecordingTransport {
    pub fail: bool,
    pub sent: Mutex<Vec<OutboundReply>>,
}

impl RecordingTransport {
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|r| (r.text.clone(), r.recipient.clone()))
            .collect()
    }
}

#[async_trait]
impl MessageTransport for RecordingTransport {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send(&self, reply: &OutboundReply) -> Result<SendReceipt, SendError> {
        self.sent.lock().unwrap().push(reply.clone());
        if self.fail {
            Err(SendError::Api("500 Internal Server Error".to_string()))
        } else {
            Ok(SendReceipt {
                message_uuid: Some(uuid::Uuid::new_v4().to_string()),
            })
        }
    }
}

pub struct TestGateway {
    pub base_url: String,
    pub port: u16,
    pub llm: Arc<StubLlm>,
    pub transport: Arc<RecordingTransport>,
    pub client: reqwest::Client,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Serve the gateway router on 127.0.0.1 with the given stubs and signature mode.
/// The server task is left running when the test ends.
pub async fn spawn_gateway(
    llm_reply: Option<&str>,
    fail_send: bool,
    mode: SignatureMode,
) -> TestGateway {
    let llm = Arc::new(StubLlm {
        reply: llm_reply.map(str::to_string),
        ..Default::default()
    });
    let transport = Arc::new(RecordingTransport {
        fail: fail_send,
        ..Default::default()
    });
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind free port");
    let port = listener.local_addr().expect("local_addr").port();
    let relay = Relay::new(llm.clone(), OutboundSender::new(transport.clone()));
    let state = GatewayState::new(
        port,
        relay,
        SignatureVerifier::new(mode, Some(SECRET.to_string())),
    );
    tokio::spawn(async move {
        let _ = axum::serve(listener, gateway::router(state)).await;
    });
    TestGateway {
        base_url: format!("http://127.0.0.1:{}", port),
        port,
        llm,
        transport,
        client: reqwest::Client::new(),
    }
}

/// Bearer token signed with the shared test secret.
pub fn signed_token() -> String {
    jsonwebtoken::encode(
        &Header::default(),
        &serde_json::json!({ "iat": 1_700_000_000, "jti": "test" }),
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .expect("sign token")
}
