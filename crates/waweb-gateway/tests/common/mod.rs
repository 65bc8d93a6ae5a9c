//! Shared fakes for the router tests: a scripted LLM provider and a
//! messenger that records instead of sending.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, Response};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use waweb_agent::prompt::PromptBuilder;
use waweb_agent::{AiClient, ChatRequest, ChatResponse, LlmProvider, ProviderError};
use waweb_core::config::WawebConfig;
use waweb_gateway::{build_router, AppState};
use waweb_twilio::{DeliveryReceipt, Messenger, TwilioError};

pub enum Script {
    Reply(&'static str),
    /// Reply after sleeping, like a slow model.
    Delayed(&'static str, Duration),
    Fail,
    NotConfigured,
}

pub struct FakeProvider {
    pub script: Script,
    pub calls: Arc<AtomicUsize>,
}

#[async_trait]
impl LlmProvider for FakeProvider {
    fn name(&self) -> &str {
        "fake"
    }

    fn is_configured(&self) -> bool {
        !matches!(self.script, Script::NotConfigured)
    }

    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.script {
            Script::Reply(text) => Ok(reply(text, req)),
            Script::Delayed(text, delay) => {
                tokio::time::sleep(delay).await;
                Ok(reply(text, req))
            }
            Script::Fail => Err(ProviderError::Api {
                status: 500,
                message: "internal".into(),
            }),
            Script::NotConfigured => Err(ProviderError::NotConfigured("no key".into())),
        }
    }
}

fn reply(text: &str, req: &ChatRequest) -> ChatResponse {
    ChatResponse {
        content: text.to_string(),
        model: req.model.clone(),
        tokens_in: 10,
        tokens_out: 5,
        stop_reason: "STOP".into(),
        tool_calls: Vec::new(),
    }
}

#[derive(Default)]
pub struct RecordingMessenger {
    pub sent: Mutex<Vec<(String, String)>>,
    pub fail: bool,
}

#[async_trait]
impl Messenger for RecordingMessenger {
    fn name(&self) -> &str {
        "recording"
    }

    fn is_configured(&self) -> bool {
        true
    }

    fn max_chars(&self) -> usize {
        1500
    }

    async fn send_text(&self, to: &str, body: &str) -> Result<DeliveryReceipt, TwilioError> {
        if self.fail {
            return Err(TwilioError::Configuration("test".into()));
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push((to.to_string(), body.to_string()));
        Ok(DeliveryReceipt {
            sid: format!("SM{}", sent.len()),
            status: "queued".into(),
        })
    }
}

pub struct Harness {
    pub router: Router,
    pub state: Arc<AppState>,
    pub calls: Arc<AtomicUsize>,
    pub messenger: Arc<RecordingMessenger>,
}

impl Harness {
    pub fn new(script: Script) -> Self {
        Self::with_config(script, WawebConfig::default())
    }

    pub fn with_config(script: Script, config: WawebConfig) -> Self {
        Self::build(script, config, RecordingMessenger::default())
    }

    pub fn build(script: Script, config: WawebConfig, messenger: RecordingMessenger) -> Self {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = FakeProvider {
            script,
            calls: Arc::clone(&calls),
        };
        let ai = AiClient::new(Box::new(provider), PromptBuilder::default(), "test-model".into())
            .with_github(None, config.agent.default_token.clone(), 0);
        let messenger = Arc::new(messenger);
        let state = Arc::new(AppState::new(config, ai, messenger.clone()));
        Self {
            router: build_router(Arc::clone(&state)),
            state,
            calls,
            messenger,
        }
    }

    pub fn provider_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.messenger.sent.lock().unwrap().clone()
    }

    pub async fn send(&self, req: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(req).await.unwrap()
    }
}

/// Poll `cond` until it holds; panics after a few seconds.
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(3);
    while !cond() {
        assert!(Instant::now() < deadline, "condition not met in time");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

pub fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn post_form(uri: &str, body: &str) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn body_string(resp: Response<Body>) -> String {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(resp: Response<Body>) -> Value {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).expect("json body")
}
