//! Scriptable [`BackendClient`] double for resolver and workflow tests.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::api::BackendClient;
use crate::error::{Error, Result};

struct Scripted {
    matcher: String,
    delay: Option<Duration>,
    reply: Result<Value>,
}

/// Records every request as a "METHOD path[?query] [body]" descriptor and
/// answers from a script of (substring matcher, reply) entries. Each entry
/// is consumed by the first request whose descriptor contains its matcher;
/// unscripted requests fail with a transport error.
#[derive(Default)]
pub struct MockBackend {
    script: Mutex<Vec<Scripted>>,
    calls: Mutex<Vec<String>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(self, matcher: &str, reply: Result<Value>) -> Self {
        self.script.lock().unwrap().push(Scripted {
            matcher: matcher.to_string(),
            delay: None,
            reply,
        });
        self
    }

    /// Like [`MockBackend::on`], but the reply is delivered after a delay,
    /// for completion-order scenarios.
    pub fn on_delayed(self, matcher: &str, delay_ms: u64, reply: Result<Value>) -> Self {
        self.script.lock().unwrap().push(Scripted {
            matcher: matcher.to_string(),
            delay: Some(Duration::from_millis(delay_ms)),
            reply,
        });
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    async fn dispatch(&self, descriptor: String) -> Result<Value> {
        self.calls.lock().unwrap().push(descriptor.clone());

        let entry = {
            let mut script = self.script.lock().unwrap();
            script
                .iter()
                .position(|s| descriptor.contains(&s.matcher))
                .map(|i| script.remove(i))
        };

        let entry = entry.ok_or_else(|| Error::Transport {
            url: descriptor.clone(),
            message: "no scripted reply for request".to_string(),
        })?;

        if let Some(delay) = entry.delay {
            tokio::time::sleep(delay).await;
        }
        entry.reply
    }
}

fn describe_query(query: &[(&str, &str)]) -> String {
    if query.is_empty() {
        return String::new();
    }
    let pairs: Vec<String> = query.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
    format!("?{}", pairs.join("&"))
}

#[async_trait]
impl BackendClient for MockBackend {
    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<Value> {
        self.dispatch(format!("GET {}{}", path, describe_query(query)))
            .await
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value> {
        self.dispatch(format!("POST {} {}", path, body)).await
    }

    async fn patch(&self, path: &str, body: Value) -> Result<Value> {
        self.dispatch(format!("PATCH {} {}", path, body)).await
    }
}
