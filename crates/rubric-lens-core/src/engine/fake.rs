//! In-memory engine for tests and offline runs.
//!
//! `ScriptedEngine` replays a queue of canned outcomes in order and records
//! every request it receives.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use super::request::EvaluationRequest;
use super::{EngineError, EvaluationEngine, RawReply};

/// Engine that answers from a script instead of the network.
#[derive(Debug, Default)]
pub struct ScriptedEngine {
    script: Mutex<VecDeque<Result<RawReply, EngineError>>>,
    requests: Mutex<Vec<EvaluationRequest>>,
    calls: AtomicU32,
    delay: Option<Duration>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine whose single scripted outcome is `reply`.
    pub fn replying(reply: impl Into<String>) -> Self {
        Self::new().then_reply(reply)
    }

    /// Engine whose single scripted outcome is `err`.
    pub fn failing(err: EngineError) -> Self {
        Self::new().then_fail(err)
    }

    pub fn then_reply(self, reply: impl Into<String>) -> Self {
        lock(&self.script).push_back(Ok(RawReply::new(reply)));
        self
    }

    pub fn then_fail(self, err: EngineError) -> Self {
        lock(&self.script).push_back(Err(err));
        self
    }

    /// Sleep before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of `submit` calls so far.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every request received, in order.
    pub fn requests(&self) -> Vec<EvaluationRequest> {
        lock(&self.requests).clone()
    }

    /// Outcomes not yet consumed.
    pub fn remaining(&self) -> usize {
        lock(&self.script).len()
    }
}

#[async_trait]
impl EvaluationEngine for ScriptedEngine {
    async fn submit(&self, request: &EvaluationRequest) -> Result<RawReply, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.requests).push(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        lock(&self.script).pop_front().unwrap_or_else(|| {
            Err(EngineError::NotConfigured(
                "scripted engine has no outcomes left".to_string(),
            ))
        })
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
