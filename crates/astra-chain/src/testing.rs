//! Scripted in-memory transport for unit tests.

use crate::client::Transport;
use crate::error::ChainError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tokio::sync::oneshot;

type Reply = Result<Value, ChainError>;

enum Scripted {
    Ready(Reply),
    Gated(oneshot::Receiver<Reply>),
}

#[derive(Default)]
struct MockState {
    queued: HashMap<String, VecDeque<Scripted>>,
    sticky: HashMap<String, Value>,
    calls: HashMap<String, usize>,
}

/// Replies are matched by exact URL. Queued replies are consumed in order;
/// once a queue is empty the sticky reply (if any) is served, otherwise 404.
#[derive(Default)]
pub(crate) struct MockTransport {
    state: Mutex<MockState>,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn push(&self, url: &str, scripted: Scripted) {
        self.state
            .lock()
            .unwrap()
            .queued
            .entry(url.to_string())
            .or_default()
            .push_back(scripted);
    }

    pub(crate) fn respond(&self, url: &str, body: Value) {
        self.push(url, Scripted::Ready(Ok(body)));
    }

    pub(crate) fn fail(&self, url: &str, error: ChainError) {
        self.push(url, Scripted::Ready(Err(error)));
    }

    /// Queue a reply that is held back until the returned sender fires.
    pub(crate) fn respond_gated(&self, url: &str) -> oneshot::Sender<Reply> {
        let (tx, rx) = oneshot::channel();
        self.push(url, Scripted::Gated(rx));
        tx
    }

    pub(crate) fn respond_always(&self, url: &str, body: Value) {
        self.state
            .lock()
            .unwrap()
            .sticky
            .insert(url.to_string(), body);
    }

    pub(crate) fn calls(&self, url: &str) -> usize {
        self.state.lock().unwrap().calls.get(url).copied().unwrap_or(0)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get_json(&self, url: &str) -> Result<Value, ChainError> {
        let scripted = {
            let mut state = self.state.lock().unwrap();
            *state.calls.entry(url.to_string()).or_default() += 1;
            match state.queued.get_mut(url).and_then(VecDeque::pop_front) {
                Some(scripted) => scripted,
                None => match state.sticky.get(url) {
                    Some(body) => Scripted::Ready(Ok(body.clone())),
                    None => Scripted::Ready(Err(ChainError::Status {
                        status: 404,
                        url: url.to_string(),
                    })),
                },
            }
        };

        match scripted {
            Scripted::Ready(reply) => reply,
            Scripted::Gated(rx) => rx
                .await
                .unwrap_or_else(|_| Err(ChainError::Transport("gate dropped".to_string()))),
        }
    }
}
