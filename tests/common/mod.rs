#![allow(dead_code)]

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value;

use copilot_panel::{
    domain::{
        models::VersionScope,
        traits::{Gateway, Reloader},
        value_objects::TaskId,
    },
    dto::{progress::ProgressEnvelope, version::VersionEnvelope, ApiEnvelope},
    error::AppError,
};

#[derive(Clone, Debug)]
pub enum Reply {
    Json(String),
    Transport(&'static str),
}

pub fn json(body: &str) -> Reply {
    Reply::Json(body.to_string())
}

impl Reply {
    fn into_result<T: DeserializeOwned>(self) -> Result<T, AppError> {
        match self {
            Reply::Json(body) => Ok(serde_json::from_str(&body).expect("fixture is valid json")),
            Reply::Transport(message) => Err(AppError::Transport(message.to_string())),
        }
    }
}

/// Replies in order; the last one repeats forever.
#[derive(Default)]
pub struct Script {
    replies: Mutex<VecDeque<Reply>>,
    calls: AtomicUsize,
}

impl Script {
    pub fn set(&self, replies: Vec<Reply>) {
        *self.replies.lock() = replies.into();
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next(&self) -> Reply {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut replies = self.replies.lock();
        if replies.len() > 1 {
            replies.pop_front().expect("non-empty script")
        } else {
            replies.front().cloned().expect("script has a reply")
        }
    }
}

#[derive(Default)]
pub struct FakeGateway {
    pub progress: Script,
    pub local: Script,
    pub remote: Script,
    pub update: Script,
    delay: Mutex<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Simulated network latency for every call.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn round_trip(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Gateway for FakeGateway {
    async fn get_progress(&self, _task_id: &TaskId) -> Result<ProgressEnvelope, AppError> {
        let reply = self.progress.next();
        self.round_trip().await;
        reply.into_result()
    }

    async fn get_version(&self, scope: VersionScope) -> Result<VersionEnvelope, AppError> {
        let reply = match scope {
            VersionScope::Remote => self.remote.next(),
            _ => self.local.next(),
        };
        self.round_trip().await;
        reply.into_result()
    }

    async fn trigger_update(&self) -> Result<ApiEnvelope<Value>, AppError> {
        let reply = self.update.next();
        self.round_trip().await;
        reply.into_result()
    }
}

#[derive(Default)]
pub struct CountingReloader {
    reloads: AtomicUsize,
}

impl CountingReloader {
    pub fn count(&self) -> usize {
        self.reloads.load(Ordering::SeqCst)
    }
}

impl Reloader for CountingReloader {
    fn reload(&self) {
        self.reloads.fetch_add(1, Ordering::SeqCst);
    }
}

/// Lets spawned tasks run without moving the paused clock.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

/// Advances the paused clock and lets woken tasks run.
pub async fn advance(ms: u64) {
    tokio::time::advance(Duration::from_millis(ms)).await;
    settle().await;
}
