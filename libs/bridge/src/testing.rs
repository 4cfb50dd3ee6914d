//! In-memory подмены брокеров для тестов циклов.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use fms_api::{MessageSink, MessageSource, Polled, Publisher};

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct FakeError(pub String);

/// Отдаёт заранее заданную последовательность результатов опроса.
/// После исчерпания — `Idle` и, если задан токен, отмена.
pub struct ScriptedSource {
    script: VecDeque<Polled<FakeError>>,
    on_drained: Option<CancellationToken>,
}

impl ScriptedSource {
    pub fn new(script: Vec<Polled<FakeError>>) -> Self {
        Self {
            script: script.into(),
            on_drained: None,
        }
    }

    pub fn cancel_when_drained(mut self, token: &CancellationToken) -> Self {
        self.on_drained = Some(token.clone());
        self
    }
}

impl MessageSource for ScriptedSource {
    type Error = FakeError;

    async fn poll(&mut self, _timeout: Duration) -> Polled<FakeError> {
        match self.script.pop_front() {
            Some(polled) => polled,
            None => {
                if let Some(token) = &self.on_drained {
                    token.cancel();
                }
                tokio::task::yield_now().await;
                Polled::Idle
            }
        }
    }
}

#[derive(Default)]
pub struct FakeSink {
    sent: RefCell<Vec<String>>,
    flushes: Cell<usize>,
    fail_remaining: Cell<usize>,
    flush_error: bool,
}

impl FakeSink {
    pub fn failing_first(n: usize) -> Self {
        let sink = Self::default();
        sink.fail_remaining.set(n);
        sink
    }

    pub fn with_flush_error(mut self) -> Self {
        self.flush_error = true;
        self
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.borrow().clone()
    }

    pub fn flushes(&self) -> usize {
        self.flushes.get()
    }
}

impl MessageSink for FakeSink {
    type Error = FakeError;

    fn send(&self, payload: &[u8]) -> Result<(), FakeError> {
        let remaining = self.fail_remaining.get();
        if remaining > 0 {
            self.fail_remaining.set(remaining - 1);
            return Err(FakeError("queue full".into()));
        }
        self.sent
            .borrow_mut()
            .push(String::from_utf8(payload.to_vec()).unwrap());
        Ok(())
    }

    fn flush(&self, _timeout: Duration) -> Result<(), FakeError> {
        self.flushes.set(self.flushes.get() + 1);
        if self.flush_error {
            return Err(FakeError("operation timed out".into()));
        }
        Ok(())
    }
}

/// Запоминает (момент публикации, payload).
#[derive(Default)]
pub struct FakePublisher {
    sent: RefCell<Vec<(Instant, Vec<u8>)>>,
    fail_after: Option<usize>,
}

impl FakePublisher {
    pub fn failing_after(n: usize) -> Self {
        Self {
            sent: RefCell::default(),
            fail_after: Some(n),
        }
    }

    pub fn sent(&self) -> Vec<(Instant, Vec<u8>)> {
        self.sent.borrow().clone()
    }
}

impl Publisher for FakePublisher {
    type Error = std::io::Error;

    async fn publish(&self, payload: Vec<u8>) -> Result<(), std::io::Error> {
        if self.fail_after.is_some_and(|n| self.sent.borrow().len() >= n) {
            return Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "request channel closed",
            ));
        }
        self.sent.borrow_mut().push((Instant::now(), payload));
        Ok(())
    }
}
