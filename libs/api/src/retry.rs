use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

// ═══════════════════════════════════════════════════════════════
//  Retry policy
// ═══════════════════════════════════════════════════════════════

pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Повтор подключения с фиксированной задержкой, без backoff.
/// `max_retries = None` — бесконечно.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub delay: Duration,
    pub max_retries: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delay: DEFAULT_RETRY_DELAY,
            max_retries: None,
        }
    }
}

impl RetryPolicy {
    pub fn unbounded(delay: Duration) -> Self {
        Self { delay, max_retries: None }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Начать серию попыток. Отмена токена прерывает ожидание.
    pub fn start(&self, token: &CancellationToken) -> Retry {
        Retry {
            policy: *self,
            failures: 0,
            token: token.clone(),
            attempt_started: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RetryError {
    #[error("{endpoint}: gave up after {failures} failed attempts: {last}")]
    Exhausted {
        endpoint: String,
        failures: u32,
        last: String,
    },

    #[error("interrupted while connecting")]
    Cancelled,
}

/// Состояние одной серии попыток.
///
/// Если начало попытки отмечено через `begin`, пауза отсчитывается от него:
/// попытки стартуют с шагом `delay`, сколько бы ни длилась сама попытка
/// (пока она короче `delay`).
///
/// ```ignore
/// let mut retry = policy.start(&token);
/// loop {
///     retry.begin();
///     match connect().await {
///         Ok(conn) => break conn,
///         Err(e) => retry.failed("mqtt broker", &e).await?,
///     }
/// }
/// ```
pub struct Retry {
    policy: RetryPolicy,
    failures: u32,
    token: CancellationToken,
    attempt_started: Option<Instant>,
}

impl Retry {
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Отметить начало очередной попытки.
    pub fn begin(&mut self) {
        self.attempt_started = Some(Instant::now());
    }

    /// Остаток паузы до следующей попытки.
    fn pause(&self) -> Duration {
        match self.attempt_started {
            Some(started) => self.policy.delay.saturating_sub(started.elapsed()),
            None => self.policy.delay,
        }
    }

    /// Зафиксировать неудачу: лог + пауза `delay`. Ошибка — если бюджет
    /// исчерпан или пришёл сигнал остановки.
    pub async fn failed(
        &mut self,
        endpoint: &str,
        err: &(dyn std::fmt::Display + Sync),
    ) -> Result<(), RetryError> {
        self.failures += 1;
        if let Some(max) = self.policy.max_retries {
            if self.failures > max {
                return Err(RetryError::Exhausted {
                    endpoint: endpoint.to_string(),
                    failures: self.failures,
                    last: err.to_string(),
                });
            }
        }

        let pause = self.pause();
        tracing::warn!(
            endpoint,
            attempt = self.failures,
            delay_ms = pause.as_millis() as u64,
            error = %err,
            "{endpoint} not available, retrying"
        );

        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(RetryError::Cancelled),
            _ = tokio::time::sleep(pause) => Ok(()),
        }
    }
}
