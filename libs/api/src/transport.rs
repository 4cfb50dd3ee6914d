use std::time::Duration;

// ═══════════════════════════════════════════════════════════════
//  Inbound message
// ═══════════════════════════════════════════════════════════════

/// Сообщение, полученное от брокера. Payload не интерпретируется.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    pub topic: String,
    pub payload: Vec<u8>,
    /// Offset в партиции (только для Kafka).
    pub offset: Option<i64>,
}

impl Inbound {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            offset: None,
        }
    }
}

/// Результат одного опроса источника.
#[derive(Debug)]
pub enum Polled<E> {
    Message(Inbound),
    /// Таймаут без сообщений.
    Idle,
    /// Ошибка, о которой сообщил брокер. Источник остаётся рабочим.
    Error(E),
    /// Источник закрыт (соединение потеряно), сообщений больше не будет.
    Closed,
}

// ═══════════════════════════════════════════════════════════════
//  Seams
// ═══════════════════════════════════════════════════════════════

/// Источник входящих сообщений с явным опросом (вместо callback).
///
/// `poll` должен быть cancel-safe: цикл может бросить future по сигналу
/// остановки.
#[allow(async_fn_in_trait)]
pub trait MessageSource {
    type Error: std::error::Error;

    async fn poll(&mut self, timeout: Duration) -> Polled<Self::Error>;
}

/// Приёмник для пересылки: неблокирующая постановка в очередь + короткий flush.
pub trait MessageSink {
    type Error: std::error::Error;

    /// Поставить payload в очередь отправки, не дожидаясь подтверждения.
    fn send(&self, payload: &[u8]) -> Result<(), Self::Error>;

    /// Протолкнуть буфер в сеть, ждать не дольше `timeout`.
    fn flush(&self, timeout: Duration) -> Result<(), Self::Error>;
}

/// Fire-and-forget публикация в pub/sub topic.
#[allow(async_fn_in_trait)]
pub trait Publisher {
    type Error: std::error::Error;

    async fn publish(&self, payload: Vec<u8>) -> Result<(), Self::Error>;
}
