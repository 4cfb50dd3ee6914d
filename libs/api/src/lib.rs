//! Общие типы FMS-моста: запись телеметрии, JSON-кодек, политика
//! повторного подключения, жизненный цикл процессов и контракты
//! источников/приёмников сообщений.

pub mod codec;
pub mod config;
pub mod lifecycle;
pub mod record;
pub mod retry;
pub mod transport;

pub use codec::{CodecError, decode_json, decode_record, encode_json};
pub use config::{ConfigError, load_optional};
pub use lifecycle::State;
pub use record::{TelemetryGenerator, TelemetryRecord};
pub use retry::{Retry, RetryError, RetryPolicy};
pub use transport::{Inbound, MessageSink, MessageSource, Polled, Publisher};

/// Текущее Unix-время в секундах.
pub fn now_secs() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
