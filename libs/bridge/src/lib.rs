//! Клиенты брокеров (MQTT, Kafka) и три рабочих цикла: генерация,
//! пересылка MQTT → Kafka и чтение Kafka-топика.

pub mod error;
pub mod kafka;
pub mod mqtt;
pub mod producer;
pub mod relay;
pub mod signal;
pub mod tail;

#[cfg(test)]
mod testing;

pub use error::BridgeError;
pub use kafka::{KafkaSettings, KafkaSink, KafkaTailSource};
pub use mqtt::{MqttPublisher, MqttSettings, MqttSubscriber};
pub use producer::{ProducerSettings, run_producer};
pub use relay::{RelaySettings, RelayStats, run_relay};
pub use signal::cancel_on_interrupt;
pub use tail::{TailStats, run_tail};
