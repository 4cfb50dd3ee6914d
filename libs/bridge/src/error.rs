use fms_api::{CodecError, RetryError};

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("mqtt client: {0}")]
    MqttClient(#[from] rumqttc::ClientError),

    #[error("mqtt connection: {0}")]
    MqttConnection(#[from] rumqttc::ConnectionError),

    #[error("kafka: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    #[error("codec: {0}")]
    Codec(#[from] CodecError),

    #[error("{0}")]
    Retry(#[from] RetryError),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0} closed unexpectedly")]
    SourceClosed(&'static str),

    #[error("task join: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl BridgeError {
    /// Остановка по сигналу во время подключения — не ошибка.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, BridgeError::Retry(RetryError::Cancelled))
    }
}
