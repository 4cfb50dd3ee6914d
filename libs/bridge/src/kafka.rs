use std::sync::Arc;
use std::time::Duration;

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::error::KafkaResult;
use rdkafka::message::Message;
use rdkafka::metadata::Metadata;
use rdkafka::producer::{DeliveryFuture, FutureProducer, FutureRecord, Producer};
use tokio_util::sync::CancellationToken;

use fms_api::{Inbound, MessageSink, MessageSource, Polled, RetryError, RetryPolicy, State};

use crate::BridgeError;

pub const DEFAULT_BROKERS: &str = "redpanda:9092";
pub const DEFAULT_TOPIC: &str = "fms-data-stream";
pub const DEFAULT_GROUP: &str = "fms-display-group";

/// Ожидание ответа metadata на одну попытку подключения. Меньше
/// `DEFAULT_RETRY_DELAY`, чтобы шаг повторов задавала политика.
pub const DEFAULT_METADATA_TIMEOUT: Duration = Duration::from_secs(1);

const CLOSE_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct KafkaSettings {
    /// `bootstrap.servers`, через запятую.
    pub brokers: String,
    pub topic: String,
    /// Таймаут запроса metadata при проверке доступности брокера.
    pub metadata_timeout: Duration,
}

impl KafkaSettings {
    fn endpoint(&self) -> String {
        format!("kafka broker {}", self.brokers)
    }
}

// ═══════════════════════════════════════════════════════════════
//  Broker availability probe
// ═══════════════════════════════════════════════════════════════

/// (brokers, partitions) из ответа metadata.
fn summarize(metadata: &Metadata) -> (usize, usize) {
    let partitions = metadata
        .topics()
        .first()
        .map(|t| t.partitions().len())
        .unwrap_or(0);
    (metadata.brokers().len(), partitions)
}

/// Создание клиента librdkafka не открывает соединение, поэтому
/// доступность брокера проверяется запросом metadata. Запрос блокирующий —
/// выполняется в blocking pool.
async fn await_broker<F>(
    endpoint: &str,
    topic: &str,
    retry: &RetryPolicy,
    token: &CancellationToken,
    probe: F,
) -> Result<(), BridgeError>
where
    F: Fn() -> KafkaResult<(usize, usize)> + Clone + Send + 'static,
{
    let mut attempts = retry.start(token);
    tracing::info!(state = %State::Connecting, endpoint, "kafka connecting");

    loop {
        attempts.begin();
        let result = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(RetryError::Cancelled.into()),
            result = tokio::task::spawn_blocking(probe.clone()) => result?,
        };
        match result {
            Ok((brokers, partitions)) => {
                tracing::info!(
                    state = %State::Connected,
                    endpoint,
                    topic,
                    brokers,
                    partitions,
                    "kafka connected"
                );
                return Ok(());
            }
            Err(e) => attempts.failed(endpoint, &e).await?,
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Sink (relay → Kafka)
// ═══════════════════════════════════════════════════════════════

/// Kafka producer для пересылки. Отправка асинхронная, результат доставки
/// логируется отдельной задачей.
pub struct KafkaSink {
    producer: FutureProducer,
    topic: String,
}

impl KafkaSink {
    pub async fn connect(
        settings: &KafkaSettings,
        retry: &RetryPolicy,
        token: &CancellationToken,
    ) -> Result<Self, BridgeError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &settings.brokers)
            .set("message.timeout.ms", "30000")
            .create()?;

        let probe_producer = producer.clone();
        let probe_topic = settings.topic.clone();
        let metadata_timeout = settings.metadata_timeout;
        await_broker(&settings.endpoint(), &settings.topic, retry, token, move || {
            probe_producer
                .client()
                .fetch_metadata(Some(probe_topic.as_str()), metadata_timeout)
                .map(|metadata| summarize(&metadata))
        })
        .await?;

        Ok(Self {
            producer,
            topic: settings.topic.clone(),
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Дослать всё, что осталось в очереди (ограничено по времени).
    pub fn close(&self) {
        let pending = self.producer.in_flight_count();
        match self.producer.flush(CLOSE_FLUSH_TIMEOUT) {
            Ok(()) => tracing::info!(pending, "kafka producer flushed"),
            Err(e) => tracing::warn!(pending, error = %e, "kafka producer flush incomplete"),
        }
    }
}

impl MessageSink for KafkaSink {
    type Error = BridgeError;

    fn send(&self, payload: &[u8]) -> Result<(), BridgeError> {
        let record: FutureRecord<'_, (), [u8]> = FutureRecord::to(&self.topic).payload(payload);
        match self.producer.send_result(record) {
            Ok(delivery) => {
                tokio::spawn(report_delivery(delivery, self.topic.clone()));
                Ok(())
            }
            Err((e, _record)) => Err(e.into()),
        }
    }

    fn flush(&self, timeout: Duration) -> Result<(), BridgeError> {
        self.producer.flush(timeout)?;
        Ok(())
    }
}

async fn report_delivery(delivery: DeliveryFuture, topic: String) {
    match delivery.await {
        Ok(Ok(_)) => tracing::trace!(%topic, "delivered"),
        Ok(Err((e, _message))) => tracing::warn!(%topic, error = %e, "kafka delivery failed"),
        Err(_) => tracing::warn!(%topic, "kafka delivery cancelled"),
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tail source (Kafka → stdout)
// ═══════════════════════════════════════════════════════════════

/// Потребитель в составе consumer group: `earliest` + auto commit.
pub struct KafkaTailSource {
    consumer: Arc<StreamConsumer>,
    topic: String,
}

impl KafkaTailSource {
    pub async fn connect(
        settings: &KafkaSettings,
        group_id: &str,
        retry: &RetryPolicy,
        token: &CancellationToken,
    ) -> Result<Self, BridgeError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &settings.brokers)
            .set("group.id", group_id)
            .set("auto.offset.reset", "earliest")
            .set("enable.auto.commit", "true")
            .create()?;
        let consumer = Arc::new(consumer);

        let probe_consumer = consumer.clone();
        let probe_topic = settings.topic.clone();
        let metadata_timeout = settings.metadata_timeout;
        await_broker(&settings.endpoint(), &settings.topic, retry, token, move || {
            probe_consumer
                .client()
                .fetch_metadata(Some(probe_topic.as_str()), metadata_timeout)
                .map(|metadata| summarize(&metadata))
        })
        .await?;

        consumer.subscribe(&[settings.topic.as_str()])?;
        tracing::info!(topic = %settings.topic, group = group_id, "kafka subscribed");

        Ok(Self {
            consumer,
            topic: settings.topic.clone(),
        })
    }

    pub fn close(self) {
        self.consumer.unsubscribe();
        tracing::info!(topic = %self.topic, "kafka consumer closed");
    }
}

impl MessageSource for KafkaTailSource {
    type Error = BridgeError;

    async fn poll(&mut self, timeout: Duration) -> Polled<BridgeError> {
        match tokio::time::timeout(timeout, self.consumer.recv()).await {
            Err(_) => Polled::Idle,
            Ok(Err(e)) => Polled::Error(e.into()),
            Ok(Ok(message)) => {
                let mut inbound =
                    Inbound::new(message.topic(), message.payload().unwrap_or_default());
                inbound.offset = Some(message.offset());
                Polled::Message(inbound)
            }
        }
    }
}
