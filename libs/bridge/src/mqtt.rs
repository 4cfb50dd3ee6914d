use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use fms_api::{Inbound, MessageSource, Polled, Publisher, RetryPolicy, State};

use crate::BridgeError;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 1883;
pub const DEFAULT_TOPIC: &str = "fms/data";
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(60);

/// Ёмкость очереди запросов rumqttc (publish/subscribe/disconnect).
const REQUEST_CAPACITY: usize = 10;
/// Сколько ждать завершения event loop после DISCONNECT.
const DISCONNECT_GRACE: Duration = Duration::from_secs(1);

// ═══════════════════════════════════════════════════════════════
//  Settings
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct MqttSettings {
    pub host: String,
    pub port: u16,
    pub topic: String,
    pub client_id: String,
    pub keep_alive: Duration,
}

impl MqttSettings {
    fn options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(&self.client_id, &self.host, self.port);
        options.set_keep_alive(self.keep_alive);
        options
    }

    fn endpoint(&self) -> String {
        format!("mqtt broker {}:{}", self.host, self.port)
    }
}

/// Уникальный client id на процесс: брокер разрывает дубликаты.
pub fn client_id(prefix: &str) -> String {
    format!("{prefix}-{}", std::process::id())
}

// ═══════════════════════════════════════════════════════════════
//  Connect with retry
// ═══════════════════════════════════════════════════════════════

/// Крутить event loop до CONNACK. Каждая неудача — лог и пауза по политике;
/// следующий `poll()` сам переоткрывает соединение.
async fn connect(
    settings: &MqttSettings,
    retry: &RetryPolicy,
    token: &CancellationToken,
) -> Result<(AsyncClient, EventLoop), BridgeError> {
    let (client, mut eventloop) = AsyncClient::new(settings.options(), REQUEST_CAPACITY);
    let endpoint = settings.endpoint();
    let mut attempts = retry.start(token);

    tracing::info!(state = %State::Connecting, %endpoint, client_id = %settings.client_id, "mqtt connecting");

    loop {
        attempts.begin();
        let event = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(fms_api::RetryError::Cancelled.into()),
            event = eventloop.poll() => event,
        };
        match event {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                tracing::info!(state = %State::Connected, %endpoint, code = ?ack.code, "mqtt connected");
                return Ok((client, eventloop));
            }
            Ok(_) => {}
            Err(e) => attempts.failed(&endpoint, &e).await?,
        }
    }
}

/// Best-effort DISCONNECT и ожидание завершения задачи event loop.
async fn disconnect(client: &AsyncClient, task: JoinHandle<()>, name: &str) {
    match tokio::time::timeout(DISCONNECT_GRACE, client.disconnect()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::debug!(client = name, error = %e, "disconnect request failed"),
        Err(_) => tracing::debug!(client = name, "disconnect request timed out"),
    }
    let abort = task.abort_handle();
    if tokio::time::timeout(DISCONNECT_GRACE, task).await.is_err() {
        abort.abort();
    }
    tracing::info!(client = name, "mqtt disconnected");
}

// ═══════════════════════════════════════════════════════════════
//  Publisher
// ═══════════════════════════════════════════════════════════════

/// MQTT publisher: клиент + фоновая задача, крутящая event loop.
pub struct MqttPublisher {
    client: AsyncClient,
    topic: String,
    driver: JoinHandle<()>,
}

impl MqttPublisher {
    pub async fn connect(
        settings: &MqttSettings,
        retry: &RetryPolicy,
        token: &CancellationToken,
    ) -> Result<Self, BridgeError> {
        let (client, eventloop) = connect(settings, retry, token).await?;
        let driver = tokio::spawn(drive(eventloop));
        Ok(Self {
            client,
            topic: settings.topic.clone(),
            driver,
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub async fn disconnect(self) {
        disconnect(&self.client, self.driver, "publisher").await;
    }
}

impl Publisher for MqttPublisher {
    type Error = BridgeError;

    async fn publish(&self, payload: Vec<u8>) -> Result<(), BridgeError> {
        self.client
            .publish(self.topic.clone(), QoS::AtMostOnce, false, payload)
            .await?;
        Ok(())
    }
}

/// Event loop publisher'а: входящих данных нет, только отправка и ping.
async fn drive(mut eventloop: EventLoop) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Outgoing(Outgoing::Disconnect)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::error!(error = %e, "mqtt connection lost");
                break;
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Subscriber
// ═══════════════════════════════════════════════════════════════

/// MQTT subscriber. Входящие PUBLISH складываются в bounded канал
/// отдельной задачей; потребитель забирает их через `MessageSource::poll`.
pub struct MqttSubscriber {
    client: AsyncClient,
    inbound: mpsc::Receiver<Inbound>,
    receiver: JoinHandle<()>,
}

impl MqttSubscriber {
    /// Подключиться и подписаться на topic с QoS 0.
    pub async fn connect(
        settings: &MqttSettings,
        capacity: usize,
        retry: &RetryPolicy,
        token: &CancellationToken,
    ) -> Result<Self, BridgeError> {
        let (client, eventloop) = connect(settings, retry, token).await?;
        client.subscribe(settings.topic.clone(), QoS::AtMostOnce).await?;
        tracing::info!(topic = %settings.topic, qos = 0, "mqtt subscribe requested");

        let (tx, inbound) = mpsc::channel(capacity);
        let receiver = tokio::spawn(receive(eventloop, tx));
        Ok(Self {
            client,
            inbound,
            receiver,
        })
    }

    pub async fn disconnect(self) {
        let Self {
            client,
            inbound,
            receiver,
        } = self;
        // Закрыть канал, чтобы receiver не висел на полном буфере.
        drop(inbound);
        disconnect(&client, receiver, "subscriber").await;
    }
}

impl MessageSource for MqttSubscriber {
    type Error = BridgeError;

    async fn poll(&mut self, timeout: Duration) -> Polled<BridgeError> {
        match tokio::time::timeout(timeout, self.inbound.recv()).await {
            Ok(Some(message)) => Polled::Message(message),
            Ok(None) => Polled::Closed,
            Err(_) => Polled::Idle,
        }
    }
}

async fn receive(mut eventloop: EventLoop, tx: mpsc::Sender<Inbound>) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let message = Inbound::new(publish.topic, publish.payload.to_vec());
                if tx.send(message).await.is_err() {
                    break;
                }
            }
            Ok(Event::Incoming(Packet::SubAck(ack))) => {
                tracing::info!(return_codes = ?ack.return_codes, "mqtt subscribed");
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::error!(error = %e, "mqtt connection lost");
                break;
            }
        }
    }
}
