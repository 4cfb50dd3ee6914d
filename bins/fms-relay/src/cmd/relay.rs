use tokio_util::sync::CancellationToken;

use fms_api::State;
use fms_bridge::{KafkaSink, MqttSubscriber, cancel_on_interrupt, run_relay};

use super::config::Effective;
use super::error::RelayError;

pub async fn run(eff: &Effective) -> Result<(), RelayError> {
    let token = CancellationToken::new();
    cancel_on_interrupt(&token);

    // MQTT первым: пока ждём Kafka, входящие копятся в канале подписчика.
    let mut source =
        match MqttSubscriber::connect(&eff.mqtt, eff.channel_capacity, &eff.retry, &token).await {
            Ok(s) => s,
            Err(e) if e.is_cancelled() => {
                tracing::info!(state = %State::Terminated, "interrupted before connect");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

    let sink = match KafkaSink::connect(&eff.kafka, &eff.retry, &token).await {
        Ok(s) => s,
        Err(e) => {
            source.disconnect().await;
            if e.is_cancelled() {
                tracing::info!(state = %State::Terminated, "interrupted before connect");
                return Ok(());
            }
            return Err(e.into());
        }
    };
    tracing::info!(from = %eff.mqtt.topic, to = %sink.topic(), "relaying");

    let mut out = std::io::stdout();
    let result = run_relay(&mut source, &sink, &mut out, &eff.relay, &token).await;

    source.disconnect().await;
    sink.close();
    tracing::info!(state = %State::Terminated, "relay stopped");

    result?;
    Ok(())
}
