use tokio_util::sync::CancellationToken;

use fms_api::{State, TelemetryGenerator};
use fms_bridge::{MqttPublisher, cancel_on_interrupt, run_producer};

use super::config::Effective;
use super::error::PublisherError;

pub async fn run(eff: &Effective) -> Result<(), PublisherError> {
    let token = CancellationToken::new();
    cancel_on_interrupt(&token);

    let publisher = match MqttPublisher::connect(&eff.mqtt, &eff.retry, &token).await {
        Ok(p) => p,
        Err(e) if e.is_cancelled() => {
            tracing::info!(state = %State::Terminated, "interrupted before connect");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    tracing::info!(topic = %publisher.topic(), "publishing");

    let mut generator = TelemetryGenerator::new(eff.vehicle_id.clone(), eff.seed);
    let mut out = std::io::stdout();
    let result = run_producer(&publisher, &mut generator, &eff.producer, &mut out, &token).await;

    publisher.disconnect().await;
    tracing::info!(state = %State::Terminated, "publisher stopped");

    result?;
    Ok(())
}
