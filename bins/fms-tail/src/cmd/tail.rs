use tokio_util::sync::CancellationToken;

use fms_api::State;
use fms_bridge::{KafkaTailSource, cancel_on_interrupt, run_tail};

use super::config::Effective;
use super::error::TailError;

pub async fn run(eff: &Effective) -> Result<(), TailError> {
    let token = CancellationToken::new();
    cancel_on_interrupt(&token);

    let mut source =
        match KafkaTailSource::connect(&eff.kafka, &eff.group_id, &eff.retry, &token).await {
            Ok(s) => s,
            Err(e) if e.is_cancelled() => {
                tracing::info!(state = %State::Terminated, "interrupted before connect");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
    println!(
        "Subscribed to Kafka topic '{}' on broker '{}'",
        eff.kafka.topic, eff.kafka.brokers
    );

    let mut out = std::io::stdout();
    let result = run_tail(&mut source, &mut out, eff.poll_timeout, &token).await;

    source.close();
    tracing::info!(state = %State::Terminated, "kafka consumer stopped");

    result?;
    Ok(())
}
