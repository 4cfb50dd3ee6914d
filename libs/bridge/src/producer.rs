use std::io::Write;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use fms_api::{Publisher, State, TelemetryGenerator, encode_json, now_secs};

use crate::BridgeError;

// ═══════════════════════════════════════════════════════════════
//  Producer loop — synthetic telemetry → pub/sub topic
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy)]
pub struct ProducerSettings {
    pub iterations: u32,
    /// Пауза между публикациями.
    pub interval: Duration,
}

impl Default for ProducerSettings {
    fn default() -> Self {
        Self {
            iterations: 10,
            interval: Duration::from_secs(2),
        }
    }
}

/// Опубликовать `iterations` записей с паузой `interval` между ними.
/// Возвращает число опубликованных записей (меньше при остановке по сигналу).
pub async fn run_producer<P, W>(
    publisher: &P,
    generator: &mut TelemetryGenerator,
    settings: &ProducerSettings,
    out: &mut W,
    token: &CancellationToken,
) -> Result<u32, BridgeError>
where
    P: Publisher,
    BridgeError: From<P::Error>,
    W: Write,
{
    tracing::info!(
        state = %State::Running,
        vehicle_id = %generator.vehicle_id(),
        iterations = settings.iterations,
        interval_ms = settings.interval.as_millis() as u64,
        "producer running"
    );

    let mut published = 0;
    for tick in 0..settings.iterations {
        if token.is_cancelled() {
            break;
        }

        let record = generator.next_record(now_secs());
        let payload = encode_json(&record)?;
        publisher.publish(payload.clone()).await?;
        published += 1;
        writeln!(out, "Published: {}", String::from_utf8_lossy(&payload))?;

        if tick + 1 < settings.iterations {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(settings.interval) => {}
            }
        }
    }

    tracing::info!(state = %State::Closing, published, "producer finished");
    Ok(published)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakePublisher;
    use fms_api::decode_record;

    #[tokio::test(start_paused = true)]
    async fn publishes_exact_count_at_fixed_interval() {
        let token = CancellationToken::new();
        let publisher = FakePublisher::default();
        let mut generator = TelemetryGenerator::new("raspi-001", Some(11));
        let mut out = Vec::new();

        let published = run_producer(
            &publisher,
            &mut generator,
            &ProducerSettings::default(),
            &mut out,
            &token,
        )
        .await
        .unwrap();

        assert_eq!(published, 10);
        let sent = publisher.sent();
        assert_eq!(sent.len(), 10);
        for pair in sent.windows(2) {
            assert!(pair[1].0 - pair[0].0 >= Duration::from_secs(2));
        }
        for (_, payload) in &sent {
            let record = decode_record(payload).unwrap();
            assert_eq!(record.vehicle_id, "raspi-001");
            assert!(record.in_range());
        }
        let printed = String::from_utf8(out).unwrap();
        assert_eq!(printed.lines().filter(|l| l.starts_with("Published: ")).count(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn compressed_timing_is_honoured() {
        let token = CancellationToken::new();
        let publisher = FakePublisher::default();
        let mut generator = TelemetryGenerator::new("raspi-001", Some(1));
        let settings = ProducerSettings {
            iterations: 3,
            interval: Duration::from_millis(5),
        };
        let started = tokio::time::Instant::now();

        let published = run_producer(&publisher, &mut generator, &settings, &mut std::io::sink(), &token)
            .await
            .unwrap();

        assert_eq!(published, 3);
        // Паузы только между публикациями.
        assert!(started.elapsed() < Duration::from_millis(15));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_publishing() {
        let token = CancellationToken::new();
        let publisher = FakePublisher::default();
        let mut generator = TelemetryGenerator::new("raspi-001", Some(5));

        let stopper = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(4_500)).await;
            stopper.cancel();
        });

        let published = run_producer(
            &publisher,
            &mut generator,
            &ProducerSettings::default(),
            &mut std::io::sink(),
            &token,
        )
        .await
        .unwrap();

        assert_eq!(published, 3);
        assert_eq!(publisher.sent().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn publish_failure_is_returned() {
        let token = CancellationToken::new();
        let publisher = FakePublisher::failing_after(2);
        let mut generator = TelemetryGenerator::new("raspi-001", Some(5));

        let err = run_producer(
            &publisher,
            &mut generator,
            &ProducerSettings::default(),
            &mut std::io::sink(),
            &token,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, BridgeError::Io(_)));
        assert_eq!(publisher.sent().len(), 2);
    }
}
