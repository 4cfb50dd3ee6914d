use std::io::Write;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use fms_api::{MessageSource, Polled, State, decode_json};

use crate::BridgeError;

// ═══════════════════════════════════════════════════════════════
//  Tail loop — Kafka topic → stdout
// ═══════════════════════════════════════════════════════════════

pub const DEFAULT_TAIL_POLL_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TailStats {
    pub printed: u64,
    pub decode_errors: u64,
    pub poll_errors: u64,
}

/// Печатать каждую запись топика в `out`, пока не придёт сигнал остановки.
/// Ошибки брокера и битые записи логируются, цикл продолжается.
pub async fn run_tail<S, W>(
    source: &mut S,
    out: &mut W,
    poll_timeout: Duration,
    token: &CancellationToken,
) -> Result<TailStats, BridgeError>
where
    S: MessageSource,
    W: Write,
{
    let mut stats = TailStats::default();
    tracing::info!(state = %State::Running, "tail running");

    loop {
        let polled = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            polled = source.poll(poll_timeout) => polled,
        };

        match polled {
            Polled::Message(message) => match decode_json(&message.payload) {
                Ok(value) => {
                    writeln!(out, "Kafka Received: {value}")?;
                    out.flush()?;
                    stats.printed += 1;
                }
                Err(e) => {
                    stats.decode_errors += 1;
                    tracing::error!(
                        topic = %message.topic,
                        offset = ?message.offset,
                        error = %e,
                        "error decoding message"
                    );
                }
            },
            Polled::Idle => {}
            Polled::Error(e) => {
                stats.poll_errors += 1;
                tracing::error!(error = %e, "consumer error");
            }
            Polled::Closed => {
                tracing::warn!("consumer stream closed");
                break;
            }
        }
    }

    tracing::info!(
        state = %State::Closing,
        printed = stats.printed,
        decode_errors = stats.decode_errors,
        poll_errors = stats.poll_errors,
        "tail stopped"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeError, ScriptedSource};
    use fms_api::Inbound;

    fn record(offset: i64, payload: &str) -> Polled<FakeError> {
        let mut inbound = Inbound::new("fms-data-stream", payload);
        inbound.offset = Some(offset);
        Polled::Message(inbound)
    }

    fn lines(out: &[u8]) -> Vec<String> {
        String::from_utf8(out.to_vec())
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[tokio::test]
    async fn prints_every_record_in_topic_order() {
        let token = CancellationToken::new();
        let script = vec![
            record(0, r#"{"vehicle_id":"raspi-001","timestamp":1,"speed":1.5,"rpm":800,"fuel_level":10.0}"#),
            record(1, r#"{"vehicle_id":"raspi-001","timestamp":2,"speed":2.5,"rpm":900,"fuel_level":9.5}"#),
            record(2, r#"{"vehicle_id":"raspi-001","timestamp":3,"speed":3.5,"rpm":1000,"fuel_level":9.0}"#),
        ];
        let mut source = ScriptedSource::new(script).cancel_when_drained(&token);
        let mut out = Vec::new();

        let stats = run_tail(&mut source, &mut out, Duration::from_millis(5), &token)
            .await
            .unwrap();

        assert_eq!(stats.printed, 3);
        assert_eq!(
            lines(&out),
            vec![
                r#"Kafka Received: {"vehicle_id":"raspi-001","timestamp":1,"speed":1.5,"rpm":800,"fuel_level":10.0}"#,
                r#"Kafka Received: {"vehicle_id":"raspi-001","timestamp":2,"speed":2.5,"rpm":900,"fuel_level":9.5}"#,
                r#"Kafka Received: {"vehicle_id":"raspi-001","timestamp":3,"speed":3.5,"rpm":1000,"fuel_level":9.0}"#,
            ]
        );
    }

    #[tokio::test]
    async fn bad_records_and_poll_errors_are_skipped() {
        let token = CancellationToken::new();
        let script = vec![
            record(0, "not json"),
            Polled::Error(FakeError("broker transport failure".into())),
            record(1, ""),
            Polled::Idle,
            record(2, r#"{"ok":true}"#),
        ];
        let mut source = ScriptedSource::new(script).cancel_when_drained(&token);
        let mut out = Vec::new();

        let stats = run_tail(&mut source, &mut out, Duration::from_millis(5), &token)
            .await
            .unwrap();

        assert_eq!(
            stats,
            TailStats {
                printed: 1,
                decode_errors: 2,
                poll_errors: 1,
            }
        );
        assert_eq!(lines(&out), vec![r#"Kafka Received: {"ok":true}"#]);
    }

    #[tokio::test]
    async fn closed_stream_ends_loop() {
        let token = CancellationToken::new();
        let mut source = ScriptedSource::new(vec![record(0, "1"), Polled::Closed]);
        let mut out = Vec::new();

        let stats = run_tail(&mut source, &mut out, Duration::from_millis(5), &token)
            .await
            .unwrap();

        assert_eq!(stats.printed, 1);
        assert!(!token.is_cancelled());
    }
}
